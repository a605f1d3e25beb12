/// Classification for how a caller should react to a failed fetch.
///
/// Nothing in the core retries on its own; the class is advice for edge
/// handlers (status codes, `Retry-After`) and for any client-side backoff.
///
/// # Behavior Summary
///
/// | Class | Retry? | Typical cause |
/// |-------|--------|---------------|
/// | `Never` | No | missing credential, unknown symbol, bad input |
/// | `WithBackoff` | Yes, after the provider's quota window | HTTP 429, quota notice |
/// | `Transient` | Yes, soon | timeout, connection refused |
/// | `Upstream` | Maybe | provider returned an error payload or status |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The request cannot succeed as issued.
    Never,

    /// The provider quota is exhausted. Retrying before the quota window
    /// resets only burns more calls.
    WithBackoff,

    /// Network-level failure; the same request may succeed on a later attempt.
    Transient,

    /// The provider answered with an error we could not classify further.
    Upstream,
}

//! Provider registry module.
//!
//! This module provides:
//! - Name-based provider selection with aliases and a default
//! - Active and fallback adapters chosen by shared cache availability
//! - Rate limiting per provider

mod provider_registry;
mod rate_limiter;

pub use provider_registry::{
    canonical_provider_name, known_provider_names, ProviderRegistry, DEFAULT_PROVIDER,
};
pub use rate_limiter::RateLimiter;

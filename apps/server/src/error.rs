use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tickercache_market_data::{MarketDataError, RetryClass};

/// Seconds a client is told to wait after a rate-limit response.
pub const RETRY_AFTER_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    MarketData(#[from] MarketDataError),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn retry_class(&self) -> RetryClass {
        match self {
            ApiError::MarketData(e) => e.retry_class(),
        }
    }

    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::MarketData(e) => match e {
                MarketDataError::Configuration { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "configuration")
                }
                MarketDataError::RateLimited { .. } => {
                    (StatusCode::TOO_MANY_REQUESTS, "rate_limited")
                }
                MarketDataError::NoData { .. } => (StatusCode::NOT_FOUND, "no_data"),
                MarketDataError::Transport { .. } => (StatusCode::GATEWAY_TIMEOUT, "transport"),
                MarketDataError::Upstream { .. } => (StatusCode::BAD_GATEWAY, "upstream"),
                MarketDataError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status();
        let retry = self.retry_class();
        if status.is_server_error() {
            tracing::warn!("{} ({})", self, status);
        } else {
            tracing::debug!("{} ({})", self, status);
        }

        let body = Json(ErrorBody {
            code: status.as_u16(),
            error: kind,
            message: self.to_string(),
        });
        let mut response = (status, body).into_response();
        if retry == RetryClass::WithBackoff {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                MarketDataError::Configuration {
                    provider: "FINNHUB".into(),
                    message: "no key".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                MarketDataError::RateLimited {
                    provider: "FINNHUB".into(),
                    message: "HTTP 429".into(),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                MarketDataError::NoData {
                    symbol: "ZZZZ".into(),
                    message: "empty".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                MarketDataError::Transport {
                    provider: "FINNHUB".into(),
                    message: "timed out".into(),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                MarketDataError::Upstream {
                    provider: "FINNHUB".into(),
                    message: "HTTP 500".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                MarketDataError::InvalidRequest("bad interval".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status().0, expected);
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::from(MarketDataError::RateLimited {
            provider: "ALPHA_VANTAGE".into(),
            message: "quota".into(),
        })
        .into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "60"
        );
    }
}

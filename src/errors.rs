use thiserror::Error;

/// Error taxonomy for the gateway.
///
/// `GatewayTimeout`, `Api` and `Decode` are the three classified outcomes of
/// a REST call; the remaining variants cover transport, authentication and
/// configuration failures.
#[derive(Error, Debug)]
pub enum BinanceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The venue answered 504; the response body is never inspected.
    #[error("Gateway timeout")]
    GatewayTimeout,

    /// Non-2xx response, with `code`/`msg` extracted best-effort from the
    /// body (`0`/empty when the body yields neither).
    #[error("API error: {code} - {message}")]
    Api { code: i32, message: String },

    /// 2xx response whose body did not match the expected schema.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Other error: {0}")]
    Other(String),
}

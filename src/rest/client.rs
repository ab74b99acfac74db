use crate::config::BinanceConfig;
use crate::errors::BinanceError;
use crate::rest::sign;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{instrument, trace};

const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("spotgate/", env!("CARGO_PKG_VERSION"));

/// REST request executor.
///
/// Builds the final target from the endpoint and the caller's raw parameter
/// string, signs when asked, issues the call, and classifies the outcome.
/// Calls are independent of each other and never retried.
#[derive(Debug, Clone)]
pub struct BinanceHttpClient {
    client: Client,
    config: BinanceConfig,
    base_url: String,
}

impl BinanceHttpClient {
    /// Create a client with the default request timeout
    pub fn new(config: BinanceConfig) -> Result<Self, BinanceError> {
        Self::with_timeout(config, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a client with a custom request timeout in seconds
    pub fn with_timeout(config: BinanceConfig, timeout_secs: u64) -> Result<Self, BinanceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        let base_url = config.rest_url();
        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Execute one REST call and decode the response body as `T`.
    ///
    /// `raw_params` is opaque ordered text (`&`-joined `key=value` pairs);
    /// it is never reordered or validated here. When `signed` is true the
    /// query is extended with `timestamp` and `signature` per [`sign`];
    /// when false it is sent verbatim. The API key header is attached to
    /// every call once credentials are configured.
    #[instrument(skip(self, raw_params))]
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        signed: bool,
        raw_params: &str,
    ) -> Result<T, BinanceError> {
        let query = if signed {
            if !self.config.has_credentials() {
                return Err(BinanceError::Auth(
                    "Signed request requires API credentials".to_string(),
                ));
            }
            sign::signed_query(raw_params, self.config.secret_key(), sign::timestamp_ms()?)?
        } else {
            raw_params.to_string()
        };

        let url = self.request_url(endpoint, &query);
        let mut request = self.client.request(method, &url);
        if !self.config.api_key().is_empty() {
            request = request.header(API_KEY_HEADER, self.config.api_key());
        }

        let response = request.send().await?;
        Self::handle_response(response).await
    }

    fn request_url(&self, endpoint: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.base_url, endpoint, query)
        }
    }

    /// Classify the response: 504 fails fast without touching the body,
    /// other non-success statuses become an API error record, and a success
    /// status must decode as `T` or fail as a decode error.
    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, BinanceError> {
        let status = response.status();
        if status == StatusCode::GATEWAY_TIMEOUT {
            return Err(BinanceError::GatewayTimeout);
        }

        let body = response.text().await.map_err(|e| {
            BinanceError::Transport(format!("Failed to read response body: {}", e))
        })?;
        trace!("Response body: {}", body);

        if status.is_success() {
            serde_json::from_str(&body)
                .map_err(|e| BinanceError::Decode(format!("Failed to parse JSON response: {}", e)))
        } else {
            Err(api_error(&body))
        }
    }
}

/// Best-effort extraction of the venue's `{code, msg}` error record; any
/// parse failure yields the zero-value record rather than a second error.
pub(crate) fn api_error(body: &str) -> BinanceError {
    #[derive(Default, Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        code: i32,
        #[serde(default)]
        msg: String,
    }

    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    BinanceError::Api {
        code: parsed.code,
        message: parsed.msg,
    }
}

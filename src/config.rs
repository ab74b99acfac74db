use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;

const MAINNET_REST_URL: &str = "https://api.binance.com";
const TESTNET_REST_URL: &str = "https://testnet.binance.vision";
const MAINNET_STREAM_URL: &str = "wss://stream.binance.com:9443/ws/";
const TESTNET_STREAM_URL: &str = "wss://testnet.binance.vision/ws/";

/// Credentials and endpoint selection shared by the REST and stream clients.
///
/// The API key is sent as the `X-MBX-APIKEY` header; the secret key is used
/// only as the HMAC signing key and never leaves the process.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub api_key: Secret<String>,
    pub secret_key: Secret<String>,
    pub testnet: bool,
    pub base_url: Option<String>,
    pub stream_url: Option<String>,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for BinanceConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BinanceConfig", 5)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("secret_key", "[REDACTED]")?;
        state.serialize_field("testnet", &self.testnet)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("stream_url", &self.stream_url)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for BinanceConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BinanceConfigHelper {
            api_key: String,
            secret_key: String,
            #[serde(default)]
            testnet: bool,
            #[serde(default)]
            base_url: Option<String>,
            #[serde(default)]
            stream_url: Option<String>,
        }

        let helper = BinanceConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            api_key: Secret::new(helper.api_key),
            secret_key: Secret::new(helper.secret_key),
            testnet: helper.testnet,
            base_url: helper.base_url,
            stream_url: helper.stream_url,
        })
    }
}

impl BinanceConfig {
    /// Create a new configuration with API credentials
    #[must_use]
    pub fn new(api_key: String, secret_key: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
            testnet: false,
            base_url: None,
            stream_url: None,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `BINANCE_API_KEY`
    /// - `BINANCE_SECRET_KEY`
    /// - `BINANCE_TESTNET` (optional, defaults to false)
    /// - `BINANCE_BASE_URL` (optional)
    /// - `BINANCE_STREAM_URL` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("BINANCE_API_KEY")
            .map_err(|_| ConfigError::MissingEnvironmentVariable("BINANCE_API_KEY".to_string()))?;

        let secret_key = env::var("BINANCE_SECRET_KEY").map_err(|_| {
            ConfigError::MissingEnvironmentVariable("BINANCE_SECRET_KEY".to_string())
        })?;

        let testnet = env::var("BINANCE_TESTNET")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let base_url = env::var("BINANCE_BASE_URL").ok();
        let stream_url = env::var("BINANCE_STREAM_URL").ok();

        Ok(Self {
            api_key: Secret::new(api_key),
            secret_key: Secret::new(secret_key),
            testnet,
            base_url,
            stream_url,
        })
    }

    /// Create configuration from a .env file and environment variables
    ///
    /// Loads environment variables from `.env` in the working directory (if
    /// present), then reads the standard variable names.
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file() -> Result<Self, ConfigError> {
        Self::from_env_file_path(".env")
    }

    /// Create configuration from a specific .env file path
    ///
    /// Useful for different environments (e.g., .env.development,
    /// .env.production). A missing file is not an error; system environment
    /// variables are still consulted.
    #[cfg(feature = "env-file")]
    pub fn from_env_file_path(env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env()
    }

    /// Create configuration for read-only operations (market data only)
    /// This doesn't require API credentials for public endpoints
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            secret_key: Secret::new(String::new()),
            testnet: false,
            base_url: None,
            stream_url: None,
        }
    }

    /// Check if this configuration has valid credentials for authenticated operations
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty() && !self.secret_key.expose_secret().is_empty()
    }

    /// Set testnet mode
    #[must_use]
    pub const fn testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// Set custom REST base URL
    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set custom stream base URL
    #[must_use]
    pub fn stream_url(mut self, stream_url: String) -> Self {
        self.stream_url = Some(stream_url);
        self
    }

    /// Effective REST base URL (testnet takes precedence over the override)
    #[must_use]
    pub fn rest_url(&self) -> String {
        if self.testnet {
            TESTNET_REST_URL.to_string()
        } else {
            self.base_url
                .clone()
                .unwrap_or_else(|| MAINNET_REST_URL.to_string())
        }
    }

    /// Effective stream base URL; raw stream parameters are appended to this
    /// verbatim, so it always ends with the raw-stream path prefix
    #[must_use]
    pub fn ws_url(&self) -> String {
        if self.testnet {
            TESTNET_STREAM_URL.to_string()
        } else {
            self.stream_url
                .clone()
                .unwrap_or_else(|| MAINNET_STREAM_URL.to_string())
        }
    }

    /// Get API key (use carefully - exposes secret)
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Get secret key (use carefully - exposes secret)
    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

use serde::Deserialize;
use std::{env, fs, path::PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub token_url: String,
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub lookback_hours: u64,
}

/// OAuth2 client credentials for the provider's token endpoint.
///
/// Resolved from the environment once at process start; nothing below the
/// binary edge reads ambient process state.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ProviderCredentials {
    pub fn from_env() -> anyhow::Result<Self> {
        let client_id = env::var("RTE_CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("RTE_CLIENT_ID must be set"))?;
        let client_secret = env::var("RTE_CLIENT_SECRET")
            .map_err(|_| anyhow::anyhow!("RTE_CLIENT_SECRET must be set"))?;
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub uri: String,
    pub max_connections: u32,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartConfig {
    pub output_dir: PathBuf,
    pub read_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub store: StoreConfig,
    pub chart: ChartConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path =
            env::var("CONSUMPTION_CONFIG").unwrap_or_else(|_| "consumption-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&contents)?;
        Ok(cfg)
    }
}

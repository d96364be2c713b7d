pub mod rte_short_term;

pub use rte_short_term::RteShortTermSource;

use crate::window::FetchWindow;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// Credential/token exchange rejected. Fatal for the run; not retried
    /// within the run.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Request rejected, network failure, or an unusable response body.
    /// Aborts the run; safe to retry on the next schedule.
    #[error("fetch failed: {0}")]
    Http(String),
}

#[async_trait::async_trait]
pub trait ConsumptionSource: Send + Sync {
    async fn fetch(&self, window: &FetchWindow) -> Result<serde_json::Value, SourceError>;
}

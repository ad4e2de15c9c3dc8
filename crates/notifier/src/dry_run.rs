//! Log-only transport for dry runs

use crate::{Transport, TransportError};
use async_trait::async_trait;
use tracing::info;

/// Writes notices to the log instead of posting them
#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        info!(text = %text, "Notification (not posted)");
        Ok(())
    }

    fn describe(&self) -> String {
        "log".to_string()
    }
}

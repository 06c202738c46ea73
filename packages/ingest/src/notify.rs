//! Publishing of pipeline messages.

use async_trait::async_trait;
use mobility_ingest_models::Message;

use crate::IngestError;

/// Announces the completion of a pipeline stage.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// # Errors
    ///
    /// Returns [`IngestError::Notify`] if the message cannot be delivered.
    async fn publish(&self, message: &Message) -> Result<(), IngestError>;
}

/// Writes messages to the log as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, message: &Message) -> Result<(), IngestError> {
        let json = serde_json::to_string(message).map_err(|e| IngestError::Notify {
            message: message.summary(),
            reason: e.to_string(),
        })?;
        log::info!("Published {}: {json}", message.message_type());
        Ok(())
    }
}

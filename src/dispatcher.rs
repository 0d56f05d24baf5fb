//! Drives one batch of records through normalization and publish.
//!
//! The batch is all-or-nothing from the trigger's point of view: records are
//! published strictly in arrival order, one awaited send at a time, the first
//! failure stops the batch, and only a batch where every record was published
//! is reported as successful.

use crate::kafka::{ConnectionManager, ProducerClient};
use crate::shadow::{decode_record, normalize, OutboundMessage, RawRecord};
use crate::{Error, Result};
use futures::stream::{self, TryStreamExt};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Per-invocation dispatch parameters.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub topic: String,
    pub send_timeout: Duration,
    pub unwrap_error_envelopes: bool,
}

/// Result of a fully published batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub batch_size: usize,
    pub published: usize,
}

impl BatchOutcome {
    fn start(batch_size: usize) -> Self {
        Self {
            batch_size,
            published: 0,
        }
    }

    fn record_published(self) -> Self {
        Self {
            published: self.published + 1,
            ..self
        }
    }

    pub fn is_complete(&self) -> bool {
        self.published == self.batch_size
    }
}

/// Borrows the process-wide connection for the length of one invocation.
pub struct BatchDispatcher<'a, C> {
    connection: &'a ConnectionManager<C>,
    settings: &'a DispatchSettings,
}

impl<'a, C: ProducerClient> BatchDispatcher<'a, C> {
    pub fn new(connection: &'a ConnectionManager<C>, settings: &'a DispatchSettings) -> Self {
        Self {
            connection,
            settings,
        }
    }

    /// Publishes every record or fails the whole batch.
    ///
    /// Rejects the batch up front when the connection is mid-transition.
    /// Every record is normalized before anything is published, so an
    /// unprocessable record fails the batch with nothing sent. Publishing
    /// then folds over the messages in arrival order and stops at the first
    /// failure, disconnecting before the error is returned.
    #[instrument(skip_all, fields(topic = %self.settings.topic, batch_size = records.len()))]
    pub async fn dispatch(&self, records: &[RawRecord]) -> Result<BatchOutcome> {
        let state = self.connection.status();
        if state.is_transitioning() {
            error!("Kafka is in {} state. Rejecting the batch for next retry", state);
            return Err(Error::ConnectionBusy { state });
        }

        info!("Batch size: {}", records.len());

        let messages = records
            .iter()
            .enumerate()
            .map(|(index, record)| self.prepare(index, record))
            .collect::<Result<Vec<_>>>()?;

        let this = self;
        let outcome = stream::iter(messages.into_iter().enumerate().map(Ok::<_, Error>))
            .try_fold(
                BatchOutcome::start(records.len()),
                move |outcome, (index, message)| async move {
                    this.forward(index, message).await?;
                    Ok::<_, Error>(outcome.record_published())
                },
            )
            .await?;

        debug_assert!(outcome.is_complete());
        info!(published = outcome.published, "Batch published");
        Ok(outcome)
    }

    fn prepare(&self, index: usize, record: &RawRecord) -> Result<OutboundMessage> {
        let event = decode_record(record, self.settings.unwrap_error_envelopes)
            .map_err(|e| annotate(index, record, e))?;
        let normalized = normalize(event).map_err(|e| annotate(index, record, e))?;
        normalized.into_message()
    }

    async fn forward(&self, index: usize, message: OutboundMessage) -> Result<()> {
        debug!(index, key = %message.key, "Publishing record");

        match self
            .connection
            .publish(&self.settings.topic, message, self.settings.send_timeout)
            .await
        {
            Ok(()) => Ok(()),
            Err(e @ Error::Publish { .. }) => {
                error!(index, "Publish failed, dropping connection: {}", e);
                if let Err(disconnect_err) = self.connection.disconnect().await {
                    error!("Disconnect after publish failure failed: {}", disconnect_err);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

fn annotate(index: usize, record: &RawRecord, err: Error) -> Error {
    match err {
        Error::Validation { message } => {
            error!(index, message_id = ?record.message_id, "Unprocessable record: {}", message);
            Error::Validation {
                message: format!("record {}: {}", index, message),
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_completes_at_batch_size() {
        let outcome = BatchOutcome::start(2).record_published();
        assert!(!outcome.is_complete());
        assert!(outcome.record_published().is_complete());
    }

    #[test]
    fn test_empty_outcome_is_complete() {
        assert!(BatchOutcome::start(0).is_complete());
    }
}

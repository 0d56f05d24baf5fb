//! Invocation boundary: one call per batch delivered by the trigger.

use crate::config::{Config, ForwarderConfig};
use crate::dispatcher::{BatchDispatcher, BatchOutcome, DispatchSettings};
use crate::kafka::{ConnectionManager, ConnectionState, KafkaProducer, ProducerClient};
use crate::shadow::RawRecord;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Marker returned to the trigger for a fully published batch.
pub const SUCCESS: &str = "success";

/// A batch as delivered by the trigger. A missing `Records` array is an
/// empty batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationContext {
    #[serde(rename = "awsRequestId", default)]
    pub request_id: String,
    #[serde(rename = "functionName", default)]
    pub function_name: String,
}

/// What the trigger sees for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InvocationResponse {
    Success,
    Error { error: String, retryable: bool },
}

impl InvocationResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResponse::Success)
    }
}

impl From<&Result<BatchOutcome>> for InvocationResponse {
    fn from(result: &Result<BatchOutcome>) -> Self {
        match result {
            Ok(_) => InvocationResponse::Success,
            Err(e) => InvocationResponse::Error {
                error: e.to_string(),
                retryable: e.is_retryable(),
            },
        }
    }
}

/// Process-wide forwarder: the shared connection plus the settings every
/// invocation dispatches with.
pub struct Forwarder<C> {
    connection: ConnectionManager<C>,
    settings: DispatchSettings,
}

impl Forwarder<KafkaProducer> {
    pub fn from_config(config: &Config) -> Self {
        let client = KafkaProducer::new(config.kafka.clone(), config.forwarder.send_timeout());
        Self::new(client, &config.forwarder)
    }
}

impl<C: ProducerClient> Forwarder<C> {
    pub fn new(client: C, config: &ForwarderConfig) -> Self {
        Self {
            connection: ConnectionManager::new(client),
            settings: DispatchSettings {
                topic: config.topic_name.clone(),
                send_timeout: config.send_timeout(),
                unwrap_error_envelopes: config.unwrap_error_envelopes,
            },
        }
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    pub fn status(&self) -> ConnectionState {
        self.connection.status()
    }

    /// Eager connect at process start. A failure leaves the connection in
    /// `Error`; the first publish retries the handshake.
    pub async fn warm_up(&self) {
        if let Err(e) = self.connection.connect().await {
            warn!("Initial Kafka connection failed, will retry on first publish: {}", e);
        }
    }

    #[instrument(
        skip_all,
        fields(request_id = %context.request_id, batch_size = event.records.len())
    )]
    pub async fn handle(
        &self,
        event: &InvocationEvent,
        context: &InvocationContext,
    ) -> Result<BatchOutcome> {
        info!(state = %self.status(), "Invoking the forwarder");

        let dispatcher = BatchDispatcher::new(&self.connection, &self.settings);
        let outcome = dispatcher.dispatch(&event.records).await?;

        info!("{}", SUCCESS);
        Ok(outcome)
    }

    pub async fn shutdown(&self) -> Result<()> {
        match self.connection.disconnect().await {
            Err(Error::ConnectionBusy { state }) => {
                warn!(%state, "Shutting down while connection is busy");
                Ok(())
            }
            other => other,
        }
    }
}

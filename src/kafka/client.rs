use crate::shadow::OutboundMessage;
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// One send call to the broker: every message goes to `topic` and must be
/// acknowledged within `timeout`. Clients never retry a request.
#[derive(Debug, Clone)]
pub struct ProduceRequest<'a> {
    pub topic: &'a str,
    pub messages: Vec<OutboundMessage>,
    pub timeout: Duration,
}

/// Broker connect/disconnect/send primitives.
///
/// Implementations hold at most one live producer. State bookkeeping belongs
/// to [`ConnectionManager`](super::ConnectionManager); clients only do I/O.
#[async_trait]
pub trait ProducerClient: Send + Sync {
    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn send(&self, request: ProduceRequest<'_>) -> Result<()>;
}

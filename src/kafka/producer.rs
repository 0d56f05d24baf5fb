use crate::kafka::client::{ProduceRequest, ProducerClient};
use crate::{config::KafkaConfig, Error, Result};
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delivery retries inside librdkafka. Redelivery of the whole batch by the
/// trigger is the only retry path.
pub const PUBLISH_RETRIES: u32 = 0;

/// [`ProducerClient`] backed by an rdkafka `FutureProducer`.
///
/// `send_timeout` bounds delivery of each message: librdkafka expires the
/// message after it (`message.timeout.ms`), and the awaited delivery is cut
/// off at the same deadline.
pub struct KafkaProducer {
    config: KafkaConfig,
    send_timeout: Duration,
    producer: RwLock<Option<FutureProducer>>,
}

impl KafkaProducer {
    pub fn new(config: KafkaConfig, send_timeout: Duration) -> Self {
        Self {
            config,
            send_timeout,
            producer: RwLock::new(None),
        }
    }

    fn client_config(&self) -> ClientConfig {
        let timeout_ms = self.send_timeout.as_millis().max(1);
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", self.config.bootstrap_servers())
            .set("client.id", &self.config.client_id)
            .set("compression.type", &self.config.compression)
            .set("acks", &self.config.acks)
            .set("linger.ms", self.config.linger_ms.to_string())
            .set("message.send.max.retries", PUBLISH_RETRIES.to_string())
            .set("message.timeout.ms", timeout_ms.to_string())
            .set("request.timeout.ms", timeout_ms.to_string());
        client_config
    }

    fn current(&self) -> Option<FutureProducer> {
        self.producer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, producer: Option<FutureProducer>) -> Option<FutureProducer> {
        let mut slot = self.producer.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, producer)
    }
}

#[async_trait]
impl ProducerClient for KafkaProducer {
    async fn connect(&self) -> Result<()> {
        let producer: FutureProducer = self.client_config().create()?;

        // Producer creation is lazy; a metadata round trip proves the brokers
        // are reachable before the connection is reported live.
        let handshake = producer.clone();
        let timeout = self.config.connect_timeout();
        let broker_count = tokio::task::spawn_blocking(move || {
            handshake
                .client()
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| Error::Connection(format!("metadata handshake aborted: {}", e)))??;

        info!(
            brokers = broker_count,
            bootstrap = %self.config.bootstrap_servers(),
            "Kafka producer connected"
        );

        if self.replace(Some(producer)).is_some() {
            warn!("Replaced an existing producer handle on connect");
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let Some(producer) = self.replace(None) else {
            debug!("Disconnect requested with no live producer");
            return Ok(());
        };

        let timeout = self.config.flush_timeout();
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| Error::Connection(format!("producer flush aborted: {}", e)))??;

        info!("Kafka producer disconnected");
        Ok(())
    }

    async fn send(&self, request: ProduceRequest<'_>) -> Result<()> {
        let producer = self.current().ok_or(Error::NotConnected)?;

        for message in &request.messages {
            let record = FutureRecord::to(request.topic)
                .key(message.key.as_str())
                .payload(message.value.as_str());

            let delivery = producer.send(record, request.timeout);
            let (partition, offset) = tokio::time::timeout(request.timeout, delivery)
                .await
                .map_err(|_| Error::Timeout {
                    message: format!(
                        "delivery to '{}' not acknowledged within {:?}",
                        request.topic, request.timeout
                    ),
                })?
                .map_err(|(e, _)| Error::Kafka(e))?;

            debug!(
                topic = request.topic,
                key = %message.key,
                partition,
                offset,
                "Message delivered"
            );
        }

        Ok(())
    }
}

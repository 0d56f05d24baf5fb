#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use shadow_forwarder::config::{Config, ForwarderConfig, KafkaConfig};
use shadow_forwarder::kafka::{ProduceRequest, ProducerClient};
use shadow_forwarder::shadow::{OutboundMessage, RawRecord};
use shadow_forwarder::{DispatchSettings, Error, Result};
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

pub const TEST_TOPIC: &str = "hvac.shadow.updates";

/// In-memory broker client that records every send and fails on command.
#[derive(Default)]
pub struct RecordingClient {
    /// Zero-based send attempt that fails; later attempts succeed again.
    pub fail_send_at: Option<usize>,
    pub fail_connect: bool,
    pub connect_gate: Option<Notify>,
    pub disconnect_gate: Option<Notify>,
    pub send_attempts: AtomicUsize,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub sent: Mutex<Vec<(String, OutboundMessage)>>,
}

impl RecordingClient {
    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_send_at: Some(index),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_keys(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, m)| m.key).collect()
    }

    pub fn attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProducerClient for RecordingClient {
    async fn connect(&self) -> Result<()> {
        if let Some(gate) = &self.connect_gate {
            gate.notified().await;
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(Error::Connection("no brokers available".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(gate) = &self.disconnect_gate {
            gate.notified().await;
        }
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, request: ProduceRequest<'_>) -> Result<()> {
        let attempt = self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_send_at == Some(attempt) {
            return Err(Error::Connection("Local: Message timed out".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        for message in request.messages {
            sent.push((request.topic.to_string(), message));
        }
        Ok(())
    }
}

pub fn settings() -> DispatchSettings {
    DispatchSettings {
        topic: TEST_TOPIC.to_string(),
        send_timeout: Duration::from_millis(1000),
        unwrap_error_envelopes: true,
    }
}

pub fn forwarder_config() -> ForwarderConfig {
    ForwarderConfig {
        topic_name: TEST_TOPIC.to_string(),
        send_timeout_ms: 1000,
        unwrap_error_envelopes: true,
    }
}

/// Configuration for tests against a real broker, from `TEST_*` variables.
pub fn get_test_config() -> Config {
    let kafka = KafkaConfig {
        brokers: env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        client_id: format!("shadow-forwarder-test-{}", std::process::id()),
        compression: "none".to_string(),
        acks: "all".to_string(),
        linger_ms: 0,
        connect_timeout_ms: 5000,
        flush_timeout_ms: 1000,
    };

    let forwarder = ForwarderConfig {
        topic_name: format!("test_{}_shadow", std::process::id()),
        send_timeout_ms: 5000,
        unwrap_error_envelopes: true,
    };

    Config { kafka, forwarder }
}

pub fn shadow_doc(thing_name: &str, status: Value) -> Value {
    json!({
        "state": {
            "reported": {
                "thing_name": thing_name,
                "status": status
            }
        },
        "version": 7
    })
}

pub fn record(doc: &Value) -> RawRecord {
    RawRecord::new(doc.to_string())
}

pub fn valid_records(names: &[&str]) -> Vec<RawRecord> {
    names
        .iter()
        .map(|name| record(&shadow_doc(name, json!({"temperature": 21}))))
        .collect()
}

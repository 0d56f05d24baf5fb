mod common;

use common::{get_test_config, shadow_doc};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use serde_json::{json, Value};
use shadow_forwarder::kafka::{ConnectionState, KafkaProducer};
use shadow_forwarder::{Forwarder, InvocationContext, InvocationEvent};
use std::time::Duration;
use tokio::time::timeout;

fn create_consumer(config: &shadow_forwarder::Config) -> StreamConsumer {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", config.kafka.bootstrap_servers())
        .set("group.id", format!("shadow-forwarder-it-{}", std::process::id()))
        .set("auto.offset.reset", "earliest")
        .set("enable.auto.commit", "false")
        .create()
        .expect("consumer creation failed");
    consumer
        .subscribe(&[config.forwarder.topic_name.as_str()])
        .expect("subscribe failed");
    consumer
}

#[tokio::test]
#[ignore] // Requires running Kafka
async fn test_batch_round_trip_through_kafka() {
    tracing_subscriber::fmt()
        .with_env_filter("shadow_forwarder=debug")
        .try_init()
        .ok();

    let config = get_test_config();
    let forwarder = Forwarder::from_config(&config);
    forwarder.warm_up().await;
    assert_eq!(forwarder.status(), ConnectionState::Connected);

    let event: InvocationEvent = serde_json::from_value(json!({
        "Records": [
            {"body": shadow_doc("it-hvac-1", json!({"thermostat_mode": "cool"})).to_string()},
            {"body": shadow_doc("it-hvac-2", json!({"mode": "heat"})).to_string()}
        ]
    }))
    .unwrap();

    let outcome = forwarder
        .handle(&event, &InvocationContext::default())
        .await
        .unwrap();
    assert_eq!(outcome.published, 2);

    let consumer = create_consumer(&config);
    let mut received = Vec::new();
    let start = tokio::time::Instant::now();

    while received.len() < 2 && start.elapsed() < Duration::from_secs(20) {
        if let Ok(Ok(message)) = timeout(Duration::from_secs(1), consumer.recv()).await {
            let key = String::from_utf8_lossy(message.key().unwrap_or_default()).to_string();
            let value: Value = serde_json::from_slice(message.payload().unwrap_or_default()).unwrap();
            received.push((key, value));
        }
    }

    assert_eq!(received.len(), 2);
    assert_eq!(received[0].0, "it-hvac-1");
    assert_eq!(received[0].1["state"]["reported"]["status"]["mode"], "cool");
    assert_eq!(received[1].0, "it-hvac-2");

    forwarder.shutdown().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires running Kafka
async fn test_unreachable_broker_leaves_error_state() {
    let mut config = get_test_config();
    config.kafka.brokers = vec!["127.0.0.1:1".to_string()];
    config.kafka.connect_timeout_ms = 500;

    let client = KafkaProducer::new(config.kafka.clone(), config.forwarder.send_timeout());
    let forwarder = Forwarder::new(client, &config.forwarder);
    forwarder.warm_up().await;

    assert_eq!(forwarder.status(), ConnectionState::Error);
}

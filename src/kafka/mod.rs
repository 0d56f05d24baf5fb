pub mod client;
pub mod connection;
pub mod producer;
pub mod state;


pub use client::{ProduceRequest, ProducerClient};
pub use connection::ConnectionManager;
pub use producer::KafkaProducer;
pub use state::ConnectionState;

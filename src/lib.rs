pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;

pub mod kafka;
pub mod shadow;

pub use config::Config;
pub use dispatcher::{BatchDispatcher, BatchOutcome, DispatchSettings};
pub use error::{Error, Result};
pub use handler::{Forwarder, InvocationContext, InvocationEvent, InvocationResponse};

use crate::kafka::client::{ProduceRequest, ProducerClient};
use crate::kafka::state::ConnectionState;
use crate::shadow::OutboundMessage;
use crate::{Error, Result};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Owns the single producer connection of an execution context and its
/// lifecycle state.
///
/// Built once at process start and shared by reference with every
/// invocation, so a warm process reuses the connection established by an
/// earlier invocation. All transitions go through [`ConnectionManager::connect`]
/// and [`ConnectionManager::disconnect`]; the state lock is never held across
/// an await point.
///
/// Concurrent invocations are not serialized against each other: a disconnect
/// triggered by one batch can interleave with a publish from another. The
/// busy check in the dispatcher is best effort.
pub struct ConnectionManager<C> {
    client: C,
    state: RwLock<ConnectionState>,
}

impl<C: ProducerClient> ConnectionManager<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    pub fn status(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn transition(&self, next: ConnectionState) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Self::apply(&mut state, next)
    }

    /// Starts a connect or disconnect under a single write lock.
    ///
    /// Returns `false` when the state already is where `next` leads, and
    /// [`Error::ConnectionBusy`] while another transition is in flight.
    pub(super) fn begin(&self, next: ConnectionState) -> Result<bool> {
        let settled = match next {
            ConnectionState::Connecting => ConnectionState::Connected,
            ConnectionState::Disconnecting => ConnectionState::Disconnected,
            other => return self.transition(other).map(|()| true),
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state == settled {
            return Ok(false);
        }
        Self::apply(&mut state, next)?;
        Ok(true)
    }

    fn apply(state: &mut ConnectionState, next: ConnectionState) -> Result<()> {
        let current = *state;
        if current.is_transitioning() && next.is_transitioning() {
            return Err(Error::ConnectionBusy { state: current });
        }
        if !current.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: current,
                to: next,
            });
        }
        debug!(from = %current, to = %next, "Connection state transition");
        *state = next;
        Ok(())
    }

    /// Establishes the producer connection.
    ///
    /// Returns immediately when already connected. Fails with
    /// [`Error::ConnectionBusy`] while another transition is in flight and
    /// with [`Error::Connection`] when the broker handshake fails, which
    /// leaves the state at `Error`.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<()> {
        if !self.begin(ConnectionState::Connecting)? {
            return Ok(());
        }
        info!("Connecting Kafka producer");

        match self.client.connect().await {
            Ok(()) => {
                self.transition(ConnectionState::Connected)?;
                info!("Kafka producer ready");
                Ok(())
            }
            Err(e) => {
                self.transition(ConnectionState::Error)?;
                error!("Failed to connect Kafka producer: {}", e);
                Err(Error::Connection(e.to_string()))
            }
        }
    }

    /// Tears the connection down so the next publish starts from a clean
    /// handshake.
    ///
    /// Always ends in `Disconnected` once started; a failed flush is logged
    /// and the handle is dropped regardless.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<()> {
        if !self.begin(ConnectionState::Disconnecting)? {
            return Ok(());
        }
        info!("Disconnecting Kafka producer");

        if let Err(e) = self.client.disconnect().await {
            warn!("Kafka producer did not shut down cleanly: {}", e);
        }

        self.transition(ConnectionState::Disconnected)
    }

    /// Sends one message keyed by device identity.
    ///
    /// Connects first from `Disconnected` or `Error`. A send failure is
    /// returned as [`Error::Publish`] without reconnecting; the caller decides
    /// whether to [`disconnect`](Self::disconnect).
    #[instrument(skip(self, message), fields(key = %message.key))]
    pub async fn publish(
        &self,
        topic: &str,
        message: OutboundMessage,
        timeout: Duration,
    ) -> Result<()> {
        let state = self.status();
        if state.is_transitioning() {
            return Err(Error::ConnectionBusy { state });
        }
        if state.needs_connect() {
            self.connect().await?;
        }

        let key = message.key.clone();
        let request = ProduceRequest {
            topic,
            messages: vec![message],
            timeout,
        };

        self.client.send(request).await.map_err(|e| {
            error!("Failed to publish message: {}", e);
            Error::Publish {
                key,
                source: Box::new(e),
            }
        })
    }
}

use std::fmt;

/// Lifecycle state of the shared producer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnecting,
    #[default]
    Disconnected,
    Error,
}

impl ConnectionState {
    /// Whether the state machine has an edge from `self` to `next`.
    ///
    /// `Error` is reachable from anywhere a connect can fail.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Error, Connecting)
                | (Connecting, Connected)
                | (Connected, Disconnecting)
                | (Error, Disconnecting)
                | (Disconnecting, Disconnected)
                | (_, Error)
        )
    }

    /// A connect or disconnect is in flight.
    pub fn is_transitioning(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Disconnecting
        )
    }

    /// A publish from this state must establish a connection first.
    pub fn needs_connect(self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Error)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnecting => "Disconnecting",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Error => "Error",
        };
        f.write_str(name)
    }
}

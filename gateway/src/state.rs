//! Gateway lifecycle states.

/// Gateway operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    /// Engine built, feed loading or listener not yet bound.
    Starting,
    /// Accepting connections.
    Running,
    /// No longer accepting connections.
    ShuttingDown,
    /// Listener closed.
    Stopped,
}

impl GatewayState {
    /// Check if the gateway accepts new connections.
    pub fn accepts_requests(&self) -> bool {
        matches!(self, GatewayState::Running)
    }
}

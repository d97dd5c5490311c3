//! Connection state machine

use crate::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state (transport not yet negotiated)
    Initial,

    /// Version negotiation in progress (magic + proposals sent)
    Handshaking,

    /// HELLO sent, awaiting the authentication verdict
    Authenticating,

    /// Ready for the next request
    Ready,

    /// A result stream is open; records may still be on the wire
    Streaming,

    /// Unusable after a transport, timeout, or protocol error; never
    /// returned to the idle pool
    Defunct,

    /// Closed by the client
    Closed,
}

impl ConnectionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Initial, Handshaking)
                | (Handshaking, Authenticating)
                | (Authenticating, Ready)
                | (Ready, Streaming)
                | (Streaming, Ready)
                | (_, Defunct)
                | (_, Closed)
        )
    }

    /// Transition to new state
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::State(format!(
                "connection cannot move from {} to {}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }

    /// Whether the connection may carry further requests
    pub fn is_usable(&self) -> bool {
        matches!(self, ConnectionState::Ready | ConnectionState::Streaming)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Handshaking => write!(f, "handshaking"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Ready => write!(f, "ready"),
            Self::Streaming => write!(f, "streaming"),
            Self::Defunct => write!(f, "defunct"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = ConnectionState::Initial;
        assert!(state.transition(ConnectionState::Handshaking).is_ok());
        assert!(state.transition(ConnectionState::Authenticating).is_ok());
        assert!(state.transition(ConnectionState::Ready).is_ok());
        assert!(state.transition(ConnectionState::Streaming).is_ok());
        assert!(state.transition(ConnectionState::Ready).is_ok());
    }

    #[test]
    fn test_invalid_transition() {
        let mut state = ConnectionState::Initial;
        assert!(state.transition(ConnectionState::Ready).is_err());
    }

    #[test]
    fn test_defunct_from_any_state() {
        for start in [
            ConnectionState::Initial,
            ConnectionState::Handshaking,
            ConnectionState::Ready,
            ConnectionState::Streaming,
        ] {
            let mut state = start;
            assert!(state.transition(ConnectionState::Defunct).is_ok());
            assert!(!state.is_usable());
        }
    }

    #[test]
    fn test_defunct_is_terminal_for_requests() {
        let mut state = ConnectionState::Defunct;
        assert!(state.transition(ConnectionState::Ready).is_err());
        // but closing a defunct connection is allowed
        assert!(state.can_transition_to(ConnectionState::Closed));
    }
}

//! Core types for XSWD.
//!
//! This crate provides the protocol primitives: the application identity sent
//! during authorization, the JSON-RPC envelope, inbound frame classification
//! and reassembly of fragmented frames. It performs no I/O.

mod app;
mod assembler;
mod message;

pub use app::{AppInfo, AppInfoError};
pub use assembler::FrameAssembler;
pub use message::{Entity, EventType, Inbound, RpcError, RpcRequest, RpcResponse, UnknownEvent};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket yet, or the last one closed cleanly.
    #[default]
    Initializing,
    /// Socket open, authorization payload sent.
    WaitingAuth,
    /// The wallet accepted the application.
    Accepted,
    /// The wallet refused the application.
    Refused,
    /// The transport failed.
    Closed,
}

impl ConnectionState {
    /// Whether the wallet will currently accept requests.
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }

    /// Whether this state is terminal until the next `initialize`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Refused | Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_initializing() {
        assert_eq!(ConnectionState::default(), ConnectionState::Initializing);
    }

    #[test]
    fn terminal_states() {
        assert!(ConnectionState::Refused.is_terminal());
        assert!(ConnectionState::Closed.is_terminal());
        assert!(!ConnectionState::WaitingAuth.is_terminal());
        assert!(!ConnectionState::Accepted.is_terminal());
        assert!(ConnectionState::Accepted.is_accepted());
    }
}

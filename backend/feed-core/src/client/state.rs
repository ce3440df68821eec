//! Connection lifecycle states broadcast to state subscribers.

use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::Serialize;

/// Lifecycle phase of the shared transport.
///
/// `Authenticating`/`Authenticated` exist for wrappers that layer an
/// auth handshake on top; the core client never enters them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Reconnecting,
    Connected,
    Authenticating,
    Authenticated,
    Error,
}

impl Display for ConnectionStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        let label = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Authenticating => "authenticating",
            ConnectionStatus::Authenticated => "authenticated",
            ConnectionStatus::Error => "error",
        };
        write!(formatter, "{label}")
    }
}

/// Snapshot of the connection at one point in time.
///
/// Exactly one snapshot is current; every change is broadcast to all
/// registered state callbacks in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub is_connected: bool,
    pub is_authenticated: bool,
}

impl ConnectionState {
    pub fn disconnected() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            is_connected: false,
            is_authenticated: false,
        }
    }

    pub fn connecting() -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            is_connected: false,
            is_authenticated: false,
        }
    }

    pub fn reconnecting() -> Self {
        Self {
            status: ConnectionStatus::Reconnecting,
            is_connected: false,
            is_authenticated: false,
        }
    }

    pub fn connected() -> Self {
        Self {
            status: ConnectionStatus::Connected,
            is_connected: true,
            is_authenticated: false,
        }
    }

    pub fn authenticating() -> Self {
        Self {
            status: ConnectionStatus::Authenticating,
            is_connected: true,
            is_authenticated: false,
        }
    }

    pub fn authenticated() -> Self {
        Self {
            status: ConnectionStatus::Authenticated,
            is_connected: true,
            is_authenticated: true,
        }
    }

    pub fn error() -> Self {
        Self {
            status: ConnectionStatus::Error,
            is_connected: false,
            is_authenticated: false,
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::disconnected()
    }
}

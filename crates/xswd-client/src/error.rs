use xswd_core::{AppInfoError, EventType};

/// Errors surfaced by [`Connection`](crate::Connection) and [`Api`](crate::Api).
///
/// Errors reported by the wallet inside a reply are not errors here: they come
/// back as an error-shaped [`RpcResponse`](xswd_core::RpcResponse).
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("websocket is already alive")]
    AlreadyConnected,
    #[error("failed to open websocket: {0}")]
    TransportOpen(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("authorization timeout")]
    AuthorizationTimeout,
    #[error("application was refused by the wallet")]
    AuthorizationRefused,
    #[error("sending without being connected")]
    NotConnected,
    #[error("request {id} timed out")]
    RequestTimeout { id: u64 },
    #[error("timed out waiting for {0} event")]
    EventTimeout(EventType),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("subscription to {0} failed")]
    SubscriptionFailed(EventType),
    #[error("invalid application info: {0}")]
    InvalidAppInfo(#[from] AppInfoError),
    #[error("serialization error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

//! Client-side connection for XSWD.
//!
//! [`Connection`] opens the websocket to a local wallet, runs the
//! authorization handshake, matches replies to requests by id and buffers
//! push events. [`Api`] layers the event subscriptions on top.

mod api;
mod config;
mod connection;
mod correlator;
mod error;
mod events;

pub use api::Api;
pub use config::{ConnectionConfig, DEFAULT_HOST, DEFAULT_PATH, DEFAULT_PORT};
pub use connection::{AuthOutcome, Connection};
pub use error::{ConnectionError, Result};
pub use xswd_core::{AppInfo, ConnectionState, Entity, EventType, RpcError, RpcResponse};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock ignoring poisoning; every critical section leaves its data valid.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

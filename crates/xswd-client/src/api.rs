//! Connection plus the event subscriptions the wallet expects up front.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use xswd_core::{AppInfo, Entity, EventType, RpcResponse};

use crate::config::ConnectionConfig;
use crate::connection::{AuthOutcome, Connection};
use crate::error::{ConnectionError, Result};

/// Entry point for applications talking to an XSWD wallet.
///
/// [`initialize`](Self::initialize) authorizes and subscribes to every push
/// event, so `call_and_wait` and `wait_for` can be used right away.
#[derive(Clone)]
pub struct Api {
    connection: Connection,
}

impl Api {
    pub fn new(app_info: AppInfo) -> Self {
        Self::with_config(app_info, ConnectionConfig::default())
    }

    pub fn with_config(app_info: AppInfo, config: ConnectionConfig) -> Self {
        Self {
            connection: Connection::with_config(app_info, config),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Authorize, then subscribe to `new_topoheight`, `new_entry` and
    /// `new_balance`.
    pub async fn initialize(&self) -> Result<()> {
        self.connection.app_info().validate()?;

        match self.connection.initialize().await? {
            AuthOutcome::Authorized => debug!("authorized"),
            AuthOutcome::Refused => return Err(ConnectionError::AuthorizationRefused),
        }

        for event in [EventType::NewTopoheight, EventType::NewEntry, EventType::NewBalance] {
            let response = self
                .connection
                .send_sync(Entity::Wallet, "Subscribe", json!({ "event": event }), None)
                .await?;
            match response.into_result() {
                Ok(result) if truthy(&result) => debug!(%event, "subscribed"),
                Ok(result) => {
                    warn!(%event, %result, "subscription declined");
                    return Err(ConnectionError::SubscriptionFailed(event));
                }
                Err(e) => {
                    warn!(%event, error = %e, "subscription failed");
                    return Err(ConnectionError::SubscriptionFailed(event));
                }
            }
        }
        Ok(())
    }

    /// Call a method and return its reply, error-shaped or not.
    pub async fn call(
        &self,
        entity: Entity,
        method: &str,
        params: impl Serialize,
    ) -> Result<RpcResponse> {
        self.connection.send_sync(entity, method, params, None).await
    }

    /// Call a method, then wait for the push event its effect produces
    /// (e.g. `new_entry` after a transfer).
    pub async fn call_and_wait(
        &self,
        entity: Entity,
        method: &str,
        params: impl Serialize,
        event: EventType,
    ) -> Result<RpcResponse> {
        self.connection.send_sync(entity, method, params, Some(event)).await
    }

    pub async fn wait_for(&self, event: EventType) -> Result<Value> {
        self.connection.wait_for(event).await
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

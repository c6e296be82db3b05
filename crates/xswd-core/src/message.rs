//! Protocol messages.
//!
//! Outbound requests are plain JSON-RPC 2.0. Inbound frames come in three
//! shapes that share one socket: the authorization decision, replies to
//! requests, and push events. [`Inbound::classify`] tells them apart.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Which side of the wallet/node pair a method targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Wallet,
    Daemon,
}

impl Entity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Daemon => "daemon",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Push events the wallet can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A new block was added to the chain.
    NewTopoheight,
    /// The wallet balance changed.
    NewBalance,
    /// A new entry was added to the wallet history.
    NewEntry,
}

impl EventType {
    pub const ALL: [EventType; 3] = [Self::NewTopoheight, Self::NewBalance, Self::NewEntry];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewTopoheight => "new_topoheight",
            Self::NewBalance => "new_balance",
            Self::NewEntry => "new_entry",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

/// Error parsing an event name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown event: {0}")]
pub struct UnknownEvent(pub String);

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A reply to a request, either result-shaped or error-shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Split into the error or the result. A reply carrying neither yields
    /// `Ok(Value::Null)`.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Error reported by the wallet or node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct RpcError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Build from whatever the peer put in the `error` field.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(message) => Self {
                code: None,
                message,
                data: None,
            },
            Value::Object(_) => serde_json::from_value(value.clone()).unwrap_or_else(|_| Self {
                code: None,
                message: value.to_string(),
                data: None,
            }),
            other => Self {
                code: None,
                message: other.to_string(),
                data: None,
            },
        }
    }
}

/// A classified inbound document.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The wallet's answer to the authorization payload.
    Authorization { accepted: bool },
    /// A reply to the request with this id.
    Response { id: u64, response: RpcResponse },
    /// An unsolicited push.
    Event { event: EventType, value: Value },
    /// Anything else; dropped by the connection.
    Unrecognized(Value),
}

impl Inbound {
    /// Classify a parsed frame.
    ///
    /// `accepted` is checked first so authorization frames never reach
    /// request correlation, then `error`, then `result`.
    pub fn classify(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Self::Unrecognized(value);
        };

        if let Some(accepted) = map.get("accepted") {
            return match accepted.as_bool() {
                Some(accepted) => Self::Authorization { accepted },
                None => Self::Unrecognized(Value::Object(map)),
            };
        }

        if map.contains_key("error") {
            return Self::response(map);
        }

        if !map.contains_key("result") {
            return Self::Unrecognized(Value::Object(map));
        }

        let push = match map.get("result") {
            Some(Value::Object(result)) if result.contains_key("event") => Some(
                result
                    .get("event")
                    .and_then(Value::as_str)
                    .and_then(|name| name.parse::<EventType>().ok())
                    .map(|event| (event, result.get("value").cloned().unwrap_or(Value::Null))),
            ),
            _ => None,
        };

        match push {
            Some(Some((event, value))) => Self::Event { event, value },
            Some(None) => Self::Unrecognized(Value::Object(map)),
            None => Self::response(map),
        }
    }

    fn response(mut map: Map<String, Value>) -> Self {
        let id_value = map.remove("id").unwrap_or(Value::Null);
        let Some(id) = parse_id(&id_value) else {
            map.insert("id".to_string(), id_value);
            return Self::Unrecognized(Value::Object(map));
        };
        let response = RpcResponse {
            id: id_value,
            result: map.remove("result"),
            error: map.remove("error").map(RpcError::from_value),
        };
        Self::Response { id, response }
    }
}

/// Request ids are numbers, but some peers echo them back as strings.
fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let req = RpcRequest::new(7, "GetHeight", Value::Null);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"jsonrpc": "2.0", "id": 7, "method": "GetHeight"})
        );

        let req = RpcRequest::new(8, "Subscribe", json!({"event": "new_entry"}));
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": 8,
                "method": "Subscribe",
                "params": {"event": "new_entry"},
            })
        );
    }

    #[test]
    fn parse_event_names() {
        assert_eq!("new_topoheight".parse::<EventType>().unwrap(), EventType::NewTopoheight);
        assert_eq!("new_balance".parse::<EventType>().unwrap(), EventType::NewBalance);
        assert_eq!("new_entry".parse::<EventType>().unwrap(), EventType::NewEntry);
        assert!("new_block".parse::<EventType>().is_err());
        assert_eq!(
            serde_json::to_value(EventType::NewTopoheight).unwrap(),
            json!("new_topoheight")
        );
    }

    #[test]
    fn classify_authorization() {
        assert_eq!(
            Inbound::classify(json!({"accepted": true, "message": "ok"})),
            Inbound::Authorization { accepted: true }
        );
        assert_eq!(
            Inbound::classify(json!({"accepted": false})),
            Inbound::Authorization { accepted: false }
        );
    }

    #[test]
    fn non_bool_accepted_is_dropped() {
        assert!(matches!(
            Inbound::classify(json!({"accepted": "yes"})),
            Inbound::Unrecognized(_)
        ));
    }

    #[test]
    fn accepted_wins_over_result() {
        assert_eq!(
            Inbound::classify(json!({"accepted": true, "id": 1, "result": 5})),
            Inbound::Authorization { accepted: true }
        );
    }

    #[test]
    fn classify_result() {
        let inbound =
            Inbound::classify(json!({"jsonrpc": "2.0", "id": 1, "result": {"height": 100}}));
        let Inbound::Response { id, response } = inbound else {
            panic!("expected response");
        };
        assert_eq!(id, 1);
        assert!(!response.is_error());
        assert_eq!(response.into_result().unwrap(), json!({"height": 100}));
    }

    #[test]
    fn classify_error() {
        let frame = json!({"id": "3", "error": {"code": -32602, "message": "bad params"}});
        let inbound = Inbound::classify(frame);
        let Inbound::Response { id, response } = inbound else {
            panic!("expected response");
        };
        assert_eq!(id, 3);
        let error = response.into_result().unwrap_err();
        assert_eq!(error.code, Some(-32602));
        assert_eq!(error.message, "bad params");
    }

    #[test]
    fn string_error_payload() {
        let inbound = Inbound::classify(json!({"id": 2, "error": "denied"}));
        let Inbound::Response { response, .. } = inbound else {
            panic!("expected response");
        };
        assert_eq!(response.error.unwrap().message, "denied");
    }

    #[test]
    fn classify_event() {
        assert_eq!(
            Inbound::classify(json!({"id": 0, "result": {"event": "new_balance", "value": 42}})),
            Inbound::Event {
                event: EventType::NewBalance,
                value: json!(42)
            }
        );
    }

    #[test]
    fn event_without_value() {
        assert_eq!(
            Inbound::classify(json!({"result": {"event": "new_entry"}})),
            Inbound::Event {
                event: EventType::NewEntry,
                value: Value::Null
            }
        );
    }

    #[test]
    fn unknown_event_is_dropped() {
        assert!(matches!(
            Inbound::classify(json!({"result": {"event": "new_block", "value": 1}})),
            Inbound::Unrecognized(_)
        ));
    }

    #[test]
    fn result_without_id_is_dropped() {
        assert!(matches!(
            Inbound::classify(json!({"result": 5})),
            Inbound::Unrecognized(_)
        ));
    }

    #[test]
    fn unrecognized_shapes() {
        assert!(matches!(Inbound::classify(json!([1, 2])), Inbound::Unrecognized(_)));
        assert!(matches!(
            Inbound::classify(json!({"hello": "world"})),
            Inbound::Unrecognized(_)
        ));
    }
}

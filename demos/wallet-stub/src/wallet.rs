//! Fake wallet state and method dispatch.

use serde_json::{Value, json};
use xswd_core::{EventType, RpcError};

pub const ADDRESS: &str = "deto1qyre7td6x9r88y4cavdgpv6k7lvx6j39lfsx420hpvh3ydpcrtxrxqg8v8e3z";

/// A push to deliver to subscribers after a method ran.
pub type Effect = (EventType, Value);

pub struct Wallet {
    pub topoheight: u64,
    pub balance: u64,
    entries: Vec<Value>,
    next_tx: u64,
}

impl Wallet {
    pub fn new() -> Self {
        Self {
            topoheight: 1,
            balance: 1_000_000,
            entries: Vec::new(),
            next_tx: 1,
        }
    }

    /// Advance the chain by one block.
    pub fn mine(&mut self) -> u64 {
        self.topoheight += 1;
        self.topoheight
    }

    /// Run a method. Returns the result (or error) plus any pushes it causes.
    pub fn call(&mut self, method: &str, params: &Value) -> (Result<Value, RpcError>, Vec<Effect>) {
        let result = match method {
            "Echo" => Ok(json!(format!("WALLET {}", join_strings(params)))),
            "GetAddress" => Ok(json!({ "address": ADDRESS })),
            "GetBalance" => Ok(json!({
                "balance": self.balance,
                "unlocked_balance": self.balance,
            })),
            "GetHeight" => Ok(json!({ "height": self.topoheight })),
            "GetTransfers" => Ok(json!({ "entries": self.entries })),
            "DERO.Echo" => Ok(json!(format!("DERO {}", join_strings(params)))),
            "DERO.Ping" => Ok(json!("Pong ")),
            "DERO.GetHeight" => Ok(json!({
                "height": self.topoheight,
                "stableheight": self.topoheight.saturating_sub(8),
                "topoheight": self.topoheight,
                "status": "OK",
            })),
            "DERO.GetInfo" => Ok(json!({ "topoheight": self.topoheight, "status": "OK" })),
            "transfer" | "scinvoke" => return self.spend(params),
            _ => Err(RpcError {
                code: Some(-32601),
                message: "Method not found".to_string(),
                data: None,
            }),
        };
        (result, Vec::new())
    }

    fn spend(&mut self, params: &Value) -> (Result<Value, RpcError>, Vec<Effect>) {
        let amount = params.get("amount").and_then(Value::as_u64).unwrap_or(0);
        if amount > self.balance {
            let error = RpcError {
                code: Some(-32098),
                message: "insufficient balance".to_string(),
                data: None,
            };
            return (Err(error), Vec::new());
        }

        self.balance -= amount;
        let txid = format!("{:064x}", self.next_tx);
        self.next_tx += 1;

        let entry = json!({
            "txid": txid,
            "amount": amount,
            "incoming": false,
            "topoheight": self.topoheight,
        });
        self.entries.push(entry.clone());

        let effects = vec![
            (EventType::NewBalance, json!(self.balance)),
            (EventType::NewEntry, entry),
        ];
        (Ok(json!({ "txid": txid })), effects)
    }
}

fn join_strings(params: &Value) -> String {
    params
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_emits_balance_and_entry() {
        let mut wallet = Wallet::new();
        let (result, effects) = wallet.call("transfer", &json!({"amount": 1000}));
        assert!(result.is_ok());
        assert_eq!(wallet.balance, 999_000);
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], (EventType::NewBalance, json!(999_000)));
        assert_eq!(effects[1].0, EventType::NewEntry);
    }

    #[test]
    fn overspend_is_an_error() {
        let mut wallet = Wallet::new();
        let (result, effects) = wallet.call("transfer", &json!({"amount": 5_000_000}));
        assert_eq!(result.unwrap_err().message, "insufficient balance");
        assert!(effects.is_empty());
    }

    #[test]
    fn unknown_method() {
        let mut wallet = Wallet::new();
        let (result, _) = wallet.call("Nope", &Value::Null);
        assert_eq!(result.unwrap_err().code, Some(-32601));
    }

    #[test]
    fn echo() {
        let mut wallet = Wallet::new();
        let (result, _) = wallet.call("DERO.Echo", &json!(["hello", "world"]));
        assert_eq!(result.unwrap(), json!("DERO hello world"));
    }
}

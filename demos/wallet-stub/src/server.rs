//! Wallet stub websocket server.

use crate::wallet::Wallet;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, broadcast};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use xswd_core::{AppInfo, EventType};

pub struct Options {
    /// Seconds between fake blocks.
    pub block_time: u16,
    /// Split replies into frames of at most this many bytes; 0 disables.
    pub chunk: usize,
    pub refuse: bool,
}

type SharedWallet = Arc<RwLock<Wallet>>;
type Sink = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>;

pub async fn run(addr: SocketAddr, options: Options) -> anyhow::Result<()> {
    let wallet = Arc::new(RwLock::new(Wallet::new()));
    let (events_tx, _) = broadcast::channel::<(EventType, Value)>(64);
    let options = Arc::new(options);

    // Block ticker
    let tick_wallet = wallet.clone();
    let tick_events = events_tx.clone();
    let block_time = Duration::from_secs(options.block_time.max(1) as u64);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(block_time);
        interval.tick().await;
        loop {
            interval.tick().await;
            let height = tick_wallet.write().await.mine();
            tracing::debug!("mined block {}", height);
            let _ = tick_events.send((EventType::NewTopoheight, json!(height)));
        }
    });

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on ws://{}/xswd", addr);

    loop {
        let (stream, client_addr) = listener.accept().await?;
        let wallet = wallet.clone();
        let events_tx = events_tx.clone();
        let options = options.clone();

        tokio::spawn(async move {
            let result = handle_connection(stream, client_addr, wallet, events_tx, options).await;
            if let Err(e) = result {
                tracing::warn!("Connection error from {}: {}", client_addr, e);
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    wallet: SharedWallet,
    events_tx: broadcast::Sender<(EventType, Value)>,
    options: Arc<Options>,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut stream) = ws.split();

    tracing::debug!("New connection from {}", addr);

    // Wait for the application's identity
    let app: AppInfo = loop {
        let msg = stream.next().await.ok_or(anyhow::anyhow!("Connection closed"))??;
        if let Message::Text(text) = msg {
            match serde_json::from_str(text.as_str()) {
                Ok(app) => break app,
                Err(e) => tracing::warn!("Invalid authorization payload: {}", e),
            }
        }
    };

    let accepted = !options.refuse && app.validate().is_ok();
    let message = if accepted {
        "User has authorized the application"
    } else {
        "User has rejected the application"
    };
    let decision = json!({ "accepted": accepted, "message": message });
    sink.send(Message::text(decision.to_string())).await?;
    if !accepted {
        tracing::info!("Refused {}", app.name);
        return Ok(());
    }
    tracing::info!("Authorized {} ({})", app.name, app.url);

    let mut subscriptions: HashSet<EventType> = HashSet::new();
    let mut events_rx = events_tx.subscribe();

    loop {
        tokio::select! {
            msg = stream.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };

                if let Message::Text(text) = msg {
                    let request: Value = match serde_json::from_str(text.as_str()) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!("Invalid request: {}", e);
                            continue;
                        }
                    };
                    let id = request.get("id").cloned().unwrap_or(Value::Null);
                    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
                    let params = request.get("params").cloned().unwrap_or(Value::Null);

                    let reply = match method {
                        "Subscribe" | "Unsubscribe" => {
                            let event = params
                                .get("event")
                                .and_then(Value::as_str)
                                .and_then(|e| e.parse::<EventType>().ok());
                            match event {
                                Some(event) if method == "Subscribe" => {
                                    subscriptions.insert(event);
                                    json!({"jsonrpc": "2.0", "id": id, "result": true})
                                }
                                Some(event) => {
                                    let removed = subscriptions.remove(&event);
                                    json!({"jsonrpc": "2.0", "id": id, "result": removed})
                                }
                                None => json!({
                                    "jsonrpc": "2.0",
                                    "id": id,
                                    "error": {"code": -32602, "message": "Invalid params"},
                                }),
                            }
                        }
                        _ => {
                            let (result, effects) = wallet.write().await.call(method, &params);
                            for effect in effects {
                                let _ = events_tx.send(effect);
                            }
                            match result {
                                Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
                                Err(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
                            }
                        }
                    };
                    send_chunked(&mut sink, &reply.to_string(), options.chunk).await?;
                }
            }

            // Pushes from the ticker or from any connection's spend
            event = events_rx.recv() => {
                if let Ok((event, value)) = event {
                    if subscriptions.contains(&event) {
                        let push = json!({
                            "jsonrpc": "2.0",
                            "id": Value::Null,
                            "result": {"event": event, "value": value},
                        });
                        sink.send(Message::text(push.to_string())).await?;
                    }
                }
            }
        }
    }

    tracing::debug!("Connection closed: {}", addr);
    Ok(())
}

async fn send_chunked(sink: &mut Sink, text: &str, chunk: usize) -> anyhow::Result<()> {
    if chunk == 0 || text.len() <= chunk {
        sink.send(Message::text(text.to_string())).await?;
        return Ok(());
    }

    let mut rest = text;
    while !rest.is_empty() {
        let mut end = chunk.min(rest.len());
        while !rest.is_char_boundary(end) {
            end += 1;
        }
        let (part, tail) = rest.split_at(end);
        sink.send(Message::text(part.to_string())).await?;
        rest = tail;
    }
    Ok(())
}

//! Scripted wallet side for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use xswd_client::{AppInfo, ConnectionConfig};

pub type WalletSocket = WebSocketStream<TcpStream>;

pub const APP_ID: &str = "ed606a2f4c4f499618a78ff5f7c8e51cd2ca4d8bfa7e2b41a27754bb78b1df1f";

pub fn app_info() -> AppInfo {
    AppInfo::new(APP_ID, "test", "A brief testing application", "http://localhost")
}

pub fn config(port: u16) -> ConnectionConfig {
    ConnectionConfig::default()
        .with_endpoint("127.0.0.1", port)
        .with_timeouts(Duration::from_secs(5), Duration::from_secs(5), Duration::from_secs(5))
}

pub fn config_with(port: u16, auth: u64, request: u64, event: u64) -> ConnectionConfig {
    ConnectionConfig::default().with_endpoint("127.0.0.1", port).with_timeouts(
        Duration::from_millis(auth),
        Duration::from_millis(request),
        Duration::from_millis(event),
    )
}

pub async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

pub async fn accept(listener: &TcpListener) -> WalletSocket {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

/// Serve a single client session with `session`.
pub async fn spawn_wallet<F, Fut>(session: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(WalletSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (listener, port) = bind().await;
    let handle = tokio::spawn(async move {
        let ws = accept(&listener).await;
        session(ws).await;
    });
    (port, handle)
}

pub async fn next_json(ws: &mut WalletSocket) -> Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("client went away: {other:?}"),
        }
    }
}

pub async fn send_json(ws: &mut WalletSocket, value: Value) {
    send_raw(ws, &value.to_string()).await;
}

pub async fn send_raw(ws: &mut WalletSocket, frame: &str) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

pub async fn send_binary(ws: &mut WalletSocket, payload: Vec<u8>) {
    ws.send(Message::binary(payload)).await.unwrap();
}

pub async fn push_event(ws: &mut WalletSocket, event: &str, value: Value) {
    let push = json!({"jsonrpc": "2.0", "id": 0, "result": {"event": event, "value": value}});
    send_json(ws, push).await;
}

/// Read the authorization payload and answer it.
pub async fn authorize(ws: &mut WalletSocket, accepted: bool) -> Value {
    let auth = next_json(ws).await;
    let message = if accepted {
        "User has authorized the application"
    } else {
        "User has rejected the application"
    };
    send_json(ws, json!({"accepted": accepted, "message": message})).await;
    auth
}

/// Assert the client writes no request for `millis`.
pub async fn expect_silence(ws: &mut WalletSocket, millis: u64) {
    match tokio::time::timeout(Duration::from_millis(millis), ws.next()).await {
        Err(_) => {}
        Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected frame: {}", text.as_str()),
        Ok(_) => {}
    }
}

/// Keep the socket open until the client closes it.
pub async fn drain(ws: &mut WalletSocket) {
    while let Some(Ok(_)) = ws.next().await {}
}

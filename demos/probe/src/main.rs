//! Connects to a wallet over XSWD and prints a few answers.
//!
//! Run against the stub:
//!   cargo run -p xswd-demo-wallet-stub
//!   cargo run -p xswd-demo-probe -- --port 44326
//!
//! Or with a config file:
//!   cargo run -p xswd-demo-probe -- --config xswd.toml

use serde_json::json;
use tracing_subscriber::EnvFilter;
use xswd_client::{Api, AppInfo, ConnectionConfig, Entity, EventType};

const APP_ID: &str = "ed606a2f4c4f499618a78ff5f7c8e51cd2ca4d8bfa7e2b41a27754bb78b1df1f";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("xswd_probe=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = match parse_arg(&args, "--config") {
        Some(path) => ConnectionConfig::load(path).await?,
        None => ConnectionConfig::default(),
    };
    if let Some(port) = parse_arg(&args, "--port").and_then(|p| p.parse().ok()) {
        config.port = port;
    }
    if let Some(host) = parse_arg(&args, "--host") {
        config.host = host;
    }

    tracing::info!("Connecting to {}", config.url());

    let app = AppInfo::new(
        APP_ID,
        "xswd-probe",
        "Prints wallet and daemon status",
        "http://localhost",
    );
    let api = Api::with_config(app, config);
    api.initialize().await?;
    tracing::info!("Authorized and subscribed");

    for (entity, method) in [
        (Entity::Wallet, "GetAddress"),
        (Entity::Wallet, "GetBalance"),
        (Entity::Wallet, "GetHeight"),
        (Entity::Daemon, "DERO.Ping"),
    ] {
        match api.call(entity, method, ()).await?.into_result() {
            Ok(result) => tracing::info!("{} {} -> {}", entity, method, result),
            Err(e) => tracing::warn!("{} {} failed: {}", entity, method, e),
        }
    }

    let echo = api
        .call(Entity::Daemon, "DERO.Echo", json!(["hello", "world"]))
        .await?;
    tracing::info!("echo -> {:?}", echo.into_result());

    tracing::info!("Waiting for the next block...");
    match api.wait_for(EventType::NewTopoheight).await {
        Ok(height) => tracing::info!("New topoheight: {}", height),
        Err(e) => tracing::warn!("{}", e),
    }

    api.connection().close();
    Ok(())
}

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

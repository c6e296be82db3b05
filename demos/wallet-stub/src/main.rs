//! Stand-in wallet for trying XSWD clients without a real wallet.
//!
//! Accepts (or refuses) every application, answers a handful of wallet and
//! daemon methods, mines a fake block every few seconds and pushes events to
//! subscribers. Large replies can be split across frames to exercise client
//! reassembly.
//!
//! Run:
//!   cargo run -p xswd-demo-wallet-stub -- --port 44326 --block-time 5 --chunk 64
//!   cargo run -p xswd-demo-wallet-stub -- --refuse

mod server;
mod wallet;

use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("wallet_stub=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let port = parse_arg(&args, "--port").unwrap_or(44326);
    let block_time = parse_arg(&args, "--block-time").unwrap_or(5);
    let chunk = parse_arg(&args, "--chunk").unwrap_or(0) as usize;
    let refuse = args.iter().any(|a| a == "--refuse");

    let addr: SocketAddr = ([127, 0, 0, 1], port).into();

    tracing::info!("Starting wallet stub on {}", addr);
    if refuse {
        tracing::info!("Refusing every application");
    }

    server::run(
        addr,
        server::Options {
            block_time,
            chunk,
            refuse,
        },
    )
    .await
}

fn parse_arg(args: &[String], flag: &str) -> Option<u16> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

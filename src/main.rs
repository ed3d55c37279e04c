use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use qpay::api::{self, AppState};
use qpay::collab::{StaticCredentials, StaticDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let addr: SocketAddr = env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string())
        .parse()?;

    // Credential and directory collaborators are external services; the
    // in-memory implementations stand at that boundary here.
    let state = Arc::new(AppState::new(
        Box::new(StaticCredentials::new()),
        Box::new(StaticDirectory::new()),
    ));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "qpay server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

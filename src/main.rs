//! Standalone development server.
//!
//! Resolves the address and TLS flags through the core factories and
//! serves a placeholder application. Real deployments embed the
//! library and bring their own `Router`.

use axum::{routing::get, Json, Router};
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use server_bootstrap::cli::ServeArgs;
use server_bootstrap::config::load_config;
use server_bootstrap::{make_server, make_socket};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server_bootstrap=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = ServeArgs::parse();
    let config = match &args.config {
        Some(path) => Some(load_config(path)?),
        None => None,
    };

    let (spec, tls, threaded) = args.resolve(config.as_ref())?;
    let socket = make_socket(&spec, tls).await?;

    let server = make_server(socket, demo_app(), threaded);
    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            handle.shutdown();
        }
    });

    server.serve_forever().await?;
    Ok(())
}

/// Placeholder application served by the standalone binary.
fn demo_app() -> Router {
    Router::new()
        .route("/", get(|| async { "Hello world!\n" }))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

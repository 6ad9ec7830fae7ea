use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use totem_ar::{
    api, auth,
    state::AppState,
    trivia::{HttpTriviaApi, TriviaApi, TriviaConfig},
    ws::BridgeConfig,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "totem_ar=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Totem AR bridge...");

    let auth_config = Arc::new(auth::AuthConfig::from_env());
    let bridge_config = BridgeConfig::from_env();
    let trivia_config = TriviaConfig::from_env();

    let trivia = match HttpTriviaApi::new(&trivia_config) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            tracing::error!("Failed to initialize trivia backend client: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        client = trivia.name(),
        backend = %trivia_config.base_url,
        "Trivia backend client initialized"
    );

    let state = Arc::new(AppState::new(
        trivia,
        trivia_config.app_active_default,
        bridge_config,
    ));

    let app = api::router(state, auth_config);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

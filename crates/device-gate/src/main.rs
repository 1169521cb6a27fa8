//! Device Gate - Entry point.

use device_gate::{
    api::{create_router, AppState},
    binding::open_store,
    config::Config,
    notify::TelegramSink,
    origin::IpApiScreen,
    Gate,
};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::sync::Arc;
use telegram_client::TelegramClient;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Device Gate");

    // Initialize binding store
    let store = match open_store(&config.store).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to open binding store: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize origin screen
    let origin = match IpApiScreen::new(&config.origin.api_url, config.origin.timeout) {
        Ok(o) => o,
        Err(e) => {
            error!("Failed to create origin screen: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize Bot API client; without a token it is never called
    let token = config
        .bot_token()
        .cloned()
        .unwrap_or_else(|| SecretString::new(String::new()));
    let telegram = match TelegramClient::new(&config.telegram.api_url, token, config.telegram.timeout)
    {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create Bot API client: {}", e);
            std::process::exit(1);
        }
    };

    let gate = match Gate::new(
        config.bot_token(),
        Arc::new(origin),
        store,
        Arc::new(TelegramSink::new(telegram)),
    ) {
        Ok(g) => Some(g),
        Err(e) => {
            warn!("{}; every verification will answer bot_token_missing", e);
            None
        }
    };

    // Create router
    let app = create_router(AppState::new(gate, config.server.trusted_proxy_count));

    // Bind to address
    let addr = SocketAddr::new(
        config.server.listen_addr.parse().unwrap_or([0, 0, 0, 0].into()),
        config.server.port,
    );

    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Run server; peer addresses feed the origin check
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

//! Little Sprout storefront - cart session service.
//!
//! This binary serves the cart session on port 3000.
//!
//! # Architecture
//!
//! - Axum JSON API over a single [`CartSessionManager`]
//! - `PostgreSQL` for signed-in users' carts and the catalog; in-memory
//!   stores when no database is configured
//! - A JSON file on the device for the anonymous cart
//! - Product route reads cached in memory with moka; cart hydration reads
//!   the catalog directly

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use little_sprout_storefront::auth::{AuthProvider, SessionAuth};
use little_sprout_storefront::catalog::{CatalogProvider, MemoryCatalog};
use little_sprout_storefront::config::StorefrontConfig;
use little_sprout_storefront::db::{self, cart_items::PgCartStore, catalog::PgCatalog};
use little_sprout_storefront::routes;
use little_sprout_storefront::state::AppState;
use little_sprout_storefront::stores::RemoteCartStore;
use little_sprout_storefront::stores::file::FileLocalStore;
use little_sprout_storefront::stores::memory::MemoryCartStore;
use sentry::integrations::tracing as sentry_tracing;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "little_sprout_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p little-sprout-cli -- migrate
    let pool = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url)
                .await
                .expect("Failed to create database pool");
            tracing::info!("Database pool created");
            Some(pool)
        }
        None => {
            tracing::warn!("No database configured, using in-memory cart and catalog");
            None
        }
    };

    let (remote, catalog) = if let Some(pool) = &pool {
        let remote: Arc<dyn RemoteCartStore> = Arc::new(PgCartStore::new(pool.clone()));
        let catalog: Arc<dyn CatalogProvider> = Arc::new(PgCatalog::new(pool.clone()));
        (remote, catalog)
    } else {
        let remote: Arc<dyn RemoteCartStore> = Arc::new(MemoryCartStore::new());
        let catalog: Arc<dyn CatalogProvider> = Arc::new(MemoryCatalog::default());
        (remote, catalog)
    };

    let local = Arc::new(FileLocalStore::new(&config.local_cart_dir));
    tracing::info!(path = %local.path().display(), "Using local cart record");

    let state = AppState::assemble(
        config.clone(),
        remote,
        local,
        catalog,
        SessionAuth::new(),
        pool,
    );
    let cart = state.cart().clone();

    // Subscribe before the initial load so no identity change is missed
    let identity = state.auth().subscribe();
    if !cart.initialize(state.auth()).await {
        tracing::warn!("Initial cart load failed, starting with an empty cart");
    }
    let listener_task = cart.spawn_auth_listener(identity, shutdown_signal());

    let app = routes::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    // Start server
    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    if let Err(e) = listener_task.await {
        tracing::error!(error = %e, "Auth listener task failed");
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

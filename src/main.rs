use axum::Router;
use clap::Parser;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::path::PathBuf;
use std::sync::Arc;

use love365::config::{Config, StorageConfig};
use love365::db::{AppState, create_pool, init_db, queries};
use love365::email::EmailService;
use love365::handlers;
use love365::payments::{AbacatePayClient, PaymentGateway};
use love365::storage::{BucketStore, LocalFsStore, PhotoStore, RetryPolicy};

#[derive(Parser, Debug)]
#[command(name = "love365")]
#[command(about = "Personalized anniversary pages with PIX checkout")]
struct Cli {
    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Photo store for the configured backend, plus the directory to serve under
/// `/uploads` when photos live on local disk.
fn build_photo_store(config: &Config) -> (Arc<dyn PhotoStore>, Option<PathBuf>) {
    match &config.storage {
        StorageConfig::Local { dir } => {
            let root = PathBuf::from(dir);
            let public_base = format!("{}/uploads", config.base_url);
            (Arc::new(LocalFsStore::new(root.clone(), &public_base)), Some(root))
        }
        StorageConfig::Bucket {
            endpoint,
            bucket,
            token,
            public_url,
        } => (
            Arc::new(BucketStore::new(
                endpoint.clone(),
                bucket.clone(),
                token.clone(),
                public_url.clone(),
                RetryPolicy::default(),
            )),
            None,
        ),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "love365=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
        let count = queries::count_orders(&conn).expect("Failed to count orders");
        tracing::info!("Database ready: {} ({} orders)", config.database_path, count);
    }

    let (photos, uploads_dir) = build_photo_store(&config);
    tracing::info!("Photo storage: {}", photos.backend_tag());

    let payments: Option<Arc<dyn PaymentGateway>> = match &config.abacatepay_api_key {
        Some(key) => Some(Arc::new(AbacatePayClient::new(
            key.clone(),
            Some(config.abacatepay_api_url.clone()),
        ))),
        None => {
            tracing::warn!("ABACATEPAY_API_KEY not set: intake will skip checkout and return the page URL");
            None
        }
    };

    if config.resend_api_key.is_none() {
        tracing::warn!("RESEND_API_KEY not set: page ready emails will not be sent");
    }
    if config.abacatepay_webhook_secret.is_none() {
        tracing::warn!("ABACATEPAY_WEBHOOK_SECRET not set: webhook accepts unauthenticated calls");
    }

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        photos,
        payments,
        notifier: Arc::new(EmailService::new(
            config.resend_api_key.clone(),
            config.email_from.clone(),
        )),
        webhook_secret: config.abacatepay_webhook_secret.clone(),
        intake_timeout: config.intake_timeout,
    };

    let mut app = Router::new()
        // Form intake and public page lookups (rate limited per IP)
        .merge(handlers::public::router(config.rate_limit))
        // Gateway notifications (optional shared secret)
        .merge(handlers::webhooks::router());

    if let Some(dir) = uploads_dir {
        tracing::info!("Serving uploaded photos from {}", dir.display());
        app = app.nest_service("/uploads", ServeDir::new(dir));
    }

    let app = app.layer(handlers::trace_layer()).with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cli.ephemeral && !config.dev_mode {
        tracing::warn!("--ephemeral ignored: not in dev mode (set APP_ENV=dev)");
    }
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Love365 server listening on {} (public URL {})", addr, config.base_url);

    // Use into_make_service_with_connect_info to enable IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        // Also remove WAL and SHM files if they exist
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}

use bodyguard::db::{CheckStore, MemoryCheckStore, PgCheckStore};
use bodyguard::server::change_feed::ChangeFeedPublisher;
use bodyguard::server::config::ServerConfig;
use bodyguard::server::feed_hub::FeedHub;
use bodyguard::server::monitor_loop::MonitorLoop;
use bodyguard::server::prober::Prober;

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

/// `RUST_LOG` wins over the configured `log_filter`.
fn init_logging(config: &ServerConfig) {
    let file_appender = rolling::daily(&config.log_dir, "bodyguard.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn open_store(
    config: &ServerConfig,
) -> Result<Arc<dyn CheckStore>, Box<dyn std::error::Error + Send + Sync>> {
    match config.database_url.as_deref() {
        Some(database_url) => {
            let store = PgCheckStore::connect(database_url, 10).await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL is not set. Checks are kept in memory and lost on restart.");
            Ok(Arc::new(MemoryCheckStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = ServerConfig::load(args.config.as_deref())?;
    init_logging(&config);
    info!(version = VERSION, "Starting website bodyguard.");

    // --- Check Store ---
    let store = open_store(&config).await.map_err(|e| {
        error!(error = %e, "Failed to open the check store.");
        e
    })?;

    // --- Monitor Loop ---
    let prober = Prober::new(config.probe_settings())?;
    let monitor = Arc::new(MonitorLoop::new(
        Arc::new(prober),
        store.clone(),
        config.probe_interval(),
    ));

    // --- Change Feed ---
    let feed_hub = FeedHub::default();
    let publisher_task =
        ChangeFeedPublisher::new(store.clone(), feed_hub.clone(), monitor.subscribe_target())
            .with_interval(config.feed_interval())
            .run();

    // --- Axum HTTP Server ---
    let app = bodyguard::web::create_axum_router(monitor.clone(), store, feed_hub);
    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Website bodyguard is ready.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    publisher_task.abort();
    monitor.stop();
    info!("Server stopped.");
    Ok(())
}

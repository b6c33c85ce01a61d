use roomstock::orchestration::{CalendarAggregator, CalendarConfig};
use roomstock::{api, config::Config, db::init_db, BatchWriter, BookingSource, Repository, SqliteBookingSource};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::with_batch_writer(
        pool,
        BatchWriter::new(config.batch_max_params),
    ));
    let bookings: Arc<dyn BookingSource> = Arc::new(SqliteBookingSource::new(repo.clone()));
    let calendar = Arc::new(CalendarAggregator::new(
        repo.clone(),
        bookings,
        CalendarConfig::from(&config),
    ));

    tracing::info!(
        batch_max_params = config.batch_max_params,
        calendar_window_days = config.calendar_window_days,
        failure_policy = ?config.calendar_failure_policy,
        "Ledger configured"
    );

    // Create router
    let app = api::create_router(api::AppState::new(repo, config, calendar));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}

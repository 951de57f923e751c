use clap::Parser;
use dotenv::dotenv;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::env;
use std::sync::Arc;
use tera::Tera;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sheetwatch::server::config::ServerConfig;
use sheetwatch::services::identity_service::HttpIdentityProvider;
use sheetwatch::sheets::fetcher::{HttpProber, MetadataFetcher};
use sheetwatch::sheets::metadata::GoogleSheetsApi;
use sheetwatch::web::{self, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "sheetwatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    dotenv().ok();

    let config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir);
    info!("Starting sheetwatch server");

    // --- Database Pool Setup ---
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in .env file");
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(10);

    let db: DatabaseConnection = match Database::connect(opt).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to create database connection: {}", e);
            return Err(e.into());
        }
    };

    // --- External clients, constructed once and injected ---
    let identity = Arc::new(HttpIdentityProvider::new(
        &config.identity_api_url,
        &config.identity_api_key,
    ));
    let provider = Arc::new(GoogleSheetsApi::new(
        &config.drive_api_url,
        &config.sheets_api_url,
        &config.spreadsheet_api_key,
    ));
    let fetcher = Arc::new(MetadataFetcher::new(provider, Arc::new(HttpProber::new())));

    let templates = Tera::new(&format!("{}/**/*.html", config.templates_dir))?;

    let state = Arc::new(AppState {
        db,
        identity,
        fetcher,
        templates,
        config: config.clone(),
    });

    let router = web::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("HTTP server listening on {}", config.listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

//! spam-rs: Spam classification server
//!
//! Serves text, image (OCR) and fused spam classification over HTTP.

use clap::Parser;
use spam_rs::api::{ApiServer, AppState};
use spam_rs::classifier::load_classifier;
use spam_rs::config::{Config, LoggingConfig};
use spam_rs::fusion::ScoreFusion;
use spam_rs::ocr::build_extractor;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "spam-rs")]
#[command(about = "Text and image spam classification server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting spam-rs v{}", env!("CARGO_PKG_VERSION"));
    match &cli.config {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No config file specified, using defaults and environment"),
    }

    // Model load failures leave the server up in degraded mode
    let classifier = load_classifier(&config.classifier);
    if !classifier.is_ready() {
        warn!("Classifier unavailable; inference endpoints will return 500");
    }

    let extractor = build_extractor(&config.ocr)?;

    let fusion = ScoreFusion::new(config.fusion.clone());
    info!(
        "Fusion weights: text {:?}, image {:?}, combined threshold {}",
        config.fusion.text, config.fusion.image, config.fusion.combined_threshold
    );

    let state = AppState {
        classifier,
        extractor,
        fusion,
    };

    let server = ApiServer::new(state, &config.server);
    server.run().await?;

    Ok(())
}

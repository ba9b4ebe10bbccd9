//! This file defines the statcube binary entry point.

use statcube::app;
use statcube::cli;
use statcube::metrics;
use statcube::server;
use statcube::tracing;

use ::tracing::{event, Level};

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing();
    event!(Level::DEBUG, "{:?}", args);
    if let Err(err) = metrics::register_metrics() {
        event!(Level::ERROR, "failed to register metrics: {}", err);
    }
    if let Err(err) = app::init(&args) {
        event!(Level::ERROR, "failed to initialise Rayon: {}", err);
        std::process::exit(1);
    }
    let service = app::service(&args);
    server::serve(&args, service).await;
}

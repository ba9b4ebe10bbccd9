//! Web server

use crate::cli;

use std::{net::SocketAddr, path::PathBuf, process::exit, str::FromStr, time::Duration};

use axum::ServiceExt;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use expanduser::expanduser;
use tokio::signal;
use tracing::{event, Level};

/// Log an error and exit.
fn fail(message: String) -> ! {
    event!(Level::ERROR, "{}", message);
    exit(1)
}

/// Returns the absolute path of a TLS file, exiting if it cannot be found.
///
/// # Arguments
///
/// * `path`: Path to the file, which may start with `~`
/// * `kind`: Kind of file, used in error messages
fn tls_file(path: &str, kind: &str) -> PathBuf {
    let expanded = expanduser(path).unwrap_or_else(|err| {
        fail(format!(
            "Failed to expand ~ in {} file path '{}': {}. Please provide an absolute path instead.",
            kind, path, err
        ))
    });
    if !expanded.exists() {
        fail(format!(
            "TLS {} file expected at '{}' but not found.",
            kind,
            expanded.display()
        ))
    }
    expanded.canonicalize().unwrap_or_else(|err| {
        fail(format!(
            "Failed to determine absolute path to TLS {} file: {}",
            kind, err
        ))
    })
}

/// Serve the statcube service
///
/// # Arguments
///
/// * `args`: Command line arguments
/// * `service`: The [crate::app::Service] to serve
pub async fn serve(args: &cli::CommandLineArgs, service: crate::app::Service) {
    let addr = SocketAddr::from_str(&format!("{}:{}", args.host, args.port)).unwrap_or_else(|err| {
        fail(format!(
            "Invalid host name, IP address or port number '{}:{}': {}",
            args.host, args.port, err
        ))
    });

    // Catch ctrl+c and try to shutdown gracefully
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(
        handle.clone(),
        args.graceful_shutdown_timeout,
    ));

    let result = if args.https {
        let cert_file = tls_file(&args.cert_file, "certificate");
        let key_file = tls_file(&args.key_file, "key");
        let tls_config = RustlsConfig::from_pem_file(cert_file, key_file)
            .await
            .unwrap_or_else(|err| fail(format!("Failed to load TLS certificate files: {}", err)));
        event!(Level::INFO, "listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(service.into_make_service())
            .await
    } else {
        event!(Level::INFO, "listening on http://{}", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(service.into_make_service())
            .await
    };
    if let Err(err) = result {
        fail(format!("Server error: {}", err))
    }
}

/// Graceful shutdown handler
///
/// Installs signal handlers to catch Ctrl-C or SIGTERM and trigger a graceful shutdown.
async fn shutdown_signal(handle: Handle, timeout: u64) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    event!(
        Level::INFO,
        "signal received, starting graceful shutdown (timeout {}s)",
        timeout
    );
    handle.graceful_shutdown(Some(Duration::from_secs(timeout)));
}

//! Command Line Interface (CLI) arguments.

use clap::Parser;
use url::Url;

/// Statcube command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "STATCUBE_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8080, env = "STATCUBE_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "STATCUBE_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/statcube/certs/cert.pem",
        env = "STATCUBE_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/statcube/certs/key.pem",
        env = "STATCUBE_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for requests to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "STATCUBE_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Whether to use Rayon for execution of CPU-bound tasks.
    #[arg(long, default_value_t = false, env = "STATCUBE_USE_RAYON")]
    pub use_rayon: bool,
    /// Maximum number of concurrently executing transformations.
    /// Defaults to the number of CPUs minus one.
    #[arg(long, env = "STATCUBE_THREAD_LIMIT")]
    pub thread_limit: Option<usize>,
    /// Maximum number of cells of a cube that may be transformed.
    #[arg(long, env = "STATCUBE_MAX_CELLS")]
    pub max_cells: Option<usize>,
    /// Base URL of the statistical data API
    #[arg(
        long,
        default_value = "https://ws.cso.ie/public",
        env = "STATCUBE_API_BASE_URL"
    )]
    pub api_base_url: Url,
    /// Default language code for data API queries
    #[arg(long, default_value = "en", env = "STATCUBE_LANGUAGE")]
    pub language: String,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CommandLineArgs::parse_from(["statcube"]);
        assert_eq!("0.0.0.0", args.host);
        assert_eq!(8080, args.port);
        assert!(!args.https);
        assert!(!args.use_rayon);
        assert_eq!(None, args.max_cells);
        assert_eq!("https://ws.cso.ie/public", args.api_base_url.as_str());
        assert_eq!("en", args.language);
    }

    #[test]
    fn limits() {
        let args = CommandLineArgs::parse_from([
            "statcube",
            "--thread-limit",
            "2",
            "--max-cells",
            "1000",
            "--use-rayon",
        ]);
        assert_eq!(Some(2), args.thread_limit);
        assert_eq!(Some(1000), args.max_cells);
        assert!(args.use_rayon);
    }

    #[test]
    fn invalid_api_base_url() {
        let result = CommandLineArgs::try_parse_from(["statcube", "--api-base-url", "not a url"]);
        assert!(result.is_err());
    }
}

pub mod config;
pub mod detector;
pub mod emotion;
pub mod error;
pub mod protocol;
pub mod server;
pub mod service;
pub mod torch;
pub mod vision;

/// Process-level helpers
pub mod util {
    use tracing_subscriber::EnvFilter;

    /// Install the global `tracing` subscriber. `RUST_LOG` takes precedence
    /// over `default_filter`. Records emitted through `log` (actix's access
    /// logger) are forwarded to the subscriber.
    pub fn init_tracing(default_filter: &str) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

}

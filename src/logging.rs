use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

/// Installs the global subscriber. Output always goes to stderr: stdout
/// carries protocol responses.
pub fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new("gradebookd=warn"));
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

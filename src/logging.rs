use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{config::LogFormat, GatewayError, Result};

/// Sets up the logging subscriber for the gateway.
///
/// `RUST_LOG` takes precedence; otherwise the crate and the HTTP trace layer
/// log at INFO.
pub fn init_logger(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{name}={level},tower_http={level}",
            name = env!("CARGO_CRATE_NAME"),
            level = Level::INFO
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_level(true)
                    .with_ansi(true)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };

    result.map_err(|e| GatewayError::Internal(format!("Failed to initialize logger: {}", e)))
}

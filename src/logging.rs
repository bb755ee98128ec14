//! # Structured Logging Module
//!
//! Environment-aware structured logging for the command execution pipeline.
//! Initialization is idempotent so library embedders that already installed
//! a subscriber keep theirs.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults.
///
/// `RUST_LOG` wins when set; otherwise the level is derived from the
/// detected environment (debug outside production, info in production).
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = detect_environment();
        let default_level = default_log_level(&environment);

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level.clone()));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter),
        );

        // A global subscriber may already be installed by the host process.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized, keeping existing");
        } else {
            tracing::info!(
                environment = %environment,
                level = %default_level,
                "structured logging initialized"
            );
        }
    });
}

/// Detect the current runtime environment from environment variables
fn detect_environment() -> String {
    std::env::var("RCMD_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Default log level for an environment when `RUST_LOG` is unset
fn default_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for command lifecycle operations
pub fn log_command_operation(
    operation: &str,
    command_id: Option<i64>,
    target_host: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        command_id = command_id,
        target_host = target_host,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "COMMAND_OPERATION"
    );
}

/// Log structured data for remote session operations
pub fn log_session_operation(
    operation: &str,
    host: &str,
    attempt: Option<u32>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        host = %host,
        attempt = attempt,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "SESSION_OPERATION"
    );
}

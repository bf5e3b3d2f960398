//! Logging setup and structured stdout records.
//!
//! Diagnostics go through `tracing` to stderr. Stdout carries exactly one
//! pretty-printed JSON record per command so it can be piped into other tools.

use anyhow::Context;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global `tracing` subscriber.
///
/// Falls back to `warn` when the directive does not parse. Calling this twice
/// returns an error from the subscriber registry.
pub fn init(filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")
}

/// Render a record the way the CLI prints it.
pub fn render_record<T: Serialize>(record: &T) -> String {
    serde_json::to_string_pretty(record).unwrap_or_else(|err| {
        serde_json::json!({ "status": "error", "message": err.to_string() }).to_string()
    })
}

/// Print a record on stdout.
pub fn emit_record<T: Serialize>(record: &T) {
    println!("{}", render_record(record));
}

/// Uniform failure record.
#[derive(Debug, Serialize)]
pub struct ErrorRecord {
    pub status: &'static str,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}

impl From<&anyhow::Error> for ErrorRecord {
    fn from(err: &anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

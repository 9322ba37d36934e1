use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use crate::Result;

static SUBSCRIBER: OnceLock<std::result::Result<(), String>> = OnceLock::new();

#[derive(Debug, Serialize)]
pub struct LogEvent<'a> {
    pub filename: &'a str,
    pub timestamp: DateTime<Utc>,
    pub component: &'a str,
    pub function: &'a str,
    pub stage: &'a str,
    pub line_num: u32,
    pub error: Option<&'a str>,
    pub rows: Option<usize>,
    pub message: &'a str,
}

/// Initialize a tracing subscriber emitting one JSON record per pipeline event.
///
/// Calling this function multiple times is safe; only the first invocation installs the
/// subscriber. Verbosity is taken from `RUST_LOG`, defaulting to `info`.
pub fn init_logging() -> Result<()> {
    let result = SUBSCRIBER.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_target(false)
            .try_init()
            .map_err(|error| error.to_string())?;

        Ok(())
    });

    match result {
        Ok(()) => Ok(()),
        Err(message) => Err(anyhow!(message.clone())),
    }
}

/// Emit a structured event for one pipeline step. `rows` carries the number of
/// records the step produced or discarded, where that is meaningful.
#[allow(clippy::too_many_arguments)]
pub fn log_event(
    filename: &str,
    component: &str,
    function: &str,
    stage: &str,
    line_num: u32,
    message: &str,
    error: Option<&str>,
    rows: Option<usize>,
) {
    let event = LogEvent {
        filename,
        timestamp: Utc::now(),
        component,
        function,
        stage,
        line_num,
        error,
        rows,
        message,
    };

    if let Ok(serialized) = serde_json::to_string(&event) {
        info!(target: "salescope", json = %serialized);
    } else {
        info!(target: "salescope", message);
    }
}

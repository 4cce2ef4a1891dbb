//! Tracing setup for hosts embedding the switcher.
//!
//! Levels come from `[logging]` in the settings file; `RUST_LOG`, when set,
//! replaces them entirely.
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! projswitch::switching = "debug"
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Wall-clock time without the date.
struct ClockTime;

impl FormatTime for ClockTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// `default,target=level,...` with targets in a stable order.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut overrides: Vec<_> = config.modules.iter().collect();
    overrides.sort();

    std::iter::once(config.default.clone())
        .chain(overrides.into_iter().map(|(target, level)| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(filter_directives(config)),
    }
}

/// Install the global subscriber. Later calls are no-ops, and so is the
/// first one when the host already installed its own subscriber.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_timer(ClockTime)
            .with_filter(env_filter(config));

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("[logging] subscriber already installed by host");
        }
    });
}

pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// `[component] event: detail` at info level.
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Same shape as [`log_event!`] at debug level.
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

//! Tracing setup for the daemon.
//!
//! Console output always; release builds also write a daily-rotated file
//! under [`paths::log_dir`], which follows `SCOREWORLD_CONFIG_DIR`.

use crate::infrastructure::config::paths;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const LOG_FILE_PREFIX: &str = "scoreworld.log";

/// Our own crate at the given level, dependencies (mongodb driver, rusqlite)
/// one notch quieter.
fn default_directives(is_production: bool) -> &'static str {
    if is_production {
        "warn,scoreworld=info"
    } else {
        "info,scoreworld=debug"
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer(log_dir: &Path) -> Option<BoxedLayer> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: cannot create log directory {:?}: {}", log_dir, e);
        return None;
    }

    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
    Some(
        fmt::layer()
            .with_ansi(false)
            .with_writer(appender)
            .with_filter(EnvFilter::new(default_directives(true)))
            .boxed(),
    )
}

/// Installs the global subscriber. `RUST_LOG` overrides the console filter.
///
/// A second call, or a subscriber installed by a test harness, is left in
/// place.
pub fn setup(is_production: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(is_production)));

    let mut layers: Vec<BoxedLayer> = vec![fmt::layer().with_target(true).with_filter(filter).boxed()];
    let log_dir = paths::log_dir();
    if is_production {
        layers.extend(file_layer(&log_dir));
    }

    if tracing_subscriber::registry().with(layers).try_init().is_err() {
        return;
    }

    if is_production {
        tracing::info!("Writing logs to {:?}", log_dir);
    }
    tracing::debug!("Logging initialized (production={})", is_production);
}

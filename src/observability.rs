//! Logging hooks for the block pipeline.
//!
//! Library code logs through the `log` facade. `log_metric!` adds structured
//! key/value lines for segment-level events; it is compiled out of release
//! builds. `enable_verbose_logging` installs an `env_logger` backend for hosts
//! that do not bring their own.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Once;

use log::LevelFilter;

use crate::error::BlockError;

/// Logs a structured key-value metric line at debug level, only in debug builds.
///
/// # Example
/// ```
/// use blockzstd::log_metric;
/// let index = 2;
/// log_metric!("event"="segment_done", "index"=&index);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+

            log::debug!("BLOCKZSTD_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` at `Info` level, once per process.
///
/// With `log_file`, records are appended to that file instead of stderr.
/// Later calls are no-ops, as is installation when another logger is
/// already registered.
pub fn enable_verbose_logging(log_file: Option<&Path>) -> Result<(), BlockError> {
    let file = match log_file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };

    INIT_LOGGER.call_once(move || {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(LevelFilter::Info);

        // Custom formatter: just print the level and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}

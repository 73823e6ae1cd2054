//! Logging setup.
//!
//! The library logs through the `log` facade; the binary installs an
//! `env_logger` backend here. The level comes from, in priority order:
//!
//! 1. `RUST_LOG` (if set)
//! 2. `--quiet` (errors only) or `-v` / `-vv` (debug / trace)
//! 3. info
//!
//! Per-file decisions are logged at debug, walker filtering at trace.
//!
//! ```rust,no_run
//! use tombraider::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible with -v");
//! ```

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

const CRATE_PREFIX: &str = "tombraider::";

/// Install the logger for the given CLI flags.
///
/// Later calls are ignored, so the binary and tests can both call it.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();
    let from_env = env::var("RUST_LOG").is_ok();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }
    configure_format(&mut builder, verbose);

    if builder.try_init().is_err() {
        return;
    }
    if from_env {
        log::debug!("Log level taken from RUST_LOG");
    } else {
        log::debug!("Log level {}", determine_level(verbose, quiet));
    }
}

/// Map CLI flags to a level; `quiet` wins over `verbose`.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// Module path without the crate name, for shorter lines.
fn short_target(target: &str) -> &str {
    target.strip_prefix(CRATE_PREFIX).unwrap_or(target)
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    // Debug builds: timestamp, and the module once -v is given.
    #[cfg(debug_assertions)]
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        let timestamp = buf.timestamp_seconds();
        if verbose >= 1 {
            writeln!(
                buf,
                "{timestamp} {style}{level:<5}{style:#} [{}] {}",
                short_target(record.target()),
                record.args()
            )
        } else {
            writeln!(buf, "{timestamp} {style}{level:<5}{style:#} {}", record.args())
        }
    });

    // Release builds: level and message only.
    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let style = buf.default_level_style(level);
            writeln!(buf, "{style}{level:<5}{style:#} {}", record.args())
        });
    }
}

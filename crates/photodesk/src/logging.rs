//! Logging initialization.
//!
//! Logs go to stderr; stdout carries JSON results.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_directive` when set.
pub fn init(default_directive: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Install the subscriber from the `[logging]` section, with CLI overrides.
pub fn init_from_config(config: &photodesk_core::Config, verbose: bool, json_logs: bool) {
    init(
        &directive(&config.logging.level, verbose),
        json_logs || config.logging.format == "json",
    );
}

/// Library logs follow the configured level; `--verbose` raises it to debug
/// without lowering an already more detailed setting.
fn directive(level: &str, verbose: bool) -> String {
    let level = match (verbose, level) {
        (true, "trace") => "trace",
        (true, _) => "debug",
        (false, level) => level,
    };
    format!("{level},photodesk_core={level},photodesk={level}")
}

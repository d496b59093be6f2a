//! Tracing initialization
//!
//! Structured logging for the whole service. The filter comes from `RUST_LOG`
//! when set, otherwise from `LOG_LEVEL`; `LOG_FORMAT=json` switches the
//! formatter to machine-readable output.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(level.to_lowercase())
    });

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    if use_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

//! Logging setup for the `lmkernel` binary.
//!
//! Cell output owns stdout, so every log line goes to stderr. `RUST_LOG`
//! wins over the configured `log.level` when it is set.

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `default_filter` applies unless `RUST_LOG`
/// is set; `log_json` switches to one JSON object per line for log
/// aggregation.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let output = fmt::layer().with_writer(std::io::stderr);
    let output = if log_json {
        output.json().boxed()
    } else {
        output.boxed()
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .init();
}

/// Filter directives enabling `level` for every lmkernel crate.
pub fn default_filter(level: &str) -> String {
    format!(
        "lmkernel={level},lmkernel_core={level},lmkernel_relay={level},lmkernel_kernel={level}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_all_crates() {
        let filter = default_filter("debug");
        assert!(filter.contains("lmkernel=debug"));
        assert!(filter.contains("lmkernel_core=debug"));
        assert!(filter.contains("lmkernel_relay=debug"));
        assert!(filter.contains("lmkernel_kernel=debug"));
    }

    #[test]
    fn default_filter_is_valid_directive_list() {
        assert!(EnvFilter::try_new(default_filter("warn")).is_ok());
    }
}

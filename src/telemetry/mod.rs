use tracing_subscriber::{fmt, EnvFilter};

/// Installs the process-wide tracing subscriber used by the shardkv
/// binaries. `RUST_LOG` overrides the default `info` filter.
pub fn init_telemetry() {
    let level_filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info"));
    fmt().with_env_filter(level_filter).init();
}

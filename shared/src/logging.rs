use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Routes `tracing` output to the test harness. `RUST_LOG` overrides the
/// default `debug` filter. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NONE)
        .with_test_writer()
        .try_init();
}

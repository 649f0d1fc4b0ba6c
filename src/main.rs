//! Fixture harness CLI entry point

fn main() {
    // Logs go to stderr so JSON reports on stdout stay parseable
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    fixture_harness::cli::run();
}

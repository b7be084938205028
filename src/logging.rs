use tracing_subscriber::EnvFilter;

/// Console logging for the CLI, on stderr so stdout stays clean for
/// `--format json`.
///
/// `RUST_LOG` wins when set; otherwise the `-v` count picks the level
/// (`warn`, `info`, `debug`, `trace`).
pub fn init_cli(verbosity: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

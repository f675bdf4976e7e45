// Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise this crate logs at `info`, or `debug`
/// when `verbose`. Calling it again is a no-op.
pub fn init(verbose: bool) {
    let default = if verbose {
        "waffle_planner=debug"
    } else {
        "waffle_planner=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

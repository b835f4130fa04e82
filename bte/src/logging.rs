//! Diagnostic tracing for the engine.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Diagnostics via `RUST_LOG` or `-d`, output to
//!   stderr. Never mixed into the tree's own output.
//!
//! - **`exec` output**: Subprocess output streamed to stdout by the `exec`
//!   action, unaffected by the log level.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// With `debug` set, every node evaluation is traced (`bte=trace`).
/// Otherwise reads `RUST_LOG`, defaulting to `warn`.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=bte=debug bte tree.xml
/// ```
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::new("bte=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

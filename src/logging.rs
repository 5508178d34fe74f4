//! Log output setup
//!
//! Logs go to stderr so stdout stays free for anything piped from the
//! process. `RUST_LOG` overrides the configured level, e.g.
//! `RUST_LOG=chat_relay=debug`.

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to `level`
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Formatting subscriber writing to `writer`
pub fn subscriber<W>(filter: EnvFilter, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish()
}

/// Install the stderr subscriber for the whole process
pub fn init(level: &str) {
    subscriber(filter(level), std::io::stderr).init();
}

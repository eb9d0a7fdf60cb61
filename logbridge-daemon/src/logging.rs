//! Logging initialization for the log forwarder daemon.
//!
//! Configures `tracing-subscriber` based on the `[general]` section
//! of `BridgeConfig`. Output goes to stdout with a timestamp on every line.
//! The daemon runs inside the [`DAEMON_SPAN`] span, so every status line
//! carries the same `log_forwarder` prefix.
//!
//! Until the configured subscriber exists, [`bootstrap_subscriber`] keeps
//! warnings raised while resolving the configuration from being lost.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logbridge_core::config::GeneralConfig;

/// Name of the span that wraps the whole daemon run.
pub const DAEMON_SPAN: &str = "log_forwarder";

/// Build a temporary subscriber for use before [`init_tracing`].
///
/// Install it with `tracing::subscriber::set_default` while loading the
/// configuration. `RUST_LOG` is honored, otherwise only warnings and errors pass.
pub fn bootstrap_subscriber<W>(writer: W) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(env_filter)
        .with_writer(writer)
        .finish()
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` takes precedence over `config.log_level`.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines
/// * `"pretty"` - Multi-line human-readable output (for development)
/// * `"compact"` - Single-line human-readable output (default)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        "compact" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact().with_target(false))
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize compact tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json', 'pretty' or 'compact'",
                config.log_format
            ));
        }
    }

    Ok(())
}

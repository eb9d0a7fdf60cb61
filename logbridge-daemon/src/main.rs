use anyhow::Result;
use clap::Parser;
use tracing::Instrument;

use logbridge_daemon::cli::DaemonCli;
use logbridge_daemon::logging::{self, DAEMON_SPAN};
use logbridge_daemon::{Daemon, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // Env override warnings are emitted before the configured subscriber exists.
    let config = {
        let _bootstrap =
            tracing::subscriber::set_default(logging::bootstrap_subscriber(std::io::stderr));
        load_config(&cli).await?
    };
    logging::init_tracing(&config.general)?;

    let span = tracing::info_span!(DAEMON_SPAN);
    async move {
        if cli.validate {
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
            tracing::info!("configuration is valid");
            return Ok(());
        }

        tracing::info!(version = env!("CARGO_PKG_VERSION"), "log forwarder starting");

        let daemon = Daemon::build_from_config(config).await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to start");
        })?;

        daemon.run().await.inspect_err(|e| {
            tracing::error!(error = %e, "log forwarder terminated");
        })
    }
    .instrument(span)
    .await
}

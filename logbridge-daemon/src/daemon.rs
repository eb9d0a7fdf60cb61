//! Daemon lifecycle -- configuration, broker session, log source and shutdown.
//!
//! The [`Daemon`] is the top-level coordinator. It validates the configuration
//! before touching the network or spawning anything, then:
//!
//! 1. Connects to the MQTT broker (fresh UUID v4 client id)
//! 2. Spawns `journalctl -u <unit> -f -n 0`
//! 3. Runs the forwarding pipeline until the source closes, the connection
//!    is lost, or a shutdown signal arrives
//! 4. Disconnects from the broker within the configured grace period
//!
//! # Exit Policy
//!
//! Every stop other than a signal-initiated shutdown is an error. This
//! includes the log source closing its stream, because a forwarder
//! has no successful terminal state of its own.

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logbridge_core::config::BridgeConfig;
use logbridge_core::error::BridgeError;
use logbridge_forwarder::{
    ConnectionHandlers, ForwardPipelineBuilder, ForwarderClient, ForwarderConfig, PipelineExit,
    ProcessSource, SourceCommand,
};

use crate::cli::DaemonCli;
use crate::metrics_server;

/// Resolve the effective configuration from the CLI.
///
/// Layers: defaults, optional TOML file, environment variables, CLI overrides.
/// The result is not validated yet so logging can be set up first.
pub async fn load_config(cli: &DaemonCli) -> Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?,
        None => BridgeConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }

    Ok(config)
}

/// The log forwarder daemon.
pub struct Daemon {
    /// Validated configuration.
    config: BridgeConfig,
    /// Forwarder settings derived from `config`.
    forwarder: ForwarderConfig,
    /// Connection event handlers passed to the broker session.
    handlers: ConnectionHandlers,
}

impl Daemon {
    /// Build from an already-resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A required value (broker URL, unit) is missing
    /// - Any other configuration value is invalid
    /// - The metrics endpoint is enabled and cannot be installed
    pub async fn build_from_config(config: BridgeConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let forwarder = ForwarderConfig::from_core(&config)
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        tracing::debug!(
            unit = %forwarder.unit,
            topic = %forwarder.publish.topic,
            split_mode = ?forwarder.split_mode,
            "daemon configured"
        );

        Ok(Self {
            config,
            forwarder,
            handlers: ConnectionHandlers::new(),
        })
    }

    /// Replace the connection event handlers.
    pub fn with_handlers(mut self, handlers: ConnectionHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Run until a fatal error or a shutdown signal.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(self) -> Result<()> {
        let shutdown = CancellationToken::new();
        let listener = spawn_signal_listener(shutdown.clone())?;
        let result = self.run_until(shutdown).await;
        listener.abort();
        result
    }

    /// Run until a fatal error or until `shutdown` is cancelled.
    pub async fn run_until(self, shutdown: CancellationToken) -> Result<()> {
        let Self {
            forwarder,
            handlers,
            ..
        } = self;

        let (client, mut connection) =
            ForwarderClient::connect(&forwarder.broker, forwarder.publish.clone(), handlers)
                .await
                .map_err(BridgeError::from)?;

        let grace = forwarder.broker.disconnect_grace;
        let source = match SourceCommand::journal_follow(&forwarder.program, &forwarder.unit)
            .and_then(|command| ProcessSource::spawn(command, forwarder.read_chunk_size))
        {
            Ok(source) => source,
            Err(e) => {
                if let Err(disconnect_err) = client.disconnect(grace).await {
                    tracing::warn!(error = %disconnect_err, "failed to disconnect from broker");
                }
                return Err(BridgeError::from(e).into());
            }
        };

        let mut pipeline = ForwardPipelineBuilder::new(client)
            .config(forwarder)
            .build()
            .map_err(BridgeError::from)?;

        let outcome = pipeline.run(source, &mut connection, &shutdown).await;
        let stats = pipeline.stats();

        if let Err(e) = pipeline.shutdown().await {
            tracing::warn!(error = %e, "failed to disconnect from broker");
        }

        tracing::info!(
            chunks = stats.chunks,
            lines = stats.lines,
            published = stats.published,
            dropped = stats.dropped,
            "log forwarder stopped"
        );

        match outcome {
            Ok(PipelineExit::Shutdown) => Ok(()),
            Ok(PipelineExit::SourceClosed) => Err(anyhow::anyhow!("log source stream closed")),
            Err(e) => Err(BridgeError::from(e).into()),
        }
    }

    /// Get a reference to the validated configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Get a reference to the derived forwarder settings.
    pub fn forwarder_config(&self) -> &ForwarderConfig {
        &self.forwarder
    }
}

/// Cancel `shutdown` on the first SIGTERM or SIGINT.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
fn spawn_signal_listener(shutdown: CancellationToken) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal = name, "shutdown signal received");
        shutdown.cancel();
    }))
}

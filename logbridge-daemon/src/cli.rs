//! CLI argument definitions for the log forwarder daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Forwards the journal of one systemd unit to an MQTT broker.
///
/// The broker URL and the unit name are normally taken from the
/// `CLOUDMQTT_URL` and `LOG_FORWARDER_SYSTEMD_UNIT` environment variables.
#[derive(Parser, Debug)]
#[command(name = "log-forwarder")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to an optional logbridge.toml configuration file.
    ///
    /// Environment variables still override values from the file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty, compact).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without connecting or spawning.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_without_arguments() {
        let cli = DaemonCli::try_parse_from(["log-forwarder"]).unwrap();
        assert!(cli.config.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn parses_all_overrides() {
        let cli = DaemonCli::try_parse_from([
            "log-forwarder",
            "--config",
            "/etc/logbridge/logbridge.toml",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--validate",
        ])
        .unwrap();

        assert_eq!(
            cli.config.as_deref(),
            Some(std::path::Path::new("/etc/logbridge/logbridge.toml"))
        );
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("json"));
        assert!(cli.validate);
    }

    #[test]
    fn clap_definition_is_consistent() {
        use clap::CommandFactory;
        DaemonCli::command().debug_assert();
    }
}

use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::Parser;

use super::config::{parser, SupervisorConfig};
use crate::error::ConfigError;

/// Keeps a fixed-size pool of worker processes alive.
///
/// SIGHUP restarts the whole pool, SIGTERM or SIGINT shuts it down.
#[derive(Parser, Debug)]
#[command(name = "pool-supervisor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of workers to keep running
    #[arg(value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub workers: usize,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Controller polling interval in milliseconds (overrides the config file)
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Worker heartbeat period in seconds (overrides the config file)
    #[arg(long)]
    pub heartbeat_secs: Option<u64>,
}

impl Cli {
    /// Loads the config file if one was given and applies command line overrides.
    pub fn settings(&self) -> Result<SupervisorConfig, ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => parser(path)?,
            None => SupervisorConfig::default(),
        };
        if let Some(tick_ms) = self.tick_ms {
            cfg.tick_ms = tick_ms;
        }
        if let Some(heartbeat_secs) = self.heartbeat_secs {
            cfg.heartbeat_secs = heartbeat_secs;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pool_size_and_overrides() {
        let cli = Cli::try_parse_from(["pool-supervisor", "3", "--tick-ms", "50"]).unwrap();
        assert_eq!(cli.workers, 3);
        let cfg = cli.settings().unwrap();
        assert_eq!(cfg.tick_ms, 50);
        assert_eq!(cfg.heartbeat_secs, 3);
    }

    #[test]
    fn rejects_missing_zero_and_garbage_sizes() {
        assert!(Cli::try_parse_from(["pool-supervisor"]).is_err());
        assert!(Cli::try_parse_from(["pool-supervisor", "0"]).is_err());
        assert!(Cli::try_parse_from(["pool-supervisor", "-2"]).is_err());
        assert!(Cli::try_parse_from(["pool-supervisor", "three"]).is_err());
    }

    #[test]
    fn zero_override_is_rejected() {
        let cli = Cli::try_parse_from(["pool-supervisor", "1", "--heartbeat-secs", "0"]).unwrap();
        assert!(matches!(
            cli.settings(),
            Err(ConfigError::Invalid { field: "heartbeat_secs", .. })
        ));
    }
}

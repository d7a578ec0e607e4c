//! Command-line surface.

use clap::Parser;

use crate::config::Config;
use crate::error::ConfigError;

/// PMTUD relay: rebroadcasts Fragmentation-Needed / Packet-Too-Big ICMP at
/// layer 2 so the correct ECMP/anycast cluster member sees it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Interface to capture and inject on.
    #[arg(long)]
    pub iface: String,

    /// Per-source rate limit (packets/sec), must be > 0.
    #[arg(long, default_value_t = crate::config::DEFAULT_SRC_RATE)]
    pub src_rate: f64,

    /// Aggregate per-interface rate limit (packets/sec), must be > 0.
    #[arg(long, default_value_t = crate::config::DEFAULT_IFACE_RATE)]
    pub iface_rate: f64,

    /// Increase log verbosity. Repeatable: -v, -vv, -vvv.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Parse and rate-limit but never inject.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Pin the process to this CPU core (best effort).
    #[arg(long)]
    pub cpu: Option<usize>,

    /// Only forward when the inner L4 source port is in this comma-separated list.
    #[arg(long, value_delimiter = ',')]
    pub ports: Option<Vec<String>>,
}

impl Cli {
    /// Validates the parsed arguments into an immutable [`Config`].
    ///
    /// A missing interface, a non-positive rate, or a malformed port number
    /// is a fatal configuration error. Clap itself rejects unknown options
    /// before this runs; this handles the remaining semantic checks.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        if self.iface.trim().is_empty() {
            return Err(ConfigError::MissingIface);
        }
        if !(self.src_rate > 0.0) {
            return Err(ConfigError::InvalidSrcRate(self.src_rate));
        }
        if !(self.iface_rate > 0.0) {
            return Err(ConfigError::InvalidIfaceRate(self.iface_rate));
        }

        let ports = self
            .ports
            .map(|raw| {
                raw.iter()
                    .map(|entry| {
                        entry
                            .trim()
                            .parse::<u16>()
                            .map_err(|_| ConfigError::InvalidPort(entry.clone()))
                    })
                    .collect::<Result<Vec<u16>, ConfigError>>()
            })
            .transpose()?;

        Ok(Config {
            iface: self.iface,
            src_rate: self.src_rate,
            iface_rate: self.iface_rate,
            verbosity: self.verbose,
            dry_run: self.dry_run,
            cpu: self.cpu,
            ports,
        })
    }
}

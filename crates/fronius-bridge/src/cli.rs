//! Clap derive structures for the `fronius-bridge` binary.

use std::path::PathBuf;

use clap::Parser;

/// fronius-bridge -- Fronius inverter adapter for a FIMP/MQTT bus
#[derive(Debug, Parser)]
#[command(
    name = "fronius-bridge",
    version,
    about = "Bridge a Fronius inverter onto a FIMP/MQTT bus",
    long_about = "Polls the inverter's Solar API for realtime data, publishes meter\n\
        reports on the bus, and forwards control commands to the inverter's\n\
        digest-protected configuration endpoints."
)]
pub struct Cli {
    /// Work directory; configuration and state live under `data/`
    #[arg(long, short = 'c', env = "FRONIUS_WORKDIR", default_value = ".")]
    pub workdir: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv); overrides the configured level
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Validate configuration and state files, then exit
    #[arg(long)]
    pub check: bool,
}

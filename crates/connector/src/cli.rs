//! Command-line surface (clap derive, `env` support), grounded in the
//! teacher's `cli.rs`: one `Cli` struct, env-overridable flags, a couple of
//! small custom value parsers.

use std::path::PathBuf;

use clap::Parser;

fn default_config_path() -> PathBuf {
    PathBuf::from("/etc/connector/connector.toml")
}

#[derive(Debug, Clone, Parser)]
#[command(name = "connectord", version, about = "Cloud print connector daemon")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short = 'c',
        long,
        env = "CONNECTOR_CONFIG",
        default_value_os_t = default_config_path()
    )]
    pub config: PathBuf,

    /// Override `robot_refresh_token` from the config file without writing
    /// it to disk.
    #[arg(long, env = "CONNECTOR_ROBOT_REFRESH_TOKEN")]
    pub robot_refresh_token: Option<String>,

    /// Override `log_level` from the config file (e.g. `debug`, `warn`).
    #[arg(long, env = "CONNECTOR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Validate configuration and exit without starting any subsystem.
    #[arg(long, default_value_t = false)]
    pub check_config: bool,
}

//! Configuration: a TOML file loaded into a `serde`-derived struct, with
//! a handful of secrets overridable from the environment/CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use connector_cloud::ShareScope;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0:?}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse config file {0:?}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("invalid duration {0:?}: expected a number with an optional s/m/h suffix")]
    InvalidDuration(String),
    #[error("cloud_printing_enable and local_printing_enable cannot both be false")]
    NoSubsystemEnabled,
    #[error("cloud_printing_enable requires robot_refresh_token")]
    MissingRobotRefreshToken,
}

fn default_true() -> bool {
    true
}

fn default_gcp_max_concurrent_downloads() -> usize {
    4
}

fn default_native_job_queue_size() -> usize {
    1
}

fn default_native_printer_poll_interval() -> String {
    "15s".to_string()
}

fn default_xmpp_ping_interval() -> String {
    "60s".to_string()
}

fn default_xmpp_ping_timeout() -> String {
    "5s".to_string()
}

fn default_xmpp_port() -> u16 {
    5223
}

fn default_gcp_base_url() -> String {
    "https://www.google.com/cloudprint".to_string()
}

fn default_gcp_oauth_token_url() -> String {
    "https://accounts.google.com/o/oauth2/token".to_string()
}

fn default_share_scope() -> ShareScope {
    ShareScope::User
}

fn default_cups_max_connections() -> u64 {
    10
}

fn default_monitor_socket_filename() -> String {
    "/tmp/connector-monitor.sock".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_max_megabytes() -> u64 {
    10
}

fn default_log_max_files() -> u32 {
    5
}

/// The full recognized configuration surface, plus the ambient fields
/// (logging, monitor socket) a deployable daemon needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cloud_printing_enable: bool,
    pub local_printing_enable: bool,

    pub gcp_max_concurrent_downloads: usize,
    pub native_job_queue_size: usize,
    pub native_printer_poll_interval: String,

    pub xmpp_ping_timeout: String,
    pub xmpp_ping_interval: String,
    pub xmpp_server: String,
    pub xmpp_port: u16,
    pub xmpp_jid: String,

    pub fcm_notifications_enable: bool,
    pub fcm_server_bind_url: String,

    pub gcp_base_url: String,
    pub gcp_oauth_client_id: String,
    pub gcp_oauth_client_secret: String,
    pub gcp_oauth_token_url: String,

    pub robot_refresh_token: String,
    pub user_refresh_token: String,
    pub proxy_name: String,
    pub share_scope: ShareScope,

    pub cups_connect_timeout: String,
    pub cups_max_connections: u64,
    pub cups_printer_attributes: Vec<String>,
    pub cups_ignore_raw_printers: bool,
    pub cups_ignore_class_printers: bool,
    pub cups_vendor_ppd_options: Vec<String>,
    pub cups_job_full_username: bool,
    pub cups_copy_printer_info_to_display_name: bool,

    pub printer_blacklist: Vec<String>,
    pub printer_whitelist: Vec<String>,
    pub display_name_prefix: String,
    pub prefix_job_id_to_job_title: bool,

    pub monitor_socket_filename: String,

    pub log_level: String,
    pub log_file_name: Option<String>,
    pub log_file_max_megabytes: u64,
    pub log_max_files: u32,
    pub log_to_journal: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cloud_printing_enable: default_true(),
            local_printing_enable: default_true(),
            gcp_max_concurrent_downloads: default_gcp_max_concurrent_downloads(),
            native_job_queue_size: default_native_job_queue_size(),
            native_printer_poll_interval: default_native_printer_poll_interval(),
            xmpp_ping_timeout: default_xmpp_ping_timeout(),
            xmpp_ping_interval: default_xmpp_ping_interval(),
            xmpp_server: "talk.google.com".to_string(),
            xmpp_port: default_xmpp_port(),
            xmpp_jid: String::new(),
            fcm_notifications_enable: false,
            fcm_server_bind_url: String::new(),
            gcp_base_url: default_gcp_base_url(),
            gcp_oauth_client_id: String::new(),
            gcp_oauth_client_secret: String::new(),
            gcp_oauth_token_url: default_gcp_oauth_token_url(),
            robot_refresh_token: String::new(),
            user_refresh_token: String::new(),
            proxy_name: "connector".to_string(),
            share_scope: default_share_scope(),
            cups_connect_timeout: "5s".to_string(),
            cups_max_connections: default_cups_max_connections(),
            cups_printer_attributes: Vec::new(),
            cups_ignore_raw_printers: true,
            cups_ignore_class_printers: true,
            cups_vendor_ppd_options: Vec::new(),
            cups_job_full_username: false,
            cups_copy_printer_info_to_display_name: false,
            printer_blacklist: Vec::new(),
            printer_whitelist: Vec::new(),
            display_name_prefix: String::new(),
            prefix_job_id_to_job_title: false,
            monitor_socket_filename: default_monitor_socket_filename(),
            log_level: default_log_level(),
            log_file_name: None,
            log_file_max_megabytes: default_log_file_max_megabytes(),
            log_max_files: default_log_max_files(),
            log_to_journal: false,
        }
    }
}

impl Config {
    /// Loads and validates a TOML config file. Missing keys fall back to
    /// `Config::default()`'s values.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Refuses to start if both subsystems are disabled, or cloud printing
    /// is enabled without a robot identity to authenticate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cloud_printing_enable && !self.local_printing_enable {
            return Err(ConfigError::NoSubsystemEnabled);
        }
        if self.cloud_printing_enable && self.robot_refresh_token.is_empty() {
            return Err(ConfigError::MissingRobotRefreshToken);
        }
        Ok(())
    }

    pub fn native_printer_poll_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.native_printer_poll_interval)
    }

    pub fn xmpp_ping_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.xmpp_ping_interval)
    }

    pub fn xmpp_ping_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.xmpp_ping_timeout)
    }
}

/// Parses durations of the form `<number>[s|m|h]`; a bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let s = input.trim();
    let (digits, scale) = if let Some(d) = s.strip_suffix('h') {
        (d, 3600)
    } else if let Some(d) = s.strip_suffix('m') {
        (d, 60)
    } else if let Some(d) = s.strip_suffix('s') {
        (d, 1)
    } else {
        (s, 1)
    };
    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidDuration(input.to_string()))?;
    Ok(Duration::from_secs(value * scale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_refuses_cloud_printing_without_robot_token() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRobotRefreshToken)
        ));
    }

    #[test]
    fn disabling_both_subsystems_is_rejected() {
        let config = Config {
            cloud_printing_enable: false,
            local_printing_enable: false,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoSubsystemEnabled)
        ));
    }

    #[test]
    fn local_only_mode_needs_no_robot_token() {
        let config = Config {
            cloud_printing_enable: false,
            local_printing_enable: true,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_suffixed_and_bare_durations() {
        assert_eq!(parse_duration("15s").unwrap(), Duration::from_secs(15));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn loading_a_minimal_toml_file_fills_in_defaults() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("connector-config-test-{}.toml", std::process::id()));
        std::fs::write(&path, "robot_refresh_token = \"rt\"\nproxy_name = \"office\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.proxy_name, "office");
        assert_eq!(config.gcp_max_concurrent_downloads, 4);
        std::fs::remove_file(&path).unwrap();
    }
}

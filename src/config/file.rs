//! TOML configuration file loading
//!
//! Supports `~/.config/omni/beacon-remote/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::commands::{CommandEntry, UserOverride};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RemoteConfigFile {
    /// Peripheral selection and link parameters
    #[serde(default)]
    pub device: DeviceFileConfig,

    /// HTTP API configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Replacement built-in command table
    #[serde(default)]
    pub commands: Option<Vec<CommandEntry>>,

    /// Overrides loaded at startup
    #[serde(default)]
    pub overrides: Vec<UserOverride>,
}

/// Peripheral configuration
#[derive(Debug, Default, Deserialize)]
pub struct DeviceFileConfig {
    /// Device name prefix used during discovery
    pub name_prefix: Option<String>,

    /// Explicit serial port path
    pub port: Option<String>,

    /// Serial baud rate
    pub baud_rate: Option<u32>,

    /// Link check interval in milliseconds
    pub link_poll_ms: Option<u64>,

    /// Connect as soon as the daemon starts
    pub auto_connect: Option<bool>,
}

/// HTTP API configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Enable the HTTP API
    pub enabled: Option<bool>,

    /// API server port
    pub port: Option<u16>,
}

/// Load the TOML config file from the standard path
///
/// Returns `RemoteConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> RemoteConfigFile {
    config_file_path().map_or_else(RemoteConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> RemoteConfigFile {
    if !path.exists() {
        return RemoteConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                RemoteConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            RemoteConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/omni/beacon-remote/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("beacon-remote")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("absent.toml"));
        assert!(config.device.name_prefix.is_none());
        assert!(config.commands.is_none());
    }

    #[test]
    fn parses_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[device]
name_prefix = "Calliope"
baud_rate = 9600
auto_connect = true

[server]
port = 9000

[[commands]]
id = "jump"
phrases = ["jump", "hop"]

[[overrides]]
trigger = "dance"
payload = "D"
"#
        )
        .unwrap();

        let config = load_from(file.path());
        assert_eq!(config.device.name_prefix.as_deref(), Some("Calliope"));
        assert_eq!(config.device.baud_rate, Some(9600));
        assert_eq!(config.device.auto_connect, Some(true));
        assert_eq!(config.server.port, Some(9000));
        assert_eq!(config.commands.unwrap()[0].phrases, ["jump", "hop"]);
        assert_eq!(config.overrides[0].payload, "D");
    }

    #[test]
    fn invalid_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[device\nname_prefix = ").unwrap();

        let config = load_from(file.path());
        assert!(config.device.name_prefix.is_none());
    }
}

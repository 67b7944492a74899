//! Configuration management for Beacon Remote
//!
//! Values resolve as env > TOML file > default. CLI flags are applied on top
//! by the binary.

pub mod file;

use std::time::Duration;

use crate::commands::{CommandEntry, UserOverride, Vocabulary, default_commands};
use crate::transport::{DEFAULT_NAME_PREFIX, DeviceFilter, SerialSettings};
use crate::{Error, Result};

use file::RemoteConfigFile;

/// Default HTTP API port
pub const DEFAULT_API_PORT: u16 = 18791;

/// Beacon Remote configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Peripheral configuration
    pub device: DeviceConfig,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Built-in command table
    pub commands: Vec<CommandEntry>,

    /// Overrides applied at startup
    pub overrides: Vec<UserOverride>,
}

/// Peripheral configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Discovery filter
    pub filter: DeviceFilter,

    /// Serial link parameters
    pub serial: SerialSettings,

    /// Connect when the daemon starts
    pub auto_connect: bool,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Serve the API
    pub enabled: bool,

    /// Port to listen on
    pub port: u16,
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl Config {
    /// Load configuration from the process environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if the baud rate or link poll interval is zero
    pub fn from_sources(
        fc: RemoteConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let filter = DeviceFilter {
            name_prefix: env("BEACON_REMOTE_DEVICE_PREFIX")
                .or(fc.device.name_prefix)
                .unwrap_or_else(|| DEFAULT_NAME_PREFIX.to_string()),
            port: env("BEACON_REMOTE_PORT_PATH").or(fc.device.port),
        };

        let defaults = SerialSettings::default();
        let baud_rate = env("BEACON_REMOTE_BAUD")
            .and_then(|s| s.parse().ok())
            .or(fc.device.baud_rate)
            .unwrap_or(defaults.baud_rate);
        if baud_rate == 0 {
            return Err(Error::Config("baud rate must be positive".to_string()));
        }

        let link_poll = env("BEACON_REMOTE_LINK_POLL_MS")
            .and_then(|s| s.parse().ok())
            .or(fc.device.link_poll_ms)
            .map_or(defaults.link_poll, Duration::from_millis);
        if link_poll.is_zero() {
            return Err(Error::Config("link poll interval must be positive".to_string()));
        }

        let auto_connect = env("BEACON_REMOTE_AUTO_CONNECT")
            .map(|v| parse_bool(&v))
            .or(fc.device.auto_connect)
            .unwrap_or(false);

        let api_server = ApiServerConfig {
            enabled: env("BEACON_REMOTE_API_ENABLED")
                .map(|v| parse_bool(&v))
                .or(fc.server.enabled)
                .unwrap_or(true),
            port: env("BEACON_REMOTE_API_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_API_PORT),
        };

        Ok(Self {
            device: DeviceConfig {
                filter,
                serial: SerialSettings {
                    baud_rate,
                    link_poll,
                    ..defaults
                },
                auto_connect,
            },
            api_server,
            commands: fc.commands.unwrap_or_else(default_commands),
            overrides: fc.overrides,
        })
    }

    /// Build the startup vocabulary: command table plus configured overrides
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the command table or an override is invalid
    pub fn build_vocabulary(&self) -> Result<Vocabulary> {
        let mut vocabulary = Vocabulary::with_builtins(self.commands.clone())?;
        for entry in &self.overrides {
            vocabulary.add_override(&entry.trigger, &entry.payload)?;
        }
        Ok(vocabulary)
    }
}

impl Default for Config {
    fn default() -> Self {
        let defaults = SerialSettings::default();
        Self {
            device: DeviceConfig {
                filter: DeviceFilter::default(),
                serial: defaults,
                auto_connect: false,
            },
            api_server: ApiServerConfig {
                enabled: true,
                port: DEFAULT_API_PORT,
            },
            commands: default_commands(),
            overrides: Vec::new(),
        }
    }
}

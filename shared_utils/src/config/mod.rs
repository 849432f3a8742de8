//! Configuration management for the seed server.
//!
//! The configuration describes one tunnel deployment: the tunnel network, the
//! shoot networks routed through it, the HA layout and where the generated
//! artifacts are written. It is loaded from TOML and can be overridden through
//! `SEED_SERVER_*` environment variables.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::network::{IpFamilies, ha_client_addresses, ha_slot_network};

/// Prefix of all environment variable overrides.
pub const ENV_PREFIX: &str = "SEED_SERVER_";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    /// Error parsing TOML configuration
    #[error("Failed to parse TOML config: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Error serializing configuration to TOML
    #[error("Failed to serialize config to TOML: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// Missing required configuration value
    #[error("Missing required configuration value: {0}")]
    MissingValue(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),
}

/// Tunnel settings rendered into the server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TunnelConfig {
    /// Tunnel device name (default: "tun0")
    #[serde(default = "default_device")]
    pub device: String,

    /// Address families of the tunnel (default: IPv4)
    #[serde(default)]
    pub ip_families: IpFamilies,

    /// File the tunnel server reports its status to
    #[serde(default = "default_status_path")]
    pub status_path: String,

    /// Network the tunnel endpoints are addressed from
    pub openvpn_network: Option<IpNet>,

    /// Pool for dynamically addressed clients (default: `openvpn_network`)
    #[serde(default)]
    pub openvpn_network_pool: Option<IpNet>,

    /// Shoot networks reachable through the tunnel
    #[serde(default)]
    pub shoot_networks: Vec<IpNet>,

    /// Address of the node the server runs on
    #[serde(default)]
    pub local_node_ip: String,
}

fn default_device() -> String {
    "tun0".to_string()
}

fn default_status_path() -> String {
    "/srv/status/openvpn.status".to_string()
}

impl Default for TunnelConfig {
    fn default() -> Self {
        TunnelConfig {
            device: default_device(),
            ip_families: IpFamilies::default(),
            status_path: default_status_path(),
            openvpn_network: None,
            openvpn_network_pool: None,
            shoot_networks: Vec::new(),
            local_node_ip: String::new(),
        }
    }
}

/// High-availability layout.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HaConfig {
    /// Run with several redundant shoot clients (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Number of redundant shoot clients
    #[serde(default)]
    pub vpn_clients: usize,

    /// Slot index of this server
    #[serde(default)]
    pub vpn_index: usize,
}

/// Destinations of the generated artifacts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Server configuration file (default: "/openvpn.config")
    #[serde(default = "default_server_config")]
    pub server_config: PathBuf,

    /// Directory holding per-client configuration (default: "/client-config-dir")
    #[serde(default = "default_client_config_dir")]
    pub client_config_dir: PathBuf,

    /// File name of the client configuration (default: "vpn-shoot-client")
    #[serde(default = "default_client_config_prefix")]
    pub client_config_prefix: String,
}

fn default_server_config() -> PathBuf {
    PathBuf::from("/openvpn.config")
}

fn default_client_config_dir() -> PathBuf {
    PathBuf::from("/client-config-dir")
}

fn default_client_config_prefix() -> String {
    "vpn-shoot-client".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            server_config: default_server_config(),
            client_config_dir: default_client_config_dir(),
            client_config_prefix: default_client_config_prefix(),
        }
    }
}

/// Main configuration structure for the seed server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Log level (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Tunnel settings
    #[serde(default)]
    pub tunnel: TunnelConfig,

    /// HA settings
    #[serde(default)]
    pub ha: HaConfig,

    /// Output locations
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            tunnel: TunnelConfig::default(),
            ha: HaConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Config::default()
    }

    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.log_level.make_ascii_lowercase();
        config.validate()?;

        Ok(config)
    }

    /// Build a configuration from defaults and environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Tunnel network, or an error when it is not configured.
    pub fn openvpn_network(&self) -> Result<IpNet, ConfigError> {
        self.tunnel
            .openvpn_network
            .ok_or_else(|| ConfigError::MissingValue("tunnel.openvpn_network".to_string()))
    }

    /// Pool network. Defaults to the block of this server's slot in HA mode
    /// and to the whole tunnel network otherwise.
    pub fn openvpn_network_pool(&self) -> Result<IpNet, ConfigError> {
        if let Some(pool) = self.tunnel.openvpn_network_pool {
            return Ok(pool);
        }
        let network = self.openvpn_network()?;
        if !self.ha.enabled {
            return Ok(network);
        }
        ha_slot_network(&network, self.ha.vpn_index).map_err(|err| ConfigError::InvalidValue {
            key: "ha.vpn_index".to_string(),
            message: err.to_string(),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(
            self.log_level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::InvalidValue {
                key: "log_level".to_string(),
                message: format!("unknown level `{}`", self.log_level),
            });
        }

        if self.tunnel.device.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "tunnel.device".to_string(),
                message: "device name cannot be empty".to_string(),
            });
        }

        let network = self.openvpn_network()?;
        let families = self.tunnel.ip_families;
        let family_matches = match network {
            IpNet::V4(_) => families.has_ipv4(),
            IpNet::V6(_) => families.has_ipv6(),
        };
        if !family_matches {
            return Err(ConfigError::InvalidValue {
                key: "tunnel.openvpn_network".to_string(),
                message: format!("{network} does not match ip_families {families}"),
            });
        }

        if self.ha.enabled {
            for (_, allocation) in
                ha_client_addresses(&network, self.ha.vpn_index, self.ha.vpn_clients)
            {
                if let Err(err) = allocation {
                    return Err(ConfigError::InvalidValue {
                        key: "ha.vpn_clients".to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let pool = self.openvpn_network_pool()?;
        if pool.addr().is_ipv4() != network.addr().is_ipv4() {
            return Err(ConfigError::InvalidValue {
                key: "tunnel.openvpn_network_pool".to_string(),
                message: format!("{pool} is not of the same family as {network}"),
            });
        }

        if self.output.client_config_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "output.client_config_prefix".to_string(),
                message: "client config file name cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Apply overrides (prefix: SEED_SERVER_) using `lookup` to resolve keys.
    ///
    /// Keys:
    /// - SEED_SERVER_LOG_LEVEL
    /// - SEED_SERVER_TUNNEL_DEVICE, SEED_SERVER_TUNNEL_IP_FAMILIES, SEED_SERVER_TUNNEL_STATUS_PATH,
    ///   SEED_SERVER_TUNNEL_OPENVPN_NETWORK, SEED_SERVER_TUNNEL_OPENVPN_NETWORK_POOL,
    ///   SEED_SERVER_TUNNEL_SHOOT_NETWORKS (comma separated), SEED_SERVER_TUNNEL_LOCAL_NODE_IP
    /// - SEED_SERVER_HA_ENABLED, SEED_SERVER_HA_VPN_CLIENTS, SEED_SERVER_HA_VPN_INDEX
    /// - SEED_SERVER_OUTPUT_SERVER_CONFIG, SEED_SERVER_OUTPUT_CLIENT_CONFIG_DIR,
    ///   SEED_SERVER_OUTPUT_CLIENT_CONFIG_PREFIX
    ///
    /// A value that fails to parse is a [`ConfigError::InvalidValue`] naming
    /// the variable.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn invalid(key: &str, value: &str) -> ConfigError {
            ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("cannot parse `{value}`"),
            }
        }
        fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
            match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "y" => Ok(true),
                "false" | "0" | "no" | "n" => Ok(false),
                _ => Err(invalid(key, value)),
            }
        }
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| invalid(key, value))
        }
        fn split_csv(s: &str) -> Vec<String> {
            s.split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        }

        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, v)) = get("LOG_LEVEL") {
            if !v.is_empty() {
                self.log_level = v.to_ascii_lowercase();
            }
        }

        // Tunnel
        if let Some((_, v)) = get("TUNNEL_DEVICE") {
            if !v.is_empty() {
                self.tunnel.device = v;
            }
        }
        if let Some((key, v)) = get("TUNNEL_IP_FAMILIES") {
            self.tunnel.ip_families = parse(&key, &v)?;
        }
        if let Some((_, v)) = get("TUNNEL_STATUS_PATH") {
            if !v.is_empty() {
                self.tunnel.status_path = v;
            }
        }
        if let Some((key, v)) = get("TUNNEL_OPENVPN_NETWORK") {
            self.tunnel.openvpn_network = Some(parse(&key, &v)?);
        }
        if let Some((key, v)) = get("TUNNEL_OPENVPN_NETWORK_POOL") {
            self.tunnel.openvpn_network_pool = Some(parse(&key, &v)?);
        }
        if let Some((key, v)) = get("TUNNEL_SHOOT_NETWORKS") {
            self.tunnel.shoot_networks = split_csv(&v)
                .iter()
                .map(|item| parse(&key, item))
                .collect::<Result<_, _>>()?;
        }
        if let Some((_, v)) = get("TUNNEL_LOCAL_NODE_IP") {
            self.tunnel.local_node_ip = v;
        }

        // HA
        if let Some((key, v)) = get("HA_ENABLED") {
            self.ha.enabled = parse_bool(&key, &v)?;
        }
        if let Some((key, v)) = get("HA_VPN_CLIENTS") {
            self.ha.vpn_clients = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("HA_VPN_INDEX") {
            self.ha.vpn_index = parse(&key, &v)?;
        }

        // Output
        if let Some((_, v)) = get("OUTPUT_SERVER_CONFIG") {
            if !v.is_empty() {
                self.output.server_config = PathBuf::from(v);
            }
        }
        if let Some((_, v)) = get("OUTPUT_CLIENT_CONFIG_DIR") {
            if !v.is_empty() {
                self.output.client_config_dir = PathBuf::from(v);
            }
        }
        if let Some((_, v)) = get("OUTPUT_CLIENT_CONFIG_PREFIX") {
            if !v.is_empty() {
                self.output.client_config_prefix = v;
            }
        }

        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("seed-server").join("config.toml")
        } else {
            PathBuf::from("config.toml")
        }
    }
}

use shared_utils::config::{Config, ConfigError};
use shared_utils::network::IpFamilies;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn load(config_str: &str) -> Result<Config, ConfigError> {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(config_str.as_bytes()).unwrap();
    Config::load(file.path())
}

#[test]
fn test_load_ha_config() {
    let config = load(
        r#"
        log_level = "debug"

        [tunnel]
        device = "tun1"
        ip_families = "IPv4"
        openvpn_network = "192.168.123.0/24"
        shoot_networks = ["100.64.0.0/13", "10.250.0.0/16", "100.96.0.0/11"]
        local_node_ip = "10.0.0.12"

        [ha]
        enabled = true
        vpn_clients = 2
        vpn_index = 1

        [output]
        server_config = "/etc/openvpn/server.conf"
        client_config_dir = "/etc/openvpn/ccd"
    "#,
    )
    .unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.tunnel.device, "tun1");
    assert_eq!(config.tunnel.ip_families, IpFamilies::Ipv4);
    assert_eq!(config.tunnel.status_path, "/srv/status/openvpn.status");
    assert_eq!(config.tunnel.shoot_networks.len(), 3);
    assert_eq!(config.tunnel.local_node_ip, "10.0.0.12");
    assert!(config.ha.enabled);
    assert_eq!(config.ha.vpn_clients, 2);
    assert_eq!(config.ha.vpn_index, 1);
    assert_eq!(
        config.openvpn_network_pool().unwrap().to_string(),
        "192.168.123.64/26"
    );
    assert_eq!(
        config.output.server_config,
        PathBuf::from("/etc/openvpn/server.conf")
    );
    assert_eq!(config.output.client_config_prefix, "vpn-shoot-client");
}

#[test]
fn test_load_ipv6_config() {
    let config = load(
        r#"
        [tunnel]
        ip_families = "IPv6"
        openvpn_network = "fd8f:6d53:b97a:1::/120"
    "#,
    )
    .unwrap();

    assert_eq!(config.tunnel.ip_families, IpFamilies::Ipv6);
    assert!(!config.ha.enabled);
}

#[test]
fn test_missing_tunnel_network() {
    let result = load(
        r#"
        [tunnel]
        device = "tun0"
    "#,
    );

    match result {
        Err(ConfigError::MissingValue(msg)) => {
            assert!(msg.contains("openvpn_network"));
        }
        _ => panic!("Expected MissingValue error for openvpn_network"),
    }
}

#[test]
fn test_invalid_network() {
    let result = load(
        r#"
        [tunnel]
        openvpn_network = "192.168.123.0/33"
    "#,
    );
    assert!(matches!(result, Err(ConfigError::TomlError(_))));
}

#[test]
fn test_invalid_ip_families() {
    let result = load(
        r#"
        [tunnel]
        ip_families = "IPX"
        openvpn_network = "192.168.123.0/24"
    "#,
    );
    assert!(matches!(result, Err(ConfigError::TomlError(_))));
}

#[test]
fn test_too_many_ha_clients() {
    let result = load(
        r#"
        [tunnel]
        openvpn_network = "192.168.123.0/24"

        [ha]
        enabled = true
        vpn_clients = 70
        vpn_index = 3
    "#,
    );

    match result {
        Err(ConfigError::InvalidValue { key, message }) => {
            assert_eq!(key, "ha.vpn_clients");
            assert!(message.contains("overflows"));
        }
        other => panic!("Expected InvalidValue error, got {other:?}"),
    }
}

#[test]
fn test_load_ha_config_with_narrow_network() {
    let config = load(
        r#"
        [tunnel]
        openvpn_network = "192.168.123.0/28"

        [ha]
        enabled = true
        vpn_clients = 2
        vpn_index = 0
    "#,
    )
    .unwrap();

    assert_eq!(
        config.openvpn_network_pool().unwrap().to_string(),
        "192.168.123.0/28"
    );
}

#[test]
fn test_log_level_in_any_case() {
    let config = load(
        r#"
        log_level = "INFO"

        [tunnel]
        openvpn_network = "192.168.123.0/24"
    "#,
    )
    .unwrap();
    assert_eq!(config.log_level, "info");
}

#[test]
fn test_nonexistent_file() {
    let result = Config::load("/nonexistent/seed-server/config.toml");
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

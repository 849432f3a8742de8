//! Values rendered into the tunnel configuration templates.

use ipnet::IpNet;
use serde::Serialize;
use shared_utils::config::{Config, ConfigError};
use shared_utils::network::{HaClientAddresses, IpFamilies, ha_client_addresses};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use tera::Context;

/// Everything needed to render the seed side of one tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedServerValues {
    pub device: String,
    pub ip_families: IpFamilies,
    pub status_path: String,
    pub openvpn_network: IpNet,
    pub openvpn_network_pool: IpNet,
    pub shoot_networks: Vec<IpNet>,
    pub ha_vpn_clients: usize,
    pub is_ha: bool,
    pub vpn_index: usize,
    pub local_node_ip: String,
}

impl SeedServerValues {
    /// Build the values from a validated configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(SeedServerValues {
            device: config.tunnel.device.clone(),
            ip_families: config.tunnel.ip_families,
            status_path: config.tunnel.status_path.clone(),
            openvpn_network: config.openvpn_network()?,
            openvpn_network_pool: config.openvpn_network_pool()?,
            shoot_networks: config.tunnel.shoot_networks.clone(),
            ha_vpn_clients: config.ha.vpn_clients,
            is_ha: config.ha.enabled,
            vpn_index: config.ha.vpn_index,
            local_node_ip: config.tunnel.local_node_ip.clone(),
        })
    }

    /// Addresses handed to the HA shoot clients of this server's slot.
    ///
    /// Yields nothing when HA is off.
    pub fn ha_client_addresses(&self) -> HaClientAddresses {
        let count = if self.is_ha { self.ha_vpn_clients } else { 0 };
        ha_client_addresses(&self.openvpn_network, self.vpn_index, count)
    }
}

/// A network as seen by the templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkView {
    pub cidr: String,
    pub address: String,
    pub netmask: String,
    pub prefix_len: u8,
    pub first_host: String,
    pub is_ipv6: bool,
}

// The address after the network address, for both families. Falls back to
// the network address for single-address networks.
fn first_host(network: &IpNet) -> IpAddr {
    let next = match network.network() {
        IpAddr::V4(address) => u32::from(address)
            .checked_add(1)
            .map(|v| IpAddr::V4(Ipv4Addr::from(v))),
        IpAddr::V6(address) => u128::from(address)
            .checked_add(1)
            .map(|v| IpAddr::V6(Ipv6Addr::from(v))),
    };
    next.filter(|address| network.contains(address))
        .unwrap_or_else(|| network.network())
}

impl From<&IpNet> for NetworkView {
    fn from(network: &IpNet) -> Self {
        let first_host = first_host(network);
        NetworkView {
            cidr: network.trunc().to_string(),
            address: network.network().to_string(),
            netmask: network.netmask().to_string(),
            prefix_len: network.prefix_len(),
            first_host: first_host.to_string(),
            is_ipv6: matches!(network, IpNet::V6(_)),
        }
    }
}

#[derive(Serialize)]
struct ServerTemplateValues<'a> {
    device: &'a str,
    ip_families: &'static str,
    ipv4: bool,
    ipv6: bool,
    status_path: &'a str,
    openvpn_network: NetworkView,
    openvpn_network_pool: NetworkView,
    shoot_networks: Vec<NetworkView>,
    is_ha: bool,
    ha_vpn_clients: usize,
    vpn_index: usize,
    local_node_ip: &'a str,
    client_config_dir: String,
}

#[derive(Serialize)]
struct HaClientTemplateValues {
    openvpn_network: NetworkView,
    start_ip: String,
}

/// Values for the server configuration.
pub fn server_context(
    values: &SeedServerValues,
    client_config_dir: &Path,
) -> Result<Context, tera::Error> {
    Context::from_serialize(ServerTemplateValues {
        device: &values.device,
        ip_families: values.ip_families.as_str(),
        ipv4: values.ip_families.has_ipv4(),
        ipv6: values.ip_families.has_ipv6(),
        status_path: &values.status_path,
        openvpn_network: NetworkView::from(&values.openvpn_network),
        openvpn_network_pool: NetworkView::from(&values.openvpn_network_pool),
        shoot_networks: values.shoot_networks.iter().map(NetworkView::from).collect(),
        is_ha: values.is_ha,
        ha_vpn_clients: values.ha_vpn_clients,
        vpn_index: values.vpn_index,
        local_node_ip: &values.local_node_ip,
        client_config_dir: client_config_dir.display().to_string(),
    })
}

/// Values for the configuration pushed to a non-HA shoot client.
///
/// The client template reads the routing part of the server values.
pub fn client_context(
    values: &SeedServerValues,
    client_config_dir: &Path,
) -> Result<Context, tera::Error> {
    server_context(values, client_config_dir)
}

/// Values for the configuration pushed to the HA shoot client at `start_ip`.
pub fn ha_client_context(
    values: &SeedServerValues,
    start_ip: IpAddr,
) -> Result<Context, tera::Error> {
    Context::from_serialize(HaClientTemplateValues {
        openvpn_network: NetworkView::from(&values.openvpn_network),
        start_ip: start_ip.to_string(),
    })
}

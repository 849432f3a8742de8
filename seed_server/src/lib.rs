//! Seed-side tunnel configuration generator.
//!
//! Renders the OpenVPN server configuration of a seed and the per-client
//! configuration it hands to connecting shoot clients, including the fixed
//! addresses of redundant HA clients.

pub mod openvpn;

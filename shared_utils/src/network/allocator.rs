//! Deterministic address assignment for HA tunnel clients.
//!
//! Every tunnel slot owns a block of [`HA_SLOT_STRIDE`] values of the last
//! address byte of the tunnel network. Instance `i` of slot `s` gets the host whose last byte is
//! `s * HA_SLOT_STRIDE + i + HA_HOST_OFFSET`, so clients and the server derive
//! the same address without any shared state.

use ipnet::IpNet;
use std::iter::FusedIterator;
use std::net::IpAddr;
use thiserror::Error;

/// Number of addresses reserved per tunnel slot.
pub const HA_SLOT_STRIDE: usize = 64;

/// Addresses skipped at the start of every block (network and gateway).
pub const HA_HOST_OFFSET: usize = 2;

// log2(HA_SLOT_STRIDE)
const SLOT_HOST_BITS: u8 = 6;

/// Errors raised while assigning HA client addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// The computed host byte does not fit into the last address byte.
    #[error(
        "address for slot {slot}, instance {instance} overflows the last address byte \
         ({slot} * 64 + {instance} + 2 > 255)"
    )]
    Overflow { slot: usize, instance: usize },

    /// The computed address is not part of the tunnel network.
    #[error("allocated address {address} is outside of network {network}")]
    OutsideNetwork { address: IpAddr, network: IpNet },
}

fn with_last_byte(address: IpAddr, byte: u8) -> IpAddr {
    match address {
        IpAddr::V4(base) => {
            let mut octets = base.octets();
            octets[3] = byte;
            IpAddr::from(octets)
        }
        IpAddr::V6(base) => {
            let mut octets = base.octets();
            octets[15] = byte;
            IpAddr::from(octets)
        }
    }
}

/// Compute the address of HA client `instance` in tunnel slot `slot`.
pub fn ha_client_address(
    network: &IpNet,
    slot: usize,
    instance: usize,
) -> Result<IpAddr, AllocationError> {
    let host = slot
        .checked_mul(HA_SLOT_STRIDE)
        .and_then(|v| v.checked_add(instance))
        .and_then(|v| v.checked_add(HA_HOST_OFFSET))
        .and_then(|v| u8::try_from(v).ok())
        .ok_or(AllocationError::Overflow { slot, instance })?;

    let address = with_last_byte(network.network(), host);

    if !network.contains(&address) {
        return Err(AllocationError::OutsideNetwork {
            address,
            network: *network,
        });
    }

    Ok(address)
}

/// The block of addresses owned by `slot`, e.g. `192.168.123.64/26` for slot 1
/// of `192.168.123.0/24`. Its first host is the server side of the slot.
///
/// A tunnel network narrower than a slot block is the block itself.
pub fn ha_slot_network(network: &IpNet, slot: usize) -> Result<IpNet, AllocationError> {
    let first = slot
        .checked_mul(HA_SLOT_STRIDE)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or(AllocationError::Overflow { slot, instance: 0 })?;

    let address = with_last_byte(network.network(), first);
    let prefix_len = network
        .prefix_len()
        .max(network.max_prefix_len() - SLOT_HOST_BITS);

    let block = IpNet::new(address, prefix_len)
        .ok()
        .map(|block| block.trunc())
        .filter(|block| network.contains(block))
        .ok_or(AllocationError::OutsideNetwork {
            address,
            network: *network,
        })?;

    Ok(block)
}

/// Addresses of instances `0..count` of `slot`, in ascending instance order.
pub fn ha_client_addresses(network: &IpNet, slot: usize, count: usize) -> HaClientAddresses {
    HaClientAddresses {
        network: *network,
        slot,
        next: 0,
        count,
    }
}

/// Iterator returned by [`ha_client_addresses`].
///
/// Cloning yields an iterator that restarts from the clone point.
#[derive(Debug, Clone)]
pub struct HaClientAddresses {
    network: IpNet,
    slot: usize,
    next: usize,
    count: usize,
}

impl Iterator for HaClientAddresses {
    type Item = (usize, Result<IpAddr, AllocationError>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let instance = self.next;
        self.next += 1;
        Some((
            instance,
            ha_client_address(&self.network, self.slot, instance),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for HaClientAddresses {}

impl FusedIterator for HaClientAddresses {}

//! The set of addresses flagged for heightened attention.
//!
//! Membership is independent of the device registry: an address can be
//! flagged before it is ever seen and stays flagged after its record is
//! evicted. The index has no size cap. The scanning firmware keeps only a
//! handful of priority addresses on its side, but that is its own limit.

use std::collections::BTreeSet;

use crate::address::DeviceAddress;

/// Priority address set.
#[derive(Debug, Clone, Default)]
pub struct PriorityIndex {
    addresses: BTreeSet<DeviceAddress>,
}

impl PriorityIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag or unflag an address. Returns `true` if membership changed.
    pub fn set(&mut self, address: &DeviceAddress, flag: bool) -> bool {
        if flag {
            self.addresses.insert(address.clone())
        } else {
            self.addresses.remove(address)
        }
    }

    /// Whether `address` is flagged.
    #[must_use]
    pub fn contains(&self, address: &DeviceAddress) -> bool {
        self.addresses.contains(address)
    }

    /// All flagged addresses in sorted order.
    #[must_use]
    pub fn addresses(&self) -> Vec<DeviceAddress> {
        self.addresses.iter().cloned().collect()
    }

    /// Number of flagged addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Whether no address is flagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

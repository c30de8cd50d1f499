//! Addresses watched on one chain.

use super::DiscoveredAddress;
use crate::contracts::ContractKind;
use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Literal contract watched from a configured start block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticWatch {
    pub kind: ContractKind,
    pub address: Address,
    pub start_block: u64,
}

/// Static and factory-discovered addresses.
///
/// Written only by the chain's [`Discovery`](super::Discovery), read
/// concurrently by everything else. Entries are never removed or rewritten.
#[derive(Debug, Default)]
pub struct WatchSet {
    statics: Vec<StaticWatch>,
    discovered: DashMap<(ContractKind, Address), DiscoveredAddress>,
    /// Highest processed block + 1 (0 = nothing processed)
    processed: AtomicU64,
    halted: AtomicBool,
}

impl WatchSet {
    pub fn new(statics: Vec<StaticWatch>) -> Self {
        Self {
            statics,
            ..Default::default()
        }
    }

    /// Record a discovered child. Returns false when it was already known.
    ///
    /// Blocks are fed in ascending order, so the first record is the earliest
    /// discovery and is kept as is.
    pub fn record(&self, discovered: DiscoveredAddress) -> bool {
        let key = (discovered.kind, discovered.address);
        match self.discovered.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(discovered);
                true
            }
        }
    }

    pub(crate) fn mark_processed(&self, block: u64) {
        self.processed.fetch_max(block.saturating_add(1), Ordering::AcqRel);
    }

    pub(crate) fn mark_halted(&self) {
        self.halted.store(true, Ordering::Release);
    }

    /// Whether discovery stopped on an undecodable creation event.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Number of factory-discovered children.
    pub fn discovered_count(&self) -> usize {
        self.discovered.len()
    }

    /// Highest block fed through discovery, if any.
    pub fn processed_through(&self) -> Option<u64> {
        self.processed.load(Ordering::Acquire).checked_sub(1)
    }

    /// Whether `address` is watched at `block`.
    pub fn is_watched(&self, address: Address, block: u64) -> bool {
        let is_static = self
            .statics
            .iter()
            .any(|w| w.address == address && block >= w.start_block);

        is_static
            || self
                .discovered
                .iter()
                .any(|entry| entry.address == address && block >= entry.block_number)
    }

    /// Every address watched as `kind`, ordered by (start block, address).
    pub fn addresses(&self, kind: ContractKind) -> Vec<Address> {
        let mut found: Vec<(u64, Address)> = self
            .statics
            .iter()
            .filter(|w| w.kind == kind)
            .map(|w| (w.start_block, w.address))
            .chain(
                self.discovered
                    .iter()
                    .filter(|entry| entry.kind == kind)
                    .map(|entry| (entry.block_number, entry.address)),
            )
            .collect();
        found.sort();
        found.dedup_by_key(|(_, address)| *address);
        found.into_iter().map(|(_, address)| address).collect()
    }

    /// Snapshot of every discovered child, ordered by (block, address).
    pub fn discovered(&self) -> Vec<DiscoveredAddress> {
        let mut all: Vec<DiscoveredAddress> =
            self.discovered.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by_key(|d| (d.block_number, d.address));
        all
    }

    pub fn statics(&self) -> &[StaticWatch] {
        &self.statics
    }
}

//! Indexed event log.

use alloy::primitives::{Address, Bytes, B256};
use smallvec::SmallVec;

/// A mined event log with its block position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLog {
    pub block_number: u64,
    pub block_hash: B256,
    pub transaction_hash: B256,
    pub transaction_index: u64,
    pub log_index: u64,
    pub address: Address,
    /// Up to four topics; topic0 is the event selector for non-anonymous events
    pub topics: SmallVec<[B256; 4]>,
    pub data: Bytes,
}

impl ChainLog {
    /// Event selector (topic0), if any.
    pub fn selector(&self) -> Option<B256> {
        self.topics.first().copied()
    }

    /// Ordering key within a chain.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

impl TryFrom<alloy::rpc::types::Log> for ChainLog {
    type Error = String;

    fn try_from(log: alloy::rpc::types::Log) -> Result<Self, Self::Error> {
        let missing = |field: &str| format!("log is missing `{field}` (pending log?)");

        Ok(Self {
            block_number: log.block_number.ok_or_else(|| missing("blockNumber"))?,
            block_hash: log.block_hash.ok_or_else(|| missing("blockHash"))?,
            transaction_hash: log.transaction_hash.ok_or_else(|| missing("transactionHash"))?,
            transaction_index: log.transaction_index.ok_or_else(|| missing("transactionIndex"))?,
            log_index: log.log_index.ok_or_else(|| missing("logIndex"))?,
            address: log.inner.address,
            topics: log.inner.data.topics().iter().copied().collect(),
            data: log.inner.data.data.clone(),
        })
    }
}

/// Lowercase `0x`-prefixed hex, the form indexed tables store.
pub fn hex_lower(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_hex_lower() {
        let addr = address!("BBBBBbbBBb9cC5e90e3b3Af64bdAF62C37EEFFCb");
        assert_eq!(hex_lower(addr), "0xbbbbbbbbbb9cc5e90e3b3af64bdaf62c37eeffcb");
    }
}

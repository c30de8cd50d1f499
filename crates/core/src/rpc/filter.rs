//! `eth_getLogs` filter object, resolved against the indexed head.

use super::RpcError;
use crate::store::LogQuery;
use alloy::primitives::{Address, B256};
use serde::Deserialize;
use serde_json::Value;

/// Positional topic slots accepted by `eth_getLogs`.
const MAX_TOPICS: usize = 4;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub from_block: Option<String>,
    pub to_block: Option<String>,
    pub block_hash: Option<B256>,
    pub address: Option<OneOrMany<Address>>,
    pub topics: Option<Vec<Option<OneOrMany<B256>>>>,
}

impl LogFilter {
    pub fn from_params(params: &Value) -> Result<Self, RpcError> {
        let filter = match params {
            Value::Array(items) => match items.as_slice() {
                [filter] => filter.clone(),
                [] => return Err(RpcError::invalid_params("missing filter object")),
                _ => return Err(RpcError::invalid_params("expected a single filter object")),
            },
            Value::Object(_) => params.clone(),
            _ => return Err(RpcError::invalid_params("expected a single filter object")),
        };
        serde_json::from_value(filter).map_err(|e| RpcError::invalid_params(e.to_string()))
    }

    /// Resolve into a store query bounded by `latest`, the last fully indexed
    /// block. `None` means the range lies entirely above `latest`.
    pub fn resolve(self, latest: u64, limit: usize) -> Result<Option<LogQuery>, RpcError> {
        let topics = self.topics.unwrap_or_default();
        if topics.len() > MAX_TOPICS {
            return Err(RpcError::invalid_params(format!(
                "at most {MAX_TOPICS} topic positions are supported, got {}",
                topics.len()
            )));
        }
        let topics = topics
            .into_iter()
            .map(|slot| slot.map(OneOrMany::into_vec))
            .collect();
        let addresses = self.address.map(OneOrMany::into_vec).unwrap_or_default();

        if let Some(hash) = self.block_hash {
            if self.from_block.is_some() || self.to_block.is_some() {
                return Err(RpcError::invalid_params(
                    "blockHash cannot be combined with fromBlock or toBlock",
                ));
            }
            return Ok(Some(LogQuery {
                from_block: 0,
                to_block: latest,
                block_hash: Some(hash),
                addresses,
                topics,
                limit,
            }));
        }

        let from_block = block_number(self.from_block.as_deref(), latest)?;
        let to_block = block_number(self.to_block.as_deref(), latest)?;
        if from_block > latest {
            return Ok(None);
        }
        let to_block = to_block.min(latest);
        if from_block > to_block {
            return Err(RpcError::invalid_params(format!(
                "fromBlock {from_block:#x} is after toBlock {to_block:#x}"
            )));
        }

        Ok(Some(LogQuery {
            from_block,
            to_block,
            block_hash: None,
            addresses,
            topics,
            limit,
        }))
    }
}

/// Hex quantity or block tag. Unset and head-like tags mean `latest`.
fn block_number(value: Option<&str>, latest: u64) -> Result<u64, RpcError> {
    match value {
        None | Some("latest" | "safe" | "finalized" | "pending") => Ok(latest),
        Some("earliest") => Ok(0),
        Some(raw) => raw
            .strip_prefix("0x")
            .filter(|digits| !digits.is_empty())
            .and_then(|digits| u64::from_str_radix(digits, 16).ok())
            .ok_or_else(|| RpcError::invalid_params(format!("invalid block number `{raw}`"))),
    }
}

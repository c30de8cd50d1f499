//! Wide integer serialization.
//!
//! Amounts, shares and block numbers are exchanged as decimal strings with a
//! trailing `n` (`"1000000000000000000n"`), so clients never lose precision
//! through float parsing. Use with `#[serde(with = "crate::wide")]`.

use serde::{de, Deserialize, Deserializer, Serializer};
use std::fmt::Display;
use std::str::FromStr;

pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{value}n"))
}

/// Accepts `"<decimal>n"` as well as a bare decimal string.
pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let digits = raw.strip_suffix('n').unwrap_or(&raw);
    digits.parse().map_err(de::Error::custom)
}

/// `"<decimal>n"` string for a wide value.
pub fn to_wide_string<T: Display>(value: &T) -> String {
    format!("{value}n")
}

/// Same encoding for optional values; `None` is `null`.
pub mod option {
    use super::*;

    pub fn serialize<T: Display, S: Serializer>(
        value: &Option<T>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => super::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|raw| {
            let digits = raw.strip_suffix('n').unwrap_or(&raw);
            digits.parse().map_err(de::Error::custom)
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Amounts {
        #[serde(with = "crate::wide")]
        total_assets: U256,
        #[serde(with = "crate::wide")]
        block_number: u64,
        #[serde(with = "crate::wide::option")]
        removable_at: Option<U256>,
    }

    #[test]
    fn test_serializes_with_suffix() {
        let amounts = Amounts {
            total_assets: U256::from(10u64).pow(U256::from(30)),
            block_number: 42,
            removable_at: None,
        };
        assert_eq!(
            serde_json::to_value(&amounts).unwrap(),
            json!({
                "totalAssets": "1000000000000000000000000000000n",
                "blockNumber": "42n",
                "removableAt": null,
            })
        );
    }

    #[test]
    fn test_deserializes_with_or_without_suffix() {
        let amounts: Amounts = serde_json::from_value(json!({
            "totalAssets": "7n",
            "blockNumber": "9",
            "removableAt": "5n",
        }))
        .unwrap();
        assert_eq!(amounts.total_assets, U256::from(7));
        assert_eq!(amounts.block_number, 9);
        assert_eq!(amounts.removable_at, Some(U256::from(5)));

        assert!(serde_json::from_value::<Amounts>(json!({
            "totalAssets": "tenn",
            "blockNumber": "1",
            "removableAt": null,
        }))
        .is_err());
    }
}

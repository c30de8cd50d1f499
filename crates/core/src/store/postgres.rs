//! [`IndexStore`] over the indexer's Postgres tables.
//!
//! Wide numeric columns are `numeric(78,0)` and hex columns are lowercase
//! `text`, so every value is selected as text and parsed here.

use super::{
    AuthorizationRow, IndexStore, LogQuery, MarketRow, PositionRow, PreLiquidationContractRow,
    StoreError, VaultConfigRow, VaultRow, WithdrawQueueItemRow,
};
use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use indexer_chain::{hex_lower, ChainLog};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const MARKET_COLUMNS: &str = "chain_id::bigint AS chain_id, id, loan_token, collateral_token, \
    oracle, irm, lltv::text AS lltv, total_supply_assets::text AS total_supply_assets, \
    total_supply_shares::text AS total_supply_shares, \
    total_borrow_assets::text AS total_borrow_assets, \
    total_borrow_shares::text AS total_borrow_shares, last_update::text AS last_update, \
    fee::text AS fee, rate_at_target::text AS rate_at_target";

const VAULT_COLUMNS: &str = "chain_id::bigint AS chain_id, address, name, symbol, asset, owner, \
    curator, guardian, timelock::text AS timelock, fee::text AS fee, fee_recipient, \
    skim_recipient";

const QUEUE_COLUMNS: &str = "chain_id::bigint AS chain_id, address, ordinal::bigint AS ordinal, \
    market_id";

const LOG_COLUMNS: &str = "block_number::bigint AS block_number, log_index::bigint AS log_index, \
    transaction_index::bigint AS transaction_index, block_hash, transaction_hash, address, \
    topic0, topic1, topic2, topic3, data";

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;
        info!("Connected to indexer database");
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse<T: FromStr>(column: &'static str, value: &str) -> Result<T, StoreError> {
    value.parse().map_err(|_| StoreError::Corrupt {
        column,
        value: value.to_string(),
    })
}

/// Typed accessors over a row whose columns are all text, bigint or bool.
struct Columns<'a>(&'a PgRow);

impl Columns<'_> {
    fn text(&self, column: &'static str) -> Result<String, StoreError> {
        Ok(self.0.try_get::<String, _>(column)?)
    }

    fn opt_text(&self, column: &'static str) -> Result<Option<String>, StoreError> {
        Ok(self.0.try_get::<Option<String>, _>(column)?)
    }

    fn u64(&self, column: &'static str) -> Result<u64, StoreError> {
        let value: i64 = self.0.try_get(column)?;
        u64::try_from(value).map_err(|_| StoreError::Corrupt {
            column,
            value: value.to_string(),
        })
    }

    fn flag(&self, column: &'static str) -> Result<bool, StoreError> {
        Ok(self.0.try_get::<bool, _>(column)?)
    }

    fn address(&self, column: &'static str) -> Result<Address, StoreError> {
        parse(column, &self.text(column)?)
    }

    fn b256(&self, column: &'static str) -> Result<B256, StoreError> {
        parse(column, &self.text(column)?)
    }

    fn opt_b256(&self, column: &'static str) -> Result<Option<B256>, StoreError> {
        self.opt_text(column)?
            .map(|value| parse(column, &value))
            .transpose()
    }

    fn u256(&self, column: &'static str) -> Result<U256, StoreError> {
        parse(column, &self.text(column)?)
    }

    fn opt_u256(&self, column: &'static str) -> Result<Option<U256>, StoreError> {
        self.opt_text(column)?
            .map(|value| parse(column, &value))
            .transpose()
    }
}

fn market_row(row: &PgRow) -> Result<MarketRow, StoreError> {
    let c = Columns(row);
    Ok(MarketRow {
        chain_id: c.u64("chain_id")?,
        id: c.b256("id")?,
        loan_token: c.address("loan_token")?,
        collateral_token: c.address("collateral_token")?,
        oracle: c.address("oracle")?,
        irm: c.address("irm")?,
        lltv: c.u256("lltv")?,
        total_supply_assets: c.u256("total_supply_assets")?,
        total_supply_shares: c.u256("total_supply_shares")?,
        total_borrow_assets: c.u256("total_borrow_assets")?,
        total_borrow_shares: c.u256("total_borrow_shares")?,
        last_update: c.u256("last_update")?,
        fee: c.u256("fee")?,
        rate_at_target: c.opt_u256("rate_at_target")?,
    })
}

fn vault_row(row: &PgRow) -> Result<VaultRow, StoreError> {
    let c = Columns(row);
    Ok(VaultRow {
        chain_id: c.u64("chain_id")?,
        address: c.address("address")?,
        name: c.text("name")?,
        symbol: c.text("symbol")?,
        asset: c.address("asset")?,
        owner: c.address("owner")?,
        curator: c.address("curator")?,
        guardian: c.address("guardian")?,
        timelock: c.u256("timelock")?,
        fee: c.u256("fee")?,
        fee_recipient: c.address("fee_recipient")?,
        skim_recipient: c.address("skim_recipient")?,
    })
}

fn queue_row(row: &PgRow) -> Result<WithdrawQueueItemRow, StoreError> {
    let c = Columns(row);
    let ordinal = c.u64("ordinal")?;
    Ok(WithdrawQueueItemRow {
        chain_id: c.u64("chain_id")?,
        address: c.address("address")?,
        ordinal: u32::try_from(ordinal).map_err(|_| StoreError::Corrupt {
            column: "ordinal",
            value: ordinal.to_string(),
        })?,
        market_id: c.opt_b256("market_id")?,
    })
}

fn log_row(row: &PgRow) -> Result<ChainLog, StoreError> {
    let c = Columns(row);
    let mut topics = Vec::with_capacity(4);
    for column in ["topic0", "topic1", "topic2", "topic3"] {
        match c.opt_b256(column)? {
            Some(topic) => topics.push(topic),
            None => break,
        }
    }
    let data = c.text("data")?;
    Ok(ChainLog {
        block_number: c.u64("block_number")?,
        block_hash: c.b256("block_hash")?,
        transaction_hash: c.b256("transaction_hash")?,
        transaction_index: c.u64("transaction_index")?,
        log_index: c.u64("log_index")?,
        address: c.address("address")?,
        topics: topics.into_iter().collect(),
        data: parse::<Bytes>("data", &data)?,
    })
}

/// Last block whose events are all indexed, from a checkpoint string.
///
/// Layout: timestamp (10) | chain id (16) | block number (16) |
/// transaction index (16) | event type (1) | event index (16). A checkpoint
/// whose transaction index is not the end-of-block sentinel sits inside its
/// block, which is therefore only partially indexed. Inside block 0 nothing
/// is complete yet, which is `Ok(None)`.
pub(crate) fn checkpoint_block(checkpoint: &str) -> Result<Option<u64>, StoreError> {
    let corrupt = || StoreError::Corrupt {
        column: "latest_checkpoint",
        value: checkpoint.to_string(),
    };
    let block: u64 = checkpoint
        .get(26..42)
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(corrupt)?;
    let tx_index = checkpoint.get(42..58).ok_or_else(corrupt)?;
    if !tx_index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(corrupt());
    }

    if tx_index.bytes().all(|b| b == b'9') {
        Ok(Some(block))
    } else {
        Ok(block.checked_sub(1))
    }
}

fn hex_list<T: AsRef<[u8]>>(values: &[T]) -> Vec<String> {
    values.iter().map(hex_lower).collect()
}

#[async_trait]
impl IndexStore for PgStore {
    async fn market(&self, chain_id: u64, id: B256) -> Result<Option<MarketRow>, StoreError> {
        let sql = format!("SELECT {MARKET_COLUMNS} FROM market WHERE chain_id = $1 AND id = $2");
        sqlx::query(&sql)
            .bind(chain_id as i64)
            .bind(hex_lower(id))
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(market_row)
            .transpose()
    }

    async fn markets(&self, chain_id: u64, ids: &[B256]) -> Result<Vec<MarketRow>, StoreError> {
        let sql = format!(
            "SELECT {MARKET_COLUMNS} FROM market WHERE chain_id = $1 AND id = ANY($2) ORDER BY id"
        );
        sqlx::query(&sql)
            .bind(chain_id as i64)
            .bind(hex_list(ids))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(market_row)
            .collect()
    }

    async fn positions(
        &self,
        chain_id: u64,
        market_ids: &[B256],
    ) -> Result<Vec<PositionRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT chain_id::bigint AS chain_id, market_id, \"user\", \
             supply_shares::text AS supply_shares, borrow_shares::text AS borrow_shares, \
             collateral::text AS collateral \
             FROM position WHERE chain_id = $1 AND market_id = ANY($2) \
             ORDER BY market_id, \"user\"",
        )
        .bind(chain_id as i64)
        .bind(hex_list(market_ids))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let c = Columns(row);
                Ok(PositionRow {
                    chain_id: c.u64("chain_id")?,
                    market_id: c.b256("market_id")?,
                    user: c.address("user")?,
                    supply_shares: c.u256("supply_shares")?,
                    borrow_shares: c.u256("borrow_shares")?,
                    collateral: c.u256("collateral")?,
                })
            })
            .collect()
    }

    async fn vault(&self, chain_id: u64, address: Address) -> Result<Option<VaultRow>, StoreError> {
        let sql = format!("SELECT {VAULT_COLUMNS} FROM vault WHERE chain_id = $1 AND address = $2");
        sqlx::query(&sql)
            .bind(chain_id as i64)
            .bind(hex_lower(address))
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(vault_row)
            .transpose()
    }

    async fn vaults(&self, chain_id: u64, addresses: &[Address]) -> Result<Vec<VaultRow>, StoreError> {
        let sql = format!(
            "SELECT {VAULT_COLUMNS} FROM vault WHERE chain_id = $1 AND address = ANY($2) \
             ORDER BY address"
        );
        sqlx::query(&sql)
            .bind(chain_id as i64)
            .bind(hex_list(addresses))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(vault_row)
            .collect()
    }

    async fn vault_configs(
        &self,
        chain_id: u64,
        vault: Address,
    ) -> Result<Vec<VaultConfigRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT chain_id::bigint AS chain_id, address, market_id, cap::text AS cap, \
             pending_cap::text AS pending_cap, removable_at::text AS removable_at, enabled \
             FROM vault_config WHERE chain_id = $1 AND address = $2 ORDER BY market_id",
        )
        .bind(chain_id as i64)
        .bind(hex_lower(vault))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let c = Columns(row);
                Ok(VaultConfigRow {
                    chain_id: c.u64("chain_id")?,
                    address: c.address("address")?,
                    market_id: c.b256("market_id")?,
                    cap: c.u256("cap")?,
                    pending_cap: c.u256("pending_cap")?,
                    removable_at: c.u256("removable_at")?,
                    enabled: c.flag("enabled")?,
                })
            })
            .collect()
    }

    async fn withdraw_queue_items(
        &self,
        chain_id: u64,
        vaults: &[Address],
    ) -> Result<Vec<WithdrawQueueItemRow>, StoreError> {
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM vault_withdraw_queue_item \
             WHERE chain_id = $1 AND address = ANY($2) ORDER BY address, ordinal"
        );
        sqlx::query(&sql)
            .bind(chain_id as i64)
            .bind(hex_list(vaults))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(queue_row)
            .collect()
    }

    async fn withdraw_queue_items_for_market(
        &self,
        chain_id: u64,
        market_id: B256,
    ) -> Result<Vec<WithdrawQueueItemRow>, StoreError> {
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM vault_withdraw_queue_item \
             WHERE chain_id = $1 AND market_id = $2 ORDER BY address, ordinal"
        );
        sqlx::query(&sql)
            .bind(chain_id as i64)
            .bind(hex_lower(market_id))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(queue_row)
            .collect()
    }

    async fn pre_liquidation_contracts(
        &self,
        chain_id: u64,
        market_ids: &[B256],
    ) -> Result<Vec<PreLiquidationContractRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT chain_id::bigint AS chain_id, market_id, address, \
             pre_lltv::text AS pre_lltv, pre_lcf1::text AS pre_lcf1, pre_lcf2::text AS pre_lcf2, \
             pre_lif1::text AS pre_lif1, pre_lif2::text AS pre_lif2, pre_liquidation_oracle \
             FROM pre_liquidation_contract WHERE chain_id = $1 AND market_id = ANY($2) \
             ORDER BY market_id, address",
        )
        .bind(chain_id as i64)
        .bind(hex_list(market_ids))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let c = Columns(row);
                Ok(PreLiquidationContractRow {
                    chain_id: c.u64("chain_id")?,
                    market_id: c.b256("market_id")?,
                    address: c.address("address")?,
                    pre_lltv: c.u256("pre_lltv")?,
                    pre_lcf1: c.u256("pre_lcf1")?,
                    pre_lcf2: c.u256("pre_lcf2")?,
                    pre_lif1: c.u256("pre_lif1")?,
                    pre_lif2: c.u256("pre_lif2")?,
                    pre_liquidation_oracle: c.address("pre_liquidation_oracle")?,
                })
            })
            .collect()
    }

    async fn authorizations(
        &self,
        chain_id: u64,
        authorizees: &[Address],
    ) -> Result<Vec<AuthorizationRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT chain_id::bigint AS chain_id, authorizer, authorizee, is_authorized \
             FROM \"authorization\" WHERE chain_id = $1 AND authorizee = ANY($2)",
        )
        .bind(chain_id as i64)
        .bind(hex_list(authorizees))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let c = Columns(row);
                Ok(AuthorizationRow {
                    chain_id: c.u64("chain_id")?,
                    authorizer: c.address("authorizer")?,
                    authorizee: c.address("authorizee")?,
                    is_authorized: c.flag("is_authorized")?,
                })
            })
            .collect()
    }

    async fn latest_indexed_block(&self, chain_id: u64) -> Result<Option<u64>, StoreError> {
        let checkpoint: Option<String> = sqlx::query_scalar(
            "SELECT latest_checkpoint FROM _ponder_checkpoint WHERE chain_id = $1",
        )
        .bind(chain_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        match checkpoint {
            Some(checkpoint) => checkpoint_block(&checkpoint),
            None => Ok(None),
        }
    }

    async fn logs(&self, chain_id: u64, query: &LogQuery) -> Result<Vec<ChainLog>, StoreError> {
        let mut sql = QueryBuilder::<Postgres>::new(format!(
            "SELECT {LOG_COLUMNS} FROM ponder_sync.logs WHERE chain_id = "
        ));
        sql.push_bind(chain_id as i64)
            .push(" AND block_number >= ")
            .push_bind(query.from_block as i64)
            .push(" AND block_number <= ")
            .push_bind(query.to_block as i64);

        if let Some(hash) = query.block_hash {
            sql.push(" AND block_hash = ").push_bind(hex_lower(hash));
        }
        if !query.addresses.is_empty() {
            sql.push(" AND address = ANY(")
                .push_bind(hex_list(&query.addresses))
                .push(")");
        }
        for (position, filter) in query.topics.iter().enumerate().take(4) {
            if let Some(any_of) = filter {
                sql.push(format!(" AND topic{position} = ANY("))
                    .push_bind(hex_list(any_of))
                    .push(")");
            }
        }
        sql.push(" ORDER BY block_number, log_index LIMIT ")
            .push_bind(query.limit as i64);

        let rows = sql.build().fetch_all(&self.pool).await?;
        debug!(chain_id, rows = rows.len(), "Fetched indexed logs");
        rows.iter().map(log_row).collect()
    }
}

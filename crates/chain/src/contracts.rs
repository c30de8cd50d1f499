//! Contract bindings and event declarations for Morpho Blue and its periphery.

use alloy::sol;
use serde::{Deserialize, Serialize};
use std::fmt;

sol! {
    /// Morpho Blue market parameters.
    #[derive(Debug, PartialEq, Eq)]
    struct MarketParams {
        address loanToken;
        address collateralToken;
        address oracle;
        address irm;
        uint256 lltv;
    }

    /// Morpho Blue market totals.
    #[derive(Debug, PartialEq, Eq)]
    struct Market {
        uint128 totalSupplyAssets;
        uint128 totalSupplyShares;
        uint128 totalBorrowAssets;
        uint128 totalBorrowShares;
        uint128 lastUpdate;
        uint128 fee;
    }

    #[sol(rpc)]
    interface IMorpho {
        function market(bytes32 id) external view returns (
            uint128 totalSupplyAssets,
            uint128 totalSupplyShares,
            uint128 totalBorrowAssets,
            uint128 totalBorrowShares,
            uint128 lastUpdate,
            uint128 fee
        );

        function idToMarketParams(bytes32 id) external view returns (
            address loanToken,
            address collateralToken,
            address oracle,
            address irm,
            uint256 lltv
        );
    }

    /// Morpho oracle: price of 1 collateral unit in loan units, scaled by 1e36.
    #[sol(rpc)]
    interface IOracle {
        function price() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IIrm {
        function borrowRateView(MarketParams memory marketParams, Market memory market)
            external
            view
            returns (uint256);
    }
}

/// Human-readable creation event of the MetaMorpho factory.
pub const CREATE_META_MORPHO_EVENT: &str = "event CreateMetaMorpho(address indexed metaMorpho, address indexed caller, address initialOwner, uint256 initialTimelock, address indexed asset, string name, string symbol, bytes32 salt)";

/// Parameter of [`CREATE_META_MORPHO_EVENT`] carrying the vault address.
pub const CREATE_META_MORPHO_PARAMETER: &str = "metaMorpho";

/// Human-readable creation event of the PreLiquidation factory.
pub const CREATE_PRE_LIQUIDATION_EVENT: &str = "event CreatePreLiquidation(address indexed preLiquidation, bytes32 id, (uint256 preLltv, uint256 preLCF1, uint256 preLCF2, uint256 preLIF1, uint256 preLIF2, address preLiquidationOracle) preLiquidationParams)";

/// Parameter of [`CREATE_PRE_LIQUIDATION_EVENT`] carrying the contract address.
pub const CREATE_PRE_LIQUIDATION_PARAMETER: &str = "preLiquidation";

/// Kind of contract watched by the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractKind {
    Morpho,
    MetaMorphoFactory,
    /// Vaults, discovered from [`ContractKind::MetaMorphoFactory`]
    MetaMorpho,
    AdaptiveCurveIrm,
    PreLiquidationFactory,
    /// Pre-liquidation contracts, discovered from [`ContractKind::PreLiquidationFactory`]
    PreLiquidation,
}

impl ContractKind {
    pub const ALL: [ContractKind; 6] = [
        Self::Morpho,
        Self::MetaMorphoFactory,
        Self::MetaMorpho,
        Self::AdaptiveCurveIrm,
        Self::PreLiquidationFactory,
        Self::PreLiquidation,
    ];

    /// Config key / display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morpho => "morpho",
            Self::MetaMorphoFactory => "metaMorphoFactory",
            Self::MetaMorpho => "metaMorpho",
            Self::AdaptiveCurveIrm => "adaptiveCurveIrm",
            Self::PreLiquidationFactory => "preLiquidationFactory",
            Self::PreLiquidation => "preLiquidation",
        }
    }

    /// Prefix of the environment variables overriding this contract.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::Morpho => "MORPHO",
            Self::MetaMorphoFactory => "META_MORPHO_FACTORY",
            Self::MetaMorpho => "META_MORPHO",
            Self::AdaptiveCurveIrm => "ADAPTIVE_CURVE_IRM",
            Self::PreLiquidationFactory => "PRE_LIQUIDATION_FACTORY",
            Self::PreLiquidation => "PRE_LIQUIDATION",
        }
    }

    /// For factory-derived kinds: the factory kind, creation event and parameter.
    pub fn factory_source(&self) -> Option<(ContractKind, &'static str, &'static str)> {
        match self {
            Self::MetaMorpho => Some((
                Self::MetaMorphoFactory,
                CREATE_META_MORPHO_EVENT,
                CREATE_META_MORPHO_PARAMETER,
            )),
            Self::PreLiquidation => Some((
                Self::PreLiquidationFactory,
                CREATE_PRE_LIQUIDATION_EVENT,
                CREATE_PRE_LIQUIDATION_PARAMETER,
            )),
            _ => None,
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

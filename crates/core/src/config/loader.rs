//! Configuration loader.
//!
//! Settings are read from an optional TOML file (`CONFIG_PATH`, default
//! `config/indexer.toml`) with `${VAR}` expansion, then overridden by
//! environment variables. Everything is validated eagerly; the first invalid
//! setting aborts startup with an error naming the variable or TOML key.

use super::{
    AddressSource, ChainConfig, ChainName, ChainRegistry, ConfigError, ContractWatch,
    DEFAULT_POLLING_INTERVAL,
};
use alloy::primitives::Address;
use indexer_chain::{transport, ContractKind, ExprError, FactoryRef, TransportExpr, TransportOptions};
use regex_lite::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config/indexer.toml";

const DEFAULT_PORT: u16 = 42069;
const DEFAULT_RATE_LIMIT_PER_SECOND: u32 = 20;
const DEFAULT_MAX_CONCURRENT_READS: usize = 8;
const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_LOGS: usize = 10_000;

/// HTTP surface settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Requests per client per one-second window
    pub rate_limit_per_second: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            rate_limit_per_second: DEFAULT_RATE_LIMIT_PER_SECOND,
        }
    }
}

/// Query, engine and log emulation knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Markets evaluated concurrently by the liquidation engine
    pub max_concurrent_reads: usize,
    /// Bound on each live read (and each leaf RPC request)
    pub rpc_timeout: Duration,
    /// Bound on each storage query
    pub store_timeout: Duration,
    /// Maximum logs returned by one `eth_getLogs`
    pub max_logs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reads: DEFAULT_MAX_CONCURRENT_READS,
            rpc_timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            max_logs: DEFAULT_MAX_LOGS,
        }
    }
}

/// Fully validated service configuration.
#[derive(Debug)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    /// Postgres connection string of the indexer database
    pub database_url: Option<String>,
    pub registry: ChainRegistry,
}

// ============================================================================
// Raw TOML
// ============================================================================

/// Integer, or string that may contain `${VAR}` placeholders.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Int(i64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    database_url: Option<String>,
    selected_chains: Option<Vec<String>>,
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    engine: RawEngine,
    #[serde(default)]
    chains: BTreeMap<String, RawChain>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServer {
    port: Option<RawValue>,
    rate_limit_per_second: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEngine {
    max_concurrent_reads: Option<RawValue>,
    rpc_timeout_ms: Option<RawValue>,
    store_timeout_ms: Option<RawValue>,
    max_logs: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChain {
    /// Transport expression
    rpc: Option<String>,
    polling_interval_ms: Option<RawValue>,
    #[serde(default)]
    contracts: BTreeMap<String, RawContract>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawContract {
    address: Option<String>,
    start_block: Option<RawValue>,
}

// ============================================================================
// Resolution
// ============================================================================

/// A raw setting value and the variable or key it came from.
#[derive(Debug, Clone)]
struct Setting {
    name: String,
    value: String,
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env placeholder pattern is valid"))
}

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("address pattern is valid"))
}

struct Resolver<'a> {
    env: &'a dyn Fn(&str) -> Option<String>,
}

impl Resolver<'_> {
    /// Non-empty environment variable.
    fn env(&self, name: &str) -> Option<Setting> {
        (self.env)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| Setting {
                name: name.to_string(),
                value,
            })
    }

    /// Expand `${VAR}` placeholders. An unset variable is an error naming it.
    fn expand(&self, text: &str) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in env_pattern().captures_iter(text) {
            let (Some(whole), Some(var)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = (self.env)(var.as_str())
                .ok_or_else(|| ConfigError::MissingEnv(var.as_str().to_string()))?;
            out.push_str(&text[last..whole.start()]);
            out.push_str(&value);
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out.trim().to_string())
    }

    fn toml(&self, key: String, raw: &RawValue) -> Result<Setting, ConfigError> {
        let value = match raw {
            RawValue::Int(i) => i.to_string(),
            RawValue::Text(text) => self.expand(text)?,
        };
        Ok(Setting { name: key, value })
    }

    /// Environment override, else TOML value, else `default`.
    fn number<T: FromStr>(
        &self,
        env: &str,
        key: &str,
        raw: Option<&RawValue>,
        default: T,
    ) -> Result<T, ConfigError> {
        let setting = match (self.env(env), raw) {
            (Some(setting), _) => setting,
            (None, Some(raw)) => self.toml(key.to_string(), raw)?,
            (None, None) => return Ok(default),
        };
        setting.value.parse().map_err(|_| ConfigError::InvalidNumber {
            name: setting.name,
            value: setting.value,
        })
    }
}

fn parse_address(setting: &Setting) -> Result<Address, ConfigError> {
    let invalid = || ConfigError::InvalidAddress {
        name: setting.name.clone(),
        value: setting.value.clone(),
    };
    if !address_pattern().is_match(&setting.value) {
        return Err(invalid());
    }
    setting.value.parse().map_err(|_| invalid())
}

fn parse_start_block(setting: &Setting) -> Result<u64, ConfigError> {
    setting
        .value
        .parse()
        .map_err(|_| ConfigError::InvalidStartBlock {
            name: setting.name.clone(),
            value: setting.value.clone(),
        })
}

/// Contract kinds with a literal address (factory children are derived).
fn configurable_kind(key: &str) -> Option<ContractKind> {
    ContractKind::ALL
        .into_iter()
        .find(|kind| kind.as_str() == key && kind.factory_source().is_none())
}

impl ServiceConfig {
    /// Load from `CONFIG_PATH` (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => {
                info!(path = %path, "Loading configuration file");
                Some(text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path, "No configuration file, using built-in chain defaults");
                None
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        Self::from_sources(text.as_deref(), &path, &|name: &str| std::env::var(name).ok())
    }

    /// Build from TOML text (if any) and an environment lookup.
    pub fn from_sources(
        toml_text: Option<&str>,
        origin: &str,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw: RawConfig = match toml_text {
            Some(text) => toml::from_str(text).map_err(|source| ConfigError::Parse {
                path: origin.to_string(),
                source,
            })?,
            None => RawConfig::default(),
        };
        let resolver = Resolver { env };

        let server = ServerConfig {
            port: resolver.number("PORT", "server.port", raw.server.port.as_ref(), DEFAULT_PORT)?,
            rate_limit_per_second: resolver.number(
                "RATE_LIMIT_PER_SECOND",
                "server.rate_limit_per_second",
                raw.server.rate_limit_per_second.as_ref(),
                DEFAULT_RATE_LIMIT_PER_SECOND,
            )?,
        };

        let engine = EngineConfig {
            max_concurrent_reads: resolver
                .number(
                    "MAX_CONCURRENT_READS",
                    "engine.max_concurrent_reads",
                    raw.engine.max_concurrent_reads.as_ref(),
                    DEFAULT_MAX_CONCURRENT_READS,
                )?
                .max(1),
            rpc_timeout: Duration::from_millis(resolver.number(
                "RPC_TIMEOUT_MS",
                "engine.rpc_timeout_ms",
                raw.engine.rpc_timeout_ms.as_ref(),
                DEFAULT_RPC_TIMEOUT_MS,
            )?),
            store_timeout: Duration::from_millis(resolver.number(
                "STORE_TIMEOUT_MS",
                "engine.store_timeout_ms",
                raw.engine.store_timeout_ms.as_ref(),
                DEFAULT_STORE_TIMEOUT_MS,
            )?),
            max_logs: resolver.number(
                "MAX_LOGS",
                "engine.max_logs",
                raw.engine.max_logs.as_ref(),
                DEFAULT_MAX_LOGS,
            )?,
        };

        let database_url = match resolver.env("DATABASE_URL") {
            Some(setting) => Some(setting.value),
            None => raw
                .database_url
                .as_deref()
                .map(|url| resolver.expand(url))
                .transpose()?,
        };

        let mut chains = BTreeMap::new();
        let mut keys: BTreeMap<ChainName, String> = BTreeMap::new();
        for (key, chain) in raw.chains {
            let name = key.parse::<ChainName>()?;
            if let Some(first) = keys.insert(name, key.clone()) {
                return Err(ConfigError::DuplicateChainKey {
                    chain: name.to_string(),
                    first,
                    second: key,
                });
            }
            chains.insert(name, chain);
        }

        let selected = selected_chains(&resolver, raw.selected_chains.as_deref(), &chains)?;
        let options = TransportOptions::with_timeout(engine.rpc_timeout);

        let mut registry = ChainRegistry::new();
        for name in selected {
            registry.register(build_chain(name, chains.get(&name), &resolver, &options)?)?;
        }
        if registry.is_empty() {
            return Err(ConfigError::NoChains);
        }

        Ok(Self {
            server,
            engine,
            database_url,
            registry,
        })
    }

    /// Log the loaded configuration.
    pub fn log_config(&self) {
        info!(
            port = self.server.port,
            rate_limit_per_second = self.server.rate_limit_per_second,
            database = self.database_url.is_some(),
            "Server configuration"
        );
        info!(
            max_concurrent_reads = self.engine.max_concurrent_reads,
            rpc_timeout_ms = self.engine.rpc_timeout.as_millis() as u64,
            store_timeout_ms = self.engine.store_timeout.as_millis() as u64,
            max_logs = self.engine.max_logs,
            "Engine configuration"
        );
        for chain in self.registry.all() {
            for watch in &chain.contracts {
                match &watch.address {
                    AddressSource::Literal(address) => info!(
                        chain = %chain.name,
                        contract = %watch.kind,
                        address = %address,
                        start_block = watch.start_block,
                        "Watching contract"
                    ),
                    AddressSource::Factory(factory) => info!(
                        chain = %chain.name,
                        contract = %watch.kind,
                        factory = %factory.address,
                        event = factory.event_name(),
                        parameter = factory.parameter(),
                        start_block = watch.start_block,
                        "Watching factory children"
                    ),
                }
            }
        }
    }
}

/// `SELECTED_CHAINS`, else `selected_chains`, else the chains in the file, else all.
fn selected_chains(
    resolver: &Resolver<'_>,
    from_file: Option<&[String]>,
    configured: &BTreeMap<ChainName, RawChain>,
) -> Result<Vec<ChainName>, ConfigError> {
    let listed: Option<Vec<String>> = match resolver.env("SELECTED_CHAINS") {
        Some(setting) => Some(setting.value.split(',').map(str::to_string).collect()),
        None => from_file.map(<[String]>::to_vec),
    };

    match listed {
        Some(list) => list
            .iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| name.parse())
            .collect(),
        None if !configured.is_empty() => Ok(configured.keys().copied().collect()),
        None => Ok(ChainName::ALL.to_vec()),
    }
}

fn build_chain(
    name: ChainName,
    raw: Option<&RawChain>,
    resolver: &Resolver<'_>,
    options: &TransportOptions,
) -> Result<ChainConfig, ConfigError> {
    let key = |field: &str| format!("chains.{name}.{field}");

    let rpc = match raw.and_then(|chain| chain.rpc.as_deref()) {
        Some(text) => Setting {
            name: key("rpc"),
            value: resolver.expand(text)?,
        },
        None => resolver
            .env(&name.rpc_env_var())
            .ok_or_else(|| ConfigError::MissingEnv(name.rpc_env_var()))?,
    };
    let invalid = |source: ExprError| ConfigError::InvalidTransport {
        name: rpc.name.clone(),
        source,
    };
    let transport_expr = TransportExpr::parse(&rpc.value).map_err(&invalid)?;
    let transport = transport::build(&transport_expr, options).map_err(invalid)?;

    let polling_ms = match raw.and_then(|chain| chain.polling_interval_ms.as_ref()) {
        Some(value) => {
            let setting = resolver.toml(key("polling_interval_ms"), value)?;
            setting.value.parse().map_err(|_| ConfigError::InvalidNumber {
                name: setting.name,
                value: setting.value,
            })?
        }
        None => DEFAULT_POLLING_INTERVAL.as_millis() as u64,
    };

    // Deployed defaults, then file values, then (local chain only) env overrides
    let mut literals: BTreeMap<ContractKind, (Address, u64)> = name
        .default_contracts()
        .into_iter()
        .map(|(kind, address, start_block)| (kind, (address, start_block)))
        .collect();

    if let Some(raw) = raw {
        for (contract_key, contract) in &raw.contracts {
            let prefix = key(&format!("contracts.{contract_key}"));
            let kind = configurable_kind(contract_key)
                .ok_or_else(|| ConfigError::UnknownContract { name: prefix.clone() })?;
            let entry = literals.entry(kind).or_insert((Address::ZERO, 0));

            if let Some(text) = &contract.address {
                entry.0 = parse_address(&Setting {
                    name: format!("{prefix}.address"),
                    value: resolver.expand(text)?,
                })?;
            }
            if let Some(value) = &contract.start_block {
                entry.1 = parse_start_block(&resolver.toml(format!("{prefix}.start_block"), value)?)?;
            }
        }
    }

    if name == ChainName::LocalDocker {
        for (kind, entry) in literals.iter_mut() {
            if let Some(setting) = resolver.env(&format!("{}_ADDRESS", kind.env_prefix())) {
                entry.0 = parse_address(&setting)?;
            }
            if let Some(setting) = resolver.env(&format!("{}_START_BLOCK", kind.env_prefix())) {
                entry.1 = parse_start_block(&setting)?;
            }
        }
    }

    let mut contracts: Vec<ContractWatch> = literals
        .iter()
        .map(|(kind, (address, start_block))| ContractWatch {
            kind: *kind,
            address: AddressSource::Literal(*address),
            start_block: *start_block,
        })
        .collect();

    for child in ContractKind::ALL {
        let Some((factory_kind, event, parameter)) = child.factory_source() else {
            continue;
        };
        let Some((address, start_block)) = literals.get(&factory_kind) else {
            continue;
        };
        let factory = FactoryRef::new(*address, event, parameter).map_err(|source| {
            ConfigError::InvalidFactory {
                name: key(&format!("contracts.{factory_kind}")),
                source,
            }
        })?;
        contracts.push(ContractWatch {
            kind: child,
            address: AddressSource::Factory(factory),
            start_block: *start_block,
        });
    }

    Ok(ChainConfig {
        name,
        chain_id: name.chain_id(),
        transport,
        transport_expr,
        polling_interval: Duration::from_millis(polling_ms),
        contracts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(toml: Option<&str>, vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_sources(toml, "test.toml", &move |name: &str| vars.get(name).cloned())
    }

    const RPC_VARS: [(&str, &str); 2] = [
        ("PONDER_RPC_URL_11155931", "https://testnet.riselabs.xyz"),
        ("PONDER_RPC_URL_1337", "http://localhost:8545"),
    ];

    #[test]
    fn test_defaults_without_file() {
        let config = load(None, &RPC_VARS).unwrap();

        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.registry.len(), 2);

        let rise = config.registry.get(ChainName::RiseTestnet).unwrap();
        assert_eq!(rise.chain_id, 11_155_931);
        assert_eq!(rise.polling_interval, Duration::from_secs(10));
        assert_eq!(rise.contract(ContractKind::MetaMorphoFactory).unwrap().start_block, 14_812_082);

        let vaults = rise.contract(ContractKind::MetaMorpho).unwrap();
        assert_eq!(vaults.start_block, 14_812_082);
        let AddressSource::Factory(factory) = &vaults.address else {
            panic!("vaults must be factory-derived");
        };
        assert_eq!(factory.parameter(), "metaMorpho");
        assert_eq!(factory.event_name(), "CreateMetaMorpho");

        assert!(matches!(
            rise.contract(ContractKind::PreLiquidation).unwrap().address,
            AddressSource::Factory(_)
        ));
    }

    #[test]
    fn test_missing_rpc_names_variable() {
        let err = load(None, &[("PONDER_RPC_URL_1337", "http://localhost:8545")]).unwrap_err();
        assert_eq!(err.to_string(), "PONDER_RPC_URL_11155931 env var is not set");
    }

    #[test]
    fn test_selected_chains_env() {
        let config = load(
            None,
            &[("SELECTED_CHAINS", "localDocker"), ("PONDER_RPC_URL_1337", "http://localhost:8545")],
        )
        .unwrap();
        assert_eq!(config.registry.supported_names(), vec!["localDocker"]);

        let err = load(None, &[("SELECTED_CHAINS", "mainnet")]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownChain(name) if name == "mainnet"));
    }

    #[test]
    fn test_invalid_address_env_names_variable() {
        let err = load(
            None,
            &[
                ("SELECTED_CHAINS", "localDocker"),
                ("PONDER_RPC_URL_1337", "http://localhost:8545"),
                ("MORPHO_ADDRESS", "0x1234"),
            ],
        )
        .unwrap_err();
        assert!(matches!(&err, ConfigError::InvalidAddress { name, .. } if name == "MORPHO_ADDRESS"));
        assert!(err.to_string().contains("MORPHO_ADDRESS"));
    }

    #[test]
    fn test_env_overrides_apply_to_local_chain() {
        let config = load(
            None,
            &[
                ("PONDER_RPC_URL_11155931", "https://testnet.riselabs.xyz"),
                ("PONDER_RPC_URL_1337", "http://localhost:8545"),
                ("MORPHO_ADDRESS", "0x1111111111111111111111111111111111111111"),
                ("MORPHO_START_BLOCK", "42"),
            ],
        )
        .unwrap();

        let local = config.registry.get(ChainName::LocalDocker).unwrap();
        assert_eq!(local.contract(ContractKind::Morpho).unwrap().start_block, 42);
        assert_eq!(
            local.address_of(ContractKind::Morpho).unwrap(),
            "0x1111111111111111111111111111111111111111".parse::<Address>().unwrap()
        );

        let rise = config.registry.get(ChainName::RiseTestnet).unwrap();
        assert_ne!(rise.address_of(ContractKind::Morpho), local.address_of(ContractKind::Morpho));
    }

    #[test]
    fn test_invalid_start_block_env() {
        let err = load(
            None,
            &[
                ("SELECTED_CHAINS", "localDocker"),
                ("PONDER_RPC_URL_1337", "http://localhost:8545"),
                ("META_MORPHO_FACTORY_START_BLOCK", "-1"),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "META_MORPHO_FACTORY_START_BLOCK must be a positive integer, got `-1`"
        );
    }

    #[test]
    fn test_invalid_transport_names_variable_and_substring() {
        let err = load(
            None,
            &[
                ("SELECTED_CHAINS", "localDocker"),
                ("PONDER_RPC_URL_1337", "fallback(http://a,ws://b)"),
            ],
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("PONDER_RPC_URL_1337"), "{message}");
        assert!(message.contains("ws://b"), "{message}");
    }

    #[test]
    fn test_toml_file() {
        let toml = r#"
            database_url = "postgres://${DB_USER}@localhost/ponder"

            [server]
            port = 8080

            [engine]
            max_concurrent_reads = "${READS}"

            [chains.localDocker]
            rpc = "loadbalance(fallback(${RPC_A},http://b:8545),http://c:8545)"
            polling_interval_ms = 2000

            [chains.localDocker.contracts.morpho]
            address = "0x2222222222222222222222222222222222222222"
            start_block = "7"
        "#;
        let config = load(
            Some(toml),
            &[("DB_USER", "indexer"), ("READS", "4"), ("RPC_A", "http://a:8545"), ("PORT", "9000")],
        )
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://indexer@localhost/ponder"));
        // env wins over the file
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.engine.max_concurrent_reads, 4);
        assert_eq!(config.registry.len(), 1);

        let local = config.registry.get(ChainName::LocalDocker).unwrap();
        assert_eq!(local.polling_interval, Duration::from_secs(2));
        assert_eq!(local.transport_expr.endpoint_count(), 3);
        assert_eq!(local.contract(ContractKind::Morpho).unwrap().start_block, 7);
    }

    #[test]
    fn test_toml_errors_name_keys() {
        let err = load(
            Some("[chains.localDocker]\nrpc = \"${MISSING_RPC}\"\n"),
            &[],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "MISSING_RPC env var is not set");

        let err = load(
            Some(
                "[chains.localDocker]\nrpc = \"http://a\"\n[chains.localDocker.contracts.morpho]\nstart_block = -3\n",
            ),
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("chains.localDocker.contracts.morpho.start_block"));

        let err = load(
            Some("[chains.localDocker]\nrpc = \"http://a\"\n[chains.localDocker.contracts.metaMorpho]\naddress = \"0x2222222222222222222222222222222222222222\"\n"),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownContract { .. }));
    }

    #[test]
    fn test_duplicate_chain_keys_rejected() {
        let toml = r#"
            [chains.riseTestnet]
            rpc = "http://a:8545"

            [chains.rise-testnet]
            rpc = "http://b:8545"
        "#;
        let err = load(Some(toml), &RPC_VARS).unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::DuplicateChainKey { first, second, .. }
                if first == "rise-testnet" && second == "riseTestnet"
        ));
        assert_eq!(
            err.to_string(),
            "chains.rise-testnet and chains.riseTestnet both configure `riseTestnet`"
        );
    }

    #[test]
    fn test_invalid_number() {
        let err = load(None, &[("PORT", "eighty"), ("SELECTED_CHAINS", "localDocker")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name, .. } if name == "PORT"));
    }
}

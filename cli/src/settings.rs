//! Runtime settings: command-line flags, process environment, `.env` file.
//!
//! Precedence, highest first: explicit flag, process environment, env file,
//! built-in default. Empty values count as unset.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Args;
use serde::Serialize;

use txwatch_core::{IndexerConfig, IndexerError};

use crate::logging::LogConfig;

pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_PORT: u16 = 8080;

/// Flags shared by every command. Each one overrides its environment variable.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Env file with KEY=VALUE lines [env: ENV_FILE_PATH] (default: .env)
    #[arg(long = "env", global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
    /// JSON-RPC endpoint [env: RPC_ENDPOINT]
    #[arg(long, global = true, value_name = "URL")]
    pub rpc: Option<String>,
    /// Maximum concurrent block fetches [env: CONCURRENCY]
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,
    /// Blocks per checkpoint step [env: CHUNK_SIZE]
    #[arg(long, global = true)]
    pub chunk_size: Option<u64>,
    /// Fetch attempts per block [env: MAX_RETRIES]
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,
    /// Blocks behind the tip to start from [env: LOOKBACK]
    #[arg(long, global = true)]
    pub lookback: Option<u64>,
    /// Tip polling interval [env: POLL_INTERVAL_MS]
    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,
    /// HTTP listen port [env: PORT]
    #[arg(long, global = true)]
    pub port: Option<u16>,
    /// Comma-separated addresses to watch from startup [env: ADDRESSES]
    #[arg(long, global = true)]
    pub addresses: Option<String>,
    /// First block for `scan` [env: DEFAULT_START_BLOCK]
    #[arg(long, global = true)]
    pub start: Option<u64>,
    /// Last block for `scan` [env: DEFAULT_END_BLOCK]
    #[arg(long, global = true)]
    pub end: Option<u64>,
    /// Log level [env: LOG_LEVEL]
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Per-crate levels, e.g. txwatch_evm=debug,tower_http=warn [env: LOG_COMPONENTS]
    #[arg(long, global = true)]
    pub log_components: Option<String>,
    /// Emit JSON logs [env: LOG_JSON]
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Fully resolved settings for one process.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub indexer: IndexerConfig,
    pub port: u16,
    pub addresses: Vec<String>,
    pub start_block: Option<u64>,
    pub end_block: Option<u64>,
    pub log: LogConfig,
}

/// Environment sources below the command line.
#[derive(Debug, Default)]
struct Layers {
    process: HashMap<String, String>,
    file: HashMap<String, String>,
}

impl Layers {
    fn get(&self, key: &str) -> Option<&str> {
        [&self.process, &self.file]
            .into_iter()
            .filter_map(|layer| layer.get(key))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    fn parse<T>(&self, flag: Option<T>, key: &str) -> Result<Option<T>, IndexerError>
    where
        T: FromStr,
        T::Err: Display,
    {
        if flag.is_some() {
            return Ok(flag);
        }
        self.get(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| IndexerError::Config(format!("{key}={raw:?}: {e}")))
            })
            .transpose()
    }
}

impl Settings {
    /// Load settings from the process environment and the env file.
    pub fn load(args: &ConfigArgs) -> Result<Self, IndexerError> {
        let process: HashMap<String, String> = std::env::vars().collect();
        let path = args
            .env_file
            .clone()
            .or_else(|| process.get("ENV_FILE_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE));
        let file = read_env_file(&path)?;
        Self::resolve(args, &Layers { process, file })
    }

    fn resolve(args: &ConfigArgs, env: &Layers) -> Result<Self, IndexerError> {
        let defaults = IndexerConfig::default();
        let indexer = IndexerConfig {
            rpc_url: env
                .parse(args.rpc.clone(), "RPC_ENDPOINT")?
                .unwrap_or(defaults.rpc_url),
            concurrency: env
                .parse(args.concurrency, "CONCURRENCY")?
                .unwrap_or(defaults.concurrency),
            chunk_size: env
                .parse(args.chunk_size, "CHUNK_SIZE")?
                .unwrap_or(defaults.chunk_size),
            max_retries: env
                .parse(args.max_retries, "MAX_RETRIES")?
                .unwrap_or(defaults.max_retries),
            backoff_base_ms: env
                .parse::<u64>(None, "BACKOFF_BASE_MS")?
                .unwrap_or(defaults.backoff_base_ms),
            lookback: env
                .parse(args.lookback, "LOOKBACK")?
                .unwrap_or(defaults.lookback),
            poll_interval_ms: env
                .parse(args.poll_interval_ms, "POLL_INTERVAL_MS")?
                .unwrap_or(defaults.poll_interval_ms),
            request_timeout_ms: env
                .parse::<u64>(None, "REQUEST_TIMEOUT_MS")?
                .unwrap_or(defaults.request_timeout_ms),
        };
        indexer.validate()?;

        let addresses = env
            .parse(args.addresses.clone(), "ADDRESSES")?
            .map(|list: String| parse_addresses(&list))
            .unwrap_or_default();

        let log_json = if args.log_json {
            true
        } else {
            match env.get("LOG_JSON") {
                Some(raw) => parse_bool("LOG_JSON", raw)?,
                None => false,
            }
        };

        let components = match env.parse(args.log_components.clone(), "LOG_COMPONENTS")? {
            Some(list) => LogConfig::parse_components(&list)
                .map_err(|e| IndexerError::Config(format!("LOG_COMPONENTS: {e}")))?,
            None => Default::default(),
        };

        Ok(Self {
            indexer,
            port: env.parse(args.port, "PORT")?.unwrap_or(DEFAULT_PORT),
            addresses,
            start_block: env.parse(args.start, "DEFAULT_START_BLOCK")?,
            end_block: env.parse(args.end, "DEFAULT_END_BLOCK")?,
            log: LogConfig {
                level: env
                    .parse(args.log_level.clone(), "LOG_LEVEL")?
                    .unwrap_or_else(|| "info".into()),
                components,
                json: log_json,
            },
        })
    }
}

/// Split a comma-separated address list, dropping blanks.
pub fn parse_addresses(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, IndexerError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(IndexerError::Config(format!("{key}={raw:?}: expected a boolean"))),
    }
}

/// Read an env file with `dotenvy` without touching the process
/// environment. A missing file yields no values.
fn read_env_file(path: &Path) -> Result<HashMap<String, String>, IndexerError> {
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(e) if e.not_found() => {
            tracing::debug!(path = %path.display(), "no env file, using environment and defaults");
            return Ok(HashMap::new());
        }
        Err(e) => {
            return Err(IndexerError::Config(format!(
                "cannot read {}: {e}",
                path.display()
            )))
        }
    };

    entries
        .map(|entry| entry.map_err(|e| IndexerError::Config(format!("{}: {e}", path.display()))))
        .collect()
}

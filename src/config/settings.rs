use crate::error::{LedgerError, Result};
use log::debug;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DIFFICULTY: u32 = 24;
pub const MAX_DIFFICULTY: u32 = 256;

static DEFAULT_DB_PATH: &str = "data/blocks";
static DEFAULT_CONFIG_FILE: &str = "ledger.toml";

const CONFIG_FILE_KEY: &str = "LEDGER_CONFIG";
const DB_PATH_KEY: &str = "LEDGER_DB_PATH";
const DIFFICULTY_KEY: &str = "LEDGER_DIFFICULTY";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    /// Leading zero bits required of a block hash; used until a difficulty
    /// has been persisted with the chain.
    pub difficulty: u32,
    pub open_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            difficulty: DEFAULT_DIFFICULTY,
            open_retries: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file named by `LEDGER_CONFIG` (or `ledger.toml`
    /// if present), then `LEDGER_DB_PATH` / `LEDGER_DIFFICULTY`.
    pub fn load() -> Result<Config> {
        let mut config = match env::var(CONFIG_FILE_KEY) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            Err(_) => Config::default(),
        };

        if let Ok(path) = env::var(DB_PATH_KEY) {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(value) = env::var(DIFFICULTY_KEY) {
            config.difficulty = value.parse().map_err(|e| {
                LedgerError::Config(format!("{DIFFICULTY_KEY} must be an integer: {e}"))
            })?;
        }

        config.validate()?;
        debug!("Loaded configuration: {config:?}");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_db_path<P: Into<PathBuf>>(mut self, db_path: P) -> Config {
        self.db_path = db_path.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> Config {
        self.difficulty = difficulty;
        self
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn validate(&self) -> Result<()> {
        validate_difficulty(self.difficulty)?;
        if self.open_retries == 0 {
            return Err(LedgerError::Config(
                "open_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Difficulty must leave a non-empty target: `1..=256` leading zero bits.
pub fn validate_difficulty(difficulty: u32) -> Result<()> {
    if difficulty == 0 || difficulty > MAX_DIFFICULTY {
        return Err(LedgerError::Config(format!(
            "difficulty must be between 1 and {MAX_DIFFICULTY}, got {difficulty}"
        )));
    }
    Ok(())
}

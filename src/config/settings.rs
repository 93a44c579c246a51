use crate::core::Difficulty;
use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
static DEFAULT_DATA_DIR: &str = "data";
static DEFAULT_DIFFICULTY: &str = "0000";
const DEFAULT_PEER_TIMEOUT_MS: u64 = 5000;
const DEFAULT_CONSENSUS_INTERVAL_SECS: u64 = 60;
const DEFAULT_MAX_MINING_ATTEMPTS: u32 = 3;

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_ID_KEY: &str = "NODE_ID";
const DATA_DIR_KEY: &str = "DATA_DIR";
const DIFFICULTY_KEY: &str = "DIFFICULTY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP surface binds to and announces to peers
    pub node_addr: String,
    /// Node identifier; defaults to the listen port
    pub node_id: Option<String>,
    pub data_dir: PathBuf,
    pub difficulty: String,
    pub peer_timeout_ms: u64,
    /// Seconds between background synchronize rounds, 0 disables them
    pub consensus_interval_secs: u64,
    pub max_mining_attempts: u32,
    pub bootstrap_peers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_addr: String::from(DEFAULT_NODE_ADDR),
            node_id: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            difficulty: String::from(DEFAULT_DIFFICULTY),
            peer_timeout_ms: DEFAULT_PEER_TIMEOUT_MS,
            consensus_interval_secs: DEFAULT_CONSENSUS_INTERVAL_SECS,
            max_mining_attempts: DEFAULT_MAX_MINING_ATTEMPTS,
            bootstrap_peers: Vec::new(),
        }
    }
}

impl Config {
    /// Defaults, then the TOML file if one is given, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Config> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = env::var(NODE_ADDRESS_KEY) {
            self.node_addr = addr;
        }
        if let Ok(node_id) = env::var(NODE_ID_KEY) {
            self.node_id = Some(node_id);
        }
        if let Ok(dir) = env::var(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(difficulty) = env::var(DIFFICULTY_KEY) {
            self.difficulty = difficulty;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.difficulty()?;
        if self.max_mining_attempts == 0 {
            return Err(LedgerError::Config(
                "max_mining_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn difficulty(&self) -> Result<Difficulty> {
        Difficulty::new(&self.difficulty)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    pub fn consensus_interval(&self) -> Option<Duration> {
        match self.consensus_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Extract node ID from address (e.g., "127.0.0.1:2001" -> "2001")
    pub fn extract_node_id_from_addr(&self) -> String {
        if let Some(port) = self.node_addr.split(':').next_back() {
            port.to_string()
        } else {
            "default".to_string()
        }
    }

    pub fn node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| self.extract_node_id_from_addr())
    }

    /// Per-node database directory (./data/node_2001/) so several nodes
    /// can run on one machine with isolated databases
    pub fn node_db_path(&self) -> PathBuf {
        self.data_dir.join(format!("node_{}", self.node_id()))
    }
}

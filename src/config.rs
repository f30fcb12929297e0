use std::{path::Path, time::Duration};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::storage::{self, StorageManager};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_DEBOUNCE_MS: u64 = 300;
const MAX_DEBOUNCE_MS: u64 = 10_000;

const DEFAULT_TAGGING_ENDPOINT: &str = "https://api.deepseek.com/v1";
const DEFAULT_TAGGING_MODEL: &str = "deepseek-chat";
const DEFAULT_TEMPERATURE: f32 = 1.0;
const DEFAULT_MAX_TOKENS: u32 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BATCH_SIZE: usize = 5;
const DEFAULT_BATCH_DELAY_MS: u64 = 2000;

const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Quiet window before a typed query runs
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

/// Chat-completion service used to suggest tags
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaggingConfig {
    #[serde(default = "default_tagging_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_tagging_model")]
    pub model: String,

    /// Overridden by `TAGMARK_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bookmarks tagged concurrently during a bulk retag
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between two retag batches
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TAGGING_ENDPOINT.to_string(),
            model: DEFAULT_TAGGING_MODEL.to_string(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
        }
    }
}

impl TaggingConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var("TAGMARK_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

fn default_tagging_endpoint() -> String {
    DEFAULT_TAGGING_ENDPOINT.to_string()
}

fn default_tagging_model() -> String {
    DEFAULT_TAGGING_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_batch_delay_ms() -> u64 {
    DEFAULT_BATCH_DELAY_MS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Sessions untouched for this long are dropped
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
        }
    }
}

impl DaemonConfig {
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_session_idle_secs() -> u64 {
    DEFAULT_SESSION_IDLE_SECS
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub tagging: TaggingConfig,
    /// Where exports land; the working directory when unset
    #[serde(default)]
    pub export_dir: Option<String>,
    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.search.debounce_ms > MAX_DEBOUNCE_MS {
            bail!(
                "search.debounce_ms must be at most {MAX_DEBOUNCE_MS}, got {}",
                self.search.debounce_ms
            );
        }

        if self.daemon.session_idle_secs == 0 {
            bail!("daemon.session_idle_secs must be greater than 0");
        }

        let tagging = &self.tagging;
        if tagging.batch_size == 0 {
            bail!("tagging.batch_size must be greater than 0");
        }
        if tagging.endpoint.trim().is_empty() {
            bail!("tagging.endpoint must not be empty");
        }
        if tagging.model.trim().is_empty() {
            bail!("tagging.model must not be empty");
        }
        if !(0.0..=2.0).contains(&tagging.temperature) {
            bail!(
                "tagging.temperature must be between 0.0 and 2.0, got {}",
                tagging.temperature
            );
        }

        Ok(())
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)
            .with_context(|| format!("failed to create {base_path}"))?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms)
    }

    pub fn export_dir(&self) -> &Path {
        Path::new(self.export_dir.as_deref().unwrap_or("."))
    }
}

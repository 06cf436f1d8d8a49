//! Replay settings management
//!
//! Stores run configuration in a plain JSON file. Command-line flags
//! override values loaded from here.

use directories::ProjectDirs;
use indexmap::IndexMap;
use openapi_parser::{ExampleMode, ResolverConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{ReplayError, Result};

/// Replay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplaySettings {
    /// Settings file version
    pub version: u32,
    /// Base URL override; falls back to the spec's first server
    pub base_url: Option<String>,
    /// Attempts per request before giving up (at least one is always made)
    pub max_retries: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Schema resolution depth bound
    pub max_depth: usize,
    /// Seed for reproducible random examples
    pub example_seed: Option<u64>,
    /// Use random examples instead of fixed placeholders
    pub random_examples: bool,
    /// Where execution results are persisted
    pub results_file: Option<PathBuf>,
    /// Headers sent with every request
    pub headers: IndexMap<String, String>,
    /// Chat-completions endpoint used by the LLM planner
    pub llm: LlmSettings,
}

/// Connection settings for an OpenAI-compatible chat-completions API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,
    /// Completion timeout in seconds
    pub timeout_secs: u64,
    /// Bearer token; usually supplied through the environment instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4-turbo".to_string(),
            timeout_secs: 60,
            api_key: None,
        }
    }
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            version: 1,
            base_url: None,
            max_retries: 3,
            timeout_secs: 10,
            retry_delay_ms: 2000,
            max_depth: openapi_parser::DEFAULT_MAX_DEPTH,
            example_seed: None,
            random_examples: false,
            results_file: None,
            headers: IndexMap::new(),
            llm: LlmSettings::default(),
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ReplaySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Example mode: a seed wins over the random flag
    pub fn example_mode(&self) -> ExampleMode {
        match (self.example_seed, self.random_examples) {
            (Some(seed), _) => ExampleMode::Seeded(seed),
            (None, true) => ExampleMode::Random,
            (None, false) => ExampleMode::Fixed,
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            max_depth: self.max_depth,
            ..ResolverConfig::default()
        }
    }
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: ReplaySettings,
}

impl SettingsManager {
    /// Create a settings manager for `settings.json` in the given directory
    pub fn new(storage_dir: &Path) -> Self {
        Self::from_file(storage_dir.join("settings.json"))
    }

    /// Create a settings manager for an explicit file path
    pub fn from_file(settings_file: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_file).unwrap_or_default();

        Self {
            settings_file,
            settings,
        }
    }

    /// Default settings directory for this user
    pub fn default_dir() -> Result<PathBuf> {
        ProjectDirs::from("com", "symbia-labs", "api-replay")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| {
                ReplayError::StorageError("Could not determine config directory".to_string())
            })
    }

    fn load_from_file(path: &Path) -> Result<ReplaySettings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(ReplaySettings::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: ReplaySettings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.settings)?;

        if let Some(parent) = self.settings_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &ReplaySettings {
        &self.settings
    }

    /// Get mutable settings
    pub fn get_mut(&mut self) -> &mut ReplaySettings {
        &mut self.settings
    }

    /// Update settings and save
    pub async fn update(&mut self, settings: ReplaySettings) -> Result<()> {
        self.settings = settings;
        self.save().await
    }

    /// Take the loaded settings
    pub fn into_settings(self) -> ReplaySettings {
        self.settings
    }
}

// Application settings
// Loaded from ~/.config/gridpilot/settings.json, or an explicit --config
// file (JSON or TOML by extension)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// AI provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIProvider {
    /// AI features disabled (default)
    #[default]
    None,
    /// OpenAI API
    #[serde(rename = "openai")]
    OpenAI,
    /// OpenAI-compatible server at `ai.endpoint`
    Local,
    /// Anthropic API
    Anthropic,
}

impl AIProvider {
    /// Parse a provider name as written in settings (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(AIProvider::None),
            "openai" => Some(AIProvider::OpenAI),
            "local" => Some(AIProvider::Local),
            "anthropic" => Some(AIProvider::Anthropic),
            _ => None,
        }
    }

    /// Returns true if AI features are enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AIProvider::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AIProvider::None => "none",
            AIProvider::OpenAI => "openai",
            AIProvider::Local => "local",
            AIProvider::Anthropic => "anthropic",
        }
    }

    /// Local servers take no key
    pub fn needs_api_key(&self) -> bool {
        matches!(self, AIProvider::OpenAI | AIProvider::Anthropic)
    }

    /// Whether `gpilot ask` can talk to this provider
    pub fn is_implemented(&self) -> bool {
        matches!(self, AIProvider::OpenAI | AIProvider::Local)
    }

    /// Returns the default model for this provider
    pub fn default_model(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::OpenAI => "gpt-4o",
            AIProvider::Local => "llama3:8b",
            AIProvider::Anthropic => "claude-sonnet-4-20250514",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            AIProvider::Local => "http://localhost:11434/v1",
            AIProvider::Anthropic => "https://api.anthropic.com/v1",
            AIProvider::None | AIProvider::OpenAI => "https://api.openai.com/v1",
        }
    }
}

/// AI-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AISettings {
    /// Selected AI provider
    pub provider: AIProvider,

    /// Model identifier (provider-specific, empty = provider default)
    pub model: String,

    /// Base URL of the chat-completions API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    pub temperature: f32,

    pub max_tokens: u32,

    pub timeout_secs: u64,
}

impl Default for AISettings {
    fn default() -> Self {
        Self {
            provider: AIProvider::None,
            model: String::new(),
            endpoint: None,
            temperature: 0.2,
            max_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

impl AISettings {
    /// Get the effective model (user-specified or provider default)
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    /// Get the effective endpoint, without a trailing slash
    pub fn effective_endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_endpoint())
            .trim_end_matches('/')
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // History
    #[serde(rename = "history.capacity")]
    pub history_capacity: usize,

    #[serde(rename = "history.verifyBeforeUndo")]
    pub verify_before_undo: bool,

    #[serde(rename = "history.maxSnapshotCells")]
    pub max_snapshot_cells: u64,

    // Executor
    #[serde(rename = "executor.chartAnchor")]
    pub chart_anchor: String,

    #[serde(rename = "executor.strictPayloads")]
    pub strict_payloads: bool,

    // Batch: "continue", "stop" or "atomic"
    #[serde(rename = "batch.policy")]
    pub batch_policy: String,

    // AI
    #[serde(rename = "ai", default)]
    pub ai: AISettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_capacity: 20,
            verify_before_undo: true,
            max_snapshot_cells: 100_000,
            chart_anchor: "H2".to_string(),
            strict_payloads: false,
            batch_policy: "continue".to_string(),
            ai: AISettings::default(),
        }
    }
}

/// Failure reading an explicit settings file
#[derive(Debug)]
pub enum SettingsError {
    Io { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io { path, message } => write!(f, "cannot read {}: {}", path.display(), message),
            SettingsError::Parse { path, message } => write!(f, "invalid settings in {}: {}", path.display(), message),
        }
    }
}

impl std::error::Error for SettingsError {}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridpilot");
        config_dir.join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults.
    /// A missing file is not an error; a broken one is reported and ignored.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Load an explicit settings file. `.toml` files are TOML, anything else
    /// is JSON with `//` comment lines.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        let parsed = if is_toml {
            Self::from_toml_str(&contents)
        } else {
            Self::from_json_str(&contents)
        };
        parsed.map_err(|message| SettingsError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse settings JSON. Lines starting with `//` are comments.
    pub fn from_json_str(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        if cleaned.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    /// Parse settings TOML. Dotted keys must be quoted
    /// (`"history.capacity" = 50`) or the `[ai]` table used for AI keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, String> {
        toml::from_str(contents).map_err(|e| e.to_string())
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Get the config file path for display
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

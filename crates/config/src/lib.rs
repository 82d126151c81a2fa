//! `gridpilot-config`: the settings file, AI provider settings and API key lookup.

pub mod ai;
pub mod settings;

pub use ai::{
    env_var_name, get_api_key, keychain_available, set_api_key, AIConfigStatus, KeyLookup, KeySource,
    ResolvedAIConfig,
};
pub use settings::{AIProvider, AISettings, Settings, SettingsError};

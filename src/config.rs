//! Assistant configuration, persisted as TOML.
//!
//! Missing keys fall back to defaults, so config files written by older
//! versions keep loading after new settings are introduced.

use std::collections::BTreeMap;
use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or saving the configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(steward::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(steward::config::parse),
        help("Check the TOML syntax in the config file, or delete it to regenerate defaults.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(steward::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level assistant configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Prefix stripped from utterances before resolution.
    #[serde(default = "default_wake_word")]
    pub wake_word: String,
    /// Application name → launch command.
    #[serde(default = "default_apps")]
    pub apps: BTreeMap<String, String>,
    /// Website name → URL.
    #[serde(default = "default_web_shortcuts")]
    pub web_shortcuts: BTreeMap<String, String>,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub capabilities: CapabilitySettings,
}

/// Settings for the learned-tier inference service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Whether the learned tier is consulted at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_llm_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

/// Timing knobs for dispatch, skill replay and composite commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    /// How long to wait for a yes/no answer before treating it as "no".
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
    /// Pause between replayed skill steps.
    #[serde(default = "default_skill_pause")]
    pub skill_step_pause_ms: u64,
    /// Pause between sub-commands of a composite utterance.
    #[serde(default = "default_composite_pause")]
    pub composite_pause_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitySettings {
    #[serde(default)]
    pub privacy: PrivacySettings,
    #[serde(default)]
    pub compliance: ComplianceSettings,
    #[serde(default)]
    pub provenance: ProvenanceSettings,
    #[serde(default)]
    pub cost: CostSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivacySettings {
    /// Replace PII in the input itself, not only in the audit log.
    #[serde(default)]
    pub scrub_input: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceSettings {
    /// `system_control` actions that are never allowed.
    #[serde(default = "default_prohibited_actions")]
    pub prohibited_actions: Vec<String>,
    /// Shell command fragments that block a `system_command`.
    #[serde(default = "default_prohibited_commands")]
    pub prohibited_commands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSettings {
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_daily_token_limit")]
    pub daily_token_limit: u64,
}

fn default_true() -> bool {
    true
}
fn default_wake_word() -> String {
    "steward".into()
}
fn default_apps() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("calculator".to_string(), "gnome-calculator".to_string()),
        ("notepad".to_string(), "gedit".to_string()),
        ("terminal".to_string(), "x-terminal-emulator".to_string()),
    ])
}
fn default_web_shortcuts() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("google".to_string(), "https://www.google.com".to_string()),
        ("youtube".to_string(), "https://www.youtube.com".to_string()),
        ("whatsapp".to_string(), "https://web.whatsapp.com".to_string()),
    ])
}
fn default_llm_url() -> String {
    "http://localhost:11434".into()
}
fn default_llm_model() -> String {
    "llama3".into()
}
fn default_llm_timeout() -> u64 {
    30
}
fn default_confirm_timeout() -> u64 {
    10
}
fn default_skill_pause() -> u64 {
    1000
}
fn default_composite_pause() -> u64 {
    1500
}
fn default_prohibited_actions() -> Vec<String> {
    vec![
        "format_drive".into(),
        "delete_system32".into(),
        "crypto_mining".into(),
    ]
}
fn default_prohibited_commands() -> Vec<String> {
    vec!["rm -rf /".into(), "mkfs".into(), "format c:".into(), ":(){".into()]
}
fn default_max_input_chars() -> usize {
    20_000
}
fn default_daily_token_limit() -> u64 {
    100_000
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            wake_word: default_wake_word(),
            apps: default_apps(),
            web_shortcuts: default_web_shortcuts(),
            llm: LlmSettings::default(),
            dispatch: DispatchSettings::default(),
            capabilities: CapabilitySettings::default(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_llm_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            confirm_timeout_secs: default_confirm_timeout(),
            skill_step_pause_ms: default_skill_pause(),
            composite_pause_ms: default_composite_pause(),
        }
    }
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            prohibited_actions: default_prohibited_actions(),
            prohibited_commands: default_prohibited_commands(),
        }
    }
}

impl Default for ProvenanceSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            daily_token_limit: default_daily_token_limit(),
        }
    }
}

impl AssistantConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, path)
    }

    /// Load the file if it exists; otherwise write the defaults there and return them.
    pub fn load_or_init(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.save(path)?;
        tracing::info!(path = %path.display(), "wrote default config");
        Ok(config)
    }

    fn from_toml(content: &str, path: &Path) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Names that trim an open-target down to the bare app ("open whatsapp web" → "whatsapp").
    pub fn known_apps(&self) -> Vec<String> {
        let mut names: Vec<String> = self.apps.keys().cloned().collect();
        if !names.iter().any(|n| n == "whatsapp") {
            names.push("whatsapp".into());
        }
        names
    }
}

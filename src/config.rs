//! Runtime configuration and client profiles.
//!
//! LLM and server settings come from the environment (`.env` is loaded by
//! `main`). Client profiles are loaded from `*.json` files in the profiles
//! directory and cached behind a `RwLock` so they can be edited at runtime.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::calculation::CalculationPolicy;

const DEFAULT_MODEL: &str = "gpt-4.1";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TEMPLATE: &str = "energisa_padrao.html";
const DEFAULT_PROFILE: &str = "default";

/// Settings for the chat-completion API.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 80,
            max_retries: 2,
            retry_backoff_ms: 1000,
        }
    }
}

impl LlmConfig {
    /// Read `OPENAI_API_KEY`, `OPENAI_MODEL`, `OPENAI_BASE_URL`,
    /// `LLM_TIMEOUT_SECS` and `LLM_MAX_RETRIES`.
    ///
    /// A missing key is not an error here; it is reported when a batch runs.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout_secs = match get("LLM_TIMEOUT_SECS") {
            Some(v) => v.parse().with_context(|| format!("Invalid LLM_TIMEOUT_SECS: {v}"))?,
            None => defaults.timeout_secs,
        };
        let max_retries = match get("LLM_MAX_RETRIES") {
            Some(v) => v.parse().with_context(|| format!("Invalid LLM_MAX_RETRIES: {v}"))?,
            None => defaults.max_retries,
        };

        Ok(Self {
            api_key: get("OPENAI_API_KEY").unwrap_or_default(),
            model: get("OPENAI_MODEL").unwrap_or(defaults.model),
            base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            timeout_secs,
            max_retries,
            retry_backoff_ms: defaults.retry_backoff_ms,
        })
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub profiles_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            profiles_dir: std::env::var("PROFILES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("clients")),
        }
    }
}

/// Per-client processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
    pub name: String,
    #[serde(default)]
    pub politica_calculo: CalculationPolicy,
    /// Free-text instructions injected into the prompt with priority.
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub template_fatura: Option<String>,
    /// Account flag carried for the rendering layer. It does not select the
    /// calculation policy or the template: a custom template is kept either way.
    #[serde(default)]
    pub is_vip: bool,
}

impl ClientProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            politica_calculo: CalculationPolicy::Standard,
            prompt_template: None,
            template_fatura: None,
            is_vip: false,
        }
    }

    /// Instructions for the prompt, if any non-blank text was configured.
    pub fn instructions(&self) -> Option<&str> {
        self.prompt_template
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Invoice template: the configured one, or the Energisa default.
    pub fn invoice_template(&self) -> &str {
        self.template_fatura
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_TEMPLATE)
    }
}

/// In-memory store for all loaded profiles, backed by `RwLock` for runtime mutations.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    profiles: Arc<RwLock<HashMap<String, ClientProfile>>>,
}

impl ProfileStore {
    /// Load all profiles from the specified directory.
    ///
    /// A missing directory is not fatal: the store then holds only the
    /// built-in `default` profile.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut profiles = HashMap::new();

        if dir.exists() {
            for entry in std::fs::read_dir(dir)
                .with_context(|| format!("Failed to list profiles in {:?}", dir))?
            {
                let path = entry?.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read profile: {:?}", path))?;
                    let profile: ClientProfile = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse profile: {:?}", path))?;

                    info!("Loaded client profile: {} from {:?}", profile.name, path);
                    profiles.insert(profile.name.clone(), profile);
                }
            }
        } else {
            warn!("Profiles directory {:?} not found, using built-in default", dir);
        }

        Ok(Self::from_profiles(profiles.into_values().collect()))
    }

    /// Create a store from a list of profiles, adding `default` if absent.
    pub fn from_profiles(profiles: Vec<ClientProfile>) -> Self {
        let mut map: HashMap<String, ClientProfile> = profiles
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        map.entry(DEFAULT_PROFILE.to_string())
            .or_insert_with(|| ClientProfile::named(DEFAULT_PROFILE));

        Self {
            profiles: Arc::new(RwLock::new(map)),
        }
    }

    /// Get a profile by name (returns clone).
    pub fn get(&self, name: &str) -> Option<ClientProfile> {
        self.profiles
            .read()
            .ok()
            .and_then(|profiles| profiles.get(name).cloned())
    }

    /// The built-in fallback profile.
    pub fn default_profile(&self) -> ClientProfile {
        self.get(DEFAULT_PROFILE)
            .unwrap_or_else(|| ClientProfile::named(DEFAULT_PROFILE))
    }

    /// List all available profile names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .profiles
            .read()
            .map(|profiles| profiles.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Insert or update a profile in the in-memory cache.
    pub fn insert(&self, profile: ClientProfile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(profile.name.clone(), profile);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_llm_config_defaults() {
        let cfg = LlmConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.api_key, "");
        assert_eq!(cfg.model, "gpt-4.1");
        assert_eq!(cfg.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.timeout_secs, 80);
        assert_eq!(cfg.max_retries, 2);
    }

    #[test]
    fn test_llm_config_overrides() {
        let cfg = LlmConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", " sk-abc "),
            ("OPENAI_MODEL", ""),
            ("LLM_TIMEOUT_SECS", "30"),
            ("LLM_MAX_RETRIES", "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.api_key, "sk-abc");
        assert_eq!(cfg.model, "gpt-4.1");
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.max_retries, 0);
    }

    #[test]
    fn test_llm_config_rejects_bad_numbers() {
        assert!(LlmConfig::from_lookup(lookup(&[("LLM_TIMEOUT_SECS", "soon")])).is_err());
    }

    #[test]
    fn test_profile_parsing() {
        let raw = r#"{"name":"solar_vip","politica_calculo":"vip","prompt_template":"  use 25%  ","is_vip":true}"#;
        let profile: ClientProfile = serde_json::from_str(raw).unwrap();
        assert_eq!(profile.politica_calculo, CalculationPolicy::Vip);
        assert_eq!(profile.instructions(), Some("use 25%"));
        assert_eq!(profile.invoice_template(), "energisa_padrao.html");
    }

    #[test]
    fn test_vip_flag_does_not_change_template_or_policy() {
        let mut profile = ClientProfile::named("solar");
        profile.template_fatura = Some("solar_vip.html".to_string());

        profile.is_vip = true;
        assert_eq!(profile.invoice_template(), "solar_vip.html");
        assert_eq!(profile.politica_calculo, CalculationPolicy::Standard);

        profile.is_vip = false;
        assert_eq!(profile.invoice_template(), "solar_vip.html");

        profile.template_fatura = Some("  ".to_string());
        profile.is_vip = true;
        assert_eq!(profile.invoice_template(), "energisa_padrao.html");
    }

    #[test]
    fn test_blank_instructions_are_ignored() {
        let mut profile = ClientProfile::named("x");
        profile.prompt_template = Some("   ".to_string());
        assert_eq!(profile.instructions(), None);
    }

    #[test]
    fn test_store_always_has_default() {
        let store = ProfileStore::from_profiles(vec![ClientProfile::named("acme")]);
        assert_eq!(store.list(), vec!["acme".to_string(), "default".to_string()]);
        assert_eq!(store.default_profile().politica_calculo, CalculationPolicy::Standard);
    }

    #[test]
    fn test_missing_dir_falls_back_to_default() {
        let store = ProfileStore::load_from_dir(Path::new("/nonexistent/profiles")).unwrap();
        assert_eq!(store.list(), vec!["default".to_string()]);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = std::env::temp_dir().join(format!("fatura-profiles-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("acme.json"),
            r#"{"name":"acme","politica_calculo":"padrao"}"#,
        )
        .unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let store = ProfileStore::load_from_dir(&dir).unwrap();
        assert!(store.get("acme").is_some());
        assert_eq!(store.list().len(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_insert_updates_profile() {
        let store = ProfileStore::from_profiles(Vec::new());
        let mut profile = ClientProfile::named("acme");
        profile.politica_calculo = CalculationPolicy::Vip;
        store.insert(profile);
        assert_eq!(store.get("acme").unwrap().politica_calculo, CalculationPolicy::Vip);
    }
}

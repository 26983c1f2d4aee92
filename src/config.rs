use crate::error::PromptError;
use crate::llm::Provider;
use anyhow::Result;
use dirs::{config_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

pub const APP_DIR_NAME: &str = "llm-runner";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const API_KEY_FILE_NAME: &str = ".openai-api-key.txt";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Overrides the provider's default endpoint, e.g. a proxy or local server.
    pub api_base: Option<String>,
}

pub fn default_config_path() -> Result<PathBuf> {
    let base = config_dir()
        .ok_or_else(|| PromptError::Settings("unable to resolve OS config directory".to_string()))?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

pub fn load_config_if_exists(path: &Path) -> Result<Option<AppConfig>> {
    if path.exists() {
        let text = fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: AppConfig = toml::from_str(&text).map_err(|e| {
            PromptError::Settings(format!("parsing config file {}: {}", path.display(), e))
        })?;
        Ok(Some(cfg))
    } else {
        Ok(None)
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides<'a> {
    pub profile: Option<&'a str>,
    pub provider: Option<&'a str>,
    pub model: Option<&'a str>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub provider: Provider,
    pub model: String,
    pub api_base: Option<String>,
    pub profile_api_key: Option<String>,
    pub timeout: Duration,
}

pub fn effective_settings_from(
    cfg: Option<&AppConfig>,
    overrides: &SettingsOverrides,
) -> Result<EffectiveSettings, PromptError> {
    let mut profile: Option<&Profile> = None;
    if let Some(cfg) = cfg {
        let name = overrides
            .profile
            .map(|s| s.to_string())
            .or_else(|| cfg.default_profile.clone())
            .unwrap_or_else(|| "default".to_string());
        profile = cfg.profiles.get(&name);
        if profile.is_none() && overrides.profile.is_some() {
            return Err(PromptError::Settings(format!("profile not found: {}", name)));
        }
    } else if let Some(name) = overrides.profile {
        return Err(PromptError::Settings(format!(
            "profile not found: {} (no config file)",
            name
        )));
    }

    let provider_name = overrides
        .provider
        .map(|s| s.to_string())
        .or_else(|| profile.and_then(|p| p.provider.clone()))
        .unwrap_or_else(|| Provider::OpenAi.name().to_string());
    let provider = Provider::from_str(&provider_name)
        .ok_or_else(|| PromptError::Settings(format!("unsupported provider: {}", provider_name)))?;

    let model = overrides
        .model
        .map(|s| s.to_string())
        .or_else(|| profile.and_then(|p| p.model.clone()))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let api_base = profile
        .and_then(|p| p.api_base.clone())
        .or_else(|| provider.default_api_base());

    Ok(EffectiveSettings {
        provider,
        model,
        api_base,
        profile_api_key: profile.and_then(|p| p.api_key.clone()),
        timeout: Duration::from_secs(overrides.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    })
}

pub fn resolve_effective_settings(overrides: &SettingsOverrides) -> Result<EffectiveSettings> {
    let path = default_config_path()?;
    let cfg = load_config_if_exists(&path)?;
    tracing::debug!(path = %path.display(), found = cfg.is_some(), "config file");
    Ok(effective_settings_from(cfg.as_ref(), overrides)?)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Look up the API key for `provider`: its environment variable, then (for
/// OpenAI) `~/.openai-api-key.txt`, then the profile's `api_key`.
///
/// `Ok(None)` means the provider runs without a key.
pub fn resolve_api_key(
    provider: Provider,
    profile_key: Option<&str>,
    lookup_env: impl Fn(&str) -> Option<String>,
    home: Option<&Path>,
) -> Result<Option<String>, PromptError> {
    let Some(env_var) = provider.key_env_var() else {
        return Ok(None);
    };
    if let Some(key) = non_blank(lookup_env(env_var)) {
        tracing::debug!(source = env_var, "using API key from environment");
        return Ok(Some(key));
    }
    let key_file = home
        .filter(|_| provider == Provider::OpenAi)
        .map(|h| h.join(API_KEY_FILE_NAME));
    if let Some(path) = key_file.as_deref() {
        if path.is_file() {
            let text = fs::read_to_string(path).map_err(|source| PromptError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if let Some(key) = non_blank(Some(text)) {
                tracing::debug!(source = %path.display(), "using API key from file");
                return Ok(Some(key));
            }
        }
    }
    if let Some(key) = non_blank(profile_key.map(|s| s.to_string())) {
        tracing::debug!("using API key from config profile");
        return Ok(Some(key));
    }
    if !provider.requires_key() {
        return Ok(None);
    }
    let hint = match key_file {
        Some(path) => format!(
            "set {} or create {} or add api_key to the config profile",
            env_var,
            path.display()
        ),
        None => format!("set {} or add api_key to the config profile", env_var),
    };
    Err(PromptError::CredentialMissing {
        provider: provider.name().to_string(),
        hint,
    })
}

/// Everything the executor needs, fixed once at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub provider: Provider,
    pub model: String,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl RunConfig {
    pub fn resolve(overrides: &SettingsOverrides) -> Result<Self> {
        let eff = resolve_effective_settings(overrides)?;
        let home = home_dir();
        let api_key = resolve_api_key(
            eff.provider,
            eff.profile_api_key.as_deref(),
            |name| env::var(name).ok(),
            home.as_deref(),
        )?;
        tracing::debug!(
            provider = eff.provider.name(),
            model = %eff.model,
            api_base = ?eff.api_base,
            has_key = api_key.is_some(),
            "run configuration"
        );
        Ok(Self {
            provider: eff.provider,
            model: eff.model,
            api_base: eff.api_base,
            api_key,
            timeout: eff.timeout,
        })
    }
}

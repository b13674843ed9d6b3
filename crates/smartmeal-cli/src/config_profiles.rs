//! Named CLI profiles stored as JSON under the user config directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use smartmeal_core::util::normalize_text_option;
use smartmeal_core::ClientConfig;

const PROFILE_ENV_VAR: &str = "SMARTMEAL_PROFILE";
const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CliProfilesConfig {
    pub version: u32,
    pub active_profile: Option<String>,
    pub profiles: BTreeMap<String, CliProfile>,
}

impl Default for CliProfilesConfig {
    fn default() -> Self {
        Self {
            version: 1,
            active_profile: None,
            profiles: BTreeMap::new(),
        }
    }
}

/// Per-profile overrides; anything left unset falls back to env and bootstrap.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CliProfile {
    pub api_base_url: Option<String>,
    pub kroger_client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub zip_code: Option<String>,
    pub bootstrap_manifest_url: Option<String>,
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("smartmeal").join("cli-config.json"))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from(&default_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, String> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(error) => return Err(format!("Failed to read {}: {error}", path.display())),
        };
        serde_json::from_str::<Self>(&raw)
            .map(Self::normalized)
            .map_err(|error| format!("Failed to parse {}: {error}", path.display()))
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| format!("Failed to create {}: {error}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(&self.clone().normalized())
            .map_err(|error| format!("Failed to serialize profiles: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write {}: {error}", path.display()))
    }

    /// Explicit flag, then `SMARTMEAL_PROFILE`, then the active profile.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        [
            explicit.map(str::to_string),
            std::env::var(PROFILE_ENV_VAR).ok(),
            self.active_profile.clone(),
        ]
        .into_iter()
        .find_map(normalize_text_option)
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    fn normalized(mut self) -> Self {
        self.active_profile = normalize_text_option(self.active_profile);
        for profile in self.profiles.values_mut() {
            *profile = std::mem::take(profile).normalized();
        }
        self
    }
}

impl CliProfile {
    /// Library config seeded from this profile; env overrides are applied later.
    pub fn to_client_config(&self) -> ClientConfig {
        let profile = self.clone().normalized();
        let defaults = ClientConfig::default();
        ClientConfig {
            api_base_url: profile.api_base_url,
            kroger_client_id: profile.kroger_client_id,
            redirect_uri: profile
                .redirect_uri
                .unwrap_or_else(|| defaults.redirect_uri.clone()),
            zip_code: profile.zip_code,
            bootstrap_manifest_url: profile.bootstrap_manifest_url,
            ..defaults
        }
    }

    fn normalized(self) -> Self {
        Self {
            api_base_url: normalize_text_option(self.api_base_url)
                .map(|url| url.trim_end_matches('/').to_string()),
            kroger_client_id: normalize_text_option(self.kroger_client_id),
            redirect_uri: normalize_text_option(self.redirect_uri),
            zip_code: normalize_text_option(self.zip_code),
            bootstrap_manifest_url: normalize_text_option(self.bootstrap_manifest_url),
        }
    }
}

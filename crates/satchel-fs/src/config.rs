use crate::workspace::WorkspacePaths;
use satchel_core::{SatchelError, SatchelResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_PROFILE: &str = "default";
pub const DEFAULT_SERVER_URL: &str = "https://getpocket.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub version: u32,
    pub active_profile: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_key: Option<String>,
}

/// User-tunable behaviour shared by every profile in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Minimum age of the stored cursor before a diff fetch is attempted.
    #[serde(default = "default_retrieve_interval_minutes")]
    pub retrieve_interval_minutes: u64,
    /// Items requested per page during a full fetch.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Items shown per page by `satchel list`.
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    #[serde(default)]
    pub close_tab_on_add: bool,
    #[serde(default)]
    pub close_tab_on_read: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retrieve_interval_minutes: default_retrieve_interval_minutes(),
            page_size: default_page_size(),
            per_page: default_per_page(),
            close_tab_on_add: false,
            close_tab_on_read: false,
        }
    }
}

fn default_retrieve_interval_minutes() -> u64 {
    15
}

fn default_page_size() -> usize {
    100
}

fn default_per_page() -> usize {
    30
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub name: String,
    pub active: bool,
    pub server: String,
    pub has_consumer_key: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedProfile {
    pub name: String,
    pub server: String,
    pub consumer_key: Option<String>,
}

impl WorkspaceConfig {
    pub fn with_default_server(server: impl Into<String>) -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            DEFAULT_PROFILE.to_string(),
            ProfileConfig {
                server: server.into(),
                consumer_key: None,
            },
        );

        Self {
            version: CONFIG_VERSION,
            active_profile: DEFAULT_PROFILE.to_string(),
            profiles,
            settings: Settings::default(),
        }
    }

    pub fn ensure_defaults(&mut self) {
        if self.version == 0 {
            self.version = CONFIG_VERSION;
        }

        if self.profiles.is_empty() {
            self.profiles.insert(
                DEFAULT_PROFILE.to_string(),
                ProfileConfig {
                    server: DEFAULT_SERVER_URL.to_string(),
                    consumer_key: None,
                },
            );
        }

        if self.active_profile.is_empty() || !self.profiles.contains_key(&self.active_profile) {
            self.active_profile = self
                .profiles
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        }

        if self.settings.page_size == 0 {
            self.settings.page_size = default_page_size();
        }
    }
}

pub fn load_config(paths: &WorkspacePaths) -> SatchelResult<WorkspaceConfig> {
    let contents = fs::read_to_string(&paths.config_path).map_err(|err| {
        SatchelError::io(format!(
            "failed to read workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })?;

    let mut config: WorkspaceConfig = toml::from_str(&contents).map_err(|err| {
        SatchelError::io(format!(
            "failed to parse workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })?;
    config.ensure_defaults();
    Ok(config)
}

pub fn save_config(paths: &WorkspacePaths, config: &WorkspaceConfig) -> SatchelResult<()> {
    let serialized = toml::to_string_pretty(config)
        .map_err(|err| SatchelError::io(format!("failed to encode config.toml: {err}")))?;

    fs::write(&paths.config_path, serialized).map_err(|err| {
        SatchelError::io(format!(
            "failed to write workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })
}

pub fn list_profiles(config: &WorkspaceConfig) -> Vec<ProfileView> {
    config
        .profiles
        .iter()
        .map(|(name, profile)| ProfileView {
            name: name.clone(),
            active: name == &config.active_profile,
            server: profile.server.clone(),
            has_consumer_key: profile.consumer_key.is_some(),
        })
        .collect()
}

pub fn set_active_profile(config: &mut WorkspaceConfig, name: &str) -> SatchelResult<()> {
    if !config.profiles.contains_key(name) {
        return Err(SatchelError::usage(format!(
            "profile '{name}' not found in workspace config"
        )));
    }

    config.active_profile = name.to_string();
    Ok(())
}

/// Creates or updates a profile. An absent consumer key keeps the one
/// already stored.
pub fn set_profile(
    config: &mut WorkspaceConfig,
    name: &str,
    server: &str,
    consumer_key: Option<&str>,
) {
    let existing_key = config
        .profiles
        .get(name)
        .and_then(|profile| profile.consumer_key.clone());

    config.profiles.insert(
        name.to_string(),
        ProfileConfig {
            server: server.to_string(),
            consumer_key: consumer_key.map(str::to_string).or(existing_key),
        },
    );

    if config.active_profile.is_empty() {
        config.active_profile = name.to_string();
    }
}

pub fn resolve_profile(
    config: &WorkspaceConfig,
    profile_override: Option<&str>,
    server_override: Option<&str>,
) -> SatchelResult<ResolvedProfile> {
    let requested_profile = profile_override.unwrap_or(&config.active_profile);
    let profile = config.profiles.get(requested_profile).ok_or_else(|| {
        SatchelError::usage(format!(
            "profile '{requested_profile}' not found in workspace config"
        ))
    })?;

    let server = server_override
        .unwrap_or(profile.server.as_str())
        .to_string();

    Ok(ResolvedProfile {
        name: requested_profile.to_string(),
        server,
        consumer_key: profile.consumer_key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_fill_in_missing_fields() {
        let config: WorkspaceConfig = toml::from_str(
            r#"
version = 1
active_profile = "default"

[profiles.default]
server = "https://getpocket.com"

[settings]
close_tab_on_read = true
"#,
        )
        .expect("parse config");

        assert_eq!(config.settings.retrieve_interval_minutes, 15);
        assert_eq!(config.settings.page_size, 100);
        assert!(config.settings.close_tab_on_read);
        assert!(!config.settings.close_tab_on_add);
    }

    #[test]
    fn set_profile_keeps_existing_consumer_key() {
        let mut config = WorkspaceConfig::with_default_server(DEFAULT_SERVER_URL);
        set_profile(&mut config, "default", DEFAULT_SERVER_URL, Some("ck-1"));
        set_profile(&mut config, "default", "https://mirror.example.com", None);

        let resolved = resolve_profile(&config, None, None).expect("resolve");
        assert_eq!(resolved.server, "https://mirror.example.com");
        assert_eq!(resolved.consumer_key.as_deref(), Some("ck-1"));
    }

    #[test]
    fn unknown_active_profile_falls_back_to_first() {
        let mut config = WorkspaceConfig::with_default_server(DEFAULT_SERVER_URL);
        config.active_profile = "gone".to_string();
        config.ensure_defaults();
        assert_eq!(config.active_profile, DEFAULT_PROFILE);
    }
}

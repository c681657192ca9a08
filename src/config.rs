use crate::error::LoraSyncError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{read_to_string, write},
    path::PathBuf,
};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8188";
pub const TRIGGER_WORDS_ENDPOINT: &str = "/api/lm/loras/get_trigger_words";

pub const STACKER_CLASS: &str = "Lora Stacker (LoraManager)";
pub const RANDOMIZER_CLASS: &str = "Lora Randomizer (LoraManager)";
pub const CYCLER_CLASS: &str = "Lora Cycler (LoraManager)";
pub const TRIGGER_TOGGLE_CLASS: &str = "TriggerWord Toggle (LoraManager)";
pub const LOADER_CLASS: &str = "Lora Loader (LoraManager)";
pub const WANVIDEO_LOADER_CLASS: &str = "WanVideo Lora Select (LoraManager)";

static BUILTIN_CLASSES: Lazy<NodeClasses> = Lazy::new(NodeClasses::default);

/// The kinds of node that can feed a `lora_stack` input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Stacker,
    Randomizer,
    Cycler,
}

/// Class-tag registry used to recognize nodes by role.
///
/// Nodes whose class tag is not listed here are not followed during chain traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeClasses {
    pub trigger_toggles: BTreeSet<String>,
    pub loaders: BTreeSet<String>,
    pub providers: BTreeMap<String, ProviderKind>,
}

impl Default for NodeClasses {
    fn default() -> Self {
        NodeClasses {
            trigger_toggles: BTreeSet::from([TRIGGER_TOGGLE_CLASS.to_string()]),
            loaders: BTreeSet::from([
                LOADER_CLASS.to_string(),
                WANVIDEO_LOADER_CLASS.to_string(),
            ]),
            providers: BTreeMap::from([
                (STACKER_CLASS.to_string(), ProviderKind::Stacker),
                (RANDOMIZER_CLASS.to_string(), ProviderKind::Randomizer),
                (CYCLER_CLASS.to_string(), ProviderKind::Cycler),
            ]),
        }
    }
}

impl NodeClasses {
    /// Shared instance of the built-in registry.
    pub fn builtin() -> &'static NodeClasses {
        &BUILTIN_CLASSES
    }

    pub fn provider_kind(&self, class_tag: Option<&str>) -> Option<ProviderKind> {
        self.providers.get(class_tag?).copied()
    }

    pub fn is_trigger_toggle(&self, class_tag: Option<&str>) -> bool {
        class_tag.is_some_and(|tag| self.trigger_toggles.contains(tag))
    }

    pub fn is_loader(&self, class_tag: Option<&str>) -> bool {
        class_tag.is_some_and(|tag| self.loaders.contains(tag))
    }

    pub fn register_provider(&mut self, class_tag: &str, kind: ProviderKind) {
        self.providers.insert(class_tag.to_string(), kind);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub base_url: Url,
    pub trigger_words_endpoint: String,
    pub classes: NodeClasses,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            trigger_words_endpoint: TRIGGER_WORDS_ENDPOINT.to_string(),
            classes: NodeClasses::default(),
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(content: &str) -> Result<SyncConfig, LoraSyncError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<SyncConfig, LoraSyncError> {
        self.base_url = Url::parse(base_url)?;
        Ok(self)
    }

    /// Absolute URL of the trigger-word endpoint.
    pub fn trigger_words_url(&self) -> Result<Url, LoraSyncError> {
        Ok(self.base_url.join(&self.trigger_words_endpoint)?)
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<SyncConfig, LoraSyncError>;
    fn set_config(&self, config: &SyncConfig) -> Result<(), LoraSyncError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<SyncConfig, LoraSyncError> {
        tracing::debug!("Attempting to read sync config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(SyncConfig::default());
        }
        let content = read_to_string(&self.path)?;
        SyncConfig::from_toml_str(&content)
    }

    fn set_config(&self, config: &SyncConfig) -> Result<(), LoraSyncError> {
        tracing::debug!("Attempting to write sync config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_defaults_match_builtin_allow_list() {
        let classes = NodeClasses::builtin();
        assert_eq!(
            classes.provider_kind(Some(STACKER_CLASS)),
            Some(ProviderKind::Stacker)
        );
        assert_eq!(
            classes.provider_kind(Some(CYCLER_CLASS)),
            Some(ProviderKind::Cycler)
        );
        assert_eq!(classes.provider_kind(Some("KSampler")), None);
        assert_eq!(classes.provider_kind(None), None);
        assert!(classes.is_trigger_toggle(Some(TRIGGER_TOGGLE_CLASS)));
        assert!(classes.is_loader(Some(LOADER_CLASS)));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
base_url = "http://10.0.0.2:8000"

[classes.providers]
"Third Party Stacker" = "stacker"
"#,
        )
        .unwrap();
        assert_eq!(config.base_url.as_str(), "http://10.0.0.2:8000/");
        assert_eq!(config.trigger_words_endpoint, TRIGGER_WORDS_ENDPOINT);
        assert_eq!(
            config.classes.provider_kind(Some("Third Party Stacker")),
            Some(ProviderKind::Stacker)
        );
        // An explicit provider table replaces the built-in one.
        assert_eq!(config.classes.provider_kind(Some(STACKER_CLASS)), None);
        assert!(config.classes.is_trigger_toggle(Some(TRIGGER_TOGGLE_CLASS)));
    }

    #[test]
    fn test_trigger_words_url() {
        let config = SyncConfig::default()
            .with_base_url("http://localhost:8188/")
            .unwrap();
        assert_eq!(
            config.trigger_words_url().unwrap().as_str(),
            "http://localhost:8188/api/lm/loras/get_trigger_words"
        );
    }

    #[test]
    fn test_toml_provider_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("lm-graph.toml"));
        assert_eq!(provider.get_config().unwrap(), SyncConfig::default());

        let mut config = SyncConfig::default();
        config
            .classes
            .register_provider("Custom Cycler", ProviderKind::Cycler);
        provider.set_config(&config).unwrap();
        assert_eq!(provider.get_config().unwrap(), config);
    }
}

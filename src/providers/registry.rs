//! Provider registry
//!
//! Immutable lookup table built once at startup from configuration and
//! injected into request handlers and job workers through application state.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::providers::clickup::{ClickUpConfig, ClickUpProvider};
use crate::providers::{ProviderMetadata, TimeTrackingProvider};

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Provider '{name}' not found")]
    ProviderNotFound { name: String },
    #[error("Provider '{name}' is not enabled")]
    ProviderDisabled { name: String },
}

/// Provider registry that stores adapters and their metadata
#[derive(Clone, Default)]
pub struct Registry {
    providers: BTreeMap<String, Arc<dyn TimeTrackingProvider>>,
    metadata: BTreeMap<String, ProviderMetadata>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry for the configured environment.
    ///
    /// ClickUp is enabled only when both client credentials are present.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();

        match (&config.clickup_client_id, &config.clickup_client_secret) {
            (Some(client_id), Some(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                let provider = ClickUpProvider::new(ClickUpConfig {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    api_base: config.clickup_api_base.clone(),
                    auth_base: config.clickup_auth_base.clone(),
                });
                registry.register(Arc::new(provider), ProviderMetadata::clickup(true));
            }
            _ => {
                warn!("ClickUp provider disabled: missing client credentials");
                registry.register_metadata(ProviderMetadata::clickup(false));
            }
        }

        for meta in ProviderMetadata::planned() {
            registry.register_metadata(meta);
        }

        info!(
            enabled = ?registry.list_enabled(),
            "provider registry initialized"
        );
        registry
    }

    /// Register an adapter with its metadata
    pub fn register(
        &mut self,
        provider: Arc<dyn TimeTrackingProvider>,
        metadata: ProviderMetadata,
    ) {
        let name = provider.id().to_string();
        self.providers.insert(name.clone(), provider);
        self.metadata.insert(name, metadata);
    }

    /// Register metadata for a provider without an adapter
    pub fn register_metadata(&mut self, metadata: ProviderMetadata) {
        self.metadata.insert(metadata.name.clone(), metadata);
    }

    /// Get an adapter by name regardless of its enabled flag
    pub fn get(&self, name: &str) -> Result<Arc<dyn TimeTrackingProvider>, RegistryError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::ProviderNotFound {
                name: name.to_string(),
            })
    }

    /// Get an adapter that is registered and enabled
    pub fn get_enabled(
        &self,
        name: &str,
    ) -> Result<Arc<dyn TimeTrackingProvider>, RegistryError> {
        let meta = self.metadata(name)?;
        if !meta.is_enabled {
            return Err(RegistryError::ProviderDisabled {
                name: name.to_string(),
            });
        }
        self.get(name).map_err(|_| RegistryError::ProviderDisabled {
            name: name.to_string(),
        })
    }

    pub fn metadata(&self, name: &str) -> Result<&ProviderMetadata, RegistryError> {
        self.metadata
            .get(name)
            .ok_or_else(|| RegistryError::ProviderNotFound {
                name: name.to_string(),
            })
    }

    /// All provider metadata sorted by name
    pub fn list_metadata(&self) -> Vec<ProviderMetadata> {
        self.metadata.values().cloned().collect()
    }

    /// Names of enabled providers sorted alphabetically
    pub fn list_enabled(&self) -> Vec<String> {
        self.metadata
            .values()
            .filter(|m| m.is_enabled && self.providers.contains_key(&m.name))
            .map(|m| m.name.clone())
            .collect()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.get_enabled(name).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_clickup(enabled: bool) -> AppConfig {
        let mut config = AppConfig::default();
        if enabled {
            config.clickup_client_id = Some("cid".to_string());
            config.clickup_client_secret = Some("secret".to_string());
        }
        config
    }

    #[test]
    fn test_clickup_enabled_with_credentials() {
        let registry = Registry::from_config(&config_with_clickup(true));
        assert_eq!(registry.list_enabled(), vec!["clickup".to_string()]);
        let provider = registry.get_enabled("clickup").unwrap();
        assert_eq!(provider.id(), "clickup");
    }

    #[test]
    fn test_clickup_disabled_without_credentials() {
        let registry = Registry::from_config(&config_with_clickup(false));
        assert!(registry.list_enabled().is_empty());
        assert_eq!(
            registry.get_enabled("clickup").err(),
            Some(RegistryError::ProviderDisabled {
                name: "clickup".to_string()
            })
        );
        assert!(!registry.metadata("clickup").unwrap().is_enabled);
    }

    #[test]
    fn test_unknown_provider() {
        let registry = Registry::from_config(&config_with_clickup(true));
        assert!(matches!(
            registry.get_enabled("trello"),
            Err(RegistryError::ProviderNotFound { .. })
        ));
    }

    #[test]
    fn test_metadata_sorted_and_planned_disabled() {
        let registry = Registry::from_config(&config_with_clickup(true));
        let names: Vec<_> = registry
            .list_metadata()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["asana", "clickup", "jira", "linear"]);
        assert!(!registry.is_enabled("jira"));
        assert_eq!(registry.metadata("clickup").unwrap().color, "#7B68EE");
    }
}

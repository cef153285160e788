//! Plugin catalog - the explicit list of plugins the bot may set up

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::errors::PluginError;
use crate::infrastructure::config::Config;
use crate::plugins::trait_def::PluginBootstrap;

/// Plugins available to the orchestrator, in registration order
#[derive(Default, Clone)]
pub struct PluginCatalog {
    bootstraps: Vec<Arc<dyn PluginBootstrap>>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The plugins shipped with the bot
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.bootstraps.push(Arc::new(super::builtin::CorePlugin));
        catalog
    }

    /// Register a plugin
    pub fn register<P: PluginBootstrap + 'static>(&mut self, plugin: P) -> Result<(), PluginError> {
        let id = plugin.id().to_string();
        if self.contains(&id) {
            return Err(PluginError::Duplicate(id));
        }
        info!("Registering plugin: {}", id);
        self.bootstraps.push(Arc::new(plugin));
        Ok(())
    }

    pub fn with<P: PluginBootstrap + 'static>(mut self, plugin: P) -> Result<Self, PluginError> {
        self.register(plugin)?;
        Ok(self)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bootstraps.iter().any(|b| b.id() == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.bootstraps.iter().map(|b| b.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.bootstraps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bootstraps.is_empty()
    }

    /// Plugins to set up under `config`, in registration order
    pub fn discover(&self, config: &Config) -> Vec<Arc<dyn PluginBootstrap>> {
        self.bootstraps
            .iter()
            .filter(|b| {
                let enabled = config.plugin_enabled(b.id());
                if !enabled {
                    debug!("Plugin {} is not enabled, skipping", b.id());
                }
                enabled
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::state::BotState;
    use crate::plugins::Plugin;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl PluginBootstrap for Named {
        fn id(&self) -> &str {
            self.0
        }

        async fn setup(&self, _bot: Arc<BotState>) -> Result<Plugin, PluginError> {
            Ok(Plugin::new(self.0))
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut catalog = PluginCatalog::new();
        catalog.register(Named("gd")).unwrap();
        assert!(matches!(catalog.register(Named("gd")), Err(PluginError::Duplicate(_))));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_discover_honours_enabled_list() {
        let catalog = PluginCatalog::builtin()
            .with(Named("gd"))
            .unwrap()
            .with(Named("music"))
            .unwrap();

        let all = catalog.discover(&Config::default());
        assert_eq!(all.len(), 3);

        let mut config = Config::default();
        config.plugins.enabled = Some(vec!["core".to_string(), "music".to_string()]);
        let ids: Vec<String> = catalog.discover(&config).iter().map(|b| b.id().to_string()).collect();
        assert_eq!(ids, vec!["core", "music"]);
    }
}

//! Plugin trait definitions

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};

use crate::application::errors::PluginError;
use crate::application::state::BotState;
use crate::domain::entities::CommandProvider;

/// Hook run once the command kernel is live
pub type ReadyHook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Sets up one plugin. Implementations are handed to the orchestrator
/// explicitly; each setup runs concurrently with the others.
#[async_trait]
pub trait PluginBootstrap: Send + Sync {
    /// Stable identifier, used in logs and in `plugins.enabled`
    fn id(&self) -> &str;

    async fn setup(&self, bot: Arc<BotState>) -> Result<Plugin, PluginError>;
}

/// A successfully set up plugin
///
/// Immutable once it enters the active set.
pub struct Plugin {
    name: String,
    command_provider: CommandProvider,
    persistence_resources: BTreeSet<String>,
    on_ready: Option<ReadyHook>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command_provider: CommandProvider::new(),
            persistence_resources: BTreeSet::new(),
            on_ready: None,
        }
    }

    pub fn with_commands(mut self, provider: CommandProvider) -> Self {
        self.command_provider = provider;
        self
    }

    /// Declares a schema resource the persistence layer must configure
    pub fn with_persistence_resource(mut self, resource: impl Into<String>) -> Self {
        self.persistence_resources.insert(resource.into());
        self
    }

    pub fn on_ready<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_ready = Some(Arc::new(move || hook().boxed()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command_provider(&self) -> &CommandProvider {
        &self.command_provider
    }

    pub fn persistence_resources(&self) -> &BTreeSet<String> {
        &self.persistence_resources
    }

    pub async fn run_on_ready(&self) {
        if let Some(hook) = &self.on_ready {
            hook().await;
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("commands", &self.command_provider)
            .field("persistence_resources", &self.persistence_resources)
            .finish()
    }
}

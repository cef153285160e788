//! Bot lifecycle - connect, set up plugins, configure persistence, run

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::application::errors::BotError;
use crate::application::messaging::CommandKernel;
use crate::application::state::BotState;
use crate::domain::traits::{Connection, PersistenceConfigurator};
use crate::plugins::{Plugin, PluginBootstrap, PluginCatalog};

/// Time left for in-flight work after the transport disconnects
pub const DISCONNECT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Startup phases, strictly in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Idle,
    Connecting,
    PluginSetup,
    Configuring,
    Running,
    Disconnected,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Connecting => "connecting",
            LifecycleState::PluginSetup => "plugin-setup",
            LifecycleState::Configuring => "configuring",
            LifecycleState::Running => "running",
            LifecycleState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Drives the bot from process start to disconnect
pub struct BotLifecycleOrchestrator {
    bot: Arc<BotState>,
    catalog: PluginCatalog,
    persistence: Arc<dyn PersistenceConfigurator>,
    grace_period: Duration,
    state: watch::Sender<LifecycleState>,
}

impl BotLifecycleOrchestrator {
    pub fn new(
        bot: Arc<BotState>,
        catalog: PluginCatalog,
        persistence: Arc<dyn PersistenceConfigurator>,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            bot,
            catalog,
            persistence,
            grace_period: DISCONNECT_GRACE_PERIOD,
            state,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn bot(&self) -> &Arc<BotState> {
        &self.bot
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Observe phase changes while [`run`](Self::run) executes
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    fn enter(&self, next: LifecycleState) {
        debug!("Lifecycle: {} -> {}", self.state(), next);
        self.state.send_replace(next);
    }

    /// Runs the whole lifecycle. Returns after the transport disconnected and
    /// the grace period elapsed, or with the first startup error.
    pub async fn run(self) -> Result<(), BotError> {
        self.enter(LifecycleState::Connecting);
        let connection = self.connect().await?;
        let Connection {
            incoming,
            disconnected,
            ..
        } = connection;

        self.enter(LifecycleState::PluginSetup);
        let plugins = self.setup_plugins().await?;
        self.bot.freeze_plugins(plugins.clone())?;

        self.enter(LifecycleState::Configuring);
        self.configure_persistence(&plugins).await?;

        let mut builder = CommandKernel::builder(Arc::clone(&self.bot));
        for plugin in &plugins {
            builder.register_provider(plugin.command_provider())?;
            debug!(
                "Plugin {} is providing commands: {}",
                plugin.name(),
                plugin.command_provider()
            );
        }
        let kernel = builder.build();
        let consumer = tokio::spawn(Arc::clone(&kernel).run(incoming));

        kernel.start();
        self.enter(LifecycleState::Running);
        join_all(plugins.iter().map(|p| p.run_on_ready())).await;
        info!("Bot started with {} plugins", plugins.len());
        self.bot
            .log(&format!(":white_check_mark: Bot started with {} plugins", plugins.len()))
            .await;

        // A dropped sender counts as a disconnect too.
        let _ = disconnected.await;
        self.enter(LifecycleState::Disconnected);
        warn!(
            in_flight = kernel.in_flight(),
            "Transport disconnected, waiting {:?} before shutting down",
            self.grace_period
        );
        tokio::time::sleep(self.grace_period).await;
        consumer.abort();
        Ok(())
    }

    async fn connect(&self) -> Result<Connection, BotError> {
        let options = self.bot.config().connect_options();
        let connection = self
            .bot
            .transport()
            .connect(options)
            .await
            .map_err(|e| {
                error!("Failed to connect: {}", e);
                BotError::Connection(e)
            })?;
        info!(user = %connection.info.username, "Connected");
        self.bot.set_info(connection.info.clone())?;
        Ok(connection)
    }

    /// Sets up every discovered plugin concurrently. Any failure aborts
    /// startup unless partial activation is enabled.
    async fn setup_plugins(&self) -> Result<Vec<Arc<Plugin>>, BotError> {
        let bootstraps = self.catalog.discover(self.bot.config());
        info!("Setting up {} plugins", bootstraps.len());

        let setups = bootstraps.iter().map(|bootstrap| self.setup_one(Arc::clone(bootstrap)));

        if !self.bot.config().startup.partial_activation {
            return try_join_all(setups).await;
        }

        let mut plugins = Vec::new();
        for result in join_all(setups).await {
            match result {
                Ok(plugin) => plugins.push(plugin),
                Err(e) => warn!("Skipping plugin after failed setup: {}", e),
            }
        }
        Ok(plugins)
    }

    async fn setup_one(&self, bootstrap: Arc<dyn PluginBootstrap>) -> Result<Arc<Plugin>, BotError> {
        let id = bootstrap.id().to_string();
        match bootstrap.setup(Arc::clone(&self.bot)).await {
            Ok(plugin) => {
                info!(plugin = %id, "Plugin set up as {}", plugin.name());
                Ok(Arc::new(plugin))
            }
            Err(e) => {
                error!(plugin = %id, "Failed to setup plugin {}: {}", id, e);
                Err(BotError::PluginSetup {
                    plugin: id,
                    source: e,
                })
            }
        }
    }

    async fn configure_persistence(&self, plugins: &[Arc<Plugin>]) -> Result<(), BotError> {
        let resources: BTreeSet<String> = plugins
            .iter()
            .flat_map(|p| p.persistence_resources().iter().cloned())
            .collect();
        debug!("Configuring persistence with resources: {:?}", resources);
        self.persistence.configure(&resources).await?;
        Ok(())
    }
}

//! ultimate-bot - a chat bot runtime
//!
//! Plugins are set up concurrently at startup, then a command kernel routes
//! prefixed messages to their handlers.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;

pub use application::errors::BotError;
pub use application::services::{BotLifecycleOrchestrator, LifecycleState};
pub use application::state::BotState;
pub use infrastructure::config::Config;
pub use plugins::{Plugin, PluginBootstrap, PluginCatalog};

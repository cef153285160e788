//! Plugin system
//! 
//! Plugins contribute commands and persistence resources. They are handed to
//! the orchestrator explicitly through a [`PluginCatalog`].

pub mod builtin;
pub mod manager;
pub mod trait_def;

pub use manager::PluginCatalog;
pub use trait_def::{Plugin, PluginBootstrap, ReadyHook};

//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Database: SQLite persistence for plugin schema resources
//! - Adapters: Platform integrations (Console, Telegram, in-memory)

pub mod adapters;
pub mod config;
pub mod database;

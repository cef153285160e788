use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::application::errors::StorageError;

/// Persistence configuration entry point
///
/// Receives the merged schema resources of every active plugin, once, before
/// the bot starts dispatching commands.
#[async_trait]
pub trait PersistenceConfigurator: Send + Sync {
    async fn configure(&self, resources: &BTreeSet<String>) -> Result<(), StorageError>;
}

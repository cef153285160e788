//! Role-based permission checks

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::warn;

use crate::application::errors::TransportError;
use crate::domain::entities::{Role, Scope, User};
use crate::domain::traits::Transport;

/// Grants a role to a user, everywhere or inside a single guild
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoleGrant {
    pub role: Role,
    pub user_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// Where the owner id comes from
pub enum OwnerSource {
    Fixed(String),
    Transport(Arc<dyn Transport>),
}

/// Decides whether an actor holds a set of roles in a scope
///
/// A held role implies every lower role. The owner passes every check.
pub struct PermissionChecker {
    owner_source: OwnerSource,
    owner_id: OnceCell<Option<String>>,
    grants: Vec<RoleGrant>,
}

impl PermissionChecker {
    pub fn new(owner_source: OwnerSource, grants: Vec<RoleGrant>) -> Self {
        Self {
            owner_source,
            owner_id: OnceCell::new(),
            grants,
        }
    }

    /// Resolved once; a failed lookup is retried on the next call.
    pub async fn owner_id(&self) -> Option<String> {
        let resolved = self
            .owner_id
            .get_or_try_init(|| async {
                match &self.owner_source {
                    OwnerSource::Fixed(id) => Ok::<_, TransportError>(Some(id.clone())),
                    OwnerSource::Transport(transport) => transport.application_owner().await,
                }
            })
            .await;
        match resolved {
            Ok(id) => id.clone(),
            Err(e) => {
                warn!("Failed to resolve bot owner: {}", e);
                None
            }
        }
    }

    pub async fn is_owner(&self, actor: &User) -> bool {
        if self.owner_id().await.as_deref() == Some(actor.id.as_str()) {
            return true;
        }
        self.grants
            .iter()
            .any(|g| g.role == Role::Owner && g.user_id == actor.id)
    }

    /// Roles the actor holds in `scope`, owner excluded
    pub fn roles_of(&self, actor: &User, scope: &Scope) -> BTreeSet<Role> {
        let highest = self
            .grants
            .iter()
            .filter(|g| g.user_id == actor.id)
            .filter(|g| g.guild_id.is_none() || g.guild_id == scope.guild_id)
            .map(|g| g.role)
            .max()
            .unwrap_or(Role::User);
        [Role::User, Role::Moderator, Role::Admin, Role::Owner]
            .into_iter()
            .filter(|r| *r <= highest)
            .collect()
    }

    pub async fn is_granted(&self, actor: &User, scope: &Scope, required: &BTreeSet<Role>) -> bool {
        if self.is_owner(actor).await {
            return true;
        }
        let held = self.roles_of(actor, scope);
        required.iter().all(|role| held.contains(role))
    }
}

//! Identity store abstraction.

use super::{AuthError, Identity};
use crate::db::Database;
use async_trait::async_trait;

/// Resolves a verified token subject to a known identity.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up an identity by id. `Ok(None)` means the identity does not exist.
    async fn find(&self, id: &str) -> Result<Option<Identity>, AuthError>;
}

/// Identity store backed by the `users` table.
pub struct DbIdentityStore {
    db: Database,
}

impl DbIdentityStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityStore for DbIdentityStore {
    async fn find(&self, id: &str) -> Result<Option<Identity>, AuthError> {
        let user = self
            .db
            .users()
            .find_by_id(id)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(user.map(|u| Identity {
            id: u.id,
            display_name: u.username,
        }))
    }
}

/// Fixed in-memory identities for unit tests.
#[cfg(test)]
pub struct StaticIdentities(pub Vec<Identity>);

#[cfg(test)]
#[async_trait]
impl IdentityStore for StaticIdentities {
    async fn find(&self, id: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self.0.iter().find(|i| i.id == id).cloned())
    }
}

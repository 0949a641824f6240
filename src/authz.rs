//! Two-tier authorization: the immutable database owner vs. regular
//! tenants. The owner is a pure administrative role with no contact data;
//! tenants own exactly their own namespace. The two capability sets are
//! disjoint, and every gated operation checks here before its body runs.

use sqlx::{Pool, Sqlite};

use crate::error::RolodexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Regular,
}

/// Resolved caller identity plus the database owner, both uppercase.
#[derive(Debug, Clone)]
pub struct AuthorizationGuard {
    current_user: String,
    owner: String,
}

impl AuthorizationGuard {
    /// Resolves the immutable owner from the user catalog. The owner is
    /// whoever created the database; that row is written once and never
    /// reassigned.
    pub async fn resolve(
        pool: &Pool<Sqlite>,
        current_user: &str,
    ) -> Result<Self, RolodexError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT username FROM sys_users WHERE is_owner = 1")
                .fetch_optional(pool)
                .await?;
        let owner = row
            .map(|(name,)| name.to_uppercase())
            .ok_or_else(|| RolodexError::not_found("database owner"))?;
        Ok(Self {
            current_user: current_user.to_uppercase(),
            owner,
        })
    }

    pub fn current_user(&self) -> &str {
        &self.current_user
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn is_owner(&self) -> bool {
        self.current_user == self.owner
    }

    pub fn role(&self) -> Role {
        if self.is_owner() {
            Role::Owner
        } else {
            Role::Regular
        }
    }

    /// Gate for owner-only operations (user management).
    pub fn require_owner(&self, op: &'static str) -> Result<(), RolodexError> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(RolodexError::Authorization {
                op,
                reason: "only the database owner can run this operation",
            })
        }
    }

    /// Gate for tenant-only operations (contact and group data).
    pub fn require_regular(&self, op: &'static str) -> Result<(), RolodexError> {
        if self.is_owner() {
            Err(RolodexError::Authorization {
                op,
                reason: "only regular (non-owner) users have contacts and groups",
            })
        } else {
            Ok(())
        }
    }
}

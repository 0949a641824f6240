//! Namespace provisioning: creating and dropping a user's tables.
//!
//! Owner provisioning runs once, when the database file itself is created,
//! inside a single transaction. Tenant provisioning is a sequence of
//! individually idempotent steps, ordered so that a partial failure never
//! leaves a login-capable user behind: the catalog row that makes a login
//! valid is written last.

use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::credential::{self, SALT_LENGTH};
use crate::error::RolodexError;
use crate::schema::{self, TABLE_CONTACTS, TABLE_GROUPS, TABLE_SECURE};

pub type SqlitePool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct SchemaProvisioner {
    pool: SqlitePool,
}

impl SchemaProvisioner {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// One-time path taken when the database is being created.
    ///
    /// Creates the catalog tables, seeds the boot credential, creates the
    /// owner's `SECURE` table with a fresh salt/hash, and writes the
    /// immutable owner row. Runs in one transaction: if any step fails the
    /// whole provisioning is abandoned and the caller reports the failure.
    pub async fn provision_owner(
        &self,
        username: &str,
        boot_password: &str,
        password: &str,
    ) -> Result<(), RolodexError> {
        let mut tx = self.pool.begin().await?;

        // catalog tables (sqlx::query takes one statement at a time)
        for stmt in schema::CATALOG_INIT.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            sqlx::query(stmt).execute(&mut *tx).await?;
        }

        let salt = credential::generate_salt(SALT_LENGTH)?;
        let hash = credential::hash_password(boot_password, &salt);
        sqlx::query("INSERT INTO sys_boot (id, salt, hash) VALUES (1, ?, ?)")
            .bind(&salt)
            .bind(&hash)
            .execute(&mut *tx)
            .await?;

        // the owner gets a SECURE table but no CONTACTS or GROUPS; the
        // owner is strictly a user-management account
        sqlx::query(&schema::secure_ddl(username))
            .execute(&mut *tx)
            .await?;
        let salt = credential::generate_salt(SALT_LENGTH)?;
        let hash = credential::hash_password(password, &salt);
        let seed = format!(
            "INSERT INTO {} (SALT, HASH) VALUES (?, ?)",
            schema::qualified(username, TABLE_SECURE)
        );
        sqlx::query(&seed).bind(&salt).bind(&hash).execute(&mut *tx).await?;

        sqlx::query("INSERT INTO sys_users (username, is_owner) VALUES (?, 1)")
            .bind(username)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(op = "provision_owner", user = %username, "database created and owner provisioned");
        Ok(())
    }

    /// Creates a tenant's namespace: `CONTACTS` (columns from the contact
    /// record schema), `GROUPS`, `SECURE` seeded with a fresh salt/hash,
    /// and finally the catalog row that makes the login valid.
    ///
    /// Each step is skipped if its object already exists, so a rerun after
    /// a partial failure completes the remainder without touching existing
    /// data. The caller has already authorized the operation, validated the
    /// identifier, and uppercased it.
    pub async fn provision_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(), RolodexError> {
        let known: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM sys_users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        if known.is_some() {
            return Err(RolodexError::already_exists(format!("user '{username}'")));
        }

        sqlx::query(&schema::contacts_ddl(username))
            .execute(&self.pool)
            .await?;
        sqlx::query(&schema::groups_ddl(username))
            .execute(&self.pool)
            .await?;
        sqlx::query(&schema::secure_ddl(username))
            .execute(&self.pool)
            .await?;

        // seed SECURE only when empty, never replace an existing credential
        let count = format!(
            "SELECT COUNT(*) FROM {}",
            schema::qualified(username, TABLE_SECURE)
        );
        let (rows,): (i64,) = sqlx::query_as(&count).fetch_one(&self.pool).await?;
        if rows == 0 {
            let salt = credential::generate_salt(SALT_LENGTH)?;
            let hash = credential::hash_password(password, &salt);
            let seed = format!(
                "INSERT INTO {} (SALT, HASH) VALUES (?, ?)",
                schema::qualified(username, TABLE_SECURE)
            );
            sqlx::query(&seed).bind(&salt).bind(&hash).execute(&self.pool).await?;
        }

        sqlx::query("INSERT INTO sys_users (username, is_owner) VALUES (?, 0)")
            .bind(username)
            .execute(&self.pool)
            .await?;

        info!(op = "provision_user", user = %username, "namespace provisioned");
        Ok(())
    }

    /// Drops `GROUPS`, `CONTACTS`, `SECURE`, then the login record, in that
    /// order. The first failing step aborts the remainder; completed steps
    /// are not compensated.
    pub async fn deprovision_user(&self, username: &str) -> Result<(), RolodexError> {
        for table in [TABLE_GROUPS, TABLE_CONTACTS, TABLE_SECURE] {
            let drop = format!("DROP TABLE {}", schema::qualified(username, table));
            sqlx::query(&drop).execute(&self.pool).await?;
        }
        sqlx::query("DELETE FROM sys_users WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await?;
        info!(op = "deprovision_user", user = %username, "namespace dropped");
        Ok(())
    }
}

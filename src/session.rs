//! Session lifecycle and the full public operation set.
//!
//! A [`Session`] owns the connection pool (capped at one connection, so
//! statements issue sequentially over a single shared handle), the resolved
//! caller identity, and the provisioner. [`SessionManager`] holds at most
//! one live session: connecting while one exists logs a warning and keeps
//! the existing session; disconnecting always resets to the disconnected
//! state.
//!
//! Every mutation runs an affected-rows precondition (an existence check
//! before the write). The check and the write are separate statements, not
//! one transaction; with a single in-process session this race is benign,
//! and it is documented rather than closed.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use tracing::{info, warn};

use crate::authz::{AuthorizationGuard, Role};
use crate::config::ConnectConfig;
use crate::contact::ContactRecord;
use crate::credential::{self, SALT_LENGTH};
use crate::error::RolodexError;
use crate::provision::{SchemaProvisioner, SqlitePool};
use crate::sanitize;
use crate::schema::{self, TABLE_CONTACTS, TABLE_GROUPS, TABLE_SECURE};

// Width of the GROUPS.NAME column.
const GROUP_NAME_MAX: usize = 40;

/// Holds at most one live [`Session`].
#[derive(Default)]
pub struct SessionManager {
    session: Option<Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects to (or creates) the configured database.
    ///
    /// A second connect while a session is live is a warning, not an
    /// error: the existing session is returned unchanged.
    pub async fn connect(&mut self, cfg: &ConnectConfig) -> Result<&Session, RolodexError> {
        if self.session.is_none() {
            self.session = Some(Session::open(cfg).await?);
        } else {
            warn!(op = "connect", "database already initialised; keeping the existing session");
        }
        self.session.as_ref().ok_or(RolodexError::AlreadyInitialized)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Always transitions to the disconnected state, discarding all cached
    /// handles. Engine shutdown complaints are expected and swallowed.
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

/// One live connection to a database, acting as a specific user.
#[derive(Debug)]
pub struct Session {
    pool: SqlitePool,
    provisioner: SchemaProvisioner,
    guard: AuthorizationGuard,
    database: String,
    connected_at: DateTime<Utc>,
}

impl Session {
    pub(crate) async fn open(cfg: &ConnectConfig) -> Result<Self, RolodexError> {
        if !sanitize::validate_identifier(&cfg.username) {
            return Err(RolodexError::validation(
                "usernames can only contain ASCII alphanumeric characters and underscores",
            ));
        }
        let username = cfg.username.to_uppercase();
        let fresh = !Path::new(&cfg.database).exists();

        let opts = SqliteConnectOptions::new()
            .filename(&cfg.database)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let provisioner = SchemaProvisioner::new(pool.clone());

        if fresh {
            // a failed first-time setup leaves no half-created database
            if let Err(e) = provisioner
                .provision_owner(&username, &cfg.boot_password, &cfg.password)
                .await
            {
                pool.close().await;
                let _ = std::fs::remove_file(&cfg.database);
                return Err(e);
            }
        } else if let Err(e) =
            authenticate(&pool, &username, &cfg.boot_password, &cfg.password).await
        {
            pool.close().await;
            return Err(e);
        }

        let guard = AuthorizationGuard::resolve(&pool, &username).await?;
        info!(op = "connect", user = %username, database = %cfg.database,
              "database successfully initialised");
        Ok(Self {
            pool,
            provisioner,
            guard,
            database: cfg.database.clone(),
            connected_at: Utc::now(),
        })
    }

    pub(crate) async fn close(self) {
        self.pool.close().await;
        info!(op = "disconnect", database = %self.database, "session closed");
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Name of the current caller, uppercase.
    pub fn current_user(&self) -> &str {
        self.guard.current_user()
    }

    /// Name of the immutable database owner, uppercase.
    pub fn owner(&self) -> &str {
        self.guard.owner()
    }

    pub fn is_owner(&self) -> bool {
        self.guard.is_owner()
    }

    pub fn role(&self) -> Role {
        self.guard.role()
    }

    //-----------------------------------------------------------------------
    //  user management (owner-only)
    //-----------------------------------------------------------------------

    /// Lists every username in the database, uppercase.
    pub async fn list_users(&self) -> Result<Vec<String>, RolodexError> {
        self.guard.require_owner("list_users")?;
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT username FROM sys_users ORDER BY username")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Provisions a new regular user. Requires the owner to re-enter their
    /// own password.
    pub async fn add_user(
        &self,
        username: &str,
        password: &str,
        owner_password: &str,
    ) -> Result<(), RolodexError> {
        self.guard.require_owner("add_user")?;
        if !sanitize::validate_identifier(username) {
            return Err(RolodexError::validation(
                "usernames can only contain ASCII alphanumeric characters and underscores",
            ));
        }
        validate_password(password)?;
        self.verify_owner_password("add_user", owner_password).await?;

        let username = username.to_uppercase();
        self.provisioner.provision_user(&username, password).await?;
        info!(op = "add_user", user = %username, "user successfully added");
        Ok(())
    }

    /// Removes a user and all of their data. Requires the owner to re-enter
    /// their own password. The owner account itself can never be removed.
    pub async fn delete_user(
        &self,
        username: &str,
        owner_password: &str,
    ) -> Result<(), RolodexError> {
        self.guard.require_owner("delete_user")?;
        let username = username.trim().to_uppercase();
        if username == self.guard.owner() {
            return Err(RolodexError::Authorization {
                op: "delete_user",
                reason: "the database owner cannot be deleted",
            });
        }
        if !self.user_exists(&username).await? {
            return Err(RolodexError::not_found(format!("user '{username}'")));
        }
        self.verify_owner_password("delete_user", owner_password).await?;

        self.provisioner.deprovision_user(&username).await?;
        info!(op = "delete_user", user = %username, "user successfully deleted");
        Ok(())
    }

    /// Changes the caller's own password, replacing their `(salt, hash)`
    /// pair wholesale.
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), RolodexError> {
        validate_password(new_password)?;
        let user = self.guard.current_user();
        let (salt, hash) = secure_record(&self.pool, user).await?;
        if !credential::verify_password(old_password, &hash, &salt) {
            warn!(op = "change_password", "invalid password; password not changed");
            return Err(RolodexError::Credential);
        }
        replace_secure(&self.pool, user, new_password).await?;
        info!(op = "change_password", user = %user, "password successfully changed");
        Ok(())
    }

    /// Sets another user's password, without knowing the old one. Requires
    /// the owner to re-enter their own password.
    pub async fn reset_password(
        &self,
        username: &str,
        new_password: &str,
        owner_password: &str,
    ) -> Result<(), RolodexError> {
        self.guard.require_owner("reset_password")?;
        validate_password(new_password)?;
        let username = username.trim().to_uppercase();
        if !self.user_exists(&username).await? {
            return Err(RolodexError::not_found(format!("user '{username}'")));
        }
        self.verify_owner_password("reset_password", owner_password).await?;

        replace_secure(&self.pool, &username, new_password).await?;
        info!(op = "reset_password", user = %username, "password successfully changed");
        Ok(())
    }

    //-----------------------------------------------------------------------
    //  contacts (regular users only)
    //-----------------------------------------------------------------------

    /// Inserts the record's non-null projection into the caller's
    /// `CONTACTS` table and returns the new contact's id.
    pub async fn add_contact(&self, contact: &ContactRecord) -> Result<i64, RolodexError> {
        self.guard.require_regular("add_contact")?;
        let user = self.guard.current_user();
        let Some(fragment) = contact.insert_fragment() else {
            return Err(RolodexError::validation("all contact information is null"));
        };
        let sql = format!(
            "INSERT INTO {} {}",
            schema::qualified(user, TABLE_CONTACTS),
            fragment
        );
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        info!(op = "add_contact", "contact successfully added");
        Ok(result.last_insert_rowid())
    }

    /// Replaces **every** column of the contact with the record's values,
    /// writing NULL for fields the record has cleared. Full-replace, not a
    /// sparse patch.
    pub async fn update_contact(
        &self,
        id: i64,
        contact: &ContactRecord,
    ) -> Result<(), RolodexError> {
        self.guard.require_regular("update_contact")?;
        let user = self.guard.current_user();
        if self.count_contacts(user, id).await? == 0 {
            warn!(op = "update_contact", id, "no contacts affected");
            return Err(RolodexError::not_found(format!("contact {id}")));
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE ID = ?",
            schema::qualified(user, TABLE_CONTACTS),
            contact.update_fragment()
        );
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        info!(op = "update_contact", id, "contact successfully updated");
        Ok(())
    }

    /// Deletes the given contacts. Succeeds when at least one id matched a
    /// row; ids with no matching row are skipped, not fatal.
    pub async fn delete_contacts(&self, ids: &[i64]) -> Result<u64, RolodexError> {
        self.guard.require_regular("delete_contacts")?;
        if ids.is_empty() {
            return Err(RolodexError::validation("no contact IDs given"));
        }
        let user = self.guard.current_user();

        let mut matched = 0;
        for &id in ids {
            matched += self.count_contacts(user, id).await?;
        }
        if matched == 0 {
            warn!(op = "delete_contacts", "no contacts affected");
            return Err(RolodexError::not_found("no contacts affected"));
        }

        let sql = format!(
            "DELETE FROM {} WHERE ID = ?",
            schema::qualified(user, TABLE_CONTACTS)
        );
        let mut affected = 0;
        for &id in ids {
            affected += sqlx::query(&sql).bind(id).execute(&self.pool).await?.rows_affected();
        }
        info!(op = "delete_contacts", affected, "contacts successfully deleted");
        Ok(affected)
    }

    //-----------------------------------------------------------------------
    //  groups (regular users only)
    //-----------------------------------------------------------------------

    /// Adds the given contacts to a group, creating the group implicitly.
    /// A contact already in the group is skipped with a warning rather than
    /// failing the batch; succeeds when at least one membership row was
    /// inserted.
    pub async fn add_to_group(&self, group_name: &str, ids: &[i64]) -> Result<u64, RolodexError> {
        self.guard.require_regular("add_to_group")?;
        let group = validate_group_name(group_name)?;
        if ids.is_empty() {
            return Err(RolodexError::validation("no contact IDs given"));
        }
        let user = self.guard.current_user();

        let insert = format!(
            "INSERT INTO {} (NAME, CONTACT_ID) VALUES (?, ?)",
            schema::qualified(user, TABLE_GROUPS)
        );
        let mut inserted = 0;
        for &id in ids {
            if self.count_contacts(user, id).await? == 0 {
                warn!(op = "add_to_group", id, "contact doesn't exist; skipping");
                continue;
            }
            if self.count_memberships(user, &group, id).await? > 0 {
                warn!(op = "add_to_group", id, group = %group,
                      "contact already in group; skipping");
                continue;
            }
            sqlx::query(&insert)
                .bind(&group)
                .bind(id)
                .execute(&self.pool)
                .await?;
            inserted += 1;
        }
        if inserted == 0 {
            return Err(RolodexError::not_found("no contacts affected"));
        }
        info!(op = "add_to_group", group = %group, inserted, "successfully added to group");
        Ok(inserted)
    }

    /// Removes the given contacts from a group. The group must currently
    /// have at least one member; succeeds when at least one membership row
    /// was deleted. Removing the last member deletes the group itself,
    /// since a group is nothing but its membership rows.
    pub async fn remove_from_group(
        &self,
        group_name: &str,
        ids: &[i64],
    ) -> Result<u64, RolodexError> {
        self.guard.require_regular("remove_from_group")?;
        let group = validate_group_name(group_name)?;
        if ids.is_empty() {
            return Err(RolodexError::validation("no contact IDs given"));
        }
        let user = self.guard.current_user();
        if !self.group_exists(user, &group).await? {
            warn!(op = "remove_from_group", group = %group,
                  "group doesn't exist; no contacts affected");
            return Err(RolodexError::not_found(format!("group '{group}'")));
        }

        let delete = format!(
            "DELETE FROM {} WHERE NAME = ? AND CONTACT_ID = ?",
            schema::qualified(user, TABLE_GROUPS)
        );
        let mut affected = 0;
        for &id in ids {
            affected += sqlx::query(&delete)
                .bind(&group)
                .bind(id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        }
        if affected == 0 {
            warn!(op = "remove_from_group", group = %group, "no contacts affected");
            return Err(RolodexError::not_found("no contacts affected"));
        }
        info!(op = "remove_from_group", group = %group, affected,
              "successfully removed from group");
        Ok(affected)
    }

    /// Deletes a group by removing all of its membership rows. The group
    /// must currently exist.
    pub async fn delete_group(&self, group_name: &str) -> Result<u64, RolodexError> {
        self.guard.require_regular("delete_group")?;
        let group = validate_group_name(group_name)?;
        let user = self.guard.current_user();
        if !self.group_exists(user, &group).await? {
            return Err(RolodexError::not_found(format!("group '{group}'")));
        }
        let sql = format!(
            "DELETE FROM {} WHERE NAME = ?",
            schema::qualified(user, TABLE_GROUPS)
        );
        let affected = sqlx::query(&sql)
            .bind(&group)
            .execute(&self.pool)
            .await?
            .rows_affected();
        info!(op = "delete_group", group = %group, affected, "group deleted");
        Ok(affected)
    }

    /// Renames a group by bulk-updating its membership rows. The old group
    /// must exist, the new name must be free, and the two must differ.
    pub async fn rename_group(&self, old_name: &str, new_name: &str) -> Result<u64, RolodexError> {
        self.guard.require_regular("rename_group")?;
        let old = validate_group_name(old_name)?;
        let new = validate_group_name(new_name)?;
        if old == new {
            return Err(RolodexError::validation(
                "old and new group names must differ",
            ));
        }
        let user = self.guard.current_user();
        if !self.group_exists(user, &old).await? {
            return Err(RolodexError::not_found(format!("group '{old}'")));
        }
        // merging into an existing group could duplicate memberships
        if self.group_exists(user, &new).await? {
            return Err(RolodexError::already_exists(format!("group '{new}'")));
        }
        let sql = format!(
            "UPDATE {} SET NAME = ? WHERE NAME = ?",
            schema::qualified(user, TABLE_GROUPS)
        );
        let affected = sqlx::query(&sql)
            .bind(&new)
            .bind(&old)
            .execute(&self.pool)
            .await?
            .rows_affected();
        info!(op = "rename_group", old = %old, new = %new, affected, "group renamed");
        Ok(affected)
    }

    //-----------------------------------------------------------------------
    //  table access (either role)
    //-----------------------------------------------------------------------

    /// Fully-qualified names of the tables visible to the caller: all
    /// tenant tables for the owner, only the caller's own non-`SECURE`
    /// tables for a regular user.
    pub async fn list_tables(&self) -> Result<Vec<String>, RolodexError> {
        // every tenant table's physical name contains a dot; the catalog
        // tables (and sqlite_sequence) do not
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE '%.%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let me = self.guard.current_user();
        let is_owner = self.guard.is_owner();
        Ok(rows
            .into_iter()
            .map(|(name,)| name)
            .filter(|name| {
                if is_owner {
                    return true;
                }
                match name.split_once('.') {
                    Some((user, table)) => user == me && table != TABLE_SECURE,
                    None => false,
                }
            })
            .collect())
    }

    /// Returns a table as its header row followed by its data rows, every
    /// cell rendered as optional text. A zero-row table still returns its
    /// header. Only names present in [`Self::list_tables`] are readable.
    pub async fn read_table(
        &self,
        table_name: &str,
    ) -> Result<Vec<Vec<Option<String>>>, RolodexError> {
        if table_name.trim().is_empty() {
            return Err(RolodexError::validation(
                "table name cannot be empty or all whitespace",
            ));
        }
        let name = table_name.trim().to_uppercase();
        if !self.list_tables().await?.contains(&name) {
            return Err(RolodexError::not_found(format!("table '{table_name}'")));
        }

        // header from the table metadata, so an empty table still yields it
        let pragma = format!("PRAGMA table_info(\"{name}\")");
        let mut columns = Vec::new();
        for row in sqlx::query(&pragma).fetch_all(&self.pool).await? {
            columns.push(row.try_get::<String, _>("name")?);
        }

        // read every column back as text; ids and NULLs survive the cast
        let select_list = columns
            .iter()
            .map(|c| format!("CAST(\"{c}\" AS TEXT)"))
            .collect::<Vec<_>>()
            .join(", ");
        let select = format!("SELECT {select_list} FROM \"{name}\"");

        let mut table = Vec::new();
        table.push(columns.iter().cloned().map(Some).collect());
        for row in sqlx::query(&select).fetch_all(&self.pool).await? {
            let mut cells = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                cells.push(row.try_get::<Option<String>, _>(idx)?);
            }
            table.push(cells);
        }
        Ok(table)
    }

    //-----------------------------------------------------------------------
    //  internals
    //-----------------------------------------------------------------------

    async fn user_exists(&self, username: &str) -> Result<bool, RolodexError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM sys_users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn count_contacts(&self, user: &str, id: i64) -> Result<i64, RolodexError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE ID = ?",
            schema::qualified(user, TABLE_CONTACTS)
        );
        let (count,): (i64,) = sqlx::query_as(&sql).bind(id).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn count_memberships(
        &self,
        user: &str,
        group: &str,
        id: i64,
    ) -> Result<i64, RolodexError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE NAME = ? AND CONTACT_ID = ?",
            schema::qualified(user, TABLE_GROUPS)
        );
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(group)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn group_exists(&self, user: &str, group: &str) -> Result<bool, RolodexError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE NAME = ?",
            schema::qualified(user, TABLE_GROUPS)
        );
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(group)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn verify_owner_password(
        &self,
        op: &'static str,
        owner_password: &str,
    ) -> Result<(), RolodexError> {
        let (salt, hash) = secure_record(&self.pool, self.guard.owner()).await?;
        if credential::verify_password(owner_password, &hash, &salt) {
            Ok(())
        } else {
            warn!(op, "could not verify database owner's password");
            Err(RolodexError::Credential)
        }
    }
}

/// Verifies the boot password against `sys_boot`, then the user's password
/// against their own `SECURE` table. Every failure collapses into a single
/// `Credential` error so callers can't probe which part was wrong.
async fn authenticate(
    pool: &SqlitePool,
    username: &str,
    boot_password: &str,
    password: &str,
) -> Result<(), RolodexError> {
    let boot: Option<(String, String)> =
        sqlx::query_as("SELECT salt, hash FROM sys_boot WHERE id = 1")
            .fetch_optional(pool)
            .await?;
    let Some((salt, hash)) = boot else {
        warn!(op = "connect", "database has no boot credential");
        return Err(RolodexError::Credential);
    };
    if !credential::verify_password(boot_password, &hash, &salt) {
        warn!(op = "connect", "invalid boot password");
        return Err(RolodexError::Credential);
    }

    let known: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM sys_users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    if known.is_none() {
        warn!(op = "connect", "invalid username or password");
        return Err(RolodexError::Credential);
    }

    let (salt, hash) = secure_record(pool, username).await?;
    if !credential::verify_password(password, &hash, &salt) {
        warn!(op = "connect", "invalid username or password");
        return Err(RolodexError::Credential);
    }
    Ok(())
}

async fn secure_record(pool: &SqlitePool, username: &str) -> Result<(String, String), RolodexError> {
    let sql = format!(
        "SELECT SALT, HASH FROM {}",
        schema::qualified(username, TABLE_SECURE)
    );
    let row: (String, String) = sqlx::query_as(&sql).fetch_one(pool).await?;
    Ok(row)
}

/// Replaces a user's `(salt, hash)` pair wholesale with a freshly derived
/// one. The pair is never patched partially.
async fn replace_secure(
    pool: &SqlitePool,
    username: &str,
    new_password: &str,
) -> Result<(), RolodexError> {
    let salt = credential::generate_salt(SALT_LENGTH)?;
    let hash = credential::hash_password(new_password, &salt);
    let sql = format!(
        "UPDATE {} SET SALT = ?, HASH = ?",
        schema::qualified(username, TABLE_SECURE)
    );
    sqlx::query(&sql).bind(&salt).bind(&hash).execute(pool).await?;
    Ok(())
}

fn validate_password(password: &str) -> Result<(), RolodexError> {
    if password.trim().is_empty() {
        return Err(RolodexError::validation(
            "password cannot be empty or all whitespace",
        ));
    }
    if password.trim() != password {
        return Err(RolodexError::validation(
            "password cannot have leading or trailing whitespace",
        ));
    }
    Ok(())
}

/// Group names travel into SQL text, so they must pass the identifier
/// whitelist and fit the `NAME varchar(40)` column, which the engine does
/// not enforce on its own; accepted names are normalised to uppercase.
fn validate_group_name(name: &str) -> Result<String, RolodexError> {
    if !sanitize::validate_identifier(name) {
        return Err(RolodexError::validation(
            "group names can only contain ASCII alphanumeric characters and underscores",
        ));
    }
    if name.len() > GROUP_NAME_MAX {
        return Err(RolodexError::validation(format!(
            "group names are limited to {GROUP_NAME_MAX} characters"
        )));
    }
    Ok(name.to_uppercase())
}

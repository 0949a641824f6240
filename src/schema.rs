//! SQL DDL for the catalog and per-tenant tables.
//!
//! Per-tenant tables keep the fully-qualified `<USER>.<TABLE>` form as
//! their physical name, quoted so the dot is part of the identifier.
//! Every username or table component reaching this module has already
//! passed the whitelist in [`crate::sanitize`], so none of them can carry
//! a quote character.

use crate::contact::ContactRecord;

pub const TABLE_CONTACTS: &str = "CONTACTS";
pub const TABLE_GROUPS: &str = "GROUPS";
pub const TABLE_SECURE: &str = "SECURE";

/// Catalog tables, created once per database.
///
/// `sys_users` stands in for the engine's user catalog: one row per login,
/// with the single `is_owner = 1` row written at database creation and
/// never updated afterwards. `sys_boot` holds the salted hash of the boot
/// password checked on every connect.
pub const CATALOG_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS sys_users (
    username TEXT PRIMARY KEY,
    is_owner INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sys_boot (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    salt TEXT NOT NULL,
    hash TEXT NOT NULL
);
"#;

/// Quoted physical name for `<user>.<table>`, as it appears in SQL text.
/// The unquoted form is what callers see in table listings.
pub fn qualified(user: &str, table: &str) -> String {
    format!("\"{user}.{table}\"")
}

/// `CONTACTS` DDL; the column list comes from [`ContactRecord`], which is
/// the single source of truth for the contact schema. `AUTOINCREMENT`
/// keeps ids monotone: a deleted id is never reassigned.
pub fn contacts_ddl(user: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (ID INTEGER PRIMARY KEY AUTOINCREMENT, {})",
        qualified(user, TABLE_CONTACTS),
        ContactRecord::column_defs(),
    )
}

/// `GROUPS` DDL. A group is not a first-class entity; it exists only as
/// the distinct `NAME` values present in this table.
pub fn groups_ddl(user: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (ID INTEGER PRIMARY KEY AUTOINCREMENT, NAME varchar(40), CONTACT_ID INTEGER)",
        qualified(user, TABLE_GROUPS),
    )
}

/// `SECURE` DDL: exactly one `(salt, hash)` row per user.
pub fn secure_ddl(user: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (SALT varchar(1024) NOT NULL, HASH varchar(1024) NOT NULL)",
        qualified(user, TABLE_SECURE),
    )
}

//! Connection parameters.
//!
//! All four values are required, with no defaults: the database file path,
//! the database's boot password, and the connecting user's name and
//! password. Embedding applications can construct the config directly or
//! pull it from `ROLODEX_`-prefixed environment variables.

use figment::{Figment, providers::Env};
use serde::Deserialize;

use crate::error::RolodexError;

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectConfig {
    /// Path of the SQLite database file. A path that does not exist yet
    /// triggers first-time setup (owner provisioning) on connect.
    pub database: String,
    /// Boot password gating access to the database as a whole.
    pub boot_password: String,
    /// Name of the user connecting to (or creating) the database.
    pub username: String,
    /// That user's password.
    pub password: String,
}

impl ConnectConfig {
    pub fn new(
        database: impl Into<String>,
        boot_password: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            boot_password: boot_password.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Extracts the config from `ROLODEX_DATABASE`, `ROLODEX_BOOT_PASSWORD`,
    /// `ROLODEX_USERNAME`, and `ROLODEX_PASSWORD`.
    pub fn from_env() -> Result<Self, RolodexError> {
        Figment::new()
            .merge(Env::prefixed("ROLODEX_"))
            .extract()
            .map_err(|e| RolodexError::validation(e.to_string()))
    }
}

//! Multi-tenant data-access layer for a contacts manager.
//!
//! Connecting to a database file that does not exist yet creates it and
//! provisions the connecting user as the immutable database owner; the
//! owner is a pure administrative role that manages users but holds no
//! contact data. Every other user is a regular tenant owning exactly one
//! namespace (named after them) with `CONTACTS`, `GROUPS`, and `SECURE`
//! tables.
//!
//! Because the engine cannot bind identifiers as statement parameters,
//! everything that ends up in SQL text as an identifier goes through the
//! whitelist in [`sanitize`]; values are bound as parameters wherever the
//! engine allows it, and contact field values are validated and escaped in
//! [`contact::ContactRecord`] before they are embedded.

pub mod authz;
pub mod config;
pub mod contact;
pub mod credential;
pub mod error;
pub mod provision;
pub mod sanitize;
pub mod schema;
pub mod session;

pub use config::ConnectConfig;
pub use contact::ContactRecord;
pub use error::RolodexError;
pub use session::{Session, SessionManager};

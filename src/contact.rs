//! Validated in-memory model of one contact's fields.
//!
//! A [`ContactRecord`] only allows the fixed, ordered field set defined by
//! [`ContactRecord::FIELDS`]; the same table drives the `CREATE TABLE`
//! column list for every tenant's `CONTACTS` table, so the record's schema
//! *is* the table's schema. Values are validated and escaped on assignment,
//! which is what makes [`ContactRecord::insert_fragment`] and
//! [`ContactRecord::update_fragment`] safe to embed in SQL text.

use crate::error::RolodexError;
use crate::sanitize;

const NAME_MAX: usize = 40;
const PHONE_MAX: usize = 16;

/// Validated contact fields, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactRecord {
    values: [Option<String>; 3],
}

impl ContactRecord {
    /// Column name and SQL descriptor of every contact field, in the order
    /// the columns appear in the `CONTACTS` table.
    pub const FIELDS: [(&'static str, &'static str); 3] = [
        ("FIRSTNAME", "varchar(40)"),
        ("SURNAME", "varchar(40)"),
        ("PHONE", "varchar(16)"),
    ];

    pub fn new() -> Self {
        Self::default()
    }

    fn index_of(field: &str) -> Option<usize> {
        let field = field.trim();
        Self::FIELDS
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(field))
    }

    /// Assigns `value` to `field` (case-insensitive lookup).
    ///
    /// A null-ish value (empty or all whitespace) clears the field. Anything
    /// else is validated per field: names allow letters, spaces, hyphens,
    /// and apostrophes (apostrophes are doubled before storage); phone
    /// numbers allow digits with at most one leading `+`. On rejection the
    /// record keeps its prior value for the field. Assignments chain:
    ///
    /// ```
    /// # use rolodex::ContactRecord;
    /// let mut record = ContactRecord::new();
    /// record.set("firstname", "Colin")?.set("SURNAME", "O'Neill")?;
    /// # Ok::<(), rolodex::RolodexError>(())
    /// ```
    pub fn set(&mut self, field: &str, value: &str) -> Result<&mut Self, RolodexError> {
        let Some(idx) = Self::index_of(field) else {
            return Err(RolodexError::validation(format!(
                "no such contact field '{field}'"
            )));
        };

        if value.trim().is_empty() {
            self.values[idx] = None;
            return Ok(self);
        }

        let stored = match Self::FIELDS[idx].0 {
            "PHONE" => {
                if !sanitize::validate_phone(value) {
                    return Err(RolodexError::validation(
                        "phone numbers can only contain digits and a single leading '+'",
                    ));
                }
                if value.len() > PHONE_MAX {
                    return Err(RolodexError::validation(format!(
                        "phone numbers are limited to {PHONE_MAX} characters"
                    )));
                }
                value.to_owned()
            }
            _ => {
                if !sanitize::validate_name(value) {
                    return Err(RolodexError::validation(
                        "name fields can only contain letters, spaces, dashes (-) and apostrophes (')",
                    ));
                }
                let escaped = sanitize::escape_name(value);
                if escaped.len() > NAME_MAX {
                    return Err(RolodexError::validation(format!(
                        "name fields are limited to {NAME_MAX} characters"
                    )));
                }
                escaped
            }
        };

        self.values[idx] = Some(stored);
        Ok(self)
    }

    /// Current (already-escaped) value of `field`, or `None` if cleared.
    pub fn get(&self, field: &str) -> Result<Option<&str>, RolodexError> {
        let Some(idx) = Self::index_of(field) else {
            return Err(RolodexError::validation(format!(
                "no such contact field '{field}'"
            )));
        };
        Ok(self.values[idx].as_deref())
    }

    /// Ordered non-null column names and their escaped values, or `None`
    /// when every field is null.
    pub fn projection(&self) -> Option<(Vec<&'static str>, Vec<&str>)> {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for ((name, _), value) in Self::FIELDS.iter().zip(&self.values) {
            if let Some(v) = value.as_deref() {
                columns.push(*name);
                values.push(v);
            }
        }
        if columns.is_empty() {
            None
        } else {
            Some((columns, values))
        }
    }

    /// `(COLS, ...) values ('v', ...)` fragment for an INSERT statement, or
    /// `None` when the record projects to nothing.
    pub fn insert_fragment(&self) -> Option<String> {
        let (columns, values) = self.projection()?;
        Some(format!(
            "({}) values ('{}')",
            columns.join(", "),
            values.join("', '")
        ))
    }

    /// Full-replace `SET` fragment covering *every* column: fields the
    /// record has cleared are written back as `NULL`, not skipped.
    pub fn update_fragment(&self) -> String {
        Self::FIELDS
            .iter()
            .zip(&self.values)
            .map(|((name, _), value)| match value.as_deref() {
                Some(v) => format!("{name} = '{v}'"),
                None => format!("{name} = NULL"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Column definitions for the `CONTACTS` CREATE TABLE statement.
    pub fn column_defs() -> String {
        Self::FIELDS
            .iter()
            .map(|(name, descriptor)| format!("{name} {descriptor}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

//! Defines the ID type used for rows in the application database.

/// The integer type SQLite uses for row IDs.
pub type DatabaseId = i64;

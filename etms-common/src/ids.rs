//! Record identifier helpers
//!
//! Rows are keyed by UUIDv4 stored as TEXT.

use crate::{Error, Result};
use uuid::Uuid;

/// Generate a new record id
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse an id read back from the database
///
/// A malformed stored id is a data-integrity problem, not a caller error.
pub fn parse_stored(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid stored id {:?}: {}", s, e)))
}

/// Parse an id supplied by a caller
pub fn parse_input(kind: &str, s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| Error::InvalidInput(format!("Invalid {} id: {}", kind, s)))
}

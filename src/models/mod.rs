//! Persisted data models.
//!
//! Only upload metadata lives in the database; object bytes live in the
//! object store and are addressed by the same name.

pub mod upload_record;

//! Represents one recorded upload name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the `uploads` table.
///
/// Created on the first successful upload of a name and never updated
/// afterwards, so `uploaded_at` keeps the time of that first upload.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct UploadRecord {
    /// Object key in the bucket; primary key of the table.
    pub name: String,

    /// Insertion time, assigned by the database default.
    pub uploaded_at: DateTime<Utc>,
}

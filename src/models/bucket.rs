//! Represents a logical bucket, a top-level container for objects.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Bucket attributes as reported by the storage backend.
///
/// Fetching these is the cheapest way to prove a bucket is reachable, which
/// is what the readiness probe relies on.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct BucketAttributes {
    /// Bucket name.
    pub name: String,

    /// When this bucket was created.
    pub created: DateTime<Utc>,
}

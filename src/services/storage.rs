//! The storage gateway seam.
//!
//! Everything the proxy needs from an object store goes through
//! [`StorageGateway`]. Handlers only ever see `Arc<dyn StorageGateway>`, so the
//! backend is picked once at startup.

use crate::models::{
    bucket::BucketAttributes,
    metadata::ObjectMetadata,
    object::{ObjectAttributes, ObjectReference, ObjectSummary},
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StorageError {
    pub fn object_not_found(object: &ObjectReference) -> Self {
        Self::ObjectNotFound {
            bucket: object.bucket().to_string(),
            key: object.key().to_string(),
        }
    }

    /// Bucket or object absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::BucketNotFound(_) | StorageError::ObjectNotFound { .. }
        )
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Object payload as a stream of chunks.
pub type ObjectReader = BoxStream<'static, io::Result<Bytes>>;

/// Operations offered by an object store.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Fetch object attributes.
    async fn attrs(&self, object: &ObjectReference) -> StorageResult<ObjectAttributes>;

    /// Open the object payload for reading.
    async fn reader(&self, object: &ObjectReference) -> StorageResult<ObjectReader>;

    /// Overwrite the object with `data`.
    async fn put(
        &self,
        object: &ObjectReference,
        data: Bytes,
        metadata: ObjectMetadata,
    ) -> StorageResult<ObjectAttributes>;

    /// Delete the object. Absent objects yield `ObjectNotFound`.
    async fn delete(&self, object: &ObjectReference) -> StorageResult<()>;

    /// Stream every object whose key starts with `prefix`, in key order.
    fn list<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
    ) -> BoxStream<'a, StorageResult<ObjectSummary>>;

    /// Fetch bucket attributes.
    async fn bucket_attrs(&self, bucket: &str) -> StorageResult<BucketAttributes>;
}

//! In-memory storage backend.
//!
//! Objects live in ordered maps so listings come out in key order, the same
//! guarantee the SQLite backend gives. Nothing survives a restart.

use crate::{
    models::{
        bucket::BucketAttributes,
        metadata::ObjectMetadata,
        object::{ObjectAttributes, ObjectReference, ObjectSummary},
    },
    services::storage::{ObjectReader, StorageError, StorageGateway, StorageResult},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
};

struct StoredObject {
    data: Bytes,
    attrs: ObjectAttributes,
}

struct MemoryBucket {
    created: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Default)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, MemoryBucket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the bucket unless it already exists.
    pub fn ensure_bucket(&self, name: &str) {
        self.buckets
            .write()
            .entry(name.to_string())
            .or_insert_with(|| MemoryBucket {
                created: Utc::now(),
                objects: BTreeMap::new(),
            });
    }
}

#[async_trait]
impl StorageGateway for MemoryStore {
    async fn attrs(&self, object: &ObjectReference) -> StorageResult<ObjectAttributes> {
        let buckets = self.buckets.read();
        let bucket = buckets
            .get(object.bucket())
            .ok_or_else(|| StorageError::BucketNotFound(object.bucket().to_string()))?;
        bucket
            .objects
            .get(object.key())
            .map(|stored| stored.attrs.clone())
            .ok_or_else(|| StorageError::object_not_found(object))
    }

    async fn reader(&self, object: &ObjectReference) -> StorageResult<ObjectReader> {
        let data = {
            let buckets = self.buckets.read();
            let bucket = buckets
                .get(object.bucket())
                .ok_or_else(|| StorageError::BucketNotFound(object.bucket().to_string()))?;
            bucket
                .objects
                .get(object.key())
                .map(|stored| stored.data.clone())
                .ok_or_else(|| StorageError::object_not_found(object))?
        };
        Ok(stream::once(async move { Ok(data) }).boxed())
    }

    async fn put(
        &self,
        object: &ObjectReference,
        data: Bytes,
        metadata: ObjectMetadata,
    ) -> StorageResult<ObjectAttributes> {
        if object.key().is_empty() {
            return Err(StorageError::InvalidObjectKey);
        }
        let mut buckets = self.buckets.write();
        let bucket = buckets
            .get_mut(object.bucket())
            .ok_or_else(|| StorageError::BucketNotFound(object.bucket().to_string()))?;

        let now = Utc::now();
        let attrs = ObjectAttributes {
            bucket: object.bucket().to_string(),
            name: object.key().to_string(),
            metadata,
            size: data.len() as u64,
            md5_hash: general_purpose::STANDARD.encode(md5::compute(&data).0),
            created: now,
            updated: now,
        };
        bucket.objects.insert(
            object.key().to_string(),
            StoredObject {
                data,
                attrs: attrs.clone(),
            },
        );
        Ok(attrs)
    }

    async fn delete(&self, object: &ObjectReference) -> StorageResult<()> {
        let mut buckets = self.buckets.write();
        let bucket = buckets
            .get_mut(object.bucket())
            .ok_or_else(|| StorageError::BucketNotFound(object.bucket().to_string()))?;
        bucket
            .objects
            .remove(object.key())
            .map(|_| ())
            .ok_or_else(|| StorageError::object_not_found(object))
    }

    fn list<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
    ) -> BoxStream<'a, StorageResult<ObjectSummary>> {
        let buckets = self.buckets.read();
        let Some(found) = buckets.get(bucket) else {
            let err = StorageError::BucketNotFound(bucket.to_string());
            return stream::once(async move { Err(err) }).boxed();
        };
        let summaries: Vec<_> = found
            .objects
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, stored)| {
                Ok(ObjectSummary {
                    key: key.clone(),
                    size: stored.attrs.size,
                    created: stored.attrs.created,
                })
            })
            .collect();
        stream::iter(summaries).boxed()
    }

    async fn bucket_attrs(&self, bucket: &str) -> StorageResult<BucketAttributes> {
        self.buckets
            .read()
            .get(bucket)
            .map(|found| BucketAttributes {
                name: bucket.to_string(),
                created: found.created,
            })
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))
    }
}

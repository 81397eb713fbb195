//! Represents an object (blob) addressed by bucket and key.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::metadata::ObjectMetadata;

/// Rejected path components.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidReference {
    #[error("bucket name `{0}` is invalid")]
    BucketName(String),
}

/// Identifies a target in the storage namespace.
///
/// The key may be empty, which denotes the bucket root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReference {
    bucket: String,
    key: String,
}

impl ObjectReference {
    /// Build a reference from path components.
    ///
    /// Bucket names are limited to ASCII letters, digits, `-`, `_` and `.`.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self, InvalidReference> {
        let bucket = bucket.into();
        let valid = !bucket.is_empty()
            && bucket
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
        if !valid {
            return Err(InvalidReference::BucketName(bucket));
        }
        Ok(Self {
            bucket,
            key: key.into(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Object attributes as reported by the storage backend.
///
/// This is also the JSON body of a metadata GET.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAttributes {
    pub bucket: String,

    /// Object key.
    pub name: String,

    #[serde(flatten)]
    pub metadata: ObjectMetadata,

    /// Payload size in bytes.
    pub size: u64,

    /// Base64 MD5 digest of the payload.
    pub md5_hash: String,

    /// When this generation of the object was written.
    pub created: DateTime<Utc>,

    pub updated: DateTime<Utc>,
}

impl ObjectAttributes {
    /// Hex form of the MD5 digest, used as the entity tag.
    pub fn etag(&self) -> Option<String> {
        use base64::{Engine as _, engine::general_purpose};

        general_purpose::STANDARD
            .decode(&self.md5_hash)
            .ok()
            .map(hex::encode)
    }
}

/// One item of a prefix listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub created: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_path_like_keys_and_empty_root() {
        let reference = ObjectReference::new("my_bucket-1.data", "photos/2025/img.jpg").unwrap();
        assert_eq!(reference.bucket(), "my_bucket-1.data");
        assert_eq!(reference.key(), "photos/2025/img.jpg");

        let root = ObjectReference::new("bucket", "").unwrap();
        assert_eq!(root.key(), "");
    }

    #[test]
    fn rejects_bucket_names_outside_charset() {
        assert_eq!(
            ObjectReference::new("", "key"),
            Err(InvalidReference::BucketName(String::new()))
        );
        assert!(ObjectReference::new("bad bucket", "key").is_err());
        assert!(ObjectReference::new("bucket%2F", "key").is_err());
        assert!(ObjectReference::new("b/c", "key").is_err());
    }

    #[test]
    fn attributes_serialize_as_camel_case_without_empty_metadata() {
        let created = DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let attrs = ObjectAttributes {
            bucket: "bucket".into(),
            name: "a.txt".into(),
            metadata: ObjectMetadata {
                content_type: Some("text/plain".into()),
                ..Default::default()
            },
            size: 5,
            md5_hash: "XUFAKrxLKna5cZ2REBfFkg==".into(),
            created,
            updated: created,
        };

        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json["contentType"], "text/plain");
        assert_eq!(json["md5Hash"], "XUFAKrxLKna5cZ2REBfFkg==");
        assert_eq!(json["size"], 5);
        assert!(json.get("cacheControl").is_none());
        assert_eq!(attrs.etag().as_deref(), Some("5d41402abc4b2a76b9719d911017c592"));
    }
}

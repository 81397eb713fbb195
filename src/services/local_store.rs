//! src/services/local_store.rs
//!
//! LocalStore: a storage backend with SQLite metadata and on-disk payloads.
//! Payload files are sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{md5(bucket/key)}-{generation}`, so
//! arbitrary keys (including ones with `..` or trailing slashes) never become
//! filesystem paths.
//!
//! Every write lands in a fresh generation file and the row is switched to it
//! in a single upsert. The file the row pointed at before is removed only
//! after that upsert commits, so a row never references another write's
//! payload.

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
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(FromRow)]
struct BucketRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ObjectRow {
    key: String,
    content_type: Option<String>,
    content_language: Option<String>,
    cache_control: Option<String>,
    content_encoding: Option<String>,
    content_disposition: Option<String>,
    size_bytes: i64,
    md5_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Upsert result: the new row plus the payload it replaced, if any.
#[derive(FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    object: ObjectRow,
    previous_payload: Option<String>,
}

impl ObjectRow {
    fn into_attributes(self, bucket: &str) -> ObjectAttributes {
        ObjectAttributes {
            bucket: bucket.to_string(),
            name: self.key,
            metadata: ObjectMetadata {
                content_type: self.content_type,
                content_language: self.content_language,
                cache_control: self.cache_control,
                content_encoding: self.content_encoding,
                content_disposition: self.content_disposition,
            },
            size: u64::try_from(self.size_bytes).unwrap_or_default(),
            md5_hash: self.md5_hash,
            created: self.created_at,
            updated: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SummaryRow {
    key: String,
    size_bytes: i64,
    created_at: DateTime<Utc>,
}

impl From<SummaryRow> for ObjectSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            key: row.key,
            size: u64::try_from(row.size_bytes).unwrap_or_default(),
            created: row.created_at,
        }
    }
}

/// Storage backend for a single-node deployment.
///
/// Overwrites replace both payload and metadata; there is no versioning.
#[derive(Clone)]
pub struct LocalStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

impl LocalStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Open (creating if needed) the database and payload directory.
    pub async fn connect(database_url: &str, base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        debug!("opening SQLite database {}", options.get_filename().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(Arc::new(pool), base_path))
    }

    /// Apply the embedded schema. Every statement is idempotent.
    pub async fn migrate(&self) -> StorageResult<()> {
        let statements = SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        debug!("running {} schema statements", statements.len());
        for stmt in statements {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Register a bucket and create its directory. Existing buckets are left alone.
    pub async fn ensure_bucket(&self, name: &str) -> StorageResult<()> {
        fs::create_dir_all(self.bucket_root(name)).await?;
        sqlx::query("INSERT OR IGNORE INTO buckets (id, name, created_at) VALUES (?, ?, ?)")
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(Utc::now())
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        self.base_path.join(bucket_name)
    }

    /// A new `bucket/{aa}/{bb}/{digest}-{generation}` path, relative to `base_path`.
    /// The digest is MD5(bucket/key); the generation is unique per write.
    fn new_payload_path(bucket_name: &str, key: &str) -> String {
        let digest = format!("{:x}", md5::compute(format!("{}/{}", bucket_name, key)));
        format!(
            "{}/{}/{}/{}-{}",
            bucket_name,
            &digest[0..2],
            &digest[2..4],
            digest,
            Uuid::new_v4().simple()
        )
    }

    fn absolute(&self, payload_path: &str) -> PathBuf {
        self.base_path.join(payload_path)
    }

    /// Remove a payload that no row references any more, then prune its shard dirs.
    async fn discard_payload(&self, bucket_name: &str, payload_path: &str) -> StorageResult<()> {
        let file_path = self.absolute(payload_path);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed payload {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("payload {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(bucket_name);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }
        Ok(())
    }

    async fn fetch_bucket(&self, bucket: &str) -> StorageResult<BucketRow> {
        sqlx::query_as::<_, BucketRow>("SELECT id, name, created_at FROM buckets WHERE name = ?")
            .bind(bucket)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))
    }

    /// Write `data` to a temp file next to `file_path`, fsync, then rename into place.
    async fn write_payload(&self, file_path: &Path, data: &[u8]) -> StorageResult<()> {
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, file_path).await
        }
        .await;

        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        Ok(())
    }

    /// Remove empty shard directories up to (not including) the bucket root.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl StorageGateway for LocalStore {
    async fn attrs(&self, object: &ObjectReference) -> StorageResult<ObjectAttributes> {
        let bucket = self.fetch_bucket(object.bucket()).await?;
        sqlx::query_as::<_, ObjectRow>(
            "SELECT key, content_type, content_language, cache_control, content_encoding,
                    content_disposition, size_bytes, md5_hash, created_at, updated_at
             FROM objects WHERE bucket_id = ? AND key = ?",
        )
        .bind(bucket.id)
        .bind(object.key())
        .fetch_optional(&*self.db)
        .await?
        .map(|row| row.into_attributes(&bucket.name))
        .ok_or_else(|| StorageError::object_not_found(object))
    }

    async fn reader(&self, object: &ObjectReference) -> StorageResult<ObjectReader> {
        let payload_path = sqlx::query_scalar::<_, String>(
            "SELECT o.payload_path
             FROM objects o JOIN buckets b ON o.bucket_id = b.id
             WHERE b.name = ? AND o.key = ?",
        )
        .bind(object.bucket())
        .bind(object.key())
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| StorageError::object_not_found(object))?;

        let file = File::open(self.absolute(&payload_path)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::object_not_found(object)
            } else {
                StorageError::Io(err)
            }
        })?;
        Ok(ReaderStream::new(file).boxed())
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
        let bucket = self.fetch_bucket(object.bucket()).await?;

        let payload_path = Self::new_payload_path(&bucket.name, object.key());
        let file_path = self.absolute(&payload_path);
        self.write_payload(&file_path, &data).await?;

        let now = Utc::now();
        let md5_hash = general_purpose::STANDARD.encode(md5::compute(&data).0);
        let upserted = sqlx::query_as::<_, UpsertRow>(
            r#"
            INSERT INTO objects (
                id, bucket_id, key, content_type, content_language, cache_control,
                content_encoding, content_disposition, size_bytes, md5_hash,
                payload_path, previous_payload, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
            ON CONFLICT(bucket_id, key) DO UPDATE SET
                content_type = excluded.content_type,
                content_language = excluded.content_language,
                cache_control = excluded.cache_control,
                content_encoding = excluded.content_encoding,
                content_disposition = excluded.content_disposition,
                size_bytes = excluded.size_bytes,
                md5_hash = excluded.md5_hash,
                previous_payload = objects.payload_path,
                payload_path = excluded.payload_path,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            RETURNING key, content_type, content_language, cache_control, content_encoding,
                      content_disposition, size_bytes, md5_hash, created_at, updated_at,
                      previous_payload
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bucket.id)
        .bind(object.key())
        .bind(metadata.content_type.as_deref())
        .bind(metadata.content_language.as_deref())
        .bind(metadata.cache_control.as_deref())
        .bind(metadata.content_encoding.as_deref())
        .bind(metadata.content_disposition.as_deref())
        .bind(data.len() as i64)
        .bind(&md5_hash)
        .bind(&payload_path)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await;

        let row = match upserted {
            Ok(row) => row,
            Err(err) => {
                // The row still points at the previous payload, which stays intact.
                let _ = fs::remove_file(&file_path).await;
                return Err(StorageError::Sqlx(err));
            }
        };

        if let Some(previous) = row.previous_payload.as_deref() {
            if let Err(err) = self.discard_payload(&bucket.name, previous).await {
                debug!("leaving stale payload {}: {}", previous, err);
            }
        }
        Ok(row.object.into_attributes(&bucket.name))
    }

    async fn delete(&self, object: &ObjectReference) -> StorageResult<()> {
        let bucket = self.fetch_bucket(object.bucket()).await?;
        let payload_path = sqlx::query_scalar::<_, String>(
            "DELETE FROM objects WHERE bucket_id = ? AND key = ? RETURNING payload_path",
        )
        .bind(bucket.id)
        .bind(object.key())
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| StorageError::object_not_found(object))?;

        self.discard_payload(&bucket.name, &payload_path).await
    }

    fn list<'a>(
        &'a self,
        bucket: &'a str,
        prefix: &'a str,
    ) -> BoxStream<'a, StorageResult<ObjectSummary>> {
        sqlx::query_as::<_, SummaryRow>(
            "SELECT o.key, o.size_bytes, o.created_at
             FROM objects o JOIN buckets b ON o.bucket_id = b.id
             WHERE b.name = ? AND substr(o.key, 1, length(?)) = ?
             ORDER BY o.key ASC",
        )
        .bind(bucket)
        .bind(prefix)
        .bind(prefix)
        .fetch(&*self.db)
        .map_ok(ObjectSummary::from)
        .map_err(StorageError::from)
        .boxed()
    }

    async fn bucket_attrs(&self, bucket: &str) -> StorageResult<BucketAttributes> {
        let row = self.fetch_bucket(bucket).await?;
        Ok(BucketAttributes {
            name: row.name,
            created: row.created_at,
        })
    }
}

//! Directory emulation over a flat key namespace.
//!
//! A "directory" is any prefix ending in `/` that at least one key starts
//! with. Listing it shows immediate children only: plain objects with their
//! size and creation date, deeper prefixes collapsed to `name/`.

use crate::{
    models::{
        listing::{DirectoryEntry, EntrySize},
        object::ObjectSummary,
    },
    services::storage::{StorageGateway, StorageResult},
};
use futures::{StreamExt, TryStreamExt};
use std::collections::HashSet;

/// Append `/` to a non-empty key that lacks it.
pub fn directory_prefix(key: &str) -> String {
    if key.is_empty() || key.ends_with('/') {
        key.to_string()
    } else {
        format!("{}/", key)
    }
}

/// True when at least one object lives under `key` treated as a directory.
pub async fn is_directory(
    storage: &dyn StorageGateway,
    bucket: &str,
    key: &str,
) -> StorageResult<bool> {
    let prefix = directory_prefix(key);
    let mut listing = storage.list(bucket, &prefix);
    match listing.next().await {
        Some(Ok(_)) => Ok(true),
        Some(Err(err)) => Err(err),
        None => Ok(false),
    }
}

/// Collect the immediate children of `prefix`.
pub async fn list_directory(
    storage: &dyn StorageGateway,
    bucket: &str,
    prefix: &str,
) -> StorageResult<Vec<DirectoryEntry>> {
    let mut builder = ListingBuilder::new(prefix);
    let mut listing = storage.list(bucket, prefix);
    while let Some(summary) = listing.try_next().await? {
        builder.push(&summary);
    }
    Ok(builder.finish())
}

/// Folds prefix-listing items into unique directory entries.
///
/// Names are deduplicated with a set, so the result does not depend on the
/// backend returning keys in order. Entries keep first-seen order.
pub struct ListingBuilder<'a> {
    prefix: &'a str,
    seen: HashSet<String>,
    entries: Vec<DirectoryEntry>,
}

impl<'a> ListingBuilder<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self {
            prefix,
            seen: HashSet::new(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, summary: &ObjectSummary) {
        let Some(remainder) = summary.key.strip_prefix(self.prefix) else {
            return;
        };
        // The placeholder object for the prefix itself.
        if remainder.is_empty() {
            return;
        }

        let entry = match remainder.split_once('/') {
            Some((segment, _)) => DirectoryEntry {
                name: format!("{}/", segment),
                modified: None,
                size: EntrySize::Directory,
            },
            None => DirectoryEntry {
                name: remainder.to_string(),
                modified: Some(summary.created),
                size: EntrySize::Bytes(summary.size),
            },
        };

        if self.seen.insert(entry.name.clone()) {
            self.entries.push(entry);
        }
    }

    pub fn finish(self) -> Vec<DirectoryEntry> {
        self.entries
    }
}

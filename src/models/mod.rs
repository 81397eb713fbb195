//! Core data models for the object proxy.
//!
//! These describe what the storage backend reports (attributes, listing
//! summaries) and what the proxy synthesizes per request (references,
//! directory entries). None of them are persisted by the proxy itself.

pub mod bucket;
pub mod listing;
pub mod metadata;
pub mod object;

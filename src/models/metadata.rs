//! Content headers stored alongside an object.

use axum::http::{HeaderMap, HeaderName, header};
use serde::Serialize;

/// System metadata supplied on upload and replayed on download.
///
/// Each field mirrors the HTTP header of the same name.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
}

impl ObjectMetadata {
    /// Pick the content headers out of an upload request.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            content_type: get(header::CONTENT_TYPE),
            content_language: get(header::CONTENT_LANGUAGE),
            cache_control: get(header::CACHE_CONTROL),
            content_encoding: get(header::CONTENT_ENCODING),
            content_disposition: get(header::CONTENT_DISPOSITION),
        }
    }

    /// Header name/value pairs for every non-empty field.
    pub fn headers(&self) -> impl Iterator<Item = (HeaderName, &str)> {
        [
            (header::CONTENT_TYPE, &self.content_type),
            (header::CONTENT_LANGUAGE, &self.content_language),
            (header::CACHE_CONTROL, &self.cache_control),
            (header::CONTENT_ENCODING, &self.content_encoding),
            (header::CONTENT_DISPOSITION, &self.content_disposition),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        })
    }
}

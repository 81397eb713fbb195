//! HTTP handler for object paths.
//!
//! Every method on `/{bucket}/{*object}` lands in [`proxy_object`], which maps
//! it onto exactly one storage operation. GET/HEAD first decide whether the
//! key names an emulated directory; if not, the object is served as JSON
//! metadata, as raw bytes, or as a redirect to a signed URL.

use crate::{
    errors::AppError,
    handlers::directory_index::render_directory_index,
    models::{
        metadata::ObjectMetadata,
        object::{ObjectAttributes, ObjectReference},
    },
    services::directory,
    state::AppState,
};
use axum::{
    Json,
    body::{Body, to_bytes},
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Path parameters. `object` is absent on the bucket-root route.
#[derive(Debug, Deserialize)]
pub struct ObjectPath {
    pub bucket: String,
    #[serde(default)]
    pub object: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectQuery {
    pub alt: Option<String>,
}

impl ObjectQuery {
    /// `alt=media` asks for the payload; anything else gets JSON metadata.
    fn wants_media(&self) -> bool {
        self.alt.as_deref() == Some("media")
    }
}

/// Methods accepted on object paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl ObjectMethod {
    pub const ALLOW: &'static str = "GET, HEAD, POST, PUT, DELETE";
}

impl TryFrom<&Method> for ObjectMethod {
    type Error = AppError;

    fn try_from(method: &Method) -> Result<Self, Self::Error> {
        match *method {
            Method::GET => Ok(ObjectMethod::Get),
            Method::HEAD => Ok(ObjectMethod::Head),
            Method::POST => Ok(ObjectMethod::Post),
            Method::PUT => Ok(ObjectMethod::Put),
            Method::DELETE => Ok(ObjectMethod::Delete),
            _ => Err(AppError::method_not_allowed()),
        }
    }
}

/// `ANY /{bucket}/{*object}`
pub async fn proxy_object(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    Path(path): Path<ObjectPath>,
    Query(query): Query<ObjectQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let method = match ObjectMethod::try_from(&method) {
        Ok(method) => method,
        Err(err) => {
            let mut response = err.into_response();
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(ObjectMethod::ALLOW));
            return Ok(response);
        }
    };
    let object = ObjectReference::new(path.bucket, path.object)?;

    match method {
        ObjectMethod::Get => read_object(&state, &object, &uri, &query, false).await,
        ObjectMethod::Head => read_object(&state, &object, &uri, &query, true).await,
        ObjectMethod::Post | ObjectMethod::Put => {
            write_object(&state, &object, &headers, body).await
        }
        ObjectMethod::Delete => delete_object(&state, &object).await,
    }
}

async fn read_object(
    state: &AppState,
    object: &ObjectReference,
    uri: &Uri,
    query: &ObjectQuery,
    head_only: bool,
) -> Result<Response, AppError> {
    let storage = state.storage.as_ref();
    if object.key().is_empty() {
        // The bucket root is always a directory, even with nothing in it.
        storage.bucket_attrs(object.bucket()).await?;
        return list_directory(state, object, uri).await;
    }
    if directory::is_directory(storage, object.bucket(), object.key()).await? {
        return list_directory(state, object, uri).await;
    }

    let attrs = storage.attrs(object).await?;
    if !query.wants_media() {
        return Ok(Json(&attrs).into_response());
    }

    if let Some(signer) = &state.signer {
        let url = signer.sign_get(object, Utc::now());
        debug!(
            "redirecting {}/{} to signed URL valid for {:?}",
            object.bucket(),
            object.key(),
            signer.expires_in()
        );
        return Ok(Redirect::temporary(&url).into_response());
    }

    let body = if head_only {
        Body::empty()
    } else {
        Body::from_stream(storage.reader(object).await?)
    };
    let mut response = Response::new(body);
    set_object_headers(response.headers_mut(), &attrs);
    Ok(response)
}

/// Serve the listing for a directory key, canonicalizing to a trailing slash first.
async fn list_directory(
    state: &AppState,
    object: &ObjectReference,
    uri: &Uri,
) -> Result<Response, AppError> {
    let prefix = object.key();
    if !prefix.is_empty() && !prefix.ends_with('/') {
        let location = match uri.query() {
            Some(q) => format!("{}/?{}", uri.path(), q),
            None => format!("{}/", uri.path()),
        };
        return Ok(Redirect::permanent(&location).into_response());
    }

    let entries = directory::list_directory(state.storage.as_ref(), object.bucket(), prefix).await?;
    debug!(
        "listed {} entries under {}/{}",
        entries.len(),
        object.bucket(),
        prefix
    );
    Ok(Html(render_directory_index(object.bucket(), prefix, &entries)).into_response())
}

/// Buffer the whole request body and overwrite the object with it.
async fn write_object(
    state: &AppState,
    object: &ObjectReference,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let data = to_bytes(body, usize::MAX)
        .await
        .map_err(|err| AppError::internal(format!("reading request body: {}", err)))?;
    let attrs = state
        .storage
        .put(object, data, ObjectMetadata::from_headers(headers))
        .await?;
    debug!(
        "stored {}/{} ({} bytes)",
        object.bucket(),
        object.key(),
        attrs.size
    );

    let mut response = StatusCode::OK.into_response();
    if let Some(etag) = attrs.etag() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            response.headers_mut().insert(header::ETAG, value);
        }
    }
    Ok(response)
}

async fn delete_object(state: &AppState, object: &ObjectReference) -> Result<Response, AppError> {
    state.storage.delete(object).await?;
    debug!("deleted {}/{}", object.bucket(), object.key());
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Mirror object attributes onto a media response. Empty values are skipped.
fn set_object_headers(headers: &mut HeaderMap, attrs: &ObjectAttributes) {
    for (name, value) in attrs.metadata.headers() {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => debug!("skipping unrepresentable {} value", name),
        }
    }

    if attrs.size > 0 {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(attrs.size));
    }

    if let Some(etag) = attrs.etag() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&attrs.updated.format(HTTP_DATE_FORMAT).to_string()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}

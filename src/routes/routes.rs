//! Defines routes for the object proxy.
//!
//! ## Structure
//! - **Object-level endpoints** (`/{bucket}/` is the bucket root)
//!   - `GET    /{bucket}/{*object}`: listing, JSON metadata, or `?alt=media` payload
//!   - `HEAD   /{bucket}/{*object}`: same headers as GET, no body
//!   - `PUT    /{bucket}/{*object}`: upload object (POST is accepted too)
//!   - `DELETE /{bucket}/{*object}`: delete object
//!
//! - **Probes**
//!   - `GET /healthz`: liveness
//!   - `GET /readiness`: bucket reachability
//!
//! The wildcard `*object` allows nested keys like `photos/2025/img.jpg`.

use crate::{
    handlers::{
        health_handlers::{healthz, readiness},
        object_handlers::proxy_object,
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{any, get},
};

/// Build and return the router.
///
/// Object paths accept any method so that unsupported ones get an explicit
/// 405 from the dispatcher.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readiness", get(readiness))
        .route("/{bucket}/", any(proxy_object))
        .route("/{bucket}/{*object}", any(proxy_object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        memory_store::MemoryStore, readiness::ReadinessProber, signer::UrlSigner,
        storage::StorageGateway,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, Response, StatusCode, header},
    };
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    fn app_with(signer: Option<UrlSigner>, readiness_buckets: &[&str]) -> Router {
        let store = MemoryStore::new();
        store.ensure_bucket("real-bucket");
        let storage: Arc<dyn StorageGateway> = Arc::new(store);
        let prober = ReadinessProber::new(
            Arc::clone(&storage),
            readiness_buckets.iter().map(|b| b.to_string()).collect(),
            Duration::from_secs(5),
        );
        routes().with_state(AppState::new(storage, signer, prober))
    }

    fn app() -> Router {
        app_with(None, &["real-bucket"])
    }

    async fn send(app: &Router, method: &str, uri: &str, body: &'static str) -> Response<Body> {
        app.clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn healthz_is_always_ok() {
        let app = app_with(None, &["fake-1"]);
        let response = send(&app, "GET", "/healthz", "").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_needs_one_reachable_bucket() {
        let cases: &[(&[&str], StatusCode)] = &[
            (&["fake-1"], StatusCode::SERVICE_UNAVAILABLE),
            (&["fake-1", "fake-2"], StatusCode::SERVICE_UNAVAILABLE),
            (&["fake-1", "real-bucket"], StatusCode::OK),
            (&["real-bucket", "fake-1"], StatusCode::OK),
        ];
        for (buckets, expected) in cases {
            let app = app_with(None, buckets);
            let response = send(&app, "GET", "/readiness", "").await;
            assert_eq!(response.status(), *expected, "buckets {:?}", buckets);
        }
    }

    #[tokio::test]
    async fn put_then_get_media_round_trips() {
        let app = app();
        let put = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/real-bucket/docs/hello.txt")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .header(header::CACHE_CONTROL, "no-cache")
                    .body(Body::from("hello world"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(put.status(), StatusCode::OK);
        assert!(put.headers().contains_key(header::ETAG));

        let response = send(&app, "GET", "/real-bucket/docs/hello.txt?alt=media", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_LENGTH], "11");
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert!(!headers.contains_key(header::CONTENT_LANGUAGE));
        assert_eq!(body_bytes(response).await, b"hello world");
    }

    #[tokio::test]
    async fn post_uploads_like_put() {
        let app = app();
        let response = send(&app, "POST", "/real-bucket/posted", "via post").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, "GET", "/real-bucket/posted?alt=media", "").await;
        assert_eq!(body_bytes(response).await, b"via post");
    }

    #[tokio::test]
    async fn get_without_alt_returns_json_metadata() {
        let app = app();
        send(&app, "PUT", "/real-bucket/meta.bin", "12345").await;

        let response = send(&app, "GET", "/real-bucket/meta.bin", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["bucket"], "real-bucket");
        assert_eq!(json["name"], "meta.bin");
        assert_eq!(json["size"], 5);
    }

    #[tokio::test]
    async fn head_media_sends_headers_only() {
        let app = app();
        send(&app, "PUT", "/real-bucket/h.txt", "abc").await;

        let response = send(&app, "HEAD", "/real-bucket/h.txt?alt=media", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "3");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn missing_objects_and_buckets_are_404() {
        let app = app();
        for uri in [
            "/real-bucket/nope.txt",
            "/real-bucket/nope.txt?alt=media",
            "/fake-bucket/nope.txt",
            "/fake-bucket/",
        ] {
            let response = send(&app, "GET", uri, "").await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn invalid_bucket_name_is_404() {
        let app = app();
        let response = send(&app, "GET", "/bad%20bucket/key", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_then_delete_again() {
        let app = app();
        send(&app, "PUT", "/real-bucket/tmp", "x").await;

        let response = send(&app, "DELETE", "/real-bucket/tmp", "").await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, "DELETE", "/real-bucket/tmp", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, "GET", "/real-bucket/tmp", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_methods_are_405() {
        let app = app();
        send(&app, "PUT", "/real-bucket/file", "x").await;

        for _ in 0..2 {
            for uri in ["/real-bucket/file", "/real-bucket/missing", "/real-bucket/"] {
                let response = send(&app, "PATCH", uri, "").await;
                assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{}", uri);
                assert_eq!(
                    response.headers()[header::ALLOW],
                    "GET, HEAD, POST, PUT, DELETE"
                );
            }
        }
    }

    #[tokio::test]
    async fn directory_listing_shows_immediate_children_once() {
        let app = app();
        send(&app, "PUT", "/real-bucket/dir/a.txt", "hello").await;
        send(&app, "PUT", "/real-bucket/dir/b/c.txt", "x").await;
        send(&app, "PUT", "/real-bucket/dir/b/d.txt", "y").await;

        let response = send(&app, "GET", "/real-bucket/dir/", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );

        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert_eq!(html.matches("<a href=\"a.txt\">").count(), 1);
        assert_eq!(html.matches("<a href=\"b/\">").count(), 1);
        assert!(html.contains("<td>5</td>"));
        assert!(html.contains("<a href=\"../\">"));
    }

    #[tokio::test]
    async fn directory_without_trailing_slash_redirects() {
        let app = app();
        send(&app, "PUT", "/real-bucket/dir/a.txt", "hello").await;

        let response = send(&app, "GET", "/real-bucket/dir", "").await;
        assert!(matches!(
            response.status(),
            StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
        ));
        assert_eq!(response.headers()[header::LOCATION], "/real-bucket/dir/");

        let response = send(&app, "GET", "/real-bucket/dir?x=1", "").await;
        assert_eq!(response.headers()[header::LOCATION], "/real-bucket/dir/?x=1");
    }

    #[tokio::test]
    async fn bucket_root_lists_top_level() {
        let app = app();
        send(&app, "PUT", "/real-bucket/top.txt", "1").await;
        send(&app, "PUT", "/real-bucket/nested/x", "2").await;

        let response = send(&app, "GET", "/real-bucket/", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains("<a href=\"top.txt\">"));
        assert!(html.contains("<a href=\"nested/\">"));
        assert!(!html.contains("../"));
    }

    #[tokio::test]
    async fn empty_bucket_root_renders_empty_index() {
        let app = app();

        let response = send(&app, "GET", "/real-bucket/", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains("Index of /real-bucket/"));
        assert!(!html.contains("<a href="));

        let response = send(&app, "HEAD", "/real-bucket/", "").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn signed_mode_redirects_media_requests() {
        let signer = UrlSigner::new(
            "GOOG1EXAMPLE",
            "secret",
            "https://storage.googleapis.com",
            Duration::from_secs(3600),
        )
        .unwrap();
        let app = app_with(Some(signer), &["real-bucket"]);
        send(&app, "PUT", "/real-bucket/signed.txt", "payload").await;

        let response = send(&app, "GET", "/real-bucket/signed.txt?alt=media", "").await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://storage.googleapis.com/real-bucket/signed.txt?"));
        assert!(location.contains("X-Goog-Signature="));

        let response = send(&app, "GET", "/real-bucket/missing.txt?alt=media", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, "GET", "/real-bucket/signed.txt", "").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

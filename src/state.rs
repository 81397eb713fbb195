//! Shared, read-only request context.

use crate::services::{readiness::ReadinessProber, signer::UrlSigner, storage::StorageGateway};
use std::sync::Arc;

/// Built once at startup and handed to every handler through axum state.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageGateway>,

    /// Present when media downloads are answered with signed redirects.
    pub signer: Option<Arc<UrlSigner>>,

    pub prober: Arc<ReadinessProber>,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn StorageGateway>,
        signer: Option<UrlSigner>,
        prober: ReadinessProber,
    ) -> Self {
        Self {
            storage,
            signer: signer.map(Arc::new),
            prober: Arc::new(prober),
        }
    }
}

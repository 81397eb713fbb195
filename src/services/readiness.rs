//! Readiness probing across several buckets.
//!
//! One bucket being reachable is enough to serve traffic. All configured
//! buckets are probed concurrently and the first success wins; the service is
//! reported unavailable only once every probe has failed.

use crate::services::storage::StorageGateway;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Why a single bucket probe failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    Storage(String),
    TimedOut(Duration),
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailure::Storage(msg) => f.write_str(msg),
            ProbeFailure::TimedOut(after) => write!(f, "timed out after {:?}", after),
        }
    }
}

/// Outcome of probing one bucket.
#[derive(Debug, Clone)]
pub struct ReadinessResult {
    pub bucket: String,
    pub error: Option<ProbeFailure>,
}

impl ReadinessResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated verdict.
#[derive(Debug)]
pub enum Readiness {
    /// `bucket` answered first.
    Ready { bucket: String },
    /// Every probe failed. Holds one result per probe that reported back.
    Unavailable { failures: Vec<ReadinessResult> },
}

pub struct ReadinessProber {
    storage: Arc<dyn StorageGateway>,
    buckets: Vec<String>,
    timeout: Duration,
}

impl ReadinessProber {
    pub fn new(storage: Arc<dyn StorageGateway>, buckets: Vec<String>, timeout: Duration) -> Self {
        Self {
            storage,
            buckets,
            timeout,
        }
    }

    pub fn buckets(&self) -> &[String] {
        &self.buckets
    }

    /// Probe every bucket concurrently.
    ///
    /// Returns on the first success; probes still in flight are aborted.
    pub async fn probe(&self) -> Readiness {
        let mut tasks = JoinSet::new();
        for bucket in self.buckets.iter().cloned() {
            let storage = Arc::clone(&self.storage);
            let timeout = self.timeout;
            tasks.spawn(async move {
                let error = match tokio::time::timeout(timeout, storage.bucket_attrs(&bucket)).await
                {
                    Ok(Ok(attrs)) => {
                        debug!("bucket {} reachable (created {})", attrs.name, attrs.created);
                        None
                    }
                    Ok(Err(err)) => Some(ProbeFailure::Storage(err.to_string())),
                    Err(_) => Some(ProbeFailure::TimedOut(timeout)),
                };
                ReadinessResult { bucket, error }
            });
        }

        let mut failures = Vec::with_capacity(self.buckets.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) if result.succeeded() => {
                    debug!("received metadata for bucket {}", result.bucket);
                    tasks.abort_all();
                    return Readiness::Ready {
                        bucket: result.bucket,
                    };
                }
                Ok(result) => {
                    if let Some(error) = &result.error {
                        warn!("readiness probe for bucket {} failed: {}", result.bucket, error);
                    }
                    failures.push(result);
                }
                Err(err) => warn!("readiness probe task failed: {}", err),
            }
        }

        Readiness::Unavailable { failures }
    }
}

//! Fetch-execute strategy
//!
//! Downloads the bundle source, optionally revalidating a platform response
//! cache, and hands the code to [`CallMachineRuntime::execute`]. Every
//! suspension point is followed by a cancellation check: a cancelled attempt
//! never executes code and never reports an outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::attempt::{AttemptOutcome, LoadAttempt};
use crate::error::LoadError;
use crate::runtime::CallMachineRuntime;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }
}

/// HTTP GET used to download the bundle
#[async_trait]
pub trait BundleFetcher: Send + Sync {
    async fn fetch(&self, url: &str, headers: &HashMap<String, String>) -> Result<FetchResponse, String>;
}

/// Bundle source kept by the platform between launches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBundle {
    pub code: String,
    /// Sent with the next request, e.g. `If-None-Match`
    pub revalidation_headers: HashMap<String, String>,
}

/// Platform-provided response cache keyed by URL
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, url: &str) -> Option<CachedBundle>;

    async fn store(&self, url: &str, code: &str, response_headers: &HashMap<String, String>);
}

pub struct FetchExecuteStrategy {
    fetcher: Arc<dyn BundleFetcher>,
    cache: Option<Arc<dyn ResponseCache>>,
}

/// Downloaded code, plus the headers to cache it under when it came fresh
/// from the network
struct Download {
    code: String,
    fresh_headers: Option<HashMap<String, String>>,
}

impl FetchExecuteStrategy {
    pub fn new(fetcher: Arc<dyn BundleFetcher>, cache: Option<Arc<dyn ResponseCache>>) -> Self {
        Self { fetcher, cache }
    }

    pub(crate) async fn attempt(
        &self,
        attempt: &LoadAttempt,
        url: &str,
        timeout: Duration,
        runtime: &dyn CallMachineRuntime,
    ) -> AttemptOutcome {
        let downloaded = tokio::time::timeout(timeout, self.download(attempt, url)).await;

        if attempt.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }

        let download = match downloaded {
            Err(_) => {
                return AttemptOutcome::Failed(LoadError::TimedOut {
                    millis: timeout.as_millis() as u64,
                })
            }
            Ok(Err(error)) => return AttemptOutcome::Failed(error),
            Ok(Ok(download)) => download,
        };

        debug!(attempt = %attempt.id(), bytes = download.code.len(), "Executing call machine bundle");
        if let Err(reason) = runtime.execute(&download.code, attempt.context()) {
            warn!(attempt = %attempt.id(), %reason, "Call machine bundle failed to execute");
            return AttemptOutcome::Failed(LoadError::Execution { reason });
        }
        // The bundle is running now; a cancel from here on must not let it run twice
        attempt.context().mark_loaded();

        if let (Some(cache), Some(headers)) = (&self.cache, &download.fresh_headers) {
            cache.store(url, &download.code, headers).await;
        }

        if attempt.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }
        AttemptOutcome::Succeeded
    }

    async fn download(&self, attempt: &LoadAttempt, url: &str) -> Result<Download, LoadError> {
        let cached = match &self.cache {
            Some(cache) => cache.get(url).await,
            None => None,
        };

        let headers = cached
            .as_ref()
            .map(|c| c.revalidation_headers.clone())
            .unwrap_or_default();

        debug!(attempt = %attempt.id(), url, revalidating = cached.is_some(), "Fetching call machine bundle");
        let response = self
            .fetcher
            .fetch(url, &headers)
            .await
            .map_err(|reason| LoadError::Fetch { reason })?;

        if response.is_not_modified() {
            return match cached {
                Some(cached) => Ok(Download {
                    code: cached.code,
                    fresh_headers: None,
                }),
                None => Err(LoadError::HttpStatus { status: response.status }),
            };
        }

        if !response.is_success() {
            return Err(LoadError::HttpStatus { status: response.status });
        }

        Ok(Download {
            code: response.body,
            fresh_headers: Some(response.headers),
        })
    }
}

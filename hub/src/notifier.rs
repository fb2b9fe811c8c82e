//! Cache invalidation calls to the frontend server.
//!
//! Every publish tells the frontend server that the cached responses for a
//! model type are stale. The call is fire-and-forget: it runs on a detached
//! task with its own timeout, and its outcome is only logged.

use crate::error::{Error, ErrorKind};
use log::*;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_CACHE_INVALIDATION_URL: &str = "http://localhost:3000/cache/event";
pub const DEFAULT_CACHE_INVALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Side channel invoked once for every publish.
pub trait DownstreamNotifier: Send + Sync {
    /// Must return without waiting for the downstream call to complete.
    fn notify(&self, model_type: &str);
}

/// Request body sent to the cache invalidation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInvalidation {
    #[serde(rename = "modelType")]
    pub model_type: String,
}

/// Posts `{"modelType": ...}` to a fixed endpoint.
pub struct CacheInvalidationNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl CacheInvalidationNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let endpoint = endpoint.into();
        reqwest::Url::parse(&endpoint).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Config(format!("invalid cache invalidation url: {endpoint}")),
        })?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl DownstreamNotifier for CacheInvalidationNotifier {
    fn notify(&self, model_type: &str) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("No async runtime available, skipping cache invalidation for {model_type}: {e}");
                return;
            }
        };

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let payload = CacheInvalidation {
            model_type: model_type.to_string(),
        };

        runtime.spawn(async move {
            match send_invalidation(&client, &endpoint, &payload).await {
                Ok(()) => info!(
                    "Sent cache invalidation for {} to {endpoint}",
                    payload.model_type
                ),
                Err(e) => warn!(
                    "Cache invalidation for {} to {endpoint} failed: {e}",
                    payload.model_type
                ),
            }
        });
    }
}

/// Perform one invalidation call. The response body is discarded.
pub async fn send_invalidation(
    client: &reqwest::Client,
    endpoint: &str,
    payload: &CacheInvalidation,
) -> Result<(), Error> {
    let response = client.post(endpoint).json(payload).send().await?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        debug!("Cache invalidation endpoint answered {status}");
        Err(Error {
            source: None,
            error_kind: ErrorKind::Network,
        })
    }
}

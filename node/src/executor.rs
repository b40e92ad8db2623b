//! Effect executor that forwards execution requests over HTTP.

use agora_governance::{EffectExecutor, ExecutionRequest, ExecutorError};
use async_trait::async_trait;
use std::time::Duration;

use crate::NodeError;

/// Posts each [`ExecutionRequest`] as JSON to a fixed URL.
///
/// A 2xx response is success. A 4xx response means the executor refused the
/// payload; anything else (5xx, connect failure, timeout) is transient. Both
/// are retried by the drain until the retry budget runs out.
#[derive(Clone)]
pub struct HttpExecutor {
    http: reqwest::Client,
    url: String,
}

impl HttpExecutor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NodeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| NodeError::Executor(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EffectExecutor for HttpExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> Result<(), ExecutorError> {
        let response = self
            .http
            .post(&self.url)
            .header("idempotency-key", request.entry_id.to_string())
            .json(request)
            .send()
            .await
            .map_err(|e| ExecutorError::Unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let message = format!("executor returned HTTP {status}: {}", body.trim());
        if status.is_client_error() {
            Err(ExecutorError::Rejected(message))
        } else {
            Err(ExecutorError::Unavailable(message))
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

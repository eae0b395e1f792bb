//! Blocking client for the relay's two endpoints

use globalshutdown_core::{HttpError, Identity, SHARED_RUNTIME, http_client, retry_with_backoff};

/// Retries for `arm` on transport errors and 5xx
const ARM_MAX_RETRIES: u32 = 3;

/// Anything that can answer "is a shutdown pending for this identity?"
pub trait PendingSource {
    fn check_pending(&self, identity: &Identity) -> Result<bool, HttpError>;
}

/// Talks to a relay at `base_url` (e.g. `https://relay.example.org:3000`).
#[derive(Debug, Clone)]
pub struct RelayClient {
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Arm a shutdown for `identity`. Retries transient failures; a 429
    /// (too many signals armed from this address) is returned as-is.
    pub fn arm(&self, identity: &Identity) -> Result<(), HttpError> {
        let label = format!("arm {}", identity.short());
        retry_with_backoff(&label, ARM_MAX_RETRIES, || {
            self.post("/shutdown", identity).map(|_| ())
        })
    }

    /// Single attempt, no retry: the poll loop is the retry.
    pub fn consume_if_pending(&self, identity: &Identity) -> Result<bool, HttpError> {
        let body = self.post("/pending", identity)?;
        serde_json::from_str::<bool>(body.trim())
            .map_err(|e| HttpError::Decode(format!("expected JSON bool: {e}")))
    }

    fn post(&self, path: &str, identity: &Identity) -> Result<String, HttpError> {
        let url = format!("{}{path}", self.base_url);
        let body = serde_json::Value::String(identity.to_string()).to_string();

        SHARED_RUNTIME.handle().block_on(async {
            let resp = http_client()
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(HttpError::from_reqwest)?;
            resp.text().await.map_err(HttpError::from_reqwest)
        })
    }
}

impl PendingSource for RelayClient {
    fn check_pending(&self, identity: &Identity) -> Result<bool, HttpError> {
        self.consume_if_pending(identity)
    }
}

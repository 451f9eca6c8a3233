use futures::future::BoxFuture;
use tracing::debug;
use uuid::Uuid;

use super::{ClientError, ClientResult};
use crate::dto::match_log::CreateMatchRequest;

/// Sink for finished matches. Failures never block or undo rotation.
pub trait MatchRecorder: Send + Sync {
    fn record(
        &self,
        session_id: Uuid,
        entry: CreateMatchRequest,
    ) -> BoxFuture<'static, ClientResult<()>>;
}

/// Posts match logs to the REST surface.
#[derive(Debug, Clone)]
pub struct HttpMatchRecorder {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMatchRecorder {
    /// Recorder talking to the backend at `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Same as [`HttpMatchRecorder::new`] reusing an existing client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    fn matches_url(&self, session_id: Uuid) -> String {
        format!("{}/sessions/{session_id}/matches", self.base_url)
    }
}

impl MatchRecorder for HttpMatchRecorder {
    fn record(
        &self,
        session_id: Uuid,
        entry: CreateMatchRequest,
    ) -> BoxFuture<'static, ClientResult<()>> {
        let request = self.client.post(self.matches_url(session_id)).json(&entry);
        Box::pin(async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ClientError::Rejected { status });
            }
            debug!(%session_id, "match log recorded");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_ignores_trailing_slash() {
        let recorder = HttpMatchRecorder::new("http://localhost:8080/");
        let id = Uuid::nil();
        assert_eq!(
            recorder.matches_url(id),
            format!("http://localhost:8080/sessions/{id}/matches")
        );
    }
}

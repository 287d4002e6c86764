// Action dispatcher: turns player intents into outbound POST requests.
//
// Requests are fire-and-forget. Each one runs on its own task, failures are
// logged, nothing is retried and local state is never touched; the result
// of an action only becomes visible when the server echoes it back through
// the push channel.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::state::{CandidateId, WordId};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("phrase is empty")]
    EmptyPhrase,

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        source: reqwest::Error,
    },

    #[error("{path} returned status {status}")]
    Status {
        path: String,
        status: reqwest::StatusCode,
    },
}

// ---------------------------------------------------------------------------
// ActionSink
// ---------------------------------------------------------------------------

/// Transport for outbound actions.
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// POST `body` as JSON to the server-relative `path`. The response body
    /// is ignored beyond success or failure.
    async fn post(&self, path: &str, body: Value) -> Result<(), ActionError>;
}

/// `ActionSink` backed by a shared `reqwest::Client`.
pub struct HttpActionSink {
    http: reqwest::Client,
    server: ServerConfig,
}

impl HttpActionSink {
    pub fn new(http: reqwest::Client, server: ServerConfig) -> Self {
        Self { http, server }
    }
}

#[async_trait]
impl ActionSink for HttpActionSink {
    async fn post(&self, path: &str, body: Value) -> Result<(), ActionError> {
        let response = self
            .http
            .post(self.server.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|source| ActionError::Transport {
                path: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ActionError::Status {
                path: path.to_string(),
                status,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ActionDispatcher
// ---------------------------------------------------------------------------

pub struct ActionDispatcher {
    sink: Arc<dyn ActionSink>,
    submit_path: String,
    vote_path: String,
    flag_path: String,
}

impl ActionDispatcher {
    pub fn new(sink: Arc<dyn ActionSink>, server: &ServerConfig) -> Self {
        Self {
            sink,
            submit_path: server.submit_path.clone(),
            vote_path: server.vote_path.clone(),
            flag_path: server.flag_path.clone(),
        }
    }

    /// Propose a phrase. Whitespace around it is trimmed; an empty phrase is
    /// rejected without sending anything.
    pub fn submit_candidate(&self, phrase: &str) -> Result<JoinHandle<()>, ActionError> {
        let phrase = phrase.trim();
        if phrase.is_empty() {
            return Err(ActionError::EmptyPhrase);
        }
        Ok(self.spawn_post(&self.submit_path, json!({ "phrase": phrase }), "submit candidate"))
    }

    pub fn cast_vote(&self, id: &CandidateId) -> JoinHandle<()> {
        self.spawn_post(&self.vote_path, json!({ "candidate_id": id }), "cast vote")
    }

    pub fn flag_word(&self, id: &WordId) -> JoinHandle<()> {
        self.spawn_post(&self.flag_path, json!({ "word_id": id }), "flag word")
    }

    /// Spawn the request and log its failure.
    fn spawn_post(&self, path: &str, body: Value, operation: &'static str) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        let path = path.to_string();
        tokio::spawn(async move {
            debug!(%path, %body, "sending action");
            if let Err(e) = sink.post(&path, body).await {
                warn!("Failed to {operation}: {e}");
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Records every request instead of sending it.
    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, Value)>>,
        fail: bool,
    }

    #[async_trait]
    impl ActionSink for RecordingSink {
        async fn post(&self, path: &str, body: Value) -> Result<(), ActionError> {
            self.sent.lock().unwrap().push((path.to_string(), body));
            if self.fail {
                Err(ActionError::Status {
                    path: path.to_string(),
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                })
            } else {
                Ok(())
            }
        }
    }

    fn dispatcher(sink: Arc<RecordingSink>) -> ActionDispatcher {
        ActionDispatcher::new(sink, &ServerConfig::default())
    }

    #[tokio::test]
    async fn submit_trims_and_posts_phrase() {
        let sink = Arc::new(RecordingSink::default());
        dispatcher(sink.clone())
            .submit_candidate("  off on a  ")
            .unwrap()
            .await
            .unwrap();
        let sent = sink.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![("/submit_candidate".to_string(), json!({ "phrase": "off on a" }))]
        );
    }

    #[tokio::test]
    async fn empty_phrase_sends_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let d = dispatcher(sink.clone());
        for phrase in ["", "   ", "\t\n"] {
            assert!(matches!(d.submit_candidate(phrase), Err(ActionError::EmptyPhrase)));
        }
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn vote_and_flag_echo_wire_ids() {
        let sink = Arc::new(RecordingSink::default());
        let d = dispatcher(sink.clone());
        d.cast_vote(&CandidateId::from(7)).await.unwrap();
        d.cast_vote(&CandidateId::from("c-9")).await.unwrap();
        d.flag_word(&WordId::from(1)).await.unwrap();
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent[0], ("/vote".to_string(), json!({ "candidate_id": 7 })));
        assert_eq!(sent[1], ("/vote".to_string(), json!({ "candidate_id": "c-9" })));
        assert_eq!(sent[2], ("/flag_word".to_string(), json!({ "word_id": 1 })));
    }

    #[tokio::test]
    async fn failures_are_absorbed() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        // The task completes normally; the error is only logged.
        dispatcher(sink.clone())
            .cast_vote(&CandidateId::from(3))
            .await
            .unwrap();
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }

    /// Accept one HTTP request, answer with `status_line`, return the raw
    /// request text.
    async fn one_shot_server(status_line: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = vec![0u8; 4096];
            // Read until the JSON body has arrived.
            while !request.ends_with(b"}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!("HTTP/1.1 {status_line}\r\nContent-Length: 0\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}"), task)
    }

    #[tokio::test]
    async fn http_sink_posts_json() {
        let (base_url, server) = one_shot_server("200 OK").await;
        let sink = HttpActionSink::new(
            reqwest::Client::new(),
            ServerConfig {
                base_url,
                ..ServerConfig::default()
            },
        );
        sink.post("/vote", json!({ "candidate_id": 7 })).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /vote HTTP/1.1"), "request: {request}");
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"candidate_id":7}"#));
    }

    #[tokio::test]
    async fn http_sink_reports_error_status() {
        let (base_url, server) = one_shot_server("500 Internal Server Error").await;
        let sink = HttpActionSink::new(
            reqwest::Client::new(),
            ServerConfig {
                base_url,
                ..ServerConfig::default()
            },
        );
        let err = sink.post("/flag_word", json!({ "word_id": 1 })).await.unwrap_err();
        match err {
            ActionError::Status { path, status } => {
                assert_eq!(path, "/flag_word");
                assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
            }
            other => panic!("expected Status, got {other:?}"),
        }
        server.await.unwrap();
    }
}

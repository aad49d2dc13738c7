//! Scripted in-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value as JsonValue;

use crate::config::ClientConfig;
use crate::endpoints;
use crate::error::Error;
use crate::session::Session;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};

type Reply = Result<ApiResponse, String>;

#[derive(Default)]
struct Script {
    replies: HashMap<(Method, String), VecDeque<Reply>>,
    sent: Vec<ApiRequest>,
}

/// Replies from per-route queues and records every request.
///
/// An unscripted route answers `404` so a missing expectation fails loudly.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Delay every reply, so concurrent callers overlap.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn reply(&self, method: Method, path: &str, status: u16, body: JsonValue) {
        self.push(
            method,
            path,
            Ok(ApiResponse {
                status,
                content_type: Some("application/json".into()),
                body: serde_json::to_vec(&body).unwrap(),
            }),
        );
    }

    pub(crate) fn reply_empty(&self, method: Method, path: &str, status: u16) {
        self.push(
            method,
            path,
            Ok(ApiResponse {
                status,
                content_type: None,
                body: Vec::new(),
            }),
        );
    }

    pub(crate) fn fail(&self, method: Method, path: &str, reason: &str) {
        self.push(method, path, Err(reason.to_owned()));
    }

    pub(crate) fn sent(&self) -> Vec<ApiRequest> {
        self.script.lock().sent.clone()
    }

    pub(crate) fn sent_to(&self, path: &str) -> Vec<ApiRequest> {
        self.sent()
            .into_iter()
            .filter(|r| r.url.path() == path)
            .collect()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.sent_to(path).len()
    }

    pub(crate) fn refresh_count(&self) -> usize {
        self.count(endpoints::REFRESH)
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        self.script
            .lock()
            .replies
            .entry((method, path.to_owned()))
            .or_default()
            .push_back(reply);
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut script = self.script.lock();
        let key = (request.method, request.url.path().to_owned());
        script.sent.push(request);

        match script.replies.get_mut(&key).and_then(VecDeque::pop_front) {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(Error::Transport(reason)),
            None => Ok(ApiResponse {
                status: 404,
                content_type: None,
                body: Vec::new(),
            }),
        }
    }
}

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig::new("http://api.test".parse().unwrap())
        .with_locale("en-GB")
        .with_timezone("Europe/London")
}

pub(crate) fn test_session(transport: &ScriptedTransport) -> Session<ScriptedTransport> {
    Session::create(test_config(), transport.clone()).unwrap()
}

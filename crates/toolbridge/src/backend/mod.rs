//! Outbound boundary to the enterprise HTTP backend.
//!
//! The bridge talks to `BackendClient` instead of `reqwest` directly, which
//! keeps the orchestrator testable with `mock::MockBackend`.

pub mod interpret;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;

use crate::config::BackendConfig;
use crate::error::{BridgeError, BridgeResult};

pub use interpret::{decode_body, interpret, preview};

/// Query parameter carrying the backend endpoint identifier.
const ENDPOINT_PARAM: &str = "id";

/// Query parameter carrying the backend client number.
const CLIENT_PARAM: &str = "sap-client";

/// A backend response before interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub method: &'static str,
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub elapsed: Duration,
}

/// Transport to the backend API.
///
/// `endpoint` is the backend's endpoint identifier (e.g. `MCP_TOOL_LIST`),
/// not a URL path. Implementations own TLS, credentials and connection
/// reuse; they report network failures as `Transport` and expired
/// deadlines as `Timeout`.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn get(&self, endpoint: &str) -> BridgeResult<RawResponse>;

    async fn post(&self, endpoint: &str, body: &Value) -> BridgeResult<RawResponse>;
}

// ── HttpBackend: reqwest implementation ──────────────────────────────────

/// reqwest-backed client using HTTP Basic credentials.
#[derive(Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    user: String,
    password: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Build a client from the backend section of the configuration.
    pub fn new(config: &BackendConfig) -> BridgeResult<Self> {
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            timeout,
        })
    }

    async fn send(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> BridgeResult<RawResponse> {
        let method_name = if method == reqwest::Method::POST { "POST" } else { "GET" };
        let start = Instant::now();

        log::info!("Request {} {} (endpoint {})", method_name, self.base_url, endpoint);
        if let Some(body) = body {
            log::debug!("Request body: {}", body);
        }

        let mut request = self
            .client
            .request(method, &self.base_url)
            .query(&[(ENDPOINT_PARAM, endpoint), (CLIENT_PARAM, self.client_id.as_str())])
            .basic_auth(&self.user, Some(&self.password))
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").json(body);
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;

        let url = response.url().to_string();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?.to_vec();

        Ok(RawResponse {
            method: method_name,
            url,
            status,
            content_type,
            body,
            elapsed: start.elapsed(),
        })
    }

    fn map_error(&self, err: reqwest::Error) -> BridgeError {
        if err.is_timeout() {
            BridgeError::Timeout(self.timeout)
        } else {
            BridgeError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn get(&self, endpoint: &str) -> BridgeResult<RawResponse> {
        self.send(reqwest::Method::GET, endpoint, None).await
    }

    async fn post(&self, endpoint: &str, body: &Value) -> BridgeResult<RawResponse> {
        self.send(reqwest::Method::POST, endpoint, Some(body)).await
    }
}

// ── MockBackend for testing ──────────────────────────────────────────────

#[cfg(any(test, feature = "test-harness"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// What the mock does when an endpoint is called.
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Respond {
            status: u16,
            content_type: String,
            body: String,
        },
        Fail(String),
        /// Never completes; used to exercise the bridge timeout.
        Hang,
    }

    /// A call observed by the mock.
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub method: &'static str,
        pub endpoint: String,
        pub body: Option<Value>,
    }

    /// In-memory backend keyed by endpoint and, optionally, `TOOL_ID`.
    #[derive(Default)]
    pub struct MockBackend {
        replies: Mutex<HashMap<(String, Option<String>), MockReply>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer every call to `endpoint` with `value` as JSON.
        pub fn reply_json(&self, endpoint: &str, value: Value) {
            self.set(endpoint, None, json_reply(&value));
        }

        /// Answer calls to `endpoint` whose body names `tool_id` with `value`.
        pub fn reply_json_for_tool(&self, endpoint: &str, tool_id: &str, value: Value) {
            self.set(endpoint, Some(tool_id), json_reply(&value));
        }

        /// Answer with an arbitrary status, content type and body.
        pub fn reply_raw(&self, endpoint: &str, status: u16, content_type: &str, body: &str) {
            self.set(
                endpoint,
                None,
                MockReply::Respond {
                    status,
                    content_type: content_type.to_string(),
                    body: body.to_string(),
                },
            );
        }

        pub fn fail(&self, endpoint: &str, message: &str) {
            self.set(endpoint, None, MockReply::Fail(message.to_string()));
        }

        pub fn hang(&self, endpoint: &str) {
            self.set(endpoint, None, MockReply::Hang);
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Body of the most recent POST to `endpoint`.
        pub fn last_body(&self, endpoint: &str) -> Option<Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|c| c.endpoint == endpoint)
                .and_then(|c| c.body.clone())
        }

        fn set(&self, endpoint: &str, tool_id: Option<&str>, reply: MockReply) {
            self.replies
                .lock()
                .unwrap()
                .insert((endpoint.to_string(), tool_id.map(str::to_string)), reply);
        }

        async fn answer(
            &self,
            method: &'static str,
            endpoint: &str,
            body: Option<&Value>,
        ) -> BridgeResult<RawResponse> {
            self.calls.lock().unwrap().push(RecordedCall {
                method,
                endpoint: endpoint.to_string(),
                body: body.cloned(),
            });

            let tool_id = body
                .and_then(|b| b.get("TOOL_ID"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let reply = {
                let replies = self.replies.lock().unwrap();
                replies
                    .get(&(endpoint.to_string(), tool_id))
                    .or_else(|| replies.get(&(endpoint.to_string(), None)))
                    .cloned()
            };

            match reply {
                Some(MockReply::Respond {
                    status,
                    content_type,
                    body,
                }) => Ok(RawResponse {
                    method,
                    url: format!("mock://backend?id={endpoint}"),
                    status,
                    content_type,
                    body: body.into_bytes(),
                    elapsed: Duration::from_millis(1),
                }),
                Some(MockReply::Fail(message)) => Err(BridgeError::Transport(message)),
                Some(MockReply::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!("pending future never resolves")
                }
                None => Ok(RawResponse {
                    method,
                    url: format!("mock://backend?id={endpoint}"),
                    status: 404,
                    content_type: "text/plain".to_string(),
                    body: format!("no mock reply for {endpoint}").into_bytes(),
                    elapsed: Duration::from_millis(1),
                }),
            }
        }
    }

    fn json_reply(value: &Value) -> MockReply {
        MockReply::Respond {
            status: 200,
            content_type: "application/json".to_string(),
            body: value.to_string(),
        }
    }

    #[async_trait]
    impl BackendClient for MockBackend {
        async fn get(&self, endpoint: &str) -> BridgeResult<RawResponse> {
            self.answer("GET", endpoint, None).await
        }

        async fn post(&self, endpoint: &str, body: &Value) -> BridgeResult<RawResponse> {
            self.answer("POST", endpoint, Some(body)).await
        }
    }
}

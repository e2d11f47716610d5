//! Tool invocation bridge: list, describe and invoke backend tools.
//!
//! `Bridge` composes the backend client, response interpretation, the
//! schema cache and the template filler. The `try_*` methods return typed
//! errors; the plain methods are the caller-facing boundary that logs every
//! failure and folds it into `{"error": "..."}`.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};

use crate::backend::{interpret, preview, BackendClient, HttpBackend, RawResponse};
use crate::config::{Config, EndpointsConfig, MissPolicy};
use crate::envelope::normalize;
use crate::error::{BridgeError, BridgeResult};
use crate::schema::{open_store, ParameterTemplate, SchemaStore};
use crate::template::{fill, forward_unshaped};
use crate::validation::{split_tool_call, validate_tool_id};

/// Per-bridge settings that don't belong to the backend or the store.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub endpoints: EndpointsConfig,
    pub on_miss: MissPolicy,
    pub timeout: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            endpoints: EndpointsConfig::default(),
            on_miss: MissPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl BridgeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoints: config.backend.endpoints.clone(),
            on_miss: config.cache.on_miss,
            timeout: config.backend.timeout(),
        }
    }
}

pub struct Bridge {
    backend: Arc<dyn BackendClient>,
    store: Arc<dyn SchemaStore>,
    options: BridgeOptions,
}

impl Bridge {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        store: Arc<dyn SchemaStore>,
        options: BridgeOptions,
    ) -> Self {
        Self {
            backend,
            store,
            options,
        }
    }

    /// Build a bridge with the HTTP backend and the configured cache backing.
    pub fn from_config(config: &Config) -> BridgeResult<Self> {
        let backend = HttpBackend::new(&config.backend)?;
        let store = open_store(&config.cache)?;
        Ok(Self::new(
            Arc::new(backend),
            store,
            BridgeOptions::from_config(config),
        ))
    }

    pub fn store(&self) -> &Arc<dyn SchemaStore> {
        &self.store
    }

    // ── Caller-facing operations ──────────────────────────────────────

    /// Enveloped tool list, or `{"error": ...}`.
    pub async fn list(&self) -> Value {
        let start = Instant::now();
        log::info!("Fetching tool list");
        let outcome = self.try_list().await;
        finish("get_tool_list", None, start, "Failed to get tool list", outcome)
    }

    /// Describe a tool and cache its parameter template.
    pub async fn describe(&self, tool_id: &str) -> Value {
        let start = Instant::now();
        log::info!("Fetching tool details: {}", tool_id);
        let outcome = self.try_describe(tool_id).await;
        finish(
            "get_tool_details",
            Some(tool_id),
            start,
            "Failed to get tool details",
            outcome,
        )
    }

    /// Invoke a tool with flat arguments.
    pub async fn invoke(&self, tool_id: &str, args: &Map<String, Value>) -> Value {
        let start = Instant::now();
        log::info!("Using tool: {}", tool_id);
        let outcome = self.try_invoke(tool_id, args).await;
        finish("use_tool", Some(tool_id), start, "Failed to use tool", outcome)
    }

    /// `describe` for a `{"TOOL_ID": ...}` payload.
    ///
    /// Only the tool id reaches the backend; any other keys are discarded.
    pub async fn describe_request(&self, json_data: &Map<String, Value>) -> Value {
        match split_tool_call(json_data) {
            Ok((tool_id, _)) => self.describe(&tool_id).await,
            Err(err) => finish(
                "get_tool_details",
                None,
                Instant::now(),
                "Failed to get tool details",
                Err(err),
            ),
        }
    }

    /// `invoke` for a `{"TOOL_ID": ..., ...args}` payload.
    pub async fn invoke_request(&self, json_data: &Map<String, Value>) -> Value {
        match split_tool_call(json_data) {
            Ok((tool_id, args)) => self.invoke(&tool_id, &args).await,
            Err(err) => finish(
                "use_tool",
                None,
                Instant::now(),
                "Failed to use tool",
                Err(err),
            ),
        }
    }

    // ── Typed operations ──────────────────────────────────────────────

    pub async fn try_list(&self) -> BridgeResult<Value> {
        let raw = self
            .exchange(
                "GET",
                &self.options.endpoints.list,
                self.backend.get(&self.options.endpoints.list),
            )
            .await?;
        Ok(normalize(raw))
    }

    /// Fetch a tool's schema; objects have their `PARAM` cached.
    ///
    /// Returns the decoded backend value as-is, not enveloped.
    pub async fn try_describe(&self, tool_id: &str) -> BridgeResult<Value> {
        validate_tool_id(tool_id)?;

        let body = json!({ "TOOL_ID": tool_id });
        let result = self
            .exchange(
                "POST",
                &self.options.endpoints.describe,
                self.backend.post(&self.options.endpoints.describe, &body),
            )
            .await?;

        if let Value::Object(map) = &result {
            let template = match map.get("PARAM") {
                None => ParameterTemplate::default(),
                Some(param) => ParameterTemplate::from_value(param).unwrap_or_else(|| {
                    log::warn!(
                        "PARAM for {} is not an object, caching an empty template",
                        tool_id
                    );
                    ParameterTemplate::default()
                }),
            };
            let description = map.get("DESCRIPTION").and_then(Value::as_str);
            self.store.put(tool_id, template, description)?;
            log::info!(
                "Cached parameter schema for {} ({})",
                tool_id,
                self.store.backing()
            );
        } else {
            log::warn!("Details for {} are not an object, schema not cached", tool_id);
        }

        Ok(result)
    }

    /// Fill the cached template (or apply the miss policy) and call the tool.
    pub async fn try_invoke(&self, tool_id: &str, args: &Map<String, Value>) -> BridgeResult<Value> {
        validate_tool_id(tool_id)?;

        let param = match self.store.get(tool_id)? {
            Some(template) if template.is_empty() => {
                log::debug!("Empty parameter schema for {}, sending arguments as-is", tool_id);
                Value::Object(args.clone())
            }
            Some(template) => Value::Object(fill(&template, args)),
            None => match self.options.on_miss {
                MissPolicy::Reject => {
                    return Err(BridgeError::SchemaNotFound(tool_id.to_string()));
                }
                MissPolicy::Forward => {
                    log::warn!(
                        "Tool {} not found in schema cache, forwarding raw arguments",
                        tool_id
                    );
                    forward_unshaped(args)
                }
            },
        };

        let body = json!({ "TOOL_ID": tool_id, "PARAM": param });
        log::debug!("Parameters shaped for {}: {}", tool_id, preview(&param));
        self.exchange(
            "POST",
            &self.options.endpoints.invoke,
            self.backend.post(&self.options.endpoints.invoke, &body),
        )
        .await
    }

    /// Run one backend call under the timeout and interpret the response.
    async fn exchange<F>(&self, method: &str, endpoint: &str, request: F) -> BridgeResult<Value>
    where
        F: Future<Output = BridgeResult<RawResponse>>,
    {
        let timeout = self.options.timeout;
        let start = Instant::now();
        let sent = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| BridgeError::Timeout(timeout))
            .and_then(|outcome| outcome);
        let raw = match sent {
            Ok(raw) => raw,
            Err(err) => {
                log::error!(
                    "{} id={} -> no response ({:.3}s): {}",
                    method,
                    endpoint,
                    start.elapsed().as_secs_f64(),
                    err
                );
                return Err(err);
            }
        };

        let elapsed = raw.elapsed.as_secs_f64();
        match interpret(&raw) {
            Ok(value) => {
                log::info!(
                    "{} {} -> {} ({:.3}s): {}",
                    raw.method,
                    raw.url,
                    raw.status,
                    elapsed,
                    preview(&value)
                );
                Ok(value)
            }
            Err(err) => {
                log::error!(
                    "{} {} -> {} ({:.3}s): {}",
                    raw.method,
                    raw.url,
                    raw.status,
                    elapsed,
                    err
                );
                Err(err)
            }
        }
    }
}

/// Close out one operation: log the outcome and fold errors into a value.
fn finish(
    op: &str,
    tool_id: Option<&str>,
    start: Instant,
    context: &str,
    outcome: BridgeResult<Value>,
) -> Value {
    let elapsed = start.elapsed().as_secs_f64();
    match outcome {
        Ok(value) => {
            log::info!(
                "{} ok (tool={}, {:.3}s)",
                op,
                tool_id.unwrap_or("-"),
                elapsed
            );
            value
        }
        Err(err) => {
            log::error!(
                "{} failed (tool={}, kind={}, {:.3}s): {}",
                op,
                tool_id.unwrap_or("-"),
                err.kind(),
                elapsed,
                err
            );
            error_value(context, &err)
        }
    }
}

/// The caller-facing error shape.
pub fn error_value(context: &str, err: &BridgeError) -> Value {
    json!({ "error": format!("{}: {}", context, err) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::schema::{MemoryStore, SqliteStore};

    const LIST: &str = "MCP_TOOL_LIST";
    const DETAIL: &str = "MCP_TOOL_DETAIL";
    const USE: &str = "USE_MCP_TOOL";

    fn bridge_with(mock: &Arc<MockBackend>, options: BridgeOptions) -> Bridge {
        Bridge::new(mock.clone(), Arc::new(MemoryStore::new()), options)
    }

    fn bridge(mock: &Arc<MockBackend>) -> Bridge {
        bridge_with(mock, BridgeOptions::default())
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn error_text(value: &Value) -> &str {
        value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or_else(|| panic!("expected error, got {}", value))
    }

    // ── list ──

    #[tokio::test]
    async fn test_list_envelopes_array() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(LIST, json!([{"TOOL_ID": "T1"}]));

        let result = bridge(&mock).list().await;
        assert_eq!(
            result,
            json!({"JSONRPC": "2.0", "RESULT": [{"TOOL_ID": "T1"}], "ID": ""})
        );

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "GET");
        assert_eq!(calls[0].endpoint, LIST);
    }

    #[tokio::test]
    async fn test_list_passes_enveloped_result_through() {
        let mock = Arc::new(MockBackend::new());
        let enveloped = json!({"JSONRPC": "2.0", "RESULT": [{"TOOL_ID": "T1"}], "ID": "42"});
        mock.reply_json(LIST, enveloped.clone());
        assert_eq!(bridge(&mock).list().await, enveloped);
    }

    #[tokio::test]
    async fn test_list_html_is_auth_error() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_raw(LIST, 200, "application/json", "<!DOCTYPE html><html>login</html>");

        let result = bridge(&mock).list().await;
        let message = error_text(&result);
        assert!(message.starts_with("Failed to get tool list: "));
        assert!(message.contains("HTML"));
    }

    #[tokio::test]
    async fn test_list_http_status_error() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_raw(LIST, 500, "text/plain", "boom");
        let result = bridge(&mock).list().await;
        assert_eq!(
            error_text(&result),
            "Failed to get tool list: HTTP request error: 500 - boom"
        );
    }

    #[tokio::test]
    async fn test_list_transport_error() {
        let mock = Arc::new(MockBackend::new());
        mock.fail(LIST, "connection refused");
        let result = bridge(&mock).list().await;
        assert!(error_text(&result).contains("connection refused"));
    }

    #[tokio::test]
    async fn test_list_timeout() {
        let mock = Arc::new(MockBackend::new());
        mock.hang(LIST);
        let options = BridgeOptions {
            timeout: Duration::from_millis(50),
            ..BridgeOptions::default()
        };

        let err = bridge_with(&mock, options).try_list().await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)));
    }

    // ── describe ──

    #[tokio::test]
    async fn test_describe_caches_param() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(
            DETAIL,
            json!({"TOOL_ID": "T1", "PARAM": {"A": {"B": 0, "C": ""}}}),
        );
        let bridge = bridge(&mock);

        let result = bridge.describe("T1").await;
        assert_eq!(result["PARAM"], json!({"A": {"B": 0, "C": ""}}));
        assert_eq!(mock.last_body(DETAIL), Some(json!({"TOOL_ID": "T1"})));

        let cached = bridge.store().get("T1").unwrap().unwrap();
        assert_eq!(cached.to_value(), json!({"A": {"B": 0, "C": ""}}));
    }

    #[tokio::test]
    async fn test_describe_keeps_description_in_sqlite() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(
            DETAIL,
            json!({"DESCRIPTION": "Material lookup", "PARAM": {"IMPORT": {"MAKTX": ""}}}),
        );
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let bridge = Bridge::new(mock.clone(), store.clone(), BridgeOptions::default());

        bridge.try_describe("get_matnr_from_des").await.unwrap();
        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description.as_deref(), Some("Material lookup"));
    }

    #[tokio::test]
    async fn test_describe_without_param_passes_arguments_through() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(DETAIL, json!({"TOOL_ID": "T1"}));
        mock.reply_json(USE, json!({"ok": true}));
        let bridge = bridge(&mock);

        bridge.try_describe("T1").await.unwrap();
        let cached = bridge.store().get("T1").unwrap().unwrap();
        assert!(cached.is_empty());

        bridge
            .try_invoke("T1", &args(json!({"MAKTX": "bolt"})))
            .await
            .unwrap();
        assert_eq!(
            mock.last_body(USE),
            Some(json!({"TOOL_ID": "T1", "PARAM": {"MAKTX": "bolt"}}))
        );
    }

    #[tokio::test]
    async fn test_describe_non_object_not_cached() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(DETAIL, json!(["unexpected"]));
        let bridge = bridge(&mock);

        let result = bridge.describe("T1").await;
        assert_eq!(result, json!(["unexpected"]));
        assert!(bridge.store().get("T1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_describe_empty_id_skips_backend() {
        let mock = Arc::new(MockBackend::new());
        let result = bridge(&mock).describe("").await;
        assert_eq!(
            error_text(&result),
            "Failed to get tool details: TOOL_ID must not be empty"
        );
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_describe_failure_leaves_cache_untouched() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(DETAIL, json!({"PARAM": {"A": 1}}));
        let bridge = bridge(&mock);
        bridge.try_describe("T1").await.unwrap();

        mock.reply_raw(DETAIL, 502, "text/plain", "bad gateway");
        assert!(bridge.try_describe("T1").await.is_err());
        assert_eq!(
            bridge.store().get("T1").unwrap().unwrap().to_value(),
            json!({"A": 1})
        );
    }

    #[tokio::test]
    async fn test_redescribe_overwrites() {
        let mock = Arc::new(MockBackend::new());
        let bridge = bridge(&mock);

        mock.reply_json(DETAIL, json!({"PARAM": {"OLD": ""}}));
        bridge.try_describe("T1").await.unwrap();
        mock.reply_json(DETAIL, json!({"PARAM": {"NEW": ""}}));
        bridge.try_describe("T1").await.unwrap();

        assert_eq!(
            bridge.store().get("T1").unwrap().unwrap().to_value(),
            json!({"NEW": ""})
        );
    }

    // ── invoke ──

    #[tokio::test]
    async fn test_describe_then_invoke_shapes_body() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(DETAIL, json!({"PARAM": {"A": {"B": 0, "C": ""}}}));
        mock.reply_json(USE, json!({"RESULT": "done"}));
        let bridge = bridge(&mock);

        bridge.try_describe("T1").await.unwrap();
        let result = bridge.invoke("T1", &args(json!({"B": 5, "C": "x"}))).await;

        assert_eq!(result, json!({"RESULT": "done"}));
        assert_eq!(
            mock.last_body(USE),
            Some(json!({"TOOL_ID": "T1", "PARAM": {"A": {"B": 5, "C": "x"}}}))
        );
    }

    #[tokio::test]
    async fn test_invoke_miss_rejects_by_default() {
        let mock = Arc::new(MockBackend::new());
        let result = bridge(&mock).invoke("T2", &args(json!({"B": 1}))).await;

        let message = error_text(&result);
        assert!(message.starts_with("Failed to use tool: "));
        assert!(message.contains("get_tool_details"));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_miss_forwards_when_configured() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(USE, json!({"ok": true}));
        let options = BridgeOptions {
            on_miss: MissPolicy::Forward,
            ..BridgeOptions::default()
        };

        let result = bridge_with(&mock, options)
            .invoke("T2", &args(json!({"MAKTX": "bolt"})))
            .await;
        assert_eq!(result, json!({"ok": true}));
        assert_eq!(
            mock.last_body(USE),
            Some(json!({
                "TOOL_ID": "T2",
                "PARAM": {"IMPORT": {"IMPORTING_DATA": {"MAKTX": "bolt"}}}
            }))
        );
    }

    #[tokio::test]
    async fn test_invoke_request_splits_payload() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(DETAIL, json!({"PARAM": {"IMPORT": {"MAKTX": "", "LANGU": "E"}}}));
        mock.reply_json(USE, json!([{"MATNR": "100"}]));
        let bridge = bridge(&mock);

        bridge
            .describe_request(&args(json!({"TOOL_ID": "T1"})))
            .await;
        let result = bridge
            .invoke_request(&args(json!({"TOOL_ID": "T1", "MAKTX": "bolt"})))
            .await;

        assert_eq!(result, json!([{"MATNR": "100"}]));
        assert_eq!(
            mock.last_body(USE),
            Some(json!({"TOOL_ID": "T1", "PARAM": {"IMPORT": {"MAKTX": "bolt", "LANGU": "E"}}}))
        );
    }

    #[tokio::test]
    async fn test_invoke_request_without_id() {
        let mock = Arc::new(MockBackend::new());
        let result = bridge(&mock).invoke_request(&args(json!({"B": 1}))).await;
        assert_eq!(
            error_text(&result),
            "Failed to use tool: TOOL_ID must not be empty"
        );
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_event_stream_response() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(DETAIL, json!({"PARAM": {}}));
        mock.reply_raw(USE, 200, "text/event-stream", "event: message\ndata: {\"ok\": 1}\n\n");
        let bridge = bridge(&mock);

        bridge.try_describe("T1").await.unwrap();
        assert_eq!(
            bridge.try_invoke("T1", &Map::new()).await.unwrap(),
            json!({"ok": 1})
        );
    }

    #[tokio::test]
    async fn test_timeout_error_reaches_caller() {
        let mock = Arc::new(MockBackend::new());
        mock.hang(LIST);
        let options = BridgeOptions {
            timeout: Duration::from_millis(20),
            ..BridgeOptions::default()
        };

        let result = bridge_with(&mock, options).list().await;
        assert!(error_text(&result).starts_with("Failed to get tool list: "));
        assert_eq!(mock.calls().len(), 1);
        assert_eq!(mock.calls()[0].endpoint, LIST);
    }

    #[tokio::test]
    async fn test_bridges_are_isolated() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(DETAIL, json!({"PARAM": {"A": ""}}));
        let first = bridge(&mock);
        let second = bridge(&mock);

        first.try_describe("T1").await.unwrap();
        assert!(first.store().get("T1").unwrap().is_some());
        assert!(matches!(
            second.try_invoke("T1", &Map::new()).await,
            Err(BridgeError::SchemaNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_invokes_share_cache() {
        let mock = Arc::new(MockBackend::new());
        mock.reply_json(DETAIL, json!({"PARAM": {"IMPORT": {"N": 0}}}));
        mock.reply_json(USE, json!({"ok": true}));
        let bridge = bridge(&mock);
        bridge.try_describe("T1").await.unwrap();

        let calls: Vec<_> = (0..16)
            .map(|n| {
                let args = args(json!({ "N": n }));
                let bridge = &bridge;
                async move { bridge.invoke("T1", &args).await }
            })
            .collect();
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r == &json!({"ok": true})));
        let bodies: Vec<Value> = mock
            .calls()
            .into_iter()
            .filter(|c| c.endpoint == USE)
            .filter_map(|c| c.body)
            .collect();
        assert_eq!(bodies.len(), 16);
        for n in 0..16 {
            assert!(bodies.contains(&json!({"TOOL_ID": "T1", "PARAM": {"IMPORT": {"N": n}}})));
        }
    }

    #[test]
    fn test_options_from_config() {
        let config = Config::parse(
            "backend:\n  base_url: http://h/zmcp\n  timeout_secs: 7\ncache:\n  on_miss: forward\n",
        )
        .unwrap();
        let options = BridgeOptions::from_config(&config);
        assert_eq!(options.timeout, Duration::from_secs(7));
        assert_eq!(options.on_miss, MissPolicy::Forward);
        assert_eq!(options.endpoints.list, LIST);
    }
}

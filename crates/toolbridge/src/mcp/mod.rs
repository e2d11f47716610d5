//! MCP (Model Context Protocol) server for the tool bridge.
//!
//! Exposes the bridge's three operations as MCP tools. Runs either as a
//! streamable HTTP server (default `http://127.0.0.1:8000/mcp`) or over
//! stdin/stdout.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ServerHandler, ServiceExt};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::bridge::Bridge;
use crate::config::ServerConfig;

/// Toolbridge MCP server, a thin adapter over a shared `Bridge`.
#[derive(Clone)]
pub struct ToolbridgeMcpServer {
    bridge: Arc<Bridge>,
    tool_router: ToolRouter<Self>,
}

// ── Tool parameter types ──────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct ToolCallRequest {
    /// JSON object with "TOOL_ID" (e.g. {"TOOL_ID": "get_matnr_from_des"}).
    /// For use_tool, the remaining keys are the tool's arguments.
    json_data: Value,
}

// ── Tool implementations ──────────────────────────────────────────

#[tool_router]
impl ToolbridgeMcpServer {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            bridge,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Get the list of available backend tools. Returns {\"JSONRPC\": \"2.0\", \"RESULT\": [tools], \"ID\": \"\"} or {\"error\": ...}.")]
    async fn get_tool_list(&self) -> Result<CallToolResult, rmcp::ErrorData> {
        Ok(json_result(&self.bridge.list().await))
    }

    #[tool(description = "Get a tool's usage details and parameter format, and remember the format for use_tool. json_data must contain TOOL_ID, e.g. {\"TOOL_ID\": \"get_matnr_from_des\"}.")]
    async fn get_tool_details(
        &self,
        Parameters(req): Parameters<ToolCallRequest>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let result = match req.json_data.as_object() {
            Some(json_data) => self.bridge.describe_request(json_data).await,
            None => not_an_object("Failed to get tool details"),
        };
        Ok(json_result(&result))
    }

    #[tool(description = "Run a tool. Call get_tool_details for the tool first. json_data must contain TOOL_ID plus the tool's arguments as flat key/value pairs, e.g. {\"TOOL_ID\": \"get_matnr_from_des\", \"MAKTX\": \"bolt\"}; they are placed into the tool's nested parameter structure automatically.")]
    async fn use_tool(
        &self,
        Parameters(req): Parameters<ToolCallRequest>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let result = match req.json_data.as_object() {
            Some(json_data) => self.bridge.invoke_request(json_data).await,
            None => not_an_object("Failed to use tool"),
        };
        Ok(json_result(&result))
    }
}

// ── ServerHandler implementation ──────────────────────────────────

#[tool_handler]
impl ServerHandler for ToolbridgeMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Bridge to enterprise backend tools. Recommended workflow:\n\
                 1) get_tool_list: see all available tools and their TOOL_IDs\n\
                 2) get_tool_details: fetch a tool's parameter format (required before use_tool)\n\
                 3) use_tool: call the tool with TOOL_ID plus flat arguments"
                    .into(),
            ),
        }
    }
}

fn json_result(value: &Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
    )])
}

fn not_an_object(context: &str) -> Value {
    log::error!("{}: json_data is not a JSON object", context);
    serde_json::json!({ "error": format!("{}: json_data must be a JSON object", context) })
}

/// Start the MCP HTTP server.
///
/// Mounts the StreamableHttpService at the configured path and blocks until
/// shutdown.
pub async fn run_mcp_server(
    bridge: Arc<Bridge>,
    server: &ServerConfig,
    mut shutdown_rx: tokio::sync::watch::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use rmcp::transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpService,
    };

    let mcp_service = StreamableHttpService::new(
        move || Ok(ToolbridgeMcpServer::new(bridge.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    // axum refuses to nest at the root.
    let router = if server.path == "/" {
        axum::Router::new().fallback_service(mcp_service)
    } else {
        axum::Router::new().nest_service(&server.path, mcp_service)
    };

    let bind_addr = server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    log::info!("MCP server listening on http://{}{}", bind_addr, server.path);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_rx.changed().await.ok();
        })
        .await?;

    log::info!("MCP server stopped.");
    Ok(())
}

/// Serve MCP over stdin/stdout until the client disconnects.
pub async fn run_mcp_stdio(bridge: Arc<Bridge>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = ToolbridgeMcpServer::new(bridge);
    server.serve(rmcp::transport::stdio()).await?.waiting().await?;
    log::info!("MCP stdio session ended.");
    Ok(())
}

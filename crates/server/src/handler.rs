//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the worker exposed by the app.
use std::sync::Arc;

use crate::app::App;
use crate::tools::{SwFetchParams, SwMessageParams, fetch_impl, message_impl, status_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for leumas-sw.
#[derive(Clone)]
pub struct LeumasServer {
    app: Arc<App>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl LeumasServer {
    pub fn new(app: Arc<App>) -> Self {
        Self { app, tool_router: Self::tool_router() }
    }

    /// Fetch a URL through the offline cache worker.
    #[tool(
        description = "Fetch a URL through the offline cache worker. Returns the response and whether it came from cache, network, or the offline page."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(self.app.manager(), params.0).await
    }

    /// Post a control message to the worker.
    #[tool(description = "Post a control message (SKIP_WAITING, GET_CACHE_SIZE, CLEAR_CACHE) to the worker.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(self.app.manager(), params.0).await
    }

    #[tool(description = "Report worker lifecycle state, cache stores, and recent network activity.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.app).await
    }
}

impl ServerHandler for LeumasServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "leumas-sw".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

//! sw_message tool implementation.
//!
//! Posts a control message to the worker and returns its reply.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ToolError, json_result};
use leumas_worker::{CacheManager, ControlMessage, ControlReply, WorkerState};

/// Input parameters for sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// One of SKIP_WAITING, GET_CACHE_SIZE, CLEAR_CACHE.
    #[serde(rename = "type")]
    pub message_type: String,
}

/// Output structure for sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    /// The worker's reply; absent for SKIP_WAITING.
    pub reply: Option<ControlReply>,
    /// Worker state after the message was handled.
    pub state: WorkerState,
}

pub async fn message_impl(manager: &CacheManager, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let message = ControlMessage::parse(&serde_json::json!({ "type": params.message_type }).to_string())
        .map_err(|_| ToolError::InvalidInput(format!("unknown message type: {}", params.message_type)))?;

    let reply = manager.post_message(message).await?;
    let output = SwMessageOutput { reply, state: manager.state().await };

    json_result(&output)
}

//! sw_status tool implementation.
//!
//! Reports worker state, store contents and recent network activity.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

use crate::app::App;
use crate::error::json_result;
use leumas_client::Breadcrumb;
use leumas_worker::WorkerStatus;

/// Output structure for sw_status tool.
#[derive(Debug, Clone, Serialize)]
pub struct SwStatusOutput {
    pub worker: WorkerStatus,
    /// Network requests currently in flight beneath the worker.
    pub in_flight: usize,
    /// Most recent network requests, oldest first.
    pub breadcrumbs: Vec<Breadcrumb>,
}

pub async fn status_impl(app: &App) -> Result<CallToolResult, McpError> {
    let output = SwStatusOutput {
        worker: app.manager().status().await?,
        in_flight: app.network().in_flight(),
        breadcrumbs: app.network().breadcrumbs().await,
    };

    json_result(&output)
}

//! sw_install, sw_activate and sw_message tool implementations.
//!
//! Install activates straight away when the worker asked to skip waiting,
//! which it always does after a successful precache.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_worker::{ActivateReport, LifecycleHandler, LifecycleState, PrecacheReport, ServiceWorker};

use super::json_result;
use crate::error::ToolError;
use crate::host::ProcessHost;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FailedAsset {
    pub url: String,
    pub reason: String,
}

/// Output from the sw_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstallOutput {
    /// Cache generation that was installed.
    pub generation: String,
    /// Precached asset URLs.
    pub stored: Vec<String>,
    /// Assets skipped under the tolerant precache policy.
    pub failed: Vec<FailedAsset>,
    /// Activation result when the worker skipped waiting.
    pub activation: Option<ActivateOutput>,
    /// Lifecycle state after the call.
    pub state: String,
}

/// Output from the sw_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActivateOutput {
    /// Partitions removed because they belong to another generation.
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
    pub preload_enabled: bool,
}

impl From<ActivateReport> for ActivateOutput {
    fn from(report: ActivateReport) -> Self {
        Self { deleted: report.deleted, kept: report.kept, preload_enabled: report.preload_enabled }
    }
}

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageParams {
    /// Message posted to the worker, e.g. "SKIP_WAITING".
    pub message: String,
}

/// Output from the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageOutput {
    /// Whether the worker understood the message.
    pub accepted: bool,
    pub activation: Option<ActivateOutput>,
    pub state: String,
}

async fn activate_if_skipping(worker: &ServiceWorker, host: &ProcessHost) -> Result<Option<ActivateOutput>, McpError> {
    if !host.take_skip_waiting() {
        return Ok(None);
    }
    let report = worker.on_activate().await?;
    Ok(Some(report.into()))
}

fn install_output(worker: &ServiceWorker, report: PrecacheReport, activation: Option<ActivateOutput>) -> InstallOutput {
    InstallOutput {
        generation: worker.partitions().generation().to_string(),
        stored: report.stored.iter().map(|u| u.to_string()).collect(),
        failed: report
            .failed
            .into_iter()
            .map(|(url, reason)| FailedAsset { url: url.to_string(), reason })
            .collect(),
        activation,
        state: worker.state().as_str().to_string(),
    }
}

/// Implementation of the sw_install tool.
pub async fn install_impl(worker: &ServiceWorker, host: &ProcessHost) -> Result<CallToolResult, McpError> {
    let report = worker.on_install().await?;
    let activation = activate_if_skipping(worker, host).await?;
    json_result(&install_output(worker, report, activation))
}

/// Implementation of the sw_activate tool.
pub async fn activate_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let report = worker.on_activate().await?;
    json_result(&ActivateOutput::from(report))
}

/// Implementation of the sw_message tool.
pub async fn message_impl(
    worker: &ServiceWorker, host: &ProcessHost, params: MessageParams,
) -> Result<CallToolResult, McpError> {
    if params.message.trim().is_empty() {
        return Err(ToolError::InvalidInput("message cannot be empty".into()).into());
    }

    let accepted = worker.on_message(&params.message).await;
    let activation = if worker.state() == LifecycleState::Installed {
        activate_if_skipping(worker, host).await?
    } else {
        None
    };

    json_result(&MessageOutput { accepted, activation, state: worker.state().as_str().to_string() })
}

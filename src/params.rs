//! Typed request parameters, one variant per dispatched action.

use serde::Deserialize;

use crate::model::{Priority, Recommendation};
use crate::triage::ListView;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartParams {
    pub topic: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub max_rounds: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointParams {
    pub loop_id: String,
    pub summary: String,
    #[serde(default)]
    pub critique: Option<String>,
    #[serde(default)]
    pub recommendation: Option<Recommendation>,
    #[serde(default)]
    pub proposed_tasks: Vec<String>,
    #[serde(default)]
    pub importance: Option<f64>,
    #[serde(default)]
    pub urgency: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub evidence_quality: Option<f64>,
    #[serde(default)]
    pub citation_links: Vec<String>,
    #[serde(default)]
    pub counterpoints: Vec<String>,
    #[serde(default)]
    pub why_now: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueParams {
    pub loop_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusParams {
    pub loop_id: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub state: Option<crate::model::LoopState>,
    #[serde(default)]
    pub view: Option<ListView>,
    #[serde(default)]
    pub stale_hours: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseParams {
    pub loop_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// One variant per action dispatched by `RegistryService::execute`.
#[derive(Debug, Clone)]
pub enum Params {
    Start(StartParams),
    Checkpoint(CheckpointParams),
    Continue(ContinueParams),
    Status(StatusParams),
    List(ListParams),
    Close(CloseParams),
}

impl Params {
    pub fn action_name(&self) -> &'static str {
        match self {
            Params::Start(_) => "start",
            Params::Checkpoint(_) => "checkpoint",
            Params::Continue(_) => "continue",
            Params::Status(_) => "status",
            Params::List(_) => "list",
            Params::Close(_) => "close",
        }
    }
}

/// Decode a raw JSON operation payload (`{ "action": "...", ... }`) into
/// `Params`, the entry point a framework that hands the registry untyped
/// JSON uses instead of constructing `Params` directly.
pub fn decode_params(action: &str, value: serde_json::Value) -> Result<Params, String> {
    match action {
        "start" => serde_json::from_value(value)
            .map(Params::Start)
            .map_err(|e| e.to_string()),
        "checkpoint" => serde_json::from_value(value)
            .map(Params::Checkpoint)
            .map_err(|e| e.to_string()),
        "continue" => serde_json::from_value(value)
            .map(Params::Continue)
            .map_err(|e| e.to_string()),
        "status" => serde_json::from_value(value)
            .map(Params::Status)
            .map_err(|e| e.to_string()),
        "list" => serde_json::from_value(value)
            .map(Params::List)
            .map_err(|e| e.to_string()),
        "close" => serde_json::from_value(value)
            .map(Params::Close)
            .map_err(|e| e.to_string()),
        other => Err(format!("unsupported action: {other}")),
    }
}

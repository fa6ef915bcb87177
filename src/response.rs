//! Response envelope: `{status, ...}` for every dispatched action,
//! folding every response shape, success or failure, in-band.

use serde::Serialize;

use crate::model::LoopRecord;
use crate::triage::{LoopListItem, SpawnAdvice};

/// Full loop view returned by `start`/`checkpoint`/`continue`/`status`/`close`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopView {
    pub loop_id: String,
    pub topic: String,
    pub owner_agent_id: String,
    pub state: crate::model::LoopState,
    pub current_round: u32,
    pub max_rounds: u32,
    pub priority: crate::model::Priority,
    pub created_at: crate::time::MillisTimestamp,
    pub updated_at: crate::time::MillisTimestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<crate::time::MillisTimestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    pub checkpoints: Vec<crate::model::CheckpointRecord>,
    pub decisions: Vec<crate::model::DecisionRecord>,
}

impl From<&LoopRecord> for LoopView {
    fn from(r: &LoopRecord) -> Self {
        Self {
            loop_id: r.loop_id.clone(),
            topic: r.topic.clone(),
            owner_agent_id: r.owner_agent_id.clone(),
            state: r.state,
            current_round: r.current_round,
            max_rounds: r.max_rounds,
            priority: r.priority,
            created_at: r.created_at,
            updated_at: r.updated_at,
            closed_at: r.closed_at,
            close_reason: r.close_reason.clone(),
            checkpoints: r.checkpoints.clone(),
            decisions: r.decisions.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Envelope {
    #[serde(rename_all = "camelCase")]
    Started {
        tool_call_id: String,
        #[serde(rename = "loop")]
        loop_view: LoopView,
    },
    #[serde(rename_all = "camelCase")]
    Checkpointed {
        tool_call_id: String,
        #[serde(rename = "loop")]
        loop_view: LoopView,
        can_continue: bool,
        spawn_advice: SpawnAdvice,
    },
    #[serde(rename_all = "camelCase")]
    Continued {
        tool_call_id: String,
        #[serde(rename = "loop")]
        loop_view: LoopView,
    },
    #[serde(rename_all = "camelCase")]
    Closed {
        tool_call_id: String,
        #[serde(rename = "loop")]
        loop_view: LoopView,
    },
    #[serde(rename_all = "camelCase")]
    Ok {
        tool_call_id: String,
        #[serde(flatten)]
        payload: OkPayload,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        tool_call_id: String,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OkPayload {
    Loop {
        #[serde(rename = "loop")]
        loop_view: LoopView,
    },
    List {
        loops: Vec<LoopListItem>,
    },
}

impl Envelope {
    pub fn tool_call_id(&self) -> &str {
        match self {
            Envelope::Started { tool_call_id, .. }
            | Envelope::Checkpointed { tool_call_id, .. }
            | Envelope::Continued { tool_call_id, .. }
            | Envelope::Closed { tool_call_id, .. }
            | Envelope::Ok { tool_call_id, .. }
            | Envelope::Error { tool_call_id, .. } => tool_call_id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Error { .. })
    }
}

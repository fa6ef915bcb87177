//! Wire and document types for the research loop registry.
//!
//! These mirror the Loop Record / Checkpoint Record / Decision Record
//! tables field for field. Wire representation uses
//! `camelCase` (`loopId`, `ownerAgentId`, ...) to match the persisted JSON
//! document and the operation parameter/response payloads verbatim.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::time::MillisTimestamp;

pub const SCHEMA_VERSION: u32 = 1;

/// Root persisted document: `{ "version": 1, "loops": { "<loopId>": {...} } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub version: u32,
    pub loops: HashMap<String, LoopRecord>,
}

impl Store {
    pub fn empty() -> Self {
        Self {
            version: SCHEMA_VERSION,
            loops: HashMap::new(),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Active,
    AwaitingDecision,
    Closed,
}

impl Default for LoopState {
    fn default() -> Self {
        LoopState::Active
    }
}

// Unknown/legacy values fall back to the documented default
// rather than failing the whole record's deserialization.
impl<'de> Deserialize<'de> for LoopState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "active" => LoopState::Active,
            "awaiting_decision" => LoopState::AwaitingDecision,
            "closed" => LoopState::Closed,
            _ => LoopState::default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "low" => Priority::Low,
            "normal" => Priority::Normal,
            "high" => Priority::High,
            _ => Priority::default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Continue,
    Stop,
    NeedsInput,
}

impl Default for Recommendation {
    fn default() -> Self {
        Recommendation::NeedsInput
    }
}

impl<'de> Deserialize<'de> for Recommendation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "continue" => Recommendation::Continue,
            "stop" => Recommendation::Stop,
            "needs_input" => Recommendation::NeedsInput,
            _ => Recommendation::default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Continue,
    Close,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopRecord {
    pub loop_id: String,
    pub topic: String,
    pub owner_agent_id: String,
    pub state: LoopState,
    pub current_round: u32,
    pub max_rounds: u32,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: MillisTimestamp,
    pub updated_at: MillisTimestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_by_session_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<MillisTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    #[serde(default)]
    pub checkpoints: Vec<CheckpointRecord>,
    #[serde(default)]
    pub decisions: Vec<DecisionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRecord {
    pub round: u32,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<String>,
    #[serde(default)]
    pub recommendation: Recommendation,
    #[serde(default)]
    pub proposed_tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_quality: Option<u8>,
    #[serde(default)]
    pub citation_links: Vec<String>,
    #[serde(default)]
    pub counterpoints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_now: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_quality_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<u32>,
    pub created_at: MillisTimestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub round: u32,
    pub decision: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: MillisTimestamp,
}

impl LoopRecord {
    /// The most recently recorded checkpoint, if any.
    pub fn last_checkpoint(&self) -> Option<&CheckpointRecord> {
        self.checkpoints.last()
    }
}

//! Triage engine: the five list views, `needsReview`, and `spawnAdvice`.
//! Filters and sorts over a snapshot of loop records.

use serde::{Deserialize, Serialize};

use crate::model::{LoopRecord, LoopState, Priority, Recommendation};
use crate::time::MillisTimestamp;

const DEFAULT_STALE_HOURS: u32 = 24;
const MIN_STALE_HOURS: u32 = 1;
const MAX_STALE_HOURS: u32 = 720;
const DEFAULT_LIST_LIMIT: usize = 20;
const MIN_LIST_LIMIT: usize = 1;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListView {
    #[default]
    All,
    NeedsDecision,
    NeedsReview,
    Hot,
    Stale,
}

/// `checkpointNeedsReview(loop)`: true iff the last checkpoint scores low,
/// lacks a critique, or has fewer than one citation.
pub fn checkpoint_needs_review(record: &LoopRecord) -> bool {
    match record.last_checkpoint() {
        None => false,
        Some(cp) => {
            let low_quality = cp.analysis_quality_score.unwrap_or(0) < 65;
            let missing_critique = cp
                .critique
                .as_deref()
                .map(|c| c.trim().is_empty())
                .unwrap_or(true);
            let no_citations = cp.citation_links.is_empty();
            low_quality || missing_critique || no_citations
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnAdvice {
    pub should_spawn: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_task: Option<String>,
}

/// `spawnAdvice(loop, canContinue)`: advisory signal for delegating a
/// follow-up task, evaluated through a fixed precedence chain of checks.
pub fn spawn_advice(record: &LoopRecord, can_continue: bool) -> SpawnAdvice {
    let cp = match record.last_checkpoint() {
        Some(cp) => cp,
        None => {
            return SpawnAdvice {
                should_spawn: false,
                reason: "no checkpoint recorded yet".to_string(),
                suggested_task: None,
            }
        }
    };

    if cp.recommendation != Recommendation::Continue {
        return SpawnAdvice {
            should_spawn: false,
            reason: "last recommendation is not continue".to_string(),
            suggested_task: None,
        };
    }
    if !can_continue {
        return SpawnAdvice {
            should_spawn: false,
            reason: "loop cannot continue (round cap reached)".to_string(),
            suggested_task: None,
        };
    }
    let Some(first_task) = cp.proposed_tasks.first().cloned() else {
        return SpawnAdvice {
            should_spawn: false,
            reason: "no proposed task to delegate".to_string(),
            suggested_task: None,
        };
    };
    let quality = cp.analysis_quality_score.unwrap_or(0);
    if quality < 40 {
        return SpawnAdvice {
            should_spawn: false,
            reason: "analysis quality score below 40".to_string(),
            suggested_task: None,
        };
    }
    if cp.confidence.map(|c| c >= 4).unwrap_or(false) {
        return SpawnAdvice {
            should_spawn: false,
            reason: "confidence already high".to_string(),
            suggested_task: None,
        };
    }
    let priority_high_enough =
        cp.priority_score.unwrap_or(0) >= 12 || record.priority == Priority::High;
    if !priority_high_enough {
        return SpawnAdvice {
            should_spawn: false,
            reason: "priority score and loop priority both too low".to_string(),
            suggested_task: None,
        };
    }

    SpawnAdvice {
        should_spawn: true,
        reason: "checkpoint signals favor delegating the proposed task".to_string(),
        suggested_task: Some(first_task),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopListItem {
    pub loop_id: String,
    pub topic: String,
    pub state: LoopState,
    pub current_round: u32,
    pub max_rounds: u32,
    pub priority: Priority,
    pub updated_at: MillisTimestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checkpoint_at: Option<MillisTimestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_recommendation: Option<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_analysis_quality_score: Option<u32>,
    pub last_citation_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_priority_score: Option<u32>,
    pub needs_review: bool,
}

impl LoopListItem {
    pub fn from_record(record: &LoopRecord) -> Self {
        let last = record.last_checkpoint();
        Self {
            loop_id: record.loop_id.clone(),
            topic: record.topic.clone(),
            state: record.state,
            current_round: record.current_round,
            max_rounds: record.max_rounds,
            priority: record.priority,
            updated_at: record.updated_at,
            last_checkpoint_at: last.map(|c| c.created_at),
            last_recommendation: last.map(|c| c.recommendation),
            last_analysis_quality_score: last.and_then(|c| c.analysis_quality_score),
            last_citation_count: last.map(|c| c.citation_links.len() as u32).unwrap_or(0),
            last_priority_score: last.and_then(|c| c.priority_score),
            needs_review: checkpoint_needs_review(record),
        }
    }
}

pub fn clamp_stale_hours(value: Option<u32>) -> u32 {
    value
        .unwrap_or(DEFAULT_STALE_HOURS)
        .clamp(MIN_STALE_HOURS, MAX_STALE_HOURS)
}

pub fn clamp_limit(value: Option<u32>) -> usize {
    (value.unwrap_or(DEFAULT_LIST_LIMIT as u32) as usize).clamp(MIN_LIST_LIMIT, MAX_LIST_LIMIT)
}

/// Apply the optional `state` filter, the requested view's filter + sort,
/// and the limit, over loops already filtered to the requesting agent.
pub fn list_view<'a>(
    loops: impl Iterator<Item = &'a LoopRecord>,
    state_filter: Option<LoopState>,
    view: ListView,
    stale_hours: u32,
    limit: usize,
    now: MillisTimestamp,
) -> Vec<LoopListItem> {
    let mut candidates: Vec<&LoopRecord> = loops
        .filter(|r| state_filter.map(|s| r.state == s).unwrap_or(true))
        .collect();

    match view {
        ListView::All => {
            candidates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        }
        ListView::NeedsDecision => {
            candidates.retain(|r| r.state == LoopState::AwaitingDecision);
            candidates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        }
        ListView::NeedsReview => {
            candidates.retain(|r| r.state == LoopState::AwaitingDecision && checkpoint_needs_review(r));
            candidates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        }
        ListView::Hot => {
            candidates.retain(|r| r.state == LoopState::AwaitingDecision);
            candidates.sort_by(|a, b| {
                let a_priority = a.last_checkpoint().and_then(|c| c.priority_score).unwrap_or(0);
                let b_priority = b.last_checkpoint().and_then(|c| c.priority_score).unwrap_or(0);
                let a_quality = a.last_checkpoint().and_then(|c| c.analysis_quality_score).unwrap_or(0);
                let b_quality = b.last_checkpoint().and_then(|c| c.analysis_quality_score).unwrap_or(0);
                b_priority
                    .cmp(&a_priority)
                    .then(b_quality.cmp(&a_quality))
                    .then(b.updated_at.cmp(&a.updated_at))
            });
        }
        ListView::Stale => {
            let cutoff = now - (stale_hours as i64) * 3_600_000;
            candidates.retain(|r| r.state == LoopState::Active && r.updated_at <= cutoff);
            candidates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        }
    }

    candidates
        .into_iter()
        .take(limit)
        .map(LoopListItem::from_record)
        .collect()
}

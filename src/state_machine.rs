//! Per-loop lifecycle transitions.
//!
//! Each function validates the precondition first and returns an error
//! without touching the record if it fails — the "no state change" half of
//! every error category the registry defines.

use crate::error::RegistryError;
use crate::ids::IdGenerator;
use crate::model::{CheckpointRecord, DecisionKind, DecisionRecord, LoopRecord, LoopState, Priority};
use crate::normalize;
use crate::scoring::{self, QualityInputs};
use crate::time::Clock;

pub struct StartInput {
    pub topic: String,
    pub priority: Priority,
    pub max_rounds: u32,
    pub owner_agent_id: String,
    pub session_key: Option<String>,
}

pub fn start(input: StartInput, clock: &dyn Clock, ids: &dyn IdGenerator) -> LoopRecord {
    let now = clock.now_millis();
    LoopRecord {
        loop_id: ids.new_loop_id(),
        topic: input.topic,
        owner_agent_id: input.owner_agent_id,
        state: LoopState::Active,
        current_round: 1,
        max_rounds: input.max_rounds,
        priority: input.priority,
        created_at: now,
        updated_at: now,
        started_by_session_key: input.session_key,
        closed_at: None,
        close_reason: None,
        checkpoints: Vec::new(),
        decisions: Vec::new(),
    }
}

#[allow(clippy::too_many_arguments)]
pub struct CheckpointInput {
    pub summary: String,
    pub critique: Option<String>,
    pub recommendation: crate::model::Recommendation,
    pub proposed_tasks: Vec<String>,
    pub importance: Option<u8>,
    pub urgency: Option<u8>,
    pub confidence: Option<u8>,
    pub evidence_quality: Option<u8>,
    pub citation_links: Vec<String>,
    pub counterpoints: Vec<String>,
    pub why_now: Option<String>,
}

/// Appends a checkpoint and transitions `active -> awaiting_decision`.
/// Rejected unless the loop is currently `active`.
pub fn checkpoint(
    record: &mut LoopRecord,
    input: CheckpointInput,
    clock: &dyn Clock,
) -> Result<(), RegistryError> {
    if record.state != LoopState::Active {
        return Err(RegistryError::MustBeActive(state_label(record.state)));
    }

    let now = clock.now_millis();
    let quality = scoring::analysis_quality_score(&QualityInputs {
        summary: &input.summary,
        critique: input.critique.as_deref(),
        citation_links: &input.citation_links,
        counterpoints: &input.counterpoints,
        proposed_tasks: &input.proposed_tasks,
        evidence_quality: input.evidence_quality,
        why_now: input.why_now.as_deref(),
    });
    let priority = scoring::priority_score(input.importance, input.urgency);

    let cp = CheckpointRecord {
        round: record.current_round,
        summary: input.summary,
        critique: input.critique,
        recommendation: input.recommendation,
        proposed_tasks: input.proposed_tasks,
        importance: input.importance,
        urgency: input.urgency,
        confidence: input.confidence,
        evidence_quality: input.evidence_quality,
        citation_links: input.citation_links,
        counterpoints: input.counterpoints,
        why_now: input.why_now,
        analysis_quality_score: Some(quality),
        priority_score: priority,
        created_at: now,
    };

    record.checkpoints.push(cp);
    normalize::normalize_record(record);
    record.state = LoopState::AwaitingDecision;
    record.updated_at = now;
    Ok(())
}

/// `continue`: requires `awaiting_decision` and room in the round cap.
pub fn continue_loop(
    record: &mut LoopRecord,
    reason: Option<String>,
    clock: &dyn Clock,
) -> Result<(), RegistryError> {
    if record.state != LoopState::AwaitingDecision {
        return Err(RegistryError::NotAwaitingDecision(state_label(record.state)));
    }
    if record.current_round >= record.max_rounds {
        return Err(RegistryError::MaxRoundsReached(record.max_rounds));
    }

    let now = clock.now_millis();
    record.decisions.push(DecisionRecord {
        round: record.current_round,
        decision: DecisionKind::Continue,
        reason,
        created_at: now,
    });
    record.current_round += 1;
    record.state = LoopState::Active;
    record.updated_at = now;
    Ok(())
}

/// `close`: accepted from any non-closed state; idempotent on an
/// already-closed loop (no-op, returns success).
pub fn close(record: &mut LoopRecord, reason: Option<String>, clock: &dyn Clock) {
    if record.state == LoopState::Closed {
        return;
    }
    let now = clock.now_millis();
    record.decisions.push(DecisionRecord {
        round: record.current_round,
        decision: DecisionKind::Close,
        reason: reason.clone(),
        created_at: now,
    });
    record.state = LoopState::Closed;
    record.closed_at = Some(now);
    record.close_reason = reason;
    record.updated_at = now;
}

fn state_label(state: LoopState) -> String {
    match state {
        LoopState::Active => "active".to_string(),
        LoopState::AwaitingDecision => "awaiting_decision".to_string(),
        LoopState::Closed => "closed".to_string(),
    }
}

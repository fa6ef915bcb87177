//! Clamping, truncation, and legacy-record repair.
//!
//! Every function here is pure and idempotent; `normalize_record` composes
//! them into the single pass that both `persistence::load` (repair on read)
//! and `registry` (repair before commit) call.

use crate::model::{CheckpointRecord, LoopRecord};
use crate::scoring::{self, QualityInputs};

const MAX_WHY_NOW: usize = 280;
const MAX_PROPOSED_TASK: usize = 280;
const MAX_PROPOSED_TASKS: usize = 20;
const MAX_CITATION: usize = 500;
const MAX_CITATIONS: usize = 20;
const MAX_COUNTERPOINT: usize = 280;
const MAX_COUNTERPOINTS: usize = 10;
const MIN_MAX_ROUNDS: u32 = 1;
const MAX_MAX_ROUNDS: u32 = 20;
const DEFAULT_MAX_ROUNDS: u32 = 2;

/// Clamp a rating to `[1,5]` via floor; non-finite/non-numeric inputs become
/// `None` (callers parse numeric JSON first, so "non-numeric" is handled by
/// the type system — this only has to guard against out-of-range floats).
pub fn clamp_rating(value: Option<f64>) -> Option<u8> {
    value.and_then(|v| {
        if !v.is_finite() {
            return None;
        }
        Some(v.floor().clamp(1.0, 5.0) as u8)
    })
}

/// Trim a string, dropping it if empty, truncating to `max_chars`.
pub fn truncate_opt(value: Option<&str>, max_chars: usize) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.chars().take(max_chars).collect())
        }
    })
}

/// Cap a list of free-form strings: trim each, drop empties, cap the list
/// length and each entry's length.
pub fn cap_list(values: &[String], max_items: usize, max_chars: usize) -> Vec<String> {
    values
        .iter()
        .filter_map(|s| truncate_opt(Some(s), max_chars))
        .take(max_items)
        .collect()
}

/// Floor and clamp `maxRounds` into `[1, 20]`, defaulting to `2`.
pub fn clamp_max_rounds(value: Option<f64>) -> u32 {
    match value {
        Some(v) if v.is_finite() => {
            (v.floor() as i64).clamp(MIN_MAX_ROUNDS as i64, MAX_MAX_ROUNDS as i64) as u32
        }
        _ => DEFAULT_MAX_ROUNDS,
    }
}

fn normalize_checkpoint(cp: &mut CheckpointRecord) {
    cp.why_now = truncate_opt(cp.why_now.as_deref(), MAX_WHY_NOW);
    cp.critique = truncate_opt(cp.critique.as_deref(), usize::MAX);
    cp.proposed_tasks = cap_list(&cp.proposed_tasks, MAX_PROPOSED_TASKS, MAX_PROPOSED_TASK);
    cp.citation_links = cap_list(&cp.citation_links, MAX_CITATIONS, MAX_CITATION);
    cp.counterpoints = cap_list(&cp.counterpoints, MAX_COUNTERPOINTS, MAX_COUNTERPOINT);
    cp.importance = clamp_rating(cp.importance.map(|v| v as f64));
    cp.urgency = clamp_rating(cp.urgency.map(|v| v as f64));
    cp.confidence = clamp_rating(cp.confidence.map(|v| v as f64));
    cp.evidence_quality = clamp_rating(cp.evidence_quality.map(|v| v as f64));

    if cp.analysis_quality_score.is_none() {
        let inputs = QualityInputs {
            summary: &cp.summary,
            critique: cp.critique.as_deref(),
            citation_links: &cp.citation_links,
            counterpoints: &cp.counterpoints,
            proposed_tasks: &cp.proposed_tasks,
            evidence_quality: cp.evidence_quality,
            why_now: cp.why_now.as_deref(),
        };
        cp.analysis_quality_score = Some(scoring::analysis_quality_score(&inputs));
    }

    if cp.priority_score.is_none() {
        cp.priority_score = scoring::priority_score(cp.importance, cp.urgency);
    }
}

/// Repair/clamp every field of a loop record in place. Idempotent: calling
/// this twice in a row leaves the record unchanged the second time.
pub fn normalize_record(record: &mut LoopRecord) {
    record.max_rounds = clamp_max_rounds(Some(record.max_rounds as f64));
    for cp in record.checkpoints.iter_mut() {
        normalize_checkpoint(cp);
    }
}

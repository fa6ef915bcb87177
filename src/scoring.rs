//! Pure scoring functions: `analysisQualityScore` and `priorityScore`.
//!
//! Both are free of I/O and clock reads, so they can be recomputed
//! identically on load to heal legacy records, and are trivially
//! unit-testable.

/// Inputs to the analysis-quality heuristic. Mirrors the optional checkpoint
/// fields it scores against.
pub struct QualityInputs<'a> {
    pub summary: &'a str,
    pub critique: Option<&'a str>,
    pub citation_links: &'a [String],
    pub counterpoints: &'a [String],
    pub proposed_tasks: &'a [String],
    pub evidence_quality: Option<u8>,
    pub why_now: Option<&'a str>,
}

/// `analysisQualityScore`, clamped to `[0, 100]`.
pub fn analysis_quality_score(inputs: &QualityInputs<'_>) -> u32 {
    let mut total: i64 = 0;

    total += match inputs.summary.chars().count() {
        n if n >= 160 => 20,
        n if n >= 80 => 16,
        n if n >= 40 => 12,
        n if n >= 20 => 8,
        _ => 0,
    };

    if inputs.critique.map(|c| !c.trim().is_empty()).unwrap_or(false) {
        total += 20;
    }

    total += match inputs.citation_links.len() {
        n if n >= 3 => 25,
        n if n >= 1 => 15,
        _ => 0,
    };

    total += match inputs.counterpoints.len() {
        n if n >= 2 => 15,
        1 => 10,
        _ => 0,
    };

    total += match inputs.proposed_tasks.len() {
        n if n >= 2 => 10,
        1 => 6,
        _ => 0,
    };

    if let Some(rating) = inputs.evidence_quality {
        total += 2 * rating as i64;
    }

    if inputs.why_now.map(|w| !w.trim().is_empty()).unwrap_or(false) {
        total += 5;
    }

    total.clamp(0, 100) as u32
}

/// `priorityScore = importance * urgency` when both are present, else
/// `None`. Range `[1, 25]` by construction given both inputs are in `[1,5]`.
pub fn priority_score(importance: Option<u8>, urgency: Option<u8>) -> Option<u32> {
    match (importance, urgency) {
        (Some(i), Some(u)) => Some(i as u32 * u as u32),
        _ => None,
    }
}

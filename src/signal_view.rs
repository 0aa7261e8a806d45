//! Rendering contract for a server-supplied signal decision.
//!
//! The server owns the decision; this module maps it to per-lane display
//! state and validates the invariants the server is supposed to uphold
//! (exactly one green, green lane among the entries). Violations are
//! reported, not silently accepted — but rendering still proceeds with the
//! data as given.

use thiserror::Error;
use tracing::warn;

use crate::model::{Lane, SignalDecision, SignalStatus};

/// Display state for one lane's signal, in server-supplied order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneSignalView {
    pub lane: Lane,
    pub light: SignalStatus,
    pub count: u32,
    /// Emergency highlight, overlaid independently of the light color.
    pub emergency: bool,
    pub emergency_count: u32,
}

/// A decision ready for display.
#[derive(Debug, Clone)]
pub struct RenderedDecision {
    pub total_vehicles: u32,
    pub total_emergency: Option<u32>,
    pub green_lane: Lane,
    pub lanes: Vec<LaneSignalView>,
    /// Shown verbatim, only when the server sent a non-empty reason.
    pub priority_reason: Option<String>,
    pub warnings: Vec<DecisionWarning>,
}

/// An invariant the server-side decision failed to uphold.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecisionWarning {
    #[error("decision has {found} green signals, expected exactly 1")]
    GreenCount { found: usize },

    #[error("green lane {lane} is not among the decision's signal entries")]
    GreenLaneMissing { lane: Lane },

    #[error("decision covers {found} lanes but {expected} were submitted")]
    LaneCountMismatch { expected: usize, found: usize },
}

/// Checks a decision against its invariants. `submitted` is the lane set the
/// request carried, when the caller knows it.
pub fn validate_decision(
    decision: &SignalDecision,
    submitted: Option<&[Lane]>,
) -> Vec<DecisionWarning> {
    let mut warnings = Vec::new();

    let green = decision
        .signals
        .iter()
        .filter(|s| s.status == SignalStatus::Green)
        .count();
    if green != 1 {
        warnings.push(DecisionWarning::GreenCount { found: green });
    }

    if !decision.signals.iter().any(|s| s.lane == decision.green_lane) {
        warnings.push(DecisionWarning::GreenLaneMissing { lane: decision.green_lane });
    }

    if let Some(lanes) = submitted {
        if decision.signals.len() != lanes.len() {
            warnings.push(DecisionWarning::LaneCountMismatch {
                expected: lanes.len(),
                found: decision.signals.len(),
            });
        }
    }

    warnings
}

/// Maps a decision to display state, preserving the server's entry order.
pub fn render_decision(decision: &SignalDecision) -> RenderedDecision {
    let warnings = validate_decision(decision, None);
    for w in &warnings {
        warn!(warning = %w, "signal decision violates invariant");
    }

    let lanes = decision
        .signals
        .iter()
        .map(|s| LaneSignalView {
            lane: s.lane,
            light: s.status,
            count: s.count,
            emergency: s.emergency(),
            emergency_count: s.emergency_count.unwrap_or(0),
        })
        .collect();

    let priority_reason = decision
        .priority_reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    RenderedDecision {
        total_vehicles: decision.total_vehicles,
        total_emergency: decision.total_emergency,
        green_lane: decision.green_lane,
        lanes,
        priority_reason,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SignalEntry;

    fn entry(lane: Lane, status: SignalStatus, count: u32) -> SignalEntry {
        SignalEntry { lane, status, count, has_emergency: None, emergency_count: None }
    }

    fn decision(entries: Vec<SignalEntry>, green: Lane) -> SignalDecision {
        SignalDecision {
            total_vehicles: entries.iter().map(|e| e.count).sum(),
            total_emergency: None,
            green_lane: green,
            signals: entries,
            priority_reason: None,
        }
    }

    #[test]
    fn test_valid_decision_has_no_warnings() {
        let d = decision(
            vec![
                entry(Lane::North, SignalStatus::Green, 5),
                entry(Lane::South, SignalStatus::Red, 2),
            ],
            Lane::North,
        );
        assert!(validate_decision(&d, Some(&[Lane::North, Lane::South])).is_empty());
    }

    #[test]
    fn test_render_preserves_server_order() {
        // Server order deliberately not the fixed lane order.
        let d = decision(
            vec![
                entry(Lane::West, SignalStatus::Red, 1),
                entry(Lane::North, SignalStatus::Green, 9),
                entry(Lane::East, SignalStatus::Red, 3),
            ],
            Lane::North,
        );
        let rendered = render_decision(&d);
        let order: Vec<Lane> = rendered.lanes.iter().map(|l| l.lane).collect();
        assert_eq!(order, vec![Lane::West, Lane::North, Lane::East]);
    }

    #[test]
    fn test_emergency_overlay_independent_of_red_light() {
        let mut e = entry(Lane::East, SignalStatus::Red, 4);
        e.has_emergency = Some(true);
        e.emergency_count = Some(1);
        let d = decision(vec![entry(Lane::North, SignalStatus::Green, 6), e], Lane::North);

        let rendered = render_decision(&d);
        let east = &rendered.lanes[1];
        assert_eq!(east.light, SignalStatus::Red);
        assert!(east.emergency);
        assert_eq!(east.emergency_count, 1);
    }

    #[test]
    fn test_zero_green_is_reported() {
        let d = decision(
            vec![
                entry(Lane::North, SignalStatus::Red, 2),
                entry(Lane::South, SignalStatus::Red, 3),
            ],
            Lane::North,
        );
        let warnings = validate_decision(&d, None);
        assert_eq!(warnings, vec![DecisionWarning::GreenCount { found: 0 }]);
    }

    #[test]
    fn test_two_greens_is_reported_but_still_rendered() {
        let d = decision(
            vec![
                entry(Lane::North, SignalStatus::Green, 2),
                entry(Lane::South, SignalStatus::Green, 3),
            ],
            Lane::North,
        );
        let rendered = render_decision(&d);
        assert_eq!(rendered.warnings, vec![DecisionWarning::GreenCount { found: 2 }]);
        assert_eq!(rendered.lanes.len(), 2);
    }

    #[test]
    fn test_green_lane_outside_entries_is_reported() {
        let d = decision(vec![entry(Lane::North, SignalStatus::Green, 2)], Lane::West);
        let warnings = validate_decision(&d, None);
        assert!(warnings.contains(&DecisionWarning::GreenLaneMissing { lane: Lane::West }));
    }

    #[test]
    fn test_lane_count_mismatch_is_reported() {
        let d = decision(vec![entry(Lane::North, SignalStatus::Green, 2)], Lane::North);
        let warnings = validate_decision(&d, Some(&[Lane::North, Lane::East]));
        assert!(warnings.contains(&DecisionWarning::LaneCountMismatch { expected: 2, found: 1 }));
    }

    #[test]
    fn test_blank_priority_reason_suppressed() {
        let mut d = decision(vec![entry(Lane::North, SignalStatus::Green, 2)], Lane::North);
        d.priority_reason = Some("   ".into());
        assert!(render_decision(&d).priority_reason.is_none());

        d.priority_reason = Some("Emergency vehicle detected in North lane.".into());
        assert_eq!(
            render_decision(&d).priority_reason.as_deref(),
            Some("Emergency vehicle detected in North lane.")
        );
    }
}

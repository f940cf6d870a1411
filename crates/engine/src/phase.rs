//! Clock and phase resolution.
//!
//! Everything here compares absolute UTC instants. Timezones only matter when
//! a collaborator renders dates for people, which happens outside the engine.

use chrono::{DateTime, Utc};
use proxybid_types::{AuctionItem, OpenWindow, Workflow};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Where an item sits relative to its bidding window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Active,
    Ended,
}

/// Phase plus the two raw clock comparisons it was derived from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStatus {
    pub phase: Phase,
    pub start_passed: bool,
    pub end_passed: bool,
}

/// Resolve the phase of a window at `now`.
pub fn resolve(now: DateTime<Utc>, window: &OpenWindow) -> PhaseStatus {
    let start_passed = now > window.start;
    let end_passed = now > window.end;

    let phase = if end_passed {
        Phase::Ended
    } else if start_passed {
        Phase::Active
    } else {
        Phase::Pending
    };

    PhaseStatus {
        phase,
        start_passed,
        end_passed,
    }
}

/// Closed by workflow or by the clock.
pub fn is_closed(workflow: Workflow, status: &PhaseStatus) -> bool {
    workflow.is_terminal() || status.phase == Phase::Ended
}

/// Open by workflow or because the start has passed.
///
/// With `strict` unset this reports an item open from elapsed time alone, even
/// when its workflow is terminal. `strict` additionally requires the item not
/// to be closed.
pub fn is_open(workflow: Workflow, status: &PhaseStatus, strict: bool) -> bool {
    let open = workflow == Workflow::Active || status.start_passed;
    if strict {
        open && !is_closed(workflow, status)
    } else {
        open
    }
}

/// Workflow for an item registered at `now`.
pub fn initial_workflow(now: DateTime<Utc>, window: &OpenWindow) -> Workflow {
    if resolve(now, window).start_passed {
        Workflow::Active
    } else {
        Workflow::NotStarted
    }
}

/// Reject windows whose end is not after their start.
pub fn validate_window(item: &AuctionItem) -> Result<(), ConfigurationError> {
    if item.window.end <= item.window.start {
        return Err(ConfigurationError::MalformedWindow(item.id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn window() -> OpenWindow {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        OpenWindow::new(start, start + Duration::hours(24))
    }

    #[test]
    fn test_pending_before_start() {
        let w = window();
        let status = resolve(w.start - Duration::seconds(1), &w);
        assert_eq!(status.phase, Phase::Pending);
        assert!(!status.start_passed);
        assert!(!status.end_passed);
    }

    #[test]
    fn test_boundaries_are_exclusive() {
        let w = window();
        assert_eq!(resolve(w.start, &w).phase, Phase::Pending);
        assert_eq!(resolve(w.end, &w).phase, Phase::Active);
        assert_eq!(resolve(w.end + Duration::seconds(1), &w).phase, Phase::Ended);
    }

    #[test]
    fn test_closed_by_workflow_or_clock() {
        let w = window();
        let active = resolve(w.start + Duration::hours(1), &w);
        let ended = resolve(w.end + Duration::hours(1), &w);

        assert!(!is_closed(Workflow::Active, &active));
        assert!(is_closed(Workflow::Finished, &active));
        assert!(is_closed(Workflow::Deleted, &active));
        assert!(is_closed(Workflow::Closed, &active));
        assert!(is_closed(Workflow::Active, &ended));
    }

    #[test]
    fn test_open_literal_rule() {
        let w = window();
        let before = resolve(w.start - Duration::hours(1), &w);
        let during = resolve(w.start + Duration::hours(1), &w);

        assert!(is_open(Workflow::Active, &before, false));
        assert!(!is_open(Workflow::NotStarted, &before, false));
        // Elapsed time alone reports open, even for a finished item.
        assert!(is_open(Workflow::Finished, &during, false));
    }

    #[test]
    fn test_open_strict_rule() {
        let w = window();
        let during = resolve(w.start + Duration::hours(1), &w);
        let ended = resolve(w.end + Duration::hours(1), &w);

        assert!(is_open(Workflow::Active, &during, true));
        assert!(!is_open(Workflow::Finished, &during, true));
        assert!(!is_open(Workflow::Active, &ended, true));
    }

    #[test]
    fn test_initial_workflow() {
        let w = window();
        assert_eq!(initial_workflow(w.start - Duration::minutes(5), &w), Workflow::NotStarted);
        assert_eq!(initial_workflow(w.start + Duration::minutes(5), &w), Workflow::Active);
    }
}

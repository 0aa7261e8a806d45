//! Generic upload → analyze → result session, shared by all four analysis
//! workflows.
//!
//! One session instance backs one mounted view. The lifecycle is
//! `Idle → Selecting → Submitting → AwaitingResult → Displaying | Failed`,
//! with `reset()` returning to `Idle`. At most one request is in flight per
//! session; a completion that arrives after `reset()` (or view teardown) is
//! discarded by a generation check rather than applied.

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{ApiError, DashboardApi};
use crate::model::{AnalysisKind, AnalysisResult, Lane, StagedFile};

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Selecting,
    Submitting,
    AwaitingResult,
    Displaying,
    Failed,
}

/// Why a local selection was rejected. No network is involved and no state
/// changes beyond surfacing the message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("please select a valid {expected} file")]
    WrongCategory { expected: crate::model::MediaCategory },

    #[error("a request is in flight; selection is locked")]
    InFlight,

    #[error("this analysis takes a single file, not per-lane files")]
    NotLaneKeyed,

    #[error("this analysis takes per-lane files")]
    LaneKeyed,
}

/// Why a submission could not start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("please select at least one file")]
    NothingStaged,

    #[error("a request is already in flight")]
    AlreadyInFlight,
}

/// Staged payload: a single blob, or a lane-keyed mapping for the
/// intersection workflows.
#[derive(Debug, Clone)]
enum Payload {
    Single(Option<StagedFile>),
    Lanes(BTreeMap<Lane, StagedFile>),
}

impl Payload {
    fn for_kind(kind: AnalysisKind) -> Self {
        if kind.is_lane_keyed() {
            Payload::Lanes(BTreeMap::new())
        } else {
            Payload::Single(None)
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Payload::Single(file) => file.is_none(),
            Payload::Lanes(map) => map.is_empty(),
        }
    }
}

/// Opaque token tying a submission to the session state it started from.
/// `complete_submit` applies the outcome only if the token's generation still
/// matches, which is what suppresses stale responses.
#[derive(Debug, Clone, Copy)]
pub struct SubmitTicket {
    generation: u64,
}

pub struct AnalysisSession {
    kind: AnalysisKind,
    phase: Phase,
    payload: Payload,
    result: Option<AnalysisResult>,
    error: Option<String>,
    generation: u64,
}

impl AnalysisSession {
    pub fn new(kind: AnalysisKind) -> Self {
        Self {
            kind,
            phase: Phase::Idle,
            payload: Payload::for_kind(kind),
            result: None,
            error: None,
            generation: 0,
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    /// The displayed error message, from local validation or a failed request.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn in_flight(&self) -> bool {
        matches!(self.phase, Phase::Submitting | Phase::AwaitingResult)
    }

    /// Mirrors the analyze button being enabled.
    pub fn can_submit(&self) -> bool {
        self.phase == Phase::Selecting && !self.payload.is_empty()
    }

    /// The lanes currently staged, in fixed lane order. Empty for single-blob kinds.
    pub fn staged_lanes(&self) -> Vec<Lane> {
        match &self.payload {
            Payload::Lanes(map) => map.keys().copied().collect(),
            Payload::Single(_) => Vec::new(),
        }
    }

    /// Stages the single file for an image or video session.
    ///
    /// Wrong-category files are rejected locally with a message; a valid file
    /// replaces any earlier selection and discards a previous result, so the
    /// session can also leave `Displaying`/`Failed` this way.
    pub fn select(&mut self, file: StagedFile) -> Result<(), SelectError> {
        if self.kind.is_lane_keyed() {
            return Err(SelectError::LaneKeyed);
        }
        self.check_selectable(&file)?;
        self.payload = Payload::Single(Some(file));
        self.enter_selecting();
        Ok(())
    }

    /// Stages a file for one lane of an intersection session, overwriting any
    /// earlier file staged for that lane.
    pub fn select_lane(&mut self, lane: Lane, file: StagedFile) -> Result<(), SelectError> {
        if !self.kind.is_lane_keyed() {
            return Err(SelectError::NotLaneKeyed);
        }
        self.check_selectable(&file)?;
        match &mut self.payload {
            Payload::Lanes(map) => {
                map.insert(lane, file);
            }
            Payload::Single(_) => unreachable!("lane-keyed session holds a lane payload"),
        }
        self.enter_selecting();
        Ok(())
    }

    fn check_selectable(&mut self, file: &StagedFile) -> Result<(), SelectError> {
        if self.in_flight() {
            return Err(SelectError::InFlight);
        }
        let expected = self.kind.accepted_category();
        if file.category() != Some(expected) {
            let err = SelectError::WrongCategory { expected };
            self.error = Some(err.to_string());
            return Err(err);
        }
        Ok(())
    }

    fn enter_selecting(&mut self) {
        self.result = None;
        self.error = None;
        self.phase = Phase::Selecting;
    }

    /// Starts a submission: `Selecting → Submitting`. Requires at least one
    /// staged file and no request already in flight.
    pub fn begin_submit(&mut self) -> Result<SubmitTicket, SubmitError> {
        if self.in_flight() {
            return Err(SubmitError::AlreadyInFlight);
        }
        if self.phase != Phase::Selecting || self.payload.is_empty() {
            return Err(SubmitError::NothingStaged);
        }
        self.error = None;
        self.result = None;
        self.phase = Phase::Submitting;
        debug!(kind = %self.kind, generation = self.generation, "submission started");
        Ok(SubmitTicket { generation: self.generation })
    }

    /// Marks the request as dispatched: `Submitting → AwaitingResult`.
    /// A stale ticket is ignored.
    pub fn note_dispatched(&mut self, ticket: SubmitTicket) {
        if ticket.generation == self.generation && self.phase == Phase::Submitting {
            self.phase = Phase::AwaitingResult;
        }
    }

    /// Applies a submission outcome.
    ///
    /// If the session was reset (or torn down and rebuilt) since the ticket
    /// was issued, the outcome is a silent no-op; it is not an error.
    pub fn complete_submit(
        &mut self,
        ticket: SubmitTicket,
        outcome: Result<AnalysisResult, ApiError>,
    ) {
        if ticket.generation != self.generation || !self.in_flight() {
            debug!(kind = %self.kind, "stale submission outcome discarded");
            return;
        }
        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.phase = Phase::Displaying;
            }
            Err(err) => {
                let message = match &err {
                    ApiError::Server { message: Some(m) } => m.clone(),
                    ApiError::Server { message: None } => {
                        "An error occurred during analysis".to_string()
                    }
                    _ => format!("Failed to analyze {}: {err}", self.kind),
                };
                warn!(kind = %self.kind, error = %err, "submission failed");
                self.error = Some(message);
                self.phase = Phase::Failed;
            }
        }
    }

    /// Runs a full submission against `api`: exactly one network call.
    pub async fn run_submit(&mut self, api: &dyn DashboardApi) -> Result<(), SubmitError> {
        let ticket = self.begin_submit()?;
        let kind = self.kind;
        let payload = self.payload.clone();
        self.note_dispatched(ticket);

        let outcome = match (&payload, kind) {
            (Payload::Single(Some(file)), AnalysisKind::Image) => {
                api.upload_image(file).await.map(AnalysisResult::Image)
            }
            (Payload::Single(Some(file)), AnalysisKind::Video) => {
                api.upload_video(file).await.map(AnalysisResult::Video)
            }
            (Payload::Lanes(map), _) => {
                api.upload_lanes(kind, map).await.map(AnalysisResult::Lanes)
            }
            // begin_submit guarantees a non-empty payload matching the kind
            _ => unreachable!("payload shape always matches the session kind"),
        };

        self.complete_submit(ticket, outcome);
        Ok(())
    }

    /// Clears staged payload and result atomically and returns to `Idle`.
    /// Any in-flight completion is invalidated by the generation bump.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.payload = Payload::for_kind(self.kind);
        self.result = None;
        self.error = None;
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Breakdown, ImageResult, MediaCategory};

    fn image_file() -> StagedFile {
        StagedFile::new("traffic.jpg", vec![0xff, 0xd8])
    }

    fn image_result() -> AnalysisResult {
        AnalysisResult::Image(ImageResult {
            vehicle_count: 4,
            breakdown: Breakdown::new(),
            result_image: "data:image/jpeg;base64,xyz".into(),
        })
    }

    #[test]
    fn test_select_wrong_category_is_local_error() {
        let mut s = AnalysisSession::new(AnalysisKind::Image);
        let err = s.select(StagedFile::new("movie.mp4", vec![])).unwrap_err();
        assert_eq!(err, SelectError::WrongCategory { expected: MediaCategory::Image });
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.error().is_some());
    }

    #[test]
    fn test_select_transitions_idle_to_selecting() {
        let mut s = AnalysisSession::new(AnalysisKind::Image);
        s.select(image_file()).unwrap();
        assert_eq!(s.phase(), Phase::Selecting);
        assert!(s.can_submit());
    }

    #[test]
    fn test_lane_select_accumulates_and_overwrites() {
        let mut s = AnalysisSession::new(AnalysisKind::MultiLane);
        s.select_lane(Lane::North, image_file()).unwrap();
        s.select_lane(Lane::East, StagedFile::new("east.png", vec![1])).unwrap();
        s.select_lane(Lane::North, StagedFile::new("north2.jpg", vec![2])).unwrap();
        assert_eq!(s.staged_lanes(), vec![Lane::North, Lane::East]);
    }

    #[test]
    fn test_single_kind_rejects_lane_select() {
        let mut s = AnalysisSession::new(AnalysisKind::Video);
        let err = s.select_lane(Lane::North, image_file()).unwrap_err();
        assert_eq!(err, SelectError::NotLaneKeyed);
    }

    #[test]
    fn test_submit_requires_staged_payload() {
        let mut s = AnalysisSession::new(AnalysisKind::MultiLane);
        assert_eq!(s.begin_submit().unwrap_err(), SubmitError::NothingStaged);
    }

    #[test]
    fn test_no_second_submit_while_in_flight() {
        let mut s = AnalysisSession::new(AnalysisKind::Image);
        s.select(image_file()).unwrap();
        let ticket = s.begin_submit().unwrap();
        assert_eq!(s.phase(), Phase::Submitting);
        assert_eq!(s.begin_submit().unwrap_err(), SubmitError::AlreadyInFlight);
        s.note_dispatched(ticket);
        assert_eq!(s.phase(), Phase::AwaitingResult);
        assert_eq!(s.begin_submit().unwrap_err(), SubmitError::AlreadyInFlight);
        assert!(!s.can_submit());
    }

    #[test]
    fn test_success_displays_result() {
        let mut s = AnalysisSession::new(AnalysisKind::Image);
        s.select(image_file()).unwrap();
        let ticket = s.begin_submit().unwrap();
        s.note_dispatched(ticket);
        s.complete_submit(ticket, Ok(image_result()));
        assert_eq!(s.phase(), Phase::Displaying);
        assert!(s.result().is_some());
        assert!(s.error().is_none());
    }

    #[test]
    fn test_server_failure_uses_server_message() {
        let mut s = AnalysisSession::new(AnalysisKind::Image);
        s.select(image_file()).unwrap();
        let ticket = s.begin_submit().unwrap();
        s.complete_submit(
            ticket,
            Err(ApiError::Server { message: Some("model not loaded".into()) }),
        );
        assert_eq!(s.phase(), Phase::Failed);
        assert_eq!(s.error(), Some("model not loaded"));
    }

    #[test]
    fn test_server_failure_without_message_uses_fallback() {
        let mut s = AnalysisSession::new(AnalysisKind::Image);
        s.select(image_file()).unwrap();
        let ticket = s.begin_submit().unwrap();
        s.complete_submit(ticket, Err(ApiError::Server { message: None }));
        assert_eq!(s.phase(), Phase::Failed);
        assert_eq!(s.error(), Some("An error occurred during analysis"));
    }

    #[test]
    fn test_reset_from_terminal_states_yields_idle() {
        for outcome in [Ok(image_result()), Err(ApiError::Server { message: None })] {
            let mut s = AnalysisSession::new(AnalysisKind::Image);
            s.select(image_file()).unwrap();
            let ticket = s.begin_submit().unwrap();
            s.complete_submit(ticket, outcome);
            s.reset();
            assert_eq!(s.phase(), Phase::Idle);
            assert!(s.result().is_none());
            assert!(s.error().is_none());
            assert!(!s.can_submit());
        }
    }

    #[test]
    fn test_stale_completion_after_reset_is_noop() {
        let mut s = AnalysisSession::new(AnalysisKind::Image);
        s.select(image_file()).unwrap();
        let ticket = s.begin_submit().unwrap();
        s.note_dispatched(ticket);
        s.reset();
        s.complete_submit(ticket, Ok(image_result()));
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.result().is_none());
        assert!(s.error().is_none());
    }

    #[test]
    fn test_selection_locked_while_in_flight() {
        let mut s = AnalysisSession::new(AnalysisKind::Image);
        s.select(image_file()).unwrap();
        let _ticket = s.begin_submit().unwrap();
        assert_eq!(s.select(image_file()).unwrap_err(), SelectError::InFlight);
    }

    #[test]
    fn test_new_selection_after_failure_clears_error() {
        let mut s = AnalysisSession::new(AnalysisKind::Image);
        s.select(image_file()).unwrap();
        let ticket = s.begin_submit().unwrap();
        s.complete_submit(ticket, Err(ApiError::Server { message: None }));
        assert_eq!(s.phase(), Phase::Failed);
        s.select(image_file()).unwrap();
        assert_eq!(s.phase(), Phase::Selecting);
        assert!(s.error().is_none());
    }
}

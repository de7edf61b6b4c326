//! Cross-frame stabilization.
//!
//! The stabilizer is the only part of the pipeline with memory. It turns
//! ranked frames into display updates and at most one announcement per
//! accepted frame, under two independent timing rules:
//!
//! - frame cooldown: a frame is processed only if `frame_cooldown` has
//!   elapsed since the last processed frame. Otherwise it is dropped with no
//!   state change.
//! - announcement cooldown: a label is announced if it differs from the last
//!   announced label, or if `announce_cooldown` has elapsed since that
//!   announcement.
//!
//! Session statistics (`seen_labels`, `total_accepted`) are informational
//! only and never gate announcements.

use serde::Serialize;
use std::time::Duration;

use crate::detect::{FrameResult, RankedFrame};
use crate::Timestamp;

/// Number of seen labels carried in a display update.
pub const HISTORY_PREVIEW_LEN: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StabilizerSettings {
    pub confidence_threshold: f32,
    pub frame_cooldown: Duration,
    pub announce_cooldown: Duration,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            frame_cooldown: Duration::from_millis(1500),
            announce_cooldown: Duration::from_millis(3000),
        }
    }
}

/// Per-session memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StabilizerState {
    /// Distinct labels accepted this session, in first-seen order. Bounded by
    /// the label table size.
    seen_labels: Vec<String>,
    total_accepted: u64,
    last_announced_label: Option<String>,
    last_announced_at: Option<Timestamp>,
    last_frame_processed_at: Option<Timestamp>,
}

impl StabilizerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen_labels(&self) -> &[String] {
        &self.seen_labels
    }

    pub fn unique_labels(&self) -> usize {
        self.seen_labels.len()
    }

    pub fn total_accepted(&self) -> u64 {
        self.total_accepted
    }

    pub fn last_announced_label(&self) -> Option<&str> {
        self.last_announced_label.as_deref()
    }

    pub fn last_announced_at(&self) -> Option<Timestamp> {
        self.last_announced_at
    }

    pub fn last_frame_processed_at(&self) -> Option<Timestamp> {
        self.last_frame_processed_at
    }

    /// Clear every field, including the frame timer, so the first frame of a
    /// new session is never blocked by a stale cooldown.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            unique_labels: self.unique_labels(),
            total_accepted: self.total_accepted,
        }
    }

    fn record_seen(&mut self, label: &str) {
        if !self.seen_labels.iter().any(|seen| seen == label) {
            self.seen_labels.push(label.to_string());
        }
    }

    fn frame_cooldown_remaining(&self, now: Timestamp, cooldown: Duration) -> Option<Duration> {
        let last = self.last_frame_processed_at?;
        let elapsed = now.elapsed_since(last);
        if elapsed >= cooldown {
            None
        } else {
            Some(cooldown - elapsed)
        }
    }

    fn may_announce(&self, label: &str, now: Timestamp, cooldown: Duration) -> bool {
        match (&self.last_announced_label, self.last_announced_at) {
            (Some(last), Some(at)) if last == label => now.elapsed_since(at) >= cooldown,
            _ => true,
        }
    }
}

/// Narration request for the event sink.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnouncementEvent {
    pub label: String,
    pub confidence: f32,
    pub at: Timestamp,
}

/// Display payload for an accepted frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DisplayUpdate {
    pub frame: FrameResult,
    pub unique_labels: usize,
    pub total_accepted: u64,
    /// First few seen labels, in first-seen order.
    pub history: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub unique_labels: usize,
    pub total_accepted: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Frame arrived inside the frame cooldown; nothing changed.
    Dropped { remaining: Duration },
    Accepted {
        display: DisplayUpdate,
        announcement: Option<AnnouncementEvent>,
    },
}

impl FrameOutcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, FrameOutcome::Dropped { .. })
    }

    pub fn announcement(&self) -> Option<&AnnouncementEvent> {
        match self {
            FrameOutcome::Accepted { announcement, .. } => announcement.as_ref(),
            FrameOutcome::Dropped { .. } => None,
        }
    }
}

/// Pure state transition: `(state, frame, now) -> (state', outcome)`.
pub fn transition(
    mut state: StabilizerState,
    settings: &StabilizerSettings,
    frame: RankedFrame,
    now: Timestamp,
) -> (StabilizerState, FrameOutcome) {
    if let Some(remaining) = state.frame_cooldown_remaining(now, settings.frame_cooldown) {
        return (state, FrameOutcome::Dropped { remaining });
    }

    for detection in frame
        .display
        .iter()
        .filter(|d| d.confidence() >= settings.confidence_threshold)
    {
        state.record_seen(detection.label());
        state.total_accepted += 1;
    }

    let announcement = frame.top_candidate.and_then(|top| {
        if !state.may_announce(top.label(), now, settings.announce_cooldown) {
            return None;
        }
        state.last_announced_label = Some(top.label().to_string());
        state.last_announced_at = Some(now);
        Some(AnnouncementEvent {
            label: top.label().to_string(),
            confidence: top.confidence(),
            at: now,
        })
    });

    state.last_frame_processed_at = Some(now);

    let display = DisplayUpdate {
        frame: frame.display,
        unique_labels: state.unique_labels(),
        total_accepted: state.total_accepted,
        history: state
            .seen_labels
            .iter()
            .take(HISTORY_PREVIEW_LEN)
            .cloned()
            .collect(),
    };

    (
        state,
        FrameOutcome::Accepted {
            display,
            announcement,
        },
    )
}

/// Owns one session's state and applies `transition` to it.
#[derive(Clone, Debug, Default)]
pub struct Stabilizer {
    settings: StabilizerSettings,
    state: StabilizerState,
}

impl Stabilizer {
    pub fn new(settings: StabilizerSettings) -> Self {
        Self {
            settings,
            state: StabilizerState::new(),
        }
    }

    pub fn settings(&self) -> &StabilizerSettings {
        &self.settings
    }

    pub fn state(&self) -> &StabilizerState {
        &self.state
    }

    pub fn observe(&mut self, frame: RankedFrame, now: Timestamp) -> FrameOutcome {
        let state = std::mem::take(&mut self.state);
        let (state, outcome) = transition(state, &self.settings, frame, now);
        self.state = state;
        outcome
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }
}

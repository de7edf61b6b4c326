//! Detection Narrator
//!
//! This crate turns raw per-frame SSD detector output into a temporally
//! stable stream of detections that can be shown on screen and spoken.
//!
//! # Architecture
//!
//! Each frame flows through three stages:
//!
//! 1. **Decode** (`detect::FrameDecoder`): raw tensors to validated
//!    `Detection` values. Malformed slots are dropped, never reported.
//! 2. **Rank** (`detect::Ranker`): stable confidence ordering, display cap,
//!    and selection of the single announcement candidate.
//! 3. **Stabilize** (`stabilize::Stabilizer`): frame cooldown, per-label
//!    announcement cooldown, and session statistics.
//!
//! Decode and rank are stateless. The stabilizer holds the only cross-frame
//! state and is driven under a lock by `pipeline::Pipeline`.
//!
//! # Module Structure
//!
//! - `detect`: tensor decoding, label table, ranking
//! - `stabilize`: session state and the pure transition function
//! - `narration`: event sink trait and speech phrasing
//! - `pipeline`: session lifecycle and the decode → rank → stabilize chain
//! - `config`: file + environment configuration
//! - `replay`: JSON Lines recordings of raw batches

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod config;
pub mod detect;
pub mod narration;
pub mod pipeline;
pub mod replay;
pub mod stabilize;

pub use config::{NarratorConfig, Sensitivity};
pub use detect::{
    BoundingBox, DecoderSettings, Detection, FrameDecoder, FrameResult, LabelTable, RankedFrame,
    Ranker, RankerSettings, RawBatch,
};
pub use narration::{speech_text, LogSink, NarrationSink};
pub use pipeline::Pipeline;
pub use stabilize::{
    transition, AnnouncementEvent, DisplayUpdate, FrameOutcome, SessionSummary, Stabilizer,
    StabilizerSettings, StabilizerState,
};

// -------------------- Timestamps --------------------

/// Monotonic frame time in milliseconds from an arbitrary origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`. A timestamp before `earlier` yields zero.
    pub fn elapsed_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl std::ops::Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

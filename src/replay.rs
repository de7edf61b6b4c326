//! Recorded detector output.
//!
//! A recording is a JSON Lines file. Each line holds one raw batch plus the
//! frame time in milliseconds:
//!
//! ```json
//! {"t_ms": 0, "locations": [[0.1, 0.1, 0.9, 0.9]], "classes": [1], "scores": [0.92], "count": 1}
//! ```
//!
//! `replay_frames` feeds a recording through an active session. In JSON mode
//! every output line is one object: `frame_json` per accepted frame, then a
//! closing `summary_json`.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::detect::RawBatch;
use crate::pipeline::Pipeline;
use crate::stabilize::{FrameOutcome, SessionSummary};
use crate::Timestamp;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    #[serde(rename = "t_ms")]
    pub at: Timestamp,
    #[serde(flatten)]
    pub batch: RawBatch,
}

pub fn parse_recording(raw: &str) -> Result<Vec<RecordedFrame>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .map_err(|e| anyhow!("invalid recorded frame on line {}: {}", idx + 1, e))
        })
        .collect()
}

pub fn read_recording(path: &Path) -> Result<Vec<RecordedFrame>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read recording {}: {}", path.display(), e))?;
    parse_recording(&raw).map_err(|e| anyhow!("{}: {}", path.display(), e))
}

/// Counters for one replay run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// Frames in the recording.
    pub frames: usize,
    /// Frames handed to the session before the end or an interrupt.
    pub processed: usize,
    pub dropped: usize,
    pub announced: usize,
}

/// Run `frames` through the pipeline's active session in order, calling
/// `on_outcome` for each processed frame. Stops early once `stop` is set.
pub fn replay_frames<F>(
    pipeline: &Pipeline,
    frames: &[RecordedFrame],
    stop: &AtomicBool,
    mut on_outcome: F,
) -> Result<ReplayStats>
where
    F: FnMut(&RecordedFrame, &FrameOutcome) -> Result<()>,
{
    let mut stats = ReplayStats {
        frames: frames.len(),
        ..ReplayStats::default()
    };
    for frame in frames {
        if stop.load(Ordering::SeqCst) {
            log::warn!("interrupted, stopping replay at {}", frame.at);
            break;
        }
        let outcome = pipeline
            .process(&frame.batch, frame.at)?
            .ok_or_else(|| anyhow!("no active detection session at {}", frame.at))?;
        stats.processed += 1;
        match &outcome {
            FrameOutcome::Dropped { .. } => stats.dropped += 1,
            FrameOutcome::Accepted { announcement, .. } => {
                if announcement.is_some() {
                    stats.announced += 1;
                }
            }
        }
        on_outcome(frame, &outcome)?;
    }
    Ok(stats)
}

/// JSON line for an accepted frame. Dropped frames produce no line.
pub fn frame_json(frame: &RecordedFrame, outcome: &FrameOutcome) -> Option<Value> {
    match outcome {
        FrameOutcome::Dropped { .. } => None,
        FrameOutcome::Accepted {
            display,
            announcement,
        } => Some(json!({
            "t_ms": frame.at,
            "display": display,
            "announcement": announcement,
        })),
    }
}

pub fn summary_json(summary: &SessionSummary, stats: &ReplayStats) -> Value {
    json!({
        "summary": summary,
        "stats": stats,
    })
}

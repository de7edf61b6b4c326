//! Decode → rank → stabilize, with detection session lifecycle.
//!
//! Decoding and ranking run without any lock. The stabilizer is held in a
//! `Mutex` so at most one update is in flight; callers submit frames in
//! arrival order. While no session is active, frames are ignored.

use anyhow::{anyhow, Result};
use std::sync::{Mutex, MutexGuard};

use crate::config::NarratorConfig;
use crate::detect::{FrameDecoder, LabelTable, RankedFrame, Ranker, RawBatch};
use crate::narration::{self, NarrationSink};
use crate::stabilize::{FrameOutcome, SessionSummary, Stabilizer, StabilizerSettings};
use crate::Timestamp;

pub struct Pipeline {
    decoder: FrameDecoder,
    ranker: Ranker,
    stabilizer_settings: StabilizerSettings,
    /// `Some` while a detection session is active.
    session: Mutex<Option<Stabilizer>>,
}

impl Pipeline {
    /// Build a pipeline. Fails on invalid configuration or a label table that
    /// does not match the declared model class count.
    pub fn new(config: &NarratorConfig, labels: LabelTable) -> Result<Self> {
        config.validate()?;
        if let Some(class_count) = config.model.class_count {
            labels.validate_class_count(class_count)?;
        }
        Ok(Self {
            decoder: FrameDecoder::new(labels, config.decoder_settings()),
            ranker: Ranker::new(config.ranker_settings()),
            stabilizer_settings: config.stabilizer_settings(),
            session: Mutex::new(None),
        })
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// Start a fresh session. Any running session is discarded.
    pub fn start_session(&self) -> Result<()> {
        let mut session = self.lock_session()?;
        if session.is_some() {
            log::warn!("detection session restarted; previous state discarded");
        }
        *session = Some(Stabilizer::new(self.stabilizer_settings));
        log::info!("detection session started");
        Ok(())
    }

    /// Stop the session and return its statistics. `None` if no session was active.
    pub fn stop_session(&self) -> Result<Option<SessionSummary>> {
        let summary = self
            .lock_session()?
            .take()
            .map(|stabilizer| stabilizer.state().summary());
        if let Some(summary) = &summary {
            log::info!(
                "detection session stopped: {} unique labels, {} accepted detections",
                summary.unique_labels,
                summary.total_accepted
            );
        }
        Ok(summary)
    }

    pub fn is_active(&self) -> Result<bool> {
        Ok(self.lock_session()?.is_some())
    }

    /// Current session statistics, if a session is active.
    pub fn summary(&self) -> Result<Option<SessionSummary>> {
        Ok(self
            .lock_session()?
            .as_ref()
            .map(|stabilizer| stabilizer.state().summary()))
    }

    /// Decode and rank a batch. Pure; does not touch session state.
    pub fn rank_batch(&self, batch: &RawBatch) -> RankedFrame {
        self.ranker.rank(self.decoder.decode(batch))
    }

    /// Run one frame through the pipeline. Returns `None` when no session is active.
    pub fn process(&self, batch: &RawBatch, now: Timestamp) -> Result<Option<FrameOutcome>> {
        let ranked = self.rank_batch(batch);
        let mut session = self.lock_session()?;
        let Some(stabilizer) = session.as_mut() else {
            log::trace!("frame at {} ignored: no active session", now);
            return Ok(None);
        };
        let outcome = stabilizer.observe(ranked, now);
        match &outcome {
            FrameOutcome::Dropped { remaining } => {
                log::trace!(
                    "frame at {} dropped: cooldown {}ms remaining",
                    now,
                    remaining.as_millis()
                );
            }
            FrameOutcome::Accepted { announcement, .. } => {
                if let Some(event) = announcement {
                    log::info!(
                        "announce {} ({:.1}%) at {}",
                        event.label,
                        event.confidence * 100.0,
                        now
                    );
                }
            }
        }
        Ok(Some(outcome))
    }

    /// Run one frame and hand the result to `sink`.
    pub fn process_into<S: NarrationSink + ?Sized>(
        &self,
        batch: &RawBatch,
        now: Timestamp,
        sink: &mut S,
    ) -> Result<Option<FrameOutcome>> {
        let outcome = self.process(batch, now)?;
        if let Some(outcome) = &outcome {
            narration::deliver(sink, outcome);
        }
        Ok(outcome)
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, Option<Stabilizer>>> {
        self.session
            .lock()
            .map_err(|_| anyhow!("session state lock poisoned"))
    }
}

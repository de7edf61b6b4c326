//! SSD tensor decoding.
//!
//! A detector run produces four parallel outputs: box locations, class ids,
//! scores and a detection count. The decoder turns one such batch into the
//! frame's valid detections. Malformed slots are skipped, never reported as
//! errors; the worst case is an empty frame.

use serde::{Deserialize, Serialize};

use crate::detect::labels::LabelTable;
use crate::detect::result::{BoundingBox, Detection};

/// Slack on the minimum-area check. Box corners carry f32 rounding, so a box
/// whose nominal area equals the minimum can compute a hair below it.
const AREA_TOLERANCE: f32 = f32::EPSILON;

/// Raw output of one detector run, as produced by an SSD post-processing op.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBatch {
    /// `(y_min, x_min, y_max, x_max)` per slot.
    pub locations: Vec<[f32; 4]>,
    pub classes: Vec<f32>,
    pub scores: Vec<f32>,
    /// Declared number of valid slots. A float by detector convention.
    pub count: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecoderSettings {
    /// Fixed slot capacity `N` of the model output tensors.
    pub slot_capacity: usize,
    pub confidence_threshold: f32,
    pub min_box_area: f32,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            slot_capacity: 10,
            confidence_threshold: 0.4,
            min_box_area: 0.01,
        }
    }
}

/// Reason a slot was dropped during decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotRejection {
    Missing,
    MalformedScore,
    BelowThreshold,
    Background,
    UnknownClass,
    MalformedBox,
    DegenerateBox,
    TooSmall,
}

/// Stateless decoder; safe to share between threads.
#[derive(Clone, Debug)]
pub struct FrameDecoder {
    labels: LabelTable,
    settings: DecoderSettings,
}

impl FrameDecoder {
    pub fn new(labels: LabelTable, settings: DecoderSettings) -> Self {
        Self { labels, settings }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn settings(&self) -> &DecoderSettings {
        &self.settings
    }

    /// Decode a batch into valid detections, in slot order.
    pub fn decode(&self, batch: &RawBatch) -> Vec<Detection> {
        let n = self.slot_count(batch.count);
        let mut detections = Vec::with_capacity(n);
        for slot in 0..n {
            match self.decode_slot(batch, slot) {
                Ok(detection) => detections.push(detection),
                Err(reason) => log::debug!("slot {} discarded: {:?}", slot, reason),
            }
        }
        detections
    }

    /// Number of slots to inspect: the declared count, rounded and clamped to capacity.
    fn slot_count(&self, declared: f32) -> usize {
        if !declared.is_finite() || declared <= 0.0 {
            return 0;
        }
        let rounded = declared.round();
        if rounded >= self.settings.slot_capacity as f32 {
            self.settings.slot_capacity
        } else {
            rounded as usize
        }
    }

    fn decode_slot(&self, batch: &RawBatch, slot: usize) -> Result<Detection, SlotRejection> {
        let confidence = *batch.scores.get(slot).ok_or(SlotRejection::Missing)?;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(SlotRejection::MalformedScore);
        }
        if confidence < self.settings.confidence_threshold {
            return Err(SlotRejection::BelowThreshold);
        }

        let raw_class = *batch.classes.get(slot).ok_or(SlotRejection::Missing)?;
        if !raw_class.is_finite() {
            return Err(SlotRejection::UnknownClass);
        }
        let class_index = raw_class.round() as i64;
        if class_index <= 0 {
            return Err(SlotRejection::Background);
        }
        let label = self
            .labels
            .resolve(class_index)
            .ok_or(SlotRejection::UnknownClass)?;

        let location = *batch.locations.get(slot).ok_or(SlotRejection::Missing)?;
        if location.iter().any(|v| !v.is_finite()) {
            return Err(SlotRejection::MalformedBox);
        }
        let [y_min, x_min, y_max, x_max] = location.map(|v| v.clamp(0.0, 1.0));
        if y_max <= y_min || x_max <= x_min {
            return Err(SlotRejection::DegenerateBox);
        }
        let bbox = BoundingBox {
            y_min,
            x_min,
            y_max,
            x_max,
        };
        if bbox.area() + AREA_TOLERANCE < self.settings.min_box_area {
            return Err(SlotRejection::TooSmall);
        }

        Ok(Detection::new(
            slot,
            class_index as u32,
            label.to_string(),
            confidence,
            bbox,
        ))
    }
}

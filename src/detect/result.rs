use serde::Serialize;

/// Normalized bounding box `(y_min, x_min, y_max, x_max)` in model-input space.
///
/// (0, 0) is the top-left corner. Boxes held by a `Detection` are always
/// non-degenerate and clamped to [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    pub y_min: f32,
    pub x_min: f32,
    pub y_max: f32,
    pub x_max: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Convert to pixel coordinates for an input of `size` x `size`.
    pub fn to_pixels(&self, size: u32) -> (f32, f32, f32, f32) {
        let s = size as f32;
        (self.x_min * s, self.y_min * s, self.x_max * s, self.y_max * s)
    }
}

/// One validated detection from a single frame.
///
/// Fields are private: the only way to obtain a `Detection` is through
/// `FrameDecoder::decode`, which enforces the confidence, class and
/// geometry checks.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    slot: usize,
    class_index: u32,
    label: String,
    confidence: f32,
    bbox: BoundingBox,
}

impl Detection {
    pub(crate) fn new(
        slot: usize,
        class_index: u32,
        label: String,
        confidence: f32,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            slot,
            class_index,
            label,
            confidence,
            bbox,
        }
    }

    /// Tensor slot this detection was decoded from.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn class_index(&self) -> u32 {
        self.class_index
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

impl std::fmt::Display for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.1}%)", self.label, self.confidence * 100.0)
    }
}

/// Display-ready detections for one frame, sorted by descending confidence
/// and truncated to the configured display cap.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FrameResult {
    detections: Vec<Detection>,
}

impl FrameResult {
    pub(crate) fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Ordered `(label, confidence)` pairs.
    pub fn entries(&self) -> Vec<(&str, f32)> {
        self.detections
            .iter()
            .map(|d| (d.label(), d.confidence()))
            .collect()
    }

    /// Mean confidence of the display set, `None` when empty.
    pub fn average_confidence(&self) -> Option<f32> {
        if self.detections.is_empty() {
            return None;
        }
        let total: f32 = self.detections.iter().map(|d| d.confidence()).sum();
        Some(total / self.detections.len() as f32)
    }
}

impl<'a> IntoIterator for &'a FrameResult {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

#[cfg(test)]
pub(crate) fn test_detection(slot: usize, label: &str, confidence: f32) -> Detection {
    Detection::new(
        slot,
        1,
        label.to_string(),
        confidence,
        BoundingBox {
            y_min: 0.1,
            x_min: 0.1,
            y_max: 0.9,
            x_max: 0.9,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_confidence_over_display_set() {
        let frame = FrameResult::new(vec![
            test_detection(0, "person", 0.9),
            test_detection(1, "chair", 0.5),
        ]);
        let avg = frame.average_confidence().unwrap();
        assert!((avg - 0.7).abs() < 1e-6);
        assert_eq!(frame.entries(), vec![("person", 0.9), ("chair", 0.5)]);
        assert_eq!(FrameResult::default().average_confidence(), None);
    }

    #[test]
    fn bbox_pixels_for_ssd_input() {
        let bbox = BoundingBox {
            y_min: 0.0,
            x_min: 0.5,
            y_max: 1.0,
            x_max: 1.0,
        };
        assert_eq!(bbox.to_pixels(300), (150.0, 0.0, 300.0, 300.0));
        assert_eq!(bbox.area(), 0.5);
    }

    #[test]
    fn display_formats_percentage() {
        assert_eq!(test_detection(0, "bottle", 0.75).to_string(), "bottle (75.0%)");
    }
}

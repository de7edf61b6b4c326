use crate::detect::result::{Detection, FrameResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankerSettings {
    /// Maximum detections kept for display.
    pub display_cap: usize,
    /// Minimum confidence for the top candidate to be announced.
    pub announce_threshold: f32,
}

impl Default for RankerSettings {
    fn default() -> Self {
        Self {
            display_cap: 5,
            announce_threshold: 0.5,
        }
    }
}

/// Ranked view of one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RankedFrame {
    pub display: FrameResult,
    /// Best detection of the frame, if it clears the announce threshold.
    pub top_candidate: Option<Detection>,
}

/// Orders, caps and selects the frame's detections. Stateless.
#[derive(Clone, Debug)]
pub struct Ranker {
    settings: RankerSettings,
}

impl Ranker {
    pub fn new(settings: RankerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RankerSettings {
        &self.settings
    }

    /// Rank decoded detections.
    ///
    /// Order is descending confidence; equal confidences keep ascending slot
    /// order, so the result is reproducible for identical input.
    pub fn rank(&self, mut detections: Vec<Detection>) -> RankedFrame {
        detections.sort_by(|a, b| {
            b.confidence()
                .total_cmp(&a.confidence())
                .then_with(|| a.slot().cmp(&b.slot()))
        });

        let top_candidate = detections
            .first()
            .filter(|top| top.confidence() >= self.settings.announce_threshold)
            .cloned();

        detections.truncate(self.settings.display_cap);

        RankedFrame {
            display: FrameResult::new(detections),
            top_candidate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::test_detection;

    fn ranker(display_cap: usize, announce_threshold: f32) -> Ranker {
        Ranker::new(RankerSettings {
            display_cap,
            announce_threshold,
        })
    }

    #[test]
    fn sorts_descending_by_confidence() {
        let ranked = ranker(5, 0.5).rank(vec![
            test_detection(0, "cup", 0.45),
            test_detection(1, "person", 0.91),
            test_detection(2, "chair", 0.62),
        ]);
        let labels: Vec<&str> = ranked.display.iter().map(|d| d.label()).collect();
        assert_eq!(labels, vec!["person", "chair", "cup"]);
        assert_eq!(ranked.top_candidate.unwrap().label(), "person");
    }

    #[test]
    fn equal_confidence_keeps_slot_order() {
        let ranked = ranker(5, 0.5).rank(vec![
            test_detection(3, "bottle", 0.7),
            test_detection(1, "cup", 0.7),
        ]);
        let slots: Vec<usize> = ranked.display.iter().map(|d| d.slot()).collect();
        assert_eq!(slots, vec![1, 3]);
        assert_eq!(ranked.top_candidate.unwrap().slot(), 1);
    }

    #[test]
    fn display_set_respects_cap() {
        let detections = (0..8)
            .map(|i| test_detection(i, "person", 0.5 + i as f32 * 0.05))
            .collect();
        let ranked = ranker(3, 0.5).rank(detections);
        assert_eq!(ranked.display.len(), 3);
        assert_eq!(ranked.display.detections()[0].slot(), 7);
    }

    #[test]
    fn weak_top_candidate_is_not_announced_but_displayed() {
        let ranked = ranker(5, 0.6).rank(vec![test_detection(0, "chair", 0.55)]);
        assert!(ranked.top_candidate.is_none());
        assert_eq!(ranked.display.len(), 1);
    }

    #[test]
    fn empty_frame_has_no_candidate() {
        let ranked = ranker(5, 0.5).rank(Vec::new());
        assert!(ranked.display.is_empty());
        assert!(ranked.top_candidate.is_none());
    }
}

//! Event sink side of the pipeline.
//!
//! The core only produces `DisplayUpdate` and `AnnouncementEvent` values.
//! How they are shown or spoken is up to a `NarrationSink`. Delivery is
//! fire-and-forget: the pipeline never waits on a sink.

use crate::stabilize::{AnnouncementEvent, DisplayUpdate, FrameOutcome, SessionSummary};

/// Confidence at or above which an object is reported as "detected".
pub const CONFIDENT_PHRASE_MIN: f32 = 0.8;
/// Confidence at or above which an object is reported as "I see".
pub const LIKELY_PHRASE_MIN: f32 = 0.6;

/// Consumer of stabilizer output (screen, speech synthesizer, log).
pub trait NarrationSink {
    fn display(&mut self, update: &DisplayUpdate);

    fn announce(&mut self, event: &AnnouncementEvent);

    fn session_started(&mut self) {}

    fn session_stopped(&mut self, _summary: &SessionSummary) {}
}

/// Hand a frame outcome to `sink`: the display update, then any announcement.
/// Dropped frames deliver nothing.
pub fn deliver<S: NarrationSink + ?Sized>(sink: &mut S, outcome: &FrameOutcome) {
    if let FrameOutcome::Accepted {
        display,
        announcement,
    } = outcome
    {
        sink.display(display);
        if let Some(event) = announcement {
            sink.announce(event);
        }
    }
}

/// Speech text for an announcement, phrased by confidence.
pub fn speech_text(event: &AnnouncementEvent) -> String {
    if event.confidence >= CONFIDENT_PHRASE_MIN {
        format!("{} detected", event.label)
    } else if event.confidence >= LIKELY_PHRASE_MIN {
        format!("I see {}", event.label)
    } else {
        event.label.clone()
    }
}

pub fn session_stopped_text(summary: &SessionSummary) -> String {
    format!(
        "Detection stopped. Detected {} objects.",
        summary.total_accepted
    )
}

/// Display text for an update: one line per detection plus statistics.
pub fn display_text(update: &DisplayUpdate) -> String {
    if update.frame.is_empty() {
        return "No objects detected".to_string();
    }
    let mut lines: Vec<String> = update
        .frame
        .iter()
        .map(|d| format!("• {}: {:.1}%", d.label(), d.confidence() * 100.0))
        .collect();
    if let Some(avg) = update.frame.average_confidence() {
        lines.push(format!(
            "Detected {} objects (avg confidence {:.1}%)",
            update.frame.len(),
            avg * 100.0
        ));
    }
    lines.push(format!(
        "Session: {} unique, {} total",
        update.unique_labels, update.total_accepted
    ));
    if !update.history.is_empty() {
        lines.push(format!("History: {}", update.history.join(", ")));
    }
    lines.join("\n")
}

/// Sink that reports through `log` and prints speech to stdout.
#[derive(Debug)]
pub struct LogSink {
    voice_enabled: bool,
    spoken: Vec<String>,
}

impl LogSink {
    pub fn new(voice_enabled: bool) -> Self {
        Self {
            voice_enabled,
            spoken: Vec::new(),
        }
    }

    /// Everything this sink has spoken, in order.
    pub fn spoken(&self) -> &[String] {
        &self.spoken
    }

    fn speak(&mut self, text: String) {
        if !self.voice_enabled {
            log::debug!("voice disabled, not speaking: {}", text);
            return;
        }
        println!("[speech] {}", text);
        self.spoken.push(text);
    }
}

impl NarrationSink for LogSink {
    fn display(&mut self, update: &DisplayUpdate) {
        log::info!("display update:\n{}", display_text(update));
    }

    fn announce(&mut self, event: &AnnouncementEvent) {
        self.speak(speech_text(event));
    }

    fn session_started(&mut self) {
        self.speak("Object detection started. Point camera at objects.".to_string());
    }

    fn session_stopped(&mut self, summary: &SessionSummary) {
        self.speak(session_stopped_text(summary));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::test_detection;
    use crate::detect::FrameResult;
    use crate::Timestamp;

    fn event(label: &str, confidence: f32) -> AnnouncementEvent {
        AnnouncementEvent {
            label: label.to_string(),
            confidence,
            at: Timestamp::from_millis(0),
        }
    }

    #[test]
    fn phrasing_follows_confidence_bands() {
        assert_eq!(speech_text(&event("person", 0.92)), "person detected");
        assert_eq!(speech_text(&event("person", 0.8)), "person detected");
        assert_eq!(speech_text(&event("chair", 0.65)), "I see chair");
        assert_eq!(speech_text(&event("chair", 0.6)), "I see chair");
        assert_eq!(speech_text(&event("cup", 0.55)), "cup");
    }

    #[test]
    fn stop_summary_reports_total() {
        let summary = SessionSummary {
            unique_labels: 2,
            total_accepted: 7,
        };
        assert_eq!(
            session_stopped_text(&summary),
            "Detection stopped. Detected 7 objects."
        );
    }

    #[test]
    fn display_text_lists_detections_and_stats() {
        let update = DisplayUpdate {
            frame: FrameResult::new(vec![
                test_detection(0, "person", 0.75),
                test_detection(1, "cup", 0.25),
            ]),
            unique_labels: 2,
            total_accepted: 4,
            history: vec!["person".to_string(), "cup".to_string()],
        };
        let text = display_text(&update);
        assert!(text.contains("• person: 75.0%"));
        assert!(text.contains("Detected 2 objects (avg confidence 50.0%)"));
        assert!(text.contains("Session: 2 unique, 4 total"));
        assert!(text.ends_with("History: person, cup"));
    }

    #[test]
    fn muted_sink_records_nothing() {
        let mut muted = LogSink::new(false);
        muted.announce(&event("person", 0.9));
        assert!(muted.spoken().is_empty());

        let mut voiced = LogSink::new(true);
        voiced.announce(&event("person", 0.9));
        assert_eq!(voiced.spoken(), ["person detected"]);
    }
}

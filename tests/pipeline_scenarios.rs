//! End-to-end scenarios: raw batches through decode, rank and stabilize.

use anyhow::Result;
use std::time::Duration;

use detect_narrator::replay::parse_recording;
use detect_narrator::{
    AnnouncementEvent, DisplayUpdate, FrameOutcome, LabelTable, NarrationSink, NarratorConfig,
    Pipeline, RawBatch, SessionSummary, Timestamp,
};

const PERSON: f32 = 1.0;
const BOTTLE: f32 = 44.0;
const CHAIR: f32 = 62.0;
const BOX: [f32; 4] = [0.1, 0.1, 0.9, 0.9];

#[derive(Default)]
struct RecordingSink {
    displays: Vec<DisplayUpdate>,
    announcements: Vec<AnnouncementEvent>,
    stopped: Option<SessionSummary>,
}

impl NarrationSink for RecordingSink {
    fn display(&mut self, update: &DisplayUpdate) {
        self.displays.push(update.clone());
    }

    fn announce(&mut self, event: &AnnouncementEvent) {
        self.announcements.push(event.clone());
    }

    fn session_stopped(&mut self, summary: &SessionSummary) {
        self.stopped = Some(*summary);
    }
}

fn batch(slots: &[(f32, f32)]) -> RawBatch {
    RawBatch {
        locations: vec![BOX; slots.len()],
        classes: slots.iter().map(|s| s.0).collect(),
        scores: slots.iter().map(|s| s.1).collect(),
        count: slots.len() as f32,
    }
}

fn pipeline(frame_cooldown_ms: u64) -> Result<Pipeline> {
    let mut cfg = NarratorConfig::default();
    cfg.model.class_count = Some(90);
    cfg.cooldowns.frame = Duration::from_millis(frame_cooldown_ms);
    let pipeline = Pipeline::new(&cfg, LabelTable::coco())?;
    pipeline.start_session()?;
    Ok(pipeline)
}

fn at(ms: u64) -> Timestamp {
    Timestamp::from_millis(ms)
}

#[test]
fn background_slot_never_surfaces() -> Result<()> {
    let pipeline = pipeline(1500)?;
    let raw = RawBatch {
        locations: vec![[0.1, 0.1, 0.9, 0.9], [0.0, 0.0, 1.0, 1.0]],
        classes: vec![PERSON, 0.0],
        scores: vec![0.92, 0.99],
        count: 2.0,
    };
    let decoded = pipeline.decoder().decode(&raw);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].label(), "person");
    assert_eq!(decoded[0].confidence(), 0.92);

    let outcome = pipeline.process(&raw, at(0))?.expect("active session");
    assert_eq!(outcome.announcement().unwrap().label, "person");
    Ok(())
}

#[test]
fn repeated_frame_inside_frame_cooldown_is_dropped() -> Result<()> {
    let pipeline = pipeline(1500)?;
    let mut sink = RecordingSink::default();

    let first = pipeline.process_into(&batch(&[(BOTTLE, 0.7)]), at(0), &mut sink)?;
    assert_eq!(first.unwrap().announcement().unwrap().label, "bottle");
    let before = pipeline.summary()?;

    let second = pipeline.process_into(&batch(&[(BOTTLE, 0.7)]), at(500), &mut sink)?;
    assert!(second.unwrap().is_dropped());
    assert_eq!(pipeline.summary()?, before);
    assert_eq!(sink.displays.len(), 1);
    assert_eq!(sink.announcements.len(), 1);
    Ok(())
}

#[test]
fn persistent_object_is_reannounced_after_cooldown() -> Result<()> {
    let pipeline = pipeline(0)?;
    let mut sink = RecordingSink::default();
    for ms in [0, 1000, 2000, 2999, 3000, 4000] {
        pipeline.process_into(&batch(&[(CHAIR, 0.85)]), at(ms), &mut sink)?;
    }
    let times: Vec<u64> = sink.announcements.iter().map(|e| e.at.as_millis()).collect();
    assert_eq!(times, vec![0, 3000]);
    assert_eq!(sink.displays.len(), 6);
    Ok(())
}

#[test]
fn new_object_interrupts_announcement_cooldown() -> Result<()> {
    let pipeline = pipeline(0)?;
    let mut sink = RecordingSink::default();
    pipeline.process_into(&batch(&[(CHAIR, 0.9)]), at(0), &mut sink)?;
    pipeline.process_into(&batch(&[(BOTTLE, 0.9), (CHAIR, 0.8)]), at(1), &mut sink)?;
    pipeline.process_into(&batch(&[(CHAIR, 0.95)]), at(2), &mut sink)?;
    let labels: Vec<&str> = sink.announcements.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["chair", "bottle", "chair"]);
    Ok(())
}

#[test]
fn tied_scores_rank_by_slot() -> Result<()> {
    let pipeline = pipeline(0)?;
    let raw = batch(&[(CHAIR, 0.3), (BOTTLE, 0.75), (CHAIR, 0.2), (PERSON, 0.75)]);
    let ranked = pipeline.rank_batch(&raw);
    let slots: Vec<usize> = ranked.display.iter().map(|d| d.slot()).collect();
    assert_eq!(slots, vec![1, 3]);
    assert_eq!(ranked.top_candidate.unwrap().label(), "bottle");
    Ok(())
}

#[test]
fn display_cap_limits_every_update() -> Result<()> {
    let mut cfg = NarratorConfig::default();
    cfg.display_cap = 2;
    cfg.cooldowns.frame = Duration::ZERO;
    let pipeline = Pipeline::new(&cfg, LabelTable::coco())?;
    pipeline.start_session()?;
    let raw = batch(&[(PERSON, 0.9), (BOTTLE, 0.8), (CHAIR, 0.7), (PERSON, 0.6)]);
    let Some(FrameOutcome::Accepted { display, .. }) = pipeline.process(&raw, at(0))? else {
        panic!("frame should be accepted");
    };
    assert_eq!(display.frame.len(), 2);
    assert_eq!(display.total_accepted, 2);
    assert_eq!(display.unique_labels, 2);
    Ok(())
}

#[test]
fn weak_top_candidate_is_shown_but_not_announced() -> Result<()> {
    let pipeline = pipeline(0)?;
    let outcome = pipeline
        .process(&batch(&[(CHAIR, 0.45)]), at(0))?
        .expect("active session");
    assert!(outcome.announcement().is_none());
    let FrameOutcome::Accepted { display, .. } = outcome else {
        panic!("frame should be accepted");
    };
    assert_eq!(display.frame.entries(), vec![("chair", 0.45)]);
    Ok(())
}

#[test]
fn stop_reports_session_statistics_and_start_resets() -> Result<()> {
    let pipeline = pipeline(0)?;
    let mut sink = RecordingSink::default();
    pipeline.process_into(&batch(&[(PERSON, 0.9), (CHAIR, 0.6)]), at(0), &mut sink)?;
    pipeline.process_into(&batch(&[(PERSON, 0.9)]), at(100), &mut sink)?;

    let summary = pipeline.stop_session()?.expect("summary");
    sink.session_stopped(&summary);
    assert_eq!(
        sink.stopped,
        Some(SessionSummary {
            unique_labels: 2,
            total_accepted: 3
        })
    );
    assert!(pipeline.process(&batch(&[(PERSON, 0.9)]), at(200))?.is_none());

    pipeline.start_session()?;
    let outcome = pipeline
        .process(&batch(&[(PERSON, 0.9)]), at(201))?
        .expect("active session");
    assert_eq!(outcome.announcement().unwrap().label, "person");
    assert_eq!(pipeline.summary()?.unwrap().total_accepted, 1);
    Ok(())
}

#[test]
fn recorded_stream_replays_through_pipeline() -> Result<()> {
    let recording = r#"
{"t_ms": 0, "locations": [[0.1, 0.1, 0.9, 0.9], [0, 0, 1, 1]], "classes": [1, 0], "scores": [0.92, 0.99], "count": 2}
{"t_ms": 500, "locations": [[0.1, 0.1, 0.9, 0.9]], "classes": [1], "scores": [0.92], "count": 1}
{"t_ms": 1500, "locations": [[0.1, 0.1, 0.9, 0.9]], "classes": [44], "scores": [0.7], "count": 1}
{"t_ms": 3000, "locations": [[0.2, 0.2, 0.21, 0.21]], "classes": [44], "scores": [0.9], "count": 1}
"#;
    let pipeline = pipeline(1500)?;
    let mut sink = RecordingSink::default();
    for frame in parse_recording(recording)? {
        pipeline.process_into(&frame.batch, frame.at, &mut sink)?;
    }
    let labels: Vec<&str> = sink.announcements.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["person", "bottle"]);
    assert_eq!(sink.displays.len(), 3);
    assert!(sink.displays[2].frame.is_empty());
    assert_eq!(sink.displays[2].history, vec!["person", "bottle"]);
    Ok(())
}

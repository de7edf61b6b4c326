//! narrator_replay - run a recorded detector stream through the narrator
//!
//! This tool:
//! 1. Loads configuration (NARRATOR_CONFIG + environment, or --config)
//! 2. Loads the label map (or the bundled COCO map)
//! 3. Replays a JSON Lines recording of raw batches in one detection session
//! 4. Prints display updates and speech, then the session summary
//!    (with --json, stdout carries only JSON Lines)
//!
//! Ctrl-C stops the replay early; the session is still closed and summarized.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use detect_narrator::narration::{deliver, session_stopped_text, LogSink, NarrationSink};
use detect_narrator::replay::{frame_json, read_recording, replay_frames, summary_json};
use detect_narrator::{LabelTable, NarratorConfig, Pipeline};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON Lines recording of raw detector batches.
    recording: PathBuf,
    /// Config file (JSON, or TOML by extension). Overrides NARRATOR_CONFIG.
    #[arg(long, env = "NARRATOR_CONFIG")]
    config: Option<PathBuf>,
    /// Label map file. Overrides the configured labels_path.
    #[arg(long)]
    labels: Option<PathBuf>,
    /// Do not speak announcements.
    #[arg(long)]
    mute: bool,
    /// Print JSON Lines: one object per accepted frame, then the summary.
    #[arg(long)]
    json: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::from_args(&args.ui, std::io::stderr().is_terminal());

    let config = {
        let _stage = ui.stage("Load configuration");
        NarratorConfig::load_from(args.config.as_deref())?
    };
    let labels = {
        let _stage = ui.stage("Load label map");
        match args.labels.as_ref().or(config.labels_path.as_ref()) {
            Some(path) => LabelTable::load(path)?,
            None => {
                log::info!("no label map configured, using bundled COCO labels");
                LabelTable::coco()
            }
        }
    };
    let frames = {
        let _stage = ui.stage("Read recording");
        read_recording(&args.recording)?
    };
    if frames.is_empty() {
        return Err(anyhow!(
            "recording {} contains no frames",
            args.recording.display()
        ));
    }

    let pipeline = Pipeline::new(&config, labels)?;
    let mut sink = LogSink::new(config.voice_enabled && !args.mute);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .map_err(|e| anyhow!("failed to set Ctrl-C handler: {}", e))?;
    }

    pipeline.start_session()?;
    if !args.json {
        sink.session_started();
    }

    let progress = ui.frames(frames.len() as u64);
    let mut out = std::io::stdout().lock();
    let stats = replay_frames(&pipeline, &frames, &stop, |frame, outcome| {
        progress.inc(1);
        if args.json {
            if let Some(line) = frame_json(frame, outcome) {
                writeln!(out, "{}", line)?;
            }
        } else {
            deliver(&mut sink, outcome);
        }
        Ok(())
    })?;
    progress.finish_and_clear();

    let summary = pipeline
        .stop_session()?
        .ok_or_else(|| anyhow!("detection session ended unexpectedly"))?;
    if args.json {
        writeln!(out, "{}", summary_json(&summary, &stats))?;
        return Ok(());
    }
    drop(out);
    sink.session_stopped(&summary);
    println!(
        "{} of {} frames processed, {} dropped by cooldown, {} announcements",
        stats.processed, stats.frames, stats.dropped, stats.announced
    );
    println!(
        "{} ({} unique objects)",
        session_stopped_text(&summary),
        summary.unique_labels
    );
    Ok(())
}

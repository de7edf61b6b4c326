use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::detect::{DecoderSettings, RankerSettings};
use crate::stabilize::StabilizerSettings;

const DEFAULT_SLOT_CAPACITY: usize = 10;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.40;
const DEFAULT_ANNOUNCE_THRESHOLD: f32 = 0.50;
const DEFAULT_MIN_BOX_AREA: f32 = 0.01;
const DEFAULT_DISPLAY_CAP: usize = 5;
const DEFAULT_FRAME_COOLDOWN_MS: u64 = 1500;
const DEFAULT_ANNOUNCE_COOLDOWN_MS: u64 = 3000;

#[derive(Debug, Deserialize, Default)]
struct NarratorConfigFile {
    labels_path: Option<PathBuf>,
    model: Option<ModelConfigFile>,
    thresholds: Option<ThresholdConfigFile>,
    display: Option<DisplayConfigFile>,
    cooldown: Option<CooldownConfigFile>,
    narration: Option<NarrationConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    slot_capacity: Option<usize>,
    class_count: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    sensitivity: Option<Sensitivity>,
    confidence: Option<f32>,
    announce: Option<f32>,
    min_box_area: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    cap: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct CooldownConfigFile {
    frame_ms: Option<u64>,
    announce_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct NarrationConfigFile {
    voice_enabled: Option<bool>,
}

/// Detection sensitivity presets. Higher sensitivity narrates less certain objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    Medium,
    High,
}

impl Sensitivity {
    /// `(confidence_threshold, announce_threshold)` for this preset.
    pub fn thresholds(self) -> (f32, f32) {
        match self {
            Sensitivity::Low => (0.50, 0.80),
            Sensitivity::Medium => (0.40, 0.60),
            Sensitivity::High => (0.30, 0.30),
        }
    }
}

impl FromStr for Sensitivity {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Sensitivity::Low),
            "medium" => Ok(Sensitivity::Medium),
            "high" => Ok(Sensitivity::High),
            other => Err(anyhow!(
                "unknown sensitivity '{}' (expected low, medium or high)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NarratorConfig {
    pub labels_path: Option<PathBuf>,
    pub model: ModelSettings,
    pub thresholds: ThresholdSettings,
    pub display_cap: usize,
    pub cooldowns: CooldownSettings,
    pub voice_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSettings {
    pub slot_capacity: usize,
    /// Declared model class count, background excluded. Checked against the label table.
    pub class_count: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSettings {
    pub confidence: f32,
    pub announce: f32,
    pub min_box_area: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooldownSettings {
    pub frame: Duration,
    pub announce: Duration,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            labels_path: None,
            model: ModelSettings {
                slot_capacity: DEFAULT_SLOT_CAPACITY,
                class_count: None,
            },
            thresholds: ThresholdSettings {
                confidence: DEFAULT_CONFIDENCE_THRESHOLD,
                announce: DEFAULT_ANNOUNCE_THRESHOLD,
                min_box_area: DEFAULT_MIN_BOX_AREA,
            },
            display_cap: DEFAULT_DISPLAY_CAP,
            cooldowns: CooldownSettings {
                frame: Duration::from_millis(DEFAULT_FRAME_COOLDOWN_MS),
                announce: Duration::from_millis(DEFAULT_ANNOUNCE_COOLDOWN_MS),
            },
            voice_enabled: true,
        }
    }
}

impl NarratorConfig {
    /// Load from the file named by `NARRATOR_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("NARRATOR_CONFIG").ok();
        match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Self::load_from(Some(Path::new(path))),
            _ => Self::load_from(None),
        }
    }

    /// Same as `load`, with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => NarratorConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        log::info!(
            "thresholds: confidence={:.2} announce={:.2} min_box_area={:.3}; display_cap={}; cooldowns: frame={}ms announce={}ms",
            cfg.thresholds.confidence,
            cfg.thresholds.announce,
            cfg.thresholds.min_box_area,
            cfg.display_cap,
            cfg.cooldowns.frame.as_millis(),
            cfg.cooldowns.announce.as_millis()
        );
        Ok(cfg)
    }

    fn from_file(file: NarratorConfigFile) -> Self {
        let defaults = Self::default();
        let model = ModelSettings {
            slot_capacity: file
                .model
                .as_ref()
                .and_then(|model| model.slot_capacity)
                .unwrap_or(defaults.model.slot_capacity),
            class_count: file.model.as_ref().and_then(|model| model.class_count),
        };
        let thresholds = file.thresholds.unwrap_or_default();
        let (preset_confidence, preset_announce) = thresholds
            .sensitivity
            .map(Sensitivity::thresholds)
            .unwrap_or((
                defaults.thresholds.confidence,
                defaults.thresholds.announce,
            ));
        let thresholds = ThresholdSettings {
            confidence: thresholds.confidence.unwrap_or(preset_confidence),
            announce: thresholds.announce.unwrap_or(preset_announce),
            min_box_area: thresholds
                .min_box_area
                .unwrap_or(defaults.thresholds.min_box_area),
        };
        let cooldowns = CooldownSettings {
            frame: file
                .cooldown
                .as_ref()
                .and_then(|cooldown| cooldown.frame_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.cooldowns.frame),
            announce: file
                .cooldown
                .as_ref()
                .and_then(|cooldown| cooldown.announce_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.cooldowns.announce),
        };
        Self {
            labels_path: file.labels_path,
            model,
            thresholds,
            display_cap: file
                .display
                .and_then(|display| display.cap)
                .unwrap_or(defaults.display_cap),
            cooldowns,
            voice_enabled: file
                .narration
                .and_then(|narration| narration.voice_enabled)
                .unwrap_or(defaults.voice_enabled),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("NARRATOR_LABELS_PATH") {
            if !path.trim().is_empty() {
                self.labels_path = Some(PathBuf::from(path));
            }
        }
        // Preset first so explicit threshold variables win over it.
        if let Some(sensitivity) = env_parse::<Sensitivity>("NARRATOR_SENSITIVITY")? {
            let (confidence, announce) = sensitivity.thresholds();
            self.thresholds.confidence = confidence;
            self.thresholds.announce = announce;
        }
        if let Some(confidence) = env_parse::<f32>("NARRATOR_CONFIDENCE_THRESHOLD")? {
            self.thresholds.confidence = confidence;
        }
        if let Some(announce) = env_parse::<f32>("NARRATOR_ANNOUNCE_THRESHOLD")? {
            self.thresholds.announce = announce;
        }
        if let Some(area) = env_parse::<f32>("NARRATOR_MIN_BOX_AREA")? {
            self.thresholds.min_box_area = area;
        }
        if let Some(cap) = env_parse::<usize>("NARRATOR_DISPLAY_CAP")? {
            self.display_cap = cap;
        }
        if let Some(ms) = env_parse::<u64>("NARRATOR_FRAME_COOLDOWN_MS")? {
            self.cooldowns.frame = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("NARRATOR_ANNOUNCE_COOLDOWN_MS")? {
            self.cooldowns.announce = Duration::from_millis(ms);
        }
        if let Some(voice) = env_parse::<bool>("NARRATOR_VOICE")? {
            self.voice_enabled = voice;
        }
        Ok(())
    }

    /// Reject configurations the pipeline must never start with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        check_unit_range("confidence threshold", t.confidence)?;
        check_unit_range("announce threshold", t.announce)?;
        check_unit_range("min box area", t.min_box_area)?;
        if t.announce < t.confidence {
            return Err(anyhow!(
                "announce threshold {:.2} must not be below confidence threshold {:.2}",
                t.announce,
                t.confidence
            ));
        }
        if self.display_cap == 0 {
            return Err(anyhow!("display cap must be at least 1"));
        }
        if self.model.slot_capacity == 0 {
            return Err(anyhow!("model slot capacity must be at least 1"));
        }
        if self.model.class_count == Some(0) {
            return Err(anyhow!("model class count must be at least 1"));
        }
        Ok(())
    }

    pub fn decoder_settings(&self) -> DecoderSettings {
        DecoderSettings {
            slot_capacity: self.model.slot_capacity,
            confidence_threshold: self.thresholds.confidence,
            min_box_area: self.thresholds.min_box_area,
        }
    }

    pub fn ranker_settings(&self) -> RankerSettings {
        RankerSettings {
            display_cap: self.display_cap,
            announce_threshold: self.thresholds.announce,
        }
    }

    pub fn stabilizer_settings(&self) -> StabilizerSettings {
        StabilizerSettings {
            confidence_threshold: self.thresholds.confidence,
            frame_cooldown: self.cooldowns.frame,
            announce_cooldown: self.cooldowns.announce,
        }
    }
}

fn check_unit_range(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
    }
    Ok(())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} has an invalid value: {}", key, raw)),
        _ => Ok(None),
    }
}

fn read_config_file(path: &Path) -> Result<NarratorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    }
}

//! Class-id to label resolution.
//!
//! A label table is loaded once before any frame is processed. Line index is
//! the model class id; index 0 is background and is never surfaced. Entries
//! that are empty or `???` mark class ids the model never emits.

use anyhow::{anyhow, Result};
use std::path::Path;

/// Placeholder used by label-map files for unassigned class ids.
pub const UNASSIGNED_LABEL: &str = "???";

const COCO_LABELMAP: &str = include_str!("../../assets/coco_labelmap.txt");

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Build a table from label-map lines. Each line is trimmed. Blank lines
    /// at the end of the file are ignored; interior blank lines keep their
    /// index and mark that class id unassigned.
    pub fn from_lines(raw: &str) -> Result<Self> {
        let labels = split_entries(raw);
        if labels.len() < 2 {
            return Err(anyhow!(
                "label table needs a background entry and at least one class, got {} entries",
                labels.len()
            ));
        }
        let table = Self { labels };
        if table.assigned_count() == 0 {
            return Err(anyhow!("label table has no assigned class labels"));
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read label map {}: {}", path.display(), e))?;
        let table = Self::from_lines(&raw)
            .map_err(|e| anyhow!("invalid label map {}: {}", path.display(), e))?;
        log::info!(
            "loaded {} labels ({} assigned) from {}",
            table.len(),
            table.assigned_count(),
            path.display()
        );
        Ok(table)
    }

    /// COCO label map shipped with SSD MobileNet (background + 90 classes).
    pub fn coco() -> Self {
        Self {
            labels: split_entries(COCO_LABELMAP),
        }
    }

    /// Total entries, background included.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of class ids that resolve to a label.
    pub fn assigned_count(&self) -> usize {
        (1..self.labels.len())
            .filter(|&idx| self.resolve(idx as i64).is_some())
            .count()
    }

    /// Resolve a class id. Background, out-of-range and unassigned ids yield `None`.
    pub fn resolve(&self, class_index: i64) -> Option<&str> {
        if class_index <= 0 {
            return None;
        }
        let label = self.labels.get(usize::try_from(class_index).ok()?)?;
        if label.is_empty() || label == UNASSIGNED_LABEL {
            return None;
        }
        Some(label.as_str())
    }

    /// Check the table against the model's declared class count.
    ///
    /// The table must hold exactly one background entry plus one entry per
    /// model class; it is never padded.
    pub fn validate_class_count(&self, class_count: usize) -> Result<()> {
        let expected = class_count
            .checked_add(1)
            .ok_or_else(|| anyhow!("model class count overflows"))?;
        if self.labels.len() != expected {
            return Err(anyhow!(
                "label table has {} entries, model declares {} classes (expected {} with background)",
                self.labels.len(),
                class_count,
                expected
            ));
        }
        Ok(())
    }
}

fn split_entries(raw: &str) -> Vec<String> {
    let mut labels: Vec<String> = raw.lines().map(|line| line.trim().to_string()).collect();
    while matches!(labels.last(), Some(last) if last.is_empty()) {
        labels.pop();
    }
    labels
}

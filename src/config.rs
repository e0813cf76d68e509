//! Session configuration.
//!
//! One [`EditorConfig`] is created per editing session and handed to the
//! pathway, the view and the editor state. Every field has a default, so a
//! JSON file only needs to name the values it overrides:
//!
//! ```json
//! { "complex_margin": 16.0, "undo_depth": 50 }
//! ```

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::model::GroupStyle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Padding around the members of a plain group.
    pub group_margin: f64,
    /// Padding around the members of a complex.
    pub complex_margin: f64,
    /// Maximum number of undoable actions.
    pub undo_depth: usize,
    /// Offset added per paste of the same clipboard content.
    pub paste_offset: f64,
    /// Initial zoom factor of a view (1.0 = 100 %).
    pub zoom: f64,
    /// Pending model events before the queue collapses into a resync.
    pub event_capacity: usize,
    pub snap_to_grid: bool,
    pub grid_size: f64,
    /// Side length of selection handles, in view pixels.
    pub handle_size: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            group_margin: 8.0,
            complex_margin: 12.0,
            undo_depth: 200,
            paste_offset: 20.0,
            zoom: 1.0,
            event_capacity: 4096,
            snap_to_grid: false,
            grid_size: 5.0,
            handle_size: 8.0,
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse editor configuration")
    }

    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid configuration in {}", path))
    }

    /// Margin applied around a group's members.
    pub fn margin_for(&self, style: GroupStyle) -> f64 {
        match style {
            GroupStyle::Complex => self.complex_margin,
            _ => self.group_margin,
        }
    }

    /// Snap a coordinate to the grid if snapping is enabled.
    pub fn snap(&self, value: f64) -> f64 {
        if self.snap_to_grid && self.grid_size > 0.0 {
            (value / self.grid_size).round() * self.grid_size
        } else {
            value
        }
    }
}

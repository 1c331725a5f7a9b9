//! Shared boundary types for the mascot player.
//!
//! This module defines the two data contracts between the layers:
//! - View → Renderer: `ViewSnapshot`, everything needed to paint one moment
//! - Renderer → Player: grids of `Cell`s and `CellChange` diffs

use serde::{Deserialize, Serialize};

use crate::engine::presenter::Slot;
use crate::engine::session::Status;

// ---------------------------------------------------------------------------
// Shared style primitives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    Named(NamedColor),
    Rgb { r: u8, g: u8, b: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg: Option<Color>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub dim: bool,
}

impl Style {
    pub fn is_default(&self) -> bool {
        self.fg.is_none() && self.bg.is_none() && !self.bold && !self.dim
    }
}

// ---------------------------------------------------------------------------
// View → Renderer boundary
// ---------------------------------------------------------------------------

/// One paintable moment of the mascot display.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    /// `None` while idle (nothing requested yet, or disposed).
    pub status: Option<Status>,
    pub slot_a: Option<String>,
    pub slot_b: Option<String>,
    pub active: Slot,
    /// Crossfade progress of the latest swap, `1.0` when settled.
    pub fade_progress: f32,
    pub level: u32,
    pub label: &'static str,
}

impl ViewSnapshot {
    pub fn slot(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::A => self.slot_a.as_deref(),
            Slot::B => self.slot_b.as_deref(),
        }
    }

    pub fn is_fading(&self) -> bool {
        self.fade_progress < 1.0
    }
}

// ---------------------------------------------------------------------------
// Renderer → Player boundary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalContract {
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub ch: char,
    #[serde(default, skip_serializing_if = "Style::is_default")]
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            ch: ' ',
            style: Style::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellChange {
    pub x: u16,
    pub y: u16,
    pub cell: Cell,
}

pub type Grid = Vec<Vec<Cell>>;

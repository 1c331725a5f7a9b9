//! Renderer: the deterministic rasterizer.
//!
//! Takes a `ViewSnapshot` plus access to the loaded frame assets and produces
//! a fixed-size cell grid for the player. Text assets are drawn as-is; any
//! asset that is not UTF-8 text is drawn as a labelled placeholder.
//!
//! The renderer is pure and stateless. Given the same input, it always
//! produces the same output. It knows nothing about timers, generations,
//! or how frames were loaded.

use std::collections::HashMap;

use crate::engine::Engine;
use crate::engine::session::Status;
use crate::types::{Cell, CellChange, Color, Grid, NamedColor, Style, TerminalContract, ViewSnapshot};

/// Shown instead of the animation when frames failed to load.
pub const FALLBACK_GLYPH: &[&str] = &[
    r"      __====-_  _-====__",
    r"   _--^^^#####//      \\#####^^^--_",
    r"  -^##########// (    ) \\##########^-",
    r"        ^^      \\_  _//      ^^",
    r"                  ~~",
];

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// Lookup of loaded frame bytes by URL.
pub trait FrameArt {
    fn frame_bytes(&self, url: &str) -> Option<&[u8]>;
}

impl FrameArt for Engine {
    fn frame_bytes(&self, url: &str) -> Option<&[u8]> {
        self.frame_asset(url)
    }
}

impl FrameArt for HashMap<String, Vec<u8>> {
    fn frame_bytes(&self, url: &str) -> Option<&[u8]> {
        self.get(url).map(Vec::as_slice)
    }
}

fn caption_style() -> Style {
    Style {
        fg: Some(Color::Rgb {
            r: 218,
            g: 165,
            b: 32,
        }),
        bold: true,
        ..Default::default()
    }
}

fn spinner_style() -> Style {
    Style {
        fg: Some(Color::Named(NamedColor::Yellow)),
        ..Default::default()
    }
}

pub struct Renderer;

impl Renderer {
    /// Paint one moment of the display.
    ///
    /// The bottom row holds the level caption; the rest is the sprite area.
    /// `spin` selects the loading spinner phase.
    pub fn render(
        snapshot: &ViewSnapshot,
        art: &dyn FrameArt,
        contract: &TerminalContract,
        spin: usize,
    ) -> Grid {
        let w = contract.width as usize;
        let h = contract.height as usize;
        let mut grid = vec![vec![Cell::default(); w]; h];
        if h == 0 || w == 0 {
            return grid;
        }
        let sprite_rows = h.saturating_sub(1);

        match snapshot.status {
            None => {}
            Some(Status::Loading) => {
                let line = format!("{} loading", SPINNER[spin % SPINNER.len()]);
                draw_block(&mut grid, sprite_rows, &[line.as_str()], &spinner_style());
            }
            Some(Status::Error) => {
                draw_block(&mut grid, sprite_rows, FALLBACK_GLYPH, &Style::default());
            }
            Some(Status::Playing) => {
                if let Some((url, style)) = Self::visible_slot(snapshot) {
                    let text = frame_text(art, url);
                    let lines: Vec<&str> = text.lines().collect();
                    draw_block(&mut grid, sprite_rows, &lines, &style);
                }
            }
        }

        let caption = format!("Level {}", snapshot.level);
        draw_line(&mut grid, h - 1, centered(w, caption.chars().count()), &caption, &caption_style());

        grid
    }

    /// A terminal cell cannot be half transparent, so the fade is drawn as
    /// the outgoing slot for the first half and the incoming slot for the
    /// second half, both dimmed until the fade settles.
    fn visible_slot(snapshot: &ViewSnapshot) -> Option<(&str, Style)> {
        if !snapshot.is_fading() {
            return snapshot.slot(snapshot.active).map(|url| (url, Style::default()));
        }
        let dim = Style {
            dim: true,
            ..Default::default()
        };
        let slot = if snapshot.fade_progress < 0.5 {
            snapshot.active.other()
        } else {
            snapshot.active
        };
        snapshot
            .slot(slot)
            .or_else(|| snapshot.slot(snapshot.active))
            .map(|url| (url, dim))
    }

    /// Compute a cell-level diff between two grids.
    pub fn diff(prev: &[Vec<Cell>], next: &[Vec<Cell>]) -> Vec<CellChange> {
        let mut changes = Vec::new();
        for (y, (prev_row, next_row)) in prev.iter().zip(next.iter()).enumerate() {
            for (x, (prev_cell, next_cell)) in prev_row.iter().zip(next_row.iter()).enumerate() {
                if prev_cell != next_cell {
                    changes.push(CellChange {
                        x: x as u16,
                        y: y as u16,
                        cell: next_cell.clone(),
                    });
                }
            }
        }
        changes
    }
}

/// Frame bytes as text, or a placeholder naming the frame file.
fn frame_text(art: &dyn FrameArt, url: &str) -> String {
    let name = url.rsplit('/').next().unwrap_or(url);
    match art.frame_bytes(url).map(std::str::from_utf8) {
        Some(Ok(text)) => text.replace('\t', "    "),
        Some(Err(_)) => format!("[ frame {name} ]"),
        None => format!("[ missing {name} ]"),
    }
}

fn centered(available: usize, used: usize) -> usize {
    available.saturating_sub(used) / 2
}

/// Draw lines as a block centered in the top `rows` rows.
fn draw_block<S: AsRef<str>>(grid: &mut Grid, rows: usize, lines: &[S], style: &Style) {
    let width = grid.first().map_or(0, Vec::len);
    let block_w = lines
        .iter()
        .map(|l| l.as_ref().chars().count())
        .max()
        .unwrap_or(0);
    let top = centered(rows, lines.len());
    let left = centered(width, block_w);
    for (i, line) in lines.iter().enumerate() {
        let y = top + i;
        if y >= rows {
            break;
        }
        draw_line(grid, y, left, line.as_ref(), style);
    }
}

fn draw_line(grid: &mut Grid, y: usize, x: usize, text: &str, style: &Style) {
    let Some(row) = grid.get_mut(y) else {
        return;
    };
    for (i, ch) in text.chars().enumerate() {
        let Some(cell) = row.get_mut(x + i) else {
            break;
        };
        if ch != ' ' {
            *cell = Cell {
                ch,
                style: style.clone(),
            };
        }
    }
}

//! Player: the terminal host for a `MascotView`.
//!
//! Owns the terminal for the lifetime of `play`, feeds key presses into the
//! view as input changes, and repaints whenever the engine or the crossfade
//! moves. It never decides what frame is shown; it only asks the view for a
//! snapshot and paints the renderer's grid.

use std::cell::Cell as Counter;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{cursor, event, execute, queue, style, terminal};

use crate::config::{matches_binding, KeyBindings, PlayerConfig};
use crate::engine::Engine;
use crate::engine::session::Status;
use crate::menubar::{hint_items, print_menu_item};
use crate::renderer::Renderer;
use crate::types::{Color, Grid, NamedColor, Style, TerminalContract};
use crate::view::{Inputs, MascotView};

/// Rows reserved above the canvas for the menu bar.
const CANVAS_OFFSET: u16 = 1;

/// Repaint cadence while something on screen is moving on its own.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Longest the loop sleeps without input when nothing is scheduled.
const IDLE_POLL: Duration = Duration::from_millis(250);

const SPIN_STEP: Duration = Duration::from_millis(120);

const MIN_WIDTH: u16 = 20;
const MIN_HEIGHT: u16 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NextStage,
    Mood(&'static str),
    Interact,
    LevelUp,
    LevelDown,
    Quit,
}

/// Map a key press to a player action using the configured bindings.
/// Ctrl-c always quits.
pub fn action_for(keys: &KeyBindings, event: &KeyEvent) -> Option<Action> {
    if event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }
    let table = [
        (&keys.quit, Action::Quit),
        (&keys.next_stage, Action::NextStage),
        (&keys.idle, Action::Mood("idle")),
        (&keys.happy, Action::Mood("happy")),
        (&keys.sad, Action::Mood("sad")),
        (&keys.dead, Action::Mood("dead")),
        (&keys.interact, Action::Interact),
        (&keys.level_up, Action::LevelUp),
        (&keys.level_down, Action::LevelDown),
    ];
    table
        .into_iter()
        .find(|(binding, _)| matches_binding(binding, event))
        .map(|(_, action)| action)
}

pub struct Player {
    view: MascotView,
    keys: KeyBindings,
    stages: Vec<String>,
    inputs: Inputs,
    pokes: Rc<Counter<u32>>,
    contract: TerminalContract,
    grid: Option<Grid>,
    started: Instant,
}

impl Player {
    pub fn new(engine: Engine, config: &PlayerConfig, inputs: Inputs) -> Self {
        let stages = engine.table().stage_names().map(str::to_string).collect();
        let pokes = Rc::new(Counter::new(0));
        let counter = Rc::clone(&pokes);
        let view = MascotView::new(engine).with_on_interact(move || {
            counter.set(counter.get() + 1);
            log::info!("poked {} time(s)", counter.get());
        });
        Self {
            view,
            keys: config.key_bindings.clone(),
            stages,
            inputs,
            pokes,
            contract: TerminalContract {
                width: MIN_WIDTH,
                height: MIN_HEIGHT,
            },
            grid: None,
            started: Instant::now(),
        }
    }

    /// Play the mascot in the terminal.
    ///
    /// Sets up the terminal, enters the event loop, and restores the terminal
    /// on exit (even on error).
    pub fn play(&mut self) -> Result<()> {
        let (term_w, term_h) = terminal::size()?;
        // +2: one row for menu bar, one row for status bar
        if term_w < MIN_WIDTH || term_h < MIN_HEIGHT + 2 {
            bail!(
                "Terminal too small: need {}x{}, have {}x{}",
                MIN_WIDTH,
                MIN_HEIGHT + 2,
                term_w,
                term_h,
            );
        }
        self.fit(term_w, term_h);

        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(
            stdout,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            terminal::Clear(terminal::ClearType::All),
        )?;

        let result = self.run_loop(&mut stdout);

        // Always restore terminal state.
        let _ = execute!(stdout, cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();

        self.view.dispose();
        result
    }

    fn fit(&mut self, term_w: u16, term_h: u16) {
        self.contract = TerminalContract {
            width: term_w.max(MIN_WIDTH),
            height: term_h.saturating_sub(2).max(MIN_HEIGHT),
        };
        self.grid = None;
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    fn run_loop(&mut self, stdout: &mut io::Stdout) -> Result<()> {
        self.view.set_inputs(self.inputs.clone());
        self.render_menubar(stdout)?;

        loop {
            let now = Instant::now();
            let wake = self.view.pump(now);
            self.paint(stdout, now)?;

            if !event::poll(self.poll_timeout(wake, now))? {
                continue;
            }
            match event::read()? {
                event::Event::Key(key) if key.kind != KeyEventKind::Release => {
                    let Some(action) = action_for(&self.keys, &key) else {
                        continue;
                    };
                    if action == Action::Quit {
                        break;
                    }
                    self.apply(action);
                }
                event::Event::Resize(w, h) => {
                    self.fit(w, h);
                    queue!(stdout, terminal::Clear(terminal::ClearType::All))?;
                    self.render_menubar(stdout)?;
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn poll_timeout(&self, wake: Option<Instant>, now: Instant) -> Duration {
        let snapshot = self.view.snapshot(now);
        if snapshot.is_fading() || snapshot.status == Some(Status::Loading) {
            return FRAME_INTERVAL;
        }
        wake.map_or(IDLE_POLL, |at| at.saturating_duration_since(now))
            .min(IDLE_POLL)
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::NextStage => {
                let next = self
                    .stages
                    .iter()
                    .position(|s| *s == self.inputs.stage)
                    .map_or(0, |i| (i + 1) % self.stages.len().max(1));
                if let Some(stage) = self.stages.get(next) {
                    self.inputs.stage = stage.clone();
                }
            }
            Action::Mood(mood) => self.inputs.mood = mood.to_string(),
            Action::Interact => {
                if self.view.interact() {
                    self.inputs.mood = "happy".to_string();
                }
            }
            Action::LevelUp => self.inputs.level = self.inputs.level.saturating_add(1),
            Action::LevelDown => self.inputs.level = self.inputs.level.saturating_sub(1).max(1),
            Action::Quit => return,
        }
        self.view.set_inputs(self.inputs.clone());
    }

    // -----------------------------------------------------------------------
    // Terminal output
    // -----------------------------------------------------------------------

    fn paint(&mut self, stdout: &mut io::Stdout, now: Instant) -> Result<()> {
        let spin = (now.saturating_duration_since(self.started).as_millis()
            / SPIN_STEP.as_millis()) as usize;
        let snapshot = self.view.snapshot(now);
        let next = Renderer::render(&snapshot, self.view.engine(), &self.contract, spin);

        match self.grid.as_ref() {
            Some(prev) => {
                for change in Renderer::diff(prev, &next) {
                    let cs = to_content_style(&change.cell.style);
                    queue!(
                        stdout,
                        cursor::MoveTo(change.x, change.y + CANVAS_OFFSET),
                        style::PrintStyledContent(style::StyledContent::new(cs, change.cell.ch)),
                    )?;
                }
            }
            None => render_full(stdout, &next)?,
        }
        self.grid = Some(next);
        self.render_status(stdout, snapshot.status)?;
        stdout.flush()?;
        Ok(())
    }

    fn render_menubar(&self, stdout: &mut io::Stdout) -> Result<()> {
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::Print(" "),
        )?;
        for (i, item) in hint_items(&self.keys).iter().enumerate() {
            if i > 0 {
                queue!(stdout, style::Print("  "))?;
            }
            print_menu_item(stdout, item)?;
        }
        stdout.flush()?;
        Ok(())
    }

    fn render_status(&self, stdout: &mut io::Stdout, status: Option<Status>) -> Result<()> {
        let status_y = self.contract.height + CANVAS_OFFSET;
        let (_, term_h) = terminal::size()?;
        if status_y >= term_h {
            return Ok(()); // No room for status bar.
        }

        let frame = self
            .view
            .engine()
            .session()
            .and_then(|s| s.sequence_cursor())
            .map_or_else(|| "-".to_string(), |c| (c + 1).to_string());
        let line = format!(
            " {}/{} | {} | step {} | pokes {} | {} ",
            self.inputs.stage,
            self.inputs.mood,
            status.map_or("idle", Status::label),
            frame,
            self.pokes.get(),
            self.view.accessibility_label(),
        );

        let mut cs = style::ContentStyle::default();
        cs.attributes.set(style::Attribute::Dim);

        queue!(
            stdout,
            cursor::MoveTo(0, status_y),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::PrintStyledContent(style::StyledContent::new(cs, line)),
        )?;
        Ok(())
    }
}

fn render_full(stdout: &mut io::Stdout, grid: &Grid) -> Result<()> {
    for (y, row) in grid.iter().enumerate() {
        queue!(stdout, cursor::MoveTo(0, y as u16 + CANVAS_OFFSET))?;
        for cell in row {
            let cs = to_content_style(&cell.style);
            queue!(
                stdout,
                style::PrintStyledContent(style::StyledContent::new(cs, cell.ch))
            )?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Style conversion
// ---------------------------------------------------------------------------

pub fn to_content_style(s: &Style) -> style::ContentStyle {
    let mut cs = style::ContentStyle::default();
    if let Some(fg) = &s.fg {
        cs.foreground_color = Some(to_ct_color(fg));
    }
    if let Some(bg) = &s.bg {
        cs.background_color = Some(to_ct_color(bg));
    }
    if s.bold {
        cs.attributes.set(style::Attribute::Bold);
    }
    if s.dim {
        cs.attributes.set(style::Attribute::Dim);
    }
    cs
}

pub fn to_ct_color(c: &Color) -> style::Color {
    match c {
        Color::Named(n) => match n {
            NamedColor::Black => style::Color::Black,
            NamedColor::Red => style::Color::Red,
            NamedColor::Green => style::Color::Green,
            NamedColor::Yellow => style::Color::Yellow,
            NamedColor::Blue => style::Color::Blue,
            NamedColor::Magenta => style::Color::Magenta,
            NamedColor::Cyan => style::Color::Cyan,
            NamedColor::White => style::Color::White,
        },
        Color::Rgb { r, g, b } => style::Color::Rgb {
            r: *r,
            g: *g,
            b: *b,
        },
    }
}

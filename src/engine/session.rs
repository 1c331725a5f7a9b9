//! The record of one authoritative (stage, mood) request.

use super::guard::Generation;
use super::program::FrameProgram;
use super::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Loading,
    Playing,
    Error,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Loading => "loading",
            Status::Playing => "playing",
            Status::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub(super) generation: Generation,
    pub(super) stage: String,
    pub(super) mood: String,
    pub(super) program: FrameProgram,
    pub(super) frame_urls: Vec<String>,
    pub(super) status: Status,
    pub(super) scheduler: Option<Scheduler>,
}

impl PlaybackSession {
    pub(super) fn new(
        generation: Generation,
        stage: &str,
        mood: &str,
        program: FrameProgram,
        frame_urls: Vec<String>,
    ) -> Self {
        Self {
            generation,
            stage: stage.to_string(),
            mood: mood.to_string(),
            program,
            frame_urls,
            status: Status::Loading,
            scheduler: None,
        }
    }

    /// Whether this session already serves the requested keys.
    pub fn is_for(&self, stage: &str, mood: &str) -> bool {
        self.stage == stage && self.mood == mood
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Stage as requested by the host.
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Mood as requested by the host.
    pub fn mood(&self) -> &str {
        &self.mood
    }

    pub fn program(&self) -> &FrameProgram {
        &self.program
    }

    pub fn frame_urls(&self) -> &[String] {
        &self.frame_urls
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Sequence position the next tick will show; `None` for static or
    /// not-yet-playing sessions.
    pub fn sequence_cursor(&self) -> Option<usize> {
        self.scheduler.as_ref().map(Scheduler::cursor)
    }
}

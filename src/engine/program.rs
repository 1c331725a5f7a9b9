//! Frame programs and the (stage, mood) program table.
//!
//! A `FrameProgram` is pure timing data: how many frame images exist, how long
//! each one is held, and the cyclic order they are played in. The table is
//! validated once when it is built or loaded and is read-only afterwards.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mood substituted when a stage has no entry for the requested mood.
pub const DEFAULT_MOOD: &str = "idle";

/// Stage substituted by the built-in table when the requested stage is unknown.
pub const DEFAULT_STAGE: &str = "baby";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("program has no frames")]
    NoFrames,
    #[error("expected {expected} frame durations, found {found}")]
    DurationCount { expected: usize, found: usize },
    #[error("frame {frame} has a zero duration")]
    ZeroDuration { frame: u32 },
    #[error("play sequence is empty")]
    EmptySequence,
    #[error("sequence position {position} refers to frame {frame}, but only {total} frames exist")]
    FrameOutOfRange { position: usize, frame: u32, total: u32 },
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("invalid program {stage}/{mood}: {source}")]
    InvalidProgram {
        stage: String,
        mood: String,
        #[source]
        source: ProgramError,
    },
    #[error("default program {stage}/{mood} is missing")]
    MissingDefault { stage: String, mood: String },
    #[error("malformed program table: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// FrameProgram
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameProgram {
    /// Number of distinct frame images, numbered `1..=total_frames`.
    pub total_frames: u32,
    /// Hold time in milliseconds, indexed by frame number minus one.
    pub frame_durations: Vec<u32>,
    /// Cyclic play order of 1-based frame numbers. Empty in a table document
    /// means "every frame once, in order".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sequence: Vec<u32>,
}

impl FrameProgram {
    pub fn new(total_frames: u32, frame_durations: Vec<u32>, sequence: Vec<u32>) -> Self {
        Self {
            total_frames,
            frame_durations,
            sequence,
        }
    }

    /// A program that plays every frame once in order, then loops.
    pub fn linear(frame_durations: Vec<u32>) -> Self {
        let total = frame_durations.len() as u32;
        Self::new(total, frame_durations, (1..=total).collect())
    }

    /// Whether playback needs a timer at all. Single-frame programs are static.
    pub fn is_animated(&self) -> bool {
        self.total_frames > 1
    }

    /// Hold duration for a 1-based frame number, if the program defines one.
    pub fn hold_for(&self, frame: u32) -> Option<Duration> {
        let index = (frame as usize).checked_sub(1)?;
        self.frame_durations
            .get(index)
            .map(|&ms| Duration::from_millis(u64::from(ms)))
    }

    /// Time one pass over the sequence takes.
    pub fn cycle_duration(&self) -> Duration {
        self.sequence
            .iter()
            .filter_map(|&frame| self.hold_for(frame))
            .sum()
    }

    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.total_frames == 0 {
            return Err(ProgramError::NoFrames);
        }
        let expected = self.total_frames as usize;
        if self.frame_durations.len() != expected {
            return Err(ProgramError::DurationCount {
                expected,
                found: self.frame_durations.len(),
            });
        }
        if let Some(i) = self.frame_durations.iter().position(|&d| d == 0) {
            return Err(ProgramError::ZeroDuration {
                frame: i as u32 + 1,
            });
        }
        if self.sequence.is_empty() {
            return Err(ProgramError::EmptySequence);
        }
        for (position, &frame) in self.sequence.iter().enumerate() {
            if frame == 0 || frame > self.total_frames {
                return Err(ProgramError::FrameOutOfRange {
                    position,
                    frame,
                    total: self.total_frames,
                });
            }
        }
        Ok(())
    }

    fn fill_default_sequence(&mut self) {
        if self.sequence.is_empty() {
            self.sequence = (1..=self.total_frames).collect();
        }
    }
}

// ---------------------------------------------------------------------------
// ProgramTable
// ---------------------------------------------------------------------------

pub type StagePrograms = BTreeMap<String, FrameProgram>;

/// On-disk shape of a program table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableDocument {
    default_stage: String,
    #[serde(default = "default_mood")]
    default_mood: String,
    stages: BTreeMap<String, StagePrograms>,
}

fn default_mood() -> String {
    DEFAULT_MOOD.into()
}

/// Read-only (stage, mood) → program lookup.
///
/// Every table that exists has passed validation, so the default pair is
/// always present and every program's sequence stays within its frames.
#[derive(Debug, Clone)]
pub struct ProgramTable {
    default_stage: String,
    default_mood: String,
    stages: BTreeMap<String, StagePrograms>,
}

impl ProgramTable {
    pub fn new(
        default_stage: impl Into<String>,
        default_mood: impl Into<String>,
        stages: BTreeMap<String, StagePrograms>,
    ) -> Result<Self, TableError> {
        let mut table = Self {
            default_stage: default_stage.into(),
            default_mood: default_mood.into(),
            stages,
        };
        for programs in table.stages.values_mut() {
            for program in programs.values_mut() {
                program.fill_default_sequence();
            }
        }
        table.validate()?;
        Ok(table)
    }

    pub fn from_json(json: &str) -> Result<Self, TableError> {
        let doc: TableDocument = serde_json::from_str(json)?;
        Self::new(doc.default_stage, doc.default_mood, doc.stages)
    }

    pub fn to_json(&self) -> Result<String, TableError> {
        let doc = TableDocument {
            default_stage: self.default_stage.clone(),
            default_mood: self.default_mood.clone(),
            stages: self.stages.clone(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    pub fn validate(&self) -> Result<(), TableError> {
        for (stage, programs) in &self.stages {
            for (mood, program) in programs {
                program
                    .validate()
                    .map_err(|source| TableError::InvalidProgram {
                        stage: stage.clone(),
                        mood: mood.clone(),
                        source,
                    })?;
            }
        }
        if self.get(&self.default_stage, &self.default_mood).is_none() {
            return Err(TableError::MissingDefault {
                stage: self.default_stage.clone(),
                mood: self.default_mood.clone(),
            });
        }
        Ok(())
    }

    pub fn default_stage(&self) -> &str {
        &self.default_stage
    }

    pub fn default_mood(&self) -> &str {
        &self.default_mood
    }

    pub fn stage(&self, stage: &str) -> Option<&StagePrograms> {
        self.stages.get(stage)
    }

    /// Like `stage`, but also hands back the table's own key.
    pub fn stage_entry(&self, stage: &str) -> Option<(&str, &StagePrograms)> {
        self.stages
            .get_key_value(stage)
            .map(|(key, programs)| (key.as_str(), programs))
    }

    pub fn get(&self, stage: &str, mood: &str) -> Option<&FrameProgram> {
        self.stages.get(stage)?.get(mood)
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    pub fn program_count(&self) -> usize {
        self.stages.values().map(BTreeMap::len).sum()
    }

    /// The dragon programs shipped with the player.
    pub fn builtin() -> Self {
        let mut stages = BTreeMap::new();

        let baby = programs([
            ("idle", FrameProgram::new(4, vec![3000, 300, 2000, 300], vec![1, 2, 3, 4, 3, 4, 3, 4, 3, 4, 3, 2])),
            ("happy", FrameProgram::new(4, vec![3000, 300, 1000, 1000], vec![1, 2, 3, 4, 3, 4, 3, 4, 2])),
            ("sad", FrameProgram::new(4, vec![3000, 500, 500, 1000], vec![1, 2, 3, 4, 2, 3, 4, 2, 3, 4])),
            ("dead", FrameProgram::new(1, vec![1000], vec![1])),
        ]);
        let teen = programs([
            ("idle", FrameProgram::new(4, vec![3000, 300, 2000, 300], vec![1, 2, 3, 4, 3, 4, 3, 4, 3, 4, 3, 2])),
            ("happy", FrameProgram::new(4, vec![3000, 300, 1000, 1000], vec![1, 2, 3, 4, 3, 4, 3, 4, 2])),
            ("sad", FrameProgram::new(4, vec![3000, 500, 500, 2000], vec![1, 2, 3, 4, 2, 3, 4, 2, 3, 4])),
            ("dead", FrameProgram::new(1, vec![1000], vec![1])),
        ]);
        let adult = programs([
            ("idle", FrameProgram::new(3, vec![3000, 6000, 500], vec![1, 2, 3, 2, 3, 2, 3, 2, 3])),
            ("happy", FrameProgram::new(3, vec![3000, 300, 3000], vec![1, 2, 3, 2, 1])),
            (
                "sad",
                FrameProgram::new(
                    7,
                    vec![3000, 300, 300, 300, 300, 1500, 1500],
                    vec![1, 2, 3, 4, 5, 6, 7, 6, 7, 6, 7, 6, 5, 4],
                ),
            ),
            ("dead", FrameProgram::new(1, vec![1000], vec![1])),
        ]);

        stages.insert("baby".to_string(), baby);
        stages.insert("teen".to_string(), teen);
        stages.insert("adult".to_string(), adult);

        Self {
            default_stage: DEFAULT_STAGE.into(),
            default_mood: DEFAULT_MOOD.into(),
            stages,
        }
    }
}

impl Default for ProgramTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn programs<const N: usize>(entries: [(&str, FrameProgram); N]) -> StagePrograms {
    entries
        .into_iter()
        .map(|(mood, program)| (mood.to_string(), program))
        .collect()
}

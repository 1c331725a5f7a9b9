//! MascotView: the host-facing display component.
//!
//! Owns one `Engine`, remembers the host's inputs, and turns engine state
//! into a `ViewSnapshot` for whatever paints it. `level` is display-only and
//! never restarts playback; only a change of stage or mood does.

use std::time::Instant;

use crate::engine::Engine;
use crate::engine::guard::Generation;
use crate::engine::presenter::Slot;
use crate::types::ViewSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inputs {
    pub stage: String,
    pub mood: String,
    pub level: u32,
}

impl Inputs {
    pub fn new(stage: impl Into<String>, mood: impl Into<String>, level: u32) -> Self {
        Self {
            stage: stage.into(),
            mood: mood.into(),
            level,
        }
    }
}

impl Default for Inputs {
    fn default() -> Self {
        Self::new("adult", "idle", 1)
    }
}

pub struct MascotView {
    engine: Engine,
    inputs: Option<Inputs>,
    on_interact: Option<Box<dyn FnMut()>>,
}

impl MascotView {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            inputs: None,
            on_interact: None,
        }
    }

    pub fn with_on_interact(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_interact = Some(Box::new(callback));
        self
    }

    /// Apply new host inputs. Returns the new generation when stage or mood
    /// changed and a fresh animation request was issued.
    pub fn set_inputs(&mut self, inputs: Inputs) -> Option<Generation> {
        let generation = self.engine.request(&inputs.stage, &inputs.mood);
        self.inputs = Some(inputs);
        generation
    }

    pub fn set_level(&mut self, level: u32) {
        if let Some(inputs) = self.inputs.as_mut() {
            inputs.level = level;
        }
    }

    pub fn inputs(&self) -> Option<&Inputs> {
        self.inputs.as_ref()
    }

    pub fn pump(&mut self, now: Instant) -> Option<Instant> {
        self.engine.pump(now)
    }

    /// Invoke the host's activation callback. Returns false when the view
    /// is not interactive.
    pub fn interact(&mut self) -> bool {
        match self.on_interact.as_mut() {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.on_interact.is_some()
    }

    pub fn accessibility_label(&self) -> &'static str {
        if self.is_interactive() {
            "Dragon, activate to interact"
        } else {
            "Dragon display"
        }
    }

    pub fn snapshot(&self, now: Instant) -> ViewSnapshot {
        let presenter = self.engine.presenter();
        ViewSnapshot {
            status: self.engine.status(),
            slot_a: presenter.slot(Slot::A).map(str::to_string),
            slot_b: presenter.slot(Slot::B).map(str::to_string),
            active: presenter.active(),
            fade_progress: self.engine.fade_progress(now),
            level: self.inputs.as_ref().map_or(0, |i| i.level),
            label: self.accessibility_label(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn dispose(&mut self) {
        self.engine.dispose();
    }
}

impl Drop for MascotView {
    fn drop(&mut self) {
        self.engine.dispose();
    }
}

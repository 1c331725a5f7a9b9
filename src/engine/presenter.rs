//! Two-slot presenter for flicker-free crossfades.
//!
//! A new frame is always written into the hidden slot before the slots swap,
//! so the slot fading out still holds the previous image for the whole fade.

use std::time::Duration;

/// Visual fade between slots. Independent of how long a frame is held.
pub const DEFAULT_CROSSFADE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Slot {
    #[default]
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presenter {
    slot_a: Option<String>,
    slot_b: Option<String>,
    active: Slot,
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the first frame of a fresh session in both slots, slot A active,
    /// so the first paint does not fade in from an empty image.
    pub fn reset(&mut self, first_frame: &str) {
        self.slot_a = Some(first_frame.to_string());
        self.slot_b = Some(first_frame.to_string());
        self.active = Slot::A;
    }

    pub fn clear(&mut self) {
        self.slot_a = None;
        self.slot_b = None;
        self.active = Slot::A;
    }

    /// Write `url` into the hidden slot, then make that slot the active one.
    pub fn show_frame(&mut self, url: &str) {
        let target = self.active.other();
        *self.slot_mut(target) = Some(url.to_string());
        self.active = target;
    }

    pub fn slot(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::A => self.slot_a.as_deref(),
            Slot::B => self.slot_b.as_deref(),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<String> {
        match slot {
            Slot::A => &mut self.slot_a,
            Slot::B => &mut self.slot_b,
        }
    }

    pub fn active(&self) -> Slot {
        self.active
    }

    /// URL of the frame currently at full opacity (once the fade settles).
    pub fn visible(&self) -> Option<&str> {
        self.slot(self.active)
    }

    /// Opacity of `slot` given how far the current crossfade has progressed
    /// (`0.0` just after a swap, `1.0` once settled).
    pub fn slot_opacity(&self, slot: Slot, fade_progress: f32) -> f32 {
        let t = fade_progress.clamp(0.0, 1.0);
        if slot == self.active { t } else { 1.0 - t }
    }
}

/// Crossfade progress after `elapsed` time since the last swap.
pub fn fade_progress(elapsed: Duration, crossfade: Duration) -> f32 {
    if crossfade.is_zero() {
        return 1.0;
    }
    (elapsed.as_nanos() as f64 / crossfade.as_nanos() as f64).min(1.0) as f32
}

//! Playback scheduler: walks a program's sequence forever.
//!
//! The scheduler never waits on its own. Each `tick` shows one frame and
//! returns how long to wait before the next one; the engine turns that into
//! a timer owned by the scheduler's generation.

use std::time::Duration;

use super::guard::Generation;
use super::presenter::Presenter;
use super::program::FrameProgram;

/// Hold used when a program has no duration for the frame being shown.
pub const FALLBACK_HOLD: Duration = Duration::from_millis(500);

/// Delay before retrying after a sequence entry names a missing frame.
pub const SKIP_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// `frame` is now visible and should stay so for `hold`.
    Shown {
        frame: u32,
        url: String,
        hold: Duration,
    },
    /// The sequence entry was out of range; nothing was shown.
    Skipped { frame: u32, retry_in: Duration },
}

impl Tick {
    /// Time until the next tick is due.
    pub fn delay(&self) -> Duration {
        match self {
            Tick::Shown { hold, .. } => *hold,
            Tick::Skipped { retry_in, .. } => *retry_in,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    generation: Generation,
    cursor: usize,
    fallback_hold: Duration,
    skip_delay: Duration,
}

impl Scheduler {
    /// A scheduler for `program`, or `None` when the program is a single
    /// static frame and needs no timer at all.
    pub fn start(generation: Generation, program: &FrameProgram) -> Option<Self> {
        if !program.is_animated() || program.sequence.is_empty() {
            return None;
        }
        Some(Self {
            generation,
            cursor: 0,
            fallback_hold: FALLBACK_HOLD,
            skip_delay: SKIP_DELAY,
        })
    }

    pub fn with_fallbacks(mut self, fallback_hold: Duration, skip_delay: Duration) -> Self {
        self.fallback_hold = fallback_hold;
        self.skip_delay = skip_delay;
        self
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Position in the sequence of the frame the next tick will show.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn tick(
        &mut self,
        program: &FrameProgram,
        frame_urls: &[String],
        presenter: &mut Presenter,
    ) -> Tick {
        let len = program.sequence.len();
        let frame = program.sequence[self.cursor % len];
        self.cursor = (self.cursor + 1) % len;

        let url = (frame as usize)
            .checked_sub(1)
            .and_then(|index| frame_urls.get(index));
        let Some(url) = url else {
            log::warn!(
                "{}: sequence names frame {frame} but only {} frame(s) exist, skipping",
                self.generation,
                frame_urls.len()
            );
            return Tick::Skipped {
                frame,
                retry_in: self.skip_delay,
            };
        };

        presenter.show_frame(url);
        let hold = program.hold_for(frame).unwrap_or(self.fallback_hold);
        log::debug!(
            "{}: frame {frame}/{} for {}ms",
            self.generation,
            program.total_frames,
            hold.as_millis()
        );

        Tick::Shown {
            frame,
            url: url.clone(),
            hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::guard::GenerationGuard;
    use crate::engine::presenter::Slot;
    use crate::engine::timer::TimerQueue;

    fn generation() -> Generation {
        GenerationGuard::new().begin_session(&mut TimerQueue::new())
    }

    fn urls(n: u32) -> Vec<String> {
        (1..=n).map(|i| format!("f{i:02}")).collect()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn plays_the_sequence_with_per_frame_holds() {
        let program = FrameProgram::new(3, vec![100, 50, 75], vec![1, 2, 3, 2, 1]);
        let urls = urls(3);
        let mut presenter = Presenter::new();
        presenter.reset(&urls[0]);
        let mut scheduler = Scheduler::start(generation(), &program).unwrap();

        let mut shown = Vec::new();
        for _ in 0..7 {
            match scheduler.tick(&program, &urls, &mut presenter) {
                Tick::Shown { frame, hold, url } => {
                    assert_eq!(presenter.visible(), Some(url.as_str()));
                    shown.push((frame, hold));
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        assert_eq!(
            shown,
            vec![
                (1, ms(100)),
                (2, ms(50)),
                (3, ms(75)),
                (2, ms(50)),
                (1, ms(100)),
                (1, ms(100)),
                (2, ms(50)),
            ]
        );
    }

    #[test]
    fn single_frame_programs_need_no_scheduler() {
        let program = FrameProgram::new(1, vec![1000], vec![1]);
        assert!(Scheduler::start(generation(), &program).is_none());
    }

    #[test]
    fn out_of_range_entries_are_skipped_and_playback_continues() {
        let program = FrameProgram::new(2, vec![100, 200], vec![1, 9, 2]);
        let urls = urls(2);
        let mut presenter = Presenter::new();
        presenter.reset(&urls[0]);
        let mut scheduler = Scheduler::start(generation(), &program).unwrap();

        assert!(matches!(
            scheduler.tick(&program, &urls, &mut presenter),
            Tick::Shown { frame: 1, .. }
        ));
        let active = presenter.active();

        let skipped = scheduler.tick(&program, &urls, &mut presenter);
        assert_eq!(
            skipped,
            Tick::Skipped {
                frame: 9,
                retry_in: SKIP_DELAY
            }
        );
        assert_eq!(presenter.active(), active);
        assert_eq!(scheduler.cursor(), 2);

        let next = scheduler.tick(&program, &urls, &mut presenter);
        assert_eq!(next.delay(), ms(200));
        assert_eq!(presenter.visible(), Some("f02"));
        assert_eq!(scheduler.cursor(), 0);
    }

    #[test]
    fn frame_zero_is_treated_as_out_of_range() {
        let program = FrameProgram::new(2, vec![100, 200], vec![0, 2]);
        let urls = urls(2);
        let mut presenter = Presenter::new();
        let mut scheduler = Scheduler::start(generation(), &program).unwrap();
        assert!(matches!(
            scheduler.tick(&program, &urls, &mut presenter),
            Tick::Skipped { frame: 0, .. }
        ));
        assert_eq!(presenter.slot(Slot::A), None);
        assert_eq!(presenter.slot(Slot::B), None);
    }

    #[test]
    fn missing_durations_fall_back() {
        let program = FrameProgram::new(3, vec![100], vec![1, 3]);
        let urls = urls(3);
        let mut presenter = Presenter::new();
        let mut scheduler = Scheduler::start(generation(), &program)
            .unwrap()
            .with_fallbacks(ms(250), ms(40));
        assert_eq!(scheduler.tick(&program, &urls, &mut presenter).delay(), ms(100));
        assert_eq!(scheduler.tick(&program, &urls, &mut presenter).delay(), ms(250));
    }
}

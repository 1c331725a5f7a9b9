//! Engine: the sprite playback pipeline.
//!
//! Resolves a (stage, mood) request to a frame program, preloads every frame
//! under a fresh generation, then drives the two-slot presenter from the
//! scheduler's ticks. The engine is single-threaded and cooperative: the host
//! calls `pump` with the current time and sleeps until the deadline it
//! returns. Only the frame loads run elsewhere, and their results are applied
//! here after the generation check.
//!
//! The engine never paints and never knows about terminals.

pub mod guard;
pub mod preload;
pub mod presenter;
pub mod program;
pub mod resolver;
pub mod scheduler;
pub mod session;
pub mod timer;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use guard::{Generation, GenerationGuard};
use preload::{AssetLoader, AssetScheme, Preload, PreloadOutcome};
use presenter::Presenter;
use program::ProgramTable;
use scheduler::{Scheduler, Tick};
use session::{PlaybackSession, Status};
use timer::{Timer, TimerQueue};

/// How often the host should come back while frames are still loading.
pub const PRELOAD_POLL_INTERVAL: Duration = Duration::from_millis(25);

// A zero hold would make a tick due again immediately.
const MIN_TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Length of the visual fade between slots.
    pub crossfade: Duration,
    /// Pause between a successful preload and the first tick.
    pub start_delay: Duration,
    /// Hold for frames the program gives no duration for.
    pub fallback_hold: Duration,
    /// Retry delay after a sequence entry names a missing frame.
    pub skip_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            crossfade: presenter::DEFAULT_CROSSFADE,
            start_delay: Duration::from_millis(100),
            fallback_hold: scheduler::FALLBACK_HOLD,
            skip_delay: scheduler::SKIP_DELAY,
        }
    }
}

pub struct Engine {
    table: Arc<ProgramTable>,
    loader: Arc<dyn AssetLoader>,
    scheme: AssetScheme,
    timing: Timing,
    guard: GenerationGuard,
    timers: TimerQueue,
    in_flight: Vec<Preload>,
    session: Option<PlaybackSession>,
    presenter: Presenter,
    assets: HashMap<String, Vec<u8>>,
    last_swap: Option<Instant>,
    last_tick: Option<Tick>,
}

impl Engine {
    pub fn new(table: Arc<ProgramTable>, loader: Arc<dyn AssetLoader>) -> Self {
        Self {
            table,
            loader,
            scheme: AssetScheme::default(),
            timing: Timing::default(),
            guard: GenerationGuard::new(),
            timers: TimerQueue::new(),
            in_flight: Vec::new(),
            session: None,
            presenter: Presenter::new(),
            assets: HashMap::new(),
            last_swap: None,
            last_tick: None,
        }
    }

    pub fn with_scheme(mut self, scheme: AssetScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Ask for the animation of (stage, mood).
    ///
    /// Repeating the keys of the live session is a no-op. Anything else
    /// retires the current generation and starts loading a new one; the new
    /// generation is returned. A disposed engine ignores requests.
    pub fn request(&mut self, stage: &str, mood: &str) -> Option<Generation> {
        if self.guard.is_disposed() {
            log::debug!("ignoring request for {stage}/{mood} after dispose");
            return None;
        }
        if self.session.as_ref().is_some_and(|s| s.is_for(stage, mood)) {
            return None;
        }

        let generation = self.guard.begin_session(&mut self.timers);
        let resolved = resolver::resolve_entry(&self.table, stage, mood);
        let program = resolved.program.clone();
        // Assets come from the requested folder even when the program fell back.
        let frame_urls = self.scheme.frame_urls(stage, mood, program.total_frames);

        log::info!(
            "{generation}: {stage}/{mood} -> {}/{} ({} frame(s))",
            resolved.stage,
            resolved.mood,
            program.total_frames
        );

        self.presenter.clear();
        self.assets.clear();
        self.last_swap = None;
        self.last_tick = None;
        // Older preloads can only produce discarded results.
        self.in_flight.clear();
        self.in_flight.push(Preload::start(
            generation,
            Arc::clone(&self.loader),
            frame_urls.clone(),
        ));
        self.session = Some(PlaybackSession::new(
            generation, stage, mood, program, frame_urls,
        ));

        Some(generation)
    }

    /// Tear the display down. Nothing started before this call can touch
    /// the engine afterwards.
    pub fn dispose(&mut self) {
        if self.guard.is_disposed() {
            return;
        }
        self.guard.dispose(&mut self.timers);
        log::info!("display disposed at {}", self.guard.current());
        self.in_flight.clear();
        self.session = None;
        self.presenter.clear();
        self.assets.clear();
        self.last_swap = None;
        self.last_tick = None;
    }

    // -----------------------------------------------------------------------
    // Cooperative driving
    // -----------------------------------------------------------------------

    /// Apply settled preloads and fire every timer due at `now`.
    ///
    /// Returns when the host should call again, or `None` if nothing is
    /// pending (a static frame, an error, or an idle engine).
    pub fn pump(&mut self, now: Instant) -> Option<Instant> {
        self.collect_preloads(now);
        while let Some(timer) = self.timers.pop_due(now) {
            self.fire(timer, now);
        }
        self.next_wake(now)
    }

    fn next_wake(&self, now: Instant) -> Option<Instant> {
        let timer = self.timers.next_deadline();
        if self.in_flight.is_empty() {
            return timer;
        }
        let poll = now + PRELOAD_POLL_INTERVAL;
        Some(timer.map_or(poll, |t| t.min(poll)))
    }

    fn collect_preloads(&mut self, now: Instant) {
        let mut settled = Vec::new();
        self.in_flight.retain_mut(|preload| match preload.poll() {
            Some(outcome) => {
                settled.push((preload.generation(), outcome));
                false
            }
            None => true,
        });
        for (generation, outcome) in settled {
            self.complete_preload(generation, outcome, now);
        }
    }

    fn complete_preload(&mut self, generation: Generation, outcome: PreloadOutcome, now: Instant) {
        if !self.guard.is_current(generation) {
            log::debug!("{generation}: dropping stale preload result");
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.generation != generation {
            return;
        }

        let frames = match outcome {
            PreloadOutcome::Success { frames } if !frames.is_empty() => frames,
            PreloadOutcome::Success { .. } => {
                log::warn!("{generation}: program has no frames to show");
                session.status = Status::Error;
                return;
            }
            PreloadOutcome::Failure { .. } => {
                session.status = Status::Error;
                return;
            }
        };

        self.assets = frames.into_iter().map(|f| (f.url, f.bytes)).collect();
        self.presenter.reset(&session.frame_urls[0]);
        self.last_swap = None;
        session.status = Status::Playing;
        session.scheduler = Scheduler::start(generation, &session.program)
            .map(|s| s.with_fallbacks(self.timing.fallback_hold, self.timing.skip_delay));

        if session.scheduler.is_some() {
            self.timers
                .schedule(generation, now + self.timing.start_delay.max(MIN_TICK));
        } else {
            log::debug!("{generation}: static frame, no timer");
        }
    }

    fn fire(&mut self, timer: Timer, now: Instant) {
        let generation = timer.generation;
        if !self.guard.is_current(generation) {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.generation != generation || session.status != Status::Playing {
            return;
        }
        let Some(scheduler) = session.scheduler.as_mut() else {
            return;
        };

        let tick = scheduler.tick(&session.program, &session.frame_urls, &mut self.presenter);
        if matches!(tick, Tick::Shown { .. }) {
            self.last_swap = Some(now);
        }
        let delay = tick.delay().max(MIN_TICK);
        self.last_tick = Some(tick);

        if self.guard.is_current(generation) {
            self.timers.schedule(generation, now + delay);
        }
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// `None` before the first request and after disposal.
    pub fn status(&self) -> Option<Status> {
        self.session.as_ref().map(PlaybackSession::status)
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    /// Bytes of a frame loaded for the live session.
    pub fn frame_asset(&self, url: &str) -> Option<&[u8]> {
        self.assets.get(url).map(Vec::as_slice)
    }

    /// Crossfade progress of the latest swap at `now`; settled is `1.0`.
    pub fn fade_progress(&self, now: Instant) -> f32 {
        match self.last_swap {
            Some(at) => presenter::fade_progress(
                now.saturating_duration_since(at),
                self.timing.crossfade,
            ),
            None => 1.0,
        }
    }

    /// The most recent scheduler tick of the live session.
    pub fn last_tick(&self) -> Option<&Tick> {
        self.last_tick.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.guard.current()
    }

    pub fn is_disposed(&self) -> bool {
        self.guard.is_disposed()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn preloads_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn table(&self) -> &ProgramTable {
        &self.table
    }

    pub fn scheme(&self) -> &AssetScheme {
        &self.scheme
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    use crossbeam_channel::{Receiver, Sender};

    use super::preload::LoadError;
    use super::presenter::Slot;
    use super::program::FrameProgram;
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Loads every URL except the ones listed as broken.
    #[derive(Default)]
    struct StubLoader {
        broken: HashSet<String>,
    }

    impl AssetLoader for StubLoader {
        fn load(&self, url: &str) -> Result<Vec<u8>, LoadError> {
            if self.broken.contains(url) {
                return Err(LoadError::NotFound {
                    url: url.to_string(),
                });
            }
            Ok(url.as_bytes().to_vec())
        }
    }

    /// Loads of a given stage block until the test opens that stage's gate.
    struct GatedLoader {
        gates: Mutex<HashMap<String, Receiver<()>>>,
    }

    impl GatedLoader {
        fn new(stages: &[&str]) -> (Self, HashMap<String, Sender<()>>) {
            let mut gates = HashMap::new();
            let mut keys = HashMap::new();
            for stage in stages {
                let (tx, rx) = crossbeam_channel::unbounded();
                gates.insert(stage.to_string(), rx);
                keys.insert(stage.to_string(), tx);
            }
            (
                Self {
                    gates: Mutex::new(gates),
                },
                keys,
            )
        }
    }

    impl AssetLoader for GatedLoader {
        fn load(&self, url: &str) -> Result<Vec<u8>, LoadError> {
            let stage = url.split('/').nth(2).unwrap_or_default().to_string();
            let gate = self.gates.lock().unwrap().get(&stage).cloned();
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
            Ok(url.as_bytes().to_vec())
        }
    }

    fn table_with(program: FrameProgram) -> Arc<ProgramTable> {
        let mut stages = BTreeMap::new();
        stages.insert(
            "egg".to_string(),
            BTreeMap::from([
                ("idle".to_string(), program),
                ("dead".to_string(), FrameProgram::new(1, vec![1000], vec![1])),
            ]),
        );
        Arc::new(ProgramTable::new("egg", "idle", stages).unwrap())
    }

    /// Pump until the live session leaves `Loading`.
    fn settle(engine: &mut Engine, now: Instant) {
        for _ in 0..400 {
            engine.pump(now);
            if engine.status() != Some(Status::Loading) {
                return;
            }
            std::thread::sleep(ms(5));
        }
        panic!("preload never settled");
    }

    fn shown_frame(engine: &Engine) -> Option<(u32, Duration)> {
        match engine.last_tick() {
            Some(Tick::Shown { frame, hold, .. }) => Some((*frame, *hold)),
            _ => None,
        }
    }

    #[test]
    fn plays_the_program_sequence_on_timers() {
        let table = table_with(FrameProgram::new(3, vec![100, 50, 75], vec![1, 2, 3, 2, 1]));
        let mut engine = Engine::new(table, Arc::new(StubLoader::default()));
        let t0 = Instant::now();

        assert_eq!(engine.status(), None);
        engine.request("egg", "idle").unwrap();
        assert_eq!(engine.status(), Some(Status::Loading));
        settle(&mut engine, t0);

        assert_eq!(engine.status(), Some(Status::Playing));
        let first = "/dragons/egg/idle/01.png";
        assert_eq!(engine.presenter().slot(Slot::A), Some(first));
        assert_eq!(engine.presenter().slot(Slot::B), Some(first));
        assert_eq!(engine.presenter().active(), Slot::A);
        assert_eq!(engine.frame_asset(first), Some(first.as_bytes()));

        let mut now = t0 + engine.timing().start_delay;
        let mut seen = Vec::new();
        for _ in 0..6 {
            let next = engine.pump(now).unwrap();
            seen.push(shown_frame(&engine).unwrap());
            now = next;
        }
        assert_eq!(
            seen,
            vec![
                (1, ms(100)),
                (2, ms(50)),
                (3, ms(75)),
                (2, ms(50)),
                (1, ms(100)),
                (1, ms(100)),
            ]
        );
    }

    #[test]
    fn single_frame_program_schedules_nothing() {
        let table = table_with(FrameProgram::linear(vec![100, 100]));
        let mut engine = Engine::new(table, Arc::new(StubLoader::default()));
        engine.request("egg", "dead");
        settle(&mut engine, Instant::now());

        assert_eq!(engine.status(), Some(Status::Playing));
        assert_eq!(engine.pending_timers(), 0);
        assert_eq!(engine.pump(Instant::now()), None);
        assert_eq!(engine.presenter().visible(), Some("/dragons/egg/dead/01.png"));
    }

    #[test]
    fn any_failed_frame_is_an_error_and_nothing_plays() {
        let table = table_with(FrameProgram::linear(vec![100, 100, 100]));
        let loader = StubLoader {
            broken: HashSet::from(["/dragons/egg/idle/02.png".to_string()]),
        };
        let mut engine = Engine::new(table, Arc::new(loader));
        engine.request("egg", "idle");
        settle(&mut engine, Instant::now());

        assert_eq!(engine.status(), Some(Status::Error));
        assert_eq!(engine.pending_timers(), 0);
        assert_eq!(engine.presenter().visible(), None);
        assert!(engine.frame_asset("/dragons/egg/idle/01.png").is_none());
    }

    #[test]
    fn repeating_the_live_request_is_a_no_op() {
        let table = table_with(FrameProgram::linear(vec![100, 100]));
        let mut engine = Engine::new(table, Arc::new(StubLoader::default()));
        let g = engine.request("egg", "idle").unwrap();
        assert_eq!(engine.request("egg", "idle"), None);
        assert_eq!(engine.generation(), g);
        assert_eq!(engine.preloads_in_flight(), 1);
    }

    #[test]
    fn unknown_keys_play_the_default_program_from_the_requested_folder() {
        let table = table_with(FrameProgram::linear(vec![100, 100]));
        let mut engine = Engine::new(table, Arc::new(StubLoader::default()));
        engine.request("Wyrm", "grumpy");
        let session = engine.session().unwrap();
        assert_eq!(session.stage(), "Wyrm");
        assert_eq!(session.program().total_frames, 2);
        assert_eq!(
            session.frame_urls(),
            ["/dragons/wyrm/grumpy/01.png", "/dragons/wyrm/grumpy/02.png"]
        );
    }

    #[test]
    fn stale_preload_completion_is_ignored() {
        let mut stages = BTreeMap::new();
        for stage in ["old", "new"] {
            stages.insert(
                stage.to_string(),
                BTreeMap::from([("idle".to_string(), FrameProgram::linear(vec![100, 100]))]),
            );
        }
        let table = Arc::new(ProgramTable::new("old", "idle", stages).unwrap());
        let (loader, gates) = GatedLoader::new(&["old", "new"]);
        let mut engine = Engine::new(table, Arc::new(loader));
        let t0 = Instant::now();

        let g1 = engine.request("old", "idle").unwrap();
        let g2 = engine.request("new", "idle").unwrap();
        assert!(g2 > g1);

        // G1 settles after G2 has begun.
        assert_eq!(engine.preloads_in_flight(), 1);
        for _ in 0..2 {
            gates["old"].send(()).unwrap();
        }
        std::thread::sleep(ms(20));
        engine.pump(t0);
        assert_eq!(engine.preloads_in_flight(), 1);
        assert_eq!(engine.status(), Some(Status::Loading));
        assert_eq!(engine.presenter().visible(), None);
        assert_eq!(engine.pending_timers(), 0);
        assert!(engine.frame_asset("/dragons/old/idle/01.png").is_none());

        for _ in 0..2 {
            gates["new"].send(()).unwrap();
        }
        settle(&mut engine, t0);
        assert_eq!(engine.status(), Some(Status::Playing));
        assert_eq!(engine.presenter().visible(), Some("/dragons/new/idle/01.png"));
        assert_eq!(engine.session().unwrap().generation(), g2);
    }

    #[test]
    fn hung_preloads_are_dropped_when_superseded() {
        let mut stages = BTreeMap::new();
        for stage in ["old", "new"] {
            stages.insert(
                stage.to_string(),
                BTreeMap::from([("idle".to_string(), FrameProgram::linear(vec![100, 100]))]),
            );
        }
        let table = Arc::new(ProgramTable::new("old", "idle", stages).unwrap());
        // The "old" gate is never opened, so those loads never settle.
        let (loader, _gates) = GatedLoader::new(&["old"]);
        let mut engine = Engine::new(table, Arc::new(loader));
        let t0 = Instant::now();

        for _ in 0..10 {
            engine.request("old", "idle").unwrap();
            assert_eq!(engine.preloads_in_flight(), 1);
            engine.request("new", "idle").unwrap();
            assert_eq!(engine.preloads_in_flight(), 1);
        }
        engine.request("old", "idle").unwrap();
        engine.request("new", "idle").unwrap();
        assert_eq!(engine.preloads_in_flight(), 1);

        settle(&mut engine, t0);
        assert_eq!(engine.status(), Some(Status::Playing));
        assert_eq!(engine.preloads_in_flight(), 0);
        assert_eq!(engine.pump(t0), Some(t0 + engine.timing().start_delay));
    }

    #[test]
    fn changing_inputs_stops_the_old_timer_chain() {
        let table = table_with(FrameProgram::linear(vec![100, 100]));
        let mut engine = Engine::new(table, Arc::new(StubLoader::default()));
        let t0 = Instant::now();
        engine.request("egg", "idle");
        settle(&mut engine, t0);
        assert_eq!(engine.pending_timers(), 1);

        engine.request("egg", "dead");
        assert_eq!(engine.pending_timers(), 0);
        assert_eq!(engine.status(), Some(Status::Loading));
        assert_eq!(engine.presenter().visible(), None);
    }

    #[test]
    fn dispose_suppresses_everything_in_flight() {
        let table = table_with(FrameProgram::linear(vec![100, 100]));
        let (loader, gates) = GatedLoader::new(&["egg"]);
        let mut engine = Engine::new(table, Arc::new(loader));
        let t0 = Instant::now();

        engine.request("egg", "idle");
        engine.dispose();
        for _ in 0..2 {
            let _ = gates["egg"].send(());
        }
        std::thread::sleep(ms(20));

        assert_eq!(engine.pump(t0), None);
        assert_eq!(engine.status(), None);
        assert!(engine.is_disposed());
        assert_eq!(engine.request("egg", "happy"), None);
        assert_eq!(engine.presenter().visible(), None);
    }

    #[test]
    fn crossfade_progress_follows_the_last_swap() {
        let table = table_with(FrameProgram::linear(vec![400, 400]));
        let mut engine = Engine::new(table, Arc::new(StubLoader::default()));
        let t0 = Instant::now();
        engine.request("egg", "idle");
        settle(&mut engine, t0);
        assert_eq!(engine.fade_progress(t0), 1.0);

        let first_tick = t0 + engine.timing().start_delay;
        engine.pump(first_tick);
        assert_eq!(engine.fade_progress(first_tick), 0.0);
        assert_eq!(engine.fade_progress(first_tick + ms(50)), 0.5);
        assert_eq!(engine.fade_progress(first_tick + ms(300)), 1.0);
    }

    #[test]
    fn loading_asks_to_be_polled_again_soon() {
        let table = table_with(FrameProgram::linear(vec![100, 100]));
        let (loader, _gates) = GatedLoader::new(&["egg"]);
        let mut engine = Engine::new(table, Arc::new(loader));
        let t0 = Instant::now();
        engine.request("egg", "idle");
        assert_eq!(engine.pump(t0), Some(t0 + PRELOAD_POLL_INTERVAL));
    }
}

//! Frame clock with pause-safe elapsed time.
//!
//! The clock never reads the system time itself; the host's frame scheduler
//! passes a monotonic `Instant` into [`Clock::frame`], which keeps the
//! arithmetic deterministic in tests and pins the implementation to a
//! monotonic source. Elapsed time accumulates only while running: on resume
//! the origin is re-anchored to "now minus previously accumulated seconds",
//! so paused wall time never leaks into `time`.

use std::time::{Duration, Instant};

/// Snapshot of the clock, passed by value to every callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockState {
    /// Seconds accumulated while running.
    pub time: f64,
    /// Seconds between the last two ticks.
    pub delta: f64,
    /// Ticks since the last reset.
    pub frame: u64,
    pub running: bool,
    /// Exponentially smoothed ticks-per-second estimate.
    pub fps: f64,
}

impl ClockState {
    fn zeroed() -> Self {
        Self {
            time: 0.0,
            delta: 0.0,
            frame: 0,
            running: false,
            fps: 0.0,
        }
    }
}

type TickFn = Box<dyn FnMut(ClockState)>;

/// Scheduling primitive driving the render loop.
pub struct Clock {
    state: ClockState,
    /// Wall-clock instant that maps to `time == 0`, while running.
    origin: Option<Instant>,
    /// Instant of the last accepted tick, for the max-FPS gate.
    last_tick: Option<Instant>,
    /// Most recent instant the clock saw, for re-anchoring on `set_time`.
    last_now: Option<Instant>,
    max_fps: f32,
    callback: Option<TickFn>,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            state: ClockState::zeroed(),
            origin: None,
            last_tick: None,
            last_now: None,
            max_fps: 0.0,
            callback: None,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Starts (or resumes) the clock. Idempotent: calling while running does
    /// nothing. On a fresh clock the origin is `now`; on resume it is `now`
    /// shifted back by the already-accumulated seconds, so the next tick
    /// carries on from where `stop` left the time.
    pub fn start(&mut self, now: Instant, callback: impl FnMut(ClockState) + 'static) {
        if self.state.running {
            return;
        }
        self.callback = Some(Box::new(callback));
        self.origin = Some(if self.state.frame == 0 {
            now
        } else {
            anchor_for(now, self.state.time)
        });
        self.last_tick = None;
        self.last_now = Some(now);
        self.state.running = true;
    }

    /// Cancels the pending tick. `time`, `delta`, and `frame` survive.
    pub fn stop(&mut self) {
        self.state.running = false;
        self.origin = None;
        self.last_tick = None;
    }

    /// Stops and zeroes every counter.
    pub fn reset(&mut self) {
        self.stop();
        self.state = ClockState::zeroed();
        self.last_now = None;
    }

    /// Writes `time` directly, for scrubbing. While running, the origin is
    /// re-anchored so subsequent ticks continue from the written time.
    pub fn set_time(&mut self, time: f64) {
        self.state.time = time;
        if self.state.running {
            if let Some(last) = self.last_now {
                self.origin = Some(anchor_for(last, time));
            }
        }
    }

    /// Caps the tick rate; `0` means unlimited.
    pub fn set_max_fps(&mut self, fps: f32) {
        self.max_fps = fps.max(0.0);
    }

    pub fn max_fps(&self) -> f32 {
        self.max_fps
    }

    /// One scheduled tick from the host's frame loop. Returns whether the
    /// tick was accepted; a tick arriving sooner than the max-FPS gate
    /// allows is skipped without touching any state.
    pub fn frame(&mut self, now: Instant) -> bool {
        if !self.state.running {
            return false;
        }
        if let (Some(last), true) = (self.last_tick, self.max_fps > 0.0) {
            let min_gap = Duration::from_secs_f64(1.0 / f64::from(self.max_fps));
            if now.saturating_duration_since(last) < min_gap {
                return false;
            }
        }
        let Some(origin) = self.origin else {
            return false;
        };

        let elapsed = now.saturating_duration_since(origin).as_secs_f64();
        let delta = (elapsed - self.state.time).max(0.0);
        self.state.time = elapsed;
        self.advance(delta);
        self.last_tick = Some(now);
        self.last_now = Some(now);
        self.emit();
        true
    }

    /// Manual single step for deterministic rendering: advances `time` by
    /// `dt` regardless of wall time and fires the callback.
    pub fn tick(&mut self, dt: f64) {
        self.state.time += dt;
        self.advance(dt);
        self.emit();
    }

    fn advance(&mut self, delta: f64) {
        self.state.delta = delta;
        self.state.frame += 1;
        if delta > 0.0 {
            self.state.fps = 0.95 * self.state.fps + 0.05 * (1.0 / delta);
        }
    }

    fn emit(&mut self) {
        let snapshot = self.state;
        if let Some(callback) = self.callback.as_mut() {
            callback(snapshot);
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// The instant that maps accumulated `time` onto `now`.
fn anchor_for(now: Instant, time: f64) -> Instant {
    now.checked_sub(Duration::from_secs_f64(time.max(0.0)))
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn frames_accumulate_elapsed_time() {
        let t0 = Instant::now();
        let mut clock = Clock::new();
        clock.start(t0, |_| {});

        assert!(clock.frame(t0 + secs(1)));
        let state = clock.state();
        assert!((state.time - 1.0).abs() < 1e-9);
        assert!((state.delta - 1.0).abs() < 1e-9);
        assert_eq!(state.frame, 1);

        assert!(clock.frame(t0 + secs(3)));
        let state = clock.state();
        assert!((state.time - 3.0).abs() < 1e-9);
        assert!((state.delta - 2.0).abs() < 1e-9);
        assert_eq!(state.frame, 2);
    }

    #[test]
    fn paused_interval_is_not_counted() {
        let t0 = Instant::now();
        let mut clock = Clock::new();
        clock.start(t0, |_| {});
        clock.frame(t0 + secs(2));
        clock.stop();

        let state = clock.state();
        assert!((state.time - 2.0).abs() < 1e-9);
        assert_eq!(state.frame, 1);

        // Ten wall seconds pass while stopped, then the clock resumes.
        let t_resume = t0 + secs(12);
        clock.start(t_resume, |_| {});
        clock.frame(t_resume + secs(1));

        let state = clock.state();
        assert!((state.time - 3.0).abs() < 1e-9, "time = {}", state.time);
        assert_eq!(state.frame, 2);
    }

    #[test]
    fn resume_then_manual_tick_extends_pre_stop_time() {
        let t0 = Instant::now();
        let mut clock = Clock::new();
        clock.start(t0, |_| {});
        clock.frame(t0 + secs(2));
        clock.stop();

        clock.start(t0 + secs(60), |_| {});
        clock.tick(0.5);

        let state = clock.state();
        assert!((state.time - 2.5).abs() < 1e-9);
        assert!((state.delta - 0.5).abs() < 1e-9);
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let t0 = Instant::now();
        let calls = Rc::new(RefCell::new(0u32));
        let mut clock = Clock::new();

        let first = Rc::clone(&calls);
        clock.start(t0, move |_| *first.borrow_mut() += 1);
        let second = Rc::new(RefCell::new(0u32));
        let second_handle = Rc::clone(&second);
        clock.start(t0 + secs(1), move |_| *second_handle.borrow_mut() += 1);

        clock.frame(t0 + secs(2));
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(*second.borrow(), 0);
    }

    #[test]
    fn stopped_clock_ignores_frames() {
        let t0 = Instant::now();
        let mut clock = Clock::new();
        clock.start(t0, |_| {});
        clock.stop();
        assert!(!clock.frame(t0 + secs(1)));
        assert_eq!(clock.state().frame, 0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let t0 = Instant::now();
        let mut clock = Clock::new();
        clock.start(t0, |_| {});
        clock.frame(t0 + secs(5));
        clock.reset();

        let state = clock.state();
        assert_eq!(state.time, 0.0);
        assert_eq!(state.delta, 0.0);
        assert_eq!(state.frame, 0);
        assert!(!state.running);
        assert_eq!(state.fps, 0.0);
    }

    #[test]
    fn max_fps_gate_skips_fast_ticks() {
        let t0 = Instant::now();
        let mut clock = Clock::new();
        clock.set_max_fps(10.0); // 100ms minimum gap
        clock.start(t0, |_| {});

        assert!(clock.frame(t0 + millis(100)));
        assert!(!clock.frame(t0 + millis(150)));
        assert!(clock.frame(t0 + millis(220)));
        assert_eq!(clock.state().frame, 2);
    }

    #[test]
    fn zero_max_fps_means_unlimited() {
        let t0 = Instant::now();
        let mut clock = Clock::new();
        clock.set_max_fps(0.0);
        clock.start(t0, |_| {});
        assert!(clock.frame(t0 + millis(1)));
        assert!(clock.frame(t0 + millis(2)));
    }

    #[test]
    fn set_time_scrubs_and_reanchors() {
        let t0 = Instant::now();
        let mut clock = Clock::new();
        clock.start(t0, |_| {});
        clock.frame(t0 + secs(1));

        clock.set_time(10.0);
        clock.frame(t0 + secs(3));
        let state = clock.state();
        // Two wall seconds after the frame that anchored the scrub.
        assert!((state.time - 12.0).abs() < 1e-9, "time = {}", state.time);
    }

    #[test]
    fn callbacks_receive_value_snapshots() {
        let t0 = Instant::now();
        let seen: Rc<RefCell<Vec<ClockState>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut clock = Clock::new();
        clock.start(t0, move |state| sink.borrow_mut().push(state));

        clock.frame(t0 + secs(1));
        clock.frame(t0 + secs(2));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].frame, 1);
        assert_eq!(seen[1].frame, 2);
        assert!(seen[0].time < seen[1].time);
    }

    #[test]
    fn fps_smoothing_converges_toward_tick_rate() {
        let mut clock = Clock::new();
        for _ in 0..400 {
            clock.tick(0.02); // 50 ticks per second
        }
        let fps = clock.state().fps;
        assert!((fps - 50.0).abs() < 1.0, "fps = {fps}");
    }
}

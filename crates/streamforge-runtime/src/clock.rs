//! Clock arbitration: a registry of clocks, one designated master, and the
//! default wall-clock-backed implementation used when nothing better is
//! registered.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use streamforge_core::clock::ClockType;

/// A source of playback position. Audio/video sinks implement this in
/// addition to their sink role; see `streamforge-elements`.
pub trait MediaClock: Send + Sync {
    fn position(&self) -> f64;
    fn clock_type(&self) -> ClockType;
}

/// Holds the set of registered clocks and exposes whichever has the
/// highest-ranked `ClockType` as the master.
pub struct MediaController {
    clocks: Mutex<Vec<Arc<dyn MediaClock>>>,
}

impl MediaController {
    pub fn new() -> Arc<MediaController> {
        Arc::new(MediaController {
            clocks: Mutex::new(Vec::new()),
        })
    }

    pub fn add_clock(&self, clock: Arc<dyn MediaClock>) {
        self.clocks.lock().push(clock);
    }

    pub fn remove_clock(&self, clock: &Arc<dyn MediaClock>) {
        self.clocks.lock().retain(|c| !Arc::ptr_eq(c, clock));
    }

    /// The registered clock with the highest-ranked type, or `None` if no
    /// clock is registered.
    pub fn master_clock(&self) -> Option<Arc<dyn MediaClock>> {
        self.clocks
            .lock()
            .iter()
            .max_by_key(|c| c.clock_type())
            .cloned()
    }
}

impl Default for MediaController {
    fn default() -> Self {
        MediaController {
            clocks: Mutex::new(Vec::new()),
        }
    }
}

enum ClockState {
    Running { anchor: Instant },
    Paused { position_secs: f64 },
}

/// Default wall-clock-backed clock, used when no media-derived clock
/// (audio/video sink) is registered yet.
pub struct ExternalClock {
    state: Mutex<ClockState>,
}

impl ExternalClock {
    pub fn new() -> Arc<ExternalClock> {
        Arc::new(ExternalClock {
            state: Mutex::new(ClockState::Paused { position_secs: 0.0 }),
        })
    }

    pub fn start(&self) {
        let current = self.position();
        *self.state.lock() = ClockState::Running {
            anchor: Instant::now() - std::time::Duration::from_secs_f64(current.max(0.0)),
        };
    }

    pub fn pause(&self) {
        let current = self.position();
        *self.state.lock() = ClockState::Paused { position_secs: current };
    }

    pub fn set_position(&self, position_secs: f64) {
        let mut state = self.state.lock();
        *state = match &*state {
            ClockState::Running { .. } => ClockState::Running {
                anchor: Instant::now() - std::time::Duration::from_secs_f64(position_secs.max(0.0)),
            },
            ClockState::Paused { .. } => ClockState::Paused { position_secs },
        };
    }
}

impl MediaClock for ExternalClock {
    fn position(&self) -> f64 {
        match &*self.state.lock() {
            ClockState::Running { anchor } => anchor.elapsed().as_secs_f64(),
            ClockState::Paused { position_secs } => *position_secs,
        }
    }

    fn clock_type(&self) -> ClockType {
        ClockType::External
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn external_clock_is_monotonic_while_running() {
        let clock = ExternalClock::new();
        clock.start();
        sleep(Duration::from_millis(50));
        let pos = clock.position();
        assert!(pos >= 0.04 && pos <= 0.5, "position was {pos}");
    }

    #[test]
    fn pause_freezes_position() {
        let clock = ExternalClock::new();
        clock.start();
        sleep(Duration::from_millis(20));
        clock.pause();
        let frozen = clock.position();
        sleep(Duration::from_millis(20));
        assert_eq!(clock.position(), frozen);
    }

    struct FakeClock(ClockType);
    impl MediaClock for FakeClock {
        fn position(&self) -> f64 {
            0.0
        }
        fn clock_type(&self) -> ClockType {
            self.0
        }
    }

    #[test]
    fn master_is_highest_ranked_type() {
        let controller = MediaController::new();
        controller.add_clock(Arc::new(FakeClock(ClockType::Subtitle)));
        controller.add_clock(Arc::new(FakeClock(ClockType::Video)));
        controller.add_clock(Arc::new(FakeClock(ClockType::External)));
        assert_eq!(controller.master_clock().unwrap().clock_type(), ClockType::Video);

        controller.add_clock(Arc::new(FakeClock(ClockType::Audio)));
        assert_eq!(controller.master_clock().unwrap().clock_type(), ClockType::Audio);
    }
}

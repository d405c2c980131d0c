use chrono::{DateTime, Local, TimeZone};
use std::thread;
use std::time::{Duration, Instant};

/// Time source for the control loops.
///
/// `tick` is called once at the end of every loop iteration; a real clock
/// paces the loop there, a simulated one just advances.
pub trait Clock {
    /// Time since the loop started.
    fn elapsed(&self) -> Duration;

    fn tick(&mut self);

    /// Wall-clock time stamped onto recorded frames.
    fn now_local(&self) -> DateTime<Local>;
}

/// Paces iterations at a fixed rate against the monotonic clock.
pub struct RealtimeClock {
    started: Instant,
    period: Duration,
    ticks: u32,
}

impl RealtimeClock {
    pub fn new(fps: u32) -> Self {
        Self {
            started: Instant::now(),
            period: Duration::from_secs(1) / fps.max(1),
            ticks: 0,
        }
    }
}

impl Clock for RealtimeClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
        let next = self.started + self.period * self.ticks;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else if now - next > self.period * 4 {
            // fell far behind; restart the schedule instead of bursting
            log::debug!("loop overran its schedule by {:?}", now - next);
            self.started = now - self.period * self.ticks;
        }
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Deterministic clock: each tick is exactly one frame period.
pub struct SimulatedClock {
    fps: u32,
    ticks: u64,
    epoch: DateTime<Local>,
}

impl SimulatedClock {
    pub fn new(fps: u32) -> Self {
        let epoch = Local
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .earliest()
            .unwrap_or_else(Local::now);
        Self {
            fps: fps.max(1),
            ticks: 0,
            epoch,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Clock for SimulatedClock {
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.ticks * 1_000_000_000 / self.fps as u64)
    }

    fn tick(&mut self) {
        self.ticks += 1;
    }

    fn now_local(&self) -> DateTime<Local> {
        let elapsed = chrono::Duration::from_std(self.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        self.epoch + elapsed
    }
}

//! Wall-clock lap timer for the run log.

use std::time::{Duration, Instant};

use tracing::info;

#[derive(Debug)]
pub struct Timer {
    label: &'static str,
    started: Instant,
    lap_started: Instant,
    laps: u64,
}

impl Timer {
    pub fn start(label: &'static str) -> Self {
        let now = Instant::now();
        Self {
            label,
            started: now,
            lap_started: now,
            laps: 0,
        }
    }

    /// Log the time since the previous lap and start a new one.
    pub fn record_lap(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now - self.lap_started;
        self.lap_started = now;
        self.laps += 1;
        info!(
            timer = self.label,
            lap = self.laps,
            elapsed_ms = lap.as_millis() as u64,
            "lap"
        );
        lap
    }

    pub fn laps(&self) -> u64 {
        self.laps
    }

    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }
}

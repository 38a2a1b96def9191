//! Phase hook wiring the simulation to the watchdog and the phase histogram.

use std::time::Instant;

use trail_protocol::{Phase, PhaseHook};

use crate::metrics::SimulatorMetrics;
use crate::watchdog::Watchdog;

pub struct RunHook<'a> {
    watchdog: &'a Watchdog,
    metrics: &'a SimulatorMetrics,
    started: Option<(Phase, Instant)>,
}

impl<'a> RunHook<'a> {
    pub fn new(watchdog: &'a Watchdog, metrics: &'a SimulatorMetrics) -> Self {
        Self {
            watchdog,
            metrics,
            started: None,
        }
    }
}

impl PhaseHook for RunHook<'_> {
    fn enter(&mut self, phase: Phase) {
        self.watchdog.arm(phase.budget(), phase.label());
        self.started = Some((phase, Instant::now()));
    }

    fn exit(&mut self, phase: Phase) {
        self.watchdog.disarm();
        if let Some((entered, at)) = self.started.take() {
            if entered == phase {
                self.metrics
                    .phase_duration_seconds
                    .with_label_values(&[phase.label()])
                    .observe(at.elapsed().as_secs_f64());
            }
        }
    }
}

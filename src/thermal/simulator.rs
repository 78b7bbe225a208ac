// Temperature ramp driven by Preheating's entry action

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use crate::controller::feedback::{FeedbackSender, FeedbackSource};
use crate::controller::types::Trigger;
use crate::thermal::thermostat::Thermostat;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorSettings {
    pub tick: Duration,
    pub step: f64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            step: 0.5,
        }
    }
}

/// Moves `current` one step toward `target`, landing on it when closer than a step.
pub fn next_temperature(current: f64, target: f64, step: f64) -> f64 {
    let distance = target - current;
    if distance.abs() <= step {
        target
    } else {
        current + step.copysign(distance)
    }
}

#[derive(Debug, Clone)]
pub struct TemperatureSimulator {
    thermostat: Arc<Thermostat>,
    settings: SimulatorSettings,
    feedback: FeedbackSender,
}

impl TemperatureSimulator {
    pub fn new(thermostat: Arc<Thermostat>, settings: SimulatorSettings, feedback: FeedbackSender) -> Self {
        Self {
            thermostat,
            settings,
            feedback,
        }
    }

    /// Starts a ramp for preheat `session`; stops on reaching the target or on cancellation.
    pub fn spawn(&self, session: u64, cancellation: CancellationToken) -> JoinHandle<()> {
        let simulator = self.clone();
        let span = tracing::info_span!("temperature_simulator", session);
        tokio::spawn(simulator.run(session, cancellation).instrument(span))
    }

    async fn run(self, session: u64, cancellation: CancellationToken) {
        debug!(
            temperature = self.thermostat.temperature(),
            target = self.thermostat.target(),
            "Preheating started"
        );

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    debug!(temperature = self.thermostat.temperature(), "Preheating cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.settings.tick) => {}
            }

            // Read the target every tick so a mode change re-targets the ramp.
            let target = self.thermostat.target();
            let next = next_temperature(self.thermostat.temperature(), target, self.settings.step);
            self.thermostat.record_temperature(next);

            if (next - target).abs() < self.thermostat.tolerance() {
                info!(temperature = next, "Target temperature reached");
                self.feedback
                    .notify(Trigger::PreheatingComplete, FeedbackSource::Simulator { session });
                return;
            }
        }
    }
}

use tokio::sync::watch;

use crate::controller::types::TemperatureMode;

/// Shared temperature readings.
///
/// The simulator is the only writer of the temperature; the controller actor
/// is the only writer of the mode. Anyone may read or subscribe.
#[derive(Debug)]
pub struct Thermostat {
    temperature: watch::Sender<f64>,
    mode: watch::Sender<TemperatureMode>,
    tolerance: f64,
}

impl Thermostat {
    pub fn new(initial_temperature: f64, mode: TemperatureMode, tolerance: f64) -> Self {
        Self {
            temperature: watch::Sender::new(initial_temperature),
            mode: watch::Sender::new(mode),
            tolerance,
        }
    }

    pub fn temperature(&self) -> f64 {
        *self.temperature.borrow()
    }

    pub fn mode(&self) -> TemperatureMode {
        *self.mode.borrow()
    }

    pub fn target(&self) -> f64 {
        self.mode().target_temperature()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn is_at_target(&self) -> bool {
        (self.temperature() - self.target()).abs() < self.tolerance
    }

    pub fn subscribe_temperature(&self) -> watch::Receiver<f64> {
        self.temperature.subscribe()
    }

    pub(crate) fn set_mode(&self, mode: TemperatureMode) -> TemperatureMode {
        self.mode.send_replace(mode)
    }

    pub(crate) fn record_temperature(&self, value: f64) {
        self.temperature.send_replace(value);
    }
}

// Boiler temperature model: shared readings plus the preheat ramp

pub mod simulator;
pub mod thermostat;

pub use simulator::{next_temperature, SimulatorSettings, TemperatureSimulator};
pub use thermostat::Thermostat;

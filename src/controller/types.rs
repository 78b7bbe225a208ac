// Controller vocabulary: states, triggers, temperature modes and snapshots

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::controller::errors::ParseError;
use crate::workflow::WorkflowHandle;

/// Operating states of the appliance.
///
/// `On` is a composite state: the five states below it are its substates and
/// inherit every edge declared on `On`. The machine never rests in `On` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ControllerState {
    Off,
    On,
    Preheating,
    Idle,
    Brewing,
    MilkFrothing,
    Cleaning,
}

impl ControllerState {
    pub const ALL: [ControllerState; 7] = [
        ControllerState::Off,
        ControllerState::On,
        ControllerState::Preheating,
        ControllerState::Idle,
        ControllerState::Brewing,
        ControllerState::MilkFrothing,
        ControllerState::Cleaning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerState::Off => "Off",
            ControllerState::On => "On",
            ControllerState::Preheating => "Preheating",
            ControllerState::Idle => "Idle",
            ControllerState::Brewing => "Brewing",
            ControllerState::MilkFrothing => "MilkFrothing",
            ControllerState::Cleaning => "Cleaning",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControllerState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControllerState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::UnknownState(s.to_string()))
    }
}

/// Named intents accepted by [`crate::controller::ControllerHandle::fire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Trigger {
    TurnOn,
    StartPreheating,
    PreheatingComplete,
    StartBrewing,
    CancelBrewing,
    BrewingComplete,
    StartMilkFrothing,
    MilkFrothingComplete,
    StartCleaning,
    CleaningComplete,
    TurnOff,
}

impl Trigger {
    pub const ALL: [Trigger; 11] = [
        Trigger::TurnOn,
        Trigger::StartPreheating,
        Trigger::PreheatingComplete,
        Trigger::StartBrewing,
        Trigger::CancelBrewing,
        Trigger::BrewingComplete,
        Trigger::StartMilkFrothing,
        Trigger::MilkFrothingComplete,
        Trigger::StartCleaning,
        Trigger::CleaningComplete,
        Trigger::TurnOff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::TurnOn => "TurnOn",
            Trigger::StartPreheating => "StartPreheating",
            Trigger::PreheatingComplete => "PreheatingComplete",
            Trigger::StartBrewing => "StartBrewing",
            Trigger::CancelBrewing => "CancelBrewing",
            Trigger::BrewingComplete => "BrewingComplete",
            Trigger::StartMilkFrothing => "StartMilkFrothing",
            Trigger::MilkFrothingComplete => "MilkFrothingComplete",
            Trigger::StartCleaning => "StartCleaning",
            Trigger::CleaningComplete => "CleaningComplete",
            Trigger::TurnOff => "TurnOff",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive, so URL path segments like `startbrewing` map directly.
impl FromStr for Trigger {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Trigger::ALL
            .into_iter()
            .find(|trigger| trigger.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::UnknownTrigger(s.to_string()))
    }
}

/// Heating profile selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TemperatureMode {
    Low,
    #[default]
    Middle,
    High,
}

impl TemperatureMode {
    pub const ALL: [TemperatureMode; 3] = [
        TemperatureMode::Low,
        TemperatureMode::Middle,
        TemperatureMode::High,
    ];

    /// Target temperature in degrees Celsius.
    pub fn target_temperature(&self) -> f64 {
        match self {
            TemperatureMode::Low => 75.0,
            TemperatureMode::Middle => 80.0,
            TemperatureMode::High => 85.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureMode::Low => "Low",
            TemperatureMode::Middle => "Middle",
            TemperatureMode::High => "High",
        }
    }
}

impl fmt::Display for TemperatureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemperatureMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemperatureMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::UnsupportedTemperatureMode(s.to_string()))
    }
}

/// A transition that was applied by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub trigger: Trigger,
    pub source: ControllerState,
    pub destination: ControllerState,
}

/// State owned by the controller actor and published after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub state: ControllerState,
    pub running_workflow_handle: Option<WorkflowHandle>,
    pub fault: Option<String>,
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self {
            state: ControllerState::Off,
            running_workflow_handle: None,
            fault: None,
        }
    }
}

/// Read-only view rendered by the API layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub state: ControllerState,
    pub state_text: String,
    pub temperature: f64,
    pub mode: TemperatureMode,
    pub target_temperature: f64,
    pub running_workflow_handle: Option<WorkflowHandle>,
    pub fault: Option<String>,
    pub captured_at: chrono::DateTime<chrono::Utc>,
}

impl ControllerSnapshot {
    pub fn is_at_target(&self, tolerance: f64) -> bool {
        (self.temperature - self.target_temperature).abs() < tolerance
    }
}

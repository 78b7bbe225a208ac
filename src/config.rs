use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::brewing::{BrewingTimings, BREWING_WORKFLOW_ID};
use crate::controller::TemperatureMode;
use crate::thermal::SimulatorSettings;

/// Main configuration structure for brewline
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BrewlineConfig {
    /// Boiler and preheat simulation
    pub thermal: ThermalConfig,
    /// Brewing workflow timings and termination policy
    pub brewing: BrewingConfig,
    /// Controller actor settings
    pub runtime: RuntimeConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ThermalConfig {
    /// Boiler temperature when the process starts
    pub initial_temperature: f64,
    /// Temperature mode selected at startup
    pub mode: TemperatureMode,
    /// Interval between simulator ticks
    pub tick_interval_ms: u64,
    /// Degrees moved per tick
    pub step: f64,
    /// Distance from target that counts as reached
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BrewingConfig {
    /// Id the brewing workflow is registered under
    pub workflow_id: String,
    /// Duration of the start step
    pub start_delay_ms: u64,
    /// Duration of the hold step
    pub hold_duration_ms: u64,
    /// How long the controller waits for the engine to confirm termination
    pub termination_timeout_ms: u64,
    /// How long the engine waits for a cancelled instance to stop
    pub termination_grace_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Capacity of the external command queue
    pub command_queue_capacity: usize,
    /// Upper bound for graceful shutdown
    pub shutdown_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for BrewlineConfig {
    fn default() -> Self {
        Self {
            thermal: ThermalConfig {
                initial_temperature: 20.0,
                mode: TemperatureMode::Middle,
                tick_interval_ms: 100,
                step: 0.5,
                tolerance: 0.1,
            },
            brewing: BrewingConfig {
                workflow_id: BREWING_WORKFLOW_ID.to_string(),
                start_delay_ms: 5_000,
                hold_duration_ms: 120_000, // 2 minutes
                termination_timeout_ms: 5_000,
                termination_grace_ms: 2_000,
            },
            runtime: RuntimeConfig {
                command_queue_capacity: 64,
                shutdown_timeout_ms: 10_000,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json: false,
            },
        }
    }
}

impl ThermalConfig {
    pub fn simulator_settings(&self) -> SimulatorSettings {
        SimulatorSettings {
            tick: Duration::from_millis(self.tick_interval_ms),
            step: self.step,
        }
    }
}

impl BrewingConfig {
    pub fn timings(&self) -> BrewingTimings {
        BrewingTimings {
            start_delay: Duration::from_millis(self.start_delay_ms),
            hold_duration: Duration::from_millis(self.hold_duration_ms),
        }
    }

    pub fn termination_timeout(&self) -> Duration {
        Duration::from_millis(self.termination_timeout_ms)
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }
}

impl RuntimeConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl BrewlineConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (brewline.toml, .brewline-rc)
    /// 3. Environment variables (prefixed with BREWLINE__, sections split by `__`)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`BrewlineConfig::load`] with config files looked up in `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_path = dir.join("brewline.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".brewline-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("BREWLINE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings under which a preheat could never complete.
    pub fn validate(&self) -> Result<()> {
        let thermal = &self.thermal;
        if !thermal.initial_temperature.is_finite() {
            anyhow::bail!("thermal.initial_temperature must be finite");
        }
        if !(thermal.step.is_finite() && thermal.step > 0.0) {
            anyhow::bail!("thermal.step must be a positive number, got {}", thermal.step);
        }
        if !(thermal.tolerance.is_finite() && thermal.tolerance > 0.0) {
            anyhow::bail!(
                "thermal.tolerance must be a positive number, got {}",
                thermal.tolerance
            );
        }
        if thermal.tick_interval_ms == 0 {
            anyhow::bail!("thermal.tick_interval_ms must be greater than zero");
        }
        if self.runtime.command_queue_capacity == 0 {
            anyhow::bail!("runtime.command_queue_capacity must be greater than zero");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_appliance_constants() {
        let config = BrewlineConfig::default();
        assert_eq!(config.thermal.simulator_settings(), SimulatorSettings::default());
        assert_eq!(config.thermal.tolerance, 0.1);
        assert_eq!(config.brewing.workflow_id, "brewing");
        assert_eq!(config.brewing.timings(), BrewingTimings::default());
    }

    #[test]
    fn test_load_without_files_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BrewlineConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.thermal, BrewlineConfig::default().thermal);
        assert_eq!(config.brewing, BrewlineConfig::default().brewing);
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("brewline.toml"),
            "[thermal]\nmode = \"High\"\ninitial_temperature = 60.0\n\n[brewing]\nhold_duration_ms = 1500\n",
        )
        .unwrap();

        let config = BrewlineConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.thermal.mode, TemperatureMode::High);
        assert_eq!(config.thermal.initial_temperature, 60.0);
        assert_eq!(config.brewing.hold_duration_ms, 1500);
        assert_eq!(config.brewing.start_delay_ms, 5_000);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(BrewlineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_settings_that_stall_preheat() {
        let cases: [(&str, fn(&mut BrewlineConfig)); 5] = [
            ("tolerance", |c| c.thermal.tolerance = 0.0),
            ("tolerance", |c| c.thermal.tolerance = f64::NAN),
            ("step", |c| c.thermal.step = -0.5),
            ("step", |c| c.thermal.step = f64::INFINITY),
            ("tick_interval_ms", |c| c.thermal.tick_interval_ms = 0),
        ];

        for (field, mutate) in cases {
            let mut config = BrewlineConfig::default();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn test_load_rejects_zero_tolerance_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("brewline.toml"), "[thermal]\ntolerance = 0.0\n").unwrap();

        let err = BrewlineConfig::load_from(dir.path()).unwrap_err();
        assert!(err.to_string().contains("thermal.tolerance"));
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BrewlineConfig::default();
        config.thermal.mode = TemperatureMode::Low;
        config.runtime.command_queue_capacity = 8;
        config.save_to_file(dir.path().join("brewline.toml")).unwrap();

        let loaded = BrewlineConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.thermal.mode, TemperatureMode::Low);
        assert_eq!(loaded.runtime.command_queue_capacity, 8);
    }
}

//! Shared setup for controller integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use brewline::{BrewlineConfig, ControllerHandle, ControllerStatus, InMemoryWorkflowEngine};

/// Short brew so full cycles finish in a couple of simulated seconds.
/// The boiler starts at the Middle target, so TurnOn settles in Idle.
pub fn fast_config() -> BrewlineConfig {
    let mut config = BrewlineConfig::default();
    config.thermal.initial_temperature = 80.0;
    config.brewing.start_delay_ms = 50;
    config.brewing.hold_duration_ms = 500;
    config.brewing.termination_timeout_ms = 1_000;
    config.brewing.termination_grace_ms = 200;
    config
}

/// Same as [`fast_config`] with the boiler starting at `temperature`.
pub fn cold_config(temperature: f64) -> BrewlineConfig {
    let mut config = fast_config();
    config.thermal.initial_temperature = temperature;
    config
}

pub async fn spawn_controller(config: &BrewlineConfig) -> (ControllerHandle, Arc<InMemoryWorkflowEngine>) {
    let engine = Arc::new(InMemoryWorkflowEngine::new(config.brewing.termination_grace()));
    let controller = ControllerHandle::spawn(config, engine.clone()).await;
    (controller, engine)
}

/// Waits until the published status satisfies `predicate`; panics after `within`.
pub async fn wait_for_status(
    controller: &ControllerHandle,
    within: Duration,
    predicate: impl FnMut(&ControllerStatus) -> bool,
) -> ControllerStatus {
    let mut status = controller.subscribe();
    let result = tokio::time::timeout(within, status.wait_for(predicate)).await;
    match result {
        Ok(Ok(status)) => status.clone(),
        Ok(Err(_)) => panic!("controller stopped while waiting"),
        Err(_) => panic!(
            "status condition not reached within {:?}; last status {:?}",
            within,
            controller.status()
        ),
    }
}

/// Polls `condition` every tick until it holds; panics after `within`.
pub async fn wait_until(within: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + within;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {:?}",
            within
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

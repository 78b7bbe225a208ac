use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::controller::ControllerHandle;
use crate::workflow::InMemoryWorkflowEngine;

/// Graceful shutdown coordinator for brewline
pub struct ShutdownCoordinator {
    controller: ControllerHandle,
    engine: Arc<InMemoryWorkflowEngine>,
    deadline: Duration,
}

impl ShutdownCoordinator {
    pub fn new(controller: ControllerHandle, engine: Arc<InMemoryWorkflowEngine>, deadline: Duration) -> Self {
        Self {
            controller,
            engine,
            deadline,
        }
    }

    /// Wait for Ctrl-C, then shut everything down
    pub async fn wait_for_shutdown(self) -> Result<()> {
        info!("Shutdown coordinator ready - will shutdown gracefully on Ctrl-C");
        tokio::signal::ctrl_c().await?;
        info!("Interrupt received");
        self.shutdown_all_services().await.map(|_| ())
    }

    /// Stop the controller first so it can release its workflow, then the engine.
    ///
    /// Returns `true` when the controller stopped in time and no workflow
    /// instance outlived it.
    pub async fn shutdown_all_services(self) -> Result<bool> {
        info!("Initiating graceful shutdown of all services...");

        let mut clean = true;
        if let Err(e) = stop_controller(&self.controller, self.deadline).await {
            warn!("Controller did not stop cleanly: {}", e);
            clean = false;
        }

        self.engine.shutdown().await;
        let still_running = self
            .engine
            .instances()
            .await
            .into_iter()
            .filter(|instance| !instance.status.is_terminal())
            .count();
        if still_running > 0 {
            warn!(still_running, "Workflow instances still running at exit");
            clean = false;
        }

        if clean {
            info!("Graceful shutdown completed successfully");
        } else {
            warn!("Shutdown completed with services left running");
        }
        Ok(clean)
    }
}

async fn stop_controller(controller: &ControllerHandle, deadline: Duration) -> Result<()> {
    info!("Stopping controller...");

    timeout(deadline, controller.shutdown())
        .await
        .map_err(|_| anyhow::anyhow!("Timeout waiting for controller to stop"))??;

    info!(state = %controller.state(), "Controller stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrewlineConfig;
    use crate::controller::{ControllerError, ControllerState, Trigger};
    use crate::workflow::{StepContext, StepOutcome, WorkflowDefinition, WorkflowEngine, WorkflowError, WorkflowStep};
    use async_trait::async_trait;

    /// Never returns and never looks at its cancellation token.
    struct Wedged;

    #[async_trait]
    impl WorkflowStep for Wedged {
        fn name(&self) -> &str {
            "wedged"
        }

        async fn run(&self, _ctx: &StepContext) -> Result<StepOutcome, WorkflowError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_terminates_running_brew() {
        let mut config = BrewlineConfig::default();
        config.thermal.initial_temperature = 80.0;
        let engine = Arc::new(InMemoryWorkflowEngine::new(config.brewing.termination_grace()));
        let controller = ControllerHandle::spawn(&config, engine.clone()).await;

        controller.fire(Trigger::TurnOn).await.unwrap();
        controller.fire(Trigger::StartBrewing).await.unwrap();
        assert_eq!(controller.state(), ControllerState::Brewing);

        let clean = ShutdownCoordinator::new(controller.clone(), engine.clone(), config.runtime.shutdown_timeout())
            .shutdown_all_services()
            .await
            .unwrap();
        assert!(clean);

        assert_eq!(controller.status().running_workflow_handle, None);
        assert!(engine.instances().await.iter().all(|i| i.status.is_terminal()));
        assert_eq!(
            controller.fire(Trigger::CancelBrewing).await,
            Err(ControllerError::Stopped)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reports_instance_left_running() {
        let mut config = BrewlineConfig::default();
        config.thermal.initial_temperature = 80.0;
        let engine = Arc::new(InMemoryWorkflowEngine::new(Duration::from_millis(100)));
        let controller = ControllerHandle::spawn(&config, engine.clone()).await;
        engine
            .register(WorkflowDefinition::new("wedged").step(Wedged))
            .await;
        engine.start("wedged").await.unwrap();

        let clean = ShutdownCoordinator::new(controller.clone(), engine.clone(), config.runtime.shutdown_timeout())
            .shutdown_all_services()
            .await
            .unwrap();

        assert!(!clean);
        assert_eq!(
            controller.fire(Trigger::TurnOn).await,
            Err(ControllerError::Stopped)
        );
    }
}

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BrewlineConfig;
use crate::controller::{ControllerError, ControllerHandle, ControllerState, TerminationFailure, Trigger};
use crate::workflow::{
    InMemoryWorkflowEngine, InstanceStatus, MockWorkflowEngine, WorkflowDefinition, WorkflowEngine,
    WorkflowError, WorkflowHandle,
};

/// Boiler already at the Middle target so TurnOn settles in Idle without a ramp.
fn at_target_config() -> BrewlineConfig {
    let mut config = BrewlineConfig::default();
    config.thermal.initial_temperature = 80.0;
    config.brewing.termination_timeout_ms = 50;
    config
}

fn mock_engine() -> MockWorkflowEngine {
    let mut engine = MockWorkflowEngine::new();
    engine.expect_register().returning(|_| ());
    engine
}

/// Starts instances normally but never answers a termination request.
struct StallingEngine;

#[async_trait]
impl WorkflowEngine for StallingEngine {
    async fn register(&self, _definition: WorkflowDefinition) {}

    async fn start(&self, workflow_id: &str) -> Result<WorkflowHandle, WorkflowError> {
        Ok(WorkflowHandle::new(format!("{workflow_id}-stalled")))
    }

    async fn terminate(&self, _handle: &WorkflowHandle) -> Result<bool, WorkflowError> {
        std::future::pending().await
    }

    async fn status(&self, _handle: &WorkflowHandle) -> Option<InstanceStatus> {
        Some(InstanceStatus::Running { step: "hold".into() })
    }
}

#[tokio::test(start_paused = true)]
async fn test_refused_termination_faults_controller() {
    let mut engine = mock_engine();
    engine
        .expect_start()
        .times(1)
        .returning(|_| Ok(WorkflowHandle::new("brewing-1")));
    engine.expect_terminate().times(2).returning(|_| Ok(false));

    let controller = ControllerHandle::spawn(&at_target_config(), Arc::new(engine)).await;
    controller.fire(Trigger::TurnOn).await.unwrap();
    controller.fire(Trigger::StartBrewing).await.unwrap();

    let err = controller.fire(Trigger::CancelBrewing).await.unwrap_err();
    assert_eq!(
        err,
        ControllerError::WorkflowTerminationFailed {
            handle: WorkflowHandle::new("brewing-1"),
            reason: TerminationFailure::Refused,
        }
    );
    assert!(err.is_fatal());

    let status = controller.status();
    assert_eq!(status.state, ControllerState::Brewing);
    assert_eq!(status.running_workflow_handle, Some(WorkflowHandle::new("brewing-1")));
    assert!(status.fault.is_some());
    assert_eq!(controller.metrics().termination_failures, 1);

    // Every trigger is refused until the controller is reset.
    let err = controller.fire(Trigger::CancelBrewing).await.unwrap_err();
    assert!(matches!(err, ControllerError::Faulted(_)));

    controller.initialize(ControllerState::Idle).await.unwrap();
    let status = controller.status();
    assert_eq!(status.state, ControllerState::Idle);
    assert_eq!(status.running_workflow_handle, None);
    assert_eq!(status.fault, None);

    controller.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_keeps_controller_idle() {
    let mut engine = mock_engine();
    engine
        .expect_start()
        .times(1)
        .returning(|id| Err(WorkflowError::UnknownWorkflow(id.to_string())));
    engine.expect_terminate().never();

    let controller = ControllerHandle::spawn(&at_target_config(), Arc::new(engine)).await;
    controller.fire(Trigger::TurnOn).await.unwrap();

    let err = controller.fire(Trigger::StartBrewing).await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::WorkflowStartFailed { ref workflow, .. } if workflow == "brewing"
    ));
    assert!(!err.is_fatal());
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(controller.status().running_workflow_handle, None);

    controller.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_initialize_rejects_composite_state() {
    let mut engine = mock_engine();
    engine.expect_start().never();
    engine.expect_terminate().never();

    let controller = ControllerHandle::spawn(&at_target_config(), Arc::new(engine)).await;

    let err = controller.initialize(ControllerState::On).await.unwrap_err();
    assert_eq!(err, ControllerError::CompositeState(ControllerState::On));
    assert_eq!(controller.state(), ControllerState::Off);

    controller.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_engine_error_on_terminate_is_reported() {
    let mut engine = mock_engine();
    engine
        .expect_start()
        .returning(|_| Ok(WorkflowHandle::new("brewing-7")));
    engine
        .expect_terminate()
        .returning(|handle| Err(WorkflowError::UnknownInstance(handle.clone())));

    let controller = ControllerHandle::spawn(&at_target_config(), Arc::new(engine)).await;
    controller.fire(Trigger::TurnOn).await.unwrap();
    controller.fire(Trigger::StartBrewing).await.unwrap();

    let err = controller.fire(Trigger::CancelBrewing).await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::WorkflowTerminationFailed {
            reason: TerminationFailure::Engine(_),
            ..
        }
    ));
    assert_eq!(controller.state(), ControllerState::Brewing);

    controller.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_termination_times_out() {
    let controller = ControllerHandle::spawn(&at_target_config(), Arc::new(StallingEngine)).await;
    controller.fire(Trigger::TurnOn).await.unwrap();
    controller.fire(Trigger::StartBrewing).await.unwrap();

    let started = tokio::time::Instant::now();
    let err = controller.fire(Trigger::CancelBrewing).await.unwrap_err();

    assert_eq!(
        err,
        ControllerError::WorkflowTerminationFailed {
            handle: WorkflowHandle::new("brewing-stalled"),
            reason: TerminationFailure::TimedOut { timeout_ms: 50 },
        }
    );
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(controller.state(), ControllerState::Brewing);
    assert!(controller.status().fault.is_some());

    controller.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_cancel_interrupts_pending_termination() {
    let mut config = at_target_config();
    config.brewing.termination_timeout_ms = 60_000;
    let controller = ControllerHandle::spawn(&config, Arc::new(StallingEngine)).await;
    controller.fire(Trigger::TurnOn).await.unwrap();
    controller.fire(Trigger::StartBrewing).await.unwrap();

    let cancelling = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.fire(Trigger::CancelBrewing).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    cancelling.abort();

    let mut status = controller.subscribe();
    let status = tokio::time::timeout(Duration::from_secs(1), status.wait_for(|s| s.fault.is_some()))
        .await
        .expect("fault published before the termination timeout")
        .unwrap()
        .clone();
    assert_eq!(status.state, ControllerState::Brewing);
    assert!(status.fault.unwrap().contains("caller stopped waiting"));
    assert_eq!(controller.metrics().termination_failures, 1);

    controller.shutdown().await.unwrap();
    assert!(matches!(
        controller.fire(Trigger::TurnOff).await,
        Err(ControllerError::Stopped)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_queued_before_shutdown_completes() {
    let mut config = at_target_config();
    config.brewing.termination_timeout_ms = 1_000;
    let engine = Arc::new(InMemoryWorkflowEngine::new(config.brewing.termination_grace()));
    let controller = ControllerHandle::spawn(&config, engine).await;
    controller.fire(Trigger::TurnOn).await.unwrap();
    controller.fire(Trigger::StartBrewing).await.unwrap();

    let (cancelled, stopped) = tokio::join!(
        controller.fire(Trigger::CancelBrewing),
        controller.shutdown()
    );

    let transition = cancelled.unwrap();
    assert_eq!(transition.destination, ControllerState::Idle);
    stopped.unwrap();

    let status = controller.status();
    assert_eq!(status.state, ControllerState::Idle);
    assert_eq!(status.running_workflow_handle, None);
    assert_eq!(status.fault, None);
    assert_eq!(controller.metrics().termination_failures, 0);
}

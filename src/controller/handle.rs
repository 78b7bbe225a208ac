use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::brewing::brewing_workflow;
use crate::config::BrewlineConfig;
use crate::controller::actor::{Command, ControllerActor};
use crate::controller::errors::ControllerError;
use crate::controller::feedback::FeedbackSender;
use crate::controller::graph::render_dot;
use crate::controller::table::TransitionTable;
use crate::controller::types::{
    ControllerSnapshot, ControllerState, ControllerStatus, TemperatureMode, Transition, Trigger,
};
use crate::observability::{ControllerMetrics, ControllerStats};
use crate::thermal::{TemperatureSimulator, Thermostat};
use crate::workflow::WorkflowEngine;

/// Owned handle to the appliance controller.
///
/// Cloning is cheap; every clone talks to the same actor. The actor stops when
/// [`ControllerHandle::shutdown`] is called or the last clone is dropped.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ControllerStatus>,
    thermostat: Arc<Thermostat>,
    metrics: Arc<ControllerMetrics>,
    table: &'static TransitionTable,
    shutdown: CancellationToken,
}

impl ControllerHandle {
    /// Registers the brewing workflow with `engine` and starts the controller in `Off`.
    pub async fn spawn(config: &BrewlineConfig, engine: Arc<dyn WorkflowEngine>) -> Self {
        let table = TransitionTable::controller();
        let thermostat = Arc::new(Thermostat::new(
            config.thermal.initial_temperature,
            config.thermal.mode,
            config.thermal.tolerance,
        ));
        let metrics = Arc::new(ControllerMetrics::new());
        let shutdown = CancellationToken::new();

        let (feedback, feedback_rx) = FeedbackSender::channel();
        engine
            .register(brewing_workflow(
                &config.brewing.workflow_id,
                config.brewing.timings(),
                feedback.clone(),
            ))
            .await;

        let simulator = TemperatureSimulator::new(
            Arc::clone(&thermostat),
            config.thermal.simulator_settings(),
            feedback,
        );

        let (published, status) = watch::channel(ControllerStatus::default());
        let (commands, commands_rx) = mpsc::channel(config.runtime.command_queue_capacity.max(1));

        let actor = ControllerActor::new(
            table,
            published,
            Arc::clone(&thermostat),
            simulator,
            engine,
            config.brewing.workflow_id.clone(),
            config.brewing.termination_timeout(),
            shutdown.clone(),
            Arc::clone(&metrics),
        );
        tokio::spawn(actor.run(commands_rx, feedback_rx));

        info!(
            mode = %config.thermal.mode,
            temperature = config.thermal.initial_temperature,
            "Controller spawned"
        );

        Self {
            commands,
            status,
            thermostat,
            metrics,
            table,
            shutdown,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ControllerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ControllerError::Stopped)?;
        response.await.map_err(|_| ControllerError::Stopped)
    }

    /// Applies `trigger`; resolves once the edge's exit and entry actions have run.
    pub async fn fire(&self, trigger: Trigger) -> Result<Transition, ControllerError> {
        self.request(|reply| Command::Fire { trigger, reply }).await?
    }

    /// Force-sets `state` without running entry or exit actions.
    ///
    /// Meant for test and debug seeding. Any preheat ramp is cancelled and an
    /// attributed brewing workflow is asked to terminate; the fault flag is
    /// cleared.
    pub async fn initialize(&self, state: ControllerState) -> Result<(), ControllerError> {
        self.request(|reply| Command::Initialize { state, reply }).await?
    }

    /// Changes the temperature mode. A running preheat re-targets on its next tick.
    pub async fn set_mode(&self, mode: TemperatureMode) -> Result<(), ControllerError> {
        self.request(|reply| Command::SetMode { mode, reply }).await?
    }

    /// Stops background activity and the actor. Idempotent.
    ///
    /// Commands queued earlier are still applied first.
    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        let result = match self.request(|reply| Command::Shutdown { reply }).await {
            Ok(()) | Err(ControllerError::Stopped) => Ok(()),
            Err(e) => Err(e),
        };
        self.shutdown.cancel();
        result
    }

    pub fn state(&self) -> ControllerState {
        self.status.borrow().state
    }

    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let status = self.status();
        ControllerSnapshot {
            state: status.state,
            state_text: self.state_text(status.state),
            temperature: self.thermostat.temperature(),
            mode: self.thermostat.mode(),
            target_temperature: self.thermostat.target(),
            running_workflow_handle: status.running_workflow_handle,
            fault: status.fault,
            captured_at: chrono::Utc::now(),
        }
    }

    /// Triggers legal from the current state, including inherited ones.
    pub fn permitted_triggers(&self) -> BTreeSet<Trigger> {
        self.table.permitted_triggers(self.state())
    }

    /// Graphviz rendering of the transition table with the current state highlighted.
    pub fn graph(&self) -> String {
        render_dot(self.table, Some(self.state()))
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.status.clone()
    }

    pub fn thermostat(&self) -> &Arc<Thermostat> {
        &self.thermostat
    }

    pub fn metrics(&self) -> ControllerStats {
        self.metrics.get_stats()
    }

    fn state_text(&self, state: ControllerState) -> String {
        let mut chain: Vec<_> = self
            .table
            .ancestry(state)
            .into_iter()
            .map(|s| s.as_str())
            .collect();
        chain.reverse();
        chain.join("/")
    }
}

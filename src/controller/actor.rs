// Controller actor - the single owner of state, workflow handle and fault
//
// External calls arrive on a bounded command queue. Background activity
// (temperature ramp, brewing end step) posts to an unbounded feedback queue,
// which is polled first. Follow-up triggers raised by entry actions are kept in
// a local deferred queue and applied before anything else is received.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::controller::errors::{ControllerError, TerminationFailure};
use crate::controller::feedback::{Feedback, FeedbackSource};
use crate::controller::table::TransitionTable;
use crate::controller::types::{ControllerState, ControllerStatus, TemperatureMode, Transition, Trigger};
use crate::observability::{ControllerMetrics, OperationTimer};
use crate::telemetry::{create_transition_span, generate_correlation_id};
use crate::thermal::{TemperatureSimulator, Thermostat};
use crate::workflow::{WorkflowEngine, WorkflowHandle};

type FireReply = oneshot::Sender<Result<Transition, ControllerError>>;

pub(crate) enum Command {
    Fire {
        trigger: Trigger,
        reply: FireReply,
    },
    Initialize {
        state: ControllerState,
        reply: oneshot::Sender<Result<(), ControllerError>>,
    },
    SetMode {
        mode: TemperatureMode,
        reply: oneshot::Sender<Result<(), ControllerError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct PreheatSession {
    session: u64,
    cancellation: CancellationToken,
}

pub(crate) struct ControllerActor {
    table: &'static TransitionTable,
    status: ControllerStatus,
    published: watch::Sender<ControllerStatus>,
    thermostat: Arc<Thermostat>,
    simulator: TemperatureSimulator,
    engine: Arc<dyn WorkflowEngine>,
    workflow_id: String,
    termination_timeout: Duration,
    shutdown: CancellationToken,
    metrics: Arc<ControllerMetrics>,
    preheat: Option<PreheatSession>,
    sessions_started: u64,
    deferred: VecDeque<Trigger>,
}

impl ControllerActor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        table: &'static TransitionTable,
        published: watch::Sender<ControllerStatus>,
        thermostat: Arc<Thermostat>,
        simulator: TemperatureSimulator,
        engine: Arc<dyn WorkflowEngine>,
        workflow_id: String,
        termination_timeout: Duration,
        shutdown: CancellationToken,
        metrics: Arc<ControllerMetrics>,
    ) -> Self {
        let status = published.borrow().clone();
        Self {
            table,
            status,
            published,
            thermostat,
            simulator,
            engine,
            workflow_id,
            termination_timeout,
            shutdown,
            metrics,
            preheat: None,
            sessions_started: 0,
            deferred: VecDeque::new(),
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut feedback: mpsc::UnboundedReceiver<Feedback>,
    ) {
        info!(state = %self.status.state, "Controller started");
        loop {
            self.drain_deferred().await;

            tokio::select! {
                biased;
                Some(message) = feedback.recv() => self.handle_feedback(message).await,
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            return;
                        }
                    }
                    None => {
                        self.stop().await;
                        return;
                    }
                },
            }
        }
    }

    /// Returns false once the actor has stopped.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Fire { trigger, mut reply } => {
                let span = create_transition_span(
                    trigger,
                    self.status.state,
                    "external",
                    &generate_correlation_id(),
                );
                let result = self.apply(trigger, Some(&mut reply)).instrument(span).await;
                let _ = reply.send(result);
            }
            Command::Initialize { state, mut reply } => {
                let result = self.initialize(state, &mut reply).await;
                let _ = reply.send(result);
            }
            Command::SetMode { mode, reply } => {
                let _ = reply.send(self.set_mode(mode));
            }
            Command::Shutdown { reply } => {
                self.stop().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn handle_feedback(&mut self, feedback: Feedback) {
        let (origin, current) = match &feedback.source {
            FeedbackSource::Simulator { session } => (
                "simulator",
                self.status.state == ControllerState::Preheating
                    && self.preheat.as_ref().map(|p| p.session) == Some(*session),
            ),
            FeedbackSource::Workflow { handle } => (
                "workflow",
                self.status.state == ControllerState::Brewing
                    && self.status.running_workflow_handle.as_ref() == Some(handle),
            ),
        };

        if !current {
            self.metrics.record_stale_callback();
            info!(
                trigger = %feedback.trigger,
                source = ?feedback.source,
                state = %self.status.state,
                "Ignoring stale callback"
            );
            return;
        }

        let span = create_transition_span(
            feedback.trigger,
            self.status.state,
            origin,
            &generate_correlation_id(),
        );
        if let Err(e) = self.apply(feedback.trigger, None).instrument(span).await {
            warn!(trigger = %feedback.trigger, error = %e, "Callback trigger was not applied");
        }
    }

    async fn drain_deferred(&mut self) {
        while let Some(trigger) = self.deferred.pop_front() {
            let span = create_transition_span(
                trigger,
                self.status.state,
                "deferred",
                &generate_correlation_id(),
            );
            if let Err(e) = self.apply(trigger, None).instrument(span).await {
                warn!(trigger = %trigger, error = %e, "Deferred trigger was not applied");
            }
        }
    }

    /// Validates and performs one transition. Nothing is mutated on rejection.
    ///
    /// `caller` is the external requester, if any; waits on the workflow engine
    /// stop early when it goes away.
    async fn apply(
        &mut self,
        trigger: Trigger,
        mut caller: Option<&mut FireReply>,
    ) -> Result<Transition, ControllerError> {
        if let Some(fault) = &self.status.fault {
            return Err(ControllerError::Faulted(fault.clone()));
        }

        let source = self.status.state;
        let Some(path) = self.table.resolve(source, trigger) else {
            self.metrics.record_invalid_trigger();
            info!(state = %source, trigger = %trigger, "Rejected trigger");
            return Err(ControllerError::InvalidTransition {
                state: source,
                trigger,
            });
        };

        let timer = OperationTimer::new("transition");
        for state in &path.exits {
            self.exit(*state, trigger, caller.as_deref_mut()).await?;
        }
        for state in &path.entries {
            self.enter(*state).await?;
        }

        self.status.state = path.destination;
        self.publish();
        self.metrics.record_transition();
        timer.finish();

        info!(from = %source, to = %path.destination, trigger = %trigger, "Transition applied");
        Ok(Transition {
            trigger,
            source,
            destination: path.destination,
        })
    }

    async fn exit(
        &mut self,
        state: ControllerState,
        trigger: Trigger,
        caller: Option<&mut FireReply>,
    ) -> Result<(), ControllerError> {
        match state {
            ControllerState::Preheating => {
                self.cancel_preheat();
                Ok(())
            }
            ControllerState::Brewing => self.exit_brewing(trigger, caller).await,
            _ => Ok(()),
        }
    }

    async fn exit_brewing(
        &mut self,
        trigger: Trigger,
        caller: Option<&mut FireReply>,
    ) -> Result<(), ControllerError> {
        let Some(handle) = self.status.running_workflow_handle.clone() else {
            return Ok(());
        };

        if trigger == Trigger::BrewingComplete {
            self.metrics.record_brew_completed();
            self.status.running_workflow_handle = None;
            return Ok(());
        }

        match self.terminate_workflow(&handle, caller).await {
            Ok(()) => {
                self.metrics.record_brew_cancelled();
                self.status.running_workflow_handle = None;
                info!(handle = %handle, "Brewing workflow terminated");
                Ok(())
            }
            Err(reason) => {
                self.metrics.record_termination_failure();
                error!(
                    handle = %handle,
                    reason = %reason,
                    "Brewing workflow could not be terminated; controller faulted"
                );
                self.status.fault = Some(format!("brewing workflow {handle} still running: {reason}"));
                self.publish();
                Err(ControllerError::WorkflowTerminationFailed { handle, reason })
            }
        }
    }

    async fn enter(&mut self, state: ControllerState) -> Result<(), ControllerError> {
        match state {
            ControllerState::Idle => {
                if !self.thermostat.is_at_target() {
                    debug!(
                        temperature = self.thermostat.temperature(),
                        target = self.thermostat.target(),
                        "Idle below target, queueing preheat"
                    );
                    self.deferred.push_back(Trigger::StartPreheating);
                }
                Ok(())
            }
            ControllerState::Preheating => {
                self.start_preheat();
                Ok(())
            }
            ControllerState::Brewing => {
                let handle = self.engine.start(&self.workflow_id).await.map_err(|e| {
                    ControllerError::WorkflowStartFailed {
                        workflow: self.workflow_id.clone(),
                        reason: e.to_string(),
                    }
                })?;
                info!(handle = %handle, "Brewing workflow started");
                self.metrics.record_brew_started();
                self.status.running_workflow_handle = Some(handle);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn start_preheat(&mut self) {
        self.cancel_preheat();
        self.sessions_started += 1;
        let session = self.sessions_started;
        let cancellation = self.shutdown.child_token();
        self.simulator.spawn(session, cancellation.clone());
        self.preheat = Some(PreheatSession {
            session,
            cancellation,
        });
        self.metrics.record_preheat_cycle();
    }

    fn cancel_preheat(&mut self) {
        if let Some(preheat) = self.preheat.take() {
            preheat.cancellation.cancel();
        }
    }

    /// Asks the engine to stop `handle`, bounded by the termination timeout and
    /// cut short when `caller` stops waiting for its reply.
    async fn terminate_workflow<T>(
        &self,
        handle: &WorkflowHandle,
        caller: Option<&mut oneshot::Sender<T>>,
    ) -> Result<(), TerminationFailure> {
        let bounded = tokio::time::timeout(self.termination_timeout, self.engine.terminate(handle));
        let outcome = match caller {
            Some(reply) => tokio::select! {
                _ = reply.closed() => return Err(TerminationFailure::Interrupted),
                outcome = bounded => outcome,
            },
            None => bounded.await,
        };

        match outcome {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(TerminationFailure::Refused),
            Ok(Err(e)) => Err(TerminationFailure::Engine(e.to_string())),
            Err(_) => Err(TerminationFailure::TimedOut {
                timeout_ms: self.termination_timeout.as_millis() as u64,
            }),
        }
    }

    /// Force-sets a leaf state. Background activity is stopped; entry and exit
    /// actions are not run.
    async fn initialize(
        &mut self,
        state: ControllerState,
        caller: &mut oneshot::Sender<Result<(), ControllerError>>,
    ) -> Result<(), ControllerError> {
        if self.table.is_composite(state) {
            return Err(ControllerError::CompositeState(state));
        }

        self.cancel_preheat();
        self.deferred.clear();
        if let Some(handle) = self.status.running_workflow_handle.take() {
            if let Err(reason) = self.terminate_workflow(&handle, Some(caller)).await {
                warn!(
                    handle = %handle,
                    reason = %reason,
                    "Forced reset released a workflow that did not confirm termination"
                );
            }
        }

        let previous = self.status.state;
        self.status = ControllerStatus {
            state,
            running_workflow_handle: None,
            fault: None,
        };
        self.publish();
        warn!(from = %previous, to = %state, "Controller state force-set");
        Ok(())
    }

    fn set_mode(&mut self, mode: TemperatureMode) -> Result<(), ControllerError> {
        let previous = self.thermostat.set_mode(mode);
        info!(from = %previous, to = %mode, target = mode.target_temperature(), "Temperature mode changed");

        if self.status.state == ControllerState::Idle && !self.thermostat.is_at_target() {
            self.deferred.push_back(Trigger::StartPreheating);
        }
        Ok(())
    }

    async fn stop(&mut self) {
        self.shutdown.cancel();
        self.cancel_preheat();
        if let Some(handle) = self.status.running_workflow_handle.clone() {
            match self.terminate_workflow(&handle, None::<&mut oneshot::Sender<()>>).await {
                Ok(()) => {
                    self.status.running_workflow_handle = None;
                    self.publish();
                }
                Err(reason) => error!(
                    handle = %handle,
                    reason = %reason,
                    "Brewing workflow still running at shutdown"
                ),
            }
        }
        self.metrics.log_stats();
        info!(state = %self.status.state, "Controller stopped");
    }

    fn publish(&self) {
        self.published.send_replace(self.status.clone());
    }
}

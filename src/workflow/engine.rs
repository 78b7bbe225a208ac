// In-process workflow engine
//
// Each instance runs its steps in a spawned task. Cancellation is cooperative:
// the runner checks the instance token between steps and steps observe it
// through their StepContext. Lifecycle changes are published on a watch
// channel so `terminate` can wait for the acknowledgement.

use async_trait::async_trait;
use statig::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::workflow::errors::WorkflowError;
use crate::workflow::lifecycle::{status_of, InstanceEvent, InstanceLifecycle};
use crate::workflow::traits::{WorkflowEngine, WorkflowStep};
use crate::workflow::types::{InstanceStatus, StepContext, StepOutcome, WorkflowDefinition, WorkflowHandle};

struct InstanceEntry {
    workflow_id: String,
    lifecycle: StateMachine<InstanceLifecycle>,
    cancellation: CancellationToken,
    status: watch::Sender<InstanceStatus>,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl InstanceEntry {
    fn apply(&mut self, event: InstanceEvent) -> InstanceStatus {
        self.lifecycle.handle(&event);
        let status = status_of(&self.lifecycle);
        self.status.send_replace(status.clone());
        status
    }
}

/// Summary row for diagnostics.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct InstanceSummary {
    pub handle: WorkflowHandle,
    pub workflow_id: String,
    pub status: InstanceStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

type Instances = Arc<Mutex<HashMap<WorkflowHandle, InstanceEntry>>>;

pub struct InMemoryWorkflowEngine {
    definitions: RwLock<HashMap<String, WorkflowDefinition>>,
    instances: Instances,
    termination_grace: Duration,
    shutdown: CancellationToken,
}

impl InMemoryWorkflowEngine {
    /// `termination_grace` bounds how long `terminate` waits for a cancelled
    /// instance to reach a terminal state.
    pub fn new(termination_grace: Duration) -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            instances: Arc::new(Mutex::new(HashMap::new())),
            termination_grace,
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn instances(&self) -> Vec<InstanceSummary> {
        let instances = self.instances.lock().await;
        let mut rows: Vec<_> = instances
            .iter()
            .map(|(handle, entry)| InstanceSummary {
                handle: handle.clone(),
                workflow_id: entry.workflow_id.clone(),
                status: status_of(&entry.lifecycle),
                started_at: entry.started_at,
            })
            .collect();
        rows.sort_by_key(|row| row.started_at);
        rows
    }

    /// Drops bookkeeping for instances that reached a terminal state.
    ///
    /// `start` does this as well, so only the latest finished instance of a
    /// sequence stays queryable.
    pub async fn prune_finished(&self) -> usize {
        retain_unfinished(&mut *self.instances.lock().await)
    }

    /// Cancels every running instance and refuses new starts.
    pub async fn shutdown(&self) {
        // Instance tokens are children of this one.
        self.shutdown.cancel();
        let running = self
            .instances
            .lock()
            .await
            .values()
            .filter(|entry| !status_of(&entry.lifecycle).is_terminal())
            .count();
        info!(running, "Workflow engine shut down");
    }
}

#[async_trait]
impl WorkflowEngine for InMemoryWorkflowEngine {
    async fn register(&self, definition: WorkflowDefinition) {
        info!(
            workflow = %definition.id,
            steps = ?definition.step_names(),
            "Registered workflow"
        );
        self.definitions
            .write()
            .await
            .insert(definition.id.clone(), definition);
    }

    async fn start(&self, workflow_id: &str) -> Result<WorkflowHandle, WorkflowError> {
        if self.shutdown.is_cancelled() {
            return Err(WorkflowError::ShuttingDown);
        }

        let steps = self
            .definitions
            .read()
            .await
            .get(workflow_id)
            .map(|definition| definition.steps.clone())
            .ok_or_else(|| WorkflowError::UnknownWorkflow(workflow_id.to_string()))?;

        let handle = WorkflowHandle::generate(workflow_id);
        let cancellation = self.shutdown.child_token();
        let (status, _) = watch::channel(InstanceStatus::Pending);

        let mut entry = InstanceEntry {
            workflow_id: workflow_id.to_string(),
            lifecycle: InstanceLifecycle::new(handle.clone()).state_machine(),
            cancellation: cancellation.clone(),
            status,
            started_at: chrono::Utc::now(),
        };
        entry.apply(InstanceEvent::Start);
        {
            let mut instances = self.instances.lock().await;
            let pruned = retain_unfinished(&mut instances);
            if pruned > 0 {
                debug!(pruned, "Dropped finished workflow instances");
            }
            instances.insert(handle.clone(), entry);
        }

        let span = tracing::info_span!("workflow_instance", workflow = workflow_id, handle = %handle);
        tokio::spawn(
            run_instance(
                handle.clone(),
                steps,
                StepContext::new(handle.clone(), cancellation),
                Arc::clone(&self.instances),
            )
            .instrument(span),
        );

        info!(workflow = workflow_id, handle = %handle, "Started workflow instance");
        Ok(handle)
    }

    async fn terminate(&self, handle: &WorkflowHandle) -> Result<bool, WorkflowError> {
        let mut status = {
            let instances = self.instances.lock().await;
            let entry = instances
                .get(handle)
                .ok_or_else(|| WorkflowError::UnknownInstance(handle.clone()))?;
            entry.cancellation.cancel();
            entry.status.subscribe()
        };

        let acknowledged =
            tokio::time::timeout(self.termination_grace, status.wait_for(InstanceStatus::is_terminal)).await;

        match acknowledged {
            Ok(Ok(final_status)) => {
                info!(handle = %handle, status = ?*final_status, "Workflow instance stopped");
                Ok(true)
            }
            Ok(Err(_)) => Err(WorkflowError::UnknownInstance(handle.clone())),
            Err(_) => {
                warn!(
                    handle = %handle,
                    grace_ms = self.termination_grace.as_millis() as u64,
                    "Workflow instance ignored cancellation"
                );
                Ok(false)
            }
        }
    }

    async fn status(&self, handle: &WorkflowHandle) -> Option<InstanceStatus> {
        self.instances
            .lock()
            .await
            .get(handle)
            .map(|entry| status_of(&entry.lifecycle))
    }
}

fn retain_unfinished(instances: &mut HashMap<WorkflowHandle, InstanceEntry>) -> usize {
    let before = instances.len();
    instances.retain(|_, entry| !status_of(&entry.lifecycle).is_terminal());
    before - instances.len()
}

async fn record(instances: &Instances, handle: &WorkflowHandle, event: InstanceEvent) {
    if let Some(entry) = instances.lock().await.get_mut(handle) {
        entry.apply(event);
    }
}

async fn run_instance(
    handle: WorkflowHandle,
    steps: Vec<Arc<dyn WorkflowStep>>,
    ctx: StepContext,
    instances: Instances,
) {
    for step in steps {
        if ctx.is_cancellation_requested() {
            record(&instances, &handle, InstanceEvent::Terminate).await;
            return;
        }

        debug!(step = step.name(), "Running workflow step");
        record(
            &instances,
            &handle,
            InstanceEvent::EnterStep {
                step: step.name().to_string(),
            },
        )
        .await;

        match step.run(&ctx).await {
            Ok(StepOutcome::Continue) => {}
            Ok(StepOutcome::Cancelled) => {
                debug!(step = step.name(), "Step observed cancellation");
                record(&instances, &handle, InstanceEvent::Terminate).await;
                return;
            }
            Err(e) => {
                warn!(step = step.name(), error = %e, "Workflow step failed");
                record(&instances, &handle, InstanceEvent::Fail { reason: e.to_string() }).await;
                return;
            }
        }
    }

    record(&instances, &handle, InstanceEvent::Finish).await;
}

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Controller activity counters
#[derive(Debug, Default)]
pub struct ControllerMetrics {
    pub transitions: AtomicU64,
    pub invalid_triggers: AtomicU64,
    pub stale_callbacks: AtomicU64,
    pub termination_failures: AtomicU64,
    pub preheat_cycles: AtomicU64,
    pub brews_started: AtomicU64,
    pub brews_completed: AtomicU64,
    pub brews_cancelled: AtomicU64,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_trigger(&self) {
        self.invalid_triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_callback(&self) {
        self.stale_callbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_termination_failure(&self) {
        self.termination_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preheat_cycle(&self) {
        self.preheat_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_brew_started(&self) {
        self.brews_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_brew_completed(&self) {
        self.brews_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_brew_cancelled(&self) {
        self.brews_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> ControllerStats {
        ControllerStats {
            transitions: self.transitions.load(Ordering::Relaxed),
            invalid_triggers: self.invalid_triggers.load(Ordering::Relaxed),
            stale_callbacks: self.stale_callbacks.load(Ordering::Relaxed),
            termination_failures: self.termination_failures.load(Ordering::Relaxed),
            preheat_cycles: self.preheat_cycles.load(Ordering::Relaxed),
            brews_started: self.brews_started.load(Ordering::Relaxed),
            brews_completed: self.brews_completed.load(Ordering::Relaxed),
            brews_cancelled: self.brews_cancelled.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            transitions = stats.transitions,
            invalid_triggers = stats.invalid_triggers,
            stale_callbacks = stats.stale_callbacks,
            termination_failures = stats.termination_failures,
            preheat_cycles = stats.preheat_cycles,
            brews_started = stats.brews_started,
            brews_completed = stats.brews_completed,
            brews_cancelled = stats.brews_cancelled,
            "Controller metrics"
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub transitions: u64,
    pub invalid_triggers: u64,
    pub stale_callbacks: u64,
    pub termination_failures: u64,
    pub preheat_cycles: u64,
    pub brews_started: u64,
    pub brews_completed: u64,
    pub brews_cancelled: u64,
}

/// Time an operation and log its duration
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}

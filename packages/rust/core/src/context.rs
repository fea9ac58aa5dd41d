//! Per-run state shared by all steps of one pipeline execution.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use graphloom_cache::ScopedCache;
use graphloom_shared::{GraphloomError, ProgressSnapshot, Result, RunId};
use graphloom_storage::Storage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Progress sink
// ---------------------------------------------------------------------------

/// Callback sink receiving progress snapshots at step boundaries.
pub trait ProgressReporter: Send + Sync {
    /// Called with a point-in-time progress report.
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}
}

// ---------------------------------------------------------------------------
// Run statistics
// ---------------------------------------------------------------------------

/// Elapsed time for one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTiming {
    /// Step name.
    pub step: String,
    /// Wall-clock seconds spent in the step.
    pub seconds: f64,
}

/// Mutable statistics record for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    /// The run this record belongs to.
    pub run_id: RunId,
    /// Workflow name, set by the executor when the run starts.
    pub workflow: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total wall-clock seconds across executed steps.
    pub total_runtime_seconds: f64,
    /// Number of steps executed (including a failed final step).
    pub num_steps: usize,
    /// Per-step timings in execution order.
    pub step_timings: Vec<StepTiming>,
    /// Source text units seen by the run.
    pub text_units: usize,
    /// Finalized entity count, set by the finalize step.
    pub entities: usize,
    /// Finalized relationship count, set by the finalize step.
    pub relationships: usize,
}

impl RunStats {
    /// Fresh statistics for a new run.
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            workflow: String::new(),
            started_at: Utc::now(),
            total_runtime_seconds: 0.0,
            num_steps: 0,
            step_timings: Vec::new(),
            text_units: 0,
            entities: 0,
            relationships: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

/// The mutable state bundle owned exclusively by one pipeline run.
///
/// Later steps read what earlier steps wrote — through the typed state bag,
/// the cache scope, or the storage handles. The context is never shared
/// across concurrent runs; independent runs get independent contexts over
/// distinct cache child scopes.
pub struct RunContext {
    /// Run identifier.
    pub run_id: RunId,
    /// Corpus/input storage handle.
    pub input: Arc<dyn Storage>,
    /// Output storage handle for finalized artifacts.
    pub output: Arc<dyn Storage>,
    /// Previous-run output storage, for incremental updates.
    pub previous: Option<Arc<dyn Storage>>,
    /// This run's cache scope.
    pub cache: ScopedCache,
    /// Progress callback sink.
    pub progress: Arc<dyn ProgressReporter>,
    /// Run statistics, updated by the executor and by steps.
    pub stats: RunStats,
    /// Free-form cross-step state. Consumers must validate expected shapes.
    state: HashMap<String, Value>,
}

impl RunContext {
    /// Create a context over the given storages and cache scope.
    pub fn new(input: Arc<dyn Storage>, output: Arc<dyn Storage>, cache: ScopedCache) -> Self {
        let run_id = RunId::new();
        Self {
            run_id: run_id.clone(),
            input,
            output,
            previous: None,
            cache,
            progress: Arc::new(SilentProgress),
            stats: RunStats::new(run_id),
            state: HashMap::new(),
        }
    }

    /// Attach a previous-run storage handle for incremental updates.
    pub fn with_previous(mut self, previous: Arc<dyn Storage>) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Attach a progress callback sink.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Store a serializable value in the cross-step state bag.
    pub fn state_set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_value(value).map_err(|e| {
            GraphloomError::validation(format!("state value '{key}' is not serializable: {e}"))
        })?;
        self.state.insert(key.to_string(), json);
        Ok(())
    }

    /// Read a typed value from the state bag.
    ///
    /// `Ok(None)` when the key is absent; a shape mismatch is a validation
    /// error, never a silent coercion.
    pub fn state_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.state.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                GraphloomError::validation(format!(
                    "state value '{key}' has unexpected shape: {e}"
                ))
            }),
        }
    }

    /// Raw access to a state entry.
    pub fn state_raw(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Whether a state key is present.
    pub fn state_has(&self, key: &str) -> bool {
        self.state.contains_key(key)
    }

    /// Remove a state entry, returning it.
    pub fn state_remove(&mut self, key: &str) -> Option<Value> {
        self.state.remove(key)
    }
}

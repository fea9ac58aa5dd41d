//! Sequential, fail-fast, cancellable pipeline execution.
//!
//! [`execute`] turns a workflow + context into a [`PipelineRun`]: a
//! forward-only lazy sequence of [`RunResult`]s, one per executed step.
//! Step *n + 1* never starts before step *n*'s result is recorded, because
//! later steps read state written by earlier ones through the shared
//! [`RunContext`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use graphloom_shared::ProgressSnapshot;
use tracing::{info, warn};

use crate::context::RunContext;
use crate::registry::StepRegistry;
use crate::workflow::{StepRef, Workflow};

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation signal shared between a run's driver and steps.
///
/// The executor checks it between steps; steps check it at I/O boundaries.
/// There is no forced preemption.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create an uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Run results
// ---------------------------------------------------------------------------

/// What kind of failure a step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepErrorKind {
    /// The step name could not be resolved against the registry.
    Resolution,
    /// The step body failed.
    Execution,
}

/// A step failure captured into the result stream.
#[derive(Debug, Clone)]
pub struct StepError {
    pub kind: StepErrorKind,
    pub message: String,
}

/// One record per executed step, immutable once produced.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Step name.
    pub step_name: String,
    /// Wall-clock time spent in the step.
    pub elapsed: Duration,
    /// The failure, if the step did not complete.
    pub error: Option<StepError>,
}

impl RunResult {
    /// Whether the step completed without error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Begin executing `workflow` over `context`.
///
/// Nothing runs until the returned [`PipelineRun`] is driven.
pub fn execute(
    workflow: Workflow,
    registry: Arc<StepRegistry>,
    mut context: RunContext,
    cancel: CancelToken,
) -> PipelineRun {
    context.stats.workflow = workflow.name().to_string();
    info!(
        workflow = workflow.name(),
        steps = workflow.len(),
        run_id = %context.run_id,
        "pipeline run starting"
    );
    PipelineRun {
        workflow,
        registry,
        context,
        cancel,
        next_index: 0,
        halted: false,
    }
}

/// A restartable-once lazy sequence of per-step results.
///
/// Consumed forward-only: each [`next_step`](Self::next_step) call executes at
/// most one step. Once exhausted — all steps done, a failure halted the run,
/// or cancellation was observed — it yields `None` forever.
pub struct PipelineRun {
    workflow: Workflow,
    registry: Arc<StepRegistry>,
    context: RunContext,
    cancel: CancelToken,
    next_index: usize,
    halted: bool,
}

impl PipelineRun {
    /// Execute the next step and return its result, or `None` when the
    /// sequence is exhausted.
    pub async fn next_step(&mut self) -> Option<RunResult> {
        if self.halted || self.next_index >= self.workflow.len() {
            return None;
        }
        // Never start a new step once cancellation has been requested.
        if self.cancel.is_cancelled() {
            warn!(
                workflow = self.workflow.name(),
                completed = self.next_index,
                "run cancelled, surfacing partial results"
            );
            self.halted = true;
            return None;
        }

        let index = self.next_index;
        self.next_index += 1;
        let step_ref = self.workflow.steps()[index].clone();
        let step_name = step_ref.name().to_string();

        let step = match &step_ref {
            StepRef::Inline(step) => Arc::clone(step),
            StepRef::Named(name) => match self.registry.resolve(name) {
                Some(step) => step,
                None => {
                    // A missing step is not something later steps can
                    // compensate for; stop issuing work.
                    self.halted = true;
                    return Some(RunResult {
                        step_name,
                        elapsed: Duration::ZERO,
                        error: Some(StepError {
                            kind: StepErrorKind::Resolution,
                            message: format!("no step registered under '{name}'"),
                        }),
                    });
                }
            },
        };

        let started = Instant::now();
        let outcome = step.run(&mut self.context, &self.cancel).await;
        let elapsed = started.elapsed();

        self.context.stats.num_steps += 1;
        self.context.stats.total_runtime_seconds += elapsed.as_secs_f64();
        self.context.stats.step_timings.push(crate::context::StepTiming {
            step: step_name.clone(),
            seconds: elapsed.as_secs_f64(),
        });
        self.context.progress.on_progress(&ProgressSnapshot {
            description: format!("{}: {step_name}", self.workflow.name()),
            total_items: self.workflow.len(),
            completed_items: index + 1,
        });

        let error = match outcome {
            Ok(()) => None,
            Err(e) => {
                // Steps depend on successful predecessors; fail fast.
                warn!(step = %step_name, error = %e, "step failed, halting run");
                self.halted = true;
                Some(StepError {
                    kind: StepErrorKind::Execution,
                    message: e.to_string(),
                })
            }
        };

        Some(RunResult {
            step_name,
            elapsed,
            error,
        })
    }

    /// Drive the remaining steps, collecting their results.
    pub async fn run_to_completion(&mut self) -> Vec<RunResult> {
        let mut results = Vec::new();
        while let Some(result) = self.next_step().await {
            results.push(result);
        }
        results
    }

    /// The run's context (for inspecting state/stats mid-run).
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Recover the context once the caller is done driving the run.
    pub fn into_context(self) -> RunContext {
        self.context
    }
}

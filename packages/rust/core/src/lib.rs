//! Pipeline orchestration core for Graphloom.
//!
//! This crate ties together the scoped cache, storage collaborators, and the
//! graph finalizer into executable workflows:
//! - [`context`] — per-run state ([`RunContext`], [`RunStats`], progress sink)
//! - [`workflow`] — named, ordered step sequences and their builder
//! - [`registry`] — explicit step registration and name resolution
//! - [`executor`] — sequential, fail-fast, cancellable step driving
//! - [`steps`] — built-in indexing steps
//! - [`index`] — the end-to-end `index_corpus` front door

pub mod context;
pub mod executor;
pub mod index;
pub mod registry;
pub mod steps;
pub mod workflow;

pub use context::{ProgressReporter, RunContext, RunStats, SilentProgress, StepTiming};
pub use executor::{CancelToken, PipelineRun, RunResult, StepError, StepErrorKind, execute};
pub use index::{IndexConfig, IndexResult, index_corpus};
pub use registry::{FnStep, PipelineStep, StepFuture, StepRegistry};
pub use workflow::{StepRef, Workflow, WorkflowBuilder};

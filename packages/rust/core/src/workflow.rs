//! Workflow definitions: a named, ordered sequence of step references.

use std::sync::Arc;

use crate::registry::PipelineStep;

/// An opaque handle to a step, resolved by the executor's environment.
#[derive(Clone)]
pub enum StepRef {
    /// Resolved against the [`crate::registry::StepRegistry`] at execution time.
    Named(String),
    /// A step instance carried directly in the workflow.
    Inline(Arc<dyn PipelineStep>),
}

impl StepRef {
    /// The name this reference will report in run results.
    pub fn name(&self) -> &str {
        match self {
            StepRef::Named(name) => name,
            StepRef::Inline(step) => step.name(),
        }
    }
}

impl std::fmt::Debug for StepRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepRef::Named(name) => write!(f, "Named({name})"),
            StepRef::Inline(step) => write!(f, "Inline({})", step.name()),
        }
    }
}

impl From<&str> for StepRef {
    fn from(name: &str) -> Self {
        StepRef::Named(name.to_string())
    }
}

impl From<String> for StepRef {
    fn from(name: String) -> Self {
        StepRef::Named(name)
    }
}

impl From<Arc<dyn PipelineStep>> for StepRef {
    fn from(step: Arc<dyn PipelineStep>) -> Self {
        StepRef::Inline(step)
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// An immutable, named, ordered list of steps. Step order is execution order;
/// there is no implicit parallelism between steps.
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    steps: Vec<StepRef>,
}

impl Workflow {
    /// Start building a workflow with the given name.
    pub fn named(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Workflow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The steps in execution order.
    pub fn steps(&self) -> &[StepRef] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether this is a no-op workflow.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Single-use builder; appends preserve call order. Not for concurrent use.
pub struct WorkflowBuilder {
    name: String,
    steps: Vec<StepRef>,
}

impl WorkflowBuilder {
    /// Append a step reference.
    pub fn step(mut self, step: impl Into<StepRef>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Build the immutable workflow. Zero steps is legal.
    pub fn build(self) -> Workflow {
        Workflow {
            name: self.name,
            steps: self.steps,
        }
    }
}

//! Explicit step registration and name resolution.
//!
//! Steps are late-bound by name, but always through an injected
//! [`StepRegistry`] — never ambient global state or reflection-style lookup.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use graphloom_shared::Result;

use crate::context::RunContext;
use crate::executor::CancelToken;

/// Boxed future returned by a step body.
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// One named unit of work in a pipeline.
///
/// Steps receive exclusive access to the shared run context and must check
/// the cancellation token at I/O boundaries.
pub trait PipelineStep: Send + Sync {
    /// Step name, as referenced by workflows and reported in run results.
    fn name(&self) -> &str;

    /// Execute the step against the run context.
    fn run<'a>(&'a self, ctx: &'a mut RunContext, cancel: &'a CancelToken) -> StepFuture<'a>;
}

// ---------------------------------------------------------------------------
// FnStep
// ---------------------------------------------------------------------------

/// Adapter turning a function into a [`PipelineStep`].
pub struct FnStep<F> {
    name: String,
    body: F,
}

impl<F> FnStep<F>
where
    F: for<'a> Fn(&'a mut RunContext, &'a CancelToken) -> StepFuture<'a> + Send + Sync,
{
    /// Wrap `body` as a step named `name`.
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<F> PipelineStep for FnStep<F>
where
    F: for<'a> Fn(&'a mut RunContext, &'a CancelToken) -> StepFuture<'a> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, ctx: &'a mut RunContext, cancel: &'a CancelToken) -> StepFuture<'a> {
        (self.body)(ctx, cancel)
    }
}

// ---------------------------------------------------------------------------
// StepRegistry
// ---------------------------------------------------------------------------

/// Name → step mapping injected into the executor's environment.
#[derive(Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn PipelineStep>>,
}

impl StepRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in indexing steps
    /// under their default configuration.
    pub fn with_builtin_steps() -> Self {
        let mut registry = Self::new();
        for step in crate::steps::builtin_steps() {
            registry.register(step);
        }
        registry
    }

    /// Register a step under its own name, replacing any previous entry.
    pub fn register(&mut self, step: Arc<dyn PipelineStep>) {
        self.steps.insert(step.name().to_string(), step);
    }

    /// Resolve a step by name.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn PipelineStep>> {
        self.steps.get(name).cloned()
    }

    /// Whether a step name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_state<'a>(ctx: &'a mut RunContext, _cancel: &'a CancelToken) -> StepFuture<'a> {
        Box::pin(async move {
            ctx.state_set("touched", &true)?;
            Ok(())
        })
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = StepRegistry::new();
        registry.register(Arc::new(FnStep::new("touch", touch_state)));

        assert!(registry.contains("touch"));
        let step = registry.resolve("touch").expect("resolve");
        assert_eq!(step.name(), "touch");

        assert!(registry.resolve("missing").is_none());
    }

    #[test]
    fn registration_replaces_previous_entry() {
        let mut registry = StepRegistry::new();
        registry.register(Arc::new(FnStep::new("dup", touch_state)));
        registry.register(Arc::new(FnStep::new("dup", touch_state)));
        assert!(registry.contains("dup"));
    }

    #[test]
    fn builtin_registry_has_index_verbs() {
        let registry = StepRegistry::with_builtin_steps();
        for name in [
            "load_text_units",
            "load_extractions",
            "merge_previous",
            "finalize_graph",
        ] {
            assert!(registry.contains(name), "missing builtin step '{name}'");
        }
    }
}

//! Built-in indexing steps.
//!
//! The standard `index` workflow is: load text units, load extraction seeds,
//! merge seeds from a previous run (incremental updates), finalize the graph.
//! Each step communicates with the next through the run context's state bag.

use std::sync::Arc;

use graphloom_graph::{EntitySeed, FinalizeOptions, RelationshipSeed, finalize};
use graphloom_shared::{
    CURRENT_SCHEMA_VERSION, GraphManifest, GraphloomError, Result, TextUnit,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::executor::CancelToken;
use crate::registry::{PipelineStep, StepFuture};

// ---------------------------------------------------------------------------
// Artifact paths and state keys
// ---------------------------------------------------------------------------

/// Input artifact: the chunked corpus.
pub const TEXT_UNITS_PATH: &str = "text_units.json";
/// Input artifact: raw extraction seeds.
pub const EXTRACTIONS_PATH: &str = "extractions.json";
/// Output artifact: finalized entity rows.
pub const ENTITIES_PATH: &str = "entities.json";
/// Output artifact: finalized relationship rows.
pub const RELATIONSHIPS_PATH: &str = "relationships.json";
/// Output artifact: run manifest.
pub const MANIFEST_PATH: &str = "manifest.json";

/// State key: `Vec<TextUnit>` loaded from the input storage.
pub const STATE_TEXT_UNITS: &str = "text_units";
/// State key: `Vec<EntitySeed>` accumulated for finalization.
pub const STATE_ENTITY_SEEDS: &str = "entity_seeds";
/// State key: `Vec<RelationshipSeed>` accumulated for finalization.
pub const STATE_RELATIONSHIP_SEEDS: &str = "relationship_seeds";

/// On-disk shape of `extractions.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExtraction {
    #[serde(default)]
    pub entities: Vec<EntitySeed>,
    #[serde(default)]
    pub relationships: Vec<RelationshipSeed>,
}

fn parse_json<T: serde::de::DeserializeOwned>(step: &str, path: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| GraphloomError::step(step, format!("malformed {path}: {e}")))
}

fn cancelled(step: &str) -> GraphloomError {
    GraphloomError::step(step, "cancelled")
}

// ---------------------------------------------------------------------------
// load_text_units
// ---------------------------------------------------------------------------

/// Load `text_units.json` from input storage into run state.
///
/// An absent corpus is not an error: a graph can be finalized from extraction
/// seeds alone, so this degrades to an empty list with a warning.
pub struct LoadTextUnitsStep;

impl PipelineStep for LoadTextUnitsStep {
    fn name(&self) -> &str {
        "load_text_units"
    }

    fn run<'a>(&'a self, ctx: &'a mut RunContext, cancel: &'a CancelToken) -> StepFuture<'a> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(cancelled(self.name()));
            }

            let units: Vec<TextUnit> = match ctx.input.get(TEXT_UNITS_PATH).await? {
                Some(bytes) => parse_json(self.name(), TEXT_UNITS_PATH, &bytes)?,
                None => {
                    warn!(path = TEXT_UNITS_PATH, "no text units in input, continuing empty");
                    Vec::new()
                }
            };

            debug!(count = units.len(), "text units loaded");
            ctx.stats.text_units = units.len();
            ctx.state_set(STATE_TEXT_UNITS, &units)
        })
    }
}

// ---------------------------------------------------------------------------
// load_extractions
// ---------------------------------------------------------------------------

/// Load `extractions.json` from input storage into run state.
///
/// The parsed document is memoized in the run's cache, keyed by a sha256 of
/// the raw bytes, so re-indexing an unchanged corpus skips the parse.
pub struct LoadExtractionsStep;

impl PipelineStep for LoadExtractionsStep {
    fn name(&self) -> &str {
        "load_extractions"
    }

    fn run<'a>(&'a self, ctx: &'a mut RunContext, cancel: &'a CancelToken) -> StepFuture<'a> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(cancelled(self.name()));
            }

            let bytes = ctx
                .input
                .get(EXTRACTIONS_PATH)
                .await?
                .ok_or_else(|| {
                    GraphloomError::step(self.name(), format!("{EXTRACTIONS_PATH} not found in input"))
                })?;

            let scope = ctx.cache.child("extract");
            let key = content_hash(&bytes);
            let extraction: RawExtraction = match scope.get_json(&key).await {
                Some(cached) => {
                    debug!(%key, "extraction parse served from cache");
                    cached
                }
                None => {
                    let parsed: RawExtraction =
                        parse_json(self.name(), EXTRACTIONS_PATH, &bytes)?;
                    scope.set_json(&key, &parsed).await;
                    parsed
                }
            };

            debug!(
                entities = extraction.entities.len(),
                relationships = extraction.relationships.len(),
                "extraction seeds loaded"
            );
            ctx.state_set(STATE_ENTITY_SEEDS, &extraction.entities)?;
            ctx.state_set(STATE_RELATIONSHIP_SEEDS, &extraction.relationships)
        })
    }
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// merge_previous
// ---------------------------------------------------------------------------

/// Append extraction seeds from a previous run's storage to this run's state.
///
/// The previous handle points at a prior run's output directory; the seed set
/// read here is the `extractions.json` that run's finalize step persisted.
/// Without a previous-run handle this is a no-op, so the step is safe to keep
/// in the default workflow. Duplicate observations across the two runs merge
/// later, in finalization.
pub struct MergePreviousStep;

impl PipelineStep for MergePreviousStep {
    fn name(&self) -> &str {
        "merge_previous"
    }

    fn run<'a>(&'a self, ctx: &'a mut RunContext, cancel: &'a CancelToken) -> StepFuture<'a> {
        Box::pin(async move {
            let Some(previous) = ctx.previous.clone() else {
                debug!("no previous run attached, skipping merge");
                return Ok(());
            };
            if cancel.is_cancelled() {
                return Err(cancelled(self.name()));
            }

            let Some(bytes) = previous.get(EXTRACTIONS_PATH).await? else {
                warn!(
                    path = EXTRACTIONS_PATH,
                    "previous run has no extraction seeds, skipping merge"
                );
                return Ok(());
            };
            let extraction: RawExtraction = parse_json(self.name(), EXTRACTIONS_PATH, &bytes)?;

            let mut entities: Vec<EntitySeed> =
                ctx.state_get(STATE_ENTITY_SEEDS)?.unwrap_or_default();
            let mut relationships: Vec<RelationshipSeed> =
                ctx.state_get(STATE_RELATIONSHIP_SEEDS)?.unwrap_or_default();

            info!(
                entities = extraction.entities.len(),
                relationships = extraction.relationships.len(),
                "merging seeds from previous run"
            );
            entities.extend(extraction.entities);
            relationships.extend(extraction.relationships);

            ctx.state_set(STATE_ENTITY_SEEDS, &entities)?;
            ctx.state_set(STATE_RELATIONSHIP_SEEDS, &relationships)
        })
    }
}

// ---------------------------------------------------------------------------
// finalize_graph
// ---------------------------------------------------------------------------

/// Deduplicate seeds into finalized rows and write the output artifacts.
///
/// Besides the finalized rows and manifest, the run's merged seed set is
/// persisted to the output as `extractions.json`, so a later run pointed at
/// this output via a previous-run handle can union it.
pub struct FinalizeGraphStep {
    options: FinalizeOptions,
    tool_version: String,
}

impl FinalizeGraphStep {
    pub fn new(options: FinalizeOptions, tool_version: impl Into<String>) -> Self {
        Self {
            options,
            tool_version: tool_version.into(),
        }
    }
}

impl Default for FinalizeGraphStep {
    fn default() -> Self {
        Self::new(FinalizeOptions::default(), env!("CARGO_PKG_VERSION"))
    }
}

impl PipelineStep for FinalizeGraphStep {
    fn name(&self) -> &str {
        "finalize_graph"
    }

    fn run<'a>(&'a self, ctx: &'a mut RunContext, cancel: &'a CancelToken) -> StepFuture<'a> {
        Box::pin(async move {
            let entity_seeds: Vec<EntitySeed> = ctx
                .state_get(STATE_ENTITY_SEEDS)?
                .ok_or_else(|| GraphloomError::step(self.name(), "no entity seeds in state"))?;
            let relationship_seeds: Vec<RelationshipSeed> = ctx
                .state_get(STATE_RELATIONSHIP_SEEDS)?
                .unwrap_or_default();

            let graph = finalize(&entity_seeds, &relationship_seeds, &self.options)
                .map_err(|e| GraphloomError::step(self.name(), e.to_string()))?;

            if cancel.is_cancelled() {
                return Err(cancelled(self.name()));
            }

            let manifest = GraphManifest {
                schema_version: CURRENT_SCHEMA_VERSION,
                run_id: ctx.run_id.clone(),
                workflow: ctx.stats.workflow.clone(),
                tool_version: self.tool_version.clone(),
                created_at: chrono::Utc::now(),
                entity_count: graph.entities.len(),
                relationship_count: graph.relationships.len(),
                text_unit_count: ctx.stats.text_units,
            };

            write_json(ctx, ENTITIES_PATH, &graph.entities).await?;
            write_json(ctx, RELATIONSHIPS_PATH, &graph.relationships).await?;
            write_json(ctx, MANIFEST_PATH, &manifest).await?;
            // Seed set for the next incremental run over this output.
            let seeds = RawExtraction {
                entities: entity_seeds,
                relationships: relationship_seeds,
            };
            write_json(ctx, EXTRACTIONS_PATH, &seeds).await?;

            info!(
                entities = graph.entities.len(),
                relationships = graph.relationships.len(),
                "graph finalized"
            );
            ctx.stats.entities = graph.entities.len();
            ctx.stats.relationships = graph.relationships.len();
            ctx.state_set("finalized_graph", &graph)
        })
    }
}

async fn write_json<T: Serialize>(ctx: &RunContext, path: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| GraphloomError::validation(format!("cannot serialize {path}: {e}")))?;
    ctx.output.set(path, bytes).await
}

/// The built-in steps, under their default configuration.
pub fn builtin_steps() -> Vec<Arc<dyn PipelineStep>> {
    vec![
        Arc::new(LoadTextUnitsStep),
        Arc::new(LoadExtractionsStep),
        Arc::new(MergePreviousStep),
        Arc::new(FinalizeGraphStep::default()),
    ]
}

//! The end-to-end `index_corpus` front door.
//!
//! Wires file-backed storage and cache into a [`RunContext`], runs the
//! standard `index` workflow, and reports the finalized counts.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use graphloom_cache::{CacheStore, FileCacheStore, MemoryCacheStore, ScopedCache};
use graphloom_graph::FinalizeOptions;
use graphloom_shared::{GraphloomError, LayoutConfig, Result, RunId};
use graphloom_storage::{FileStorage, Storage};
use tracing::{info, instrument};

use crate::context::{ProgressReporter, RunContext};
use crate::executor::{CancelToken, StepErrorKind, execute};
use crate::registry::StepRegistry;
use crate::steps::FinalizeGraphStep;
use crate::workflow::Workflow;

/// Output artifact: run statistics.
pub const STATS_PATH: &str = "stats.json";

/// Everything `index_corpus` needs to run.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Directory holding `text_units.json` and `extractions.json`.
    pub input_dir: PathBuf,
    /// Directory the finalized artifacts are written to.
    pub output_dir: PathBuf,
    /// A previous run's output directory, for incremental updates.
    pub previous_dir: Option<PathBuf>,
    /// On-disk cache directory. `None` keeps memoization in memory.
    pub cache_dir: Option<PathBuf>,
    /// Layout settings for the finalize step.
    pub layout: LayoutConfig,
    /// Tool version recorded in the manifest.
    pub tool_version: String,
}

impl IndexConfig {
    /// Config for indexing `input_dir` into `output_dir`, everything else
    /// defaulted.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            previous_dir: None,
            cache_dir: None,
            layout: LayoutConfig::default(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Summary of a completed indexing run.
#[derive(Debug, Clone)]
pub struct IndexResult {
    pub run_id: RunId,
    pub entity_count: usize,
    pub relationship_count: usize,
    pub text_unit_count: usize,
    pub elapsed: Duration,
}

/// Run the standard `index` workflow over a corpus directory.
///
/// Reads `text_units.json` and `extractions.json` from the input directory,
/// writes `entities.json`, `relationships.json`, `manifest.json`, and
/// `stats.json` to the output directory. The first failing step aborts the
/// run and surfaces as an error.
#[instrument(skip_all, fields(input = %config.input_dir.display(), output = %config.output_dir.display()))]
pub async fn index_corpus(
    config: IndexConfig,
    progress: Arc<dyn ProgressReporter>,
) -> Result<IndexResult> {
    let started = Instant::now();

    let input: Arc<dyn Storage> = Arc::new(FileStorage::new(&config.input_dir));
    let output: Arc<dyn Storage> = Arc::new(FileStorage::new(&config.output_dir));
    let store: Arc<dyn CacheStore> = match &config.cache_dir {
        Some(dir) => Arc::new(FileCacheStore::new(dir)),
        None => MemoryCacheStore::shared(),
    };

    // Scope the cache by workflow name: runs of the same workflow share
    // memoized work, other workflows never collide.
    let cache = ScopedCache::root(store).child("index");
    let mut context = RunContext::new(input, output, cache).with_progress(progress);
    if let Some(dir) = &config.previous_dir {
        context = context.with_previous(Arc::new(FileStorage::new(dir)));
    }

    let mut registry = StepRegistry::with_builtin_steps();
    registry.register(Arc::new(FinalizeGraphStep::new(
        FinalizeOptions {
            layout_enabled: config.layout.enabled,
            layout_radius: config.layout.radius,
        },
        config.tool_version.clone(),
    )));

    let workflow = Workflow::named("index")
        .step("load_text_units")
        .step("load_extractions")
        .step("merge_previous")
        .step("finalize_graph")
        .build();

    let mut run = execute(workflow, Arc::new(registry), context, CancelToken::new());
    let results = run.run_to_completion().await;
    let context = run.into_context();

    if let Some(failed) = results.iter().find(|r| !r.is_success()) {
        let error = failed.error.as_ref().map(|e| (e.kind, e.message.clone()));
        return Err(match error {
            Some((StepErrorKind::Resolution, _)) => GraphloomError::StepResolution {
                name: failed.step_name.clone(),
            },
            Some((StepErrorKind::Execution, message)) => GraphloomError::StepExecution {
                step: failed.step_name.clone(),
                message,
            },
            None => GraphloomError::step(&failed.step_name, "unknown failure"),
        });
    }

    let stats_bytes = serde_json::to_vec_pretty(&context.stats)
        .map_err(|e| GraphloomError::validation(format!("cannot serialize run stats: {e}")))?;
    context.output.set(STATS_PATH, stats_bytes).await?;

    let result = IndexResult {
        run_id: context.run_id.clone(),
        entity_count: context.stats.entities,
        relationship_count: context.stats.relationships,
        text_unit_count: context.stats.text_units,
        elapsed: started.elapsed(),
    };
    info!(
        run_id = %result.run_id,
        entities = result.entity_count,
        relationships = result.relationship_count,
        text_units = result.text_unit_count,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "indexing run complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SilentProgress;
    use serde_json::json;
    use uuid::Uuid;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new(label: &str) -> Self {
            let path = std::env::temp_dir().join(format!("graphloom-{label}-{}", Uuid::now_v7()));
            std::fs::create_dir_all(&path).expect("create temp dir");
            Self(path)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn write_input(dir: &TempDir) {
        let units = json!([
            {"id": "tu-1", "document_id": "doc-1", "text": "Alice met Bob at the lab."},
        ]);
        let extraction = json!({
            "entities": [
                {"title": "Alice", "type": "person", "text_unit_ids": ["tu-1"]},
                {"title": "Bob", "type": "person", "text_unit_ids": ["tu-1"]},
            ],
            "relationships": [
                {"source": "Alice", "target": "Bob", "type": "knows", "text_unit_ids": ["tu-1"]},
            ],
        });
        std::fs::write(
            dir.0.join("text_units.json"),
            serde_json::to_vec(&units).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.0.join("extractions.json"),
            serde_json::to_vec(&extraction).unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn indexes_a_corpus_directory_end_to_end() {
        let input = TempDir::new("input");
        let output = TempDir::new("output");
        write_input(&input);

        let result = index_corpus(
            IndexConfig::new(&input.0, &output.0),
            Arc::new(SilentProgress),
        )
        .await
        .expect("indexing succeeds");

        assert_eq!(result.entity_count, 2);
        assert_eq!(result.relationship_count, 1);
        assert_eq!(result.text_unit_count, 1);

        for artifact in [
            "entities.json",
            "relationships.json",
            "manifest.json",
            "stats.json",
        ] {
            assert!(output.0.join(artifact).exists(), "missing {artifact}");
        }
    }

    #[tokio::test]
    async fn missing_extractions_surfaces_step_error() {
        let input = TempDir::new("input");
        let output = TempDir::new("output");
        // Only text units, no extraction seeds.
        std::fs::write(input.0.join("text_units.json"), b"[]").unwrap();

        let err = index_corpus(
            IndexConfig::new(&input.0, &output.0),
            Arc::new(SilentProgress),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, GraphloomError::StepExecution { .. }));
        assert!(err.to_string().contains("extractions.json"));
    }

    #[tokio::test]
    async fn previous_run_seeds_are_merged() {
        let input = TempDir::new("input");
        let output = TempDir::new("output");
        let previous = TempDir::new("previous");
        write_input(&input);

        let prior = json!({
            "entities": [
                {"title": "alice", "type": "Person", "text_unit_ids": ["tu-0"]},
                {"title": "Carol", "type": "person"},
            ],
            "relationships": [],
        });
        std::fs::write(
            previous.0.join("extractions.json"),
            serde_json::to_vec(&prior).unwrap(),
        )
        .unwrap();

        let mut config = IndexConfig::new(&input.0, &output.0);
        config.previous_dir = Some(previous.0.clone());

        let result = index_corpus(config, Arc::new(SilentProgress))
            .await
            .expect("indexing succeeds");

        // "alice" merges into "Alice" case-insensitively; Carol is new.
        assert_eq!(result.entity_count, 3);
    }

    #[tokio::test]
    async fn chained_runs_carry_entities_through_output_dirs() {
        let first_input = TempDir::new("input");
        let first_output = TempDir::new("output");
        let carol_extraction = json!({
            "entities": [{"title": "Carol", "type": "person", "text_unit_ids": ["tu-9"]}],
            "relationships": [],
        });
        std::fs::write(
            first_input.0.join("extractions.json"),
            serde_json::to_vec(&carol_extraction).unwrap(),
        )
        .unwrap();

        index_corpus(
            IndexConfig::new(&first_input.0, &first_output.0),
            Arc::new(SilentProgress),
        )
        .await
        .expect("first run succeeds");

        // Second corpus never mentions Carol; she arrives via the previous
        // run's output directory alone.
        let second_input = TempDir::new("input");
        let second_output = TempDir::new("output");
        write_input(&second_input);

        let mut config = IndexConfig::new(&second_input.0, &second_output.0);
        config.previous_dir = Some(first_output.0.clone());

        let result = index_corpus(config, Arc::new(SilentProgress))
            .await
            .expect("second run succeeds");

        assert_eq!(result.entity_count, 3); // Alice, Bob, Carol
    }

    #[tokio::test]
    async fn on_disk_cache_is_populated() {
        let input = TempDir::new("input");
        let output = TempDir::new("output");
        let cache = TempDir::new("cache");
        write_input(&input);

        let mut config = IndexConfig::new(&input.0, &output.0);
        config.cache_dir = Some(cache.0.clone());

        index_corpus(config, Arc::new(SilentProgress))
            .await
            .expect("indexing succeeds");

        assert!(cache.0.join("index").join("extract").is_dir());
    }
}

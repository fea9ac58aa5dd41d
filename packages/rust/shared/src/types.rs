//! Core domain types for Graphloom knowledge-graph runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for the graph manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// TextUnit
// ---------------------------------------------------------------------------

/// A chunk of source text that extraction evidence points back to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextUnit {
    /// Unique text-unit identifier.
    pub id: String,
    /// Owning document identifier.
    pub document_id: String,
    /// The chunk text.
    pub text: String,
    /// Token count, when the chunker recorded one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_tokens: Option<usize>,
}

// ---------------------------------------------------------------------------
// GraphManifest
// ---------------------------------------------------------------------------

/// The `manifest.json` structure written next to a finalized graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// The pipeline run that produced this graph.
    pub run_id: RunId,
    /// Name of the workflow that ran.
    pub workflow: String,
    /// Tool version that created this graph.
    pub tool_version: String,
    /// When the graph was finalized.
    pub created_at: DateTime<Utc>,
    /// Number of finalized entities.
    pub entity_count: usize,
    /// Number of finalized relationships.
    pub relationship_count: usize,
    /// Number of source text units seen by the run.
    pub text_unit_count: usize,
}

// ---------------------------------------------------------------------------
// ProgressSnapshot
// ---------------------------------------------------------------------------

/// A point-in-time progress report emitted at step boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Human-readable description of the current work.
    pub description: String,
    /// Total items in the current unit of work.
    pub total_items: usize,
    /// Items completed so far.
    pub completed_items: usize,
}

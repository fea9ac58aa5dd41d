//! Seed and record types for graph finalization.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Seeds (raw, pre-deduplication observations)
// ---------------------------------------------------------------------------

/// A raw entity observation produced by an extraction step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySeed {
    /// Entity title as extracted.
    pub title: String,
    /// Entity type (e.g., "person", "organization"). Matched case-insensitively.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Extracted description.
    #[serde(default)]
    pub description: String,
    /// Ids of the text units this observation was extracted from.
    #[serde(default)]
    pub text_unit_ids: Vec<String>,
    /// How many times the extractor saw this entity.
    #[serde(default = "default_frequency")]
    pub frequency: u32,
}

fn default_frequency() -> u32 {
    1
}

/// A raw relationship observation produced by an extraction step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSeed {
    /// Source entity title.
    pub source: String,
    /// Target entity title.
    pub target: String,
    /// Relationship type. Matched case-insensitively.
    #[serde(rename = "type")]
    pub rel_type: String,
    /// Extracted description.
    #[serde(default)]
    pub description: String,
    /// Relationship strength; duplicate observations sum their weights.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Ids of the text units this observation was extracted from.
    #[serde(default)]
    pub text_unit_ids: Vec<String>,
    /// Whether source/target are an unordered pair for deduplication.
    #[serde(default)]
    pub bidirectional: bool,
}

fn default_weight() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Finalized records (immutable rows)
// ---------------------------------------------------------------------------

/// A finalized, deduplicated entity row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Stable content-derived identifier (sha256 of the identity key).
    pub id: String,
    /// Small sequential identifier, 0-based in first-appearance order.
    pub human_readable_id: u32,
    /// Title, first-seen spelling.
    pub title: String,
    /// Entity type, first-seen spelling.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Merged description.
    pub description: String,
    /// Union of evidence text-unit ids, no duplicates.
    pub text_unit_ids: Vec<String>,
    /// Summed observation frequency.
    pub frequency: u32,
    /// Count of distinct graph neighbors (self-loops excluded).
    pub degree: u32,
    /// Layout x coordinate; exactly 0.0 when layout is disabled.
    pub x: f64,
    /// Layout y coordinate; exactly 0.0 when layout is disabled.
    pub y: f64,
}

/// A finalized, deduplicated relationship row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRecord {
    /// Stable content-derived identifier (sha256 of the identity key).
    pub id: String,
    /// Small sequential identifier, 0-based in first-appearance order.
    pub human_readable_id: u32,
    /// Source entity title, first-seen spelling.
    pub source: String,
    /// Target entity title, first-seen spelling.
    pub target: String,
    /// Union of type spellings across merged duplicates, first-seen order.
    pub rel_types: Vec<String>,
    /// Merged description.
    pub description: String,
    /// Summed weight across merged duplicates.
    pub weight: f64,
    /// Source degree + target degree.
    pub combined_degree: u32,
    /// Union of evidence text-unit ids, no duplicates.
    pub text_unit_ids: Vec<String>,
    /// Whether this record absorbed observations in either direction.
    pub bidirectional: bool,
}

/// The finalized graph: entities and relationships in stable order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalizedGraph {
    pub entities: Vec<EntityRecord>,
    pub relationships: Vec<RelationshipRecord>,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options controlling graph finalization.
#[derive(Debug, Clone)]
pub struct FinalizeOptions {
    /// Compute circular layout coordinates. Disabled layouts emit (0, 0).
    pub layout_enabled: bool,
    /// Radius of the layout circle.
    pub layout_radius: f64,
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self {
            layout_enabled: false,
            layout_radius: 1.0,
        }
    }
}

//! Graph finalization: collapse raw extraction seeds into a deduplicated,
//! statistics-annotated knowledge graph.
//!
//! [`finalize`] is a pure function — no I/O, deterministic given identical
//! seeds and options. Upstream steps accumulate [`EntitySeed`] and
//! [`RelationshipSeed`] observations; finalization merges duplicates, assigns
//! stable content-derived ids and sequential human-readable ids, computes
//! node degree, and optionally places entities on a circular layout.

mod finalize;
mod types;

pub use finalize::finalize;
pub use types::{
    EntityRecord, EntitySeed, FinalizeOptions, FinalizedGraph, RelationshipRecord,
    RelationshipSeed,
};

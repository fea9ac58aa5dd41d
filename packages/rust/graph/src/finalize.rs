//! The finalization algorithm: dedup, validate, degree, ids, layout.

use std::collections::{HashMap, HashSet};

use graphloom_shared::{GraphloomError, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::types::{
    EntityRecord, EntitySeed, FinalizeOptions, FinalizedGraph, RelationshipRecord,
    RelationshipSeed,
};

/// Collapse raw seeds into a finalized graph.
///
/// Deterministic given identical inputs and options. A relationship that
/// references an entity absent from the seed set is a validation error and
/// aborts finalization entirely — no partial graph is emitted.
pub fn finalize(
    entity_seeds: &[EntitySeed],
    relationship_seeds: &[RelationshipSeed],
    options: &FinalizeOptions,
) -> Result<FinalizedGraph> {
    let entities = merge_entities(entity_seeds)?;
    let relationships = merge_relationships(relationship_seeds)?;

    validate_references(&entities, &relationships)?;

    let degree_by_title = compute_degrees(&relationships);

    let n = entities.len();
    let finalized_entities: Vec<EntityRecord> = entities
        .into_iter()
        .enumerate()
        .map(|(i, merged)| {
            let degree = degree_by_title
                .get(&merged.title.to_lowercase())
                .map(|neighbors| neighbors.len() as u32)
                .unwrap_or(0);
            let (x, y) = layout_position(i, n, options);
            EntityRecord {
                id: stable_id(&["entity", &merged.key.0, &merged.key.1]),
                human_readable_id: i as u32,
                title: merged.title,
                entity_type: merged.entity_type,
                description: merged.description,
                text_unit_ids: merged.text_unit_ids,
                frequency: merged.frequency,
                degree,
                x,
                y,
            }
        })
        .collect();

    let finalized_relationships: Vec<RelationshipRecord> = relationships
        .into_iter()
        .enumerate()
        .map(|(i, merged)| {
            let source_degree = degree_by_title
                .get(&merged.source.to_lowercase())
                .map(|n| n.len() as u32)
                .unwrap_or(0);
            let target_degree = degree_by_title
                .get(&merged.target.to_lowercase())
                .map(|n| n.len() as u32)
                .unwrap_or(0);
            RelationshipRecord {
                id: stable_id(&["relationship", &merged.key.0, &merged.key.1, &merged.key.2]),
                human_readable_id: i as u32,
                source: merged.source,
                target: merged.target,
                rel_types: merged.rel_types,
                description: merged.description,
                weight: merged.weight,
                combined_degree: source_degree + target_degree,
                text_unit_ids: merged.text_unit_ids,
                bidirectional: merged.bidirectional,
            }
        })
        .collect();

    debug!(
        entities = finalized_entities.len(),
        relationships = finalized_relationships.len(),
        "graph finalized"
    );

    Ok(FinalizedGraph {
        entities: finalized_entities,
        relationships: finalized_relationships,
    })
}

// ---------------------------------------------------------------------------
// Entity dedup
// ---------------------------------------------------------------------------

struct MergedEntity {
    /// (lowercase title, lowercase type) identity key.
    key: (String, String),
    title: String,
    entity_type: String,
    description: String,
    text_unit_ids: Vec<String>,
    frequency: u32,
}

/// Deduplicate entities by case-insensitive (title, type), preserving first
/// appearance order.
fn merge_entities(seeds: &[EntitySeed]) -> Result<Vec<MergedEntity>> {
    let mut merged: Vec<MergedEntity> = Vec::new();
    let mut index_by_key: HashMap<(String, String), usize> = HashMap::new();

    for seed in seeds {
        if seed.title.trim().is_empty() {
            return Err(GraphloomError::validation("entity seed has an empty title"));
        }
        let key = (seed.title.to_lowercase(), seed.entity_type.to_lowercase());

        match index_by_key.get(&key) {
            Some(&i) => {
                let existing = &mut merged[i];
                existing.frequency += seed.frequency;
                union_into(&mut existing.text_unit_ids, &seed.text_unit_ids);
                if existing.description.is_empty() && !seed.description.is_empty() {
                    existing.description = seed.description.clone();
                }
            }
            None => {
                index_by_key.insert(key.clone(), merged.len());
                merged.push(MergedEntity {
                    key,
                    title: seed.title.clone(),
                    entity_type: seed.entity_type.clone(),
                    description: seed.description.clone(),
                    text_unit_ids: dedup_preserving_order(&seed.text_unit_ids),
                    frequency: seed.frequency,
                });
            }
        }
    }

    Ok(merged)
}

// ---------------------------------------------------------------------------
// Relationship dedup
// ---------------------------------------------------------------------------

struct MergedRelationship {
    /// (lowercase source, lowercase target, lowercase type) identity key,
    /// in the orientation of the first observation.
    key: (String, String, String),
    source: String,
    target: String,
    rel_types: Vec<String>,
    description: String,
    weight: f64,
    text_unit_ids: Vec<String>,
    bidirectional: bool,
}

/// Deduplicate relationships by case-insensitive (source, target, type).
///
/// Direction-sensitive by default. A pair is merged symmetrically when either
/// the incoming seed or the already-kept record is bidirectional; the kept
/// record becomes bidirectional after such a merge.
fn merge_relationships(seeds: &[RelationshipSeed]) -> Result<Vec<MergedRelationship>> {
    let mut merged: Vec<MergedRelationship> = Vec::new();
    let mut index_by_key: HashMap<(String, String, String), usize> = HashMap::new();

    for seed in seeds {
        if seed.source.trim().is_empty() || seed.target.trim().is_empty() {
            return Err(GraphloomError::validation(
                "relationship seed has an empty source or target",
            ));
        }

        let forward = (
            seed.source.to_lowercase(),
            seed.target.to_lowercase(),
            seed.rel_type.to_lowercase(),
        );
        let reverse = (forward.1.clone(), forward.0.clone(), forward.2.clone());

        let slot = match index_by_key.get(&forward) {
            Some(&i) => Some(i),
            None => index_by_key.get(&reverse).copied().filter(|&i| {
                // Reversed orientation only merges when one side is unordered.
                seed.bidirectional || merged[i].bidirectional
            }),
        };

        match slot {
            Some(i) => {
                let existing = &mut merged[i];
                existing.weight += seed.weight;
                existing.bidirectional |= seed.bidirectional;
                union_into(&mut existing.text_unit_ids, &seed.text_unit_ids);
                if !existing.rel_types.contains(&seed.rel_type) {
                    existing.rel_types.push(seed.rel_type.clone());
                }
                if existing.description.is_empty() && !seed.description.is_empty() {
                    existing.description = seed.description.clone();
                }
            }
            None => {
                index_by_key.insert(forward.clone(), merged.len());
                merged.push(MergedRelationship {
                    key: forward,
                    source: seed.source.clone(),
                    target: seed.target.clone(),
                    rel_types: vec![seed.rel_type.clone()],
                    description: seed.description.clone(),
                    weight: seed.weight,
                    text_unit_ids: dedup_preserving_order(&seed.text_unit_ids),
                    bidirectional: seed.bidirectional,
                });
            }
        }
    }

    Ok(merged)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Every relationship endpoint must name an entity present in the seed set.
fn validate_references(
    entities: &[MergedEntity],
    relationships: &[MergedRelationship],
) -> Result<()> {
    let titles: HashSet<&str> = entities.iter().map(|e| e.key.0.as_str()).collect();

    for rel in relationships {
        for endpoint in [&rel.source, &rel.target] {
            if !titles.contains(endpoint.to_lowercase().as_str()) {
                return Err(GraphloomError::validation(format!(
                    "relationship '{}' -> '{}' references unknown entity '{endpoint}'",
                    rel.source, rel.target
                )));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Degree and layout
// ---------------------------------------------------------------------------

/// Distinct-neighbor sets per lowercase entity title. Self-loops excluded.
///
/// Relationship endpoints carry titles only, so degree aggregates per title:
/// entities deduplicated as distinct records under the same title (differing
/// type) each report the shared title's neighbor count. For such inputs the
/// sum of entity degrees can exceed twice the relationship count.
fn compute_degrees(relationships: &[MergedRelationship]) -> HashMap<String, HashSet<String>> {
    let mut neighbors: HashMap<String, HashSet<String>> = HashMap::new();

    for rel in relationships {
        let source = rel.source.to_lowercase();
        let target = rel.target.to_lowercase();
        if source == target {
            continue;
        }
        neighbors
            .entry(source.clone())
            .or_default()
            .insert(target.clone());
        neighbors.entry(target).or_default().insert(source);
    }

    neighbors
}

/// Position for the `i`-th of `n` entities: equal angular increments on a
/// circle of the configured radius, or the origin when layout is disabled.
fn layout_position(i: usize, n: usize, options: &FinalizeOptions) -> (f64, f64) {
    if !options.layout_enabled || n == 0 {
        return (0.0, 0.0);
    }
    let angle = 2.0 * std::f64::consts::PI * (i as f64) / (n as f64);
    (
        options.layout_radius * angle.cos(),
        options.layout_radius * angle.sin(),
    )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Content-derived stable id: sha256 over NUL-joined key parts.
fn stable_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Append items from `incoming` not already present, preserving order.
fn union_into(existing: &mut Vec<String>, incoming: &[String]) {
    for id in incoming {
        if !existing.contains(id) {
            existing.push(id.clone());
        }
    }
}

/// First-occurrence dedup of a slice.
fn dedup_preserving_order(ids: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    union_into(&mut out, ids);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(title: &str, entity_type: &str, text_units: &[&str], frequency: u32) -> EntitySeed {
        EntitySeed {
            title: title.into(),
            entity_type: entity_type.into(),
            description: format!("{title} description"),
            text_unit_ids: text_units.iter().map(|s| s.to_string()).collect(),
            frequency,
        }
    }

    fn relationship(source: &str, target: &str, rel_type: &str) -> RelationshipSeed {
        RelationshipSeed {
            source: source.into(),
            target: target.into(),
            rel_type: rel_type.into(),
            description: String::new(),
            weight: 1.0,
            text_unit_ids: vec![],
            bidirectional: false,
        }
    }

    fn default_people() -> Vec<EntitySeed> {
        vec![
            entity("Alice", "person", &["tu-1"], 1),
            entity("Bob", "person", &["tu-2"], 1),
            entity("Discovery", "event", &["tu-3"], 1),
        ]
    }

    #[test]
    fn empty_inputs_yield_empty_graph() {
        let graph = finalize(&[], &[], &FinalizeOptions::default()).expect("finalize");
        assert!(graph.entities.is_empty());
        assert!(graph.relationships.is_empty());
    }

    #[test]
    fn degree_invariant() {
        let relationships = vec![
            relationship("Alice", "Bob", "knows"),
            relationship("Alice", "Discovery", "made"),
        ];
        let graph =
            finalize(&default_people(), &relationships, &FinalizeOptions::default()).unwrap();

        let degree_of = |title: &str| {
            graph
                .entities
                .iter()
                .find(|e| e.title == title)
                .map(|e| e.degree)
                .unwrap()
        };
        assert_eq!(degree_of("Alice"), 2);
        assert_eq!(degree_of("Bob"), 1);
        assert_eq!(degree_of("Discovery"), 1);

        let degree_sum: u32 = graph.entities.iter().map(|e| e.degree).sum();
        assert_eq!(degree_sum as usize, 2 * graph.relationships.len());
    }

    #[test]
    fn combined_degree_is_endpoint_sum() {
        let relationships = vec![
            relationship("Alice", "Bob", "knows"),
            relationship("Alice", "Discovery", "made"),
        ];
        let graph =
            finalize(&default_people(), &relationships, &FinalizeOptions::default()).unwrap();

        let alice_bob = graph
            .relationships
            .iter()
            .find(|r| r.source == "Alice" && r.target == "Bob")
            .unwrap();
        assert_eq!(alice_bob.combined_degree, 3); // Alice(2) + Bob(1)
    }

    #[test]
    fn self_loop_excluded_from_degree() {
        let entities = vec![entity("Alice", "person", &[], 1)];
        let relationships = vec![relationship("Alice", "Alice", "references")];
        let graph = finalize(&entities, &relationships, &FinalizeOptions::default()).unwrap();

        assert_eq!(graph.entities[0].degree, 0);
        assert_eq!(graph.relationships[0].combined_degree, 0);
    }

    #[test]
    fn entity_dedup_merges_case_insensitively() {
        let seeds = vec![
            EntitySeed {
                title: "Alice".into(),
                entity_type: "Person".into(),
                description: String::new(),
                text_unit_ids: vec!["tu-1".into(), "tu-2".into()],
                frequency: 2,
            },
            EntitySeed {
                title: "ALICE".into(),
                entity_type: "person".into(),
                description: "researcher".into(),
                text_unit_ids: vec!["tu-2".into(), "tu-3".into()],
                frequency: 3,
            },
        ];
        let graph = finalize(&seeds, &[], &FinalizeOptions::default()).unwrap();

        assert_eq!(graph.entities.len(), 1);
        let alice = &graph.entities[0];
        assert_eq!(alice.title, "Alice"); // first-seen spelling wins
        assert_eq!(alice.frequency, 5);
        assert_eq!(alice.text_unit_ids, vec!["tu-1", "tu-2", "tu-3"]);
        assert_eq!(alice.description, "researcher"); // first non-empty
    }

    #[test]
    fn shared_title_entities_report_the_title_degree() {
        let entities = vec![
            entity("Mercury", "planet", &[], 1),
            entity("Mercury", "element", &[], 1),
            entity("Earth", "planet", &[], 1),
        ];
        let relationships = vec![relationship("Mercury", "Earth", "neighbors")];
        let graph = finalize(&entities, &relationships, &FinalizeOptions::default()).unwrap();

        // Endpoints carry titles only; both Mercury records absorb the
        // title's single neighbor.
        for e in graph.entities.iter().filter(|e| e.title == "Mercury") {
            assert_eq!(e.degree, 1);
        }
        let degree_sum: u32 = graph.entities.iter().map(|e| e.degree).sum();
        assert_eq!(degree_sum, 3); // exceeds 2 × relationship count here
    }

    #[test]
    fn same_title_different_type_stays_distinct() {
        let seeds = vec![
            entity("Mercury", "planet", &[], 1),
            entity("Mercury", "element", &[], 1),
        ];
        let graph = finalize(&seeds, &[], &FinalizeOptions::default()).unwrap();
        assert_eq!(graph.entities.len(), 2);
        assert_ne!(graph.entities[0].id, graph.entities[1].id);
    }

    #[test]
    fn human_readable_ids_follow_first_appearance() {
        let seeds = vec![
            entity("C", "t", &[], 1),
            entity("A", "t", &[], 1),
            entity("C", "t", &[], 1), // merged into index 0
            entity("B", "t", &[], 1),
        ];
        let graph = finalize(&seeds, &[], &FinalizeOptions::default()).unwrap();

        let order: Vec<(&str, u32)> = graph
            .entities
            .iter()
            .map(|e| (e.title.as_str(), e.human_readable_id))
            .collect();
        assert_eq!(order, vec![("C", 0), ("A", 1), ("B", 2)]);
    }

    #[test]
    fn relationship_dedup_sums_weight_and_unions_evidence() {
        let entities = vec![
            entity("Alice", "person", &[], 1),
            entity("Bob", "person", &[], 1),
        ];
        let seeds = vec![
            RelationshipSeed {
                text_unit_ids: vec!["tu-1".into()],
                weight: 2.0,
                ..relationship("Alice", "Bob", "knows")
            },
            RelationshipSeed {
                text_unit_ids: vec!["tu-1".into(), "tu-2".into()],
                weight: 3.5,
                ..relationship("alice", "bob", "KNOWS")
            },
        ];
        let graph = finalize(&entities, &seeds, &FinalizeOptions::default()).unwrap();

        assert_eq!(graph.relationships.len(), 1);
        let rel = &graph.relationships[0];
        assert_eq!(rel.weight, 5.5);
        assert_eq!(rel.text_unit_ids, vec!["tu-1", "tu-2"]);
        assert_eq!(rel.rel_types, vec!["knows", "KNOWS"]);
    }

    #[test]
    fn directed_opposites_stay_distinct() {
        let entities = vec![
            entity("Alice", "person", &[], 1),
            entity("Bob", "person", &[], 1),
        ];
        let seeds = vec![
            relationship("Alice", "Bob", "mentions"),
            relationship("Bob", "Alice", "mentions"),
        ];
        let graph = finalize(&entities, &seeds, &FinalizeOptions::default()).unwrap();
        assert_eq!(graph.relationships.len(), 2);
    }

    #[test]
    fn bidirectional_seed_merges_reversed_pair() {
        let entities = vec![
            entity("Alice", "person", &[], 1),
            entity("Bob", "person", &[], 1),
        ];
        let seeds = vec![
            relationship("Alice", "Bob", "collaborates"),
            RelationshipSeed {
                bidirectional: true,
                ..relationship("Bob", "Alice", "collaborates")
            },
        ];
        let graph = finalize(&entities, &seeds, &FinalizeOptions::default()).unwrap();

        assert_eq!(graph.relationships.len(), 1);
        let rel = &graph.relationships[0];
        assert_eq!(rel.weight, 2.0);
        // The kept record becomes bidirectional after the merge.
        assert!(rel.bidirectional);
        // Orientation of the first observation is preserved.
        assert_eq!((rel.source.as_str(), rel.target.as_str()), ("Alice", "Bob"));
    }

    #[test]
    fn bidirectional_record_absorbs_later_directed_reverse() {
        let entities = vec![
            entity("Alice", "person", &[], 1),
            entity("Bob", "person", &[], 1),
        ];
        let seeds = vec![
            RelationshipSeed {
                bidirectional: true,
                ..relationship("Alice", "Bob", "collaborates")
            },
            relationship("Bob", "Alice", "collaborates"),
        ];
        let graph = finalize(&entities, &seeds, &FinalizeOptions::default()).unwrap();
        assert_eq!(graph.relationships.len(), 1);
        assert_eq!(graph.relationships[0].weight, 2.0);
    }

    #[test]
    fn unknown_entity_reference_aborts() {
        let entities = vec![entity("Alice", "person", &[], 1)];
        let seeds = vec![relationship("Alice", "Ghost", "haunts")];
        let result = finalize(&entities, &seeds, &FinalizeOptions::default());

        let err = result.expect_err("must reject unknown entity");
        assert!(err.to_string().contains("Ghost"));
    }

    #[test]
    fn layout_disabled_yields_origin() {
        let graph = finalize(
            &default_people(),
            &[],
            &FinalizeOptions {
                layout_enabled: false,
                layout_radius: 100.0,
            },
        )
        .unwrap();

        for e in &graph.entities {
            assert_eq!((e.x, e.y), (0.0, 0.0));
        }
    }

    #[test]
    fn layout_enabled_places_on_circle() {
        let radius = 10.0;
        let graph = finalize(
            &default_people(),
            &[],
            &FinalizeOptions {
                layout_enabled: true,
                layout_radius: radius,
            },
        )
        .unwrap();

        assert!(graph.entities.iter().any(|e| e.x != 0.0 || e.y != 0.0));
        for e in &graph.entities {
            let r = (e.x * e.x + e.y * e.y).sqrt();
            assert!((r - radius).abs() < 1e-9);
        }
        // First entity sits at angle zero.
        assert!((graph.entities[0].x - radius).abs() < 1e-9);
        assert!(graph.entities[0].y.abs() < 1e-9);
    }

    #[test]
    fn finalize_is_deterministic() {
        let entities = vec![
            entity("Alice", "person", &["tu-1"], 2),
            entity("Bob", "person", &["tu-2"], 1),
            entity("alice", "PERSON", &["tu-3"], 1),
        ];
        let relationships = vec![
            relationship("Alice", "Bob", "knows"),
            relationship("Alice", "Bob", "knows"),
        ];
        let options = FinalizeOptions {
            layout_enabled: true,
            layout_radius: 5.0,
        };

        let first = finalize(&entities, &relationships, &options).unwrap();
        let second = finalize(&entities, &relationships, &options).unwrap();

        let a = serde_json::to_string(&first).unwrap();
        let b = serde_json::to_string(&second).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_title_is_validation_error() {
        let seeds = vec![entity("  ", "person", &[], 1)];
        assert!(finalize(&seeds, &[], &FinalizeOptions::default()).is_err());
    }
}

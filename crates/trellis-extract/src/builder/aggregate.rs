//! Per-file edge accumulation.
//!
//! REFERENCES, READS, WRITES, and CALLS aggregate by (from, to): one edge
//! survives per pair, its `occurrencesScan` counts raw observations, and
//! the earliest (line, column) wins along with that observation's
//! representative metadata. Placeholder targets are concretized before
//! keying so a placeholder and its concrete form land in the same bucket.
//! At flush, imported-scope usage rolls up into one DEPENDS_ON per pair
//! and the inferred-edge confidence floor is applied.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use trellis_core::policy::NoisePolicy;
use trellis_core::target::TargetRef;
use trellis_core::types::{RelationType, Relationship, Scope};

use crate::confidence::should_drop;
use crate::index::SymbolIndex;

struct AggregatedEdge {
    edge: Relationship,
    line: u32,
    col: u32,
    count: u32,
}

#[derive(Default)]
pub(crate) struct EdgeAccumulator {
    aggregated: Vec<AggregatedEdge>,
    keys: HashMap<(String, String, RelationType), usize>,
    passthrough: Vec<Relationship>,
    depends_on: HashMap<(String, String), Relationship>,
}

impl EdgeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concretizes the target through the index, pinning the canonical key
    /// to the pre-concretization form so the edge id survives the rewrite.
    /// Ambiguity is recorded on the edge, not resolved.
    pub fn concretize(index: &SymbolIndex, from_file: &str, edge: &mut Relationship) {
        if edge.to_ref.is_none() {
            edge.to_ref = Some(TargetRef::parse(&edge.to_entity_id));
        }
        let result = index.concretize(from_file, &edge.to_entity_id);
        if result.entity_id != edge.to_entity_id {
            edge.to_entity_id = result.entity_id;
        }
        if let Some(count) = result.candidate_count {
            edge.set_meta("ambiguous", true);
            edge.set_meta("candidateCount", count as u64);
        }
    }

    /// Adds an edge that never aggregates (imports, containment, heritage).
    pub fn add_plain(&mut self, edge: Relationship) {
        self.passthrough.push(edge);
    }

    /// Adds an edge through the aggregation rules.
    pub fn add(&mut self, edge: Relationship, line: u32, col: u32) {
        if !edge.rel_type.aggregates() {
            self.passthrough.push(edge);
            return;
        }
        let key = (
            edge.from_entity_id.clone(),
            edge.to_entity_id.clone(),
            edge.rel_type,
        );
        match self.keys.get(&key) {
            Some(&slot) => {
                let bucket = &mut self.aggregated[slot];
                bucket.count += 1;
                if (line, col) < (bucket.line, bucket.col) {
                    // The earliest observation is the representative one.
                    bucket.line = line;
                    bucket.col = col;
                    let count = bucket.count;
                    bucket.edge = edge;
                    bucket.count = count;
                }
            }
            None => {
                self.keys.insert(key, self.aggregated.len());
                self.aggregated.push(AggregatedEdge {
                    edge,
                    line,
                    col,
                    count: 1,
                });
            }
        }
    }

    /// Adds (or keeps) the single DEPENDS_ON for a (from, to) pair.
    pub fn add_depends_on(&mut self, edge: Relationship) {
        let key = (edge.from_entity_id.clone(), edge.to_entity_id.clone());
        self.depends_on.entry(key).or_insert(edge);
    }

    /// Finalizes the pass: occurrence counts, imported-scope DEPENDS_ON
    /// rollups, and the inferred-edge drop rule. Returns surviving edges
    /// and the dropped count.
    pub fn flush(mut self, policy: &NoisePolicy, now: DateTime<Utc>) -> (Vec<Relationship>, usize) {
        // Roll imported-scope aggregated usage into DEPENDS_ON before the
        // buckets are consumed.
        let rollups: Vec<Relationship> = self
            .aggregated
            .iter()
            .filter(|bucket| bucket.edge.scope == Some(Scope::Imported))
            .map(|bucket| {
                let mut edge = Relationship::new(
                    bucket.edge.from_entity_id.clone(),
                    bucket.edge.to_entity_id.clone(),
                    RelationType::DependsOn,
                    now,
                );
                edge.language = bucket.edge.language.clone();
                edge.scope = Some(Scope::Imported);
                edge.resolution_state = bucket.edge.resolution_state;
                edge.confidence = bucket.edge.confidence;
                edge.to_ref = bucket.edge.to_ref.clone();
                edge.set_meta("inferred", true);
                edge
            })
            .collect();
        for rollup in rollups {
            self.add_depends_on(rollup);
        }

        let mut out = Vec::with_capacity(
            self.passthrough.len() + self.aggregated.len() + self.depends_on.len(),
        );
        out.append(&mut self.passthrough);

        for bucket in self.aggregated {
            let mut edge = bucket.edge;
            edge.set_meta("occurrencesScan", bucket.count as u64);
            edge.set_meta("line", bucket.line);
            edge.set_meta("column", bucket.col);
            out.push(edge);
        }

        // Deterministic order for the rollups.
        let mut depends: Vec<Relationship> = self.depends_on.into_values().collect();
        depends.sort_by(|a, b| {
            (&a.from_entity_id, &a.to_entity_id).cmp(&(&b.from_entity_id, &b.to_entity_id))
        });
        out.extend(depends);

        let before = out.len();
        out.retain(|edge| {
            let confidence = edge
                .confidence
                .or_else(|| edge.metadata.get("confidence").and_then(Value::as_f64))
                .unwrap_or(0.0);
            !should_drop(edge.rel_type, &edge.to_entity_id, confidence, policy)
        });
        let dropped = before - out.len();
        (out, dropped)
    }
}

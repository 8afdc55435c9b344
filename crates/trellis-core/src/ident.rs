//! Deterministic identities for relationships and dataflow groups.
//!
//! An edge id is a pure function of (source id, canonical target key,
//! relation type), so re-parsing the same file always reproduces the same
//! ids and a placeholder target that later concretizes to the same logical
//! symbol keeps its id.

use sha1::{Digest, Sha1};

use crate::target::{canonical_target_key, TargetRef};
use crate::types::{RelationType, RelationshipError};

const REL_PREFIX: &str = "rel_";
const STRUCTURAL_PREFIX: &str = "time-rel_";

fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Computes the canonical id for an edge. Structural edge types get the
/// `time-rel_` prefix, everything else `rel_`; the digest itself is always
/// sha1 over `from|TYPE|canonical-target-key`.
pub fn relationship_id(
    from_id: &str,
    to_entity_id: &str,
    to_ref: Option<&TargetRef>,
    rel_type: RelationType,
) -> String {
    let key = canonical_target_key(to_ref, to_entity_id);
    let digest = sha1_hex(&format!("{from_id}|{}|{key}", rel_type.as_str()));
    if rel_type.is_structural() {
        format!("{STRUCTURAL_PREFIX}{digest}")
    } else {
        format!("{REL_PREFIX}{digest}")
    }
}

/// Validating variant of [`relationship_id`]. Empty endpoint ids are
/// programmer errors, the one case the core refuses instead of recovering.
pub fn checked_relationship_id(
    from_id: &str,
    to_entity_id: &str,
    to_ref: Option<&TargetRef>,
    rel_type: RelationType,
) -> Result<String, RelationshipError> {
    if from_id.trim().is_empty() {
        return Err(RelationshipError::MalformedEntityId(from_id.to_string()));
    }
    if to_entity_id.trim().is_empty() && to_ref.is_none() {
        return Err(RelationshipError::MalformedEntityId(
            to_entity_id.to_string(),
        ));
    }
    Ok(relationship_id(from_id, to_entity_id, to_ref, rel_type))
}

/// Stable grouping id for reads and writes of one variable within one
/// enclosing symbol. Same (file, owner, variable) always hashes to the same
/// group, which is what lets downstream consumers correlate the two sides
/// of a dataflow.
pub fn dataflow_id(file: &str, owner_symbol_id: &str, variable: &str) -> String {
    let digest = sha1_hex(&format!("{file}|{owner_symbol_id}|{variable}"));
    format!("df_{}", &digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_deterministic() {
        let a = relationship_id("file:a.ts", "sym:b.ts#f", None, RelationType::Calls);
        let b = relationship_id("file:a.ts", "sym:b.ts#f", None, RelationType::Calls);
        assert_eq!(a, b);
        assert!(a.starts_with("rel_"));
        assert_eq!(a.len(), "rel_".len() + 40);
    }

    #[test]
    fn test_structural_edges_reprefixed() {
        let imports = relationship_id("file:a.ts", "file:b.ts:x", None, RelationType::Imports);
        let exports = relationship_id("file:a.ts", "file:b.ts:x", None, RelationType::Exports);
        assert!(imports.starts_with("time-rel_"));
        assert!(exports.starts_with("time-rel_"));
        assert_ne!(imports, exports);
    }

    #[test]
    fn test_id_stable_across_placeholder_concretization() {
        // A file-symbol ref pins the canonical key even after the raw target
        // id is rewritten to a concrete symbol id.
        let placeholder_ref = TargetRef::FileSymbol {
            file: "src/c.ts".into(),
            symbol: "Foo".into(),
        };
        let before = relationship_id(
            "sym:a.ts#m",
            "file:src/c.ts:Foo",
            Some(&placeholder_ref),
            RelationType::Calls,
        );
        let after = relationship_id(
            "sym:a.ts#m",
            "sym:src/c.ts#Foo",
            Some(&placeholder_ref),
            RelationType::Calls,
        );
        assert_eq!(before, after);
    }

    #[test]
    fn test_distinct_inputs_distinct_ids() {
        let a = relationship_id("file:a.ts", "external:x", None, RelationType::References);
        let b = relationship_id("file:a.ts", "external:y", None, RelationType::References);
        let c = relationship_id("file:a.ts", "external:x", None, RelationType::Reads);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_checked_rejects_empty_ids() {
        assert!(checked_relationship_id("", "sym:x", None, RelationType::Calls).is_err());
        assert!(checked_relationship_id("file:a.ts", " ", None, RelationType::Calls).is_err());
    }

    #[test]
    fn test_dataflow_id_shape_and_grouping() {
        let a = dataflow_id("src/a.ts", "sym:src/a.ts#run", "items");
        let b = dataflow_id("src/a.ts", "sym:src/a.ts#run", "items");
        let c = dataflow_id("src/a.ts", "sym:src/a.ts#other", "items");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("df_"));
        assert_eq!(a.len(), "df_".len() + 12);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::target::TargetRef;

/// Typed relationships between code entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Imports,
    Exports,
    Contains,
    Defines,
    Calls,
    References,
    Reads,
    Writes,
    TypeUses,
    DependsOn,
    Extends,
    Implements,
    Overrides,
    Throws,
    ReturnsType,
    ParamType,
    Tests,
}

impl RelationType {
    /// Returns the uppercase wire name of this relation type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Imports => "IMPORTS",
            RelationType::Exports => "EXPORTS",
            RelationType::Contains => "CONTAINS",
            RelationType::Defines => "DEFINES",
            RelationType::Calls => "CALLS",
            RelationType::References => "REFERENCES",
            RelationType::Reads => "READS",
            RelationType::Writes => "WRITES",
            RelationType::TypeUses => "TYPE_USES",
            RelationType::DependsOn => "DEPENDS_ON",
            RelationType::Extends => "EXTENDS",
            RelationType::Implements => "IMPLEMENTS",
            RelationType::Overrides => "OVERRIDES",
            RelationType::Throws => "THROWS",
            RelationType::ReturnsType => "RETURNS_TYPE",
            RelationType::ParamType => "PARAM_TYPE",
            RelationType::Tests => "TESTS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IMPORTS" => Some(RelationType::Imports),
            "EXPORTS" => Some(RelationType::Exports),
            "CONTAINS" => Some(RelationType::Contains),
            "DEFINES" => Some(RelationType::Defines),
            "CALLS" => Some(RelationType::Calls),
            "REFERENCES" => Some(RelationType::References),
            "READS" => Some(RelationType::Reads),
            "WRITES" => Some(RelationType::Writes),
            "TYPE_USES" => Some(RelationType::TypeUses),
            "DEPENDS_ON" => Some(RelationType::DependsOn),
            "EXTENDS" => Some(RelationType::Extends),
            "IMPLEMENTS" => Some(RelationType::Implements),
            "OVERRIDES" => Some(RelationType::Overrides),
            "THROWS" => Some(RelationType::Throws),
            "RETURNS_TYPE" => Some(RelationType::ReturnsType),
            "PARAM_TYPE" => Some(RelationType::ParamType),
            "TESTS" => Some(RelationType::Tests),
            _ => None,
        }
    }

    /// Structural edges get the `time-rel_` id prefix and the full
    /// import/export field set.
    pub fn is_structural(&self) -> bool {
        matches!(self, RelationType::Imports | RelationType::Exports)
    }

    /// Containment edges resolve trivially and default to high confidence.
    pub fn is_containment(&self) -> bool {
        matches!(self, RelationType::Contains | RelationType::Defines)
    }

    /// Edge types aggregated per (from, to) within a single pass.
    pub fn aggregates(&self) -> bool {
        matches!(
            self,
            RelationType::References
                | RelationType::Reads
                | RelationType::Writes
                | RelationType::Calls
        )
    }

    /// Inferred edge types subject to the minimum-confidence floor.
    /// READS/WRITES count as inferred only when their target is still a
    /// placeholder; callers check that separately.
    pub fn is_inferred(&self) -> bool {
        matches!(self, RelationType::References | RelationType::DependsOn)
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state resolution. Authoritative over the boolean `resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionState {
    Resolved,
    Partial,
    Unresolved,
}

impl ResolutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionState::Resolved => "resolved",
            ResolutionState::Partial => "partial",
            ResolutionState::Unresolved => "unresolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resolved" => Some(ResolutionState::Resolved),
            "partial" => Some(ResolutionState::Partial),
            "unresolved" => Some(ResolutionState::Unresolved),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an edge target lives relative to the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Local,
    Imported,
    External,
    Unknown,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Imported => "imported",
            Scope::External => "external",
            Scope::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Scope::Local),
            "imported" => Some(Scope::Imported),
            "external" => Some(Scope::External),
            "unknown" => Some(Scope::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shape of an import binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportType {
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "named")]
    Named,
    #[serde(rename = "namespace")]
    Namespace,
    #[serde(rename = "wildcard")]
    Wildcard,
    #[serde(rename = "side-effect")]
    SideEffect,
}

impl ImportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportType::Default => "default",
            ImportType::Named => "named",
            ImportType::Namespace => "namespace",
            ImportType::Wildcard => "wildcard",
            ImportType::SideEffect => "side-effect",
        }
    }

    /// Exact (case-insensitive) parse of the canonical names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Some(ImportType::Default),
            "named" => Some(ImportType::Named),
            "namespace" => Some(ImportType::Namespace),
            "wildcard" => Some(ImportType::Wildcard),
            "side-effect" | "sideeffect" | "side_effect" => Some(ImportType::SideEffect),
            _ => None,
        }
    }

    /// Loose derivation from free-form hints (legacy metadata values,
    /// module-path shapes). Substring match, most specific first.
    pub fn from_hint(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        if lower.contains("namespace") {
            Some(ImportType::Namespace)
        } else if lower.contains("wildcard") {
            Some(ImportType::Wildcard)
        } else if lower.contains("side") {
            Some(ImportType::SideEffect)
        } else if lower.contains("default") {
            Some(ImportType::Default)
        } else if lower.contains("named") {
            Some(ImportType::Named)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ImportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, confidence-scored edge between two code entities.
///
/// Built by the relationship builder, canonicalized by the normalizer,
/// projected to flat rows by the structural projector. Field semantics
/// follow the persisted-state contract: optional fields stay `None` until
/// a component has a grounded value for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: String,
    pub from_entity_id: String,
    pub to_entity_id: String,
    #[serde(rename = "type")]
    pub rel_type: RelationType,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_state: Option<ResolutionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_type: Option<ImportType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_namespace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_re_export: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub re_export_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_ref: Option<TargetRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_ref: Option<TargetRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Relationship {
    /// Creates a bare edge with a canonical id and version 1. All optional
    /// fields start absent; the builder fills what it knows and the
    /// normalizer defaults the rest.
    pub fn new(
        from_entity_id: impl Into<String>,
        to_entity_id: impl Into<String>,
        rel_type: RelationType,
        now: DateTime<Utc>,
    ) -> Self {
        let from_entity_id = from_entity_id.into();
        let to_entity_id = to_entity_id.into();
        let id = crate::ident::relationship_id(&from_entity_id, &to_entity_id, None, rel_type);
        Relationship {
            id,
            from_entity_id,
            to_entity_id,
            rel_type,
            created: now,
            last_modified: now,
            version: 1,
            confidence: None,
            resolved: None,
            resolution_state: None,
            import_alias: None,
            import_type: None,
            is_namespace: None,
            is_re_export: None,
            re_export_target: None,
            module_path: None,
            import_depth: None,
            language: None,
            symbol_kind: None,
            scope: None,
            metadata: Map::new(),
            to_ref: None,
            from_ref: None,
            first_seen_at: None,
            last_seen_at: None,
        }
    }

    /// Sets one metadata key, replacing any previous value.
    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }
}

/// Errors surfaced by the core. Expected data anomalies never reach this
/// enum; they degrade to placeholders and defaults instead.
#[derive(Debug, thiserror::Error)]
pub enum RelationshipError {
    #[error("malformed entity id: {0:?}")]
    MalformedEntityId(String),

    #[error("unknown relation type: {0:?}")]
    UnknownRelationType(String),
}

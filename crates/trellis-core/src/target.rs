//! Structured target references.
//!
//! Edge targets are either concrete entity ids (`file:`, `sym:`, `dir:`) or
//! placeholders standing in for a symbol that resolution has not pinned down
//! yet. The placeholder grammar:
//!
//! - `file:<relPath>:<name>` — known file and exported name, no symbol id
//! - `external:<name>` — name-only target, unknown file
//! - `class:<name>` / `interface:<name>` / `function:<name>` /
//!   `typeAlias:<name>` — kind-qualified name-only targets
//!
//! [`TargetRef`] round-trips every form, and the canonical target key used
//! for id derivation is a pure function over it, so ids stay stable across
//! placeholder/concrete transitions of the same logical target.

use serde::{Deserialize, Serialize};

/// Kind qualifier for name-only placeholder targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceholderKind {
    #[serde(rename = "class")]
    Class,
    #[serde(rename = "interface")]
    Interface,
    #[serde(rename = "function")]
    Function,
    #[serde(rename = "typeAlias")]
    TypeAlias,
}

impl PlaceholderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceholderKind::Class => "class",
            PlaceholderKind::Interface => "interface",
            PlaceholderKind::Function => "function",
            PlaceholderKind::TypeAlias => "typeAlias",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "class" => Some(PlaceholderKind::Class),
            "interface" => Some(PlaceholderKind::Interface),
            "function" => Some(PlaceholderKind::Function),
            "typeAlias" => Some(PlaceholderKind::TypeAlias),
            _ => None,
        }
    }
}

/// A structured reference to an edge endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TargetRef {
    /// A concrete entity id (`file:`, `sym:`, `dir:`, `entity:` prefixed).
    Entity { id: String },
    /// A known target file and exported name, unresolved to a symbol id.
    FileSymbol { file: String, symbol: String },
    /// A name-only target with no known file.
    External { name: String },
    /// A kind-qualified name-only target.
    #[serde(rename_all = "camelCase")]
    Placeholder {
        placeholder_kind: PlaceholderKind,
        name: String,
    },
}

impl TargetRef {
    /// Parses an entity id string into its structured form. Total: anything
    /// that is not a recognized placeholder shape is a concrete entity.
    pub fn parse(id: &str) -> TargetRef {
        if let Some(name) = id.strip_prefix("external:") {
            return TargetRef::External {
                name: name.to_string(),
            };
        }
        for kind in [
            PlaceholderKind::Class,
            PlaceholderKind::Interface,
            PlaceholderKind::Function,
            PlaceholderKind::TypeAlias,
        ] {
            let prefix = format!("{}:", kind.as_str());
            if let Some(name) = id.strip_prefix(&prefix) {
                return TargetRef::Placeholder {
                    placeholder_kind: kind,
                    name: name.to_string(),
                };
            }
        }
        if let Some(rest) = id.strip_prefix("file:") {
            // `file:<rel>` is a concrete file entity; a second separator
            // marks the file-symbol placeholder form. Project-relative POSIX
            // paths contain no colons, so the last one splits unambiguously.
            if let Some(split) = rest.rfind(':') {
                let (file, symbol) = rest.split_at(split);
                return TargetRef::FileSymbol {
                    file: file.to_string(),
                    symbol: symbol[1..].to_string(),
                };
            }
        }
        TargetRef::Entity { id: id.to_string() }
    }

    /// The inverse of [`TargetRef::parse`].
    pub fn to_entity_id(&self) -> String {
        match self {
            TargetRef::Entity { id } => id.clone(),
            TargetRef::FileSymbol { file, symbol } => format!("file:{file}:{symbol}"),
            TargetRef::External { name } => format!("external:{name}"),
            TargetRef::Placeholder {
                placeholder_kind,
                name,
            } => format!("{}:{name}", placeholder_kind.as_str()),
        }
    }

    /// True for any non-concrete form.
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, TargetRef::Entity { .. })
    }
}

/// True when an entity id string is one of the placeholder forms.
pub fn is_placeholder_id(id: &str) -> bool {
    TargetRef::parse(id).is_placeholder()
}

/// The canonical target key an edge id is derived from.
///
/// Prefers the structured reference when present; falls back to the literal
/// target id, which covers both placeholder strings and concrete ids.
pub fn canonical_target_key(to_ref: Option<&TargetRef>, to_entity_id: &str) -> String {
    match to_ref {
        Some(TargetRef::FileSymbol { file, symbol }) => format!("file:{file}:{symbol}"),
        Some(TargetRef::External { name }) => format!("external:{name}"),
        // Placeholder strings are used literally; so are concrete ids.
        _ => to_entity_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_concrete_entities() {
        assert_eq!(
            TargetRef::parse("sym:src/a.ts#foo"),
            TargetRef::Entity {
                id: "sym:src/a.ts#foo".into()
            }
        );
        assert_eq!(
            TargetRef::parse("file:src/a.ts"),
            TargetRef::Entity {
                id: "file:src/a.ts".into()
            }
        );
        assert_eq!(
            TargetRef::parse("dir:src"),
            TargetRef::Entity {
                id: "dir:src".into()
            }
        );
    }

    #[test]
    fn test_parse_placeholders() {
        assert_eq!(
            TargetRef::parse("file:src/b.ts:default"),
            TargetRef::FileSymbol {
                file: "src/b.ts".into(),
                symbol: "default".into()
            }
        );
        assert_eq!(
            TargetRef::parse("external:lodash"),
            TargetRef::External {
                name: "lodash".into()
            }
        );
        assert_eq!(
            TargetRef::parse("class:Widget"),
            TargetRef::Placeholder {
                placeholder_kind: PlaceholderKind::Class,
                name: "Widget".into()
            }
        );
        assert_eq!(
            TargetRef::parse("typeAlias:Config"),
            TargetRef::Placeholder {
                placeholder_kind: PlaceholderKind::TypeAlias,
                name: "Config".into()
            }
        );
    }

    #[test]
    fn test_round_trip_every_form() {
        for id in [
            "sym:src/a.ts#foo",
            "file:src/a.ts",
            "file:src/b.ts:default",
            "external:lodash",
            "class:Widget",
            "interface:Shape",
            "function:main",
            "typeAlias:Config",
            "dir:src",
        ] {
            assert_eq!(TargetRef::parse(id).to_entity_id(), id);
        }
    }

    #[test]
    fn test_canonical_key_prefers_structured_ref() {
        let r = TargetRef::FileSymbol {
            file: "src/c.ts".into(),
            symbol: "default".into(),
        };
        assert_eq!(
            canonical_target_key(Some(&r), "sym:stale#id"),
            "file:src/c.ts:default"
        );
        let e = TargetRef::External {
            name: "lodash".into(),
        };
        assert_eq!(canonical_target_key(Some(&e), "whatever"), "external:lodash");
    }

    #[test]
    fn test_canonical_key_matches_placeholder_parse() {
        // Property: key derived from the parsed ref equals the key derived
        // from the placeholder string itself.
        for id in ["file:src/b.ts:Foo", "external:fetch", "interface:Shape"] {
            let parsed = TargetRef::parse(id);
            assert_eq!(canonical_target_key(Some(&parsed), id), id);
            assert_eq!(canonical_target_key(None, id), id);
        }
    }

    #[test]
    fn test_serde_shape() {
        let r = TargetRef::FileSymbol {
            file: "a.ts".into(),
            symbol: "x".into(),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["kind"], "fileSymbol");
        assert_eq!(json["file"], "a.ts");
        assert_eq!(json["symbol"], "x");
    }
}

//! EXTENDS / IMPLEMENTS / OVERRIDES from class heritage clauses.

use tree_sitter::Node;

use trellis_core::target::{PlaceholderKind, TargetRef};
use trellis_core::types::{RelationType, ResolutionState, Scope};

use crate::confidence::ResolutionTier;
use crate::entities::{SymbolKind, SymbolRecord};
use crate::treesitter::{node_col, node_line, node_text};

use super::aggregate::EdgeAccumulator;
use super::{BuildContext, ResolvedTarget};

pub(crate) fn emit_heritage(
    ctx: &mut BuildContext<'_>,
    symbol: &SymbolRecord,
    class_node: Node<'_>,
) {
    let mut cursor = class_node.walk();
    let Some(heritage) = class_node
        .children(&mut cursor)
        .find(|c| c.kind() == "class_heritage")
    else {
        return;
    };

    let mut base_file: Option<String> = None;
    let mut inner = heritage.walk();
    let clauses: Vec<Node> = heritage.children(&mut inner).collect();
    for clause in clauses {
        match clause.kind() {
            "extends_clause" => {
                let Some(value) = clause.child_by_field_name("value") else {
                    continue;
                };
                let Some(name) = heritage_name(value, ctx.source) else {
                    continue;
                };
                let resolved = ctx.resolve_type_name(
                    &name,
                    node_line(value),
                    node_col(value),
                    PlaceholderKind::Class,
                );
                base_file = target_file_of(&resolved.target_id);
                emit_clause_edge(ctx, symbol, &resolved, &name, RelationType::Extends, value);
            }
            "implements_clause" => {
                let mut type_cursor = clause.walk();
                let types: Vec<Node> = clause.named_children(&mut type_cursor).collect();
                for type_node in types {
                    let Some(name) = heritage_name(type_node, ctx.source) else {
                        continue;
                    };
                    let resolved = ctx.resolve_type_name(
                        &name,
                        node_line(type_node),
                        node_col(type_node),
                        PlaceholderKind::Interface,
                    );
                    emit_clause_edge(
                        ctx,
                        symbol,
                        &resolved,
                        &name,
                        RelationType::Implements,
                        type_node,
                    );
                }
            }
            _ => {}
        }
    }

    if let Some(base_file) = base_file {
        emit_overrides(ctx, symbol, &base_file);
    }
}

/// The simple name a heritage expression refers to (`Base`, `ns.Base`,
/// `Base<T>` all yield `Base`).
fn heritage_name(node: Node<'_>, source: &str) -> Option<String> {
    let name = match node.kind() {
        "identifier" | "type_identifier" => node_text(node, source).to_string(),
        "member_expression" => {
            let property = node.child_by_field_name("property")?;
            node_text(property, source).to_string()
        }
        "generic_type" => {
            let inner = node.child_by_field_name("name")?;
            node_text(inner, source).to_string()
        }
        _ => return None,
    };
    (!name.is_empty()).then_some(name)
}

fn emit_clause_edge(
    ctx: &mut BuildContext<'_>,
    symbol: &SymbolRecord,
    resolved: &ResolvedTarget,
    name: &str,
    rel_type: RelationType,
    node: Node<'_>,
) {
    let mut edge = ctx.new_edge(&symbol.id, &resolved.target_id, rel_type);
    ctx.apply_resolution(&mut edge, resolved, Some(name));
    edge.set_meta("line", node_line(node));
    EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
    ctx.acc.add_plain(edge);
}

/// The owning file of a concrete or file-symbol target, when one is known.
fn target_file_of(target_id: &str) -> Option<String> {
    match TargetRef::parse(target_id) {
        TargetRef::FileSymbol { file, .. } => Some(file),
        TargetRef::Entity { id } => {
            let rest = id.strip_prefix("sym:")?;
            let (file, _) = rest.split_once('#')?;
            Some(file.to_string())
        }
        _ => None,
    }
}

/// A method in a class that extends another overrides the base method of
/// the same name, when the index knows that method.
fn emit_overrides(ctx: &mut BuildContext<'_>, class_symbol: &SymbolRecord, base_file: &str) {
    let methods: Vec<SymbolRecord> = ctx
        .output
        .symbols
        .iter()
        .filter(|s| {
            s.kind == SymbolKind::Method && s.parent.as_deref() == Some(class_symbol.name.as_str())
        })
        .cloned()
        .collect();
    for method in methods {
        if method.name == "constructor" {
            continue;
        }
        let Some(base_method) = ctx.index.lookup_in_file(base_file, &method.name) else {
            continue;
        };
        let resolved = ResolvedTarget {
            target_id: base_method.id,
            tier: ResolutionTier::Direct,
            scope: if base_file == ctx.file_rel() {
                Scope::Local
            } else {
                Scope::Imported
            },
            state: ResolutionState::Resolved,
            used_checker: false,
            import_depth: None,
        };
        let mut edge = ctx.new_edge(&method.id, &resolved.target_id, RelationType::Overrides);
        ctx.apply_resolution(&mut edge, &resolved, Some(&method.name));
        edge.set_meta("baseClassFile", base_file);
        edge.set_meta("line", method.line);
        ctx.acc.add_plain(edge);
    }
}

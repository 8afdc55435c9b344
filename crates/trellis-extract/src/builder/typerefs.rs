//! RETURNS_TYPE, PARAM_TYPE, and file-level TYPE_USES.
//!
//! Signature positions are emitted per symbol and their locations recorded,
//! so the file-level TYPE_USES sweep can skip them and avoid
//! double-counting the same annotation.

use std::collections::HashSet;

use tree_sitter::Node;

use trellis_core::target::PlaceholderKind;
use trellis_core::types::{RelationType, Scope};

use crate::checker::CheckerContext;
use crate::entities::SymbolRecord;
use crate::treesitter::{node_col, node_line, node_text, walk_tree};

use super::aggregate::EdgeAccumulator;
use super::{BuildContext, ResolvedTarget};

/// Built-in type names that never become edge targets.
const PREDEFINED_TYPES: &[&str] = &[
    "any", "bigint", "boolean", "never", "null", "number", "object", "string", "symbol",
    "undefined", "unknown", "void",
];

fn is_predefined(name: &str) -> bool {
    PREDEFINED_TYPES.contains(&name)
}

/// Return-type and parameter-type edges for one function or method.
pub(crate) fn emit_signature_types(
    ctx: &mut BuildContext<'_>,
    symbol: &SymbolRecord,
    declaration: Node<'_>,
) {
    let signature_node = match declaration.kind() {
        "variable_declarator" => match declaration.child_by_field_name("value") {
            Some(value) if value.kind() == "arrow_function" => value,
            _ => return,
        },
        _ => declaration,
    };

    emit_return_type(ctx, symbol, signature_node);
    emit_param_types(ctx, symbol, signature_node);
}

fn emit_return_type(ctx: &mut BuildContext<'_>, symbol: &SymbolRecord, node: Node<'_>) {
    match node.child_by_field_name("return_type") {
        Some(annotation) => {
            let Some((name, type_node)) = primary_type_name(annotation, ctx.source) else {
                return;
            };
            let line = node_line(type_node);
            let col = node_col(type_node);
            ctx.consumed_type_positions.insert((line, col));
            if is_predefined(&name) {
                return;
            }
            let resolved = ctx.resolve_type_name(&name, line, col, PlaceholderKind::TypeAlias);
            let mut edge = ctx.new_edge(&symbol.id, &resolved.target_id, RelationType::ReturnsType);
            ctx.apply_resolution(&mut edge, &resolved, Some(&name));
            edge.set_meta("line", line);
            EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
            ctx.acc.add_plain(edge);
        }
        None => emit_inferred_return_type(ctx, symbol),
    }
}

/// No annotation: ask the checker, within budget. Declined inferences cost
/// a credit but leave no edge.
fn emit_inferred_return_type(ctx: &mut BuildContext<'_>, symbol: &SymbolRecord) {
    let Some(checker) = ctx.checker else {
        return;
    };
    if !crate::checker::should_use_type_checker(
        ctx.budget,
        CheckerContext::Identifier,
        &symbol.name,
        false,
        true,
        ctx.policy,
    ) {
        return;
    }
    if !ctx.budget.try_consume() {
        return;
    }
    let answer = checker.infer_return_type(
        &crate::checker::NodeQuery {
            file: ctx.file_rel(),
            name: &symbol.name,
            line: symbol.line,
            col: symbol.col,
        },
        ctx.deadline,
    );
    let Some(answer) = answer else {
        return;
    };
    if is_predefined(&answer.name) {
        return;
    }
    let resolved = ResolvedTarget {
        target_id: format!("file:{}:{}", answer.file, answer.name),
        tier: crate::confidence::ResolutionTier::TypeChecker,
        scope: if answer.file == ctx.file_rel() {
            Scope::Local
        } else {
            Scope::Imported
        },
        state: trellis_core::types::ResolutionState::Resolved,
        used_checker: true,
        import_depth: None,
    };
    let mut edge = ctx.new_edge(&symbol.id, &resolved.target_id, RelationType::ReturnsType);
    ctx.apply_resolution(&mut edge, &resolved, Some(&answer.name));
    edge.set_meta("inferred", true);
    EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
    ctx.acc.add_plain(edge);
}

fn emit_param_types(ctx: &mut BuildContext<'_>, symbol: &SymbolRecord, node: Node<'_>) {
    let Some(parameters) = node.child_by_field_name("parameters") else {
        return;
    };
    let mut cursor = parameters.walk();
    let params: Vec<Node> = parameters
        .children(&mut cursor)
        .filter(|c| matches!(c.kind(), "required_parameter" | "optional_parameter"))
        .collect();

    for (position, param) in params.iter().enumerate() {
        let Some(annotation) = param.child_by_field_name("type") else {
            continue;
        };
        let Some((name, type_node)) = primary_type_name(annotation, ctx.source) else {
            continue;
        };
        let line = node_line(type_node);
        let col = node_col(type_node);
        ctx.consumed_type_positions.insert((line, col));
        if is_predefined(&name) {
            continue;
        }
        let param_name = param
            .child_by_field_name("pattern")
            .map(|p| node_text(p, ctx.source).to_string())
            .unwrap_or_default();

        let resolved = ctx.resolve_type_name(&name, line, col, PlaceholderKind::TypeAlias);
        let mut edge = ctx.new_edge(&symbol.id, &resolved.target_id, RelationType::ParamType);
        ctx.apply_resolution(&mut edge, &resolved, Some(&name));
        edge.set_meta("param", param_name);
        edge.set_meta("paramIndex", position as u64);
        edge.set_meta("line", line);
        EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
        let target_for_depends = edge.to_entity_id.clone();
        let to_ref = edge.to_ref.clone();
        ctx.acc.add_plain(edge);

        // Parameter types are dependencies, with scope-stepped confidence.
        let mut depends = ctx.new_edge(&symbol.id, &target_for_depends, RelationType::DependsOn);
        depends.to_ref = to_ref;
        depends.scope = Some(resolved.scope);
        depends.resolution_state = Some(resolved.state);
        depends.confidence = Some(match resolved.scope {
            Scope::Local => 0.9,
            Scope::Imported => 0.6,
            Scope::External | Scope::Unknown => 0.4,
        });
        depends.set_meta("inferred", true);
        ctx.acc.add_depends_on(depends);
    }
}

/// The first named type inside an annotation (`: Widget`, `: Widget<T>`,
/// `: ns.Widget` all yield the `Widget` node).
fn primary_type_name<'t>(annotation: Node<'t>, source: &str) -> Option<(String, Node<'t>)> {
    let mut found: Option<(String, Node<'t>)> = None;
    walk_tree(annotation, &mut |node| {
        if found.is_some() {
            return false;
        }
        match node.kind() {
            "type_identifier" => {
                found = Some((node_text(node, source).to_string(), node));
                false
            }
            "predefined_type" => {
                found = Some((node_text(node, source).to_string(), node));
                false
            }
            _ => true,
        }
    });
    found
}

/// File-level TYPE_USES sweep: one edge per (origin, type) pair, skipping
/// the positions already claimed by signature edges.
pub(crate) fn emit_type_uses(ctx: &mut BuildContext<'_>, root: Node<'_>) {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut pending = Vec::new();

    walk_tree(root, &mut |node| {
        if node.kind() != "type_identifier" {
            return true;
        }
        let line = node_line(node);
        let col = node_col(node);
        if ctx.consumed_type_positions.contains(&(line, col)) {
            return false;
        }
        if is_declaration_name(node) {
            return false;
        }
        let name = node_text(node, ctx.source).to_string();
        if is_predefined(&name) || ctx.policy.is_noisy(&name) {
            return false;
        }
        pending.push((name, line, col));
        false
    });

    for (name, line, col) in pending {
        let from = ctx.origin_at(line);
        let resolved = ctx.resolve_type_name(&name, line, col, PlaceholderKind::TypeAlias);
        let mut edge = ctx.new_edge(&from, &resolved.target_id, RelationType::TypeUses);
        ctx.apply_resolution(&mut edge, &resolved, Some(&name));
        edge.set_meta("line", line);
        edge.set_meta("column", col);
        EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
        if !seen.insert((edge.from_entity_id.clone(), edge.to_entity_id.clone())) {
            continue;
        }
        ctx.acc.add_plain(edge);
    }
}

/// True when a type identifier is the declared name itself, not a use.
fn is_declaration_name(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    if !matches!(
        parent.kind(),
        "interface_declaration"
            | "type_alias_declaration"
            | "class_declaration"
            | "abstract_class_declaration"
            | "enum_declaration"
    ) {
        return false;
    }
    parent
        .child_by_field_name("name")
        .is_some_and(|name| name.id() == node.id())
}

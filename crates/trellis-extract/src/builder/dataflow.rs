//! READS / WRITES from assignment expressions.
//!
//! Left-hand identifiers (and every binding of a destructuring pattern)
//! become WRITES; right-hand identifiers and property reads become READS.
//! Both sides carry an `accessPath`, WRITES carry the operator, and reads
//! and writes of the same variable within the same enclosing symbol share
//! a dataflow grouping id.

use tree_sitter::Node;

use trellis_core::ident::dataflow_id;
use trellis_core::types::{RelationType, ResolutionState, Scope};

use crate::checker::CheckerContext;
use crate::confidence::ResolutionTier;
use crate::treesitter::{node_col, node_line, node_text, walk_tree};

use super::aggregate::EdgeAccumulator;
use super::{BuildContext, ResolvedTarget};

pub(crate) fn emit_assignments(ctx: &mut BuildContext<'_>, root: Node<'_>) {
    let mut assignments = Vec::new();
    walk_tree(root, &mut |node| {
        if matches!(
            node.kind(),
            "assignment_expression" | "augmented_assignment_expression"
        ) {
            assignments.push(node);
        }
        true
    });

    for assignment in assignments {
        let Some(left) = assignment.child_by_field_name("left") else {
            continue;
        };
        let Some(right) = assignment.child_by_field_name("right") else {
            continue;
        };
        let operator = assignment
            .child_by_field_name("operator")
            .map(|op| node_text(op, ctx.source).to_string())
            .unwrap_or_else(|| "=".to_string());

        handle_write_side(ctx, left, &operator);
        handle_read_side(ctx, right);
    }
}

fn handle_write_side(ctx: &mut BuildContext<'_>, left: Node<'_>, operator: &str) {
    match left.kind() {
        "identifier" => {
            let name = node_text(left, ctx.source).to_string();
            emit_identifier_write(ctx, left, &name, &name, operator);
        }
        "member_expression" => emit_member_write(ctx, left, operator),
        "subscript_expression" => {
            if let Some(object) = left.child_by_field_name("object") {
                if object.kind() == "identifier" {
                    let base = node_text(object, ctx.source).to_string();
                    let access_path = node_text(left, ctx.source).to_string();
                    emit_identifier_write(ctx, object, &base, &access_path, operator);
                }
            }
        }
        "object_pattern" | "array_pattern" => emit_pattern_writes(ctx, left, operator),
        "parenthesized_expression" => {
            if let Some(inner) = left.named_child(0) {
                handle_write_side(ctx, inner, operator);
            }
        }
        _ => {}
    }
}

fn emit_identifier_write(
    ctx: &mut BuildContext<'_>,
    node: Node<'_>,
    name: &str,
    access_path: &str,
    operator: &str,
) {
    if ctx.policy.is_stop_name(name) {
        return;
    }
    let line = node_line(node);
    let col = node_col(node);
    ctx.write_positions.insert((line, col));
    let from = ctx.origin_at(line);
    let resolved = ctx.resolve_identifier(name, line, col);

    let mut edge = ctx.new_edge(&from, &resolved.target_id, RelationType::Writes);
    ctx.apply_resolution(&mut edge, &resolved, Some(name));
    edge.set_meta("operator", operator);
    edge.set_meta("kind", "write");
    edge.set_meta("accessPath", access_path);
    edge.set_meta("dataFlowId", dataflow_id(ctx.file_rel(), &from, name));
    EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
    ctx.acc.add(edge, line, col);
}

/// `obj.prop = …`: the write lands on the property, resolved through the
/// import map or the checker.
fn emit_member_write(ctx: &mut BuildContext<'_>, member: Node<'_>, operator: &str) {
    let Some(edge_parts) = resolve_property_access(ctx, member) else {
        return;
    };
    let PropertyAccess {
        resolved,
        access_path,
        prop,
        line,
        col,
    } = edge_parts;
    let from = ctx.origin_at(line);

    let mut edge = ctx.new_edge(&from, &resolved.target_id, RelationType::Writes);
    ctx.apply_resolution(&mut edge, &resolved, Some(&prop));
    edge.set_meta("operator", operator);
    edge.set_meta("kind", "write");
    edge.set_meta("accessPath", access_path.clone());
    edge.set_meta("dataFlowId", dataflow_id(ctx.file_rel(), &from, &access_path));
    EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
    ctx.acc.add(edge, line, col);
}

/// Destructuring targets: one WRITES per bound name.
fn emit_pattern_writes(ctx: &mut BuildContext<'_>, pattern: Node<'_>, operator: &str) {
    let mut bindings = Vec::new();
    walk_tree(pattern, &mut |node| {
        match node.kind() {
            "shorthand_property_identifier_pattern" | "identifier" => {
                bindings.push(node);
                false
            }
            "pair_pattern" => {
                // `{ key: localName }` binds the value side only.
                if let Some(value) = node.child_by_field_name("value") {
                    if value.kind() == "identifier" {
                        bindings.push(value);
                    }
                }
                false
            }
            _ => true,
        }
    });
    for binding in bindings {
        let name = node_text(binding, ctx.source).to_string();
        emit_identifier_write(ctx, binding, &name, &name, operator);
    }
}

fn handle_read_side(ctx: &mut BuildContext<'_>, right: Node<'_>) {
    let mut reads: Vec<ReadSite> = Vec::new();
    collect_reads(ctx, right, &mut reads);
    for read in reads {
        let from = ctx.origin_at(read.line);
        let mut edge = ctx.new_edge(&from, &read.resolved.target_id, RelationType::Reads);
        ctx.apply_resolution(&mut edge, &read.resolved, Some(&read.name));
        edge.set_meta("kind", "read");
        edge.set_meta("accessPath", read.access_path.clone());
        edge.set_meta(
            "dataFlowId",
            dataflow_id(ctx.file_rel(), &from, &read.access_path),
        );
        EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
        ctx.acc.add(edge, read.line, read.col);
    }
}

struct ReadSite {
    name: String,
    access_path: String,
    resolved: ResolvedTarget,
    line: u32,
    col: u32,
}

fn collect_reads(ctx: &BuildContext<'_>, node: Node<'_>, out: &mut Vec<ReadSite>) {
    match node.kind() {
        "identifier" => {
            let line = node_line(node);
            let col = node_col(node);
            if ctx.callee_positions.contains(&(line, col)) {
                return;
            }
            let name = node_text(node, ctx.source).to_string();
            if ctx.policy.is_noisy(&name) {
                return;
            }
            let resolved = ctx.resolve_identifier(&name, line, col);
            out.push(ReadSite {
                access_path: name.clone(),
                name,
                resolved,
                line,
                col,
            });
        }
        "member_expression" => {
            if let Some(access) = resolve_property_access(ctx, node) {
                out.push(ReadSite {
                    name: access.prop,
                    access_path: access.access_path,
                    resolved: access.resolved,
                    line: access.line,
                    col: access.col,
                });
            }
        }
        _ => {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            for child in children {
                collect_reads(ctx, child, out);
            }
        }
    }
}

struct PropertyAccess {
    resolved: ResolvedTarget,
    access_path: String,
    prop: String,
    line: u32,
    col: u32,
}

/// Resolves `obj.prop`: imported base through the export map, otherwise
/// the checker, otherwise an external placeholder on the property name.
fn resolve_property_access(ctx: &BuildContext<'_>, member: Node<'_>) -> Option<PropertyAccess> {
    let object = member.child_by_field_name("object")?;
    let property = member.child_by_field_name("property")?;
    let prop = node_text(property, ctx.source).to_string();
    if prop.is_empty() || ctx.policy.is_stop_name(&prop) {
        return None;
    }
    let access_path = node_text(member, ctx.source).to_string();
    let line = node_line(member);
    let col = node_col(member);

    let base = (object.kind() == "identifier").then(|| node_text(object, ctx.source).to_string());

    let resolved = if let Some(binding) = base.as_deref().and_then(|b| ctx.imports.get(b)) {
        let target_id = match binding.module.as_deref() {
            Some(module) => format!("file:{module}:{prop}"),
            None => format!("file:{}:{prop}", binding.specifier),
        };
        ResolvedTarget {
            target_id,
            tier: ResolutionTier::ViaImport,
            scope: Scope::Imported,
            state: if binding.module.is_some() {
                ResolutionState::Resolved
            } else {
                ResolutionState::Partial
            },
            used_checker: false,
            import_depth: Some(binding.depth),
        }
    } else if let Some(answer) = ctx.checker_node(
        CheckerContext::Property,
        &prop,
        line,
        col,
        base.as_deref()
            .is_some_and(|b| ctx.imports.is_imported(b)),
        false,
    ) {
        ResolvedTarget {
            target_id: format!("file:{}:{}", answer.file, answer.name),
            tier: ResolutionTier::TypeChecker,
            scope: if answer.file == ctx.file_rel() {
                Scope::Local
            } else {
                Scope::Imported
            },
            state: ResolutionState::Resolved,
            used_checker: true,
            import_depth: None,
        }
    } else {
        ResolvedTarget::external(&prop)
    };

    Some(PropertyAccess {
        resolved,
        access_path,
        prop,
        line,
        col,
    })
}

//! CALLS extraction (plus THROWS, which shares the symbol-body walk).
//!
//! Callee resolution order for member calls: typed-receiver resolution via
//! the checker, namespace alias, imported base binding; plain identifiers
//! go import binding → local index → checker. Whatever remains becomes an
//! `external:` placeholder. Every call also leaves a companion REFERENCES
//! edge, and known-mutating methods leave a WRITES on their receiver.

use tree_sitter::Node;

use trellis_core::ident::dataflow_id;
use trellis_core::target::PlaceholderKind;
use trellis_core::types::{RelationType, ResolutionState, Scope};

use crate::confidence::ResolutionTier;
use crate::entities::SymbolRecord;
use crate::treesitter::{node_col, node_line, node_text};

use super::aggregate::EdgeAccumulator;
use super::{BuildContext, ResolvedTarget};

/// Method names that mutate their receiver in place.
const MUTATING_METHODS: &[&str] = &[
    "add", "clear", "copyWithin", "delete", "fill", "pop", "push", "reverse", "set", "shift",
    "sort", "splice", "unshift",
];

/// Declaration kinds that own their own symbol; the walk stops at them so
/// their calls attribute to the inner symbol, not this one.
fn is_foreign_body(kind: &str) -> bool {
    matches!(
        kind,
        "function_declaration"
            | "generator_function_declaration"
            | "class_declaration"
            | "abstract_class_declaration"
            | "method_definition"
    )
}

/// Walks one symbol's body for call expressions and throw statements.
pub(crate) fn walk_symbol_body(
    ctx: &mut BuildContext<'_>,
    symbol: &SymbolRecord,
    declaration: Node<'_>,
) {
    let Some(body) = body_of(declaration) else {
        return;
    };
    walk_body(ctx, symbol, body);
}

fn body_of(declaration: Node<'_>) -> Option<Node<'_>> {
    if declaration.kind() == "variable_declarator" {
        let value = declaration.child_by_field_name("value")?;
        return value.child_by_field_name("body");
    }
    declaration.child_by_field_name("body")
}

fn walk_body(ctx: &mut BuildContext<'_>, symbol: &SymbolRecord, node: Node<'_>) {
    match node.kind() {
        "call_expression" => handle_call(ctx, symbol, node),
        "throw_statement" => handle_throw(ctx, symbol, node),
        kind if is_foreign_body(kind) => return,
        _ => {}
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        walk_body(ctx, symbol, child);
    }
}

fn handle_call(ctx: &mut BuildContext<'_>, symbol: &SymbolRecord, call: Node<'_>) {
    let Some(callee) = call.child_by_field_name("function") else {
        return;
    };
    let arity = call
        .child_by_field_name("arguments")
        .map(|args| args.named_child_count() as u32)
        .unwrap_or(0);
    let awaited = call
        .parent()
        .is_some_and(|parent| parent.kind() == "await_expression");

    match callee.kind() {
        "identifier" => {
            let name = node_text(callee, ctx.source).to_string();
            ctx.callee_positions
                .insert((node_line(callee), node_col(callee)));
            if ctx.policy.is_stop_name(&name) {
                return;
            }
            let resolved = resolve_identifier_callee(ctx, &name, node_line(callee));
            emit_call(
                ctx, symbol, &resolved, &name, &name, arity, awaited, call, None, false,
            );
        }
        "member_expression" => handle_member_call(ctx, symbol, call, callee, arity, awaited),
        _ => {}
    }
}

/// Ladder for `foo(...)`: imported binding → local index → type checker.
fn resolve_identifier_callee(ctx: &BuildContext<'_>, name: &str, line: u32) -> ResolvedTarget {
    if let Some(resolved) = ctx.resolve_via_import(name) {
        return resolved;
    }
    if let Some(entry) = ctx.index.lookup_in_file(ctx.file_rel(), name) {
        return ResolvedTarget {
            target_id: entry.id,
            tier: ResolutionTier::Direct,
            scope: Scope::Local,
            state: ResolutionState::Resolved,
            used_checker: false,
            import_depth: None,
        };
    }
    if let Some(target) = ctx.checker_call(name, None, None, line) {
        return ResolvedTarget {
            target_id: format!("file:{}:{}", target.file, target.name),
            tier: ResolutionTier::TypeChecker,
            scope: Scope::Imported,
            state: ResolutionState::Resolved,
            used_checker: true,
            import_depth: None,
        };
    }
    ResolvedTarget::external(name)
}

fn handle_member_call(
    ctx: &mut BuildContext<'_>,
    symbol: &SymbolRecord,
    call: Node<'_>,
    member: Node<'_>,
    arity: u32,
    awaited: bool,
) {
    let Some(object) = member.child_by_field_name("object") else {
        return;
    };
    let Some(property) = member.child_by_field_name("property") else {
        return;
    };
    let prop = node_text(property, ctx.source).to_string();
    if ctx.policy.is_stop_name(&prop) {
        return;
    }
    let access_path = node_text(member, ctx.source).to_string();
    let line = node_line(member);

    let base = (object.kind() == "identifier" || object.kind() == "this")
        .then(|| node_text(object, ctx.source).to_string());

    let mut receiver_type = None;
    let mut dynamic_dispatch = false;

    let resolved = 'ladder: {
        // this.method() resolves inside the file before anything else.
        if base.as_deref() == Some("this") {
            if let Some(entry) = ctx.index.lookup_in_file(ctx.file_rel(), &prop) {
                break 'ladder ResolvedTarget {
                    target_id: entry.id,
                    tier: ResolutionTier::Direct,
                    scope: Scope::Local,
                    state: ResolutionState::Resolved,
                    used_checker: false,
                    import_depth: None,
                };
            }
        }
        // Typed-receiver resolution through the checker.
        if let Some(target) =
            ctx.checker_call(&prop, base.as_deref(), Some(&access_path), line)
        {
            receiver_type = target.receiver_type.clone();
            dynamic_dispatch = target.dynamic_dispatch;
            let scope = if target.file == ctx.file_rel() {
                Scope::Local
            } else {
                Scope::Imported
            };
            break 'ladder ResolvedTarget {
                target_id: format!("file:{}:{}", target.file, target.name),
                tier: ResolutionTier::TypeChecker,
                scope,
                state: ResolutionState::Resolved,
                used_checker: true,
                import_depth: None,
            };
        }
        // Namespace alias (`ns.method()`) and imported bases.
        if let Some(base_name) = base.as_deref() {
            if let Some(binding) = ctx.imports.get(base_name).cloned() {
                break 'ladder resolve_member_on_import(ctx, &binding, &prop);
            }
        }
        ResolvedTarget::external(&prop)
    };

    emit_call(
        ctx,
        symbol,
        &resolved,
        &prop,
        &access_path,
        arity,
        awaited,
        call,
        receiver_type,
        dynamic_dispatch,
    );

    // Mutating methods write through their receiver.
    if MUTATING_METHODS.contains(&prop.as_str()) {
        if let Some(base_name) = base.as_deref().filter(|b| *b != "this") {
            emit_mutation_write(ctx, symbol, base_name, &access_path, object);
        }
    }
}

/// Member access on an import binding: deep-resolve the property through
/// the bound module's export surface when it is known.
fn resolve_member_on_import(
    ctx: &BuildContext<'_>,
    binding: &super::imports::ImportBinding,
    prop: &str,
) -> ResolvedTarget {
    if let Some(module) = binding.module.as_deref() {
        if let Some(found) = ctx.exports.resolve_export(module, prop) {
            return ResolvedTarget {
                target_id: format!("file:{}:{}", found.file, found.name),
                tier: ResolutionTier::ViaImport,
                scope: Scope::Imported,
                state: ResolutionState::Resolved,
                used_checker: false,
                import_depth: Some(found.depth + 1),
            };
        }
        return ResolvedTarget {
            target_id: format!("file:{module}:{prop}"),
            tier: ResolutionTier::ViaImport,
            scope: Scope::Imported,
            state: ResolutionState::Resolved,
            used_checker: false,
            import_depth: Some(binding.depth),
        };
    }
    ResolvedTarget {
        target_id: format!("file:{}:{prop}", binding.specifier),
        tier: ResolutionTier::ViaImport,
        scope: Scope::Imported,
        state: ResolutionState::Partial,
        used_checker: false,
        import_depth: Some(binding.depth),
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_call(
    ctx: &mut BuildContext<'_>,
    symbol: &SymbolRecord,
    resolved: &ResolvedTarget,
    callee: &str,
    access_path: &str,
    arity: u32,
    awaited: bool,
    call: Node<'_>,
    receiver_type: Option<String>,
    dynamic_dispatch: bool,
) {
    let line = node_line(call);
    let col = node_col(call);

    let mut edge = ctx.new_edge(&symbol.id, &resolved.target_id, RelationType::Calls);
    ctx.apply_resolution(&mut edge, resolved, Some(callee));
    edge.set_meta("arity", arity);
    if awaited {
        edge.set_meta("awaited", true);
    }
    edge.set_meta("accessPath", access_path);
    edge.set_meta("callee", callee);
    edge.set_meta("file", ctx.file_rel());
    if let Some(receiver) = receiver_type {
        edge.set_meta("receiverType", receiver);
    }
    if dynamic_dispatch {
        edge.set_meta("dynamicDispatch", true);
    }
    EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);

    // Companion REFERENCES mirrors the resolved target.
    let mut reference = ctx.new_edge(&edge.from_entity_id, &edge.to_entity_id, RelationType::References);
    reference.to_ref = edge.to_ref.clone();
    ctx.apply_resolution(&mut reference, resolved, Some(callee));

    ctx.acc.add(edge, line, col);
    ctx.acc.add(reference, line, col);
}

fn emit_mutation_write(
    ctx: &mut BuildContext<'_>,
    symbol: &SymbolRecord,
    base: &str,
    access_path: &str,
    object: Node<'_>,
) {
    let line = node_line(object);
    let col = node_col(object);
    let resolved = ctx.resolve_identifier(base, line, col);
    let mut edge = ctx.new_edge(&symbol.id, &resolved.target_id, RelationType::Writes);
    ctx.apply_resolution(&mut edge, &resolved, Some(base));
    edge.set_meta("operator", "mutate");
    edge.set_meta("kind", "write");
    edge.set_meta("accessPath", access_path);
    edge.set_meta(
        "dataFlowId",
        dataflow_id(ctx.file_rel(), &symbol.id, base),
    );
    EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
    ctx.acc.add(edge, line, col);
}

fn handle_throw(ctx: &mut BuildContext<'_>, symbol: &SymbolRecord, statement: Node<'_>) {
    let mut cursor = statement.walk();
    let Some(new_expr) = statement
        .children(&mut cursor)
        .find(|c| c.kind() == "new_expression")
    else {
        return;
    };
    let Some(constructor) = new_expr.child_by_field_name("constructor") else {
        return;
    };
    if constructor.kind() != "identifier" {
        return;
    }
    let name = node_text(constructor, ctx.source).to_string();
    let line = node_line(constructor);
    let col = node_col(constructor);
    let resolved = ctx.resolve_type_name(&name, line, col, PlaceholderKind::Class);

    let mut edge = ctx.new_edge(&symbol.id, &resolved.target_id, RelationType::Throws);
    ctx.apply_resolution(&mut edge, &resolved, Some(&name));
    edge.set_meta("line", line);
    EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
    ctx.acc.add_plain(edge);
}

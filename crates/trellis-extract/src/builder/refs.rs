//! Identifier REFERENCES, decorator references, and parser-error hints.

use tree_sitter::Node;

use trellis_core::types::{RelationType, ResolutionState, Scope};

use crate::confidence::ResolutionTier;
use crate::entities::SymbolRecord;
use crate::treesitter::{node_col, node_line, node_text, walk_tree};

use super::aggregate::EdgeAccumulator;
use super::{BuildContext, ResolvedTarget};

/// File-level sweep for identifiers that are not declarations, imports,
/// call callees, or assignment targets.
pub(crate) fn emit_identifier_references(ctx: &mut BuildContext<'_>, root: Node<'_>) {
    let mut sites: Vec<(String, u32, u32)> = Vec::new();
    walk_tree(root, &mut |node| {
        match node.kind() {
            // Import lists and export lists name bindings, not uses.
            "import_statement" | "export_clause" | "namespace_export" => return false,
            "identifier" => {
                let line = node_line(node);
                let col = node_col(node);
                if ctx.callee_positions.contains(&(line, col))
                    || ctx.write_positions.contains(&(line, col))
                {
                    return false;
                }
                if is_binding_position(node) {
                    return false;
                }
                let name = node_text(node, ctx.source).to_string();
                if ctx.policy.is_noisy(&name) {
                    return false;
                }
                sites.push((name, line, col));
                return false;
            }
            _ => {}
        }
        true
    });

    for (name, line, col) in sites {
        let from = ctx.origin_at(line);
        let resolved = ctx.resolve_identifier(&name, line, col);
        let mut edge = ctx.new_edge(&from, &resolved.target_id, RelationType::References);
        ctx.apply_resolution(&mut edge, &resolved, Some(&name));
        EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
        ctx.acc.add(edge, line, col);
    }
}

/// True when the identifier names a binding rather than using one.
fn is_binding_position(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return true;
    };
    match parent.kind() {
        "variable_declarator"
        | "function_declaration"
        | "generator_function_declaration"
        | "class_declaration"
        | "abstract_class_declaration"
        | "method_definition"
        | "interface_declaration"
        | "type_alias_declaration"
        | "enum_declaration" => parent
            .child_by_field_name("name")
            .is_some_and(|name| name.id() == node.id()),
        "required_parameter" | "optional_parameter" => parent
            .child_by_field_name("pattern")
            .is_some_and(|pattern| pattern.id() == node.id()),
        "arrow_function" => parent
            .child_by_field_name("parameter")
            .is_some_and(|param| param.id() == node.id()),
        "import_specifier" | "namespace_import" | "import_clause" => true,
        _ => false,
    }
}

/// REFERENCES edges for decorators on a class, its members, or a function.
pub(crate) fn emit_decorators(
    ctx: &mut BuildContext<'_>,
    symbol: &SymbolRecord,
    declaration: Node<'_>,
) {
    let mut decorators = Vec::new();
    walk_tree(declaration, &mut |node| {
        if node.kind() == "decorator" {
            decorators.push(node);
            return false;
        }
        // Do not cross into nested declarations that own their own symbol;
        // method decorators belong to the method's own pass.
        !matches!(
            node.kind(),
            "function_declaration"
                | "class_declaration"
                | "abstract_class_declaration"
                | "method_definition"
        ) || node.id() == declaration.id()
    });
    // Decorators written above an `export class` may attach to the export
    // statement rather than the class node itself.
    if let Some(parent) = declaration.parent() {
        if parent.kind() == "export_statement" {
            let mut cursor = parent.walk();
            for child in parent.children(&mut cursor) {
                if child.kind() == "decorator" {
                    decorators.push(child);
                }
            }
        }
    }

    for decorator in decorators {
        let Some((name, access_path)) = decorator_name(decorator, ctx.source) else {
            continue;
        };
        if ctx.policy.is_noisy(&name) {
            continue;
        }
        let line = node_line(decorator);
        let col = node_col(decorator);
        let resolved = resolve_decorator(ctx, &name, line, col);

        let mut edge = ctx.new_edge(&symbol.id, &resolved.target_id, RelationType::References);
        ctx.apply_resolution(&mut edge, &resolved, Some(&name));
        edge.set_meta("kind", "decorator");
        edge.set_meta("accessPath", access_path);
        edge.set_meta("decorator", name);
        EdgeAccumulator::concretize(ctx.index, ctx.file_rel(), &mut edge);
        ctx.acc.add(edge, line, col);
    }
}

/// `@Injectable()` → ("Injectable", "Injectable()"); `@sealed` →
/// ("sealed", "sealed"); `@ns.memo()` → ("memo", "ns.memo()").
fn decorator_name(decorator: Node<'_>, source: &str) -> Option<(String, String)> {
    let inner = decorator.named_child(0)?;
    match inner.kind() {
        "identifier" => {
            let name = node_text(inner, source).to_string();
            let path = name.clone();
            Some((name, path))
        }
        "member_expression" => {
            let property = inner.child_by_field_name("property")?;
            let name = node_text(property, source).to_string();
            Some((name, node_text(inner, source).to_string()))
        }
        "call_expression" => {
            let callee = inner.child_by_field_name("function")?;
            let (name, callee_path) = match callee.kind() {
                "identifier" => {
                    let n = node_text(callee, source).to_string();
                    (n.clone(), n)
                }
                "member_expression" => {
                    let property = callee.child_by_field_name("property")?;
                    (
                        node_text(property, source).to_string(),
                        node_text(callee, source).to_string(),
                    )
                }
                _ => return None,
            };
            Some((name, format!("{callee_path}()")))
        }
        _ => None,
    }
}

/// Decorator targets resolve import-first: the overwhelmingly common case
/// is a decorator imported from a framework package.
fn resolve_decorator(ctx: &BuildContext<'_>, name: &str, line: u32, col: u32) -> ResolvedTarget {
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
    if let Some(answer) = ctx.checker_node(
        crate::checker::CheckerContext::Decorator,
        name,
        line,
        col,
        false,
        false,
    ) {
        return ResolvedTarget {
            target_id: format!("file:{}:{}", answer.file, answer.name),
            tier: ResolutionTier::TypeChecker,
            scope: Scope::Imported,
            state: ResolutionState::Resolved,
            used_checker: true,
            import_depth: None,
        };
    }
    ResolvedTarget::external(name)
}

/// Syntax errors become best-effort REFERENCES hints against the
/// enclosing symbol, so downstream maintainability tooling can find the
/// damaged regions without the parse aborting.
pub(crate) fn emit_parser_error_hints(ctx: &mut BuildContext<'_>) {
    let file_id = ctx.output.file.entity_id();
    let errors = ctx.output.errors.clone();
    for error in errors {
        let target = ctx
            .output
            .enclosing_symbol(error.line)
            .map(|s| s.id.clone())
            .unwrap_or_else(|| file_id.clone());
        let mut edge = ctx.new_edge(&file_id, &target, RelationType::References);
        edge.resolution_state = Some(ResolutionState::Resolved);
        edge.confidence = Some(0.9);
        edge.set_meta("kind", "maintainability");
        edge.set_meta("message", error.message.clone());
        ctx.acc.add(edge, error.line, error.col);
    }
}

//! IMPORTS/EXPORTS edges and the per-file import binding table.
//!
//! Exactly one IMPORTS edge is emitted per imported target, tagged with
//! its shape (default/named/namespace/wildcard/side-effect). Named and
//! default imports deep-resolve through re-export maps and record how many
//! modules the chain crossed (`importDepth`: 1 = imported straight from
//! the declaring module). Re-exported names produce EXPORTS edges with
//! `isReExport` set.

use std::collections::HashMap;

use tree_sitter::Node;

use trellis_core::types::{ImportType, RelationType, Relationship, ResolutionState};

use crate::exports::{string_literal_value, ExportTarget};
use crate::treesitter::{node_line, node_text, walk_tree};

use super::BuildContext;

/// One local name bound by an import declaration.
#[derive(Debug, Clone)]
pub(crate) struct ImportBinding {
    pub local: String,
    pub import_type: ImportType,
    pub specifier: String,
    /// Project-relative path the specifier resolved to, when local.
    pub module: Option<String>,
    pub imported_name: String,
    /// Modules crossed to reach the declaring module (1 = direct).
    pub depth: u32,
    pub target_id: String,
    pub state: ResolutionState,
    pub is_namespace: bool,
    pub line: u32,
}

/// Local binding name → import evidence.
#[derive(Debug, Clone, Default)]
pub(crate) struct ImportTable {
    bindings: HashMap<String, ImportBinding>,
    /// (specifier, resolved module, line) of bare side-effect imports.
    side_effects: Vec<(String, Option<String>, u32)>,
}

impl ImportTable {
    pub fn get(&self, local: &str) -> Option<&ImportBinding> {
        self.bindings.get(local)
    }

    pub fn is_imported(&self, local: &str) -> bool {
        self.bindings.contains_key(local)
    }

    fn sorted_bindings(&self) -> Vec<&ImportBinding> {
        let mut all: Vec<&ImportBinding> = self.bindings.values().collect();
        all.sort_by_key(|b| (b.line, b.local.clone()));
        all
    }
}

/// Scans every import statement into a binding table.
pub(crate) fn build_import_table(ctx: &BuildContext<'_>, root: Node<'_>) -> ImportTable {
    let mut table = ImportTable::default();
    walk_tree(root, &mut |node| {
        if node.kind() != "import_statement" {
            return node.kind() == "program";
        }
        collect_import_statement(ctx, node, &mut table);
        false
    });
    table
}

fn collect_import_statement(ctx: &BuildContext<'_>, node: Node<'_>, table: &mut ImportTable) {
    let Some(source_node) = node.child_by_field_name("source") else {
        return;
    };
    let specifier = string_literal_value(source_node, ctx.source);
    let line = node_line(node);
    let module = ctx.exports.resolve_specifier(ctx.file_rel(), &specifier);

    let mut cursor = node.walk();
    let clause = node
        .children(&mut cursor)
        .find(|c| c.kind() == "import_clause");
    let Some(clause) = clause else {
        table.side_effects.push((specifier, module, line));
        return;
    };

    let mut inner = clause.walk();
    let parts: Vec<Node> = clause.children(&mut inner).collect();
    for part in parts {
        match part.kind() {
            "identifier" => {
                let local = node_text(part, ctx.source).to_string();
                table.bindings.insert(
                    local.clone(),
                    resolve_binding(ctx, local, ImportType::Default, &specifier, &module, "default", line),
                );
            }
            "namespace_import" => {
                let Some(name_node) = first_identifier(part) else {
                    continue;
                };
                let local = node_text(name_node, ctx.source).to_string();
                let target_id = match &module {
                    Some(m) => format!("file:{m}"),
                    None => format!("module:{specifier}"),
                };
                table.bindings.insert(
                    local.clone(),
                    ImportBinding {
                        local,
                        import_type: ImportType::Namespace,
                        specifier: specifier.clone(),
                        module: module.clone(),
                        imported_name: "*".to_string(),
                        depth: 1,
                        target_id,
                        state: if module.is_some() {
                            ResolutionState::Resolved
                        } else {
                            ResolutionState::Unresolved
                        },
                        is_namespace: true,
                        line,
                    },
                );
            }
            "named_imports" => {
                let mut spec_cursor = part.walk();
                let specs: Vec<Node> = part
                    .children(&mut spec_cursor)
                    .filter(|c| c.kind() == "import_specifier")
                    .collect();
                for spec in specs {
                    let Some(name_node) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let imported = node_text(name_node, ctx.source).to_string();
                    let local = spec
                        .child_by_field_name("alias")
                        .map(|a| node_text(a, ctx.source).to_string())
                        .unwrap_or_else(|| imported.clone());
                    table.bindings.insert(
                        local.clone(),
                        resolve_binding(ctx, local, ImportType::Named, &specifier, &module, &imported, line),
                    );
                }
            }
            _ => {}
        }
    }
}

/// Deep-resolves one default/named binding through the export maps.
fn resolve_binding(
    ctx: &BuildContext<'_>,
    local: String,
    import_type: ImportType,
    specifier: &str,
    module: &Option<String>,
    imported_name: &str,
    line: u32,
) -> ImportBinding {
    let export = module
        .as_deref()
        .and_then(|m| ctx.exports.resolve_export(m, imported_name));
    let (target_id, depth, state) = match (&export, module) {
        (Some(found), _) => (
            format!("file:{}:{}", found.file, found.name),
            found.depth + 1,
            ResolutionState::Resolved,
        ),
        (None, Some(m)) => (
            format!("file:{m}:{imported_name}"),
            1,
            ResolutionState::Partial,
        ),
        (None, None) => (
            format!("file:{specifier}:{imported_name}"),
            1,
            ResolutionState::Unresolved,
        ),
    };
    ImportBinding {
        local,
        import_type,
        specifier: specifier.to_string(),
        module: module.clone(),
        imported_name: imported_name.to_string(),
        depth,
        target_id,
        state,
        is_namespace: false,
        line,
    }
}

fn first_identifier<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor)
        .find(|c| c.kind() == "identifier");
    result
}

/// Emits the IMPORTS edges for the table plus EXPORTS edges for the
/// module's export surface.
pub(crate) fn emit_import_edges(ctx: &mut BuildContext<'_>, _root: Node<'_>) {
    let file_id = ctx.output.file.entity_id();

    let bindings: Vec<ImportBinding> = ctx
        .imports
        .sorted_bindings()
        .into_iter()
        .cloned()
        .collect();
    for binding in bindings {
        let mut edge = ctx.new_edge(&file_id, &binding.target_id, RelationType::Imports);
        edge.import_alias = Some(binding.local.clone());
        edge.import_type = Some(binding.import_type);
        edge.module_path = Some(binding.specifier.clone());
        edge.import_depth = Some(binding.depth);
        edge.resolution_state = Some(binding.state);
        if binding.is_namespace {
            edge.is_namespace = Some(true);
        }
        edge.confidence = Some(crate::confidence::score(
            &crate::confidence::ScoreInput {
                rel_type: RelationType::Imports,
                state: Some(binding.state),
                tier: Some(crate::confidence::ResolutionTier::ViaImport),
                scope: None,
                target_name: Some(&binding.imported_name),
                import_depth: Some(binding.depth),
            },
            ctx.policy,
        ));
        edge.set_meta("importedName", binding.imported_name.clone());
        edge.set_meta("line", binding.line);
        ctx.acc.add_plain(edge);
    }

    let side_effects = ctx.imports.side_effects.clone();
    for (specifier, module, line) in side_effects {
        let target = match &module {
            Some(m) => format!("file:{m}"),
            None => format!("module:{specifier}"),
        };
        let mut edge = ctx.new_edge(&file_id, &target, RelationType::Imports);
        edge.import_type = Some(ImportType::SideEffect);
        edge.module_path = Some(specifier);
        edge.import_depth = Some(1);
        edge.resolution_state = Some(if module.is_some() {
            ResolutionState::Resolved
        } else {
            ResolutionState::Unresolved
        });
        edge.set_meta("line", line);
        ctx.acc.add_plain(edge);
    }

    emit_export_edges(ctx);
}

fn emit_export_edges(ctx: &mut BuildContext<'_>) {
    let file_rel = ctx.file_rel().to_string();
    let file_id = ctx.output.file.entity_id();
    let Some(exports) = ctx.exports.module_exports(&file_rel) else {
        return;
    };

    let mut names: Vec<(&String, &ExportTarget)> = exports.named.iter().collect();
    names.sort_by_key(|(name, _)| name.as_str());

    for (exported, target) in names {
        match target {
            ExportTarget::Declared { local_name } => {
                let to = match ctx.index.lookup_in_file(&file_rel, local_name) {
                    Some(entry) => entry.id,
                    None => format!("file:{file_rel}:{exported}"),
                };
                let mut edge = ctx.new_edge(&file_id, &to, RelationType::Exports);
                edge.resolution_state = Some(ResolutionState::Resolved);
                edge.set_meta("exportedName", exported.clone());
                ctx.acc.add_plain(edge);
            }
            ExportTarget::ReExport {
                specifier,
                original_name,
            } => {
                let deep = ctx.exports.resolve_import(&file_rel, specifier, original_name);
                let (to, depth, state) = match (&deep.export, &deep.module) {
                    (Some(found), _) => (
                        format!("file:{}:{}", found.file, found.name),
                        found.depth + 1,
                        ResolutionState::Resolved,
                    ),
                    (None, Some(m)) => (
                        format!("file:{m}:{original_name}"),
                        1,
                        ResolutionState::Partial,
                    ),
                    (None, None) => (
                        format!("file:{specifier}:{original_name}"),
                        1,
                        ResolutionState::Unresolved,
                    ),
                };
                let mut edge = ctx.new_edge(&file_id, &to, RelationType::Exports);
                edge.is_re_export = Some(true);
                edge.re_export_target =
                    Some(deep.module.clone().unwrap_or_else(|| specifier.clone()));
                edge.module_path = Some(specifier.clone());
                edge.import_depth = Some(depth);
                edge.resolution_state = Some(state);
                edge.import_alias = (exported != original_name).then(|| exported.clone());
                edge.set_meta("exportedName", exported.clone());
                ctx.acc.add_plain(edge);
            }
        }
    }

    for specifier in &exports.wildcards {
        let module = ctx.exports.resolve_specifier(&file_rel, specifier);
        let resolved = module.is_some();
        let target = match &module {
            Some(m) => format!("file:{m}"),
            None => format!("module:{specifier}"),
        };
        let mut edge = ctx.new_edge(&file_id, &target, RelationType::Exports);
        edge.import_type = Some(ImportType::Wildcard);
        edge.is_re_export = Some(true);
        edge.re_export_target = Some(module.unwrap_or_else(|| specifier.clone()));
        edge.module_path = Some(specifier.clone());
        edge.resolution_state = Some(if resolved {
            ResolutionState::Resolved
        } else {
            ResolutionState::Unresolved
        });
        ctx.acc.add_plain(edge);
    }
}

/// Structural import edges for Python and Go parses.
pub(crate) fn emit_foreign_imports(ctx: &mut BuildContext<'_>, root: Node<'_>, grammar: &str) {
    match grammar {
        "python" => emit_python_imports(ctx, root),
        "go" => emit_go_imports(ctx, root),
        _ => {}
    }
}

fn python_module_edge(
    ctx: &BuildContext<'_>,
    target: String,
    module_path: String,
    alias: Option<String>,
    line: u32,
) -> Relationship {
    let file_id = ctx.output.file.entity_id();
    let mut edge = ctx.new_edge(&file_id, &target, RelationType::Imports);
    edge.import_type = Some(ImportType::Named);
    edge.module_path = Some(module_path);
    edge.import_alias = alias;
    edge.import_depth = Some(1);
    edge.resolution_state = Some(ResolutionState::Unresolved);
    edge.set_meta("line", line);
    edge
}

fn emit_python_imports(ctx: &mut BuildContext<'_>, root: Node<'_>) {
    let mut edges = Vec::new();
    walk_tree(root, &mut |node| {
        match node.kind() {
            "import_statement" => {
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    match child.kind() {
                        "dotted_name" => {
                            let module = node_text(child, ctx.source).to_string();
                            let alias = module.rsplit('.').next().map(String::from);
                            edges.push(python_module_edge(
                                ctx,
                                format!("module:{module}"),
                                module,
                                alias,
                                node_line(node),
                            ));
                        }
                        "aliased_import" => {
                            let module = child
                                .child_by_field_name("name")
                                .map(|n| node_text(n, ctx.source).to_string())
                                .unwrap_or_default();
                            let alias = child
                                .child_by_field_name("alias")
                                .map(|n| node_text(n, ctx.source).to_string());
                            if !module.is_empty() {
                                edges.push(python_module_edge(
                                    ctx,
                                    format!("module:{module}"),
                                    module,
                                    alias,
                                    node_line(node),
                                ));
                            }
                        }
                        _ => {}
                    }
                }
                false
            }
            "import_from_statement" => {
                let module_node = node.child_by_field_name("module_name");
                let module = module_node
                    .map(|n| node_text(n, ctx.source).to_string())
                    .unwrap_or_default();
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    let name = match child.kind() {
                        "dotted_name" => {
                            // The module itself appears as a dotted_name too.
                            if module_node.is_some_and(|m| m.id() == child.id()) {
                                continue;
                            }
                            node_text(child, ctx.source).to_string()
                        }
                        "aliased_import" => child
                            .child_by_field_name("name")
                            .map(|n| node_text(n, ctx.source).to_string())
                            .unwrap_or_default(),
                        _ => continue,
                    };
                    if name.is_empty() {
                        continue;
                    }
                    let mut edge = python_module_edge(
                        ctx,
                        format!("external:{name}"),
                        module.clone(),
                        Some(name.clone()),
                        node_line(node),
                    );
                    edge.set_meta("importedName", name);
                    edges.push(edge);
                }
                false
            }
            _ => true,
        }
    });
    for edge in edges {
        ctx.acc.add_plain(edge);
    }
}

fn emit_go_imports(ctx: &mut BuildContext<'_>, root: Node<'_>) {
    let mut edges = Vec::new();
    walk_tree(root, &mut |node| {
        if node.kind() != "import_spec" {
            return true;
        }
        let Some(path_node) = node.child_by_field_name("path") else {
            return false;
        };
        let path = string_literal_value(path_node, ctx.source);
        let alias = node
            .child_by_field_name("name")
            .map(|n| node_text(n, ctx.source).to_string())
            .or_else(|| path.rsplit('/').next().map(String::from));
        let file_id = ctx.output.file.entity_id();
        let mut edge = ctx.new_edge(
            &file_id,
            &format!("module:{path}"),
            RelationType::Imports,
        );
        edge.import_type = Some(ImportType::Named);
        edge.module_path = Some(path);
        edge.import_alias = alias;
        edge.import_depth = Some(1);
        edge.resolution_state = Some(ResolutionState::Unresolved);
        edge.set_meta("line", node_line(node));
        edges.push(edge);
        false
    });
    for edge in edges {
        ctx.acc.add_plain(edge);
    }
}

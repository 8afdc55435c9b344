//! Import/export resolution through re-export chains.
//!
//! Each parsed module commits an export map: exported name → declared
//! symbol or re-export pointer. Deep resolution follows re-export pointers
//! (and `export * from` fan-outs) until it lands on a declaring module,
//! counting hops; a visited set terminates cycles. Module specifiers are
//! resolved to on-disk files with `oxc_resolver`, so `./b` and
//! tsconfig-style extensionless imports behave the way a bundler would
//! treat them.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use oxc_resolver::{ResolveOptions, Resolver};
use tree_sitter::Node;

use crate::treesitter::{node_text, walk_tree};

/// Where one exported name points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// Declared in the module itself, under the given local name.
    Declared { local_name: String },
    /// Re-exported from another module.
    ReExport {
        specifier: String,
        original_name: String,
    },
}

/// The export surface of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleExports {
    /// Exported name → target.
    pub named: HashMap<String, ExportTarget>,
    /// Specifiers of `export * from "…"` statements.
    pub wildcards: Vec<String>,
}

/// A deep-resolved export: the declaring module, the exported name there,
/// and how many re-export hops it took to get there (0 = declared at the
/// asked module).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExport {
    pub file: String,
    pub name: String,
    /// Local name of the declaration when it differs from the exported name.
    pub local_name: Option<String>,
    pub depth: u32,
}

/// Outcome of resolving one imported name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeepImport {
    /// Project-relative path the specifier resolves to, when it is local.
    pub module: Option<String>,
    /// The deep-resolved export, when the name was found.
    pub export: Option<ResolvedExport>,
}

pub struct ExportResolver {
    root: PathBuf,
    maps: DashMap<String, ModuleExports>,
    resolver: Resolver,
}

impl ExportResolver {
    pub fn new(root: &Path) -> Self {
        // Extensionless specifiers must land on files the walker actually
        // ingests, so the candidate list is exactly the TS/JS extension set
        // from `treesitter::detect_language`. Conditions cover ESM `import`
        // only: the builder reads import statements, never `require` calls,
        // and package entrypoints stay unresolved placeholders regardless.
        let options = ResolveOptions {
            extensions: vec![
                ".ts".into(),
                ".tsx".into(),
                ".mts".into(),
                ".cts".into(),
                ".js".into(),
                ".jsx".into(),
                ".mjs".into(),
                ".cjs".into(),
            ],
            condition_names: vec!["import".into(), "default".into()],
            ..ResolveOptions::default()
        };
        Self {
            root: root.to_path_buf(),
            maps: DashMap::new(),
            resolver: Resolver::new(options),
        }
    }

    /// Replaces one module's export map.
    pub fn commit_module(&self, file_rel: &str, exports: ModuleExports) {
        self.maps.insert(file_rel.to_string(), exports);
    }

    pub fn module_exports(&self, file_rel: &str) -> Option<ModuleExports> {
        self.maps.get(file_rel).map(|m| m.clone())
    }

    /// Resolves a specifier relative to the importing file, returning a
    /// project-relative path. `None` for packages and unresolvable paths.
    pub fn resolve_specifier(&self, from_file_rel: &str, specifier: &str) -> Option<String> {
        let from_abs = self.root.join(from_file_rel);
        let dir = from_abs.parent()?;
        let resolution = self.resolver.resolve(dir, specifier).ok()?;
        let full = resolution.full_path();
        let rel = full.strip_prefix(&self.root).ok()?;
        Some(rel.to_string_lossy().replace('\\', "/"))
    }

    /// Deep-resolves an exported name starting at `module_rel`.
    pub fn resolve_export(&self, module_rel: &str, name: &str) -> Option<ResolvedExport> {
        let mut visited = HashSet::new();
        self.resolve_export_inner(module_rel, name, 0, &mut visited)
    }

    fn resolve_export_inner(
        &self,
        module_rel: &str,
        name: &str,
        depth: u32,
        visited: &mut HashSet<String>,
    ) -> Option<ResolvedExport> {
        if !visited.insert(module_rel.to_string()) {
            return None;
        }
        let exports = self.maps.get(module_rel)?.clone();
        match exports.named.get(name) {
            Some(ExportTarget::Declared { local_name }) => Some(ResolvedExport {
                file: module_rel.to_string(),
                name: name.to_string(),
                local_name: (local_name != name).then(|| local_name.clone()),
                depth,
            }),
            Some(ExportTarget::ReExport {
                specifier,
                original_name,
            }) => {
                let next = self.resolve_specifier(module_rel, specifier)?;
                self.resolve_export_inner(&next, original_name, depth + 1, visited)
            }
            None => {
                for specifier in &exports.wildcards {
                    let Some(next) = self.resolve_specifier(module_rel, specifier) else {
                        continue;
                    };
                    if let Some(found) =
                        self.resolve_export_inner(&next, name, depth + 1, visited)
                    {
                        return Some(found);
                    }
                }
                None
            }
        }
    }

    /// Resolves one imported name: specifier → module, then name → deep
    /// export. Both halves degrade independently.
    pub fn resolve_import(
        &self,
        from_file_rel: &str,
        specifier: &str,
        imported_name: &str,
    ) -> DeepImport {
        let module = self.resolve_specifier(from_file_rel, specifier);
        let export = module
            .as_deref()
            .and_then(|m| self.resolve_export(m, imported_name));
        DeepImport { module, export }
    }
}

/// Scans a TypeScript parse for the module's export surface.
pub fn scan_module_exports(root: Node<'_>, source: &str) -> ModuleExports {
    let mut exports = ModuleExports::default();
    walk_tree(root, &mut |node| {
        if node.kind() != "export_statement" {
            return true;
        }
        collect_export_statement(node, source, &mut exports);
        false
    });
    exports
}

fn collect_export_statement(node: Node<'_>, source: &str, exports: &mut ModuleExports) {
    let specifier = node
        .child_by_field_name("source")
        .map(|s| string_literal_value(s, source));

    // `export * from "./m"` (no clause) or `export * as ns from "./m"`.
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in &children {
        match child.kind() {
            "export_clause" => {
                let mut inner = child.walk();
                let specs: Vec<Node> = child
                    .children(&mut inner)
                    .filter(|c| c.kind() == "export_specifier")
                    .collect();
                for spec in specs {
                    let Some(name_node) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let original = node_text(name_node, source).to_string();
                    let exported = spec
                        .child_by_field_name("alias")
                        .map(|a| node_text(a, source).to_string())
                        .unwrap_or_else(|| original.clone());
                    let target = match &specifier {
                        Some(spec_str) => ExportTarget::ReExport {
                            specifier: spec_str.clone(),
                            original_name: original,
                        },
                        None => ExportTarget::Declared {
                            local_name: original,
                        },
                    };
                    exports.named.insert(exported, target);
                }
            }
            "namespace_export" => {
                // `export * as ns from "./m"`: the namespace name is the
                // single identifier inside.
                if let (Some(spec_str), Some(ns)) = (
                    &specifier,
                    child.named_child(0).map(|n| node_text(n, source).to_string()),
                ) {
                    exports.named.insert(
                        ns,
                        ExportTarget::ReExport {
                            specifier: spec_str.clone(),
                            original_name: "*".to_string(),
                        },
                    );
                }
            }
            "*" => {
                if let Some(spec_str) = &specifier {
                    exports.wildcards.push(spec_str.clone());
                }
            }
            _ => {}
        }
    }

    // `export default <decl|expr>` and `export <declaration>`.
    if let Some(decl) = node.child_by_field_name("declaration") {
        let is_default = children.iter().any(|c| c.kind() == "default");
        let local = decl
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string());
        if is_default {
            exports.named.insert(
                "default".to_string(),
                ExportTarget::Declared {
                    local_name: local.unwrap_or_else(|| "default".to_string()),
                },
            );
        } else if let Some(local) = local {
            exports
                .named
                .insert(local.clone(), ExportTarget::Declared { local_name: local });
        } else if matches!(decl.kind(), "lexical_declaration" | "variable_declaration") {
            let mut inner = decl.walk();
            let declarators: Vec<Node> = decl
                .children(&mut inner)
                .filter(|c| c.kind() == "variable_declarator")
                .collect();
            for declarator in declarators {
                if let Some(name_node) = declarator.child_by_field_name("name") {
                    if name_node.kind() == "identifier" {
                        let name = node_text(name_node, source).to_string();
                        exports
                            .named
                            .insert(name.clone(), ExportTarget::Declared { local_name: name });
                    }
                }
            }
        }
    } else if children.iter().any(|c| c.kind() == "default") {
        // `export default someExpression;`
        exports.named.insert(
            "default".to_string(),
            ExportTarget::Declared {
                local_name: "default".to_string(),
            },
        );
    }
}

/// Unquotes a string literal node.
pub fn string_literal_value(node: Node<'_>, source: &str) -> String {
    node_text(node, source)
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treesitter::SourceParser;
    use std::fs;

    fn scan(source: &str) -> ModuleExports {
        let mut parser = SourceParser::new();
        let tree = parser.parse("typescript", source).unwrap();
        scan_module_exports(tree.root_node(), source)
    }

    #[test]
    fn test_scan_declared_exports() {
        let exports = scan(
            "export function run() {}\n\
             export const limit = 3;\n\
             export default class Foo {}\n\
             const hidden = 1;\nexport { hidden as visible };\n",
        );
        assert_eq!(
            exports.named.get("run"),
            Some(&ExportTarget::Declared {
                local_name: "run".into()
            })
        );
        assert_eq!(
            exports.named.get("limit"),
            Some(&ExportTarget::Declared {
                local_name: "limit".into()
            })
        );
        assert_eq!(
            exports.named.get("default"),
            Some(&ExportTarget::Declared {
                local_name: "Foo".into()
            })
        );
        assert_eq!(
            exports.named.get("visible"),
            Some(&ExportTarget::Declared {
                local_name: "hidden".into()
            })
        );
    }

    #[test]
    fn test_scan_re_exports() {
        let exports = scan(
            "export { default } from \"./c\";\n\
             export { a as b } from './d';\n\
             export * from './everything';\n",
        );
        assert_eq!(
            exports.named.get("default"),
            Some(&ExportTarget::ReExport {
                specifier: "./c".into(),
                original_name: "default".into()
            })
        );
        assert_eq!(
            exports.named.get("b"),
            Some(&ExportTarget::ReExport {
                specifier: "./d".into(),
                original_name: "a".into()
            })
        );
        assert_eq!(exports.wildcards, vec!["./everything".to_string()]);
    }

    fn project_with(files: &[(&str, &str)]) -> (tempfile::TempDir, ExportResolver) {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let resolver = ExportResolver::new(dir.path());
        let mut parser = SourceParser::new();
        for (path, content) in files {
            let tree = parser.parse("typescript", content).unwrap();
            resolver.commit_module(path, scan_module_exports(tree.root_node(), content));
        }
        (dir, resolver)
    }

    #[test]
    fn test_deep_resolution_counts_hops() {
        let (_dir, resolver) = project_with(&[
            ("a.ts", "import Foo from \"./b\";\n"),
            ("b.ts", "export { default } from \"./c\";\n"),
            ("c.ts", "export default class Foo {}\n"),
        ]);

        let resolved = resolver.resolve_export("b.ts", "default").unwrap();
        assert_eq!(resolved.file, "c.ts");
        assert_eq!(resolved.name, "default");
        assert_eq!(resolved.local_name.as_deref(), Some("Foo"));
        assert_eq!(resolved.depth, 1);

        let import = resolver.resolve_import("a.ts", "./b", "default");
        assert_eq!(import.module.as_deref(), Some("b.ts"));
        assert_eq!(import.export.unwrap().depth, 1);
    }

    #[test]
    fn test_wildcard_chain() {
        let (_dir, resolver) = project_with(&[
            ("barrel.ts", "export * from \"./impl\";\n"),
            ("impl.ts", "export function util() {}\n"),
        ]);
        let resolved = resolver.resolve_export("barrel.ts", "util").unwrap();
        assert_eq!(resolved.file, "impl.ts");
        assert_eq!(resolved.depth, 1);
    }

    #[test]
    fn test_cycles_terminate() {
        let (_dir, resolver) = project_with(&[
            ("x.ts", "export { y as x } from \"./y\";\n"),
            ("y.ts", "export { x as y } from \"./x\";\n"),
        ]);
        assert_eq!(resolver.resolve_export("x.ts", "x"), None);
    }

    #[test]
    fn test_package_specifiers_stay_unresolved() {
        let (_dir, resolver) = project_with(&[("a.ts", "import { x } from \"@scope/pkg\";\n")]);
        let import = resolver.resolve_import("a.ts", "@scope/pkg", "x");
        assert_eq!(import.module, None);
        assert_eq!(import.export, None);
    }
}

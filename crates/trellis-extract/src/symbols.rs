//! Symbol extraction from parsed trees.
//!
//! Walks a tree-sitter parse and returns the declarations the rest of the
//! pipeline works with. TypeScript gets the full treatment; Python and Go
//! get structural extraction (enough to populate the symbol index and emit
//! containment edges).

use tree_sitter::{Node, Tree};

use crate::entities::{content_hash, SymbolKind, SymbolRecord};
use crate::treesitter::{node_col, node_end_line, node_line, node_text};

/// An extracted declaration before id assignment.
struct RawSymbol {
    name: String,
    kind: SymbolKind,
    line: u32,
    col: u32,
    end_line: u32,
    signature: Option<String>,
    hash: String,
    is_exported: bool,
    parent: Option<String>,
}

/// Extracts all declarations from a parsed file, in source order, with
/// stable ids assigned (bare `sym:<file>#<name>`, line-qualified only on
/// intra-file collisions).
pub fn extract_symbols(
    lang_name: &str,
    tree: &Tree,
    source: &str,
    file_rel: &str,
) -> Vec<SymbolRecord> {
    let mut raw = Vec::new();
    let root = tree.root_node();
    match lang_name {
        "typescript" | "tsx" | "javascript" => {
            typescript_symbols(root, source, None, false, &mut raw)
        }
        "python" => python_symbols(root, source, None, &mut raw),
        "go" => go_symbols(root, source, &mut raw),
        _ => {}
    }
    assign_ids(file_rel, raw)
}

fn assign_ids(file_rel: &str, raw: Vec<RawSymbol>) -> Vec<SymbolRecord> {
    let mut name_counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for symbol in &raw {
        *name_counts.entry(symbol.name.as_str()).or_default() += 1;
    }
    let duplicated: std::collections::HashSet<String> = name_counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_string())
        .collect();

    let mut seen_first: std::collections::HashSet<String> = std::collections::HashSet::new();
    raw.into_iter()
        .map(|symbol| {
            let id = if duplicated.contains(&symbol.name) && !seen_first.insert(symbol.name.clone())
            {
                SymbolRecord::qualified_id(file_rel, &symbol.name, symbol.line)
            } else {
                SymbolRecord::bare_id(file_rel, &symbol.name)
            };
            SymbolRecord {
                id,
                name: symbol.name,
                kind: symbol.kind,
                file: file_rel.to_string(),
                line: symbol.line,
                col: symbol.col,
                end_line: symbol.end_line,
                signature: symbol.signature,
                hash: symbol.hash,
                is_exported: symbol.is_exported,
                parent: symbol.parent,
            }
        })
        .collect()
}

/// Declaration head: everything up to the body, whitespace-collapsed.
fn signature_of(node: Node<'_>, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let head = source.get(node.start_byte()..body.start_byte())?;
    let collapsed: Vec<&str> = head.split_whitespace().collect();
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.join(" "))
}

fn raw_symbol(
    node: Node<'_>,
    source: &str,
    name: String,
    kind: SymbolKind,
    is_exported: bool,
    parent: Option<String>,
) -> RawSymbol {
    RawSymbol {
        name,
        kind,
        line: node_line(node),
        col: node_col(node),
        end_line: node_end_line(node),
        signature: signature_of(node, source),
        hash: content_hash(node_text(node, source)),
        is_exported,
        parent,
    }
}

fn name_of(node: Node<'_>, source: &str) -> Option<String> {
    let name_node = node.child_by_field_name("name")?;
    let name = node_text(name_node, source).to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

// ── TypeScript ──────────────────────────────────────────────────────────

fn typescript_symbols(
    node: Node<'_>,
    source: &str,
    enclosing_class: Option<&str>,
    exported: bool,
    out: &mut Vec<RawSymbol>,
) {
    match node.kind() {
        "export_statement" => {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            for child in children {
                typescript_symbols(child, source, enclosing_class, true, out);
            }
            return;
        }
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = name_of(node, source) {
                out.push(raw_symbol(
                    node,
                    source,
                    name,
                    SymbolKind::Function,
                    exported,
                    None,
                ));
            }
        }
        "class_declaration" | "abstract_class_declaration" => {
            if let Some(name) = name_of(node, source) {
                out.push(raw_symbol(
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Class,
                    exported,
                    None,
                ));
                if let Some(body) = node.child_by_field_name("body") {
                    class_members(body, source, &name, out);
                }
            }
            return;
        }
        "interface_declaration" => {
            if let Some(name) = name_of(node, source) {
                out.push(raw_symbol(
                    node,
                    source,
                    name,
                    SymbolKind::Interface,
                    exported,
                    None,
                ));
            }
            return;
        }
        "type_alias_declaration" => {
            if let Some(name) = name_of(node, source) {
                out.push(raw_symbol(
                    node,
                    source,
                    name,
                    SymbolKind::TypeAlias,
                    exported,
                    None,
                ));
            }
            return;
        }
        "enum_declaration" => {
            if let Some(name) = name_of(node, source) {
                out.push(raw_symbol(node, source, name, SymbolKind::Class, exported, None));
            }
            return;
        }
        "lexical_declaration" | "variable_declaration" => {
            // Only program-level bindings become symbols; function locals
            // are dataflow targets, not declarations.
            if is_program_level(node) {
                let mut cursor = node.walk();
                let declarators: Vec<Node> = node
                    .children(&mut cursor)
                    .filter(|c| c.kind() == "variable_declarator")
                    .collect();
                for declarator in declarators {
                    if let Some(name_node) = declarator.child_by_field_name("name") {
                        if name_node.kind() != "identifier" {
                            continue;
                        }
                        let name = node_text(name_node, source).to_string();
                        let kind = match declarator.child_by_field_name("value").map(|v| v.kind()) {
                            Some("arrow_function") | Some("function_expression")
                            | Some("generator_function") => SymbolKind::Function,
                            _ => SymbolKind::Variable,
                        };
                        out.push(raw_symbol(declarator, source, name, kind, exported, None));
                    }
                }
            }
        }
        _ => {}
    }

    // The export flag only reaches the direct children of an export
    // statement; nested declarations start over unexported.
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        typescript_symbols(child, source, enclosing_class, false, out);
    }
}

fn is_program_level(node: Node<'_>) -> bool {
    match node.parent() {
        Some(parent) => match parent.kind() {
            "program" => true,
            "export_statement" => is_program_level(parent),
            _ => false,
        },
        None => false,
    }
}

fn class_members(body: Node<'_>, source: &str, class_name: &str, out: &mut Vec<RawSymbol>) {
    let mut cursor = body.walk();
    let members: Vec<Node> = body.children(&mut cursor).collect();
    for member in members {
        match member.kind() {
            "method_definition" => {
                if let Some(name) = name_of(member, source) {
                    out.push(raw_symbol(
                        member,
                        source,
                        name,
                        SymbolKind::Method,
                        false,
                        Some(class_name.to_string()),
                    ));
                }
            }
            "public_field_definition" => {
                if let Some(name) = name_of(member, source) {
                    out.push(raw_symbol(
                        member,
                        source,
                        name,
                        SymbolKind::Variable,
                        false,
                        Some(class_name.to_string()),
                    ));
                }
            }
            _ => {}
        }
    }
}

// ── Python ──────────────────────────────────────────────────────────────

fn python_symbols(
    node: Node<'_>,
    source: &str,
    enclosing_class: Option<&str>,
    out: &mut Vec<RawSymbol>,
) {
    match node.kind() {
        "function_definition" => {
            if let Some(name) = name_of(node, source) {
                let exported = !name.starts_with('_') && enclosing_class.is_none();
                let kind = if enclosing_class.is_some() {
                    SymbolKind::Method
                } else {
                    SymbolKind::Function
                };
                out.push(raw_symbol(
                    node,
                    source,
                    name,
                    kind,
                    exported,
                    enclosing_class.map(String::from),
                ));
            }
        }
        "class_definition" => {
            if let Some(name) = name_of(node, source) {
                let exported = !name.starts_with('_');
                out.push(raw_symbol(
                    node,
                    source,
                    name.clone(),
                    SymbolKind::Class,
                    exported,
                    None,
                ));
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    let children: Vec<Node> = body.children(&mut cursor).collect();
                    for child in children {
                        python_symbols(child, source, Some(&name), out);
                    }
                }
                return;
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        python_symbols(child, source, enclosing_class, out);
    }
}

// ── Go ──────────────────────────────────────────────────────────────────

fn go_symbols(node: Node<'_>, source: &str, out: &mut Vec<RawSymbol>) {
    match node.kind() {
        "function_declaration" => {
            if let Some(name) = name_of(node, source) {
                let exported = name.chars().next().is_some_and(|c| c.is_uppercase());
                out.push(raw_symbol(node, source, name, SymbolKind::Function, exported, None));
            }
        }
        "method_declaration" => {
            if let Some(name) = name_of(node, source) {
                let exported = name.chars().next().is_some_and(|c| c.is_uppercase());
                let receiver = go_receiver_type(node, source);
                out.push(raw_symbol(
                    node,
                    source,
                    name,
                    SymbolKind::Method,
                    exported,
                    receiver,
                ));
            }
        }
        "type_declaration" => {
            let mut cursor = node.walk();
            let specs: Vec<Node> = node
                .children(&mut cursor)
                .filter(|c| c.kind() == "type_spec")
                .collect();
            for spec in specs {
                if let Some(name) = name_of(spec, source) {
                    let exported = name.chars().next().is_some_and(|c| c.is_uppercase());
                    let kind = match spec.child_by_field_name("type").map(|t| t.kind()) {
                        Some("interface_type") => SymbolKind::Interface,
                        Some("struct_type") => SymbolKind::Class,
                        _ => SymbolKind::TypeAlias,
                    };
                    out.push(raw_symbol(spec, source, name, kind, exported, None));
                }
            }
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        go_symbols(child, source, out);
    }
}

/// The bare receiver type name of a Go method (`func (s *Server) Run` → `Server`).
fn go_receiver_type(node: Node<'_>, source: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut found = None;
    let mut cursor = receiver.walk();
    visit_descendants(receiver, &mut cursor, &mut |n| {
        if n.kind() == "type_identifier" && found.is_none() {
            found = Some(node_text(n, source).to_string());
        }
    });
    found
}

fn visit_descendants<'t, F>(node: Node<'t>, cursor: &mut tree_sitter::TreeCursor<'t>, f: &mut F)
where
    F: FnMut(Node<'t>),
{
    let children: Vec<Node> = node.children(cursor).collect();
    for child in children {
        f(child);
        let mut inner = child.walk();
        visit_descendants(child, &mut inner, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treesitter::SourceParser;

    fn parse_ts(source: &str) -> Vec<SymbolRecord> {
        let mut parser = SourceParser::new();
        let tree = parser.parse("typescript", source).unwrap();
        extract_symbols("typescript", &tree, source, "src/a.ts")
    }

    #[test]
    fn test_typescript_functions_and_classes() {
        let symbols = parse_ts(
            "export function run(input: string): void {}\n\
             class Engine {\n  start() {}\n  stop() {}\n}\n\
             export const handler = (event) => event;\n\
             const LIMIT = 10;\n",
        );
        let names: Vec<(&str, SymbolKind)> = symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind))
            .collect();
        assert!(names.contains(&("run", SymbolKind::Function)));
        assert!(names.contains(&("Engine", SymbolKind::Class)));
        assert!(names.contains(&("start", SymbolKind::Method)));
        assert!(names.contains(&("handler", SymbolKind::Function)));
        assert!(names.contains(&("LIMIT", SymbolKind::Variable)));

        let run = symbols.iter().find(|s| s.name == "run").unwrap();
        assert!(run.is_exported);
        assert_eq!(run.id, "sym:src/a.ts#run");
        let start = symbols.iter().find(|s| s.name == "start").unwrap();
        assert_eq!(start.parent.as_deref(), Some("Engine"));
    }

    #[test]
    fn test_typescript_interface_and_alias() {
        let symbols = parse_ts("interface Shape { area(): number }\ntype Id = string;\n");
        assert!(symbols
            .iter()
            .any(|s| s.name == "Shape" && s.kind == SymbolKind::Interface));
        assert!(symbols
            .iter()
            .any(|s| s.name == "Id" && s.kind == SymbolKind::TypeAlias));
    }

    #[test]
    fn test_duplicate_names_get_qualified_ids() {
        let symbols = parse_ts(
            "class A {\n  render() {}\n}\nclass B {\n  render() {}\n}\n",
        );
        let renders: Vec<&SymbolRecord> =
            symbols.iter().filter(|s| s.name == "render").collect();
        assert_eq!(renders.len(), 2);
        assert_eq!(renders[0].id, "sym:src/a.ts#render");
        assert!(renders[1].id.starts_with("sym:src/a.ts#render@"));
        assert_ne!(renders[0].id, renders[1].id);
    }

    #[test]
    fn test_local_variables_are_not_symbols() {
        let symbols = parse_ts("function f() { const local = 1; return local; }\n");
        assert!(symbols.iter().all(|s| s.name != "local"));
    }

    #[test]
    fn test_python_symbols() {
        let source = "class Service:\n    def handle(self):\n        pass\n\ndef _private():\n    pass\n";
        let mut parser = SourceParser::new();
        let tree = parser.parse("python", source).unwrap();
        let symbols = extract_symbols("python", &tree, source, "app/service.py");

        let service = symbols.iter().find(|s| s.name == "Service").unwrap();
        assert_eq!(service.kind, SymbolKind::Class);
        assert!(service.is_exported);
        let handle = symbols.iter().find(|s| s.name == "handle").unwrap();
        assert_eq!(handle.kind, SymbolKind::Method);
        assert_eq!(handle.parent.as_deref(), Some("Service"));
        let private = symbols.iter().find(|s| s.name == "_private").unwrap();
        assert!(!private.is_exported);
    }

    #[test]
    fn test_go_symbols() {
        let source = "package main\n\ntype Server struct{}\n\nfunc (s *Server) Run() {}\n\nfunc helper() {}\n";
        let mut parser = SourceParser::new();
        let tree = parser.parse("go", source).unwrap();
        let symbols = extract_symbols("go", &tree, source, "cmd/main.go");

        let server = symbols.iter().find(|s| s.name == "Server").unwrap();
        assert_eq!(server.kind, SymbolKind::Class);
        assert!(server.is_exported);
        let run = symbols.iter().find(|s| s.name == "Run").unwrap();
        assert_eq!(run.parent.as_deref(), Some("Server"));
        let helper = symbols.iter().find(|s| s.name == "helper").unwrap();
        assert!(!helper.is_exported);
    }
}

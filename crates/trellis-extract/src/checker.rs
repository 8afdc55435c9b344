//! Bounded access to a semantic type checker.
//!
//! The builder consults a [`TypeCheckerFacade`] for the symbols lexical
//! analysis can't pin down. Every parse carries a [`CheckerBudget`]; each
//! consultation costs one credit and [`should_use_type_checker`] gates the
//! spend with cheap heuristics, so pathological files degrade to
//! placeholders instead of quadratic checker traffic. Failures and
//! timeouts are never fatal: the caller falls back to a placeholder
//! target.
//!
//! [`ProjectChecker`] is the default TypeScript implementation, backed by
//! `oxc` parsing plus per-file export surfaces.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use dashmap::DashMap;

use trellis_core::policy::NoisePolicy;

/// Why the builder wants a checker consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerContext {
    Call,
    Decorator,
    Heritage,
    Identifier,
    Property,
}

/// A node the builder wants resolved.
#[derive(Debug, Clone)]
pub struct NodeQuery<'a> {
    pub file: &'a str,
    pub name: &'a str,
    pub line: u32,
    pub col: u32,
}

/// A call site the builder wants resolved.
#[derive(Debug, Clone)]
pub struct CallQuery<'a> {
    pub file: &'a str,
    pub callee: &'a str,
    pub receiver: Option<&'a str>,
    pub access_path: Option<&'a str>,
    pub line: u32,
}

/// A checker answer: the file declaring the symbol and its name there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSymbol {
    pub file: String,
    pub name: String,
}

/// A resolved call target, with receiver-type evidence when available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub file: String,
    pub name: String,
    pub receiver_type: Option<String>,
    /// True when the receiver is an interface or union, i.e. the concrete
    /// callee may differ at runtime.
    pub dynamic_dispatch: bool,
}

/// The semantic-resolution contract the builder consumes. Implementations
/// must honor the deadline: once past it, return `None` promptly.
pub trait TypeCheckerFacade: Send + Sync {
    fn resolve_node(&self, query: &NodeQuery<'_>, deadline: Option<Instant>)
        -> Option<ResolvedSymbol>;

    fn resolve_call_target(
        &self,
        query: &CallQuery<'_>,
        deadline: Option<Instant>,
    ) -> Option<CallTarget>;

    fn module_export_map(&self, file: &str) -> HashMap<String, ResolvedSymbol>;

    /// Infers the return type of the named function when the source carries
    /// no annotation. Checkers without flow analysis decline by default.
    fn infer_return_type(
        &self,
        query: &NodeQuery<'_>,
        deadline: Option<Instant>,
    ) -> Option<ResolvedSymbol> {
        let _ = (query, deadline);
        None
    }
}

/// Per-parse credit counter. Atomic so a parse can share it across worker
/// threads without over-spending.
pub struct CheckerBudget {
    limit: u32,
    credits: AtomicU32,
}

impl CheckerBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            credits: AtomicU32::new(limit),
        }
    }

    /// Takes one credit; false once the budget is exhausted.
    pub fn try_consume(&self) -> bool {
        self.credits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            })
            .is_ok()
    }

    pub fn remaining(&self) -> u32 {
        self.credits.load(Ordering::SeqCst)
    }

    pub fn spent(&self) -> u32 {
        self.limit - self.remaining()
    }
}

/// Gate in front of every consultation: credit must remain, and the
/// context must be one where semantic resolution plausibly pays off.
pub fn should_use_type_checker(
    budget: &CheckerBudget,
    context: CheckerContext,
    name: &str,
    import_adjacent: bool,
    ambiguous: bool,
    policy: &NoisePolicy,
) -> bool {
    if budget.remaining() == 0 {
        return false;
    }
    if policy.is_stop_name(name) {
        return false;
    }
    match context {
        CheckerContext::Call | CheckerContext::Heritage | CheckerContext::Decorator => true,
        CheckerContext::Identifier | CheckerContext::Property => {
            (import_adjacent || ambiguous)
                && name.chars().count() >= policy.ast_min_name_length
        }
    }
}

fn past_deadline(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// What the default checker learned about one file.
#[derive(Debug, Clone, Default)]
struct FileSemantics {
    /// Top-level bindings declared in the file.
    bindings: HashSet<String>,
    /// Names the file exports.
    exported: HashSet<String>,
}

/// Default TypeScript facade: `oxc`-verified per-file symbol tables plus a
/// cross-file exported-name index. Deliberately conservative — it answers
/// only when exactly one declaration site fits.
#[derive(Default)]
pub struct ProjectChecker {
    files: DashMap<String, FileSemantics>,
}

impl ProjectChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyzes one file. Parse failures leave the file's table empty; the
    /// builder then simply gets no answers for it.
    pub fn analyze_file(&self, file_rel: &str, content: &str) {
        use oxc_allocator::Allocator;
        use oxc_parser::Parser as OxcParser;
        use oxc_semantic::SemanticBuilder;
        use oxc_span::SourceType;

        let allocator = Allocator::default();
        let source_type = SourceType::from_path(Path::new(file_rel)).unwrap_or_default();
        let parsed = OxcParser::new(&allocator, content, source_type).parse();
        if !parsed.errors.is_empty() {
            self.files.insert(file_rel.to_string(), FileSemantics::default());
            return;
        }

        let semantic = SemanticBuilder::new().build(&parsed.program).semantic;
        let scopes = semantic.scopes();
        let symbols = semantic.symbols();

        let mut info = FileSemantics::default();
        for symbol_id in scopes.iter_bindings_in(scopes.root_scope_id()) {
            info.bindings.insert(symbols.get_name(symbol_id).to_string());
        }
        info.exported = detect_exported_names(content);
        self.files.insert(file_rel.to_string(), info);
    }

    /// The unique file exporting `name`, if there is exactly one.
    fn unique_exporter(&self, name: &str, excluding: &str) -> Option<String> {
        let mut found: Option<String> = None;
        for entry in self.files.iter() {
            if entry.key() == excluding {
                continue;
            }
            if entry.value().exported.contains(name) {
                if found.is_some() {
                    return None;
                }
                found = Some(entry.key().clone());
            }
        }
        found
    }
}

impl TypeCheckerFacade for ProjectChecker {
    fn resolve_node(
        &self,
        query: &NodeQuery<'_>,
        deadline: Option<Instant>,
    ) -> Option<ResolvedSymbol> {
        if past_deadline(deadline) {
            return None;
        }
        if let Some(info) = self.files.get(query.file) {
            if info.bindings.contains(query.name) {
                return Some(ResolvedSymbol {
                    file: query.file.to_string(),
                    name: query.name.to_string(),
                });
            }
        }
        self.unique_exporter(query.name, query.file)
            .map(|file| ResolvedSymbol {
                file,
                name: query.name.to_string(),
            })
    }

    fn resolve_call_target(
        &self,
        query: &CallQuery<'_>,
        deadline: Option<Instant>,
    ) -> Option<CallTarget> {
        if past_deadline(deadline) {
            return None;
        }
        let file = self.unique_exporter(query.callee, query.file)?;
        Some(CallTarget {
            file,
            name: query.callee.to_string(),
            receiver_type: query.receiver.map(String::from),
            dynamic_dispatch: false,
        })
    }

    fn module_export_map(&self, file: &str) -> HashMap<String, ResolvedSymbol> {
        self.files
            .get(file)
            .map(|info| {
                info.exported
                    .iter()
                    .map(|name| {
                        (
                            name.clone(),
                            ResolvedSymbol {
                                file: file.to_string(),
                                name: name.clone(),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Names appearing in `export` declarations: `export function X`,
/// `export class X`, `export const X`, `export default X`, `export { X }`.
fn detect_exported_names(content: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    for line in content.lines() {
        let trimmed = line.trim();
        let Some(after_export) = trimmed.strip_prefix("export") else {
            continue;
        };
        let after_export = after_export.trim_start();
        let decl = after_export
            .strip_prefix("default")
            .map(str::trim_start)
            .unwrap_or(after_export);
        if let Some(name) = declaration_name(decl) {
            names.insert(name);
            continue;
        }
        if let (Some(open), Some(close)) = (trimmed.find('{'), trimmed.find('}')) {
            if open < close {
                for entry in trimmed[open + 1..close].split(',') {
                    let exported = match entry.split_once(" as ") {
                        Some((_, alias)) => alias.trim(),
                        None => entry.trim(),
                    };
                    if !exported.is_empty() {
                        names.insert(exported.to_string());
                    }
                }
            }
        }
    }
    names
}

/// The declared name after a `function`/`class`/`const`-style keyword.
fn declaration_name(decl: &str) -> Option<String> {
    for keyword in [
        "async function",
        "function",
        "abstract class",
        "class",
        "interface",
        "type",
        "enum",
        "const",
        "let",
        "var",
    ] {
        if let Some(rest) = decl.strip_prefix(keyword) {
            if !rest.starts_with(char::is_whitespace) {
                continue;
            }
            let name: String = rest
                .trim_start()
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
                .collect();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_counts_down() {
        let budget = CheckerBudget::new(2);
        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
        assert_eq!(budget.remaining(), 0);
        assert_eq!(budget.spent(), 2);
    }

    #[test]
    fn test_gate_heuristics() {
        let policy = NoisePolicy::default();
        let budget = CheckerBudget::new(10);
        assert!(should_use_type_checker(
            &budget,
            CheckerContext::Call,
            "fetchData",
            false,
            false,
            &policy
        ));
        // Identifiers need an import-adjacency or ambiguity signal.
        assert!(!should_use_type_checker(
            &budget,
            CheckerContext::Identifier,
            "fetchData",
            false,
            false,
            &policy
        ));
        assert!(should_use_type_checker(
            &budget,
            CheckerContext::Identifier,
            "fetchData",
            true,
            false,
            &policy
        ));
        // Short and stop names never spend credit.
        assert!(!should_use_type_checker(
            &budget,
            CheckerContext::Identifier,
            "x",
            true,
            true,
            &policy
        ));
        assert!(!should_use_type_checker(
            &budget,
            CheckerContext::Call,
            "console",
            true,
            true,
            &policy
        ));
    }

    #[test]
    fn test_gate_respects_exhausted_budget() {
        let policy = NoisePolicy::default();
        let budget = CheckerBudget::new(0);
        assert!(!should_use_type_checker(
            &budget,
            CheckerContext::Call,
            "fetchData",
            true,
            true,
            &policy
        ));
    }

    #[test]
    fn test_detect_exported_names() {
        let names = detect_exported_names(
            "export function alpha() {}\n\
             export default class Beta {}\n\
             export { gamma, delta as epsilon };\n\
             const zeta = 1;\n",
        );
        for name in ["alpha", "Beta", "gamma", "epsilon"] {
            assert!(names.contains(name), "missing {name}");
        }
        assert!(!names.contains("zeta"));
        assert!(!names.contains("delta"));
    }

    #[test]
    fn test_project_checker_resolves_unique_exporter() {
        let checker = ProjectChecker::new();
        checker.analyze_file("src/svc.ts", "export function fetchRows() { return []; }\n");
        checker.analyze_file("src/other.ts", "export const unrelated = 1;\n");

        let query = CallQuery {
            file: "src/app.ts",
            callee: "fetchRows",
            receiver: Some("svc"),
            access_path: Some("svc.fetchRows"),
            line: 3,
        };
        let target = checker.resolve_call_target(&query, None).unwrap();
        assert_eq!(target.file, "src/svc.ts");
        assert_eq!(target.name, "fetchRows");
        assert_eq!(target.receiver_type.as_deref(), Some("svc"));
    }

    #[test]
    fn test_project_checker_ambiguous_exporters_decline() {
        let checker = ProjectChecker::new();
        checker.analyze_file("a.ts", "export function run() {}\n");
        checker.analyze_file("b.ts", "export function run() {}\n");
        let query = CallQuery {
            file: "c.ts",
            callee: "run",
            receiver: None,
            access_path: None,
            line: 1,
        };
        assert_eq!(checker.resolve_call_target(&query, None), None);
    }

    #[test]
    fn test_deadline_short_circuits() {
        let checker = ProjectChecker::new();
        checker.analyze_file("a.ts", "export function run() {}\n");
        let past = Instant::now() - std::time::Duration::from_millis(1);
        let query = NodeQuery {
            file: "a.ts",
            name: "run",
            line: 1,
            col: 0,
        };
        assert_eq!(checker.resolve_node(&query, Some(past)), None);
        assert!(checker.resolve_node(&query, None).is_some());
    }
}

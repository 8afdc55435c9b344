//! Relationship builder.
//!
//! Walks one parsed file twice — symbol-level (calls, heritage, throws,
//! type positions, decorators) and file-level (imports/exports, type uses,
//! identifier references, assignments) — and emits typed edges through an
//! aggregation buffer that de-duplicates, concretizes placeholders, rolls
//! imported-scope usage into DEPENDS_ON, and applies the inferred-edge
//! confidence floor. Resolution inside a walk always follows the tier
//! ladder appropriate to the site; failures leave placeholders, never
//! errors.

pub(crate) mod aggregate;
mod calls;
mod dataflow;
mod heritage;
mod imports;
mod refs;
mod typerefs;

use std::collections::HashSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tree_sitter::{Node, Tree};

use trellis_core::policy::NoisePolicy;
use trellis_core::types::{RelationType, Relationship, ResolutionState, Scope};

use crate::checker::{
    should_use_type_checker, CallQuery, CallTarget, CheckerBudget, CheckerContext, NodeQuery,
    ResolvedSymbol, TypeCheckerFacade,
};
use crate::confidence::{score, ResolutionTier, ScoreInput};
use crate::entities::{ParseOutput, SymbolRecord};
use crate::exports::ExportResolver;
use crate::index::{NameResolution, SymbolIndex};
use crate::treesitter::{canonical_language, node_line};

use aggregate::EdgeAccumulator;
use imports::ImportTable;

/// Shared collaborators a builder works against.
pub struct BuilderServices<'a> {
    pub policy: &'a NoisePolicy,
    pub index: &'a SymbolIndex,
    pub exports: &'a ExportResolver,
    pub checker: Option<&'a dyn TypeCheckerFacade>,
}

/// One file's worth of parsed input.
pub struct FileInput<'a> {
    pub output: &'a ParseOutput,
    pub tree: &'a Tree,
    pub source: &'a str,
    /// Grammar name the file parsed with ("typescript", "tsx", "python", "go").
    pub grammar: &'a str,
}

/// What one build pass produced.
pub struct BuildResult {
    pub edges: Vec<Relationship>,
    /// Inferred edges discarded below the confidence floor.
    pub dropped: usize,
    /// Type-checker credits spent during the pass.
    pub checker_spent: u32,
}

pub struct RelationshipBuilder<'a> {
    services: BuilderServices<'a>,
    now: DateTime<Utc>,
}

impl<'a> RelationshipBuilder<'a> {
    pub fn new(services: BuilderServices<'a>, now: DateTime<Utc>) -> Self {
        Self { services, now }
    }

    /// Builds every raw edge for one file. The caller normalizes them.
    pub fn build(&self, input: &FileInput<'_>) -> BuildResult {
        let budget = CheckerBudget::new(self.services.policy.type_checker_budget);
        let mut ctx = BuildContext {
            policy: self.services.policy,
            index: self.services.index,
            exports: self.services.exports,
            checker: self.services.checker,
            budget: &budget,
            deadline: None,
            output: input.output,
            source: input.source,
            language: canonical_language(input.grammar),
            imports: ImportTable::default(),
            acc: EdgeAccumulator::new(),
            callee_positions: HashSet::new(),
            write_positions: HashSet::new(),
            consumed_type_positions: HashSet::new(),
            now: self.now,
        };
        let root = input.tree.root_node();

        let is_typescript = matches!(input.grammar, "typescript" | "tsx" | "javascript");
        if is_typescript {
            ctx.imports = imports::build_import_table(&ctx, root);
            imports::emit_import_edges(&mut ctx, root);
        } else {
            imports::emit_foreign_imports(&mut ctx, root, input.grammar);
        }

        self.emit_containment(&mut ctx);

        if is_typescript {
            // Symbol-level pass.
            let declarations = declaration_nodes(root, input.source, &input.output.symbols);
            for (symbol_index, node) in &declarations {
                let symbol = &input.output.symbols[*symbol_index];
                if !symbol.kind.has_walkable_body() {
                    continue;
                }
                refs::emit_decorators(&mut ctx, symbol, *node);
                if symbol.kind == crate::entities::SymbolKind::Class {
                    // Method bodies are walked through their own symbols;
                    // the class itself contributes heritage.
                    heritage::emit_heritage(&mut ctx, symbol, *node);
                } else {
                    calls::walk_symbol_body(&mut ctx, symbol, *node);
                    typerefs::emit_signature_types(&mut ctx, symbol, *node);
                }
            }

            // File-level pass.
            dataflow::emit_assignments(&mut ctx, root);
            typerefs::emit_type_uses(&mut ctx, root);
            refs::emit_identifier_references(&mut ctx, root);
        }

        refs::emit_parser_error_hints(&mut ctx);

        let (edges, dropped) = ctx.acc.flush(self.services.policy, self.now);
        BuildResult {
            edges,
            dropped,
            checker_spent: budget.spent(),
        }
    }

    /// Containment skeleton: directory CONTAINS file, file DEFINES its
    /// top-level symbols, classes CONTAIN their members.
    fn emit_containment(&self, ctx: &mut BuildContext<'_>) {
        let file_id = ctx.output.file.entity_id();
        if let Some(dir_id) = ctx.output.file.dir_entity_id() {
            let mut edge = ctx.new_edge(&dir_id, &file_id, RelationType::Contains);
            edge.confidence = Some(0.95);
            edge.resolution_state = Some(ResolutionState::Resolved);
            ctx.acc.add_plain(edge);
        }
        for symbol in &ctx.output.symbols {
            let (from, rel_type) = match &symbol.parent {
                None => (file_id.clone(), RelationType::Defines),
                Some(parent) => match ctx.index.lookup_in_file(&symbol.file, parent) {
                    Some(owner) => (owner.id, RelationType::Contains),
                    None => (file_id.clone(), RelationType::Defines),
                },
            };
            let mut edge = ctx.new_edge(&from, &symbol.id, rel_type);
            edge.confidence = Some(0.95);
            edge.resolution_state = Some(ResolutionState::Resolved);
            edge.symbol_kind = Some(symbol.kind.as_str().to_string());
            edge.set_meta("line", symbol.line);
            ctx.acc.add_plain(edge);
        }
    }
}

/// How a target got pinned down, carried alongside the id it produced.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedTarget {
    pub target_id: String,
    pub tier: ResolutionTier,
    pub scope: Scope,
    pub state: ResolutionState,
    pub used_checker: bool,
    pub import_depth: Option<u32>,
}

impl ResolvedTarget {
    fn external(name: &str) -> Self {
        Self {
            target_id: format!("external:{name}"),
            tier: ResolutionTier::Heuristic,
            scope: Scope::External,
            state: ResolutionState::Unresolved,
            used_checker: false,
            import_depth: None,
        }
    }
}

pub(crate) struct BuildContext<'a> {
    pub policy: &'a NoisePolicy,
    pub index: &'a SymbolIndex,
    pub exports: &'a ExportResolver,
    pub checker: Option<&'a dyn TypeCheckerFacade>,
    pub budget: &'a CheckerBudget,
    pub deadline: Option<Instant>,
    pub output: &'a ParseOutput,
    pub source: &'a str,
    pub language: &'static str,
    pub imports: ImportTable,
    pub acc: EdgeAccumulator,
    /// Identifier positions already claimed as call callees.
    pub callee_positions: HashSet<(u32, u32)>,
    /// Identifier positions already claimed as assignment targets.
    pub write_positions: HashSet<(u32, u32)>,
    /// Type positions already emitted as RETURNS_TYPE/PARAM_TYPE.
    pub consumed_type_positions: HashSet<(u32, u32)>,
    pub now: DateTime<Utc>,
}

impl<'a> BuildContext<'a> {
    pub fn file_rel(&self) -> &str {
        &self.output.file.path
    }

    pub fn new_edge(&self, from: &str, to: &str, rel_type: RelationType) -> Relationship {
        let mut edge = Relationship::new(from, to, rel_type, self.now);
        edge.language = Some(self.language.to_string());
        edge
    }

    /// Entity id edges originate from at a given line: the innermost
    /// enclosing symbol, else the file itself.
    pub fn origin_at(&self, line: u32) -> String {
        self.output
            .enclosing_symbol(line)
            .map(|s| s.id.clone())
            .unwrap_or_else(|| self.output.file.entity_id())
    }

    /// Applies the scorer with this file's policy.
    pub fn score_edge(
        &self,
        rel_type: RelationType,
        resolved: &ResolvedTarget,
        target_name: Option<&str>,
    ) -> f64 {
        score(
            &ScoreInput {
                rel_type,
                state: Some(resolved.state),
                tier: Some(resolved.tier),
                scope: Some(resolved.scope),
                target_name,
                import_depth: resolved.import_depth,
            },
            self.policy,
        )
    }

    /// Stamps the resolution evidence a [`ResolvedTarget`] carries onto an
    /// edge.
    pub fn apply_resolution(
        &self,
        edge: &mut Relationship,
        resolved: &ResolvedTarget,
        target_name: Option<&str>,
    ) {
        edge.resolution_state = Some(resolved.state);
        edge.scope = Some(resolved.scope);
        edge.confidence = Some(self.score_edge(edge.rel_type, resolved, target_name));
        edge.set_meta("resolution", resolved.tier.as_str());
        if resolved.used_checker {
            edge.set_meta("usedTypeChecker", true);
        }
    }

    /// Gate + spend + consult for node resolution.
    pub fn checker_node(
        &self,
        context: CheckerContext,
        name: &str,
        line: u32,
        col: u32,
        import_adjacent: bool,
        ambiguous: bool,
    ) -> Option<ResolvedSymbol> {
        let checker = self.checker?;
        if !should_use_type_checker(
            self.budget,
            context,
            name,
            import_adjacent,
            ambiguous,
            self.policy,
        ) {
            return None;
        }
        if !self.budget.try_consume() {
            return None;
        }
        checker.resolve_node(
            &NodeQuery {
                file: self.file_rel(),
                name,
                line,
                col,
            },
            self.deadline,
        )
    }

    /// Gate + spend + consult for call-target resolution.
    pub fn checker_call(
        &self,
        callee: &str,
        receiver: Option<&str>,
        access_path: Option<&str>,
        line: u32,
    ) -> Option<CallTarget> {
        let checker = self.checker?;
        if !should_use_type_checker(
            self.budget,
            CheckerContext::Call,
            callee,
            false,
            false,
            self.policy,
        ) {
            return None;
        }
        if !self.budget.try_consume() {
            return None;
        }
        checker.resolve_call_target(
            &CallQuery {
                file: self.file_rel(),
                callee,
                receiver,
                access_path,
                line,
            },
            self.deadline,
        )
    }

    /// Tier ladder for plain identifiers (REFERENCES/READS/WRITES order):
    /// direct local → import-deep → type-checker → external.
    pub fn resolve_identifier(&self, name: &str, line: u32, col: u32) -> ResolvedTarget {
        if let Some(entry) = self.index.lookup_in_file(self.file_rel(), name) {
            return ResolvedTarget {
                target_id: entry.id,
                tier: ResolutionTier::Direct,
                scope: Scope::Local,
                state: ResolutionState::Resolved,
                used_checker: false,
                import_depth: None,
            };
        }
        if let Some(resolved) = self.resolve_via_import(name) {
            return resolved;
        }
        let ambiguous = matches!(
            self.index.resolve_by_name(self.file_rel(), name),
            NameResolution::Ambiguous { .. }
        );
        if let Some(answer) =
            self.checker_node(CheckerContext::Identifier, name, line, col, false, ambiguous)
        {
            return ResolvedTarget {
                target_id: format!("file:{}:{}", answer.file, answer.name),
                tier: ResolutionTier::TypeChecker,
                scope: if answer.file == self.file_rel() {
                    Scope::Local
                } else {
                    Scope::Imported
                },
                state: ResolutionState::Resolved,
                used_checker: true,
                import_depth: None,
            };
        }
        ResolvedTarget::external(name)
    }

    /// Tier ladder for type names (heritage clauses, annotations, thrown
    /// constructors): local → import-deep → type-checker → kind-qualified
    /// placeholder.
    pub fn resolve_type_name(
        &self,
        name: &str,
        line: u32,
        col: u32,
        fallback: trellis_core::target::PlaceholderKind,
    ) -> ResolvedTarget {
        if let Some(entry) = self.index.lookup_in_file(self.file_rel(), name) {
            return ResolvedTarget {
                target_id: entry.id,
                tier: ResolutionTier::Direct,
                scope: Scope::Local,
                state: ResolutionState::Resolved,
                used_checker: false,
                import_depth: None,
            };
        }
        if let Some(resolved) = self.resolve_via_import(name) {
            return resolved;
        }
        if let Some(answer) =
            self.checker_node(CheckerContext::Heritage, name, line, col, false, false)
        {
            return ResolvedTarget {
                target_id: format!("file:{}:{}", answer.file, answer.name),
                tier: ResolutionTier::TypeChecker,
                scope: if answer.file == self.file_rel() {
                    Scope::Local
                } else {
                    Scope::Imported
                },
                state: ResolutionState::Resolved,
                used_checker: true,
                import_depth: None,
            };
        }
        ResolvedTarget {
            target_id: format!("{}:{name}", fallback.as_str()),
            tier: ResolutionTier::Heuristic,
            scope: Scope::Unknown,
            state: ResolutionState::Unresolved,
            used_checker: false,
            import_depth: None,
        }
    }

    /// Import-map half of the ladder, shared by both orders.
    pub fn resolve_via_import(&self, name: &str) -> Option<ResolvedTarget> {
        let binding = self.imports.get(name)?;
        Some(ResolvedTarget {
            target_id: binding.target_id.clone(),
            tier: ResolutionTier::ViaImport,
            scope: Scope::Imported,
            state: binding.state,
            used_checker: false,
            import_depth: Some(binding.depth),
        })
    }
}

/// Pairs declaration AST nodes with their extracted symbols by name and
/// start line.
fn declaration_nodes<'t>(
    root: Node<'t>,
    source: &str,
    symbols: &[SymbolRecord],
) -> Vec<(usize, Node<'t>)> {
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if is_declaration_kind(node.kind()) {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = crate::treesitter::node_text(name_node, source);
                let line = node_line(node);
                if let Some(idx) = symbols
                    .iter()
                    .position(|s| s.name == name && s.line == line)
                {
                    found.push((idx, node));
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
    }
    // Source order keeps edge emission deterministic.
    found.sort_by_key(|(_, node)| node.start_byte());
    found
}

fn is_declaration_kind(kind: &str) -> bool {
    matches!(
        kind,
        "function_declaration"
            | "generator_function_declaration"
            | "class_declaration"
            | "abstract_class_declaration"
            | "method_definition"
            | "interface_declaration"
            | "type_alias_declaration"
            | "enum_declaration"
            | "variable_declarator"
    )
}

//! The parallel extraction pipeline.
//!
//! Two phases over the file set, each embarrassingly parallel:
//!
//! 1. **Parse**: tree-sitter parse, symbol extraction, export-map scan,
//!    checker analysis. Results merge into the shared indexes in path
//!    order, so concurrent runs produce identical index state.
//! 2. **Build**: the relationship builder walks each parsed file against
//!    the fully-populated indexes, then every raw edge is normalized and
//!    projected to its persistence row.
//!
//! A cancellation flag is honored at file boundaries; a cancelled ingest
//! discards the unfinished remainder and reports itself cancelled.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rayon::prelude::*;
use tree_sitter::Tree;

use trellis_core::adapters::AdapterRegistry;
use trellis_core::normalize::normalize;
use trellis_core::policy::NoisePolicy;
use trellis_core::project::{project_row, StructuralRow};
use trellis_core::types::Relationship;

use crate::builder::{BuildResult, BuilderServices, FileInput, RelationshipBuilder};
use crate::checker::{ProjectChecker, TypeCheckerFacade};
use crate::entities::{FileRecord, ParseOutput};
use crate::exports::{scan_module_exports, ExportResolver};
use crate::index::SymbolIndex;
use crate::symbols::extract_symbols;
use crate::treesitter::{canonical_language, collect_syntax_errors, SourceParser};
use crate::walker::FileWalker;

/// Per-file outcome counts, surfaced once per parse.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub path: String,
    pub edges: usize,
    pub dropped: usize,
    pub parser_errors: usize,
    pub checker_spent: u32,
}

/// Everything one ingest produced.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub edges: Vec<Relationship>,
    pub rows: Vec<StructuralRow>,
    pub files: Vec<FileSummary>,
    pub cancelled: bool,
}

impl IngestReport {
    pub fn total_dropped(&self) -> usize {
        self.files.iter().map(|f| f.dropped).sum()
    }
}

struct ParsedFile {
    file: ParseOutput,
    tree: Tree,
    content: String,
    grammar: &'static str,
}

/// Owns the shared state one ingest works against. Configuration is read
/// once at construction; later policy edits require a new extractor.
pub struct Extractor {
    policy: NoisePolicy,
    index: SymbolIndex,
    exports: ExportResolver,
    adapters: AdapterRegistry,
    checker: Option<Arc<ProjectChecker>>,
    cancel: Arc<AtomicBool>,
}

impl Extractor {
    pub fn new(root: &Path, policy: NoisePolicy) -> Self {
        Self {
            policy,
            index: SymbolIndex::new(),
            exports: ExportResolver::new(root),
            adapters: AdapterRegistry::standard(),
            checker: Some(Arc::new(ProjectChecker::new())),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Disables the semantic tier entirely (placeholders only).
    pub fn without_checker(mut self) -> Self {
        self.checker = None;
        self
    }

    /// Flag observed at file boundaries; set it to abandon an ingest.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Parses and builds the whole tree under `root`.
    pub fn ingest(&self, root: &Path) -> IngestReport {
        let entries = FileWalker::new(root).walk();
        let now = Utc::now();

        // Phase 1: parse every file in parallel.
        let mut parsed: Vec<ParsedFile> = entries
            .par_iter()
            .filter_map(|entry| {
                if self.cancelled() {
                    return None;
                }
                let content = match std::fs::read_to_string(&entry.path) {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!(path = %entry.path.display(), error = %e, "skipping unreadable file");
                        return None;
                    }
                };
                let mut parser = SourceParser::new();
                let tree = match parser.parse(entry.grammar, &content) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(path = %entry.rel, error = %e, "parse failed");
                        return None;
                    }
                };
                let symbols = extract_symbols(entry.grammar, &tree, &content, &entry.rel);
                let errors = collect_syntax_errors(tree.root_node(), &content);
                let file = FileRecord::new(
                    entry.rel.clone(),
                    canonical_language(entry.grammar),
                    &content,
                );
                Some(ParsedFile {
                    file: ParseOutput {
                        file,
                        symbols,
                        errors,
                    },
                    tree,
                    content,
                    grammar: entry.grammar,
                })
            })
            .collect();

        if self.cancelled() {
            return IngestReport {
                cancelled: true,
                ..IngestReport::default()
            };
        }

        // Merge into the shared indexes in path order, so the index state
        // is independent of parse completion order.
        parsed.sort_by(|a, b| a.file.file.path.cmp(&b.file.file.path));
        for item in &parsed {
            self.index
                .commit_file(&item.file.file.path, &item.file.symbols);
            if is_typescript(item.grammar) {
                self.exports.commit_module(
                    &item.file.file.path,
                    scan_module_exports(item.tree.root_node(), &item.content),
                );
                if let Some(checker) = &self.checker {
                    checker.analyze_file(&item.file.file.path, &item.content);
                }
            }
        }

        // Phase 2: build, normalize, project.
        let built: Vec<(FileSummary, Vec<Relationship>)> = parsed
            .par_iter()
            .filter_map(|item| {
                if self.cancelled() {
                    return None;
                }
                let services = BuilderServices {
                    policy: &self.policy,
                    index: &self.index,
                    exports: &self.exports,
                    checker: self
                        .checker
                        .as_ref()
                        .map(|c| c.as_ref() as &dyn TypeCheckerFacade),
                };
                let builder = RelationshipBuilder::new(services, now);
                let BuildResult {
                    edges,
                    dropped,
                    checker_spent,
                } = builder.build(&FileInput {
                    output: &item.file,
                    tree: &item.tree,
                    source: &item.content,
                    grammar: item.grammar,
                });
                let normalized: Vec<Relationship> = edges
                    .into_iter()
                    .map(|edge| normalize(edge, &self.adapters, self.policy.diagnostics))
                    .collect();
                let summary = FileSummary {
                    path: item.file.file.path.clone(),
                    edges: normalized.len(),
                    dropped,
                    parser_errors: item.file.errors.len(),
                    checker_spent,
                };
                Some((summary, normalized))
            })
            .collect();

        if self.cancelled() {
            return IngestReport {
                cancelled: true,
                ..IngestReport::default()
            };
        }

        let mut report = IngestReport::default();
        for (summary, edges) in built {
            tracing::debug!(
                path = %summary.path,
                edges = summary.edges,
                dropped = summary.dropped,
                checker_spent = summary.checker_spent,
                "file built"
            );
            report.files.push(summary);
            report.rows.extend(edges.iter().map(project_row));
            report.edges.extend(edges);
        }
        report
    }
}

fn is_typescript(grammar: &str) -> bool {
    matches!(grammar, "typescript" | "tsx" | "javascript")
}

//! In-memory symbol index.
//!
//! Two sharded maps populated as files finish parsing: exact
//! `(file, name)` lookups and name-only candidate lists. Per-file commits
//! replace that file's previous entries, so re-parsing stays idempotent.
//! Readers may observe a stale but consistent snapshot while other files
//! commit.

use dashmap::DashMap;

use crate::entities::SymbolRecord;
use trellis_core::target::TargetRef;

/// What the index knows about one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub id: String,
    pub path: String,
    pub is_exported: bool,
}

/// Outcome of a name-only lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameResolution {
    Unique(SymbolEntry),
    /// Multiple candidates survive directory-proximity narrowing.
    Ambiguous { count: usize },
    Unknown,
}

/// Result of rewriting a placeholder target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concretization {
    pub entity_id: String,
    /// Set when multiple candidates matched and none won.
    pub candidate_count: Option<usize>,
}

#[derive(Default)]
pub struct SymbolIndex {
    by_file_name: DashMap<(String, String), SymbolEntry>,
    by_name: DashMap<String, Vec<SymbolEntry>>,
    committed: DashMap<String, Vec<String>>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the index entries for one file with its fresh symbols.
    pub fn commit_file(&self, file: &str, symbols: &[SymbolRecord]) {
        if let Some((_, old_names)) = self.committed.remove(file) {
            for name in old_names {
                self.by_file_name.remove(&(file.to_string(), name.clone()));
                if let Some(mut list) = self.by_name.get_mut(&name) {
                    list.retain(|entry| entry.path != file);
                }
            }
        }

        let mut names = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let entry = SymbolEntry {
                id: symbol.id.clone(),
                path: file.to_string(),
                is_exported: symbol.is_exported,
            };
            names.push(symbol.name.clone());
            self.by_file_name
                .insert((file.to_string(), symbol.name.clone()), entry.clone());
            self.by_name
                .entry(symbol.name.clone())
                .or_default()
                .push(entry);
        }
        self.committed.insert(file.to_string(), names);
    }

    /// Exact `(file, name)` lookup.
    pub fn lookup_in_file(&self, file: &str, name: &str) -> Option<SymbolEntry> {
        self.by_file_name
            .get(&(file.to_string(), name.to_string()))
            .map(|entry| entry.clone())
    }

    /// All symbols carrying the given name, across files.
    pub fn candidates(&self, name: &str) -> Vec<SymbolEntry> {
        self.by_name
            .get(name)
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    /// Cross-file resolution by exact name, disambiguated by directory
    /// proximity to the asking file. A tie stays ambiguous.
    pub fn resolve_by_name(&self, from_file: &str, name: &str) -> NameResolution {
        let candidates = self.candidates(name);
        match candidates.len() {
            0 => NameResolution::Unknown,
            1 => NameResolution::Unique(candidates.into_iter().next().unwrap()),
            _ => {
                let scored: Vec<(usize, &SymbolEntry)> = candidates
                    .iter()
                    .map(|entry| (shared_prefix_segments(from_file, &entry.path), entry))
                    .collect();
                let best = scored.iter().map(|(score, _)| *score).max().unwrap_or(0);
                let winners: Vec<&SymbolEntry> = scored
                    .iter()
                    .filter(|(score, _)| *score == best)
                    .map(|(_, entry)| *entry)
                    .collect();
                if winners.len() == 1 {
                    NameResolution::Unique(winners[0].clone())
                } else {
                    NameResolution::Ambiguous {
                        count: candidates.len(),
                    }
                }
            }
        }
    }

    /// Rewrites a placeholder target to a concrete symbol id when the index
    /// holds a unique match. Ambiguity is reported, not resolved.
    pub fn concretize(&self, from_file: &str, target_id: &str) -> Concretization {
        match TargetRef::parse(target_id) {
            TargetRef::FileSymbol { file, symbol } => {
                match self.lookup_in_file(&file, &symbol) {
                    Some(entry) => Concretization {
                        entity_id: entry.id,
                        candidate_count: None,
                    },
                    None => Concretization {
                        entity_id: target_id.to_string(),
                        candidate_count: None,
                    },
                }
            }
            TargetRef::External { name } | TargetRef::Placeholder { name, .. } => {
                match self.resolve_by_name(from_file, &name) {
                    NameResolution::Unique(entry) => Concretization {
                        entity_id: entry.id,
                        candidate_count: None,
                    },
                    NameResolution::Ambiguous { count } => Concretization {
                        entity_id: target_id.to_string(),
                        candidate_count: Some(count),
                    },
                    NameResolution::Unknown => Concretization {
                        entity_id: target_id.to_string(),
                        candidate_count: None,
                    },
                }
            }
            TargetRef::Entity { id } => Concretization {
                entity_id: id,
                candidate_count: None,
            },
        }
    }

    pub fn symbol_count(&self) -> usize {
        self.by_file_name.len()
    }
}

/// Number of leading path segments two files share.
fn shared_prefix_segments(a: &str, b: &str) -> usize {
    a.split('/')
        .zip(b.split('/'))
        .take_while(|(x, y)| x == y)
        .count()
}

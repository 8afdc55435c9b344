//! Noise and stop-name policy.
//!
//! Reads `.trellis/trellis.json` and provides the process-wide thresholds
//! the extraction pipeline consults: minimum identifier length, the
//! stop-name set, the inferred-edge confidence floor, and the per-parse
//! type-checker budget. Falls back to defaults when the file is missing or
//! unparseable. The policy is read once at pipeline construction; later
//! edits require a re-parse to take effect.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Immutable extraction thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoisePolicy {
    /// Names shorter than this are skipped as inferred-edge targets or
    /// heavily penalized where skipping would lose a resolved edge.
    #[serde(default = "default_min_name_length")]
    pub ast_min_name_length: usize,
    /// Lowercased names never used as edge targets.
    #[serde(default = "default_stop_names")]
    pub stop_names: BTreeSet<String>,
    /// Inferred edges scoring below this floor are dropped.
    #[serde(default = "default_min_inferred_confidence")]
    pub min_inferred_confidence: f64,
    /// Per-parse credit for type-checker consultations.
    #[serde(default = "default_type_checker_budget")]
    pub type_checker_budget: u32,
    /// When set, suppressed adapter failures are logged at warn level.
    #[serde(default)]
    pub diagnostics: bool,
}

fn default_min_name_length() -> usize {
    3
}

fn default_min_inferred_confidence() -> f64 {
    0.3
}

fn default_type_checker_budget() -> u32 {
    200
}

fn default_stop_names() -> BTreeSet<String> {
    [
        "arguments",
        "console",
        "constructor",
        "debugger",
        "document",
        "error",
        "exports",
        "false",
        "module",
        "null",
        "process",
        "prototype",
        "require",
        "self",
        "super",
        "this",
        "true",
        "undefined",
        "window",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for NoisePolicy {
    fn default() -> Self {
        Self {
            ast_min_name_length: default_min_name_length(),
            stop_names: default_stop_names(),
            min_inferred_confidence: default_min_inferred_confidence(),
            type_checker_budget: default_type_checker_budget(),
            diagnostics: false,
        }
    }
}

impl NoisePolicy {
    /// Load the policy from `.trellis/trellis.json` inside the given
    /// directory. Returns defaults if the file doesn't exist or can't be
    /// parsed.
    pub fn load(trellis_dir: &Path) -> Self {
        let path = trellis_dir.join("trellis.json");
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(policy) => policy,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid policy file, using defaults");
                Self::default()
            }
        }
    }

    /// True when a name is in the stop set (comparison is lowercased).
    pub fn is_stop_name(&self, name: &str) -> bool {
        self.stop_names.contains(&name.to_ascii_lowercase())
    }

    /// True when a name should be skipped or penalized as an edge target.
    pub fn is_noisy(&self, name: &str) -> bool {
        name.chars().count() < self.ast_min_name_length || self.is_stop_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_policy() {
        let policy = NoisePolicy::default();
        assert_eq!(policy.ast_min_name_length, 3);
        assert_eq!(policy.type_checker_budget, 200);
        assert!(policy.min_inferred_confidence > 0.0);
        assert!(!policy.diagnostics);
        assert!(policy.is_stop_name("Console"));
    }

    #[test]
    fn test_noisy_names() {
        let policy = NoisePolicy::default();
        assert!(policy.is_noisy("x"));
        assert!(policy.is_noisy("this"));
        assert!(!policy.is_noisy("handleRequest"));
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let policy = NoisePolicy::load(Path::new("/nonexistent"));
        assert_eq!(policy, NoisePolicy::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("trellis.json"),
            r#"{"ast_min_name_length": 2, "type_checker_budget": 10}"#,
        )
        .unwrap();
        let policy = NoisePolicy::load(dir.path());
        assert_eq!(policy.ast_min_name_length, 2);
        assert_eq!(policy.type_checker_budget, 10);
        // Unset fields keep their defaults.
        assert!(policy.is_stop_name("this"));
    }

    #[test]
    fn test_roundtrip() {
        let mut policy = NoisePolicy::default();
        policy.min_inferred_confidence = 0.25;
        policy.diagnostics = true;
        let json = serde_json::to_string(&policy).unwrap();
        let parsed: NoisePolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, policy);
    }
}

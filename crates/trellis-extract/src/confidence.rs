//! Confidence scoring for extracted edges.
//!
//! One place holds every coefficient so calibration against corpus metrics
//! stays a single-file change. Scores start from the (type, state)
//! defaults, apply multiplicative adjustments for resolution tier, scope,
//! re-export depth, and name quality, and clamp into [0, 1].

use trellis_core::normalize::default_confidence;
use trellis_core::policy::NoisePolicy;
use trellis_core::target::is_placeholder_id;
use trellis_core::types::{RelationType, ResolutionState, Scope};

/// How a target was pinned down, best tier first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// Same-file declaration.
    Direct,
    /// Through an import binding / deep re-export chain.
    ViaImport,
    /// The semantic type checker answered.
    TypeChecker,
    /// Pattern-level guesswork.
    Heuristic,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Direct => "direct",
            ResolutionTier::ViaImport => "via-import",
            ResolutionTier::TypeChecker => "type-checker",
            ResolutionTier::Heuristic => "heuristic",
        }
    }
}

/// Everything the scorer looks at.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub rel_type: RelationType,
    pub state: Option<ResolutionState>,
    pub tier: Option<ResolutionTier>,
    pub scope: Option<Scope>,
    pub target_name: Option<&'a str>,
    pub import_depth: Option<u32>,
}

const TYPE_CHECKER_BOOST: f64 = 1.10;
const VIA_IMPORT_BOOST: f64 = 1.05;
const EXTERNAL_SCOPE_PENALTY: f64 = 0.90;
const DEEP_IMPORT_PENALTY: f64 = 0.90;
const PER_EXTRA_HOP_PENALTY: f64 = 0.95;
const NOISY_NAME_PENALTY: f64 = 0.90;

/// Scores one edge.
pub fn score(input: &ScoreInput<'_>, policy: &NoisePolicy) -> f64 {
    let mut value = default_confidence(input.rel_type.is_containment(), input.state);

    match input.tier {
        Some(ResolutionTier::TypeChecker) => value *= TYPE_CHECKER_BOOST,
        Some(ResolutionTier::ViaImport) => value *= VIA_IMPORT_BOOST,
        _ => {}
    }
    if input.scope == Some(Scope::External) {
        value *= EXTERNAL_SCOPE_PENALTY;
    }
    if let Some(depth) = input.import_depth {
        if depth >= 2 {
            value *= DEEP_IMPORT_PENALTY;
            for _ in 2..depth {
                value *= PER_EXTRA_HOP_PENALTY;
            }
        }
    }
    if let Some(name) = input.target_name {
        if policy.is_noisy(name) {
            value *= NOISY_NAME_PENALTY;
        }
    }

    value.clamp(0.0, 1.0)
}

/// The drop rule for inferred edges: REFERENCES and DEPENDS_ON always
/// qualify; READS/WRITES only while their target is still a placeholder.
pub fn should_drop(
    rel_type: RelationType,
    target_id: &str,
    confidence: f64,
    policy: &NoisePolicy,
) -> bool {
    let inferred = rel_type.is_inferred()
        || (matches!(rel_type, RelationType::Reads | RelationType::Writes)
            && is_placeholder_id(target_id));
    inferred && confidence < policy.min_inferred_confidence
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(rel_type: RelationType, state: ResolutionState) -> ScoreInput<'static> {
        ScoreInput {
            rel_type,
            state: Some(state),
            tier: None,
            scope: None,
            target_name: None,
            import_depth: None,
        }
    }

    #[test]
    fn test_state_defaults() {
        let policy = NoisePolicy::default();
        assert_eq!(
            score(&input(RelationType::Calls, ResolutionState::Resolved), &policy),
            0.9
        );
        assert_eq!(
            score(&input(RelationType::Calls, ResolutionState::Partial), &policy),
            0.6
        );
        assert_eq!(
            score(
                &input(RelationType::Calls, ResolutionState::Unresolved),
                &policy
            ),
            0.4
        );
        assert_eq!(
            score(&input(RelationType::Defines, ResolutionState::Resolved), &policy),
            0.95
        );
    }

    #[test]
    fn test_tier_adjustments() {
        let policy = NoisePolicy::default();
        let mut i = input(RelationType::Calls, ResolutionState::Resolved);
        i.tier = Some(ResolutionTier::TypeChecker);
        let boosted = score(&i, &policy);
        assert!(boosted > 0.9 && boosted <= 1.0);

        i.tier = Some(ResolutionTier::ViaImport);
        assert!((score(&i, &policy) - 0.9 * 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_depth_and_scope_penalties() {
        let policy = NoisePolicy::default();
        let mut i = input(RelationType::References, ResolutionState::Resolved);
        i.import_depth = Some(1);
        let shallow = score(&i, &policy);
        i.import_depth = Some(2);
        let deep = score(&i, &policy);
        i.import_depth = Some(4);
        let deeper = score(&i, &policy);
        assert!(shallow > deep && deep > deeper);

        let mut e = input(RelationType::References, ResolutionState::Resolved);
        e.scope = Some(Scope::External);
        assert!(score(&e, &policy) < shallow);
    }

    #[test]
    fn test_noisy_name_penalty() {
        let policy = NoisePolicy::default();
        let mut i = input(RelationType::References, ResolutionState::Resolved);
        i.target_name = Some("x");
        assert!((score(&i, &policy) - 0.9 * 0.9).abs() < 1e-9);
        i.target_name = Some("reasonableName");
        assert_eq!(score(&i, &policy), 0.9);
    }

    #[test]
    fn test_score_never_leaves_unit_interval() {
        let policy = NoisePolicy::default();
        let mut i = input(RelationType::Defines, ResolutionState::Resolved);
        i.tier = Some(ResolutionTier::TypeChecker);
        assert_eq!(score(&i, &policy), 1.0);
    }

    #[test]
    fn test_drop_rule() {
        let policy = NoisePolicy::default();
        // Inferred below the floor: dropped.
        assert!(should_drop(RelationType::References, "external:x", 0.3, &policy));
        // Inferred above the floor: kept.
        assert!(!should_drop(RelationType::References, "external:x", 0.7, &policy));
        // Writes to a concrete target never drop.
        assert!(!should_drop(RelationType::Writes, "sym:a.ts#v", 0.1, &policy));
        // Writes to a placeholder follow the floor.
        assert!(should_drop(RelationType::Writes, "external:v", 0.1, &policy));
        // CALLS are never inferred.
        assert!(!should_drop(RelationType::Calls, "external:f", 0.1, &policy));
    }
}

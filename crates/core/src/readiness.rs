//! Engine readiness aggregation.
//!
//! Pure evaluation over pre-computed requirement results: the caller runs
//! the detectors and disk checks, this module only scores them.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::types::Engine;

/// Outcome of checking one requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementStatus {
    pub available: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    /// Whether the engine cannot run at all without this requirement.
    pub critical: bool,
}

impl RequirementStatus {
    pub fn available(message: impl Into<String>, path: Option<PathBuf>, critical: bool) -> Self {
        Self {
            available: true,
            message: message.into(),
            path,
            solution: None,
            critical,
        }
    }

    pub fn missing(message: impl Into<String>, solution: impl Into<String>, critical: bool) -> Self {
        Self {
            available: false,
            message: message.into(),
            path: None,
            solution: Some(solution.into()),
            critical,
        }
    }
}

/// Aggregated readiness of one engine.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub engine: Engine,
    /// All critical requirements are met.
    pub ready: bool,
    pub critical_met: usize,
    pub critical_total: usize,
    pub met: usize,
    pub total: usize,
    /// Percentage of all requirements met, rounded.
    pub readiness_pct: u8,
    pub requirements: IndexMap<String, RequirementStatus>,
}

/// Compute the readiness percentage from total and met counts.
///
/// Returns 0 if `total` is 0.
pub fn compute_readiness_pct(total: usize, met: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (met as f64 / total as f64 * 100.0).round() as u8;
    pct.min(100)
}

/// Score a set of named requirement results for `engine`.
pub fn evaluate(engine: Engine, requirements: IndexMap<String, RequirementStatus>) -> ReadinessReport {
    let total = requirements.len();
    let met = requirements.values().filter(|r| r.available).count();
    let critical_total = requirements.values().filter(|r| r.critical).count();
    let critical_met = requirements
        .values()
        .filter(|r| r.critical && r.available)
        .count();

    ReadinessReport {
        engine,
        ready: critical_met == critical_total,
        critical_met,
        critical_total,
        met,
        total,
        readiness_pct: compute_readiness_pct(total, met),
        requirements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reqs(items: &[(&str, bool, bool)]) -> IndexMap<String, RequirementStatus> {
        items
            .iter()
            .map(|(name, available, critical)| {
                let status = if *available {
                    RequirementStatus::available("ok", None, *critical)
                } else {
                    RequirementStatus::missing("missing", "install it", *critical)
                };
                (name.to_string(), status)
            })
            .collect()
    }

    #[test]
    fn all_met_is_ready() {
        let report = evaluate(Engine::P5, reqs(&[("chrome", true, true), ("disk", true, false)]));
        assert!(report.ready);
        assert_eq!(report.readiness_pct, 100);
        assert_eq!((report.critical_met, report.critical_total), (1, 1));
    }

    #[test]
    fn missing_optional_requirement_keeps_ready() {
        let report = evaluate(
            Engine::Manim,
            reqs(&[("manim", true, true), ("python", true, true), ("latex", false, false)]),
        );
        assert!(report.ready);
        assert_eq!(report.met, 2);
        assert_eq!(report.readiness_pct, 67);
    }

    #[test]
    fn missing_critical_requirement_is_not_ready() {
        let report = evaluate(Engine::Manim, reqs(&[("manim", false, true), ("latex", true, false)]));
        assert!(!report.ready);
        assert_eq!((report.critical_met, report.critical_total), (0, 1));
        assert_eq!(report.readiness_pct, 50);
    }

    #[test]
    fn pct_of_empty_is_zero() {
        assert_eq!(compute_readiness_pct(0, 0), 0);
    }

    #[test]
    fn missing_requirement_serializes_solution_but_no_path() {
        let json = serde_json::to_value(RequirementStatus::missing("no", "brew install x", true)).unwrap();
        assert_eq!(json["solution"], "brew install x");
        assert!(json.get("path").is_none());
    }
}

use crate::model::{AggregatedResult, OverallStatus, SubmissionStatus, TestOutcome, TestWeight};

/// Reduce a raw list of per-test outcomes into a normalized summary.
///
/// Pure and deterministic: identical inputs always yield identical output.
/// Only outcomes with a non-null test-case id are scored; null-id rows are
/// pseudo-results (compile stage etc.) and never enter the denominator.
///
/// Scoring precedence: per-test-case point weights when a nonempty weight set
/// with positive total points is supplied, uniform pass ratio otherwise, and
/// the backend-reported score as a last resort when no scored outcomes exist
/// at all (e.g. a compile failure before any test ran).
pub fn aggregate(
    outcomes: &[TestOutcome],
    weights: Option<&[TestWeight]>,
    backend_status: &SubmissionStatus,
    backend_score: Option<f64>,
) -> AggregatedResult {
    let scored: Vec<&TestOutcome> = outcomes
        .iter()
        .filter(|o| o.test_case_id.is_some())
        .collect();
    let total = scored.len() as u32;
    let passed = scored.iter().filter(|o| o.is_passed()).count() as u32;

    let score = match weights {
        Some(weights) if weight_total(weights) > 0.0 => {
            let earned: f64 = scored
                .iter()
                .filter(|o| o.is_passed())
                .filter_map(|o| {
                    let id = o.test_case_id?;
                    weights
                        .iter()
                        .find(|w| w.test_case_id == id)
                        .map(|w| w.points)
                })
                .sum();
            percentage(earned, weight_total(weights))
        }
        _ if total > 0 => percentage(passed as f64, total as f64),
        _ => backend_score
            .map(|s| s.round().clamp(0.0, 100.0) as u32)
            .unwrap_or(0),
    };

    let status = if total > 0 && passed == total {
        OverallStatus::Accepted
    } else if *backend_status == SubmissionStatus::CompileError {
        OverallStatus::CompileError
    } else {
        OverallStatus::Error
    };

    AggregatedResult {
        status,
        score,
        passed,
        total,
        outcomes: outcomes.to_vec(),
    }
}

fn weight_total(weights: &[TestWeight]) -> f64 {
    let total: f64 = weights.iter().map(|w| w.points).sum();
    if total.is_finite() {
        total
    } else {
        0.0
    }
}

fn percentage(earned: f64, total: f64) -> u32 {
    let pct = 100.0 * earned / total;
    if pct.is_finite() {
        pct.round().clamp(0.0, 100.0) as u32
    } else {
        0
    }
}

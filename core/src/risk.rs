//! Risk tier classification.
//!
//! RULE: the classifier is the only code that assigns a tier. It runs
//! at every create and update, before persisting; a tier supplied by a
//! caller is discarded and recomputed.

use crate::model::RiskTier;

/// Classify a student's dropout risk from the two tracked metrics.
///
/// Pure, total, priority-ordered:
///   1. average < 2.8 OR absences ≥ 5 → High
///   2. average < 3.8 OR absences ≥ 2 → Medium
///   3. otherwise                     → Low
pub fn classify(academic_average: f64, absences_last_month: u32) -> RiskTier {
    if academic_average < 2.8 || absences_last_month >= 5 {
        return RiskTier::High;
    }
    if academic_average < 3.8 || absences_last_month >= 2 {
        return RiskTier::Medium;
    }
    RiskTier::Low
}

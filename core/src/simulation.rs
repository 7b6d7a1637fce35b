//! Intervention-cost simulation.
//!
//! Pure with respect to stored state: the coordinator hands in the
//! desertion rate current at call time, never a cached copy.

use crate::aggregation::round2;
use serde::{Deserialize, Serialize};

/// Projected outcome of an intervention plan. Ephemeral — never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub initial_rate: f64,
    pub simulated_rate: f64,
    pub cost: u32,
    pub reduction: f64,
}

/// Project the effect of an intervention mix on the current rate.
///
/// Reduction potential per resource:
///   20 tutoring slots   → 0.2 points
///   5 parent workshops  → 0.1 points
///   40 psychology hours → 0.15 points
///
/// Unit costs: tutoring 5, workshop 20, psychology hour 10.
pub fn run_simulation(
    tutoring_slots: u32,
    workshop_count: u32,
    psych_hours: u32,
    current_rate: f64,
) -> SimulationResult {
    let potential = (tutoring_slots as f64 / 20.0) * 0.2
        + (workshop_count as f64 / 5.0) * 0.1
        + (psych_hours as f64 / 40.0) * 0.15;

    let simulated_rate = round2((current_rate - potential).max(0.0));
    let reduction = round2(current_rate - simulated_rate);
    let cost = tutoring_slots * 5 + workshop_count * 20 + psych_hours * 10;

    SimulationResult {
        initial_rate: current_rate,
        simulated_rate,
        cost,
        reduction,
    }
}

use simpade_core::simulation::run_simulation;

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn empty_plan_is_the_identity_on_the_rate() {
    let outcome = run_simulation(0, 0, 0, 13.7);
    assert_eq!(outcome.initial_rate, 13.7);
    assert_eq!(outcome.simulated_rate, 13.7);
    assert_eq!(outcome.reduction, 0.0);
    assert_eq!(outcome.cost, 0);
}

/// Full nominal allotment of each resource: 20 slots, 5 workshops,
/// 40 hours → 0.2 + 0.1 + 0.15 = 0.45 points off the rate.
#[test]
fn nominal_plan_reduces_by_its_full_potential() {
    let outcome = run_simulation(20, 5, 40, 15.0);
    assert_eq!(outcome.simulated_rate, 14.55);
    assert_eq!(outcome.reduction, 0.45);
    assert_eq!(outcome.cost, 20 * 5 + 5 * 20 + 40 * 10);
}

#[test]
fn simulated_rate_never_goes_negative() {
    let outcome = run_simulation(2000, 0, 0, 5.0);
    assert_eq!(outcome.simulated_rate, 0.0);
    assert_eq!(outcome.reduction, 5.0);
    assert_eq!(outcome.cost, 10_000);
}

#[test]
fn cost_is_linear_in_the_resources() {
    let outcome = run_simulation(3, 2, 1, 12.0);
    assert_eq!(outcome.cost, 3 * 5 + 2 * 20 + 10);
}

use simpade_core::roster;

// ── Tests ────────────────────────────────────────────────────────────────────

/// Two rosters from the same seed must be identical.
#[test]
fn same_seed_same_roster() {
    let a = roster::generate(0xDE5E47, 30);
    let b = roster::generate(0xDE5E47, 30);
    assert_eq!(a, b);
}

#[test]
fn different_seeds_diverge() {
    let a = roster::generate(1, 30);
    let b = roster::generate(2, 30);
    assert_ne!(a, b);
}

#[test]
fn generated_forms_stay_in_domain_ranges() {
    let forms = roster::generate(42, 100);
    assert_eq!(forms.len(), 100);
    for form in &forms {
        assert!((9..=11).contains(&form.grade), "grade {} out of range", form.grade);
        assert!(
            (1.5..=5.0).contains(&form.academic_average),
            "average {} out of range",
            form.academic_average
        );
        assert!(form.absences_last_month <= 10);
        assert!(!form.name.trim().is_empty());
        assert!(form.business_id.parse::<u64>().is_ok());
    }
}

#[test]
fn business_ids_are_unique_within_a_roster() {
    let forms = roster::generate(7, 100);
    let mut ids: Vec<_> = forms.iter().map(|f| f.business_id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), forms.len());
}

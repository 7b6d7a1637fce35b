//! monitor-runner: headless driver for the monitoring core.
//!
//! Usage:
//!   monitor-runner --backend memory --seed 42 --count 12
//!   monitor-runner --backend document --db monitor.db
//!   monitor-runner --config monitor.json
//!
//! Walks the full surface once: signs in the demo teacher, seeds a
//! deterministic roster, prints the scoped view, switches the taught
//! grade (scope replacement), hands the session to the demo leader,
//! tunes the school context, runs an intervention simulation, and dumps
//! the audit tail.

use anyhow::Result;
use simpade_core::{
    config::{BackendConfig, MonitorConfig, RosterConfig},
    coordinator::QueryCoordinator,
    identity::{demo_leader, demo_teacher, IdentityHub},
    model::{SchoolContext, StudentRecord},
    roster,
    store::open_store,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = match flag_value(&args, "--config") {
        Some(path) => MonitorConfig::load(path)?,
        None => config_from_args(&args),
    };
    let seed_roster = config.seed_roster.clone().unwrap_or(RosterConfig {
        seed: parse_arg(&args, "--seed", 42u64),
        count: parse_arg(&args, "--count", 12usize),
    });

    log::info!("run started at {}", chrono::Utc::now().to_rfc3339());

    let store = open_store(&config)?;
    let hub = IdentityHub::new();
    let coordinator = QueryCoordinator::build(store, &hub, &config);
    hub.set_ready(true);

    // ── Teacher session: register and watch the scoped view ─────────
    let teacher = demo_teacher();
    hub.sign_in(teacher.clone());
    let records = coordinator.record_stream();
    let rates = coordinator.desertion_rate_stream();

    for form in roster::generate(seed_roster.seed, seed_roster.count) {
        coordinator.save_new_student(form)?;
    }
    let json_output = args.iter().any(|a| a == "--json");
    let view = records.drain().unwrap_or_default();
    println!(
        "teacher {} sees {} record(s) in grade {:?}:",
        teacher.uid,
        view.len(),
        teacher.assigned_grade
    );
    if json_output {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_records(&view);
    }

    coordinator.set_teacher_grade(9)?;
    let view = records.drain().unwrap_or_default();
    println!(
        "\nafter switching to grade 9 (generation {}): {} record(s)",
        coordinator.generation(),
        view.len()
    );
    print_records(&view);

    // ── Leader session: global view, context tuning, simulation ─────
    hub.sign_in(demo_leader());
    let view = records.drain().unwrap_or_default();
    println!("\nleader sees the global collection: {} record(s)", view.len());
    println!("desertion rate: {:.2}%", coordinator.current_desertion_rate());

    coordinator.set_school_context(SchoolContext::High)?;
    if let Some(rate) = rates.drain() {
        println!("rate after High context: {rate:.2}%");
    }

    let outcome = coordinator.run_simulation(20, 5, 40);
    println!(
        "simulation: {:.2}% -> {:.2}% (reduction {:.2}, cost {})",
        outcome.initial_rate, outcome.simulated_rate, outcome.reduction, outcome.cost
    );

    println!("\naudit tail:");
    for entry in coordinator.recent_changes().iter().rev().take(5) {
        println!(
            "  {} {:?} {} by {}",
            entry.at.to_rfc3339(),
            entry.action,
            entry.business_id,
            entry.actor
        );
    }

    coordinator.dispose();
    Ok(())
}

fn print_records(records: &[StudentRecord]) {
    for record in records {
        println!(
            "  [{:?}] {} (id {}) grade {} avg {:.1} absences {}",
            record.risk_tier,
            record.name,
            record.business_id,
            record.grade,
            record.academic_average,
            record.absences_last_month
        );
    }
}

fn config_from_args(args: &[String]) -> MonitorConfig {
    let backend = match flag_value(args, "--backend").unwrap_or("memory") {
        "document" => BackendConfig::Document {
            db_path: flag_value(args, "--db").unwrap_or(":memory:").to_string(),
        },
        _ => BackendConfig::Memory,
    };
    MonitorConfig {
        backend,
        school_context: SchoolContext::Medium,
        seed_roster: None,
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    flag_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

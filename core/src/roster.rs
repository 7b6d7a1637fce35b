//! Deterministic demo roster generation.
//!
//! RULE: roster generation never touches a platform RNG. Everything
//! derives from the caller's seed, so the same seed always produces the
//! same roster — in tests, in the runner, on any machine.

use crate::model::NewStudentForm;
use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

const FIRST_NAMES: &[&str] = &[
    "Ana", "Pedro", "Marta", "Laura", "Carlos", "Sofía", "Julián", "Daniela",
    "Andrés", "Camila", "Mateo", "Valentina", "Sebastián", "Mariana", "Felipe",
    "Isabella", "Tomás", "Natalia", "David", "Lucía", "Samuel", "Paula",
    "Gabriel", "Sara", "Miguel", "Adriana", "Diego", "Nicolás", "Emily", "Juan",
];

const LAST_NAMES: &[&str] = &[
    "Gutiérrez", "López", "Díaz", "Martínez", "Ramírez", "Herrera", "Pérez",
    "Torres", "Gómez", "Castro", "Rojas", "Cárdenas", "Suárez", "Vargas",
    "León", "Ruiz", "Jiménez", "Méndez", "Ortiz", "Castaño", "Gil",
    "Rodríguez", "Salazar", "Molina", "Páez", "Pineda", "Peña", "Morales",
];

struct RosterRng {
    inner: Pcg64Mcg,
}

impl RosterRng {
    fn new(seed: u64) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(seed) }
    }

    fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    fn below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// Generate `count` plausible registration forms. Grades 9–11,
/// averages on the 0–5 scale with one decimal, absence counts skewed
/// low, roughly a third of the roster economically vulnerable.
pub fn generate(seed: u64, count: usize) -> Vec<NewStudentForm> {
    let mut rng = RosterRng::new(seed);
    (0..count)
        .map(|index| {
            let first = FIRST_NAMES[rng.below(FIRST_NAMES.len() as u64) as usize];
            let last = LAST_NAMES[rng.below(LAST_NAMES.len() as u64) as usize];
            // 1.5–5.0, one decimal.
            let academic_average = (15 + rng.below(36)) as f64 / 10.0;
            let absences_last_month = if rng.chance(0.6) {
                rng.below(3) as u32
            } else {
                rng.below(11) as u32
            };
            let vulnerable = rng.chance(0.3);
            NewStudentForm {
                name: format!("{first} {last}"),
                business_id: format!("{}", 10_000 + index as u64 * 7 + rng.below(7)),
                grade: 9 + rng.below(3) as i32,
                academic_average,
                absences_last_month,
                economic_status: Some(if vulnerable {
                    crate::model::EconomicStatus::Vulnerable
                } else {
                    crate::model::EconomicStatus::Stable
                }),
            }
        })
        .collect()
}

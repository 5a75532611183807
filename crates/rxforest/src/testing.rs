//! Deterministic synthetic datasets for tests and benchmarks.
//!
//! Rows follow the prescription rules of the public drug dataset so that a
//! forest can learn them from binned features:
//!
//! - `DrugY`: high sodium-to-potassium ratio
//! - `drugA` / `drugB`: high blood pressure, younger / older patients
//! - `drugC`: low blood pressure, high cholesterol
//! - `drugX`: everything else

use rand::prelude::*;

use crate::data::{LabeledRecord, RawRecord};

/// Class quotas per 40-row cycle: 16 DrugY, 10 drugX, 5 drugA, 5 drugB, 4 drugC.
const CYCLE: [(&str, usize); 5] = [
    ("DrugY", 16),
    ("drugX", 10),
    ("drugA", 5),
    ("drugB", 5),
    ("drugC", 4),
];

/// Generate `n` labeled records in shuffled order.
pub fn synthetic_records(n: usize, seed: u64) -> Vec<LabeledRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let pattern: Vec<&str> = CYCLE
        .iter()
        .flat_map(|&(label, count)| std::iter::repeat_n(label, count))
        .collect();

    let mut records: Vec<LabeledRecord> = (0..n)
        .map(|i| synthetic_row(pattern[i % pattern.len()], &mut rng))
        .collect();
    records.shuffle(&mut rng);
    records
}

fn synthetic_row(drug: &str, rng: &mut StdRng) -> LabeledRecord {
    let sex = if rng.gen_bool(0.5) { "M" } else { "F" };
    let low_ratio = |rng: &mut StdRng| rng.gen_range(6.0..14.5);
    let (age, bp, cholesterol, na_to_k) = match drug {
        "DrugY" => (
            rng.gen_range(15..75),
            *["LOW", "NORMAL", "HIGH"].choose(rng).unwrap_or(&"HIGH"),
            *["NORMAL", "HIGH"].choose(rng).unwrap_or(&"HIGH"),
            rng.gen_range(19.5..38.0),
        ),
        "drugA" => (rng.gen_range(15..49), "HIGH", pick_cholesterol(rng), low_ratio(rng)),
        "drugB" => (rng.gen_range(50..75), "HIGH", pick_cholesterol(rng), low_ratio(rng)),
        "drugC" => (rng.gen_range(15..75), "LOW", "HIGH", low_ratio(rng)),
        _ => {
            let (bp, chol) = if rng.gen_bool(0.6) {
                ("NORMAL", pick_cholesterol(rng))
            } else {
                ("LOW", "NORMAL")
            };
            (rng.gen_range(15..75), bp, chol, low_ratio(rng))
        }
    };
    // Round like the published dataset (three decimals).
    let na_to_k = (na_to_k * 1000.0_f64).round() / 1000.0;
    LabeledRecord::new(RawRecord::new(age, sex, bp, cholesterol, na_to_k), drug)
}

fn pick_cholesterol(rng: &mut StdRng) -> &'static str {
    if rng.gen_bool(0.5) { "HIGH" } else { "NORMAL" }
}

/// Render records as CSV text with the standard header.
pub fn to_csv(records: &[LabeledRecord]) -> String {
    let mut out = String::from("Age,Sex,BP,Cholesterol,Na_to_K,Drug\n");
    for r in records {
        let raw = &r.record;
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            raw.age, raw.sex, raw.bp, raw.cholesterol, raw.na_to_k, r.drug
        ));
    }
    out
}

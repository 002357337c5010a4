//! Purpose: Generate synthetic workers for bulk population and search benchmarks.
//! Exports: `WorkerGenerator`, `GeneratorKind`.
//! Role: Lazy source for `Store::insert_many`; nothing is materialized up front.
//! Invariants: Dates are valid calendar days between 1960-01-01 and 2000-12-31.
//! Invariants: `special` workers are always Male with an `F` surname.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use time::Date;
use time::macros::date;

use crate::age::format_dob;
use crate::core::record::{Sex, Worker};

const SURNAMES: [&str; 5] = ["Smith", "Johnson", "Williams", "Brown", "Jones"];
const FIRST_NAMES: [&str; 5] = ["James", "Robert", "John", "David", "Michael"];
const PATRONYMICS: [&str; 5] = [
    "Ivanovich",
    "Sergeevich",
    "Petrovich",
    "Anatolievich",
    "Dmitrievich",
];
const SPECIAL_FIRST_NAMES: [&str; 4] = ["Frank", "Fred", "Felix", "Ford"];
const SPECIAL_SURNAME_TAILS: [&str; 4] = ["ox", "itz", "rost", "ield"];

const EARLIEST_DOB: Date = date!(1960 - 01 - 01);
const LATEST_DOB: Date = date!(2000 - 12 - 31);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GeneratorKind {
    /// Mixed-sex workers with common surnames; none match an `F` prefix.
    Population,
    /// Male workers whose surname starts with `F`.
    Special,
}

pub struct WorkerGenerator {
    rng: StdRng,
    kind: GeneratorKind,
    remaining: u64,
}

impl WorkerGenerator {
    pub fn new(kind: GeneratorKind, count: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            kind,
            remaining: count,
        }
    }

    pub fn population(count: u64, seed: Option<u64>) -> Self {
        Self::new(GeneratorKind::Population, count, seed)
    }

    pub fn special(count: u64, seed: Option<u64>) -> Self {
        Self::new(GeneratorKind::Special, count, seed)
    }

    fn pick(&mut self, options: &[&'static str]) -> &'static str {
        options.choose(&mut self.rng).copied().unwrap_or_default()
    }

    fn random_dob(&mut self) -> String {
        let day = self
            .rng
            .gen_range(EARLIEST_DOB.to_julian_day()..=LATEST_DOB.to_julian_day());
        format_dob(Date::from_julian_day(day).unwrap_or(EARLIEST_DOB))
    }

    fn next_population(&mut self) -> Worker {
        let last = self.pick(&SURNAMES);
        let first = self.pick(&FIRST_NAMES);
        let middle = self.pick(&PATRONYMICS);
        let sex = if self.rng.gen_bool(0.5) {
            Sex::Male
        } else {
            Sex::Female
        };
        let dob = self.random_dob();
        Worker::new(format!("{last} {first} {middle}"), dob, sex.as_str())
    }

    fn next_special(&mut self) -> Worker {
        let first = self.pick(&SPECIAL_FIRST_NAMES);
        let tail = self.pick(&SPECIAL_SURNAME_TAILS);
        let middle = self.pick(&PATRONYMICS);
        let dob = self.random_dob();
        Worker::new(format!("F{tail} {first} {middle}"), dob, Sex::Male.as_str())
    }
}

impl Iterator for WorkerGenerator {
    type Item = Worker;

    fn next(&mut self) -> Option<Worker> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(match self.kind {
            GeneratorKind::Population => self.next_population(),
            GeneratorKind::Special => self.next_special(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

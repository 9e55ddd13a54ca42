//! Fully-formed synthetic incidents from fixed category lists.

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use std::collections::HashSet;

use super::{GenerationError, SCORE_MAX, SCORE_MIN};
use crate::logging::{info, obj, Domain};
use crate::record::{IncidentDetails, IncidentRecord, Severity};

pub const DEPARTMENTS: &[&str] = &[
    "ICU",
    "Surgery Room",
    "Emergency Room",
    "Pharmacy",
    "Radiology",
    "Pediatrics Ward",
    "General Ward",
    "Maternity Ward",
    "Oncology",
];

pub const INCIDENT_TYPES: &[&str] = &[
    "Medication Error",
    "Fall",
    "Infection Control",
    "Equipment Failure",
    "Patient Miscommunication",
    "Surgical Error",
    "Procedure Complication",
    "Pressure Ulcer",
];

pub const OUTCOMES: &[&str] = &[
    "Patient stable",
    "No harm",
    "Minor injury",
    "Major intervention",
    "Isolated cases",
    "Rescheduled scan",
];

pub const STAFF: &[&str] = &[
    "Nurse",
    "Surgeon",
    "Technician",
    "Radiologist",
    "Respiratory Therapist",
    "Pharmacist",
    "Physical Therapist",
    "Infection Control Nurse",
];

pub const ACTIONS: &[&str] = &[
    "Review medication protocols",
    "Increase monitoring",
    "Equipment maintenance review",
    "Implement strict protocols",
    "Staff training session",
    "Reinforce chemotherapy protocols",
    "Review patient care practices",
];

const DESCRIPTION_WORDS: &[&str] = &[
    "patient", "reported", "during", "shift", "ward", "dose", "observed", "delay", "monitor", "bed", "transfer",
    "alarm", "staff", "review", "noted", "after", "procedure", "handover", "chart", "missed", "order", "device",
    "found", "room", "family", "incorrect", "label", "call", "response", "night", "morning", "escalated",
];

/// 8-digit incident numbers: 10_000_000..=99_999_999.
const ID_MIN: u64 = 10_000_000;
const ID_MAX: u64 = 99_999_999;
const ID_CAPACITY: usize = (ID_MAX - ID_MIN + 1) as usize;

#[derive(Debug, Clone)]
pub struct IncidentFaker {
    pub departments: &'static [&'static str],
    pub incident_types: &'static [&'static str],
    pub outcomes: &'static [&'static str],
    pub staff: &'static [&'static str],
    pub actions: &'static [&'static str],
}

impl Default for IncidentFaker {
    fn default() -> Self {
        Self {
            departments: DEPARTMENTS,
            incident_types: INCIDENT_TYPES,
            outcomes: OUTCOMES,
            staff: STAFF,
            actions: ACTIONS,
        }
    }
}

impl IncidentFaker {
    /// `n` incidents dated between 1 January of the current year and today.
    pub fn generate<R: Rng>(&self, n: usize, rng: &mut R) -> Result<Vec<IncidentRecord>, GenerationError> {
        self.generate_as_of(n, Local::now().date_naive(), rng)
    }

    pub fn generate_as_of<R: Rng>(
        &self,
        n: usize,
        today: NaiveDate,
        rng: &mut R,
    ) -> Result<Vec<IncidentRecord>, GenerationError> {
        if n == 0 {
            return Err(GenerationError::InvalidCount(n));
        }
        if n > ID_CAPACITY {
            return Err(GenerationError::IdSpaceExhausted {
                requested: n,
                capacity: ID_CAPACITY,
            });
        }
        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        let span_days = (today - year_start).num_days();

        let mut seen = HashSet::with_capacity(n);
        let mut records = Vec::with_capacity(n);
        while records.len() < n {
            let id = rng.gen_range(ID_MIN..=ID_MAX);
            if !seen.insert(id) {
                continue;
            }
            let date = year_start + Duration::days(rng.gen_range(0..=span_days));
            let time = NaiveTime::from_num_seconds_from_midnight_opt(rng.gen_range(0..86_400), 0).unwrap_or(NaiveTime::MIN);
            let details = IncidentDetails {
                department: pick(self.departments, rng),
                date,
                time,
                description: sentence(rng),
                severity: *Severity::ALL.choose(rng).unwrap_or(&Severity::Medium),
                outcome: pick(self.outcomes, rng),
                responsible_staff: pick(self.staff, rng),
                action_taken: pick(self.actions, rng),
                priority: rng.gen_range(1..=5),
            };
            records.push(IncidentRecord {
                id,
                incident_type: pick(self.incident_types, rng),
                impact: rng.gen_range(SCORE_MIN..=SCORE_MAX),
                likelihood: rng.gen_range(SCORE_MIN..=SCORE_MAX),
                details: Some(details),
            });
        }

        info(
            Domain::Generate,
            "faker_batch",
            obj(&[("rows", json!(n)), ("year", json!(today.year()))]),
        );
        Ok(records)
    }
}

fn pick<R: Rng>(items: &[&str], rng: &mut R) -> String {
    items.choose(rng).map(|s| s.to_string()).unwrap_or_default()
}

/// Capitalized sentence of four to eight words ending in a period.
fn sentence<R: Rng>(rng: &mut R) -> String {
    let len = rng.gen_range(4..=8);
    let words: Vec<&str> = (0..len)
        .filter_map(|_| DESCRIPTION_WORDS.choose(rng).copied())
        .collect();
    let mut text = words.join(" ");
    if let Some(first) = text.get(0..1) {
        let upper = first.to_uppercase();
        text.replace_range(0..1, &upper);
    }
    text.push('.');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn test_fields_come_from_lists() {
        let mut rng = StdRng::seed_from_u64(11);
        let recs = IncidentFaker::default().generate_as_of(200, today(), &mut rng).unwrap();
        assert_eq!(recs.len(), 200);
        for r in &recs {
            let d = r.details.as_ref().unwrap();
            assert!(INCIDENT_TYPES.contains(&r.incident_type.as_str()));
            assert!(DEPARTMENTS.contains(&d.department.as_str()));
            assert!(OUTCOMES.contains(&d.outcome.as_str()));
            assert!(STAFF.contains(&d.responsible_staff.as_str()));
            assert!(ACTIONS.contains(&d.action_taken.as_str()));
            assert!((1..=5).contains(&d.priority));
            assert!((1..=6).contains(&r.impact) && (1..=6).contains(&r.likelihood));
            assert!(d.date >= NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() && d.date <= today());
            assert!(d.description.ends_with('.'));
            assert!(d.description.chars().next().unwrap().is_uppercase());
        }
    }

    #[test]
    fn test_incident_numbers_are_unique_eight_digit() {
        let mut rng = StdRng::seed_from_u64(5);
        let recs = IncidentFaker::default().generate_as_of(1000, today(), &mut rng).unwrap();
        let ids: HashSet<u64> = recs.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 1000);
        assert!(recs.iter().all(|r| r.id.to_string().len() == 8));
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let a = IncidentFaker::default()
            .generate_as_of(5, today(), &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b = IncidentFaker::default()
            .generate_as_of(5, today(), &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_january_first_only_dates_that_day() {
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let recs = IncidentFaker::default().generate_as_of(10, jan1, &mut rng).unwrap();
        assert!(recs.iter().all(|r| r.details.as_ref().unwrap().date == jan1));
    }

    #[test]
    fn test_bad_counts() {
        let mut rng = StdRng::seed_from_u64(0);
        let faker = IncidentFaker::default();
        assert!(matches!(
            faker.generate_as_of(0, today(), &mut rng),
            Err(GenerationError::InvalidCount(0))
        ));
        assert!(matches!(
            faker.generate_as_of(ID_CAPACITY + 1, today(), &mut rng),
            Err(GenerationError::IdSpaceExhausted { .. })
        ));
    }
}

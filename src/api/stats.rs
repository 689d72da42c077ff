use std::collections::BTreeMap;

use serde::Serialize;
use time::{Date, OffsetDateTime};

use super::{
    err::{CustomError, Result},
    student::{DateParser, StudentRecord},
};

const NANOS_PER_DAY: i128 = 86_400 * 1_000_000_000;

/// Derived statistics over one snapshot of the collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub students_per_class: BTreeMap<i64, usize>,
    pub students_per_country: BTreeMap<String, usize>,
    /// years
    pub average_age: f64,
    /// days since each record was created
    pub average_record_age: f64,
}

impl Statistics {
    pub fn compute(
        records: &[StudentRecord],
        as_of: OffsetDateTime,
        parser: &DateParser,
    ) -> Result<Self> {
        Ok(Self {
            students_per_class: students_per_class(records),
            students_per_country: students_per_country(records),
            average_age: average_age(records, as_of.date(), parser)?,
            average_record_age: average_record_age(records, as_of)?,
        })
    }
}

/// Counts records per key. Keys compare by exact equality.
pub fn count_by<K, F>(records: &[StudentRecord], key_fn: F) -> BTreeMap<K, usize>
where
    K: Ord,
    F: Fn(&StudentRecord) -> K,
{
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(key_fn(record)).or_insert(0) += 1;
    }
    counts
}

pub fn students_per_class(records: &[StudentRecord]) -> BTreeMap<i64, usize> {
    count_by(records, |record| record.class_id)
}

pub fn students_per_country(records: &[StudentRecord]) -> BTreeMap<String, usize> {
    count_by(records, |record| record.country.clone())
}

/// Mean age in years, by calendar-year subtraction only: the birthday is not
/// checked against `as_of`, so someone born in December counts a year older
/// all through January.
pub fn average_age(records: &[StudentRecord], as_of: Date, parser: &DateParser) -> Result<f64> {
    if records.is_empty() {
        return Err(CustomError::EmptyCollection);
    }

    let mut total: i64 = 0;
    for record in records {
        let born = parser.birth_date(record)?;
        total += i64::from(as_of.year() - born.year());
    }

    Ok(round_2(total as f64 / records.len() as f64))
}

/// Mean number of whole days (floored) between each record's `created_at`
/// and `as_of`.
pub fn average_record_age(records: &[StudentRecord], as_of: OffsetDateTime) -> Result<f64> {
    if records.is_empty() {
        return Err(CustomError::EmptyCollection);
    }
    let mut total: i128 = 0;
    for record in records {
        let created = record.created_instant()?;
        let elapsed = (as_of - created).whole_nanoseconds();
        total += elapsed.div_euclid(NANOS_PER_DAY);
    }

    Ok(round_2(total as f64 / records.len() as f64))
}

fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, Duration,
    OffsetDateTime,
};

use super::{
    clock::Clock,
    err::{CustomError, Result},
};

pub const UPDATED_SUFFIX: &str = " (Updated)";

/// Student as supplied by a seed source, timestamps optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStudent {
    // 学号
    pub id: i64,
    // 姓名
    pub name: String,
    // 班级
    pub class_id: i64,
    pub country: String,
    pub date_of_birth: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub modified_at: Option<String>,
}

/// Student held by the engine, both timestamps present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: i64,
    pub name: String,
    pub class_id: i64,
    pub country: String,
    pub date_of_birth: String,
    pub created_at: String,
    pub modified_at: String,
}

impl RawStudent {
    pub fn new(id: i64, name: &str, class_id: i64, country: &str, date_of_birth: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            class_id,
            country: country.to_string(),
            date_of_birth: date_of_birth.to_string(),
            created_at: None,
            modified_at: None,
        }
    }
}

impl StudentRecord {
    pub fn created_instant(&self) -> Result<OffsetDateTime> {
        parse_timestamp(&self.created_at).ok_or_else(|| invalid_date(self.id, &self.created_at))
    }

    pub fn modified_instant(&self) -> Result<OffsetDateTime> {
        parse_timestamp(&self.modified_at).ok_or_else(|| invalid_date(self.id, &self.modified_at))
    }
}

impl From<StudentRecord> for RawStudent {
    fn from(record: StudentRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            class_id: record.class_id,
            country: record.country,
            date_of_birth: record.date_of_birth,
            created_at: Some(record.created_at),
            modified_at: Some(record.modified_at),
        }
    }
}

/// Parses the textual date fields of a record.
///
/// Birth dates are accepted either as `YYYY-MM-DD` or as a full RFC 3339
/// timestamp, in which case only its calendar date is kept.
pub struct DateParser {
    date_only: Regex,
}

impl DateParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            date_only: Regex::new(r"^\d{4}-\d{2}-\d{2}$")?,
        })
    }

    pub fn birth_date(&self, record: &StudentRecord) -> Result<Date> {
        let value = record.date_of_birth.trim();
        let parsed = if self.date_only.is_match(value) {
            Date::parse(value, format_description!("[year]-[month]-[day]")).ok()
        } else {
            OffsetDateTime::parse(value, &Rfc3339).ok().map(|t| t.date())
        };
        parsed.ok_or_else(|| invalid_date(record.id, value))
    }
}

fn invalid_date(id: i64, value: &str) -> CustomError {
    CustomError::InvalidDate {
        id,
        value: value.to_string(),
    }
}

fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).ok()
}

/// RFC 3339 rendering used for every stored timestamp.
pub fn format_timestamp(instant: OffsetDateTime) -> String {
    // formatting a UTC OffsetDateTime with Rfc3339 only fails for years outside 0..=9999
    instant
        .format(&Rfc3339)
        .unwrap_or_else(|_| instant.unix_timestamp().to_string())
}

/// Fills in missing `created_at` / `modified_at` with the clock's current
/// instant, read once for the whole batch.
///
/// Existing timestamps are kept as they are, so stamping an already stamped
/// batch is a no-op. A filled-in `created_at` never lands after an existing
/// `modified_at`, and a filled-in `modified_at` never lands before an existing
/// `created_at`.
pub fn stamp<C: Clock>(records: &[RawStudent], clock: &C) -> Vec<StudentRecord> {
    let now = clock.now();

    records
        .iter()
        .map(|raw| {
            let created_at = match &raw.created_at {
                Some(created) => created.clone(),
                None => {
                    let created = raw
                        .modified_at
                        .as_deref()
                        .and_then(parse_timestamp)
                        .map_or(now, |modified| modified.min(now));
                    format_timestamp(created)
                }
            };
            let modified_at = match &raw.modified_at {
                Some(modified) => modified.clone(),
                None => {
                    let modified = raw
                        .created_at
                        .as_deref()
                        .and_then(parse_timestamp)
                        .map_or(now, |created| created.max(now));
                    format_timestamp(modified)
                }
            };

            StudentRecord {
                id: raw.id,
                name: raw.name.clone(),
                class_id: raw.class_id,
                country: raw.country.clone(),
                date_of_birth: raw.date_of_birth.clone(),
                created_at,
                modified_at,
            }
        })
        .collect()
}

/// Returns a new collection in which student `id` has `" (Updated)"` appended
/// to its name and a fresh `modified_at`. Calling it again compounds the suffix.
///
/// The new `modified_at` is the latest of now, the record's `created_at` and
/// one nanosecond past its previous `modified_at`.
pub fn update<C: Clock>(records: &[StudentRecord], id: i64, clock: &C) -> Result<Vec<StudentRecord>> {
    if !records.iter().any(|record| record.id == id) {
        return Err(CustomError::NotFound(id));
    }

    let now = clock.now();
    records
        .iter()
        .map(|record| {
            if record.id != id {
                return Ok(record.clone());
            }
            Ok(StudentRecord {
                name: format!("{}{}", record.name, UPDATED_SUFFIX),
                modified_at: format_timestamp(next_modified(record, now)?),
                ..record.clone()
            })
        })
        .collect()
}

fn next_modified(record: &StudentRecord, now: OffsetDateTime) -> Result<OffsetDateTime> {
    let mut next = now;
    if let Ok(created) = record.created_instant() {
        next = next.max(created);
    }
    if let Ok(previous) = record.modified_instant() {
        let after = previous
            .checked_add(Duration::nanoseconds(1))
            .ok_or_else(|| invalid_date(record.id, &record.modified_at))?;
        next = next.max(after);
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::clock::testing::{FixedClock, SteppingClock};
    use time::macros::datetime;

    fn seed() -> Vec<RawStudent> {
        vec![
            RawStudent::new(1, "John Doe", 101, "USA", "2002-01-15"),
            RawStudent::new(2, "Jane Smith", 102, "UK", "1998-05-10"),
        ]
    }

    #[test]
    fn test_stamp_fills_missing_timestamps() {
        let clock = FixedClock(datetime!(2024-06-01 12:00 UTC));
        let stamped = stamp(&seed(), &clock);

        assert_eq!(stamped.len(), 2);
        for record in &stamped {
            assert_eq!(record.created_at, "2024-06-01T12:00:00Z");
            assert_eq!(record.modified_at, "2024-06-01T12:00:00Z");
        }
        assert_eq!(stamped[0].id, 1);
        assert_eq!(stamped[1].id, 2);
    }

    #[test]
    fn test_stamp_is_idempotent() {
        let first = stamp(&seed(), &FixedClock(datetime!(2024-06-01 12:00 UTC)));
        let raw: Vec<RawStudent> = first.iter().cloned().map(RawStudent::from).collect();
        let second = stamp(&raw, &FixedClock(datetime!(2025-01-01 0:00 UTC)));

        assert_eq!(first, second);
    }

    #[test]
    fn test_stamp_fills_only_the_missing_field() {
        let mut raw = RawStudent::new(1, "John Doe", 101, "USA", "2002-01-15");
        raw.created_at = Some("2023-01-01T00:00:00Z".to_string());
        let stamped = stamp(&[raw], &FixedClock(datetime!(2024-06-01 12:00 UTC)));

        assert_eq!(stamped[0].created_at, "2023-01-01T00:00:00Z");
        assert_eq!(stamped[0].modified_at, "2024-06-01T12:00:00Z");
    }

    #[test]
    fn test_stamp_keeps_created_before_modified() {
        let mut raw = RawStudent::new(1, "John Doe", 101, "USA", "2002-01-15");
        raw.modified_at = Some("2023-01-01T00:00:00Z".to_string());
        let stamped = stamp(&[raw], &FixedClock(datetime!(2024-06-01 12:00 UTC)));

        assert_eq!(stamped[0].created_at, "2023-01-01T00:00:00Z");
        assert_eq!(stamped[0].modified_at, "2023-01-01T00:00:00Z");
    }

    #[test]
    fn test_stamp_keeps_modified_after_future_created() {
        let mut raw = RawStudent::new(1, "John Doe", 101, "USA", "2002-01-15");
        raw.created_at = Some("2030-01-01T00:00:00Z".to_string());
        let stamped = stamp(&[raw], &FixedClock(datetime!(2024-06-01 12:00 UTC)));

        assert_eq!(stamped[0].created_at, "2030-01-01T00:00:00Z");
        assert_eq!(stamped[0].modified_at, "2030-01-01T00:00:00Z");
        assert!(stamped[0].modified_instant().unwrap() >= stamped[0].created_instant().unwrap());
    }

    #[test]
    fn test_stamp_does_not_touch_input() {
        let raw = seed();
        let _ = stamp(&raw, &FixedClock(datetime!(2024-06-01 12:00 UTC)));
        assert!(raw.iter().all(|r| r.created_at.is_none() && r.modified_at.is_none()));
    }

    #[test]
    fn test_update_appends_suffix() {
        let records = stamp(&seed(), &FixedClock(datetime!(2024-06-01 12:00 UTC)));
        let clock = FixedClock(datetime!(2024-06-02 12:00 UTC));
        let updated = update(&records, 1, &clock).unwrap();

        assert_eq!(updated[0].name, "John Doe (Updated)");
        assert_eq!(updated[0].modified_at, "2024-06-02T12:00:00Z");
        assert_eq!(updated[0].created_at, records[0].created_at);
        assert_eq!(updated[1], records[1]);
    }

    #[test]
    fn test_update_twice_compounds() {
        let records = stamp(&seed(), &FixedClock(datetime!(2024-06-01 12:00 UTC)));
        let clock = SteppingClock::new(datetime!(2024-06-02 12:00 UTC), Duration::seconds(1));
        let once = update(&records, 2, &clock).unwrap();
        let twice = update(&once, 2, &clock).unwrap();

        assert_eq!(twice[1].name, "Jane Smith (Updated) (Updated)");
        assert!(twice[1].modified_instant().unwrap() > once[1].modified_instant().unwrap());
        assert_eq!(twice[0], records[0]);
    }

    #[test]
    fn test_update_with_stalled_clock_still_advances() {
        let clock = FixedClock(datetime!(2024-06-01 12:00 UTC));
        let records = stamp(&seed(), &clock);
        let once = update(&records, 1, &clock).unwrap();

        assert!(once[0].modified_instant().unwrap() > records[0].modified_instant().unwrap());
    }

    #[test]
    fn test_update_never_goes_before_created() {
        let mut record = stamp(&seed(), &FixedClock(datetime!(2030-01-01 0:00 UTC))).remove(0);
        record.modified_at = "garbage".to_string();
        let updated = update(&[record.clone()], 1, &FixedClock(datetime!(2024-06-01 12:00 UTC))).unwrap();

        assert_eq!(updated[0].modified_at, "2030-01-01T00:00:00Z");
        assert!(updated[0].modified_instant().unwrap() >= record.created_instant().unwrap());
    }

    #[test]
    fn test_update_at_the_end_of_time() {
        let mut record = stamp(&seed(), &FixedClock(datetime!(2024-06-01 12:00 UTC))).remove(0);
        record.modified_at = "9999-12-31T23:59:59.999999999Z".to_string();
        let result = update(&[record], 1, &FixedClock(datetime!(2024-06-02 12:00 UTC)));

        match result {
            Err(CustomError::InvalidDate { id, value }) => {
                assert_eq!(id, 1);
                assert_eq!(value, "9999-12-31T23:59:59.999999999Z");
            }
            other => panic!("expected InvalidDate, got {:?}", other),
        }
    }

    #[test]
    fn test_update_unknown_id() {
        let records = stamp(&seed(), &FixedClock(datetime!(2024-06-01 12:00 UTC)));
        let result = update(&records, 42, &FixedClock(datetime!(2024-06-02 12:00 UTC)));
        assert!(matches!(result, Err(CustomError::NotFound(42))));
    }

    #[test]
    fn test_birth_date_formats() {
        let parser = DateParser::new().unwrap();
        let mut record = stamp(&seed(), &FixedClock(datetime!(2024-06-01 12:00 UTC))).remove(0);
        assert_eq!(parser.birth_date(&record).unwrap().year(), 2002);

        record.date_of_birth = "1999-12-31T23:00:00Z".to_string();
        assert_eq!(parser.birth_date(&record).unwrap().year(), 1999);

        record.date_of_birth = "2002-13-40".to_string();
        match parser.birth_date(&record) {
            Err(CustomError::InvalidDate { id, value }) => {
                assert_eq!(id, 1);
                assert_eq!(value, "2002-13-40");
            }
            other => panic!("expected InvalidDate, got {:?}", other),
        }
    }
}

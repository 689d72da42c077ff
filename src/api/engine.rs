use std::{collections::HashSet, sync::Arc};

use log::{debug, info};
use time::OffsetDateTime;

use super::{
    clock::Clock,
    err::{CustomError, Result},
    stats::Statistics,
    student::{self, DateParser, RawStudent, StudentRecord},
};

/// Owns the student collection and publishes it as immutable snapshots.
///
/// Every mutation builds a new vector from the current snapshot and swaps it
/// in; readers holding an older snapshot keep seeing what they were handed.
pub struct StudentEngine<C: Clock> {
    clock: C,
    parser: DateParser,
    records: Arc<Vec<StudentRecord>>,
}

impl<C: Clock> StudentEngine<C> {
    pub fn new(clock: C) -> Result<Self> {
        Ok(Self {
            clock,
            parser: DateParser::new()?,
            records: Arc::new(Vec::new()),
        })
    }

    pub fn snapshot(&self) -> Arc<Vec<StudentRecord>> {
        Arc::clone(&self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stamps `raw` and appends it after the existing records.
    ///
    /// The whole batch is rejected if any id repeats, within the batch or
    /// against the current collection.
    pub fn ingest(&mut self, raw: &[RawStudent]) -> Result<Arc<Vec<StudentRecord>>> {
        let mut seen: HashSet<i64> = self.records.iter().map(|r| r.id).collect();
        for record in raw {
            if !seen.insert(record.id) {
                return Err(CustomError::DuplicateId(record.id));
            }
        }

        let stamped = student::stamp(raw, &self.clock);
        let mut next = Vec::with_capacity(self.records.len() + stamped.len());
        next.extend(self.records.iter().cloned());
        next.extend(stamped);

        info!("ingested {} students, {} total", raw.len(), next.len());
        self.records = Arc::new(next);
        Ok(self.snapshot())
    }

    /// Drops the current collection and ingests `raw` in its place. On error
    /// the current collection is kept.
    pub fn replace(&mut self, raw: &[RawStudent]) -> Result<Arc<Vec<StudentRecord>>> {
        let previous = std::mem::replace(&mut self.records, Arc::new(Vec::new()));
        match self.ingest(raw) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                self.records = previous;
                Err(e)
            }
        }
    }

    pub fn update(&mut self, id: i64) -> Result<Arc<Vec<StudentRecord>>> {
        let next = student::update(&self.records, id, &self.clock)?;
        debug!("student {} updated", id);
        self.records = Arc::new(next);
        Ok(self.snapshot())
    }

    /// Statistics as of the clock's current instant.
    pub fn statistics(&self) -> Result<Statistics> {
        Statistics::compute(&self.records, self.clock.now(), &self.parser)
    }

    pub fn statistics_as_of(&self, as_of: OffsetDateTime) -> Result<Statistics> {
        Statistics::compute(&self.records, as_of, &self.parser)
    }
}

use std::sync::Arc;

use log::{info, warn};
use time::OffsetDateTime;
use tokio::sync::Mutex;

use clock::Clock;
use db::StudentRepository;
use engine::StudentEngine;
use err::Result;
use stats::Statistics;
use student::{RawStudent, StudentRecord};

pub mod clock;
pub mod csv_processor;
pub mod db;
pub mod engine;
pub mod err;
pub mod stats;
pub mod student;

/// Engine behind a single lock plus an optional storage backend.
///
/// Each operation takes the lock for its whole read-compute-publish step, so
/// no two mutations interleave on the same snapshot.
pub struct AppState<C: Clock, R: StudentRepository> {
    engine: Mutex<StudentEngine<C>>,
    repository: Option<R>,
}

impl<C: Clock, R: StudentRepository> AppState<C, R> {
    pub fn new(clock: C, repository: Option<R>) -> Result<Self> {
        Ok(Self {
            engine: Mutex::new(StudentEngine::new(clock)?),
            repository,
        })
    }

    /// Ingests the stored collection if the repository holds one, otherwise
    /// the fallback seed. Returns the number of students now held.
    pub async fn initialize(&self, fallback: Vec<RawStudent>) -> Result<usize> {
        let stored = match &self.repository {
            Some(repository) => repository.load().await?,
            None => Vec::new(),
        };
        let seed = if stored.is_empty() { fallback } else { stored };

        let mut engine = self.engine.lock().await;
        engine.ingest(&seed)?;
        if engine.is_empty() {
            warn!("no students to aggregate");
        }
        info!("initialized with {} students", engine.len());
        Ok(engine.len())
    }

    /// Replaces both the held and the stored collection with `seed`,
    /// whatever the repository held before.
    pub async fn reseed(&self, seed: Vec<RawStudent>) -> Result<usize> {
        let Some(repository) = &self.repository else {
            return Err(err::CustomError::ConfigError(
                "seed needs --database or STUDENT_STATS_DATABASE".to_string(),
            ));
        };

        let mut engine = self.engine.lock().await;
        let snapshot = engine.replace(&seed)?;
        repository.save(&snapshot).await?;
        info!("seeded the database with {} students", snapshot.len());
        Ok(snapshot.len())
    }

    pub async fn students(&self) -> Arc<Vec<StudentRecord>> {
        self.engine.lock().await.snapshot()
    }

    pub async fn statistics(&self) -> Result<Statistics> {
        self.engine.lock().await.statistics()
    }

    pub async fn statistics_as_of(&self, as_of: OffsetDateTime) -> Result<Statistics> {
        self.engine.lock().await.statistics_as_of(as_of)
    }

    pub async fn update_student(&self, id: i64) -> Result<StudentRecord> {
        let mut engine = self.engine.lock().await;
        let snapshot = engine.update(id)?;
        snapshot
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or(err::CustomError::NotFound(id))
    }

    /// Writes the current snapshot to the repository, if there is one.
    pub async fn persist(&self) -> Result<bool> {
        let Some(repository) = &self.repository else {
            return Ok(false);
        };
        let snapshot = self.engine.lock().await.snapshot();
        repository.save(&snapshot).await?;
        Ok(true)
    }

    pub fn repository(&self) -> Option<&R> {
        self.repository.as_ref()
    }
}

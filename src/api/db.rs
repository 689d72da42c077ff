mod table;
use std::path::Path;

use futures::TryStreamExt;
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
pub use table::{ClassInfo, CountryInfo};
use table::StudentRow;

use super::{
    err::Result,
    student::{RawStudent, StudentRecord},
};

/// Persistent home for the student collection.
///
/// The engine never calls this itself; the application decides when to load
/// a seed from it and when to write a snapshot back.
pub trait StudentRepository {
    async fn load(&self) -> Result<Vec<RawStudent>>;
    async fn save(&self, records: &[StudentRecord]) -> Result<()>;
}

#[derive(Clone)]
pub struct SqliteRepository {
    pub db: Pool<Sqlite>,
}

impl SqliteRepository {
    /// Opens (creating if needed) the database file at `path` and runs the
    /// migrations, which also seed the `classes` and `countries` tables.
    pub async fn open(path: &Path) -> Result<Self> {
        // create the data directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        // use the migration feature of sqlx to create the table
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("opened student database at {}", path.display());
        Ok(SqliteRepository { db: pool })
    }

    pub async fn classes(&self) -> Result<Vec<ClassInfo>> {
        let classes = sqlx::query_as(r"SELECT class_id, class_name FROM classes ORDER BY class_id")
            .fetch_all(&self.db)
            .await?;
        Ok(classes)
    }

    pub async fn countries(&self) -> Result<Vec<CountryInfo>> {
        let countries =
            sqlx::query_as(r"SELECT country_id, country_name FROM countries ORDER BY country_id")
                .fetch_all(&self.db)
                .await?;
        Ok(countries)
    }
}

impl StudentRepository for SqliteRepository {
    async fn load(&self) -> Result<Vec<RawStudent>> {
        let mut rows = sqlx::query_as::<_, StudentRow>(
            r"SELECT id, name, class_id, country, date_of_birth, created_at, modified_at
                FROM students
                ORDER BY position",
        )
        .fetch(&self.db);

        let mut students = Vec::new();
        while let Some(row) = rows.try_next().await? {
            students.push(RawStudent::from(row));
        }

        info!("loaded {} students from the database", students.len());
        Ok(students)
    }

    /// Replaces the stored collection with `records`, keeping their order.
    async fn save(&self, records: &[StudentRecord]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        sqlx::query(r"DELETE FROM students").execute(&mut *tx).await?;

        for (position, record) in records.iter().enumerate() {
            sqlx::query(
                r"INSERT INTO students
                    ( id, position, name, class_id, country, date_of_birth, created_at, modified_at )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            )
            .bind(record.id)
            .bind(position as i64)
            .bind(record.name.as_str())
            .bind(record.class_id)
            .bind(record.country.as_str())
            .bind(record.date_of_birth.as_str())
            .bind(record.created_at.as_str())
            .bind(record.modified_at.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!("saved {} students to the database", records.len());
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Keeps whatever was last saved in memory.
    #[derive(Default)]
    pub struct MemoryRepository {
        pub stored: Mutex<Vec<RawStudent>>,
    }

    impl StudentRepository for MemoryRepository {
        async fn load(&self) -> Result<Vec<RawStudent>> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn save(&self, records: &[StudentRecord]) -> Result<()> {
            *self.stored.lock().unwrap() = records.iter().cloned().map(RawStudent::from).collect();
            Ok(())
        }
    }
}

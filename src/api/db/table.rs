use serde::Serialize;

use crate::api::student::RawStudent;

#[derive(sqlx::FromRow, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub class_id: i64,
    pub class_name: String,
}

#[derive(sqlx::FromRow, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountryInfo {
    pub country_id: i64,
    pub country_name: String,
}

/// 学生表中的一行
#[derive(sqlx::FromRow, Debug)]
pub struct StudentRow {
    pub id: i64,
    pub name: String,
    pub class_id: i64,
    pub country: String,
    pub date_of_birth: String,
    pub created_at: String,
    pub modified_at: String,
}

impl From<StudentRow> for RawStudent {
    fn from(row: StudentRow) -> Self {
        RawStudent {
            id: row.id,
            name: row.name,
            class_id: row.class_id,
            country: row.country,
            date_of_birth: row.date_of_birth,
            created_at: Some(row.created_at),
            modified_at: Some(row.modified_at),
        }
    }
}

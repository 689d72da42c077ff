use std::path::Path;

use log::info;

use super::{err::Result, student::RawStudent};

/// Students the application starts with when no other seed is configured.
pub fn default_seed() -> Vec<RawStudent> {
    vec![
        RawStudent::new(1, "John Doe", 101, "USA", "2002-01-15"),
        RawStudent::new(2, "Jane Smith", 102, "UK", "1998-05-10"),
        RawStudent::new(3, "Ahmed Ali", 101, "UAE", "2000-09-23"),
        RawStudent::new(4, "Fatima Khan", 103, "Pakistan", "1995-03-14"),
    ]
}

/// Reads seed students from a csv file with the header
/// `id,name,class_id,country,date_of_birth[,created_at,modified_at]`.
///
/// Empty timestamp cells are treated as missing.
pub fn read_seed_csv(csv_path: &Path) -> Result<Vec<RawStudent>> {
    let file = std::fs::File::open(csv_path)?;
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut records = vec![];
    for rd in rdr.deserialize() {
        let record: RawStudent = rd?;
        records.push(record);
    }
    info!("read {} students from {}", records.len(), csv_path.display());
    Ok(records)
}

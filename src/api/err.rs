/// 自定义错误类型
#[derive(thiserror::Error, Debug)]
pub enum CustomError {
    /// aggregation over zero records
    #[error("cannot aggregate an empty student collection")]
    EmptyCollection,
    /// a date or timestamp field could not be parsed
    #[error("invalid date on student {id}: {value:?}")]
    InvalidDate { id: i64, value: String },
    /// update target is missing
    #[error("student {0} not found")]
    NotFound(i64),
    /// id already present in the collection
    #[error("duplicate student id: {0}")]
    DuplicateId(i64),
    /// 文件读取失败
    #[error("读取文件失败: {0}")]
    FileReadError(#[from] std::io::Error),
    /// csv处理错误
    #[error("解析csv失败: {0}")]
    CsvParseError(#[from] csv::Error),
    /// json序列化失败
    #[error("failed to render json: {0}")]
    JsonError(#[from] serde_json::Error),
    /// database access failed
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    /// schema migration failed
    #[error("migration failed: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    /// regex相关错误
    #[error("failed to parse or compile a regular expression: {0}")]
    RegexError(#[from] regex::Error),
    /// invalid runtime configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, CustomError>;

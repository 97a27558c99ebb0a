#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("session {0} not found")]
    SessionNotFound(i64),
}

pub type Result<T> = std::result::Result<T, DbError>;

//! SQL 생성 에러

/// SQL 생성 에러
#[derive(Debug, thiserror::Error)]
pub enum SqlError {
    #[error("invalid value for '{column}': expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
    },

    #[error("invalid parameter '{name}': {message}")]
    InvalidParam { name: String, message: String },

    #[error("unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("statement build error: {0}")]
    Build(#[from] sea_query::error::Error),
}

pub type Result<T> = std::result::Result<T, SqlError>;

//! Engine 에러 타입

use serde::Serialize;

use tbk_sql::SqlError;

/// Engine 에러
///
/// 외부 HTTP 계층은 `status_code()`/`code()`/`body()`로 응답을 만듭니다.
/// 메시지에는 SQL 텍스트, 물리 식별자, 바인딩 값이 들어가지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("forbidden: {reason}")]
    Denied { reason: String },

    #[error("not found")]
    NotFound,

    #[error("collection not found")]
    CollectionNotFound { name: String },

    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("unsupported schema change: {message}")]
    UnsupportedSchemaChange { message: String },

    #[error("schema inconsistency: {message}")]
    SchemaInconsistency { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("core error: {0}")]
    Core(#[from] tbk_core::Error),
}

/// 에러 응답 JSON
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal {
            message: message.into(),
        }
    }

    /// SQLSTATE 기준으로 DB 에러 분류
    ///
    /// 분류되지 않은 에러는 `Database`로 남고 500으로 응답됩니다.
    pub fn from_db(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let classified = match db.code().as_deref() {
                Some("23505") => Some(EngineError::Conflict {
                    message: "a record with the same unique value already exists".to_string(),
                }),
                Some("42P07") => Some(EngineError::Conflict {
                    message: "already exists".to_string(),
                }),
                Some("23502") => Some(EngineError::validation("a required field is missing")),
                Some("23503") => Some(EngineError::validation(
                    "referenced record does not exist or is still referenced",
                )),
                Some("23514") => Some(EngineError::validation("value violates a check constraint")),
                Some(code) if code.starts_with("22") => Some(EngineError::validation("malformed value")),
                Some("42P01") | Some("42703") => Some(EngineError::SchemaInconsistency {
                    message: "physical schema does not match the catalog".to_string(),
                }),
                _ => None,
            };
            if let Some(classified) = classified {
                return classified;
            }
        }

        match err {
            sqlx::Error::RowNotFound => EngineError::NotFound,
            other => EngineError::Database(other),
        }
    }

    /// 서버 측 결함 여부 (로그 대상)
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }

    /// HTTP 상태 코드
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Denied { .. } => 403,
            EngineError::NotFound | EngineError::CollectionNotFound { .. } => 404,
            EngineError::Validation { .. } => 400,
            EngineError::Conflict { .. } => 409,
            EngineError::UnsupportedSchemaChange { .. } => 422,
            EngineError::SchemaInconsistency { .. }
            | EngineError::Internal { .. }
            | EngineError::Database(_) => 500,
            EngineError::Core(e) => e.status_code(),
        }
    }

    /// 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Denied { .. } => "FORBIDDEN",
            EngineError::NotFound => "NOT_FOUND",
            EngineError::CollectionNotFound { .. } => "COLLECTION_NOT_FOUND",
            EngineError::Validation { .. } => "VALIDATION_ERROR",
            EngineError::Conflict { .. } => "CONFLICT",
            EngineError::UnsupportedSchemaChange { .. } => "UNSUPPORTED_SCHEMA_CHANGE",
            EngineError::SchemaInconsistency { .. } => "SCHEMA_INCONSISTENCY",
            EngineError::Internal { .. } => "INTERNAL_ERROR",
            EngineError::Database(_) => "DATABASE_ERROR",
            EngineError::Core(e) => e.code(),
        }
    }

    /// 호출자에게 보낼 응답 본문
    pub fn body(&self) -> ErrorBody {
        let message = match self {
            EngineError::Internal { .. } | EngineError::Database(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        ErrorBody {
            code: self.code().to_string(),
            message,
        }
    }
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        ErrorResponse { error: err.body() }
    }
}

impl From<SqlError> for EngineError {
    fn from(err: SqlError) -> Self {
        match err {
            SqlError::Build(e) => EngineError::internal(format!("statement build failed: {e}")),
            other => EngineError::validation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

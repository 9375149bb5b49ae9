//! 공통 에러 타입
//!
//! Tablekit 전체에서 사용되는 도메인 에러 타입을 정의합니다.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Tablekit 공통 에러
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────────
    // Schema Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("'{name}' is a reserved column name")]
    ReservedColumn { name: String },

    #[error("duplicate field name: {name}")]
    DuplicateField { name: String },

    #[error("schema validation error: {message}")]
    SchemaValidation { message: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // Permission Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("permission parse error: {message}")]
    PermissionParse { message: String },

    #[error("unknown action: {action}")]
    UnknownAction { action: String },

    // ─────────────────────────────────────────────────────────────────────────────
    // IO/Serialization Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP 상태 코드로 변환
    pub fn status_code(&self) -> u16 {
        match self {
            // 409 Conflict
            Error::DuplicateField { .. } => 409,

            // 400 Bad Request
            _ => 400,
        }
    }

    /// 에러 코드 (클라이언트용)
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            Error::ReservedColumn { .. } => "RESERVED_COLUMN",
            Error::DuplicateField { .. } => "DUPLICATE_FIELD",
            Error::SchemaValidation { .. } => "SCHEMA_VALIDATION_ERROR",
            Error::PermissionParse { .. } => "PERMISSION_PARSE_ERROR",
            Error::UnknownAction { .. } => "UNKNOWN_ACTION",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err = Error::DuplicateField {
            name: "title".to_string(),
        };
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.code(), "DUPLICATE_FIELD");

        let err = Error::ReservedColumn {
            name: "id".to_string(),
        };
        assert_eq!(err.status_code(), 400);
    }
}

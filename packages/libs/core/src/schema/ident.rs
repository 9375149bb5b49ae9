//! 식별자 검증
//!
//! 컬렉션/필드 이름은 물리 테이블/컬럼 이름이 되므로 생성 시점에 허용 목록으로 검증합니다.
//! SQL 생성 단계의 인용(quoting)은 이 검증 위에 한 번 더 적용됩니다.

use crate::error::{Error, Result};

use super::system::SystemTable;

/// Postgres 식별자 최대 길이 (NAMEDATALEN - 1)
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// 모든 물리 테이블에 존재하는 서버 관리 컬럼
pub const AUDIT_COLUMNS: [&str; 5] = ["id", "created_at", "updated_at", "created_by", "updated_by"];

/// 감사 컬럼 여부
pub fn is_audit_column(name: &str) -> bool {
    AUDIT_COLUMNS.contains(&name)
}

/// 식별자 허용 목록 검증
///
/// 영문자/숫자/밑줄만 허용하며, 첫 글자는 영문자 또는 밑줄이어야 합니다.
/// 대소문자는 그대로 보존됩니다.
pub fn validate_identifier(name: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidIdentifier {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let first = name.chars().next().ok_or_else(|| invalid("must not be empty"))?;
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid("must be at most 63 bytes"));
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid("must start with a letter or underscore"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("only letters, digits and underscores are allowed"));
    }

    Ok(())
}

/// 필드 이름 검증 (식별자 + 감사 컬럼 충돌 금지)
pub fn validate_field_name(name: &str) -> Result<()> {
    validate_identifier(name)?;
    if is_audit_column(name) {
        return Err(Error::ReservedColumn {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// 컬렉션 이름 검증 (식별자 + 시스템 테이블/카탈로그 접두사 금지)
pub fn validate_collection_name(name: &str) -> Result<()> {
    validate_identifier(name)?;
    if SystemTable::from_name(name).is_some() {
        return Err(Error::InvalidIdentifier {
            name: name.to_string(),
            reason: "collides with a system collection".to_string(),
        });
    }
    if name.to_ascii_lowercase().starts_with("pg_") {
        return Err(Error::InvalidIdentifier {
            name: name.to_string(),
            reason: "the pg_ prefix is reserved".to_string(),
        });
    }
    Ok(())
}

//! 논리적 필드 타입 정의
//!
//! 카탈로그의 `field_type` 문자열을 논리 타입으로 해석하고,
//! 물리(Postgres) 타입으로 매핑합니다. 매핑 표는 고정이며 호환성을 위해 바꾸지 않습니다.

use serde::{Deserialize, Serialize};

/// 논리적 필드 타입
///
/// # JSON 직렬화
///
/// - `decimal`은 정밀도 보장을 위해 JSON에서 문자열로 전송됩니다.
/// - `datetime`은 RFC 3339 문자열, `date`는 `YYYY-MM-DD` 문자열로 전송됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// 문자열 (TEXT)
    Text,

    /// 32비트 정수
    Integer,

    /// 고정 소수점
    Decimal,

    /// 불리언
    Boolean,

    /// 타임존 포함 타임스탬프
    Datetime,

    /// 날짜
    Date,

    /// JSONB
    Json,

    /// UUID
    Uuid,

    /// 다른 컬렉션 참조 (UUID, 선택적으로 FK)
    Relation,

    /// 알 수 없는 타입 (TEXT로 저장)
    Other(String),
}

impl FieldType {
    /// 문자열에서 파싱
    ///
    /// 별칭(string, float, object 등)을 허용하며, 인식하지 못한 타입은
    /// `Other`로 보존합니다.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "string" => FieldType::Text,
            "integer" | "int" => FieldType::Integer,
            "decimal" | "float" | "number" => FieldType::Decimal,
            "boolean" | "bool" => FieldType::Boolean,
            "datetime" | "timestamp" => FieldType::Datetime,
            "date" => FieldType::Date,
            "json" | "object" => FieldType::Json,
            "uuid" => FieldType::Uuid,
            "relation" => FieldType::Relation,
            _ => FieldType::Other(s.trim().to_string()),
        }
    }

    /// 정규화된 이름
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::Datetime => "datetime",
            FieldType::Date => "date",
            FieldType::Json => "json",
            FieldType::Uuid => "uuid",
            FieldType::Relation => "relation",
            FieldType::Other(name) => name.as_str(),
        }
    }

    /// Postgres 타입 문자열로 변환
    pub fn physical_type(&self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Integer => "INTEGER",
            FieldType::Decimal => "DECIMAL",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Datetime => "TIMESTAMP WITH TIME ZONE",
            FieldType::Date => "DATE",
            FieldType::Json => "JSONB",
            FieldType::Uuid | FieldType::Relation => "UUID",
            // 안전한 대체값
            FieldType::Other(_) => "TEXT",
        }
    }

    /// JSON 값 검증을 위한 예상 타입 반환
    pub fn expected_json_type(&self) -> &'static str {
        match self {
            FieldType::Text | FieldType::Other(_) => "string",
            FieldType::Integer => "integer",
            FieldType::Decimal => "number or numeric string",
            FieldType::Boolean => "boolean",
            FieldType::Datetime => "RFC 3339 timestamp string",
            FieldType::Date => "YYYY-MM-DD date string",
            FieldType::Json => "any",
            FieldType::Uuid | FieldType::Relation => "UUID string",
        }
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        FieldType::parse(&value)
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

//! JSON 값 → 바인딩 값 변환
//!
//! 컬럼의 논리 타입에 맞춰 호출자의 JSON 값을 SeaQuery `Value`로 변환합니다.
//! URL 쿼리에서 온 필터 값은 모두 문자열이므로 숫자/불리언 컬럼도 문자열 표현을 받습니다.
//! NULL은 컬럼 타입에 맞는 타입 있는 NULL로 바인딩됩니다.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_query::Value as SqlValue;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use tbk_core::schema::{ColumnDescriptor, FieldType};

use crate::error::{Result, SqlError};

/// 컬럼 타입에 맞는 NULL
pub fn null_of(field_type: &FieldType) -> SqlValue {
    match field_type {
        FieldType::Text | FieldType::Other(_) => SqlValue::String(None),
        FieldType::Integer => SqlValue::Int(None),
        FieldType::Decimal => SqlValue::Decimal(None),
        FieldType::Boolean => SqlValue::Bool(None),
        FieldType::Datetime => SqlValue::ChronoDateTimeUtc(None),
        FieldType::Date => SqlValue::ChronoDate(None),
        FieldType::Json => SqlValue::Json(None),
        FieldType::Uuid | FieldType::Relation => SqlValue::Uuid(None),
    }
}

/// 컬럼 값 변환
pub fn coerce(column: &ColumnDescriptor, value: &JsonValue) -> Result<SqlValue> {
    coerce_typed(&column.name, &column.field_type, value)
}

/// 타입 기준 값 변환
pub fn coerce_typed(name: &str, field_type: &FieldType, value: &JsonValue) -> Result<SqlValue> {
    if value.is_null() {
        return Ok(null_of(field_type));
    }

    let mismatch = || SqlError::TypeMismatch {
        column: name.to_string(),
        expected: field_type.expected_json_type(),
    };

    let converted = match field_type {
        FieldType::Text | FieldType::Other(_) => match value {
            JsonValue::String(s) => SqlValue::from(s.clone()),
            _ => return Err(mismatch()),
        },
        FieldType::Integer => {
            let n = match value {
                JsonValue::Number(n) => n.as_i64(),
                JsonValue::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(mismatch)?;
            SqlValue::from(i32::try_from(n).map_err(|_| mismatch())?)
        }
        FieldType::Decimal => {
            let text = match value {
                JsonValue::Number(n) => n.to_string(),
                JsonValue::String(s) => s.trim().to_string(),
                _ => return Err(mismatch()),
            };
            let decimal = Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|_| mismatch())?;
            SqlValue::from(decimal)
        }
        FieldType::Boolean => match value {
            JsonValue::Bool(b) => SqlValue::from(*b),
            JsonValue::String(s) if s == "true" => SqlValue::from(true),
            JsonValue::String(s) if s == "false" => SqlValue::from(false),
            _ => return Err(mismatch()),
        },
        FieldType::Datetime => {
            let s = value.as_str().ok_or_else(mismatch)?;
            let parsed = DateTime::parse_from_rfc3339(s).map_err(|_| mismatch())?;
            SqlValue::from(parsed.with_timezone(&Utc))
        }
        FieldType::Date => {
            let s = value.as_str().ok_or_else(mismatch)?;
            let parsed = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| mismatch())?;
            SqlValue::from(parsed)
        }
        FieldType::Json => SqlValue::from(value.clone()),
        FieldType::Uuid | FieldType::Relation => {
            let s = value.as_str().ok_or_else(mismatch)?;
            SqlValue::from(Uuid::parse_str(s).map_err(|_| mismatch())?)
        }
    };

    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(field_type: FieldType) -> ColumnDescriptor {
        ColumnDescriptor::user("c", field_type)
    }

    #[test]
    fn test_typed_nulls() {
        assert_eq!(
            coerce(&column(FieldType::Uuid), &JsonValue::Null).unwrap(),
            SqlValue::Uuid(None)
        );
        assert_eq!(
            coerce(&column(FieldType::Integer), &JsonValue::Null).unwrap(),
            SqlValue::Int(None)
        );
        assert_eq!(
            coerce(&column(FieldType::Json), &JsonValue::Null).unwrap(),
            SqlValue::Json(None)
        );
    }

    #[test]
    fn test_integer() {
        let c = column(FieldType::Integer);
        assert_eq!(coerce(&c, &json!(42)).unwrap(), SqlValue::from(42i32));
        assert_eq!(coerce(&c, &json!("7")).unwrap(), SqlValue::from(7i32));
        assert!(coerce(&c, &json!(1.5)).is_err());
        assert!(coerce(&c, &json!("seven")).is_err());
        assert!(coerce(&c, &json!(i64::from(i32::MAX) + 1)).is_err());
    }

    #[test]
    fn test_decimal() {
        let c = column(FieldType::Decimal);
        assert_eq!(
            coerce(&c, &json!("19.99")).unwrap(),
            SqlValue::from(Decimal::from_str("19.99").unwrap())
        );
        assert_eq!(
            coerce(&c, &json!(3)).unwrap(),
            SqlValue::from(Decimal::from(3))
        );
        assert!(coerce(&c, &json!(true)).is_err());
    }

    #[test]
    fn test_text_is_strict() {
        let c = column(FieldType::Text);
        assert_eq!(
            coerce(&c, &json!("'; DROP TABLE x; --")).unwrap(),
            SqlValue::from("'; DROP TABLE x; --".to_string())
        );
        assert!(coerce(&c, &json!(5)).is_err());
    }

    #[test]
    fn test_boolean_and_dates() {
        assert_eq!(
            coerce(&column(FieldType::Boolean), &json!("true")).unwrap(),
            SqlValue::from(true)
        );
        assert!(coerce(&column(FieldType::Boolean), &json!("yes")).is_err());

        let ts = coerce(&column(FieldType::Datetime), &json!("2024-05-01T10:00:00+02:00")).unwrap();
        let expected = DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(ts, SqlValue::from(expected));

        assert!(coerce(&column(FieldType::Date), &json!("2024-13-01")).is_err());
        assert!(coerce(&column(FieldType::Date), &json!("2024-02-29")).is_ok());
    }

    #[test]
    fn test_uuid_and_relation() {
        let id = Uuid::new_v4();
        assert_eq!(
            coerce(&column(FieldType::Relation), &json!(id.to_string())).unwrap(),
            SqlValue::from(id)
        );
        let err = coerce(&column(FieldType::Uuid), &json!("not-a-uuid")).unwrap_err();
        assert!(err.to_string().contains("UUID"));
    }

    #[test]
    fn test_json_accepts_anything() {
        let c = column(FieldType::Json);
        let v = json!({ "a": [1, 2, { "b": null }] });
        assert_eq!(coerce(&c, &v).unwrap(), SqlValue::from(v.clone()));
    }
}

//! 결과 행 → JSON

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};
use uuid::Uuid;

pub fn rows_to_json(rows: Vec<PgRow>) -> Vec<Value> {
    rows.iter().map(row_to_json).collect()
}

/// 행을 JSON 객체로 변환
///
/// NUMERIC은 정밀도를 잃지 않도록 문자열, 시각은 RFC 3339 문자열로 직렬화됩니다.
pub fn row_to_json(row: &PgRow) -> Value {
    let mut obj = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name().to_ascii_uppercase();
        let value = match type_name.as_str() {
            "INT2" => get::<i16>(row, idx).map(|v| Value::Number(v.into())),
            "INT4" => get::<i32>(row, idx).map(|v| Value::Number(v.into())),
            "INT8" => get::<i64>(row, idx).map(|v| Value::Number(v.into())),
            "FLOAT4" => get::<f32>(row, idx)
                .and_then(|v| Number::from_f64(f64::from(v)))
                .map(Value::Number),
            "FLOAT8" => get::<f64>(row, idx)
                .and_then(Number::from_f64)
                .map(Value::Number),
            "NUMERIC" => get::<Decimal>(row, idx).map(|v| Value::String(v.to_string())),
            "BOOL" => get::<bool>(row, idx).map(Value::Bool),
            "JSON" | "JSONB" => get::<Value>(row, idx),
            "UUID" => get::<Uuid>(row, idx).map(|v| Value::String(v.to_string())),
            "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, idx).map(|v| Value::String(v.to_rfc3339())),
            "TIMESTAMP" => get::<NaiveDateTime>(row, idx)
                .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
            "DATE" => get::<NaiveDate>(row, idx).map(|v| Value::String(v.format("%Y-%m-%d").to_string())),
            _ => get::<String>(row, idx).map(Value::String),
        }
        .unwrap_or(Value::Null);

        obj.insert(column.name().to_string(), value);
    }
    Value::Object(obj)
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

//! 바인딩 값 → sqlx 파라미터

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_query::Value;
use sqlx::postgres::PgArguments;
use sqlx::Postgres;
use uuid::Uuid;

use crate::error::{EngineError, Result};

pub type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// SeaQuery가 만든 값을 순서대로 바인딩
pub fn bind_values<'q>(mut query: PgQuery<'q>, values: &'q [Value]) -> Result<PgQuery<'q>> {
    for value in values {
        query = bind_value(query, value)?;
    }
    Ok(query)
}

fn bind_value<'q>(query: PgQuery<'q>, value: &'q Value) -> Result<PgQuery<'q>> {
    let query = match value {
        Value::Bool(v) => query.bind(*v),
        Value::SmallInt(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::BigInt(v) => query.bind(*v),
        // LIMIT / OFFSET
        Value::BigUnsigned(v) => query.bind(v.map(to_i64).transpose()?),
        Value::Unsigned(v) => query.bind(v.map(i64::from)),
        Value::Double(v) => query.bind(*v),
        Value::String(Some(s)) => query.bind(s.as_str()),
        Value::String(None) => query.bind(Option::<String>::None),
        Value::Json(Some(j)) => query.bind(j.as_ref().clone()),
        Value::Json(None) => query.bind(Option::<serde_json::Value>::None),
        Value::Decimal(Some(d)) => query.bind(**d),
        Value::Decimal(None) => query.bind(Option::<Decimal>::None),
        Value::Uuid(Some(u)) => query.bind(**u),
        Value::Uuid(None) => query.bind(Option::<Uuid>::None),
        Value::ChronoDate(Some(d)) => query.bind(**d),
        Value::ChronoDate(None) => query.bind(Option::<NaiveDate>::None),
        Value::ChronoDateTimeUtc(Some(dt)) => query.bind(**dt),
        Value::ChronoDateTimeUtc(None) => query.bind(Option::<DateTime<Utc>>::None),
        other => {
            return Err(EngineError::internal(format!(
                "unsupported parameter type: {}",
                value_kind(other)
            )))
        }
    };
    Ok(query)
}

fn to_i64(v: u64) -> Result<i64> {
    i64::try_from(v).map_err(|_| EngineError::validation("numeric parameter out of range"))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::TinyInt(_) | Value::TinyUnsigned(_) | Value::SmallUnsigned(_) => "small integer",
        Value::Float(_) => "float",
        Value::Char(_) => "char",
        Value::Bytes(_) => "bytes",
        _ => "other",
    }
}

//! list 요청 파라미터
//!
//! JSON 객체 또는 URL 쿼리 쌍으로 들어온 list 파라미터를 파싱합니다.
//! `sort`, `order`, `limit`, `offset`은 예약 키이며 나머지 키는 모두 필터입니다.
//!
//! # 예시
//!
//! ```text
//! { "status": "open" }                 // status = 'open'
//! { "views": { "$gt": 10 } }           // views > 10
//! ?status=open&views[gte]=10&limit=20  // URL 형식
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SqlError};

const RESERVED_KEYS: [&str; 4] = ["sort", "order", "limit", "offset"];

/// 정렬 순서
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(SqlError::InvalidParam {
                name: "order".to_string(),
                message: "expected 'asc' or 'desc'".to_string(),
            }),
        }
    }
}

/// 필터 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// 같음 (기본)
    Eq,
    /// 같지 않음
    Ne,
    /// 보다 큼
    Gt,
    /// 보다 크거나 같음
    Gte,
    /// 보다 작음
    Lt,
    /// 보다 작거나 같음
    Lte,
    /// IS NULL
    IsNull,
    /// IS NOT NULL
    IsNotNull,
}

impl FilterOperator {
    /// `$gt` 또는 `gt` 형식 파싱
    pub fn parse(s: &str) -> Option<Self> {
        match s.strip_prefix('$').unwrap_or(s) {
            "eq" => Some(FilterOperator::Eq),
            "ne" => Some(FilterOperator::Ne),
            "gt" => Some(FilterOperator::Gt),
            "gte" => Some(FilterOperator::Gte),
            "lt" => Some(FilterOperator::Lt),
            "lte" => Some(FilterOperator::Lte),
            "null" | "isNull" => Some(FilterOperator::IsNull),
            "notNull" | "isNotNull" => Some(FilterOperator::IsNotNull),
            _ => None,
        }
    }

    /// 값이 필요 없는 연산자
    pub fn is_unary(&self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

/// 단일 필터 조건
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub column: String,
    pub op: FilterOperator,
    pub value: Value,
}

/// 페이지 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

/// list 요청 파라미터
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
    /// 필터 (컬럼 → 값 또는 연산자 객체)
    pub filter: BTreeMap<String, Value>,

    /// 정렬 컬럼
    pub sort: Option<String>,

    /// 정렬 순서
    pub order: Option<SortOrder>,

    /// 제한
    pub limit: Option<u64>,

    /// 오프셋
    pub offset: Option<u64>,
}

impl ListParams {
    /// JSON 객체에서 파싱
    pub fn from_json(value: &Value) -> Result<Self> {
        let empty = Map::new();
        let object = match value {
            Value::Object(object) => object,
            Value::Null => &empty,
            _ => {
                return Err(SqlError::InvalidParam {
                    name: "params".to_string(),
                    message: "expected an object".to_string(),
                })
            }
        };

        let mut params = Self::default();
        for (key, value) in object {
            match key.as_str() {
                "sort" => params.sort = Some(expect_str(key, value)?.to_string()),
                "order" => params.order = Some(SortOrder::parse(expect_str(key, value)?)?),
                "limit" => params.limit = Some(expect_u64(key, value)?),
                "offset" => params.offset = Some(expect_u64(key, value)?),
                _ => {
                    params.filter.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(params)
    }

    /// URL 쿼리 쌍에서 파싱
    ///
    /// `field=value`는 같음, `field[op]=value`는 연산자 조건입니다.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "sort" => params.sort = Some(value.to_string()),
                "order" => params.order = Some(SortOrder::parse(value)?),
                "limit" => params.limit = Some(parse_u64(key, value)?),
                "offset" => params.offset = Some(parse_u64(key, value)?),
                _ => {
                    let (column, op) = split_bracket(key);
                    let entry = params
                        .filter
                        .entry(column.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    // 같은 컬럼에 같음 조건과 연산자 조건이 섞이면 `$eq`로 모음
                    if !entry.is_object() {
                        let previous = entry.take();
                        *entry = Value::Object(Map::from_iter([("$eq".to_string(), previous)]));
                    }
                    if let Value::Object(ops) = entry {
                        ops.insert(
                            format!("${}", op.unwrap_or("eq")),
                            Value::String(value.to_string()),
                        );
                    }
                }
            }
        }
        Ok(params)
    }

    /// 필터를 조건 목록으로 전개
    pub fn conditions(&self) -> Result<Vec<FilterCondition>> {
        let mut conditions = Vec::new();
        for (column, value) in &self.filter {
            if RESERVED_KEYS.contains(&column.as_str()) {
                continue;
            }
            match value {
                Value::Object(ops) => {
                    for (op_key, op_value) in ops {
                        let op = FilterOperator::parse(op_key)
                            .ok_or_else(|| SqlError::UnknownOperator(op_key.clone()))?;
                        conditions.push(FilterCondition {
                            column: column.clone(),
                            op,
                            value: op_value.clone(),
                        });
                    }
                }
                Value::Null => conditions.push(FilterCondition {
                    column: column.clone(),
                    op: FilterOperator::IsNull,
                    value: Value::Null,
                }),
                _ => conditions.push(FilterCondition {
                    column: column.clone(),
                    op: FilterOperator::Eq,
                    value: value.clone(),
                }),
            }
        }
        Ok(conditions)
    }

    /// 페이지 범위 계산 (`limit`은 `max`로 잘리고 0이면 기본값)
    pub fn page(&self, default_limit: u64, max_limit: u64) -> Page {
        let limit = match self.limit {
            Some(0) | None => default_limit,
            Some(n) => n,
        };
        Page {
            limit: limit.min(max_limit),
            offset: self.offset.unwrap_or(0),
        }
    }
}

fn split_bracket(key: &str) -> (&str, Option<&str>) {
    match key.split_once('[') {
        Some((column, rest)) if rest.ends_with(']') => (column, Some(&rest[..rest.len() - 1])),
        _ => (key, None),
    }
}

fn expect_str<'a>(name: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| SqlError::InvalidParam {
        name: name.to_string(),
        message: "expected a string".to_string(),
    })
}

fn expect_u64(name: &str, value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(|| SqlError::InvalidParam {
            name: name.to_string(),
            message: "expected a non-negative integer".to_string(),
        }),
        Value::String(s) => parse_u64(name, s),
        _ => Err(SqlError::InvalidParam {
            name: name.to_string(),
            message: "expected a non-negative integer".to_string(),
        }),
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| SqlError::InvalidParam {
        name: name.to_string(),
        message: "expected a non-negative integer".to_string(),
    })
}

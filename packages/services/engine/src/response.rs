//! CRUD 응답

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// CRUD 응답 (`{data, meta}`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrudResponse {
    pub data: Value,
    pub meta: Meta,
}

/// 응답 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Meta {
    /// list 페이지 정보
    Page {
        count: usize,
        total: i64,
        limit: u64,
        offset: u64,
    },

    /// 단건 식별 정보
    Item { table: String, id: Uuid },
}

impl CrudResponse {
    pub fn page(rows: Vec<Value>, total: i64, limit: u64, offset: u64) -> Self {
        Self {
            meta: Meta::Page {
                count: rows.len(),
                total,
                limit,
                offset,
            },
            data: Value::Array(rows),
        }
    }

    pub fn item(table: &str, id: Uuid, data: Value) -> Self {
        Self {
            data,
            meta: Meta::Item {
                table: table.to_string(),
                id,
            },
        }
    }

    /// list 결과 행
    pub fn rows(&self) -> &[Value] {
        self.data.as_array().map(Vec::as_slice).unwrap_or(&[])
    }
}

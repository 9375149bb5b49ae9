//! 테넌트 네임스페이스
//!
//! 테넌트마다 Postgres 스키마 하나(`tenant_<id>`)를 가집니다.

use std::fmt;

use crate::error::{EngineError, Result};

/// 테넌트 ID 최대 길이 (`tenant_` 접두사 포함 63바이트 이내)
pub const MAX_TENANT_ID_LEN: usize = 48;

const SCHEMA_PREFIX: &str = "tenant_";

/// 검증된 테넌트
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tenant {
    id: String,
    schema: String,
}

impl Tenant {
    /// 테넌트 ID 검증 (`[A-Za-z0-9_-]{1,48}`)
    pub fn new(id: &str) -> Result<Self> {
        let valid = !id.is_empty()
            && id.len() <= MAX_TENANT_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(EngineError::validation("invalid tenant id"));
        }

        Ok(Self {
            id: id.to_string(),
            schema: format!("{SCHEMA_PREFIX}{id}"),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 물리 스키마 이름
    pub fn schema(&self) -> &str {
        &self.schema
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

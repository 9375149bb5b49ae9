//! 권한 규칙 저장소
//!
//! 해석기는 `PolicyStore` 트레이트에만 의존합니다. 규칙이 테넌트의 `permissions` 테이블에
//! 있든(`PgPolicyStore`) 정적 YAML 문서에 있든(`StaticPolicyStore`) 같은 방식으로 병합됩니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;

use tbk_core::permissions::{Action, AllowedFields, FieldFilter, PermissionPolicy, PermissionRule};
use tbk_sql::ident::quote_qualified;

use crate::error::{EngineError, Result};
use crate::tenant::Tenant;

/// 권한 규칙 저장소
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// (테이블, 작업)에 해당하는 모든 규칙. role 필터링은 해석기가 합니다.
    async fn rules_for(&self, tenant: &Tenant, table: &str, action: Action)
        -> Result<Vec<PermissionRule>>;

    /// 테넌트 규칙이 바뀌었음을 알림
    async fn invalidate(&self, _tenant: &Tenant) {}
}

#[async_trait]
impl<S: PolicyStore + ?Sized> PolicyStore for Arc<S> {
    async fn rules_for(
        &self,
        tenant: &Tenant,
        table: &str,
        action: Action,
    ) -> Result<Vec<PermissionRule>> {
        (**self).rules_for(tenant, table, action).await
    }

    async fn invalidate(&self, tenant: &Tenant) {
        (**self).invalidate(tenant).await
    }
}

/// permissions 테이블 행
#[derive(Debug, FromRow)]
struct PermissionRow {
    role: String,
    table_name: String,
    action: String,
    field_filter: sqlx::types::Json<Value>,
    allowed_fields: sqlx::types::Json<Value>,
}

impl PermissionRow {
    /// 규칙 변환. 해석할 수 없는 행은 `None` (그 행은 아무것도 허용하지 않음)
    fn into_rule(self) -> Option<PermissionRule> {
        let action = self.action.parse::<Action>().ok()?;
        let field_filter: FieldFilter = serde_json::from_value(self.field_filter.0).ok()?;
        field_filter.validate().ok()?;
        let allowed_fields: AllowedFields = serde_json::from_value(self.allowed_fields.0).ok()?;

        Some(PermissionRule {
            role: self.role,
            table: self.table_name,
            action,
            field_filter,
            allowed_fields,
        })
    }
}

/// 테넌트의 `permissions` 테이블을 매 요청 조회하는 저장소
#[derive(Clone)]
pub struct PgPolicyStore {
    pool: PgPool,
}

impl PgPolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    async fn rules_for(
        &self,
        tenant: &Tenant,
        table: &str,
        action: Action,
    ) -> Result<Vec<PermissionRule>> {
        let sql = format!(
            "SELECT role, table_name, action, field_filter, allowed_fields FROM {} \
             WHERE table_name = $1 AND action = $2",
            quote_qualified(tenant.schema(), "permissions")
        );

        let rows: Vec<PermissionRow> = sqlx::query_as(&sql)
            .bind(table)
            .bind(action.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(tenant = %tenant, table, error = %e, "policy store unavailable");
                EngineError::internal("policy store unavailable")
            })?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let role = row.role.clone();
            match row.into_rule() {
                Some(rule) => rules.push(rule),
                None => {
                    tracing::warn!(tenant = %tenant, table, role = %role, "ignoring malformed permission row")
                }
            }
        }
        Ok(rules)
    }
}

/// 정적 정책 문서 저장소 (모든 테넌트에 같은 규칙)
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyStore {
    policy: PermissionPolicy,
}

impl StaticPolicyStore {
    pub fn new(policy: PermissionPolicy) -> Self {
        Self { policy }
    }

    /// YAML 문서에서 생성
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(Self::new(PermissionPolicy::from_yaml(yaml)?))
    }
}

#[async_trait]
impl PolicyStore for StaticPolicyStore {
    async fn rules_for(
        &self,
        _tenant: &Tenant,
        table: &str,
        action: Action,
    ) -> Result<Vec<PermissionRule>> {
        Ok(self.policy.rules_for(table, action))
    }
}

type CacheKey = (String, String, Action);

/// 캐시된 규칙
#[derive(Debug, Clone)]
struct CachedRules {
    rules: Vec<PermissionRule>,
    cached_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CachedRules>,
    /// 테넌트별 무효화 세대. 조회 중에 세대가 바뀌면 그 결과는 캐시하지 않음
    generations: HashMap<String, u64>,
}

impl CacheState {
    fn generation(&self, tenant_id: &str) -> u64 {
        self.generations.get(tenant_id).copied().unwrap_or(0)
    }
}

/// TTL 캐시 래퍼
///
/// `invalidate`가 호출되면 해당 테넌트의 모든 항목을 버리고 세대를 올립니다.
/// 빈 결과(거부)는 캐시하지 않으며, 만료된 항목은 삽입 때 정리됩니다.
pub struct CachedPolicyStore<S> {
    inner: S,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl<S: PolicyStore> CachedPolicyStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    fn is_fresh(ttl: Duration, entry: &CachedRules) -> bool {
        let elapsed = Utc::now() - entry.cached_at;
        elapsed.to_std().map(|e| e < ttl).unwrap_or(true)
    }
}

#[async_trait]
impl<S: PolicyStore> PolicyStore for CachedPolicyStore<S> {
    async fn rules_for(
        &self,
        tenant: &Tenant,
        table: &str,
        action: Action,
    ) -> Result<Vec<PermissionRule>> {
        let key = (tenant.id().to_string(), table.to_string(), action);

        let generation = {
            let state = self.state.read().await;
            if let Some(entry) = state.entries.get(&key) {
                if Self::is_fresh(self.ttl, entry) {
                    return Ok(entry.rules.clone());
                }
            }
            state.generation(tenant.id())
        };

        let rules = self.inner.rules_for(tenant, table, action).await?;
        if rules.is_empty() {
            return Ok(rules);
        }

        let mut state = self.state.write().await;
        if state.generation(tenant.id()) != generation {
            tracing::debug!(tenant = %tenant, table, "policy cache invalidated during fetch");
            return Ok(rules);
        }
        let ttl = self.ttl;
        state.entries.retain(|_, entry| Self::is_fresh(ttl, entry));
        state.entries.insert(
            key,
            CachedRules {
                rules: rules.clone(),
                cached_at: Utc::now(),
            },
        );
        Ok(rules)
    }

    async fn invalidate(&self, tenant: &Tenant) {
        {
            let mut state = self.state.write().await;
            state
                .entries
                .retain(|(tenant_id, _, _), _| tenant_id != tenant.id());
            *state.generations.entry(tenant.id().to_string()).or_insert(0) += 1;
        }
        self.inner.invalidate(tenant).await;
        tracing::debug!(tenant = %tenant, "policy cache invalidated");
    }
}

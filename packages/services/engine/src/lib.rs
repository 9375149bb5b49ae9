//! tbk-engine: Tablekit 엔진
//!
//! 공유 커넥션 풀 위에서 권한 해석, SQL 생성, 스키마 동기화를 묶어
//! 다섯 가지 CRUD 작업(list, get, create, update, delete)을 제공합니다.
//! HTTP 라우팅과 인증은 외부 계층의 몫이며, 엔진은 확정된 `Principal`을 받습니다.
//!
//! # 모듈 구조
//!
//! - `config`: 환경변수 설정
//! - `error`: 에러 분류와 응답 본문
//! - `telemetry`: tracing 초기화
//! - `tenant`: 테넌트 스키마 이름
//! - `bootstrap`: 테넌트 설치 (시스템 테이블)
//! - `policy`: 권한 규칙 저장소 (Postgres, 정적 YAML, TTL 캐시)
//! - `resolver`: 권한 해석
//! - `catalog`: 카탈로그 조회
//! - `sync`: 물리 스키마 동기화
//! - `executor`: CRUD 실행
//! - `bind`, `rows`, `response`: 값 바인딩, 행 변환, 응답 형태

pub mod bind;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod policy;
pub mod resolver;
pub mod response;
pub mod rows;
pub mod sync;
pub mod telemetry;
pub mod tenant;

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use tbk_core::permissions::Principal;
use tbk_sql::ListParams;

pub use config::EngineConfig;
pub use error::{EngineError, ErrorBody, ErrorResponse, Result};
pub use executor::CrudExecutor;
pub use policy::{CachedPolicyStore, PgPolicyStore, PolicyStore, StaticPolicyStore};
pub use resolver::PermissionResolver;
pub use response::{CrudResponse, Meta};
pub use sync::SchemaSynchronizer;
pub use tenant::Tenant;

/// 엔진
///
/// 복제 비용이 작으므로 요청마다 복제해 써도 됩니다.
#[derive(Clone)]
pub struct Engine {
    pool: PgPool,
    resolver: PermissionResolver,
    executor: CrudExecutor,
}

impl Engine {
    /// 설정으로 커넥션 풀을 만들고 엔진 구성
    pub async fn connect(config: &EngineConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.database_url)
            .await
            .context("failed to connect to Postgres")?;

        tracing::info!(
            max_connections = config.max_connections,
            policy_cache_ttl_secs = config.policy_cache_ttl_secs,
            "engine connected"
        );
        Ok(Self::with_pool(pool, config))
    }

    /// 기존 풀로 엔진 구성 (권한 규칙은 테넌트의 permissions 테이블)
    pub fn with_pool(pool: PgPool, config: &EngineConfig) -> Self {
        let store: Arc<dyn PolicyStore> = match config.policy_cache_ttl() {
            Some(ttl) => Arc::new(CachedPolicyStore::new(PgPolicyStore::new(pool.clone()), ttl)),
            None => Arc::new(PgPolicyStore::new(pool.clone())),
        };
        Self::with_policy_store(pool, store, config)
    }

    /// 권한 규칙 저장소를 지정해 엔진 구성
    pub fn with_policy_store(
        pool: PgPool,
        store: Arc<dyn PolicyStore>,
        config: &EngineConfig,
    ) -> Self {
        let resolver = PermissionResolver::new(store);
        let executor = CrudExecutor::new(
            pool.clone(),
            resolver.clone(),
            config.default_page_size,
            config.max_page_size,
        );
        Self {
            pool,
            resolver,
            executor,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn executor(&self) -> &CrudExecutor {
        &self.executor
    }

    /// 테넌트 스키마와 시스템 테이블 설치 (멱등)
    pub async fn install_tenant(&self, tenant_id: &str) -> Result<Tenant> {
        let tenant = Tenant::new(tenant_id)?;
        bootstrap::install_tenant(&self.pool, &tenant).await?;
        tracing::info!(tenant = %tenant, "tenant installed");
        Ok(tenant)
    }

    pub async fn list(
        &self,
        principal: &Principal,
        table: &str,
        params: &ListParams,
    ) -> Result<CrudResponse> {
        self.executor.list(principal, table, params).await
    }

    pub async fn get(&self, principal: &Principal, table: &str, id: &str) -> Result<CrudResponse> {
        self.executor.get(principal, table, id).await
    }

    pub async fn create(
        &self,
        principal: &Principal,
        table: &str,
        body: &Value,
    ) -> Result<CrudResponse> {
        self.executor.create(principal, table, body).await
    }

    pub async fn update(
        &self,
        principal: &Principal,
        table: &str,
        id: &str,
        body: &Value,
    ) -> Result<CrudResponse> {
        self.executor.update(principal, table, id, body).await
    }

    pub async fn delete(&self, principal: &Principal, table: &str, id: &str) -> Result<CrudResponse> {
        self.executor.delete(principal, table, id).await
    }
}

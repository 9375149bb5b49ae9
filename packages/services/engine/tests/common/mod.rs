//! 통합 테스트 공용 도구
//!
//! `TBK_TEST_DATABASE_URL`이 없으면 각 테스트는 건너뜁니다.
//! 테스트마다 임의 접미사를 붙인 새 테넌트를 설치하고 끝나면 스키마를 삭제합니다.

#![allow(dead_code)]

use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use tbk_core::permissions::Principal;
use tbk_engine::bootstrap::drop_tenant;
use tbk_engine::{Engine, EngineConfig, Tenant};
use tbk_sql::ident::quote_qualified;

pub struct TestTenant {
    pub engine: Engine,
    pub tenant: Tenant,
}

impl TestTenant {
    /// 새 테넌트 준비. 데이터베이스가 설정되지 않았으면 `None`
    pub async fn setup() -> Option<Self> {
        Self::setup_with(|config| config).await
    }

    pub async fn setup_with(configure: impl FnOnce(EngineConfig) -> EngineConfig) -> Option<Self> {
        tbk_engine::telemetry::init_tracing();

        let Ok(url) = std::env::var("TBK_TEST_DATABASE_URL") else {
            eprintln!("TBK_TEST_DATABASE_URL not set; skipping");
            return None;
        };

        let config = configure(EngineConfig::new(url));
        let engine = Engine::connect(&config).await.expect("connect");
        let suffix = Uuid::new_v4().simple().to_string();
        let tenant = engine
            .install_tenant(&format!("t{}", &suffix[..12]))
            .await
            .expect("install tenant");

        Some(Self { engine, tenant })
    }

    pub fn pool(&self) -> &PgPool {
        self.engine.pool()
    }

    /// 테넌트 주체
    pub fn principal<const N: usize>(&self, roles: [&str; N]) -> Principal {
        Principal::new(self.tenant.id(), roles).with_user(Uuid::new_v4())
    }

    /// 권한 규칙 직접 삽입
    pub async fn grant(
        &self,
        role: &str,
        table: &str,
        action: &str,
        field_filter: Value,
        allowed_fields: Value,
    ) {
        let sql = format!(
            "INSERT INTO {} (id, role, table_name, action, field_filter, allowed_fields) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            quote_qualified(self.tenant.schema(), "permissions")
        );
        sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(role)
            .bind(table)
            .bind(action)
            .bind(field_filter)
            .bind(allowed_fields)
            .execute(self.pool())
            .await
            .expect("grant");
    }

    /// 모든 작업에 대한 무제한 권한
    pub async fn grant_all(&self, role: &str, table: &str) {
        for action in ["create", "read", "update", "delete"] {
            self.grant(role, table, action, json!({}), json!(["*"])).await;
        }
    }

    /// 스키마 관리 권한 (collections, fields 전체)
    pub async fn grant_schema_admin(&self, role: &str) {
        self.grant_all(role, "collections").await;
        self.grant_all(role, "fields").await;
    }

    pub async fn table_exists(&self, table: &str) -> bool {
        sqlx::query_scalar(tbk_sql::ddl::TABLE_EXISTS_SQL)
            .bind(self.tenant.schema())
            .bind(table)
            .fetch_one(self.pool())
            .await
            .expect("table exists")
    }

    pub async fn column_count(&self, table: &str, column: &str) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2 AND column_name = $3",
        )
        .bind(self.tenant.schema())
        .bind(table)
        .bind(column)
        .fetch_one(self.pool())
        .await
        .expect("column count")
    }

    pub async fn teardown(self) {
        drop_tenant(self.pool(), &self.tenant)
            .await
            .expect("drop tenant");
    }
}

/// 응답 data의 id
pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id").to_string()
}

//! 테넌트 설치
//!
//! 테넌트 스키마와 시스템 테이블(users, roles, permissions, collections, fields)을
//! 멱등하게 생성합니다. 시스템 테이블은 동기화 대상이 아니므로 여기서만 만들어집니다.

use sqlx::PgPool;
use uuid::Uuid;

use tbk_core::schema::SystemTable;
use tbk_sql::ddl::DdlGenerator;
use tbk_sql::ident::{quote_ident, quote_qualified};

use crate::error::{EngineError, Result};
use crate::tenant::Tenant;

const AUDIT_COLUMNS: &str = "created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
    created_by UUID,
    updated_by UUID";

/// 시스템 테이블 DDL
fn system_tables(schema: &str) -> Vec<String> {
    let table = |name: &str| quote_qualified(schema, name);

    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    id UUID NOT NULL PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    display_name TEXT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    {AUDIT_COLUMNS}
)",
            table("users")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    id UUID NOT NULL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    {AUDIT_COLUMNS}
)",
            table("roles")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    id UUID NOT NULL PRIMARY KEY,
    role TEXT NOT NULL,
    table_name TEXT NOT NULL,
    action TEXT NOT NULL CHECK (action IN ('create', 'read', 'update', 'delete')),
    field_filter JSONB NOT NULL DEFAULT '{{}}'::jsonb,
    allowed_fields JSONB NOT NULL DEFAULT '[\"*\"]'::jsonb,
    {AUDIT_COLUMNS}
)",
            table("permissions")
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS permissions_lookup_idx ON {} (table_name, action)",
            table("permissions")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    id UUID NOT NULL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    display_name TEXT,
    description TEXT,
    is_system BOOLEAN NOT NULL DEFAULT FALSE,
    {AUDIT_COLUMNS}
)",
            table("collections")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    id UUID NOT NULL PRIMARY KEY,
    collection_id UUID NOT NULL REFERENCES {} (id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    field_type TEXT NOT NULL,
    required BOOLEAN NOT NULL DEFAULT FALSE,
    is_unique BOOLEAN NOT NULL DEFAULT FALSE,
    default_value TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    relation_target TEXT,
    display_name TEXT,
    description TEXT,
    {AUDIT_COLUMNS},
    UNIQUE (collection_id, name)
)",
            table("fields"),
            table("collections")
        ),
    ]
}

/// 테넌트 스키마와 시스템 테이블 생성 (멱등)
///
/// 시스템 컬렉션은 `is_system = TRUE`로 카탈로그에 등록됩니다.
pub async fn install_tenant(pool: &PgPool, tenant: &Tenant) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(&DdlGenerator::create_schema(tenant.schema()))
        .execute(&mut *tx)
        .await
        .map_err(EngineError::from_db)?;

    for sql in system_tables(tenant.schema()) {
        sqlx::query(&sql)
            .execute(&mut *tx)
            .await
            .map_err(EngineError::from_db)?;
    }

    let seed = format!(
        "INSERT INTO {} (id, name, is_system) VALUES ($1, $2, TRUE) ON CONFLICT (name) DO NOTHING",
        quote_qualified(tenant.schema(), "collections")
    );
    for system in SystemTable::ALL {
        sqlx::query(&seed)
            .bind(Uuid::new_v4())
            .bind(system.table_name())
            .execute(&mut *tx)
            .await
            .map_err(EngineError::from_db)?;
    }

    tx.commit().await?;
    tracing::info!(tenant = %tenant, "tenant installed");
    Ok(())
}

/// 테넌트 스키마 전체 삭제
pub async fn drop_tenant(pool: &PgPool, tenant: &Tenant) -> Result<()> {
    let sql = format!("DROP SCHEMA IF EXISTS {} CASCADE", quote_ident(tenant.schema()));
    sqlx::query(&sql).execute(pool).await?;
    tracing::info!(tenant = %tenant, "tenant dropped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_tables_are_schema_qualified() {
        let stmts = system_tables("tenant_acme");
        assert_eq!(stmts.len(), 6);
        assert!(stmts
            .iter()
            .all(|s| s.contains("\"tenant_acme\".")));
        assert!(stmts[2].contains("DEFAULT '{}'::jsonb"));
        assert!(stmts[2].contains("DEFAULT '[\"*\"]'::jsonb"));
        assert!(stmts[5].contains("REFERENCES \"tenant_acme\".\"collections\" (id) ON DELETE CASCADE"));
        assert!(stmts[5].contains("UNIQUE (collection_id, name)"));
    }

    #[test]
    fn test_system_tables_match_descriptors() {
        let stmts = system_tables("tenant_acme");
        let ddl = stmts.join("\n");
        for system in SystemTable::ALL {
            for column in system.descriptor().column_names() {
                assert!(
                    ddl.contains(&format!("\n    {column} ")),
                    "{} missing {column}",
                    system.table_name()
                );
            }
        }
    }
}

//! 범용 CRUD 실행기
//!
//! 요청마다 `Authorize → BuildStatement → Execute → ShapeResponse` 순서로 진행합니다.
//! 권한이 없으면 SQL을 만들기 전에 `Denied`로 끝나고, 테이블 서술자도 읽지 않습니다.
//!
//! `collections`/`fields` 쓰기는 같은 경로로 들어와 권한 검사를 거친 뒤
//! 스키마 동기화기로 넘어갑니다. `permissions` 쓰기 후에는 권한 캐시를 무효화합니다.

use std::time::Instant;

use sea_query::Value as SqlValue;
use serde_json::{json, Map, Value};
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tbk_core::permissions::{Action, EffectivePermission, FieldFilter, Principal};
use tbk_core::schema::{SystemTable, TableDescriptor};
use tbk_sql::filter::{row_matches, unknown_filter_columns};
use tbk_sql::value::coerce;
use tbk_sql::{DeleteBuilder, InsertBuilder, ListParams, SelectBuilder, UpdateBuilder};

use crate::bind::bind_values;
use crate::catalog::describe;
use crate::error::{EngineError, Result};
use crate::resolver::PermissionResolver;
use crate::response::CrudResponse;
use crate::rows::{row_to_json, rows_to_json};
use crate::sync::{collection_from_body, field_from_body, SchemaSynchronizer};
use crate::tenant::Tenant;

/// 서버가 채우는 감사 컬럼
const AUDIT_RETURNING: [&str; 4] = ["created_at", "updated_at", "created_by", "updated_by"];

/// 범용 CRUD 실행기
#[derive(Clone)]
pub struct CrudExecutor {
    pool: PgPool,
    resolver: PermissionResolver,
    default_page_size: u64,
    max_page_size: u64,
}

impl CrudExecutor {
    pub fn new(
        pool: PgPool,
        resolver: PermissionResolver,
        default_page_size: u64,
        max_page_size: u64,
    ) -> Self {
        Self {
            pool,
            resolver,
            default_page_size,
            max_page_size,
        }
    }

    /// 목록 조회
    pub async fn list(
        &self,
        principal: &Principal,
        table: &str,
        params: &ListParams,
    ) -> Result<CrudResponse> {
        let tenant = Tenant::new(&principal.tenant_id)?;
        let started = Instant::now();
        let result = self.list_in(principal, &tenant, table, params).await;
        observe(&tenant, table, Action::Read, started, result)
    }

    /// 단건 조회
    pub async fn get(&self, principal: &Principal, table: &str, id: &str) -> Result<CrudResponse> {
        let tenant = Tenant::new(&principal.tenant_id)?;
        let started = Instant::now();
        let result = self.get_in(principal, &tenant, table, id).await;
        observe(&tenant, table, Action::Read, started, result)
    }

    /// 생성
    pub async fn create(
        &self,
        principal: &Principal,
        table: &str,
        body: &Value,
    ) -> Result<CrudResponse> {
        let tenant = Tenant::new(&principal.tenant_id)?;
        let started = Instant::now();
        let result = self.create_in(principal, &tenant, table, body).await;
        observe(&tenant, table, Action::Create, started, result)
    }

    /// 수정
    pub async fn update(
        &self,
        principal: &Principal,
        table: &str,
        id: &str,
        body: &Value,
    ) -> Result<CrudResponse> {
        let tenant = Tenant::new(&principal.tenant_id)?;
        let started = Instant::now();
        let result = self.update_in(principal, &tenant, table, id, body).await;
        observe(&tenant, table, Action::Update, started, result)
    }

    /// 삭제
    pub async fn delete(&self, principal: &Principal, table: &str, id: &str) -> Result<CrudResponse> {
        let tenant = Tenant::new(&principal.tenant_id)?;
        let started = Instant::now();
        let result = self.delete_in(principal, &tenant, table, id).await;
        observe(&tenant, table, Action::Delete, started, result)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Read
    // ─────────────────────────────────────────────────────────────────────────────

    async fn list_in(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        table: &str,
        params: &ListParams,
    ) -> Result<CrudResponse> {
        let permission = self
            .resolver
            .authorize(principal, tenant, table, Action::Read)
            .await?;
        let mut conn = self.pool.acquire().await?;
        let descriptor = scoped_descriptor(&mut conn, tenant, &permission, table).await?;

        let columns = permission.visible_columns(&descriptor);
        let page = params.page(self.default_page_size, self.max_page_size);
        let builder = SelectBuilder::new(tenant.schema(), &descriptor);
        let (sql, values) = builder.list(&columns, &permission.row_filter, params, page)?;
        let (count_sql, count_values) = builder.count(&columns, &permission.row_filter, params)?;
        debug!(tenant = %tenant, table, binds = values.0.len(), "list statement built");

        let rows = bind_values(sqlx::query(&sql), &values.0)?
            .fetch_all(&mut *conn)
            .await
            .map_err(EngineError::from_db)?;
        let total: i64 = bind_values(sqlx::query(&count_sql), &count_values.0)?
            .fetch_one(&mut *conn)
            .await
            .map_err(EngineError::from_db)?
            .try_get("total")?;

        Ok(CrudResponse::page(
            rows_to_json(rows),
            total,
            page.limit,
            page.offset,
        ))
    }

    async fn get_in(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        table: &str,
        id: &str,
    ) -> Result<CrudResponse> {
        let permission = self
            .resolver
            .authorize(principal, tenant, table, Action::Read)
            .await?;
        let id = parse_id(id)?;
        let mut conn = self.pool.acquire().await?;
        let descriptor = scoped_descriptor(&mut conn, tenant, &permission, table).await?;

        let columns = permission.visible_columns(&descriptor);
        let (sql, values) = SelectBuilder::new(tenant.schema(), &descriptor).get(
            &columns,
            &permission.row_filter,
            id,
        );

        let row = bind_values(sqlx::query(&sql), &values.0)?
            .fetch_optional(&mut *conn)
            .await
            .map_err(EngineError::from_db)?
            .ok_or(EngineError::NotFound)?;

        Ok(CrudResponse::item(table, id, row_to_json(&row)))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Create
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_in(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        table: &str,
        body: &Value,
    ) -> Result<CrudResponse> {
        let permission = self
            .resolver
            .authorize(principal, tenant, table, Action::Create)
            .await?;
        let body = write_body(body)?;

        match SystemTable::from_name(table) {
            Some(SystemTable::Collections) => {
                return self
                    .create_collection(principal, tenant, &permission, body)
                    .await
            }
            Some(SystemTable::Fields) => {
                return self.create_field(principal, tenant, &permission, body).await
            }
            Some(SystemTable::Permissions) => check_permission_body(body)?,
            _ => {}
        }

        let mut conn = self.pool.acquire().await?;
        let descriptor = describe(&mut conn, tenant, table).await?;
        let values = writable_values(&descriptor, &permission, body)?;

        let missing = descriptor.missing_required(|column| body.get(column).is_some_and(|v| !v.is_null()));
        if !missing.is_empty() {
            return Err(EngineError::validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }

        let id = Uuid::new_v4();
        check_create_scope(&descriptor, &permission, body, id, principal.user_id)?;

        let returning = returning_columns(body);
        let (sql, params) = InsertBuilder::new(tenant.schema(), &descriptor).build(
            id,
            &values,
            principal.user_id,
            &returning,
        )?;
        debug!(tenant = %tenant, table, binds = params.0.len(), "insert statement built");

        let row = bind_values(sqlx::query(&sql), &params.0)?
            .fetch_one(&mut *conn)
            .await
            .map_err(EngineError::from_db)?;

        if table == SystemTable::Permissions.table_name() {
            self.resolver.invalidate(tenant).await;
        }
        Ok(CrudResponse::item(table, id, row_to_json(&row)))
    }

    /// collections create: 카탈로그 행 + CREATE TABLE + 필드 행을 한 트랜잭션으로
    async fn create_collection(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        permission: &EffectivePermission,
        body: &Map<String, Value>,
    ) -> Result<CrudResponse> {
        let table = SystemTable::Collections.table_name();
        check_permitted_keys(permission, body.keys().filter(|key| *key != "fields"))?;
        let def = collection_from_body(body)?;
        if !def.fields.is_empty() {
            self.resolver
                .authorize(principal, tenant, SystemTable::Fields.table_name(), Action::Create)
                .await?;
        }

        let mut tx = self.pool.begin().await?;
        let id = SchemaSynchronizer::create_collection(&mut tx, tenant, &def, principal.user_id).await?;
        check_create_scope(
            &SystemTable::Collections.descriptor(),
            permission,
            body,
            id,
            principal.user_id,
        )?;
        let data = fetch_system_row(&mut tx, tenant, SystemTable::Collections, id).await?;
        tx.commit().await?;

        Ok(CrudResponse::item(table, id, data))
    }

    /// fields create: 카탈로그 행 + ADD COLUMN (멱등)
    async fn create_field(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        permission: &EffectivePermission,
        body: &Map<String, Value>,
    ) -> Result<CrudResponse> {
        let table = SystemTable::Fields.table_name();
        check_permitted_keys(permission, body.keys())?;
        let (collection_id, field) = field_from_body(body)?;

        let mut tx = self.pool.begin().await?;
        let added =
            SchemaSynchronizer::add_field(&mut tx, tenant, collection_id, &field, principal.user_id)
                .await?;
        check_create_scope(
            &SystemTable::Fields.descriptor(),
            permission,
            body,
            added.id,
            principal.user_id,
        )?;
        let data = fetch_system_row(&mut tx, tenant, SystemTable::Fields, added.id).await?;
        tx.commit().await?;

        if !added.created {
            debug!(tenant = %tenant, field = %field.name, "existing field reused");
        }
        Ok(CrudResponse::item(table, added.id, data))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Update
    // ─────────────────────────────────────────────────────────────────────────────

    async fn update_in(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        table: &str,
        id: &str,
        body: &Value,
    ) -> Result<CrudResponse> {
        let permission = self
            .resolver
            .authorize(principal, tenant, table, Action::Update)
            .await?;
        let id = parse_id(id)?;
        let body = write_body(body)?;

        let mut conn = self.pool.acquire().await?;
        let descriptor = scoped_descriptor(&mut conn, tenant, &permission, table).await?;
        let values = writable_values(&descriptor, &permission, body)?;

        match descriptor.system {
            Some(SystemTable::Permissions) => check_permission_body(body)?,
            Some(system) => SchemaSynchronizer::check_metadata_update(system, body)?,
            None => {}
        }

        if let Some(column) = descriptor
            .writable_columns()
            .find(|c| c.required && body.get(&c.name).is_some_and(Value::is_null))
        {
            return Err(EngineError::validation(format!(
                "field '{}' is required",
                column.name
            )));
        }

        let mut returning = returning_columns(body);
        returning.retain(|c| *c != "created_at" && *c != "created_by");
        let (sql, params) = UpdateBuilder::new(tenant.schema(), &descriptor).build(
            id,
            &values,
            principal.user_id,
            &permission.row_filter,
            &returning,
        );
        debug!(tenant = %tenant, table, binds = params.0.len(), "update statement built");

        let row = bind_values(sqlx::query(&sql), &params.0)?
            .fetch_optional(&mut *conn)
            .await
            .map_err(EngineError::from_db)?
            .ok_or(EngineError::NotFound)?;

        if table == SystemTable::Permissions.table_name() {
            self.resolver.invalidate(tenant).await;
        }
        Ok(CrudResponse::item(table, id, row_to_json(&row)))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Delete
    // ─────────────────────────────────────────────────────────────────────────────

    async fn delete_in(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        table: &str,
        id: &str,
    ) -> Result<CrudResponse> {
        let permission = self
            .resolver
            .authorize(principal, tenant, table, Action::Delete)
            .await?;
        let id = parse_id(id)?;

        match SystemTable::from_name(table) {
            Some(SystemTable::Collections) => {
                let mut tx = self.pool.begin().await?;
                let dropped =
                    SchemaSynchronizer::delete_collection(&mut tx, tenant, id, &permission.row_filter)
                        .await?
                        .ok_or(EngineError::NotFound)?;
                tx.commit().await?;
                return Ok(CrudResponse::item(
                    table,
                    id,
                    json!({ "id": dropped.id, "name": dropped.name }),
                ));
            }
            Some(SystemTable::Fields) => {
                let mut tx = self.pool.begin().await?;
                SchemaSynchronizer::delete_field(&mut tx, tenant, id, &permission.row_filter)
                    .await?
                    .ok_or(EngineError::NotFound)?;
                tx.commit().await?;
                return Ok(CrudResponse::item(table, id, json!({ "id": id })));
            }
            _ => {}
        }

        let mut conn = self.pool.acquire().await?;
        let descriptor = scoped_descriptor(&mut conn, tenant, &permission, table).await?;
        let (sql, params) = DeleteBuilder::new(tenant.schema(), &descriptor).build(
            id,
            &permission.row_filter,
            &["id"],
        );

        bind_values(sqlx::query(&sql), &params.0)?
            .fetch_optional(&mut *conn)
            .await
            .map_err(EngineError::from_db)?
            .ok_or(EngineError::NotFound)?;

        if table == SystemTable::Permissions.table_name() {
            self.resolver.invalidate(tenant).await;
        }
        Ok(CrudResponse::item(table, id, json!({ "id": id })))
    }
}

/// 결과 기록. 서버 측 결함만 error 레벨로 남깁니다 (값은 기록하지 않음)
fn observe<T>(
    tenant: &Tenant,
    table: &str,
    action: Action,
    started: Instant,
    result: Result<T>,
) -> Result<T> {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => debug!(tenant = %tenant, table, action = %action, elapsed_ms, "request completed"),
        Err(err) if err.is_internal() => error!(
            tenant = %tenant,
            table,
            action = %action,
            code = err.code(),
            error = %err,
            "request failed"
        ),
        Err(err) => debug!(
            tenant = %tenant,
            table,
            action = %action,
            code = err.code(),
            "request rejected"
        ),
    }
    result
}

/// 서술자 조회 + 만족할 수 없는 권한 필터 경고
async fn scoped_descriptor(
    conn: &mut PgConnection,
    tenant: &Tenant,
    permission: &EffectivePermission,
    table: &str,
) -> Result<TableDescriptor> {
    let descriptor = describe(conn, tenant, table).await?;
    let unknown = unknown_filter_columns(&descriptor, &permission.row_filter);
    if !unknown.is_empty() {
        warn!(
            tenant = %tenant,
            table,
            columns = ?unknown,
            "row filter references unknown columns; those terms match nothing"
        );
    }
    Ok(descriptor)
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).map_err(|_| EngineError::validation("id must be a UUID"))
}

/// 쓰기 본문 (비어 있지 않은 객체)
fn write_body(body: &Value) -> Result<&Map<String, Value>> {
    body.as_object()
        .filter(|map| !map.is_empty())
        .ok_or_else(|| EngineError::validation("request body must be a non-empty object"))
}

fn check_permitted_keys<'a>(
    permission: &EffectivePermission,
    mut keys: impl Iterator<Item = &'a String>,
) -> Result<()> {
    match keys.find(|key| !permission.permits(key)) {
        Some(key) => Err(EngineError::validation(format!("field '{key}' is not writable"))),
        None => Ok(()),
    }
}

/// 본문 키 검증 및 값 변환
///
/// 모르는 컬럼, 서버 관리 컬럼, 허용되지 않은 컬럼은 모두 같은 메시지로 거부합니다.
fn writable_values(
    descriptor: &TableDescriptor,
    permission: &EffectivePermission,
    body: &Map<String, Value>,
) -> Result<Vec<(String, SqlValue)>> {
    body.iter()
        .map(|(key, value)| -> Result<(String, SqlValue)> {
            let column = descriptor
                .column(key)
                .filter(|c| !c.managed && permission.permits(key))
                .ok_or_else(|| EngineError::validation(format!("field '{key}' is not writable")))?;
            Ok((key.clone(), coerce(column, value)?))
        })
        .collect()
}

/// 새 행이 create 권한의 행 필터를 만족하는지 확인 (컬럼 타입으로 변환한 값끼리 비교)
fn check_create_scope(
    descriptor: &TableDescriptor,
    permission: &EffectivePermission,
    body: &Map<String, Value>,
    id: Uuid,
    actor: Option<Uuid>,
) -> Result<()> {
    if permission.row_filter.is_unrestricted() {
        return Ok(());
    }

    let mut row = body.clone();
    row.insert("id".to_string(), json!(id));
    row.insert("created_by".to_string(), json!(actor));
    row.insert("updated_by".to_string(), json!(actor));

    if row_matches(descriptor, &permission.row_filter, &row) {
        Ok(())
    } else {
        Err(EngineError::Denied {
            reason: "the new record is outside the permitted scope".to_string(),
        })
    }
}

fn returning_columns(body: &Map<String, Value>) -> Vec<&str> {
    std::iter::once("id")
        .chain(body.keys().map(String::as_str))
        .chain(AUDIT_RETURNING)
        .collect()
}

/// permissions 본문 검증 (있는 키만)
fn check_permission_body(body: &Map<String, Value>) -> Result<()> {
    if let Some(action) = body.get("action") {
        action
            .as_str()
            .and_then(|s| s.parse::<Action>().ok())
            .ok_or_else(|| {
                EngineError::validation("action must be one of create, read, update, delete")
            })?;
    }

    if let Some(fields) = body.get("allowed_fields") {
        serde_json::from_value::<Vec<String>>(fields.clone())
            .map_err(|_| EngineError::validation("allowed_fields must be an array of strings"))?;
    }

    if let Some(filter) = body.get("field_filter") {
        let filter: FieldFilter = serde_json::from_value(filter.clone())
            .map_err(|_| EngineError::validation("field_filter must be an object"))?;
        filter.validate()?;
    }

    Ok(())
}

/// 시스템 테이블 행 전체 조회 (트랜잭션 안에서)
async fn fetch_system_row(
    conn: &mut PgConnection,
    tenant: &Tenant,
    system: SystemTable,
    id: Uuid,
) -> Result<Value> {
    let descriptor = system.descriptor();
    let columns: Vec<&str> = descriptor.column_names().collect();
    let (sql, values) = SelectBuilder::new(tenant.schema(), &descriptor).get(
        &columns,
        &tbk_core::permissions::RowFilter::Unrestricted,
        id,
    );

    let row = bind_values(sqlx::query(&sql), &values.0)?
        .fetch_one(&mut *conn)
        .await
        .map_err(EngineError::from_db)?;
    info!(tenant = %tenant, table = system.table_name(), id = %id, "catalog updated");
    Ok(row_to_json(&row))
}

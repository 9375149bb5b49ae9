//! 물리 스키마 동기화
//!
//! `collections`/`fields` 카탈로그 변경을 테넌트 스키마의 DDL로 반영합니다.
//! 모든 작업은 호출자가 연 트랜잭션의 커넥션 위에서 실행되므로,
//! DDL이 실패하면 카탈로그 변경도 함께 롤백됩니다.
//!
//! - 컬렉션 생성: 카탈로그 행 → CREATE TABLE → 필드 행
//! - 필드 추가: 카탈로그 행(충돌 시 기존 행 재사용) → 컬럼이 없을 때만 ADD COLUMN
//! - 필드/컬렉션 삭제: 카탈로그 행 삭제 → DROP COLUMN / DROP TABLE

use serde_json::{Map, Value as JsonValue};
use sea_query::Value;
use sqlx::{PgConnection, Row};
use tracing::{debug, info};
use uuid::Uuid;

use tbk_core::permissions::RowFilter;
use tbk_core::schema::{CollectionDef, FieldDef, FieldType, SystemTable};
use tbk_sql::{DdlGenerator, DeleteBuilder, InsertBuilder};

use crate::bind::bind_values;
use crate::catalog::{column_exists, find_collection, find_collection_by_id, find_field};
use crate::error::{EngineError, Result};
use crate::tenant::Tenant;

/// 생성 후 변경할 수 있는 collections 컬럼
const COLLECTION_METADATA: [&str; 2] = ["display_name", "description"];

/// 생성 후 변경할 수 있는 fields 컬럼
const FIELD_METADATA: [&str; 3] = ["display_name", "description", "sort_order"];

/// 필드 추가 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddedField {
    /// 카탈로그 행 ID
    pub id: Uuid,

    /// 새로 만들어졌는지 (false면 같은 정의의 기존 행 재사용)
    pub created: bool,
}

/// 삭제된 컬렉션
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedCollection {
    pub id: Uuid,
    pub name: String,
}

/// 스키마 동기화기
pub struct SchemaSynchronizer;

impl SchemaSynchronizer {
    /// 컬렉션 생성
    ///
    /// 같은 이름의 컬렉션이 있으면 `Conflict`. 필드의 DEFAULT 표현식이 잘못되면
    /// CREATE TABLE이 실패하고 호출자의 트랜잭션과 함께 모두 롤백됩니다.
    pub async fn create_collection(
        conn: &mut PgConnection,
        tenant: &Tenant,
        def: &CollectionDef,
        actor: Option<Uuid>,
    ) -> Result<Uuid> {
        def.validate()?;
        for field in &def.fields {
            check_relation_target(conn, tenant, &def.name, field).await?;
        }

        let id = Uuid::new_v4();
        let collections = SystemTable::Collections.descriptor();
        let values = vec![
            ("name".to_string(), Value::from(def.name.clone())),
            ("display_name".to_string(), Value::from(def.display_name.clone())),
            ("description".to_string(), Value::from(def.description.clone())),
        ];
        let (sql, params) =
            InsertBuilder::new(tenant.schema(), &collections).build(id, &values, actor, &["id"])?;
        bind_values(sqlx::query(&sql), &params.0)?
            .execute(&mut *conn)
            .await
            .map_err(EngineError::from_db)?;

        let ddl = DdlGenerator::create_table(tenant.schema(), def);
        debug!(tenant = %tenant, collection = %def.name, "executing create table");
        sqlx::query(&ddl)
            .execute(&mut *conn)
            .await
            .map_err(EngineError::from_db)?;

        for field in &def.fields {
            insert_field_row(conn, tenant, id, field, actor, false).await?;
        }

        info!(
            tenant = %tenant,
            collection = %def.name,
            fields = def.fields.len(),
            "collection created"
        );
        Ok(id)
    }

    /// 필드 추가 (멱등)
    ///
    /// 같은 이름의 필드가 이미 있으면 정의가 물리적으로 같을 때만 재사용하고,
    /// 다르면 `UnsupportedSchemaChange`. 물리 컬럼이 이미 있으면 DDL은 생략됩니다.
    pub async fn add_field(
        conn: &mut PgConnection,
        tenant: &Tenant,
        collection_id: Uuid,
        field: &FieldDef,
        actor: Option<Uuid>,
    ) -> Result<AddedField> {
        let collection = find_collection_by_id(conn, tenant, collection_id)
            .await?
            .ok_or_else(|| EngineError::CollectionNotFound {
                name: collection_id.to_string(),
            })?;
        if collection.is_system {
            return Err(EngineError::UnsupportedSchemaChange {
                message: format!("system collection '{}' cannot be altered", collection.name),
            });
        }

        field.validate()?;
        check_relation_target(conn, tenant, &collection.name, field).await?;

        let added = match insert_field_row(conn, tenant, collection.id, field, actor, true).await? {
            Some(id) => AddedField { id, created: true },
            None => {
                let (id, existing) = find_field(conn, tenant, collection.id, &field.name)
                    .await?
                    .ok_or_else(|| EngineError::internal("conflicting field row not found"))?;
                if !existing.same_physical_shape(field) {
                    return Err(EngineError::UnsupportedSchemaChange {
                        message: format!(
                            "field '{}' already exists with a different definition",
                            field.name
                        ),
                    });
                }
                AddedField { id, created: false }
            }
        };

        if column_exists(conn, tenant, &collection.name, &field.name).await? {
            debug!(
                tenant = %tenant,
                collection = %collection.name,
                field = %field.name,
                "column already present"
            );
        } else {
            for statement in DdlGenerator::add_column(tenant.schema(), &collection.name, field) {
                sqlx::query(&statement)
                    .execute(&mut *conn)
                    .await
                    .map_err(EngineError::from_db)?;
            }
            info!(
                tenant = %tenant,
                collection = %collection.name,
                field = %field.name,
                field_type = %field.field_type.as_str(),
                "column added"
            );
        }

        Ok(added)
    }

    /// 필드 삭제
    ///
    /// 행 필터를 만족하는 카탈로그 행이 없으면 `None`.
    pub async fn delete_field(
        conn: &mut PgConnection,
        tenant: &Tenant,
        field_id: Uuid,
        row_filter: &RowFilter,
    ) -> Result<Option<Uuid>> {
        let fields = SystemTable::Fields.descriptor();
        let (sql, params) = DeleteBuilder::new(tenant.schema(), &fields).build(
            field_id,
            row_filter,
            &["id", "collection_id", "name"],
        );
        let Some(row) = bind_values(sqlx::query(&sql), &params.0)?
            .fetch_optional(&mut *conn)
            .await
            .map_err(EngineError::from_db)?
        else {
            return Ok(None);
        };

        let collection_id: Uuid = row.try_get("collection_id")?;
        let name: String = row.try_get("name")?;

        match find_collection_by_id(conn, tenant, collection_id).await? {
            Some(collection) if !collection.is_system => {
                let ddl = DdlGenerator::drop_column(tenant.schema(), &collection.name, &name);
                sqlx::query(&ddl)
                    .execute(&mut *conn)
                    .await
                    .map_err(EngineError::from_db)?;
                info!(
                    tenant = %tenant,
                    collection = %collection.name,
                    field = %name,
                    "column dropped"
                );
            }
            Some(collection) => {
                return Err(EngineError::UnsupportedSchemaChange {
                    message: format!("system collection '{}' cannot be altered", collection.name),
                })
            }
            None => {}
        }

        Ok(Some(field_id))
    }

    /// 컬렉션 삭제
    ///
    /// 필드 행은 FK로 함께 삭제되고, 물리 테이블은 DROP TABLE로 제거됩니다.
    pub async fn delete_collection(
        conn: &mut PgConnection,
        tenant: &Tenant,
        collection_id: Uuid,
        row_filter: &RowFilter,
    ) -> Result<Option<DroppedCollection>> {
        let collections = SystemTable::Collections.descriptor();
        let (sql, params) = DeleteBuilder::new(tenant.schema(), &collections).build(
            collection_id,
            row_filter,
            &["id", "name", "is_system"],
        );
        let Some(row) = bind_values(sqlx::query(&sql), &params.0)?
            .fetch_optional(&mut *conn)
            .await
            .map_err(EngineError::from_db)?
        else {
            return Ok(None);
        };

        let name: String = row.try_get("name")?;
        let is_system: bool = row.try_get("is_system")?;
        if is_system {
            return Err(EngineError::UnsupportedSchemaChange {
                message: format!("system collection '{name}' cannot be deleted"),
            });
        }

        let ddl = DdlGenerator::drop_table(tenant.schema(), &name);
        sqlx::query(&ddl)
            .execute(&mut *conn)
            .await
            .map_err(EngineError::from_db)?;
        info!(tenant = %tenant, collection = %name, "collection dropped");

        Ok(Some(DroppedCollection {
            id: collection_id,
            name,
        }))
    }

    /// 카탈로그 행 update 본문 검사
    ///
    /// collections/fields는 표시용 메타데이터만 바꿀 수 있습니다.
    /// 다른 시스템 테이블과 사용자 컬렉션은 제한이 없습니다.
    pub fn check_metadata_update(table: SystemTable, body: &Map<String, JsonValue>) -> Result<()> {
        let allowed: &[&str] = match table {
            SystemTable::Collections => &COLLECTION_METADATA,
            SystemTable::Fields => &FIELD_METADATA,
            _ => return Ok(()),
        };

        match body.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(EngineError::UnsupportedSchemaChange {
                message: format!(
                    "'{key}' of {} cannot be changed after creation",
                    table.table_name()
                ),
            }),
            None => Ok(()),
        }
    }
}

/// collections create 본문을 컬렉션 정의로 변환
pub fn collection_from_body(body: &Map<String, JsonValue>) -> Result<CollectionDef> {
    serde_json::from_value(JsonValue::Object(body.clone()))
        .map_err(|e| EngineError::validation(format!("invalid collection definition: {e}")))
}

/// fields create 본문을 (컬렉션 ID, 필드 정의)로 변환
pub fn field_from_body(body: &Map<String, JsonValue>) -> Result<(Uuid, FieldDef)> {
    let mut body = body.clone();
    let collection_id = body
        .remove("collection_id")
        .and_then(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))
        .ok_or_else(|| EngineError::validation("collection_id must be a UUID"))?;

    let field = serde_json::from_value(JsonValue::Object(body))
        .map_err(|e| EngineError::validation(format!("invalid field definition: {e}")))?;
    Ok((collection_id, field))
}

/// relation 필드의 참조 대상 확인 (자기 자신 또는 존재하는 사용자 컬렉션)
async fn check_relation_target(
    conn: &mut PgConnection,
    tenant: &Tenant,
    owner: &str,
    field: &FieldDef,
) -> Result<()> {
    let Some(target) = field.relation_target.as_deref() else {
        return Ok(());
    };
    if field.field_type != FieldType::Relation || target == owner {
        return Ok(());
    }

    match find_collection(conn, tenant, target).await? {
        Some(collection) if !collection.is_system => Ok(()),
        _ => Err(EngineError::validation(format!(
            "field '{}': relation target '{target}' is not a user collection",
            field.name
        ))),
    }
}

/// fields 카탈로그 행 삽입
///
/// `skip_conflict`이면 (collection_id, name) 충돌 시 `None`.
async fn insert_field_row(
    conn: &mut PgConnection,
    tenant: &Tenant,
    collection_id: Uuid,
    field: &FieldDef,
    actor: Option<Uuid>,
    skip_conflict: bool,
) -> Result<Option<Uuid>> {
    let fields = SystemTable::Fields.descriptor();
    let values = field_values(collection_id, field);

    let mut builder = InsertBuilder::new(tenant.schema(), &fields);
    if skip_conflict {
        builder = builder.on_conflict_do_nothing(&["collection_id", "name"]);
    }
    let (sql, params) = builder.build(Uuid::new_v4(), &values, actor, &["id"])?;

    let row = bind_values(sqlx::query(&sql), &params.0)?
        .fetch_optional(&mut *conn)
        .await
        .map_err(EngineError::from_db)?;
    match row {
        Some(row) => Ok(Some(row.try_get("id")?)),
        None => Ok(None),
    }
}

fn field_values(collection_id: Uuid, field: &FieldDef) -> Vec<(String, Value)> {
    vec![
        ("collection_id".to_string(), Value::from(collection_id)),
        ("name".to_string(), Value::from(field.name.clone())),
        ("field_type".to_string(), Value::from(field.field_type.as_str().to_string())),
        ("required".to_string(), Value::from(field.required)),
        ("is_unique".to_string(), Value::from(field.unique)),
        ("default_value".to_string(), Value::from(field.default.clone())),
        ("sort_order".to_string(), Value::from(field.sort_order)),
        ("relation_target".to_string(), Value::from(field.relation_target.clone())),
        ("display_name".to_string(), Value::from(field.display_name.clone())),
        ("description".to_string(), Value::from(field.description.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_metadata_update_allows_display_fields() {
        let body = object(json!({ "display_name": "Posts", "description": "blog" }));
        assert!(SchemaSynchronizer::check_metadata_update(SystemTable::Collections, &body).is_ok());

        let body = object(json!({ "sort_order": 3 }));
        assert!(SchemaSynchronizer::check_metadata_update(SystemTable::Fields, &body).is_ok());
    }

    #[test]
    fn test_metadata_update_rejects_physical_changes() {
        let body = object(json!({ "name": "articles" }));
        let err =
            SchemaSynchronizer::check_metadata_update(SystemTable::Collections, &body).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_SCHEMA_CHANGE");
        assert_eq!(err.status_code(), 422);

        let body = object(json!({ "field_type": "integer", "display_name": "Views" }));
        assert!(matches!(
            SchemaSynchronizer::check_metadata_update(SystemTable::Fields, &body),
            Err(EngineError::UnsupportedSchemaChange { .. })
        ));
    }

    #[test]
    fn test_metadata_update_ignores_other_tables() {
        let body = object(json!({ "email": "a@example.com" }));
        assert!(SchemaSynchronizer::check_metadata_update(SystemTable::Users, &body).is_ok());
    }

    #[test]
    fn test_collection_from_body() {
        let body = object(json!({
            "name": "posts",
            "fields": [
                { "name": "title", "field_type": "string", "required": true },
                { "name": "views", "field_type": "integer", "default_value": "0" }
            ]
        }));
        let def = collection_from_body(&body).unwrap();
        assert_eq!(def.name, "posts");
        assert_eq!(def.fields.len(), 2);
        assert_eq!(def.fields[1].default.as_deref(), Some("0"));

        let body = object(json!({ "name": "posts", "colour": "red" }));
        assert!(matches!(
            collection_from_body(&body),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn test_field_from_body() {
        let collection_id = Uuid::new_v4();
        let body = object(json!({
            "collection_id": collection_id.to_string(),
            "name": "summary",
            "field_type": "text"
        }));
        let (id, field) = field_from_body(&body).unwrap();
        assert_eq!(id, collection_id);
        assert_eq!(field.name, "summary");

        let body = object(json!({ "collection_id": "nope", "name": "x", "field_type": "text" }));
        assert!(matches!(
            field_from_body(&body),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn test_field_values_cover_catalog_columns() {
        let field = FieldDef::new("author", FieldType::Relation).references("authors");
        let values = field_values(Uuid::new_v4(), &field);
        let fields = SystemTable::Fields.descriptor();
        for (column, _) in &values {
            assert!(fields.has_column(column), "{column}");
        }
        assert_eq!(values.len(), fields.writable_columns().count());
    }
}

//! 스키마 카탈로그 조회
//!
//! 테이블 이름을 서술자로 해석합니다. 시스템 테이블은 내장 서술자를 쓰고,
//! 사용자 컬렉션은 테넌트의 `collections`/`fields` 행에서 만들어집니다.
//! 트랜잭션 안팎에서 모두 쓰이도록 커넥션을 인자로 받습니다.

use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use tbk_core::schema::{FieldDef, FieldType, SystemTable, TableDescriptor};
use tbk_sql::ddl::{COLUMN_EXISTS_SQL, TABLE_EXISTS_SQL};
use tbk_sql::ident::quote_qualified;

use crate::error::{EngineError, Result};
use crate::tenant::Tenant;

/// collections 행
#[derive(Debug, Clone, FromRow)]
pub struct CollectionRow {
    pub id: Uuid,
    pub name: String,
    pub is_system: bool,
}

/// fields 행
#[derive(Debug, Clone, FromRow)]
struct FieldRow {
    name: String,
    field_type: String,
    required: bool,
    is_unique: bool,
    default_value: Option<String>,
    sort_order: i32,
    relation_target: Option<String>,
    display_name: Option<String>,
    description: Option<String>,
}

impl From<FieldRow> for FieldDef {
    fn from(row: FieldRow) -> Self {
        FieldDef {
            name: row.name,
            field_type: FieldType::parse(&row.field_type),
            required: row.required,
            unique: row.is_unique,
            default: row.default_value,
            sort_order: row.sort_order,
            relation_target: row.relation_target,
            display_name: row.display_name,
            description: row.description,
        }
    }
}

const FIELD_COLUMNS: &str = "name, field_type, required, is_unique, default_value, sort_order, \
     relation_target, display_name, description";

/// 테이블 서술자 조회
///
/// 카탈로그에 없는 이름은 `CollectionNotFound`.
pub async fn describe(conn: &mut PgConnection, tenant: &Tenant, table: &str) -> Result<TableDescriptor> {
    if let Some(system) = SystemTable::from_name(table) {
        return Ok(system.descriptor());
    }

    let collection = find_collection(conn, tenant, table)
        .await?
        .ok_or_else(|| EngineError::CollectionNotFound {
            name: table.to_string(),
        })?;
    let fields = load_fields(conn, tenant, collection.id).await?;

    Ok(TableDescriptor::for_collection(&collection.name, collection.id, &fields))
}

/// 이름으로 컬렉션 조회
pub async fn find_collection(
    conn: &mut PgConnection,
    tenant: &Tenant,
    name: &str,
) -> Result<Option<CollectionRow>> {
    let sql = format!(
        "SELECT id, name, is_system FROM {} WHERE name = $1",
        quote_qualified(tenant.schema(), "collections")
    );
    sqlx::query_as(&sql)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(EngineError::from_db)
}

/// ID로 컬렉션 조회
pub async fn find_collection_by_id(
    conn: &mut PgConnection,
    tenant: &Tenant,
    id: Uuid,
) -> Result<Option<CollectionRow>> {
    let sql = format!(
        "SELECT id, name, is_system FROM {} WHERE id = $1",
        quote_qualified(tenant.schema(), "collections")
    );
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(EngineError::from_db)
}

/// 컬렉션의 필드 정의 (sort_order, 이름 순)
pub async fn load_fields(
    conn: &mut PgConnection,
    tenant: &Tenant,
    collection_id: Uuid,
) -> Result<Vec<FieldDef>> {
    let sql = format!(
        "SELECT {FIELD_COLUMNS} FROM {} WHERE collection_id = $1 ORDER BY sort_order, name",
        quote_qualified(tenant.schema(), "fields")
    );
    let rows: Vec<FieldRow> = sqlx::query_as(&sql)
        .bind(collection_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(EngineError::from_db)?;
    Ok(rows.into_iter().map(FieldDef::from).collect())
}

/// 컬렉션의 특정 필드 조회
pub async fn find_field(
    conn: &mut PgConnection,
    tenant: &Tenant,
    collection_id: Uuid,
    name: &str,
) -> Result<Option<(Uuid, FieldDef)>> {
    #[derive(FromRow)]
    struct Row {
        id: Uuid,
        #[sqlx(flatten)]
        field: FieldRow,
    }

    let sql = format!(
        "SELECT id, {FIELD_COLUMNS} FROM {} WHERE collection_id = $1 AND name = $2",
        quote_qualified(tenant.schema(), "fields")
    );
    let row: Option<Row> = sqlx::query_as(&sql)
        .bind(collection_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(EngineError::from_db)?;
    Ok(row.map(|r| (r.id, r.field.into())))
}

/// 물리 테이블 존재 여부
pub async fn table_exists(conn: &mut PgConnection, tenant: &Tenant, table: &str) -> Result<bool> {
    sqlx::query_scalar(TABLE_EXISTS_SQL)
        .bind(tenant.schema())
        .bind(table)
        .fetch_one(&mut *conn)
        .await
        .map_err(EngineError::from_db)
}

/// 물리 컬럼 존재 여부 (대소문자 구분)
pub async fn column_exists(
    conn: &mut PgConnection,
    tenant: &Tenant,
    table: &str,
    column: &str,
) -> Result<bool> {
    sqlx::query_scalar(COLUMN_EXISTS_SQL)
        .bind(tenant.schema())
        .bind(table)
        .bind(column)
        .fetch_one(&mut *conn)
        .await
        .map_err(EngineError::from_db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_row_conversion() {
        let row = FieldRow {
            name: "author".to_string(),
            field_type: "relation".to_string(),
            required: false,
            is_unique: false,
            default_value: None,
            sort_order: 3,
            relation_target: Some("authors".to_string()),
            display_name: Some("Author".to_string()),
            description: None,
        };
        let field = FieldDef::from(row);
        assert_eq!(field.field_type, FieldType::Relation);
        assert_eq!(field.relation_target.as_deref(), Some("authors"));
        assert_eq!(field.sort_order, 3);
    }

    #[test]
    fn test_unknown_type_falls_back() {
        let row = FieldRow {
            name: "legacy".to_string(),
            field_type: "geometry".to_string(),
            required: false,
            is_unique: false,
            default_value: None,
            sort_order: 0,
            relation_target: None,
            display_name: None,
            description: None,
        };
        let field = FieldDef::from(row);
        assert_eq!(field.field_type.physical_type(), "TEXT");
    }
}

//! DDL 생성기
//!
//! 컬렉션/필드 정의를 테넌트 스키마의 물리 테이블 DDL로 변환합니다.
//! 모든 사용자 테이블은 `id` 기본키와 감사 컬럼을 가집니다.

use sea_query::{
    Alias, ColumnDef, Expr, ForeignKey, ForeignKeyAction, ForeignKeyCreateStatement,
    PostgresQueryBuilder, Table, TableCreateStatement,
};
use sha2::{Digest, Sha256};

use tbk_core::schema::{CollectionDef, FieldDef, FieldType, MAX_IDENTIFIER_LEN};

use crate::ident::{quote_ident, quote_qualified, table_ref, DynIden};

/// 컬럼 존재 확인 (대소문자 구분, `$1`=스키마, `$2`=테이블, `$3`=컬럼)
pub const COLUMN_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 AND column_name = $3)";

/// 테이블 존재 확인 (`$1`=스키마, `$2`=테이블)
pub const TABLE_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
     WHERE table_schema = $1 AND table_name = $2)";

pub struct DdlGenerator;

impl DdlGenerator {
    /// 테넌트 스키마 생성
    pub fn create_schema(schema: &str) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
    }

    /// 컬렉션 테이블 생성
    ///
    /// `IF NOT EXISTS`를 붙이지 않으므로 이미 있는 테이블은 에러가 됩니다.
    pub fn create_table(schema: &str, collection: &CollectionDef) -> String {
        Self::create_table_statement(schema, collection).to_string(PostgresQueryBuilder)
    }

    fn create_table_statement(schema: &str, collection: &CollectionDef) -> TableCreateStatement {
        let mut stmt = Table::create();
        stmt.table(table_ref(schema, &collection.name));

        let mut id_col = ColumnDef::new(DynIden::new("id"));
        id_col
            .custom(Alias::new(FieldType::Uuid.physical_type()))
            .not_null()
            .primary_key();
        stmt.col(&mut id_col);

        let mut fields: Vec<&FieldDef> = collection.fields.iter().collect();
        fields.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));

        for field in fields {
            stmt.col(&mut Self::column_def(field));
            if let Some(mut fk) = Self::foreign_key(schema, &collection.name, field) {
                stmt.foreign_key(&mut fk);
            }
        }

        for mut col in Self::audit_columns() {
            stmt.col(&mut col);
        }

        stmt
    }

    fn audit_columns() -> [ColumnDef; 4] {
        let timestamp = |name: &str| {
            let mut col = ColumnDef::new(DynIden::new(name));
            col.custom(Alias::new(FieldType::Datetime.physical_type()))
                .not_null()
                .default(Expr::current_timestamp());
            col
        };
        let actor = |name: &str| {
            let mut col = ColumnDef::new(DynIden::new(name));
            col.custom(Alias::new(FieldType::Uuid.physical_type()));
            col
        };
        [
            timestamp("created_at"),
            timestamp("updated_at"),
            actor("created_by"),
            actor("updated_by"),
        ]
    }

    fn column_def(field: &FieldDef) -> ColumnDef {
        let mut col = ColumnDef::new(DynIden::new(field.name.as_str()));
        col.custom(Alias::new(field.field_type.physical_type()));

        if field.required {
            col.not_null();
        }
        if field.unique {
            col.unique_key();
        }
        if let Some(default) = &field.default {
            // 기본값은 호출자가 신뢰하는 SQL 표현식
            col.default(Expr::cust(default.as_str()));
        }
        col
    }

    fn foreign_key(schema: &str, table: &str, field: &FieldDef) -> Option<ForeignKeyCreateStatement> {
        if field.field_type != FieldType::Relation {
            return None;
        }
        let target = field.relation_target.as_deref()?;

        // NOT NULL 컬럼은 SET NULL이 불가능하므로 참조 중인 대상 행 삭제를 막음
        let on_delete = if field.required {
            ForeignKeyAction::Restrict
        } else {
            ForeignKeyAction::SetNull
        };

        let mut fk = ForeignKey::create();
        fk.name(Self::foreign_key_name(table, &field.name))
            .from(table_ref(schema, table), DynIden::new(field.name.as_str()))
            .to(table_ref(schema, target), DynIden::new("id"))
            .on_delete(on_delete);
        Some(fk)
    }

    /// 외래키 제약 이름 (`fk_<table>_<column>`, 63바이트 이내)
    ///
    /// 길면 잘라낸 뒤 컬럼 이름 해시 8자를 붙여 같은 테이블 안에서 겹치지 않게 합니다.
    fn foreign_key_name(table: &str, column: &str) -> String {
        let name = format!("fk_{table}_{column}");
        if name.len() <= MAX_IDENTIFIER_LEN {
            return name;
        }

        let digest = Sha256::digest(column.as_bytes());
        let suffix: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();

        let mut end = MAX_IDENTIFIER_LEN - suffix.len() - 1;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}_{suffix}", &name[..end])
    }

    /// 필드 추가 DDL
    ///
    /// `ADD COLUMN IF NOT EXISTS`로 동시 추가에도 안전하며, relation 필드면 외래키 제약이 뒤따릅니다.
    pub fn add_column(schema: &str, table: &str, field: &FieldDef) -> Vec<String> {
        let mut stmts = vec![Table::alter()
            .table(table_ref(schema, table))
            .add_column_if_not_exists(&mut Self::column_def(field))
            .to_string(PostgresQueryBuilder)];

        if let Some(fk) = Self::foreign_key(schema, table, field) {
            stmts.push(fk.to_string(PostgresQueryBuilder));
        }
        stmts
    }

    /// 필드 삭제 DDL
    pub fn drop_column(schema: &str, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN IF EXISTS {}",
            quote_qualified(schema, table),
            quote_ident(column)
        )
    }

    /// 컬렉션 테이블 삭제 DDL (이 테이블을 참조하는 외래키도 함께 제거)
    pub fn drop_table(schema: &str, table: &str) -> String {
        Table::drop()
            .table(table_ref(schema, table))
            .if_exists()
            .cascade()
            .to_string(PostgresQueryBuilder)
    }
}

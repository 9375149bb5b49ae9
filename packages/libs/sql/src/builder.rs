//! CRUD SQL 빌더
//!
//! 테이블 서술자, 유효 권한, 요청 파라미터를 받아 `(SQL, 바인딩 값)`을 생성합니다.
//! 테이블은 항상 테넌트 스키마로 한정되고, 식별자는 인용되며, 값은 바인딩됩니다.

use sea_query::{
    Alias, Asterisk, Cond, Condition, Expr, Func, OnConflict, Order, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr, Value, Values,
};
use uuid::Uuid;

use tbk_core::permissions::RowFilter;
use tbk_core::schema::TableDescriptor;

use crate::error::Result;
use crate::filter::{caller_condition, row_filter_condition};
use crate::ident::{table_ref, DynIden};
use crate::params::{ListParams, Page, SortOrder};

/// 생성된 SQL 문장과 바인딩 값
pub type Statement = (String, Values);

/// 기본 정렬 컬럼
const DEFAULT_SORT: &str = "created_at";

fn combine(parts: impl IntoIterator<Item = Option<Condition>>) -> Option<Condition> {
    let mut all = Cond::all();
    let mut count = 0;
    for part in parts.into_iter().flatten() {
        all = all.add(part);
        count += 1;
    }
    (count > 0).then_some(all)
}

fn id_condition(id: Uuid) -> Option<Condition> {
    Some(Cond::all().add(Expr::col(DynIden::new("id")).eq(id)))
}

fn idens(columns: &[&str]) -> Vec<DynIden> {
    columns.iter().map(|c| DynIden::new(*c)).collect()
}

/// SELECT 쿼리 빌더
pub struct SelectBuilder<'a> {
    schema: &'a str,
    table: &'a TableDescriptor,
}

impl<'a> SelectBuilder<'a> {
    /// 새 빌더 생성
    pub fn new(schema: &'a str, table: &'a TableDescriptor) -> Self {
        Self { schema, table }
    }

    fn base(&self) -> SelectStatement {
        let mut query = Query::select();
        query.from(table_ref(self.schema, &self.table.name));
        query
    }

    fn list_condition(
        &self,
        columns: &[&str],
        row_filter: &RowFilter,
        params: &ListParams,
    ) -> Result<Option<Condition>> {
        let conditions = params.conditions()?;
        Ok(combine([
            row_filter_condition(self.table, row_filter),
            caller_condition(self.table, columns, &conditions)?,
        ]))
    }

    /// 목록 조회
    ///
    /// # Arguments
    /// * `columns` - 보이는 컬럼 (SELECT 목록, 필터/정렬 허용 범위)
    /// * `row_filter` - 권한 행 필터
    /// * `params` - 호출자 필터/정렬
    /// * `page` - 확정된 페이지 범위
    pub fn list(
        &self,
        columns: &[&str],
        row_filter: &RowFilter,
        params: &ListParams,
        page: Page,
    ) -> Result<Statement> {
        let mut query = self.base();
        query.columns(idens(columns));

        if let Some(condition) = self.list_condition(columns, row_filter, params)? {
            query.cond_where(condition);
        }

        // 보이지 않는 컬럼으로는 정렬하지 않음
        let requested = params
            .sort
            .as_deref()
            .filter(|sort| columns.contains(sort) && self.table.has_column(sort));
        let (sort, order) = match requested {
            Some(sort) => (sort, params.order.unwrap_or(SortOrder::Asc)),
            None => (DEFAULT_SORT, params.order.unwrap_or(SortOrder::Desc)),
        };
        let order = match order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };
        query.order_by(DynIden::new(sort), order);
        if sort != "id" {
            query.order_by(DynIden::new("id"), Order::Asc);
        }

        query.limit(page.limit).offset(page.offset);
        Ok(query.build(PostgresQueryBuilder))
    }

    /// 목록 조건에 맞는 전체 행 수 (`total` 컬럼)
    pub fn count(
        &self,
        columns: &[&str],
        row_filter: &RowFilter,
        params: &ListParams,
    ) -> Result<Statement> {
        let mut query = self.base();
        query.expr_as(Func::count(Expr::col(Asterisk)), Alias::new("total"));

        if let Some(condition) = self.list_condition(columns, row_filter, params)? {
            query.cond_where(condition);
        }
        Ok(query.build(PostgresQueryBuilder))
    }

    /// 단건 조회
    pub fn get(&self, columns: &[&str], row_filter: &RowFilter, id: Uuid) -> Statement {
        let mut query = self.base();
        query.columns(idens(columns));

        if let Some(condition) =
            combine([id_condition(id), row_filter_condition(self.table, row_filter)])
        {
            query.cond_where(condition);
        }
        query.build(PostgresQueryBuilder)
    }
}

/// INSERT 쿼리 빌더
pub struct InsertBuilder<'a> {
    schema: &'a str,
    table: &'a TableDescriptor,
    conflict_target: Option<&'a [&'a str]>,
}

impl<'a> InsertBuilder<'a> {
    pub fn new(schema: &'a str, table: &'a TableDescriptor) -> Self {
        Self {
            schema,
            table,
            conflict_target: None,
        }
    }

    /// 유니크 키 충돌 시 아무것도 하지 않음 (RETURNING 결과 없음)
    pub fn on_conflict_do_nothing(mut self, columns: &'a [&'a str]) -> Self {
        self.conflict_target = Some(columns);
        self
    }

    /// SQL 생성
    ///
    /// `id`와 `created_by`/`updated_by`는 서버가 채우고, 시각 컬럼은 DB 기본값을 씁니다.
    pub fn build(
        &self,
        id: Uuid,
        values: &[(String, Value)],
        actor: Option<Uuid>,
        returning: &[&str],
    ) -> Result<Statement> {
        let mut columns = Vec::with_capacity(values.len() + 3);
        let mut exprs: Vec<SimpleExpr> = Vec::with_capacity(values.len() + 3);

        columns.push(DynIden::new("id"));
        exprs.push(id.into());

        for (column, value) in values {
            columns.push(DynIden::new(column.as_str()));
            exprs.push(value.clone().into());
        }

        for audit in ["created_by", "updated_by"] {
            columns.push(DynIden::new(audit));
            exprs.push(Value::from(actor).into());
        }

        let mut query = Query::insert();
        query
            .into_table(table_ref(self.schema, &self.table.name))
            .columns(columns);
        query.values(exprs)?;
        if let Some(target) = self.conflict_target {
            query.on_conflict(OnConflict::columns(idens(target)).do_nothing().to_owned());
        }
        query.returning(Query::returning().columns(idens(returning)));

        Ok(query.build(PostgresQueryBuilder))
    }
}

/// UPDATE 쿼리 빌더
pub struct UpdateBuilder<'a> {
    schema: &'a str,
    table: &'a TableDescriptor,
}

impl<'a> UpdateBuilder<'a> {
    pub fn new(schema: &'a str, table: &'a TableDescriptor) -> Self {
        Self { schema, table }
    }

    /// SQL 생성
    ///
    /// 권한 행 필터를 만족하는 `id` 행만 갱신됩니다. 결과 행이 없으면 호출자가 NotFound로 처리합니다.
    pub fn build(
        &self,
        id: Uuid,
        values: &[(String, Value)],
        actor: Option<Uuid>,
        row_filter: &RowFilter,
        returning: &[&str],
    ) -> Statement {
        let mut query = Query::update();
        query.table(table_ref(self.schema, &self.table.name));

        for (column, value) in values {
            query.value(DynIden::new(column.as_str()), value.clone());
        }
        query.value(DynIden::new("updated_at"), Expr::current_timestamp());
        query.value(DynIden::new("updated_by"), Value::from(actor));

        if let Some(condition) =
            combine([id_condition(id), row_filter_condition(self.table, row_filter)])
        {
            query.cond_where(condition);
        }
        query.returning(Query::returning().columns(idens(returning)));

        query.build(PostgresQueryBuilder)
    }
}

/// DELETE 쿼리 빌더
pub struct DeleteBuilder<'a> {
    schema: &'a str,
    table: &'a TableDescriptor,
}

impl<'a> DeleteBuilder<'a> {
    pub fn new(schema: &'a str, table: &'a TableDescriptor) -> Self {
        Self { schema, table }
    }

    /// SQL 생성 (`returning` 컬럼을 돌려받음)
    pub fn build(&self, id: Uuid, row_filter: &RowFilter, returning: &[&str]) -> Statement {
        let mut query = Query::delete();
        query.from_table(table_ref(self.schema, &self.table.name));

        if let Some(condition) =
            combine([id_condition(id), row_filter_condition(self.table, row_filter)])
        {
            query.cond_where(condition);
        }
        query.returning(Query::returning().columns(idens(returning)));

        query.build(PostgresQueryBuilder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tbk_core::schema::{FieldDef, FieldType};

    fn posts() -> TableDescriptor {
        TableDescriptor::for_collection(
            "posts",
            Uuid::new_v4(),
            &[
                FieldDef::new("title", FieldType::Text).required(),
                FieldDef::new("default", FieldType::Text),
                FieldDef::new("views", FieldType::Integer),
            ],
        )
    }

    fn status_filter(status: &str) -> RowFilter {
        RowFilter::AnyOf(vec![BTreeMap::from([(
            "title".to_string(),
            json!(status),
        )])])
    }

    #[test]
    fn test_select_list_defaults() {
        let table = posts();
        let builder = SelectBuilder::new("tenant_acme", &table);
        let (sql, values) = builder
            .list(
                &["id", "title"],
                &RowFilter::Unrestricted,
                &ListParams::default(),
                Page { limit: 25, offset: 0 },
            )
            .unwrap();

        assert!(sql.starts_with("SELECT \"id\", \"title\" FROM \"tenant_acme\".\"posts\""));
        assert!(sql.contains("ORDER BY \"created_at\" DESC, \"id\" ASC"));
        assert!(sql.contains("LIMIT $1 OFFSET $2"));
        assert!(!sql.contains("WHERE"));
        assert_eq!(values.0.len(), 2);
    }

    #[test]
    fn test_select_list_sort_and_filters() {
        let table = posts();
        let builder = SelectBuilder::new("tenant_acme", &table);
        let params = ListParams::from_json(&json!({
            "views": { "$gte": 10 },
            "default": "hidden",
            "sort": "views"
        }))
        .unwrap();

        let (sql, values) = builder
            .list(
                &["id", "title", "views"],
                &status_filter("open"),
                &params,
                Page { limit: 10, offset: 20 },
            )
            .unwrap();

        assert!(sql.contains("\"title\" = $1"));
        assert!(sql.contains("\"views\" >= $2"));
        // 보이지 않는 컬럼 필터는 무시
        assert!(!sql.contains("\"default\""));
        assert!(sql.contains("ORDER BY \"views\" ASC, \"id\" ASC"));
        assert_eq!(values.0.len(), 4);
        assert!(!sql.contains("open"));
    }

    #[test]
    fn test_sort_on_hidden_column_falls_back() {
        let table = posts();
        let params = ListParams {
            sort: Some("views".to_string()),
            ..Default::default()
        };
        let (sql, _) = SelectBuilder::new("tenant_acme", &table)
            .list(&["id", "title"], &RowFilter::Unrestricted, &params, Page { limit: 1, offset: 0 })
            .unwrap();
        assert!(sql.contains("ORDER BY \"created_at\" DESC"));
    }

    #[test]
    fn test_count_uses_same_conditions() {
        let table = posts();
        let params = ListParams::from_json(&json!({ "views": 3 })).unwrap();
        let (sql, values) = SelectBuilder::new("tenant_acme", &table)
            .count(&["id", "views"], &status_filter("open"), &params)
            .unwrap();

        assert!(sql.starts_with("SELECT COUNT(*) AS \"total\" FROM \"tenant_acme\".\"posts\""));
        assert!(!sql.contains("LIMIT"));
        assert_eq!(values.0.len(), 2);
    }

    #[test]
    fn test_get_by_id() {
        let table = posts();
        let id = Uuid::new_v4();
        let (sql, values) =
            SelectBuilder::new("tenant_acme", &table).get(&["id", "default"], &RowFilter::Unrestricted, id);

        assert!(sql.contains("SELECT \"id\", \"default\""));
        assert!(sql.contains("\"id\" = $1"));
        assert_eq!(values.0, vec![Value::from(id)]);
    }

    #[test]
    fn test_insert() {
        let table = posts();
        let id = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let (sql, values) = InsertBuilder::new("tenant_acme", &table)
            .build(
                id,
                &[("title".to_string(), Value::from("'; DROP TABLE x; --".to_string()))],
                Some(actor),
                &["id", "title", "created_at"],
            )
            .unwrap();

        assert!(sql.starts_with("INSERT INTO \"tenant_acme\".\"posts\""));
        assert!(sql.contains("(\"id\", \"title\", \"created_by\", \"updated_by\")"));
        assert!(sql.contains("RETURNING \"id\", \"title\", \"created_at\""));
        assert!(!sql.contains("DROP TABLE"));
        assert_eq!(values.0.len(), 4);
        assert_eq!(values.0[3], Value::from(actor));
    }

    #[test]
    fn test_insert_without_actor_binds_typed_null() {
        let table = posts();
        let (_, values) = InsertBuilder::new("tenant_acme", &table)
            .build(Uuid::new_v4(), &[], None, &["id"])
            .unwrap();
        assert_eq!(values.0[1], Value::Uuid(None));
    }

    #[test]
    fn test_insert_on_conflict_do_nothing() {
        let table = posts();
        let (sql, _) = InsertBuilder::new("tenant_acme", &table)
            .on_conflict_do_nothing(&["title"])
            .build(Uuid::new_v4(), &[], None, &["id"])
            .unwrap();
        assert!(sql.contains("ON CONFLICT (\"title\") DO NOTHING RETURNING \"id\""));
    }

    #[test]
    fn test_update_with_row_filter() {
        let table = posts();
        let id = Uuid::new_v4();
        let (sql, values) = UpdateBuilder::new("tenant_acme", &table).build(
            id,
            &[("views".to_string(), Value::from(5i32))],
            None,
            &status_filter("draft"),
            &["id", "views"],
        );

        assert!(sql.starts_with("UPDATE \"tenant_acme\".\"posts\" SET \"views\" = $1"));
        assert!(sql.contains("\"updated_at\" = CURRENT_TIMESTAMP"));
        assert!(sql.contains("\"id\" = $3"));
        assert!(sql.contains("\"title\" = $4"));
        assert!(sql.contains("RETURNING \"id\", \"views\""));
        assert_eq!(values.0.len(), 4);
    }

    #[test]
    fn test_delete() {
        let table = posts();
        let id = Uuid::new_v4();
        let (sql, values) =
            DeleteBuilder::new("tenant_acme", &table).build(id, &RowFilter::AnyOf(vec![]), &["id"]);

        assert!(sql.starts_with("DELETE FROM \"tenant_acme\".\"posts\""));
        assert!(sql.contains("FALSE"));
        assert!(sql.contains("RETURNING \"id\""));
        assert_eq!(values.0, vec![Value::from(id)]);
    }
}

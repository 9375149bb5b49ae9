//! 행 필터 → WHERE 조건
//!
//! 병합된 권한 행 필터와 호출자 필터를 SeaQuery `Condition`으로 변환합니다.
//! 값은 모두 바인딩 파라미터가 됩니다.

use sea_query::{Cond, Condition, Expr, SimpleExpr};
use serde_json::{Map, Value};

use tbk_core::permissions::RowFilter;
use tbk_core::schema::TableDescriptor;

use crate::error::Result;
use crate::ident::DynIden;
use crate::params::{FilterCondition, FilterOperator};
use crate::value::coerce;

/// 권한 행 필터 조건
///
/// `None`이면 제한 없음. 테이블에 없는 컬럼을 참조하거나 값 변환이 안 되는 조건 묶음은
/// 만족될 수 없으므로 버려지고, 남은 묶음이 없으면 `FALSE`가 됩니다.
pub fn row_filter_condition(table: &TableDescriptor, filter: &RowFilter) -> Option<Condition> {
    let RowFilter::AnyOf(terms) = filter else {
        return None;
    };

    let mut any = Cond::any();
    let mut satisfiable = 0;
    'terms: for term in terms {
        let mut all = Cond::all();
        for (column, value) in term {
            let Some(descriptor) = table.column(column) else {
                continue 'terms;
            };
            let col = Expr::col(DynIden::new(column.as_str()));
            let expr = match value {
                Value::Null => col.is_null(),
                _ => match coerce(descriptor, value) {
                    Ok(v) => col.eq(v),
                    Err(_) => continue 'terms,
                },
            };
            all = all.add(expr);
        }
        any = any.add(all);
        satisfiable += 1;
    }

    if satisfiable == 0 {
        return Some(Cond::all().add(never()));
    }
    Some(any)
}

/// 메모리상의 새 행이 권한 행 필터를 만족하는지 확인
///
/// 양쪽 값을 컬럼 타입으로 변환해 비교하므로 `"1"`과 `1`, `"1.50"`과 `1.5`는 같습니다.
/// SQL 조건과 같게, 테이블에 없는 컬럼이나 변환되지 않는 값을 가진 조건 묶음은 만족될 수 없습니다.
pub fn row_matches(table: &TableDescriptor, filter: &RowFilter, row: &Map<String, Value>) -> bool {
    let RowFilter::AnyOf(terms) = filter else {
        return true;
    };

    terms.iter().any(|term| {
        term.iter().all(|(column, expected)| {
            let Some(descriptor) = table.column(column) else {
                return false;
            };
            let actual = row.get(column).unwrap_or(&Value::Null);
            match (coerce(descriptor, expected), coerce(descriptor, actual)) {
                (Ok(expected), Ok(actual)) => expected == actual,
                _ => false,
            }
        })
    })
}

/// 만족될 수 없는 조건 묶음의 컬럼 목록 (로그용)
pub fn unknown_filter_columns<'a>(table: &TableDescriptor, filter: &'a RowFilter) -> Vec<&'a str> {
    match filter {
        RowFilter::Unrestricted => Vec::new(),
        RowFilter::AnyOf(terms) => terms
            .iter()
            .flat_map(|term| term.keys())
            .filter(|column| !table.has_column(column))
            .map(String::as_str)
            .collect(),
    }
}

/// 호출자 필터 조건
///
/// `visible`에 없는 컬럼의 조건은 조용히 무시됩니다.
pub fn caller_condition(
    table: &TableDescriptor,
    visible: &[&str],
    conditions: &[FilterCondition],
) -> Result<Option<Condition>> {
    let mut all = Cond::all();
    let mut count = 0;
    for condition in conditions {
        if !visible.contains(&condition.column.as_str()) {
            continue;
        }
        let Some(descriptor) = table.column(&condition.column) else {
            continue;
        };

        let col = Expr::col(DynIden::new(condition.column.as_str()));
        let value = &condition.value;
        let expr = match (condition.op, value.is_null()) {
            (FilterOperator::IsNull, _) | (FilterOperator::Eq, true) => col.is_null(),
            (FilterOperator::IsNotNull, _) | (FilterOperator::Ne, true) => col.is_not_null(),
            (FilterOperator::Eq, false) => col.eq(coerce(descriptor, value)?),
            (FilterOperator::Ne, false) => col.ne(coerce(descriptor, value)?),
            (FilterOperator::Gt, _) => col.gt(coerce(descriptor, value)?),
            (FilterOperator::Gte, _) => col.gte(coerce(descriptor, value)?),
            (FilterOperator::Lt, _) => col.lt(coerce(descriptor, value)?),
            (FilterOperator::Lte, _) => col.lte(coerce(descriptor, value)?),
        };
        all = all.add(expr);
        count += 1;
    }

    Ok((count > 0).then_some(all))
}

fn never() -> SimpleExpr {
    Expr::cust("FALSE")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{PostgresQueryBuilder, Query};
    use serde_json::json;
    use std::collections::BTreeMap;
    use tbk_core::schema::{FieldDef, FieldType};
    use uuid::Uuid;

    fn posts() -> TableDescriptor {
        TableDescriptor::for_collection(
            "posts",
            Uuid::new_v4(),
            &[
                FieldDef::new("status", FieldType::Text),
                FieldDef::new("views", FieldType::Integer),
            ],
        )
    }

    fn render(condition: Condition) -> (String, sea_query::Values) {
        Query::select()
            .column(DynIden::new("id"))
            .from(DynIden::new("posts"))
            .cond_where(condition)
            .build(PostgresQueryBuilder)
    }

    fn term(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_unrestricted_has_no_condition() {
        assert!(row_filter_condition(&posts(), &RowFilter::Unrestricted).is_none());
    }

    #[test]
    fn test_row_filter_is_parameterized() {
        let filter = RowFilter::AnyOf(vec![
            term(&[("status", json!("open"))]),
            term(&[("status", json!("draft")), ("views", json!(0))]),
        ]);
        let (sql, values) = render(row_filter_condition(&posts(), &filter).unwrap());

        assert!(sql.contains("\"status\" = $1"));
        assert!(sql.contains(" OR "));
        assert!(!sql.contains("open"));
        assert_eq!(values.0.len(), 3);
    }

    #[test]
    fn test_unknown_column_term_fails_closed() {
        let filter = RowFilter::AnyOf(vec![term(&[("owner", json!("x"))])]);
        let (sql, values) = render(row_filter_condition(&posts(), &filter).unwrap());
        assert!(sql.contains("FALSE"));
        assert!(values.0.is_empty());
        assert_eq!(unknown_filter_columns(&posts(), &filter), vec!["owner"]);

        let empty = RowFilter::AnyOf(vec![]);
        let (sql, _) = render(row_filter_condition(&posts(), &empty).unwrap());
        assert!(sql.contains("FALSE"));
    }

    #[test]
    fn test_caller_condition_ignores_invisible_columns() {
        let conditions = vec![
            FilterCondition {
                column: "views".to_string(),
                op: FilterOperator::Gt,
                value: json!("10"),
            },
            FilterCondition {
                column: "status".to_string(),
                op: FilterOperator::Eq,
                value: json!("open"),
            },
        ];
        let condition = caller_condition(&posts(), &["id", "views"], &conditions)
            .unwrap()
            .unwrap();
        let (sql, values) = render(condition);
        assert!(sql.contains("\"views\" > $1"));
        assert!(!sql.contains("status"));
        assert_eq!(values.0, vec![sea_query::Value::Int(Some(10))]);

        assert!(caller_condition(&posts(), &["id"], &conditions)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_caller_condition_rejects_malformed_values() {
        let conditions = vec![FilterCondition {
            column: "views".to_string(),
            op: FilterOperator::Lt,
            value: json!("many"),
        }];
        assert!(caller_condition(&posts(), &["views"], &conditions).is_err());
    }

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_row_matches_compares_coerced_values() {
        let table = TableDescriptor::for_collection(
            "tickets",
            Uuid::new_v4(),
            &[
                FieldDef::new("priority", FieldType::Integer),
                FieldDef::new("price", FieldType::Decimal),
                FieldDef::new("open", FieldType::Boolean),
            ],
        );

        let priority = RowFilter::AnyOf(vec![term(&[("priority", json!(1))])]);
        assert!(row_matches(&table, &priority, &row(json!({ "priority": "1" }))));
        assert!(row_matches(&table, &priority, &row(json!({ "priority": 1 }))));
        assert!(!row_matches(&table, &priority, &row(json!({ "priority": "2" }))));
        assert!(!row_matches(&table, &priority, &row(json!({}))));

        let price = RowFilter::AnyOf(vec![term(&[("price", json!(1.5))])]);
        assert!(row_matches(&table, &price, &row(json!({ "price": "1.50" }))));

        let open = RowFilter::AnyOf(vec![term(&[("open", json!(true))])]);
        assert!(row_matches(&table, &open, &row(json!({ "open": "true" }))));
        assert!(!row_matches(&table, &open, &row(json!({ "open": false }))));
    }

    #[test]
    fn test_row_matches_or_of_terms() {
        let filter = RowFilter::AnyOf(vec![
            term(&[("status", json!("draft"))]),
            term(&[("status", json!("review")), ("views", json!(0))]),
        ]);
        assert!(row_matches(&posts(), &filter, &row(json!({ "status": "draft" }))));
        assert!(row_matches(&posts(), &filter, &row(json!({ "status": "review", "views": "0" }))));
        assert!(!row_matches(&posts(), &filter, &row(json!({ "status": "review", "views": 3 }))));

        let unknown = RowFilter::AnyOf(vec![term(&[("owner", json!("x"))])]);
        assert!(!row_matches(&posts(), &unknown, &row(json!({ "owner": "x" }))));
        assert!(!row_matches(&posts(), &RowFilter::AnyOf(vec![]), &row(json!({}))));
        assert!(row_matches(&posts(), &RowFilter::Unrestricted, &row(json!({}))));
    }
}

//! 권한 병합
//!
//! 요청 주체의 role 목록, 테이블, 작업에 매칭되는 모든 규칙을 병합해
//! 유효 컬럼 목록과 행 필터를 계산합니다.
//!
//! - 매칭 규칙이 없으면 `Denied` (fail-closed)
//! - 컬럼: 모든 매칭 규칙의 `allowed_fields` 합집합 (하나라도 `*`이면 `*`)
//! - 행 필터: 규칙별 `field_filter`(AND)의 OR. 빈 필터가 하나라도 있으면 제한 없음

use std::collections::BTreeMap;

use serde_json::Value;

use crate::schema::TableDescriptor;

use super::policy::{Action, AllowedFields, PermissionRule};
use super::principal::Principal;

/// 요청 주체의 사용자 ID로 치환되는 필터 값
pub const AUTH_SUB: &str = "$auth.sub";

/// 병합된 행 필터
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    /// 제한 없음
    Unrestricted,

    /// 조건 묶음 중 하나라도 만족하면 보임. 비어 있으면 어떤 행도 보이지 않음
    AnyOf(Vec<BTreeMap<String, Value>>),
}

impl RowFilter {
    /// 제한 없음 여부
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, RowFilter::Unrestricted)
    }
}

/// 병합된 유효 권한
#[derive(Debug, Clone, PartialEq)]
pub struct EffectivePermission {
    /// 허용 컬럼
    pub columns: AllowedFields,

    /// 행 필터
    pub row_filter: RowFilter,

    /// 매칭된 규칙 수
    pub matched_rules: usize,
}

impl EffectivePermission {
    /// 테이블에서 실제로 보이는 컬럼 목록 (`id`는 항상 포함)
    ///
    /// 명시 목록에 있지만 테이블에 없는 컬럼은 조용히 제외됩니다.
    pub fn visible_columns<'a>(&self, table: &'a TableDescriptor) -> Vec<&'a str> {
        table
            .column_names()
            .filter(|name| *name == "id" || self.columns.permits(name))
            .collect()
    }

    /// 컬럼 쓰기 허용 여부 (컬럼 존재 여부는 별도로 확인)
    pub fn permits(&self, column: &str) -> bool {
        self.columns.permits(column)
    }
}

/// 권한 해석 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// 허용
    Granted(EffectivePermission),

    /// 거부 (매칭 규칙 없음)
    Denied { reason: String },
}

impl Resolution {
    /// 거부 여부
    pub fn is_denied(&self) -> bool {
        matches!(self, Resolution::Denied { .. })
    }

    /// 허용된 경우 유효 권한
    pub fn granted(&self) -> Option<&EffectivePermission> {
        match self {
            Resolution::Granted(permission) => Some(permission),
            Resolution::Denied { .. } => None,
        }
    }
}

/// 규칙 병합
///
/// `rules`는 저장소가 돌려준 후보 규칙이며, 여기서 role/table/action을 다시 확인합니다.
pub fn resolve(
    principal: &Principal,
    table: &str,
    action: Action,
    rules: &[PermissionRule],
) -> Resolution {
    let matching: Vec<&PermissionRule> = rules
        .iter()
        .filter(|rule| rule.table == table && rule.action == action)
        .filter(|rule| principal.has_role(&rule.role))
        .collect();

    let Some((first, rest)) = matching.split_first() else {
        return Resolution::Denied {
            reason: "no matching permission rule".to_string(),
        };
    };

    let mut columns = first.allowed_fields.clone();
    for rule in rest {
        columns.union(&rule.allowed_fields);
    }

    let row_filter = if matching.iter().any(|rule| rule.field_filter.is_empty()) {
        RowFilter::Unrestricted
    } else {
        RowFilter::AnyOf(
            matching
                .iter()
                .filter_map(|rule| bind_principal(&rule.field_filter.0, principal))
                .collect(),
        )
    };

    Resolution::Granted(EffectivePermission {
        columns,
        row_filter,
        matched_rules: matching.len(),
    })
}

/// `$auth.sub` 치환. 사용자 ID가 없으면 그 조건 묶음은 만족될 수 없으므로 `None`
fn bind_principal(
    term: &BTreeMap<String, Value>,
    principal: &Principal,
) -> Option<BTreeMap<String, Value>> {
    term.iter()
        .map(|(column, value)| match value {
            Value::String(s) if s == AUTH_SUB => principal
                .user_id
                .map(|id| (column.clone(), Value::String(id.to_string()))),
            _ => Some((column.clone(), value.clone())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType};
    use serde_json::json;
    use uuid::Uuid;

    fn editor() -> Principal {
        Principal::new("acme", ["editor"])
    }

    #[test]
    fn test_fail_closed_without_rules() {
        let result = resolve(&editor(), "posts", Action::Read, &[]);
        assert!(result.is_denied());
    }

    #[test]
    fn test_fail_closed_for_other_role_table_or_action() {
        let rules = vec![
            PermissionRule::new("admin", "posts", Action::Read),
            PermissionRule::new("editor", "comments", Action::Read),
            PermissionRule::new("editor", "posts", Action::Delete),
        ];
        assert!(resolve(&editor(), "posts", Action::Read, &rules).is_denied());
    }

    #[test]
    fn test_union_of_columns_and_empty_filter_dominates() {
        let rules = vec![
            PermissionRule::new("editor", "posts", Action::Read)
                .fields(["a", "b"])
                .filter("status", json!("open")),
            PermissionRule::new("editor", "posts", Action::Read).fields(["c"]),
        ];

        let result = resolve(&editor(), "posts", Action::Read, &rules);
        let permission = result.granted().unwrap();
        assert_eq!(
            permission.columns,
            AllowedFields::Only(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(permission.row_filter, RowFilter::Unrestricted);
        assert_eq!(permission.matched_rules, 2);
    }

    #[test]
    fn test_filters_combine_with_or_across_roles() {
        let principal = Principal::new("acme", ["editor", "reviewer"]);
        let rules = vec![
            PermissionRule::new("editor", "posts", Action::Read).filter("status", json!("draft")),
            PermissionRule::new("reviewer", "posts", Action::Read)
                .filter("status", json!("review"))
                .filter("lang", json!("en")),
        ];

        let result = resolve(&principal, "posts", Action::Read, &rules);
        let RowFilter::AnyOf(terms) = &result.granted().unwrap().row_filter else {
            panic!("expected restricted filter");
        };
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[1].len(), 2);
        assert_eq!(terms[1].get("lang"), Some(&json!("en")));
    }

    #[test]
    fn test_wildcard_exposes_later_fields() {
        let rules = vec![PermissionRule::new("editor", "posts", Action::Read).fields(["*"])];
        let result = resolve(&editor(), "posts", Action::Read, &rules);
        let permission = result.granted().unwrap();

        let before = TableDescriptor::for_collection(
            "posts",
            Uuid::new_v4(),
            &[FieldDef::new("title", FieldType::Text)],
        );
        assert!(!permission.visible_columns(&before).contains(&"summary"));

        let after = TableDescriptor::for_collection(
            "posts",
            Uuid::new_v4(),
            &[
                FieldDef::new("title", FieldType::Text),
                FieldDef::new("summary", FieldType::Text),
            ],
        );
        assert!(permission.visible_columns(&after).contains(&"summary"));
    }

    #[test]
    fn test_explicit_list_does_not_expose_later_fields() {
        let rules = vec![PermissionRule::new("editor", "posts", Action::Read).fields(["title"])];
        let result = resolve(&editor(), "posts", Action::Read, &rules);
        let table = TableDescriptor::for_collection(
            "posts",
            Uuid::new_v4(),
            &[
                FieldDef::new("title", FieldType::Text),
                FieldDef::new("summary", FieldType::Text),
            ],
        );
        assert_eq!(
            result.granted().unwrap().visible_columns(&table),
            vec!["id", "title"]
        );
    }

    #[test]
    fn test_auth_sub_placeholder() {
        let user = Uuid::new_v4();
        let rules = vec![
            PermissionRule::new("editor", "posts", Action::Update).filter("created_by", json!(AUTH_SUB)),
        ];

        let with_user = editor().with_user(user);
        let result = resolve(&with_user, "posts", Action::Update, &rules);
        let RowFilter::AnyOf(terms) = &result.granted().unwrap().row_filter else {
            panic!("expected restricted filter");
        };
        assert_eq!(terms[0].get("created_by"), Some(&json!(user.to_string())));

        // 사용자 ID가 없으면 어떤 행도 매칭되지 않음
        let result = resolve(&editor(), "posts", Action::Update, &rules);
        assert_eq!(
            result.granted().unwrap().row_filter,
            RowFilter::AnyOf(vec![])
        );
    }
}

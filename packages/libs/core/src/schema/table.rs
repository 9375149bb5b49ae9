//! 물리 테이블 서술자
//!
//! 요청 처리 시점에 카탈로그(또는 시스템 테이블 정의)로부터 만들어지는
//! "현재 이 테이블에 어떤 컬럼이 있는가"의 스냅샷입니다.
//! SQL 빌더와 권한 해석은 이 서술자만 보고 동작합니다.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::field::FieldDef;
use super::system::SystemTable;
use super::types::FieldType;

/// 컬럼 서술자
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// 물리 컬럼 이름
    pub name: String,

    /// 논리 타입
    pub field_type: FieldType,

    /// NOT NULL 여부
    pub required: bool,

    /// 유니크 제약
    pub unique: bool,

    /// DB 기본값 존재 여부
    pub has_default: bool,

    /// 서버 관리 컬럼 (id, 감사 컬럼) 여부
    pub managed: bool,
}

impl ColumnDescriptor {
    /// 사용자 컬럼 생성
    pub fn user(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required: false,
            unique: false,
            has_default: false,
            managed: false,
        }
    }

    /// 서버 관리 컬럼 생성
    fn managed(name: &str, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            required,
            unique: false,
            has_default: false,
            managed: true,
        }
    }

    pub(crate) fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub(crate) fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub(crate) fn defaulted(mut self) -> Self {
        self.has_default = true;
        self
    }
}

impl From<&FieldDef> for ColumnDescriptor {
    fn from(field: &FieldDef) -> Self {
        Self {
            name: field.name.clone(),
            field_type: field.field_type.clone(),
            required: field.required,
            unique: field.unique,
            has_default: field.default.is_some(),
            managed: false,
        }
    }
}

/// 물리 테이블 서술자
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// 물리 테이블 이름
    pub name: String,

    /// 시스템 테이블이면 그 종류
    pub system: Option<SystemTable>,

    /// 카탈로그 컬렉션 ID (사용자 컬렉션만)
    pub collection_id: Option<Uuid>,

    /// 컬럼 목록 (id, 사용자 컬럼, 감사 컬럼 순)
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// 감사 컬럼을 포함한 서술자 생성
    pub fn with_audit_columns(name: &str, user_columns: Vec<ColumnDescriptor>) -> Self {
        let mut columns = Vec::with_capacity(user_columns.len() + 5);
        columns.push(ColumnDescriptor::managed("id", FieldType::Uuid, true));
        columns.extend(user_columns);
        columns.push(ColumnDescriptor::managed("created_at", FieldType::Datetime, true));
        columns.push(ColumnDescriptor::managed("updated_at", FieldType::Datetime, true));
        columns.push(ColumnDescriptor::managed("created_by", FieldType::Uuid, false));
        columns.push(ColumnDescriptor::managed("updated_by", FieldType::Uuid, false));

        Self {
            name: name.to_string(),
            system: None,
            collection_id: None,
            columns,
        }
    }

    /// 카탈로그의 컬렉션/필드로부터 서술자 생성
    ///
    /// 필드는 `sort_order`, 이름 순으로 정렬됩니다.
    pub fn for_collection(name: &str, collection_id: Uuid, fields: &[FieldDef]) -> Self {
        let mut ordered: Vec<&FieldDef> = fields.iter().collect();
        ordered.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));

        let mut table = Self::with_audit_columns(
            name,
            ordered.into_iter().map(ColumnDescriptor::from).collect(),
        );
        table.collection_id = Some(collection_id);
        table
    }

    /// 컬럼 조회
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 컬럼 존재 여부
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// 모든 컬럼 이름
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// 호출자가 쓸 수 있는 컬럼 (서버 관리 컬럼 제외)
    pub fn writable_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| !c.managed)
    }

    /// create 시 반드시 값이 필요한 컬럼 중 `provided`에 없는 것
    pub fn missing_required<F>(&self, provided: F) -> Vec<&str>
    where
        F: Fn(&str) -> bool,
    {
        self.writable_columns()
            .filter(|c| c.required && !c.has_default && !provided(&c.name))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// 시스템 테이블 여부
    pub fn is_system(&self) -> bool {
        self.system.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_collection_orders_columns() {
        let mut body = FieldDef::new("body", FieldType::Text);
        body.sort_order = 2;
        let mut title = FieldDef::new("title", FieldType::Text).required();
        title.sort_order = 1;

        let table = TableDescriptor::for_collection("posts", Uuid::new_v4(), &[body, title]);
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(
            names,
            vec!["id", "title", "body", "created_at", "updated_at", "created_by", "updated_by"]
        );
        assert!(!table.is_system());
    }

    #[test]
    fn test_missing_required_skips_defaults_and_managed() {
        let fields = vec![
            FieldDef::new("title", FieldType::Text).required(),
            FieldDef::new("status", FieldType::Text)
                .required()
                .with_default("'draft'"),
            FieldDef::new("body", FieldType::Text),
        ];
        let table = TableDescriptor::for_collection("posts", Uuid::new_v4(), &fields);

        assert_eq!(table.missing_required(|_| false), vec!["title"]);
        assert!(table.missing_required(|name| name == "title").is_empty());
    }
}

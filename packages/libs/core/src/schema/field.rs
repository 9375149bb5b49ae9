//! 필드 정의
//!
//! 컬렉션의 논리 컬럼 메타데이터를 정의합니다.
//! JSON 키 이름은 `fields` 시스템 테이블의 컬럼 이름과 같습니다.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::ident::{validate_field_name, validate_identifier};
use super::types::FieldType;

/// 필드 정의
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    /// 필드 이름 (= 물리 컬럼 이름)
    pub name: String,

    /// 논리 타입
    pub field_type: FieldType,

    /// NOT NULL 여부
    #[serde(default)]
    pub required: bool,

    /// 유니크 제약
    #[serde(default, rename = "is_unique")]
    pub unique: bool,

    /// 기본값 (SQL 리터럴 또는 표현식, 호출자 신뢰)
    #[serde(default, rename = "default_value")]
    pub default: Option<String>,

    /// 정렬 순서
    #[serde(default)]
    pub sort_order: i32,

    /// 참조 대상 컬렉션 이름 (relation 타입 전용)
    #[serde(default)]
    pub relation_target: Option<String>,

    /// 표시 이름
    #[serde(default)]
    pub display_name: Option<String>,

    /// 설명
    #[serde(default)]
    pub description: Option<String>,
}

impl FieldDef {
    /// 새 필드 정의 생성
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            unique: false,
            default: None,
            sort_order: 0,
            relation_target: None,
            display_name: None,
            description: None,
        }
    }

    /// NOT NULL 설정
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// UNIQUE 설정
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// 기본값 설정
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// 참조 대상 설정
    pub fn references(mut self, target: impl Into<String>) -> Self {
        self.relation_target = Some(target.into());
        self
    }

    /// 정의 검증
    pub fn validate(&self) -> Result<()> {
        validate_field_name(&self.name)?;

        if let Some(default) = &self.default {
            if default.trim().is_empty() {
                return Err(Error::SchemaValidation {
                    message: format!("field '{}': default_value must not be blank", self.name),
                });
            }
        }

        match (&self.field_type, &self.relation_target) {
            (FieldType::Relation, Some(target)) => validate_identifier(target)?,
            (FieldType::Relation, None) => {}
            (_, Some(_)) => {
                return Err(Error::SchemaValidation {
                    message: format!(
                        "field '{}': relation_target is only valid for relation fields",
                        self.name
                    ),
                })
            }
            (_, None) => {}
        }

        Ok(())
    }

    /// 물리 스키마에 영향을 주는 속성이 같은지 비교
    ///
    /// 표시 이름/설명/정렬 순서는 물리 컬럼과 무관합니다.
    pub fn same_physical_shape(&self, other: &FieldDef) -> bool {
        self.name == other.name
            && self.field_type == other.field_type
            && self.required == other.required
            && self.unique == other.unique
            && self.default == other.default
            && self.relation_target == other.relation_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_json() {
        let json = r#"{ "name": "title", "field_type": "string", "required": true, "is_unique": true }"#;
        let field: FieldDef = serde_json::from_str(json).unwrap();
        assert_eq!(field.name, "title");
        assert_eq!(field.field_type, FieldType::Text);
        assert!(field.required);
        assert!(field.unique);
        assert!(field.validate().is_ok());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let json = r#"{ "name": "title", "field_type": "text", "color": "red" }"#;
        assert!(serde_json::from_str::<FieldDef>(json).is_err());
    }

    #[test]
    fn test_relation_target_only_on_relation() {
        let field = FieldDef::new("author", FieldType::Text).references("users");
        assert!(field.validate().is_err());

        let field = FieldDef::new("author", FieldType::Relation).references("authors");
        assert!(field.validate().is_ok());
    }

    #[test]
    fn test_reserved_name_rejected() {
        let field = FieldDef::new("created_at", FieldType::Datetime);
        assert!(matches!(field.validate(), Err(Error::ReservedColumn { .. })));
    }

    #[test]
    fn test_physical_shape_ignores_metadata() {
        let a = FieldDef::new("title", FieldType::Text).required();
        let mut b = a.clone();
        b.display_name = Some("Title".to_string());
        b.sort_order = 3;
        assert!(a.same_physical_shape(&b));

        let c = FieldDef::new("title", FieldType::Integer).required();
        assert!(!a.same_physical_shape(&c));
    }
}

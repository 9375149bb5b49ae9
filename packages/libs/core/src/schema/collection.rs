//! 컬렉션 정의

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::field::FieldDef;
use super::ident::validate_collection_name;

/// 컬렉션 정의
///
/// `collections` 테이블에 대한 create 요청 본문입니다. `fields`는 함께 생성할
/// 필드 목록이며, 비어 있어도 PK와 감사 컬럼만 가진 테이블이 생성됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionDef {
    /// 컬렉션 이름 (= 물리 테이블 이름)
    pub name: String,

    /// 표시 이름
    #[serde(default)]
    pub display_name: Option<String>,

    /// 설명
    #[serde(default)]
    pub description: Option<String>,

    /// 필드 목록
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl CollectionDef {
    /// 새 컬렉션 정의 생성
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            fields: Vec::new(),
        }
    }

    /// 필드 추가
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// 정의 검증 (이름, 필드, 필드 이름 중복)
    pub fn validate(&self) -> Result<()> {
        validate_collection_name(&self.name)?;

        let mut seen = HashSet::new();
        for field in &self.fields {
            field.validate()?;
            if !seen.insert(field.name.as_str()) {
                return Err(Error::DuplicateField {
                    name: field.name.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    #[test]
    fn test_empty_collection_is_valid() {
        assert!(CollectionDef::new("posts").validate().is_ok());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let def = CollectionDef::new("posts")
            .field(FieldDef::new("title", FieldType::Text))
            .field(FieldDef::new("title", FieldType::Integer));
        assert!(matches!(def.validate(), Err(Error::DuplicateField { .. })));
    }

    #[test]
    fn test_parse_collection_json() {
        let json = r#"{
            "name": "posts",
            "display_name": "Posts",
            "fields": [
                { "name": "title", "field_type": "text", "required": true },
                { "name": "views", "field_type": "integer", "default_value": "0" }
            ]
        }"#;
        let def: CollectionDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.fields.len(), 2);
        assert_eq!(def.fields[1].default.as_deref(), Some("0"));
        assert!(def.validate().is_ok());
    }
}

//! 시스템 컬렉션
//!
//! 사용자, 역할, 권한, 컬렉션, 필드 테이블은 테넌트 생성 시 미리 만들어지는
//! 물리 테이블입니다. 동기화기(Synchronizer)는 이 테이블들을 만들거나 삭제하지 않지만,
//! 일반 데이터와 같은 CRUD 경로와 권한 규칙으로 접근됩니다.

use serde::{Deserialize, Serialize};

use super::table::{ColumnDescriptor, TableDescriptor};
use super::types::FieldType;

/// 시스템 테이블 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemTable {
    Users,
    Roles,
    Permissions,
    Collections,
    Fields,
}

impl SystemTable {
    /// 모든 시스템 테이블 (생성 순서)
    pub const ALL: [SystemTable; 5] = [
        SystemTable::Users,
        SystemTable::Roles,
        SystemTable::Permissions,
        SystemTable::Collections,
        SystemTable::Fields,
    ];

    /// 테이블 이름에서 조회
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "users" => Some(SystemTable::Users),
            "roles" => Some(SystemTable::Roles),
            "permissions" => Some(SystemTable::Permissions),
            "collections" => Some(SystemTable::Collections),
            "fields" => Some(SystemTable::Fields),
            _ => None,
        }
    }

    /// 물리 테이블 이름
    pub fn table_name(&self) -> &'static str {
        match self {
            SystemTable::Users => "users",
            SystemTable::Roles => "roles",
            SystemTable::Permissions => "permissions",
            SystemTable::Collections => "collections",
            SystemTable::Fields => "fields",
        }
    }

    /// 테이블 서술자
    pub fn descriptor(&self) -> TableDescriptor {
        use FieldType::*;

        let columns = match self {
            SystemTable::Users => vec![
                ColumnDescriptor::user("email", Text).required().unique(),
                ColumnDescriptor::user("display_name", Text),
                ColumnDescriptor::user("is_active", Boolean).required().defaulted(),
            ],
            SystemTable::Roles => vec![
                ColumnDescriptor::user("name", Text).required().unique(),
                ColumnDescriptor::user("description", Text),
            ],
            SystemTable::Permissions => vec![
                ColumnDescriptor::user("role", Text).required(),
                ColumnDescriptor::user("table_name", Text).required(),
                ColumnDescriptor::user("action", Text).required(),
                ColumnDescriptor::user("field_filter", Json).required().defaulted(),
                ColumnDescriptor::user("allowed_fields", Json).required().defaulted(),
            ],
            SystemTable::Collections => vec![
                ColumnDescriptor::user("name", Text).required().unique(),
                ColumnDescriptor::user("display_name", Text),
                ColumnDescriptor::user("description", Text),
                ColumnDescriptor::user("is_system", Boolean).required().defaulted(),
            ],
            SystemTable::Fields => vec![
                ColumnDescriptor::user("collection_id", Uuid).required(),
                ColumnDescriptor::user("name", Text).required(),
                ColumnDescriptor::user("field_type", Text).required(),
                ColumnDescriptor::user("required", Boolean).required().defaulted(),
                ColumnDescriptor::user("is_unique", Boolean).required().defaulted(),
                ColumnDescriptor::user("default_value", Text),
                ColumnDescriptor::user("sort_order", Integer).required().defaulted(),
                ColumnDescriptor::user("relation_target", Text),
                ColumnDescriptor::user("display_name", Text),
                ColumnDescriptor::user("description", Text),
            ],
        };

        let mut table = TableDescriptor::with_audit_columns(self.table_name(), columns);
        table.system = Some(*self);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_round_trip() {
        for table in SystemTable::ALL {
            assert_eq!(SystemTable::from_name(table.table_name()), Some(table));
        }
        assert_eq!(SystemTable::from_name("posts"), None);
    }

    #[test]
    fn test_descriptor_has_audit_columns() {
        let table = SystemTable::Permissions.descriptor();
        assert!(table.is_system());
        assert!(table.column("id").unwrap().managed);
        assert!(table.column("created_by").unwrap().managed);
        assert!(!table.column("role").unwrap().managed);
        assert_eq!(
            table.column("allowed_fields").unwrap().field_type,
            FieldType::Json
        );
    }
}

//! 컬렉션/필드 스키마 모델
//!
//! # 개요
//!
//! Tablekit의 스키마는 런타임에 카탈로그(`collections`, `fields` 테이블)로 정의됩니다.
//! 이 모듈은 카탈로그 항목의 논리적 정의와, 요청 처리 시 사용하는
//! 물리 테이블 서술자(`TableDescriptor`)를 제공합니다.
//!
//! # 모듈 구조
//!
//! - `types`: 논리적 필드 타입과 물리 타입 매핑
//! - `ident`: 식별자 허용 목록 검증, 예약 감사(audit) 컬럼
//! - `field`: 필드 정의
//! - `collection`: 컬렉션 정의
//! - `table`: 물리 테이블 서술자
//! - `system`: 시스템 컬렉션 (users, roles, permissions, collections, fields)

mod collection;
mod field;
mod ident;
mod system;
mod table;
mod types;

pub use collection::CollectionDef;
pub use field::FieldDef;
pub use ident::{
    is_audit_column, validate_collection_name, validate_field_name, validate_identifier,
    AUDIT_COLUMNS, MAX_IDENTIFIER_LEN,
};
pub use system::SystemTable;
pub use table::{ColumnDescriptor, TableDescriptor};
pub use types::FieldType;

//! 권한 규칙 정의 및 병합
//!
//! # 개요
//!
//! 권한 규칙은 (role, table, action, field_filter, allowed_fields) 튜플입니다.
//! 같은 요청에 여러 규칙이 매칭되면 컬럼은 합집합, 행 필터는 OR로 병합합니다.
//! 규칙이 어디에 저장되는지(DB 테이블, YAML 문서 등)와 무관한 순수 로직입니다.
//!
//! # 모듈 구조
//!
//! - `policy`: 규칙 타입과 YAML 정책 문서
//! - `principal`: 요청 주체 (role 목록 + 테넌트)
//! - `resolver`: 규칙 병합 (`resolve`)

mod policy;
mod principal;
mod resolver;

pub use policy::{
    Action, AllowedFields, FieldFilter, OperationRules, PermissionPolicy, PermissionRule,
    PolicyEntry, TablePermissions,
};
pub use principal::Principal;
pub use resolver::{resolve, EffectivePermission, Resolution, RowFilter, AUTH_SUB};

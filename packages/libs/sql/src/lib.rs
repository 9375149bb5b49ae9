//! tbk-sql: 동적 SQL 생성 라이브러리
//!
//! 카탈로그 서술자(`TableDescriptor`)와 유효 권한을 기반으로 런타임에 SQL을 생성합니다.
//! SeaQuery를 사용하며, 식별자는 항상 인용하고 값은 항상 바인딩 파라미터로 전달합니다.
//!
//! # 모듈 구조
//!
//! - `ident`: 식별자 인용
//! - `value`: JSON 값 → 타입별 바인딩 값 변환
//! - `params`: list 요청 파라미터 파싱/검증
//! - `filter`: 행 필터 → WHERE 조건
//! - `builder`: CRUD SQL 빌더
//! - `ddl`: DDL(CREATE TABLE 등) 생성기

pub mod builder;
pub mod ddl;
pub mod error;
pub mod filter;
pub mod ident;
pub mod params;
pub mod value;

pub use builder::{DeleteBuilder, InsertBuilder, SelectBuilder, Statement, UpdateBuilder};
pub use ddl::DdlGenerator;
pub use error::{Result, SqlError};
pub use ident::{quote_ident, DynIden};
pub use params::{FilterCondition, FilterOperator, ListParams, Page, SortOrder};

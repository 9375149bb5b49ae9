//! tbk-core: Tablekit 공통 핵심 라이브러리
//!
//! 이 크레이트는 Engine과 SQL 생성기가 공유하는 핵심 타입과 순수 로직을 제공합니다.
//! I/O는 하지 않습니다.
//!
//! # 모듈 구조
//!
//! - `schema`: 컬렉션/필드 정의, 논리 타입 매핑, 식별자 검증
//! - `permissions`: 권한 규칙과 병합(resolve) 로직
//! - `error`: 공통 에러 타입

pub mod error;
pub mod permissions;
pub mod schema;

pub use error::{Error, Result};

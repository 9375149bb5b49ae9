//! 식별자 인용
//!
//! 카탈로그에서 온 테이블/컬럼 이름은 바인딩할 수 없으므로 SQL 텍스트에 들어가기 전에
//! 반드시 인용합니다. 값은 절대 이 경로로 들어오지 않습니다.

use sea_query::Iden;

/// 동적 테이블/컬럼 식별자
///
/// SeaQuery가 Postgres 규칙(`"..."`, 내부 `"`는 `""`)으로 인용합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynIden(pub String);

impl DynIden {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Iden for DynIden {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// 스키마 한정 테이블 참조 (`"schema"."table"`)
pub fn table_ref(schema: &str, table: &str) -> (DynIden, DynIden) {
    (DynIden::new(schema), DynIden::new(table))
}

/// 원시 SQL 텍스트용 식별자 인용
///
/// SeaQuery를 거치지 않는 문장(CREATE SCHEMA, 카탈로그 조회 등)에서 사용합니다.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// 스키마 한정 이름 인용
pub fn quote_qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

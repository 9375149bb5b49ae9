//! 요청 주체
//!
//! 외부 인증 계층이 확정한 role 목록과 테넌트를 담습니다. 코어는 이를 저장하지 않습니다.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 인증된 요청 주체
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Role 식별자 목록
    #[serde(default)]
    pub roles: Vec<String>,

    /// 테넌트 ID
    pub tenant_id: String,

    /// 사용자 ID (`created_by`/`updated_by`, `$auth.sub` 치환에 사용)
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

impl Principal {
    /// 새 주체 생성
    pub fn new<I, S>(tenant_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            tenant_id: tenant_id.into(),
            user_id: None,
        }
    }

    /// 사용자 ID 설정
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// 특정 role을 가지고 있는지 확인
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

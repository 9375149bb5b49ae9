//! 권한 해석기
//!
//! `Resolve(principal, table, action)`: 저장소에서 후보 규칙을 읽어 순수 병합 함수에 넘깁니다.
//! 규칙이 없으면 `Denied`를 값으로 돌려주고, 저장소 장애만 에러가 됩니다.

use std::sync::Arc;

use tbk_core::permissions::{self, Action, EffectivePermission, Principal, Resolution};

use crate::error::{EngineError, Result};
use crate::policy::PolicyStore;
use crate::tenant::Tenant;

#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn PolicyStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    /// 권한 해석
    pub async fn resolve(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        table: &str,
        action: Action,
    ) -> Result<Resolution> {
        let rules = self.store.rules_for(tenant, table, action).await?;
        let resolution = permissions::resolve(principal, table, action, &rules);

        match &resolution {
            Resolution::Granted(permission) => tracing::debug!(
                tenant = %tenant,
                table,
                action = %action,
                matched = permission.matched_rules,
                "permission granted"
            ),
            Resolution::Denied { reason } => tracing::debug!(
                tenant = %tenant,
                table,
                action = %action,
                reason = %reason,
                "permission denied"
            ),
        }
        Ok(resolution)
    }

    /// 권한 해석 후 `Denied`를 에러로 변환
    pub async fn authorize(
        &self,
        principal: &Principal,
        tenant: &Tenant,
        table: &str,
        action: Action,
    ) -> Result<EffectivePermission> {
        match self.resolve(principal, tenant, table, action).await? {
            Resolution::Granted(permission) => Ok(permission),
            Resolution::Denied { .. } => Err(EngineError::Denied {
                reason: format!("{action} on this table is not permitted"),
            }),
        }
    }

    /// 테넌트 규칙 캐시 무효화
    pub async fn invalidate(&self, tenant: &Tenant) {
        self.store.invalidate(tenant).await;
    }
}

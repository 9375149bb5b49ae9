//! 로깅 초기화

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 기본 로그 필터
pub const DEFAULT_FILTER: &str = "tbk_engine=debug,sqlx=warn";

/// `RUST_LOG` 기반 tracing 구독자 설치
///
/// 이미 설치되어 있으면 아무것도 하지 않습니다.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

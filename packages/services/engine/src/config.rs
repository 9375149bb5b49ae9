//! Engine 설정

use std::env;
use std::time::Duration;

use anyhow::Context;

/// Engine 설정
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Postgres 연결 URL
    pub database_url: String,

    /// 최대 커넥션 수
    pub max_connections: u32,

    /// 커넥션 획득 타임아웃 (초)
    pub acquire_timeout_secs: u64,

    /// list 기본 페이지 크기
    pub default_page_size: u64,

    /// list 최대 페이지 크기
    pub max_page_size: u64,

    /// 권한 규칙 캐시 TTL (초, 0이면 캐시 안 함)
    pub policy_cache_ttl_secs: u64,
}

impl EngineConfig {
    /// `.env` 파일을 읽은 뒤 환경변수에서 설정 로드
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// 환경변수에서 설정 로드
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            database_url: env::var("TBK_DATABASE_URL").context("TBK_DATABASE_URL must be set")?,

            max_connections: env::var("TBK_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("TBK_DB_MAX_CONNECTIONS must be a positive integer")?,

            acquire_timeout_secs: env::var("TBK_DB_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            default_page_size: env::var("TBK_DEFAULT_PAGE_SIZE")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .unwrap_or(25),

            max_page_size: env::var("TBK_MAX_PAGE_SIZE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),

            policy_cache_ttl_secs: env::var("TBK_POLICY_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),
        };
        config.validate()?;
        Ok(config)
    }

    /// 기본값으로 설정 생성
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            acquire_timeout_secs: 5,
            default_page_size: 25,
            max_page_size: 500,
            policy_cache_ttl_secs: 0,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.max_connections > 0, "TBK_DB_MAX_CONNECTIONS must be > 0");
        anyhow::ensure!(self.default_page_size > 0, "TBK_DEFAULT_PAGE_SIZE must be > 0");
        anyhow::ensure!(
            self.max_page_size >= self.default_page_size,
            "TBK_MAX_PAGE_SIZE must be >= TBK_DEFAULT_PAGE_SIZE"
        );
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// 권한 캐시 TTL (`None`이면 캐시 안 함)
    pub fn policy_cache_ttl(&self) -> Option<Duration> {
        (self.policy_cache_ttl_secs > 0).then(|| Duration::from_secs(self.policy_cache_ttl_secs))
    }
}

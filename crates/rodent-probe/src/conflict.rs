use std::sync::Arc;

use rodent_domain::ProbeType;
use tracing::warn;

use crate::pool_status::PoolStatus;

/// Checks whether starting a probe against a device would race a ZFS pool
/// operation. Pool-status lookup failures are logged and treated as "no
/// conflict": conflicts are an optimization, not a correctness gate.
pub struct ConflictChecker {
    pool_status: Arc<dyn PoolStatus>,
}

impl ConflictChecker {
    pub fn new(pool_status: Arc<dyn PoolStatus>) -> Self {
        Self { pool_status }
    }

    pub async fn check(&self, device_path: &str, _probe_type: ProbeType) -> Option<String> {
        let pool = match self.pool_status.get_pool_for_device(device_path).await {
            Ok(Some(p)) => p,
            Ok(None) => return None,
            Err(e) => {
                warn!(device_path, error = %e, "pool lookup failed, treating as no conflict");
                return None;
            }
        };

        match self.pool_status.is_pool_scrubbing(&pool).await {
            Ok(true) => return Some(format!("pool {pool} scrubbing")),
            Ok(false) => {}
            Err(e) => {
                warn!(pool, error = %e, "scrub-status lookup failed, treating as no conflict");
            }
        }

        match self.pool_status.is_pool_resilvering(&pool).await {
            Ok(true) => Some(format!("pool {pool} resilvering")),
            Ok(false) => None,
            Err(e) => {
                warn!(pool, error = %e, "resilver-status lookup failed, treating as no conflict");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed {
        pool: Option<&'static str>,
        scrubbing: bool,
        resilvering: bool,
    }

    #[async_trait]
    impl PoolStatus for Fixed {
        async fn is_pool_scrubbing(&self, _pool: &str) -> Result<bool, String> {
            Ok(self.scrubbing)
        }
        async fn is_pool_resilvering(&self, _pool: &str) -> Result<bool, String> {
            Ok(self.resilvering)
        }
        async fn get_pool_for_device(&self, _device_path: &str) -> Result<Option<String>, String> {
            Ok(self.pool.map(str::to_string))
        }
    }

    #[tokio::test]
    async fn unpooled_device_has_no_conflict() {
        let checker = ConflictChecker::new(Arc::new(Fixed { pool: None, scrubbing: true, resilvering: true }));
        assert_eq!(checker.check("/dev/sda", ProbeType::Quick).await, None);
    }

    #[tokio::test]
    async fn scrubbing_pool_is_a_conflict() {
        let checker = ConflictChecker::new(Arc::new(Fixed { pool: Some("tank"), scrubbing: true, resilvering: false }));
        assert_eq!(checker.check("/dev/sda", ProbeType::Quick).await, Some("pool tank scrubbing".to_string()));
    }

    #[tokio::test]
    async fn resilvering_pool_is_a_conflict() {
        let checker = ConflictChecker::new(Arc::new(Fixed { pool: Some("tank"), scrubbing: false, resilvering: true }));
        assert_eq!(checker.check("/dev/sda", ProbeType::Quick).await, Some("pool tank resilvering".to_string()));
    }

    #[tokio::test]
    async fn lookup_failure_is_treated_as_no_conflict() {
        struct Failing;
        #[async_trait]
        impl PoolStatus for Failing {
            async fn is_pool_scrubbing(&self, _pool: &str) -> Result<bool, String> {
                Err("unreachable".into())
            }
            async fn is_pool_resilvering(&self, _pool: &str) -> Result<bool, String> {
                Err("unreachable".into())
            }
            async fn get_pool_for_device(&self, _device_path: &str) -> Result<Option<String>, String> {
                Err("unreachable".into())
            }
        }
        let checker = ConflictChecker::new(Arc::new(Failing));
        assert_eq!(checker.check("/dev/sda", ProbeType::Quick).await, None);
    }
}

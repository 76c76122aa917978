use async_trait::async_trait;

/// Injected view onto the ZFS pool layer. Implementations live outside this
/// crate; lookup failures are the caller's job to treat as "no conflict"
/// per the Conflict Checker's fail-open policy.
#[async_trait]
pub trait PoolStatus: Send + Sync + 'static {
    async fn is_pool_scrubbing(&self, pool: &str) -> Result<bool, String>;
    async fn is_pool_resilvering(&self, pool: &str) -> Result<bool, String>;
    async fn get_pool_for_device(&self, device_path: &str) -> Result<Option<String>, String>;
}

/// A `PoolStatus` for hosts with no ZFS integration configured: every
/// device reports as unpooled, so the Conflict Checker always passes.
pub struct NoPools;

#[async_trait]
impl PoolStatus for NoPools {
    async fn is_pool_scrubbing(&self, _pool: &str) -> Result<bool, String> {
        Ok(false)
    }

    async fn is_pool_resilvering(&self, _pool: &str) -> Result<bool, String> {
        Ok(false)
    }

    async fn get_pool_for_device(&self, _device_path: &str) -> Result<Option<String>, String> {
        Ok(None)
    }
}

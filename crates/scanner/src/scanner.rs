use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use stratus_core::Resource;

use crate::error::ScanError;

/// Strongly-typed scanner trait with native `async fn`.
///
/// One instance exists per configured provider. Instances are stateless per
/// call; SDK clients are owned by the scanner and reused across calls, and
/// must be safe for concurrent use (or serialized internally).
///
/// This trait is **not** object-safe because it uses native `async fn`
/// methods. For dynamic dispatch use [`DynScanner`] -- every `Scanner`
/// automatically implements `DynScanner` via a blanket implementation.
pub trait Scanner: Send + Sync {
    /// The canonical provider tag this scanner enumerates (`"aws"`, ...).
    fn name(&self) -> &str;

    /// Verify credentials with a minimal API call.
    fn validate(&self) -> impl std::future::Future<Output = Result<(), ScanError>> + Send;

    /// Enumerate the provider's objects into canonical resources.
    ///
    /// Honors `ctx` at every suspension point. On a mid-scan failure,
    /// returns [`ScanError::Partial`] carrying what was enumerated so far.
    fn scan(
        &self,
        ctx: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Vec<Resource>, ScanError>> + Send;

    /// Best-effort direct fetch when the resource type is inferable from
    /// the id pattern.
    fn get_resource(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Resource, ScanError>> + Send;
}

/// Object-safe scanner trait for use behind `Arc<dyn DynScanner>`.
///
/// Uses [`macro@async_trait`] to enable dynamic dispatch of async methods.
/// You generally should not implement this trait directly -- instead
/// implement [`Scanner`] and rely on the blanket implementation.
#[async_trait]
pub trait DynScanner: Send + Sync {
    /// The canonical provider tag this scanner enumerates.
    fn name(&self) -> &str;

    /// Verify credentials with a minimal API call.
    async fn validate(&self) -> Result<(), ScanError>;

    /// Enumerate the provider's objects into canonical resources.
    async fn scan(&self, ctx: &CancellationToken) -> Result<Vec<Resource>, ScanError>;

    /// Best-effort direct fetch by id.
    async fn get_resource(&self, id: &str) -> Result<Resource, ScanError>;
}

/// Blanket implementation: any type that implements [`Scanner`] also
/// implements [`DynScanner`], bridging the static and dynamic dispatch
/// worlds.
#[async_trait]
impl<T: Scanner + Sync> DynScanner for T {
    fn name(&self) -> &str {
        Scanner::name(self)
    }

    async fn validate(&self) -> Result<(), ScanError> {
        Scanner::validate(self).await
    }

    async fn scan(&self, ctx: &CancellationToken) -> Result<Vec<Resource>, ScanError> {
        Scanner::scan(self, ctx).await
    }

    async fn get_resource(&self, id: &str) -> Result<Resource, ScanError> {
        Scanner::get_resource(self, id).await
    }
}

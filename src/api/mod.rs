//! Typed access to the proxy pattern service.

pub mod cache;
pub mod client;
pub mod error;
pub mod types;

use std::future::Future;

pub use cache::PatternQueryKey;
pub use client::PatternClient;
pub use error::{ApiError, ApiResult};
pub use types::{ProxyPattern, ProxyPatternCreate, ProxyPatternUpdate};

/// The five operations the pattern service exposes.
///
/// `PatternStore` is generic over this so it can run against the real HTTP
/// client or an in-memory service. Implementations must not retry; a failed
/// call is returned to the caller as-is.
pub trait PatternApi: Send + Sync + 'static {
  fn list(&self) -> impl Future<Output = ApiResult<Vec<ProxyPattern>>> + Send;

  fn create(
    &self,
    body: ProxyPatternCreate,
  ) -> impl Future<Output = ApiResult<ProxyPattern>> + Send;

  fn read(&self, id: i64) -> impl Future<Output = ApiResult<ProxyPattern>> + Send;

  fn update(
    &self,
    id: i64,
    body: ProxyPatternUpdate,
  ) -> impl Future<Output = ApiResult<ProxyPattern>> + Send;

  fn delete(&self, id: i64) -> impl Future<Output = ApiResult<()>> + Send;
}

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use venom_types::Result;

/// Receiver of "system became busy" alerts.
#[async_trait]
pub trait AlertCallback: Send + Sync {
    async fn on_alert(&self) -> Result<()>;
}

/// Adapter for a synchronous closure.
pub struct FnAlert<F>(pub F);

#[async_trait]
impl<F> AlertCallback for FnAlert<F>
where
    F: Fn() -> Result<()> + Send + Sync,
{
    async fn on_alert(&self) -> Result<()> {
        (self.0)()
    }
}

/// Adapter for a closure returning a future.
pub struct AsyncFnAlert<F>(pub F);

#[async_trait]
impl<F, Fut> AlertCallback for AsyncFnAlert<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn on_alert(&self) -> Result<()> {
        (self.0)().await
    }
}

pub fn alert_fn<F>(f: F) -> Arc<dyn AlertCallback>
where
    F: Fn() -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnAlert(f))
}

pub fn alert_async<F, Fut>(f: F) -> Arc<dyn AlertCallback>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(AsyncFnAlert(f))
}

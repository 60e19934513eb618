use async_trait::async_trait;

use crate::telemetry::TelemetryRecord;

/// Anything that can hand the dashboard a telemetry record.
///
/// Implementations must not fail and must return within a short bounded
/// time. When the underlying source is unavailable they report
/// [`TelemetryRecord::disconnected`] instead of an error, so callers can
/// treat every provider the same way.
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    async fn telemetry(&self) -> TelemetryRecord;
}

#[async_trait]
impl<P: TelemetryProvider + ?Sized> TelemetryProvider for std::sync::Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn telemetry(&self) -> TelemetryRecord {
        (**self).telemetry().await
    }
}

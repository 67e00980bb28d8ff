//! Pacing between rendered text fragments.
//!
//! The assembler waits a fixed interval before each text fragment so replies appear to be typed.
//! The wait goes through a [`Pacer`] so tests can substitute [`NoPacing`] or a paused clock.

use std::time::Duration;

/// Default delay before each text fragment is appended.
pub const PACING_INTERVAL: Duration = Duration::from_millis(20);

/// A source of cooperative delays.
///
/// `pause` must suspend only the caller's own task.
#[async_trait::async_trait]
pub trait Pacer: Send + Sync {
    /// Suspends the caller for roughly `interval`.
    async fn pause(&self, interval: Duration);
}

/// Pacer backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioPacer;

#[async_trait::async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, interval: Duration) {
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }
}

/// Pacer that never waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacing;

#[async_trait::async_trait]
impl Pacer for NoPacing {
    async fn pause(&self, _: Duration) {}
}

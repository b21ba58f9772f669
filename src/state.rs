use crate::config::TickerConfig;
use crate::market::types::FeedStatusSnapshot;
use crate::market::window::WindowAggregator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub type FeedStatusStore = Arc<RwLock<FeedStatusSnapshot>>;

pub struct FeedHandle {
    pub cancellation_token: CancellationToken,
    pub join_handle: JoinHandle<()>,
}

impl FeedHandle {
    /// Cancels the feed task and waits for it to release its connection.
    pub async fn stop(self) {
        self.cancellation_token.cancel();
        if let Err(error) = self.join_handle.await {
            warn!(%error, "feed task ended abnormally");
        }
    }
}

/// Counters written by the feed task and read by the status heartbeat.
#[derive(Debug, Default)]
pub struct FeedTelemetry {
    observations_received: AtomicU64,
    malformed_messages: AtomicU64,
}

impl FeedTelemetry {
    pub fn record_observation(&self) -> u64 {
        self.observations_received.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_malformed(&self) -> u64 {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn observations_received(&self) -> u64 {
        self.observations_received.load(Ordering::Relaxed)
    }

    pub fn malformed_messages(&self) -> u64 {
        self.malformed_messages.load(Ordering::Relaxed)
    }
}

/// Render-side state. Owned by the render loop alone, so the history needs no
/// lock.
#[derive(Debug)]
pub struct AppState {
    pub started_at: Instant,
    pub window: WindowAggregator,
    pub frames_rendered: u64,
    pub render_failures: u64,
}

impl AppState {
    pub fn new(config: &TickerConfig) -> Self {
        Self {
            started_at: Instant::now(),
            window: WindowAggregator::new(config.window, config.y_tick),
            frames_rendered: 0,
            render_failures: 0,
        }
    }
}

use crate::market::types::Observation;
use crate::state::FeedTelemetry;
use chrono::Utc;
use futures_util::{stream, Stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const MOCK_START_PRICE: f64 = 100_000.0;

/// Deterministic walk from the start price: odd steps add 0.6, even steps
/// give back 0.4.
pub fn mock_price(step: u64) -> f64 {
    let ups = step / 2 + step % 2;
    let downs = step / 2;
    MOCK_START_PRICE + ups as f64 * 0.6 - downs as f64 * 0.4
}

struct MockFeed {
    ticker: Interval,
    step: u64,
    telemetry: Arc<FeedTelemetry>,
    cancel: CancellationToken,
}

/// Synthetic stand-in for the network feed. Ends when `cancel` fires.
pub fn mock_stream(
    interval: Duration,
    telemetry: Arc<FeedTelemetry>,
    cancel: CancellationToken,
) -> impl Stream<Item = Observation> + Send + 'static {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let feed = MockFeed {
        ticker,
        step: 0,
        telemetry,
        cancel,
    };

    stream::unfold(feed, |mut feed| async move {
        tokio::select! {
            _ = feed.cancel.cancelled() => None,
            _ = feed.ticker.tick() => {
                feed.step = feed.step.saturating_add(1);
                let observation = Observation {
                    timestamp: Utc::now(),
                    price: mock_price(feed.step),
                };
                feed.telemetry.record_observation();
                Some((observation, feed))
            }
        }
    })
}

use crate::config::TickerConfig;
use crate::market::feed::FeedClient;
use crate::market::mock::mock_stream;
use crate::market::slot::LatestSlot;
use crate::market::types::{FeedConnectionState, FeedStatusSnapshot, Observation};
use crate::render::{RenderFrame, RenderSurface};
use crate::state::{AppState, FeedHandle, FeedStatusStore, FeedTelemetry};
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STATUS_HEARTBEAT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing new in the slot, so nothing was redrawn.
    Idle,
    Rendered { evicted: usize, points: usize },
    RenderFailed,
}

/// Fixed-cadence consumer. Sole owner of the history.
pub struct RenderLoop<S: RenderSurface> {
    symbol: String,
    slot: Arc<LatestSlot>,
    state: AppState,
    surface: S,
}

impl<S: RenderSurface> RenderLoop<S> {
    pub fn new(config: &TickerConfig, slot: Arc<LatestSlot>, surface: S) -> Self {
        Self {
            symbol: config.symbol.clone(),
            slot,
            state: AppState::new(config),
            surface,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn into_parts(self) -> (AppState, S) {
        (self.state, self.surface)
    }

    /// One render step: drain the slot, append, trim, push a frame.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let Some(observation) = self.slot.take() else {
            return TickOutcome::Idle;
        };
        self.state.window.append(observation);

        let before = self.state.window.len();
        let Some(range) = self.state.window.compute_display_range(now) else {
            return TickOutcome::Idle;
        };
        let evicted = before - self.state.window.len();

        let series = self.state.window.series();
        let points = series.len();
        let Some(frame) = RenderFrame::new(&self.symbol, series, range) else {
            return TickOutcome::Idle;
        };

        match self.surface.render(&frame) {
            Ok(()) => {
                self.state.frames_rendered = self.state.frames_rendered.saturating_add(1);
                TickOutcome::Rendered { evicted, points }
            }
            Err(error) => {
                self.state.render_failures = self.state.render_failures.saturating_add(1);
                warn!(
                    symbol = %self.symbol,
                    failures = self.state.render_failures,
                    %error,
                    "render surface failed"
                );
                TickOutcome::RenderFailed
            }
        }
    }

    /// Ticks every `refresh_interval` until `cancel` fires.
    pub async fn run(&mut self, refresh_interval: Duration, cancel: &CancellationToken) {
        let mut ticker = tokio::time::interval(refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let TickOutcome::Rendered { evicted, points } = self.tick(Utc::now()) {
                        debug!(points, evicted, "frame rendered");
                    }
                }
            }
        }
    }
}

fn observation_source(
    config: &TickerConfig,
    status_store: &FeedStatusStore,
    telemetry: &Arc<FeedTelemetry>,
    cancel: CancellationToken,
) -> BoxStream<'static, Observation> {
    if config.mock_mode {
        mock_stream(config.mock_interval, Arc::clone(telemetry), cancel).boxed()
    } else {
        let client = FeedClient::new(config, Arc::clone(status_store), Arc::clone(telemetry));
        info!(endpoint = client.endpoint(), "starting ticker feed");
        client.stream(cancel).boxed()
    }
}

/// Spawns the single writer of `slot`.
pub fn spawn_feed_task(
    config: &TickerConfig,
    slot: Arc<LatestSlot>,
    status_store: FeedStatusStore,
    telemetry: Arc<FeedTelemetry>,
    cancellation_token: CancellationToken,
) -> FeedHandle {
    let mock_mode = config.mock_mode;
    let symbol = config.symbol.clone();
    let observations = observation_source(
        config,
        &status_store,
        &telemetry,
        cancellation_token.clone(),
    );

    let join_handle = tokio::spawn(async move {
        if mock_mode {
            publish_status(
                &status_store,
                FeedConnectionState::Live,
                &symbol,
                Some("mock mode active".to_string()),
            )
            .await;
        }

        let mut observations = observations;
        while let Some(observation) = observations.next().await {
            slot.put(observation);
        }
    });

    FeedHandle {
        cancellation_token,
        join_handle,
    }
}

fn spawn_status_heartbeat(
    status_store: FeedStatusStore,
    telemetry: Arc<FeedTelemetry>,
    slot: Arc<LatestSlot>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATUS_HEARTBEAT);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let snapshot = status_store.read().await.clone();
                    info!(
                        symbol = %snapshot.symbol,
                        state = ?snapshot.state,
                        failures = snapshot.consecutive_failures,
                        backoff_ms = snapshot.backoff_ms,
                        observations = telemetry.observations_received(),
                        malformed = telemetry.malformed_messages(),
                        coalesced = slot.overwritten(),
                        reason = snapshot.reason.as_deref().unwrap_or(""),
                        "feed status"
                    );
                }
            }
        }
    })
}

async fn publish_status(
    status_store: &FeedStatusStore,
    state: FeedConnectionState,
    symbol: &str,
    reason: Option<String>,
) {
    let mut writable = status_store.write().await;
    *writable = FeedStatusSnapshot {
        state,
        symbol: symbol.to_string(),
        consecutive_failures: 0,
        backoff_ms: None,
        reason,
    };
}

pub fn new_status_store(symbol: &str) -> FeedStatusStore {
    Arc::new(RwLock::new(FeedStatusSnapshot {
        state: FeedConnectionState::Connecting,
        symbol: symbol.to_string(),
        consecutive_failures: 0,
        backoff_ms: None,
        reason: None,
    }))
}

/// Runs feed, heartbeat and render loop until `cancel` fires, then tears the
/// feed down and returns the render-side state.
pub async fn run_ticker_pipeline<S: RenderSurface>(
    config: &TickerConfig,
    surface: S,
    cancel: CancellationToken,
) -> AppState {
    let slot = Arc::new(LatestSlot::new());
    let status_store = new_status_store(&config.symbol);
    let telemetry = Arc::new(FeedTelemetry::default());

    let feed_handle = spawn_feed_task(
        config,
        Arc::clone(&slot),
        Arc::clone(&status_store),
        Arc::clone(&telemetry),
        cancel.child_token(),
    );
    let heartbeat_handle = spawn_status_heartbeat(
        Arc::clone(&status_store),
        Arc::clone(&telemetry),
        Arc::clone(&slot),
        cancel.child_token(),
    );

    let mut render_loop = RenderLoop::new(config, Arc::clone(&slot), surface);
    render_loop.run(config.refresh_interval, &cancel).await;

    feed_handle.stop().await;
    if let Err(error) = heartbeat_handle.await {
        warn!(%error, "status heartbeat ended abnormally");
    }
    publish_status(
        &status_store,
        FeedConnectionState::Stopped,
        &config.symbol,
        Some("pipeline stopped".to_string()),
    )
    .await;

    let (state, _surface) = render_loop.into_parts();
    info!(
        symbol = %config.symbol,
        frames = state.frames_rendered,
        render_failures = state.render_failures,
        observations = telemetry.observations_received(),
        coalesced = slot.overwritten(),
        uptime_secs = state.started_at.elapsed().as_secs(),
        "ticker pipeline stopped"
    );
    state
}

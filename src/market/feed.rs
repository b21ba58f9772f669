use crate::config::TickerConfig;
use crate::error::AppError;
use crate::market::backoff::Backoff;
use crate::market::binance::{connect_ticker_stream, ticker_endpoint, TickerWsStream};
use crate::market::types::{
    parse_ticker_payload, FeedConnectionState, FeedStatusSnapshot, Observation,
};
use crate::state::{FeedStatusStore, FeedTelemetry};
use chrono::Utc;
use futures_util::{stream, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Reconnecting ticker client for a single symbol.
#[derive(Debug, Clone)]
pub struct FeedClient {
    symbol: String,
    endpoint: String,
    keepalive_interval: Duration,
    keepalive_timeout: Duration,
    connect_timeout: Duration,
    reconnect_initial: Duration,
    reconnect_max: Duration,
    status_store: FeedStatusStore,
    telemetry: Arc<FeedTelemetry>,
}

impl FeedClient {
    pub fn new(
        config: &TickerConfig,
        status_store: FeedStatusStore,
        telemetry: Arc<FeedTelemetry>,
    ) -> Self {
        Self {
            symbol: config.symbol.clone(),
            endpoint: ticker_endpoint(&config.stream_base_url, &config.symbol),
            keepalive_interval: config.keepalive_interval,
            keepalive_timeout: config.keepalive_timeout,
            connect_timeout: config.connect_timeout,
            reconnect_initial: config.reconnect_initial,
            reconnect_max: config.reconnect_max,
            status_store,
            telemetry,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Opens a fresh connection lifecycle and yields observations until
    /// `cancel` fires. Connection failures are absorbed here: the stream backs
    /// off, reconnects and keeps going. It only ends on cancellation.
    pub fn stream(&self, cancel: CancellationToken) -> impl Stream<Item = Observation> + Send + 'static {
        let session = FeedSession {
            client: self.clone(),
            backoff: Backoff::new(self.reconnect_initial, self.reconnect_max),
            connection: None,
            failed: false,
            cancel,
        };

        stream::unfold(session, |mut session| async move {
            let observation = session.next_observation().await?;
            Some((observation, session))
        })
    }
}

enum ConnectionEvent {
    Observation(Observation),
    Malformed(AppError),
    Failed(String),
    Cancelled,
}

struct LiveConnection {
    ws: TickerWsStream,
    ping_ticker: Interval,
    awaiting_pong_since: Option<Instant>,
    keepalive_timeout: Duration,
}

impl LiveConnection {
    fn new(ws: TickerWsStream, keepalive_interval: Duration, keepalive_timeout: Duration) -> Self {
        let mut ping_ticker =
            tokio::time::interval_at(Instant::now() + keepalive_interval, keepalive_interval);
        ping_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            ws,
            ping_ticker,
            awaiting_pong_since: None,
            keepalive_timeout,
        }
    }

    async fn next_event(&mut self, cancel: &CancellationToken) -> ConnectionEvent {
        loop {
            let pong_deadline = self
                .awaiting_pong_since
                .map(|sent_at| sent_at + self.keepalive_timeout);

            tokio::select! {
                _ = cancel.cancelled() => return ConnectionEvent::Cancelled,
                _ = sleep_until_deadline(pong_deadline) => {
                    return ConnectionEvent::Failed("keepalive pong timed out".to_string());
                }
                _ = self.ping_ticker.tick() => {
                    if self.awaiting_pong_since.is_none() {
                        if let Err(error) = self.ws.send(Message::Ping(Vec::new())).await {
                            return ConnectionEvent::Failed(format!("keepalive ping failed: {error}"));
                        }
                        self.awaiting_pong_since = Some(Instant::now());
                    }
                }
                frame = self.ws.next() => {
                    let Some(frame_result) = frame else {
                        return ConnectionEvent::Failed("websocket stream ended".to_string());
                    };

                    match frame_result {
                        Ok(Message::Text(text_payload)) => {
                            let mut owned_payload = text_payload.into_bytes();
                            return decode_event(owned_payload.as_mut_slice());
                        }
                        Ok(Message::Binary(mut binary_payload)) => {
                            return decode_event(binary_payload.as_mut_slice());
                        }
                        Ok(Message::Pong(_)) => {
                            self.awaiting_pong_since = None;
                        }
                        Ok(Message::Close(frame)) => {
                            let reason = frame
                                .map(|close| format!("{} {}", close.code, close.reason))
                                .unwrap_or_else(|| "no close frame".to_string());
                            return ConnectionEvent::Failed(format!("connection closed by peer: {reason}"));
                        }
                        Ok(_) => {}
                        Err(error) => {
                            return ConnectionEvent::Failed(format!("websocket frame error: {error}"));
                        }
                    }
                }
            }
        }
    }

    async fn close(mut self) {
        match tokio::time::timeout(CLOSE_TIMEOUT, self.ws.close(None)).await {
            Ok(Ok(())) => debug!("websocket closed"),
            Ok(Err(error)) => debug!(%error, "websocket close failed"),
            Err(_) => debug!("websocket close timed out"),
        }
    }
}

fn decode_event(payload: &mut [u8]) -> ConnectionEvent {
    match parse_ticker_payload(payload, Utc::now()) {
        Ok(observation) => ConnectionEvent::Observation(observation),
        Err(error) => ConnectionEvent::Malformed(error),
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

struct FeedSession {
    client: FeedClient,
    backoff: Backoff,
    connection: Option<LiveConnection>,
    failed: bool,
    cancel: CancellationToken,
}

impl FeedSession {
    async fn next_observation(&mut self) -> Option<Observation> {
        loop {
            if self.cancel.is_cancelled() {
                self.shutdown().await;
                return None;
            }

            if self.connection.is_none() {
                if !self.open_connection().await {
                    self.shutdown().await;
                    return None;
                }
                continue;
            }
            let Some(connection) = self.connection.as_mut() else {
                continue;
            };

            match connection.next_event(&self.cancel).await {
                ConnectionEvent::Observation(observation) => {
                    self.client.telemetry.record_observation();
                    return Some(observation);
                }
                ConnectionEvent::Malformed(error) => {
                    let malformed = self.client.telemetry.record_malformed();
                    warn!(
                        symbol = %self.client.symbol,
                        malformed,
                        %error,
                        "skipping malformed ticker message"
                    );
                }
                ConnectionEvent::Failed(reason) => {
                    if let Some(connection) = self.connection.take() {
                        connection.close().await;
                    }
                    self.failed = true;
                    warn!(symbol = %self.client.symbol, %reason, "ticker connection lost");
                }
                ConnectionEvent::Cancelled => {
                    self.shutdown().await;
                    return None;
                }
            }
        }
    }

    /// Waits out the backoff if the previous attempt failed, then connects.
    /// Returns `false` when cancelled.
    async fn open_connection(&mut self) -> bool {
        if self.failed {
            let delay = self.backoff.next_delay();
            self.publish(
                FeedConnectionState::Reconnecting,
                Some(delay),
                Some(format!("reconnecting in {}ms", delay.as_millis())),
            )
            .await;

            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
            self.failed = false;
        } else {
            self.publish(
                FeedConnectionState::Connecting,
                None,
                Some("opening websocket stream".to_string()),
            )
            .await;
        }

        let connect = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            result = connect_ticker_stream(&self.client.endpoint, self.client.connect_timeout) => result,
        };

        match connect {
            Ok(ws) => {
                self.backoff.reset();
                self.connection = Some(LiveConnection::new(
                    ws,
                    self.client.keepalive_interval,
                    self.client.keepalive_timeout,
                ));
                info!(endpoint = %self.client.endpoint, "ticker websocket connected");
                self.publish(
                    FeedConnectionState::Live,
                    None,
                    Some("websocket connected".to_string()),
                )
                .await;
            }
            Err(error) => {
                self.failed = true;
                warn!(endpoint = %self.client.endpoint, %error, "ticker websocket connect failed");
            }
        }

        true
    }

    async fn shutdown(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close().await;
        }
        self.publish(
            FeedConnectionState::Stopped,
            None,
            Some("feed cancelled".to_string()),
        )
        .await;
    }

    async fn publish(
        &self,
        state: FeedConnectionState,
        backoff: Option<Duration>,
        reason: Option<String>,
    ) {
        let snapshot = FeedStatusSnapshot {
            state,
            symbol: self.client.symbol.clone(),
            consecutive_failures: self.backoff.consecutive_failures(),
            backoff_ms: backoff.map(|delay| delay.as_millis().min(u64::MAX as u128) as u64),
            reason,
        };

        debug!(
            state = ?snapshot.state,
            failures = snapshot.consecutive_failures,
            reason = snapshot.reason.as_deref().unwrap_or(""),
            "feed status"
        );

        let mut writable = self.client.status_store.write().await;
        *writable = snapshot;
    }
}

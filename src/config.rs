use crate::error::AppError;
use crate::market::backoff::{DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF};
use crate::market::binance::BINANCE_STREAM_BASE_URL;
use crate::market::types::DEFAULT_SYMBOL;
use crate::market::window::{DEFAULT_WINDOW_SECS, DEFAULT_Y_TICK};
use chrono::TimeDelta;
use clap::{Parser, ValueEnum};
use std::time::Duration;

pub const DEFAULT_REFRESH_SECS: f64 = 0.5;
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: f64 = 20.0;
pub const DEFAULT_KEEPALIVE_TIMEOUT_SECS: f64 = 20.0;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: f64 = 10.0;
pub const DEFAULT_MOCK_INTERVAL_MS: u64 = 100;
pub const MIN_WINDOW_SECS: u64 = 10;
pub const MAX_WINDOW_SECS: u64 = 604_800;
pub const MIN_REFRESH_SECS: f64 = 0.01;
pub const MAX_REFRESH_SECS: f64 = 60.0;
pub const MIN_KEEPALIVE_SECS: f64 = 1.0;
pub const MAX_KEEPALIVE_SECS: f64 = 600.0;
pub const MIN_CONNECT_TIMEOUT_SECS: f64 = 0.1;
pub const MAX_CONNECT_TIMEOUT_SECS: f64 = 120.0;
pub const MIN_MOCK_INTERVAL_MS: u64 = 1;
pub const MAX_MOCK_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One structured log line per rendered frame.
    #[default]
    Log,
    /// One JSON object per rendered frame on stdout.
    Json,
}

/// Start-up arguments. Every value may also come from the environment; unset
/// values fall back to the defaults applied in [`StartTickerArgs::normalize`].
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "ticker-window", version, about = "Follow a live ticker over a sliding window")]
pub struct StartTickerArgs {
    /// Symbol to follow, e.g. BTCUSDT
    #[arg(long, env = "TICKER_SYMBOL")]
    pub symbol: Option<String>,

    /// Base websocket URL; `/<symbol>@ticker` is appended
    #[arg(long, env = "TICKER_STREAM_URL")]
    pub stream_base_url: Option<String>,

    /// Trailing window shown on the x axis, in seconds
    #[arg(long, env = "TICKER_WINDOW_SECS")]
    pub window_secs: Option<u64>,

    /// Render cadence, in seconds
    #[arg(long, env = "TICKER_REFRESH_SECS")]
    pub refresh_secs: Option<f64>,

    /// Y-axis gridline spacing, in price units
    #[arg(long, env = "TICKER_Y_TICK")]
    pub y_tick: Option<f64>,

    #[arg(long, env = "TICKER_KEEPALIVE_INTERVAL_SECS")]
    pub keepalive_interval_secs: Option<f64>,

    #[arg(long, env = "TICKER_KEEPALIVE_TIMEOUT_SECS")]
    pub keepalive_timeout_secs: Option<f64>,

    /// Upper bound on TCP connect plus websocket handshake
    #[arg(long, env = "TICKER_CONNECT_TIMEOUT_SECS")]
    pub connect_timeout_secs: Option<f64>,

    /// First reconnect delay; doubles per consecutive failure
    #[arg(long, env = "TICKER_RECONNECT_INITIAL_SECS")]
    pub reconnect_initial_secs: Option<f64>,

    /// Upper bound on the reconnect delay
    #[arg(long, env = "TICKER_RECONNECT_MAX_SECS")]
    pub reconnect_max_secs: Option<f64>,

    /// Replace the network feed with a deterministic synthetic one
    #[arg(long, env = "TICKER_MOCK_MODE")]
    pub mock_mode: bool,

    #[arg(long, env = "TICKER_MOCK_INTERVAL_MS")]
    pub mock_interval_ms: Option<u64>,

    #[arg(long, value_enum, env = "TICKER_OUTPUT")]
    pub output: Option<OutputFormat>,

    /// Emit logs as JSON instead of the pretty format
    #[arg(long, env = "TICKER_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Clone)]
pub struct TickerConfig {
    pub symbol: String,
    pub stream_base_url: String,
    pub window: TimeDelta,
    pub refresh_interval: Duration,
    pub y_tick: f64,
    pub keepalive_interval: Duration,
    pub keepalive_timeout: Duration,
    pub connect_timeout: Duration,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub mock_mode: bool,
    pub mock_interval: Duration,
    pub output: OutputFormat,
    pub log_json: bool,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            stream_base_url: BINANCE_STREAM_BASE_URL.to_string(),
            window: TimeDelta::seconds(DEFAULT_WINDOW_SECS as i64),
            refresh_interval: Duration::from_secs_f64(DEFAULT_REFRESH_SECS),
            y_tick: DEFAULT_Y_TICK,
            keepalive_interval: Duration::from_secs_f64(DEFAULT_KEEPALIVE_INTERVAL_SECS),
            keepalive_timeout: Duration::from_secs_f64(DEFAULT_KEEPALIVE_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs_f64(DEFAULT_CONNECT_TIMEOUT_SECS),
            reconnect_initial: DEFAULT_INITIAL_BACKOFF,
            reconnect_max: DEFAULT_MAX_BACKOFF,
            mock_mode: false,
            mock_interval: Duration::from_millis(DEFAULT_MOCK_INTERVAL_MS),
            output: OutputFormat::Log,
            log_json: false,
        }
    }
}

fn seconds_in_range(name: &str, value: f64, min: f64, max: f64) -> Result<Duration, AppError> {
    if !value.is_finite() || !(min..=max).contains(&value) {
        return Err(AppError::InvalidArgument(format!(
            "{name} must be between {min} and {max} seconds"
        )));
    }
    Ok(Duration::from_secs_f64(value))
}

fn positive_seconds(name: &str, value: f64) -> Result<Duration, AppError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::InvalidArgument(format!(
            "{name} must be a finite positive number of seconds"
        )));
    }
    Ok(Duration::from_secs_f64(value))
}

impl StartTickerArgs {
    pub fn normalize(self) -> Result<TickerConfig, AppError> {
        let defaults = TickerConfig::default();

        let symbol = self
            .symbol
            .unwrap_or(defaults.symbol)
            .trim()
            .to_ascii_uppercase();
        if symbol.is_empty() || !symbol.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(AppError::InvalidArgument(
                "symbol must be non-empty alphanumeric ASCII".to_string(),
            ));
        }

        let stream_base_url = self
            .stream_base_url
            .map(|value| value.trim().to_string())
            .unwrap_or(defaults.stream_base_url);
        if !(stream_base_url.starts_with("ws://") || stream_base_url.starts_with("wss://")) {
            return Err(AppError::InvalidArgument(
                "streamBaseUrl must start with ws:// or wss://".to_string(),
            ));
        }

        let window_secs = self.window_secs.unwrap_or(DEFAULT_WINDOW_SECS);
        if !(MIN_WINDOW_SECS..=MAX_WINDOW_SECS).contains(&window_secs) {
            return Err(AppError::InvalidArgument(format!(
                "windowSecs must be between {MIN_WINDOW_SECS} and {MAX_WINDOW_SECS}"
            )));
        }

        let refresh_interval = seconds_in_range(
            "refreshSecs",
            self.refresh_secs.unwrap_or(DEFAULT_REFRESH_SECS),
            MIN_REFRESH_SECS,
            MAX_REFRESH_SECS,
        )?;

        let y_tick = self.y_tick.unwrap_or(DEFAULT_Y_TICK);
        if !y_tick.is_finite() || y_tick <= 0.0 {
            return Err(AppError::InvalidArgument(
                "yTick must be a finite positive number".to_string(),
            ));
        }

        let keepalive_interval = seconds_in_range(
            "keepaliveIntervalSecs",
            self.keepalive_interval_secs
                .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL_SECS),
            MIN_KEEPALIVE_SECS,
            MAX_KEEPALIVE_SECS,
        )?;
        let keepalive_timeout = seconds_in_range(
            "keepaliveTimeoutSecs",
            self.keepalive_timeout_secs
                .unwrap_or(DEFAULT_KEEPALIVE_TIMEOUT_SECS),
            MIN_KEEPALIVE_SECS,
            MAX_KEEPALIVE_SECS,
        )?;

        let connect_timeout = seconds_in_range(
            "connectTimeoutSecs",
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            MIN_CONNECT_TIMEOUT_SECS,
            MAX_CONNECT_TIMEOUT_SECS,
        )?;

        let reconnect_initial = match self.reconnect_initial_secs {
            Some(value) => positive_seconds("reconnectInitialSecs", value)?,
            None => defaults.reconnect_initial,
        };
        let reconnect_max = match self.reconnect_max_secs {
            Some(value) => positive_seconds("reconnectMaxSecs", value)?,
            None => defaults.reconnect_max,
        };
        if reconnect_initial > reconnect_max {
            return Err(AppError::InvalidArgument(
                "reconnectInitialSecs must not exceed reconnectMaxSecs".to_string(),
            ));
        }

        let mock_interval_ms = self.mock_interval_ms.unwrap_or(DEFAULT_MOCK_INTERVAL_MS);
        if !(MIN_MOCK_INTERVAL_MS..=MAX_MOCK_INTERVAL_MS).contains(&mock_interval_ms) {
            return Err(AppError::InvalidArgument(format!(
                "mockIntervalMs must be between {MIN_MOCK_INTERVAL_MS} and {MAX_MOCK_INTERVAL_MS}"
            )));
        }

        Ok(TickerConfig {
            symbol,
            stream_base_url,
            window: TimeDelta::seconds(window_secs as i64),
            refresh_interval,
            y_tick,
            keepalive_interval,
            keepalive_timeout,
            connect_timeout,
            reconnect_initial,
            reconnect_max,
            mock_mode: self.mock_mode,
            mock_interval: Duration::from_millis(mock_interval_ms),
            output: self.output.unwrap_or_default(),
            log_json: self.log_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_defaults() {
        let config = StartTickerArgs::default()
            .normalize()
            .expect("defaults should be valid");

        assert_eq!(config.symbol, DEFAULT_SYMBOL);
        assert_eq!(config.stream_base_url, BINANCE_STREAM_BASE_URL);
        assert_eq!(config.window, TimeDelta::seconds(1_200));
        assert_eq!(config.refresh_interval, Duration::from_millis(500));
        assert_eq!(config.y_tick, 250.0);
        assert_eq!(config.keepalive_interval, Duration::from_secs(20));
        assert_eq!(config.keepalive_timeout, Duration::from_secs(20));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect_initial, Duration::from_secs(1));
        assert_eq!(config.reconnect_max, Duration::from_secs(32));
        assert!(!config.mock_mode);
        assert_eq!(config.output, OutputFormat::Log);
    }

    #[test]
    fn uppercases_and_trims_symbol() {
        let config = StartTickerArgs {
            symbol: Some("  ethusdt ".to_string()),
            ..Default::default()
        }
        .normalize()
        .expect("symbol should normalize");

        assert_eq!(config.symbol, "ETHUSDT");
    }

    #[test]
    fn rejects_non_alphanumeric_symbol() {
        let result = StartTickerArgs {
            symbol: Some("BTC/USDT".to_string()),
            ..Default::default()
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_websocket_base_url() {
        let result = StartTickerArgs {
            stream_base_url: Some("https://stream.binance.com".to_string()),
            ..Default::default()
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn validates_window_range() {
        let result = StartTickerArgs {
            window_secs: Some(1),
            ..Default::default()
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn validates_refresh_interval_range() {
        for refresh in [0.0, f64::NAN, 120.0] {
            let result = StartTickerArgs {
                refresh_secs: Some(refresh),
                ..Default::default()
            }
            .normalize();
            assert!(result.is_err(), "refresh {refresh} should be rejected");
        }
    }

    #[test]
    fn validates_y_tick() {
        let result = StartTickerArgs {
            y_tick: Some(-250.0),
            ..Default::default()
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn validates_connect_timeout() {
        for timeout in [0.0, f64::INFINITY, 600.0] {
            let result = StartTickerArgs {
                connect_timeout_secs: Some(timeout),
                ..Default::default()
            }
            .normalize();
            assert!(result.is_err(), "connect timeout {timeout} should be rejected");
        }

        let config = StartTickerArgs {
            connect_timeout_secs: Some(2.5),
            ..Default::default()
        }
        .normalize()
        .expect("connect timeout should normalize");
        assert_eq!(config.connect_timeout, Duration::from_millis(2_500));
    }

    #[test]
    fn rejects_initial_backoff_above_cap() {
        let result = StartTickerArgs {
            reconnect_initial_secs: Some(64.0),
            reconnect_max_secs: Some(32.0),
            ..Default::default()
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn parses_flags() {
        let args = StartTickerArgs::try_parse_from([
            "ticker-window",
            "--symbol",
            "solusdt",
            "--window-secs",
            "60",
            "--refresh-secs",
            "0.25",
            "--output",
            "json",
            "--mock-mode",
        ])
        .expect("flags should parse");
        let config = args.normalize().expect("flags should normalize");

        assert_eq!(config.symbol, "SOLUSDT");
        assert_eq!(config.window, TimeDelta::seconds(60));
        assert_eq!(config.refresh_interval, Duration::from_millis(250));
        assert_eq!(config.output, OutputFormat::Json);
        assert!(config.mock_mode);
    }
}

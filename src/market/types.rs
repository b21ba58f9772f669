use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYMBOL: &str = "BTCUSDT";

/// One price sample, stamped with local receipt time. Wire input reaches it
/// only through [`Observation::new`], which rejects non-finite and
/// non-positive prices.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Result<Self, AppError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(AppError::MalformedPayload(format!(
                "price must be finite and positive, got {price}"
            )));
        }

        Ok(Self { timestamp, price })
    }
}

/// Ticker frame as delivered by the provider. Only the last price is read.
#[derive(Debug, Deserialize)]
pub struct TickerWire {
    #[serde(rename = "c")]
    pub last_price: String,
}

impl TickerWire {
    pub fn into_observation(self, received_at: DateTime<Utc>) -> Result<Observation, AppError> {
        let price = self.last_price.trim().parse::<f64>()?;
        Observation::new(received_at, price)
    }
}

pub fn parse_ticker_payload(
    payload: &mut [u8],
    received_at: DateTime<Utc>,
) -> Result<Observation, AppError> {
    let wire: TickerWire = simd_json::serde::from_slice(payload)?;
    wire.into_observation(received_at)
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRange {
    pub x_start: DateTime<Utc>,
    pub x_end: DateTime<Utc>,
    pub y_min: f64,
    pub y_max: f64,
}

/// Marker for the most recent point plus its price label.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAnnotation {
    pub point: Observation,
    pub label: String,
}

impl EndpointAnnotation {
    pub fn for_point(point: Observation) -> Self {
        Self {
            label: format_price_label(point.price),
            point,
        }
    }
}

/// Formats a price as `$114,250.00`.
pub fn format_price_label(price: f64) -> String {
    let fixed = format!("{:.2}", price.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if price < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{fraction}")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedConnectionState {
    Connecting,
    Live,
    Reconnecting,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatusSnapshot {
    pub state: FeedConnectionState,
    pub symbol: String,
    pub consecutive_failures: u32,
    /// Delay being waited out before the next connect, while reconnecting.
    pub backoff_ms: Option<u64>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn received_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_last_price_and_ignores_other_fields() {
        let mut payload = br#"{"e":"24hrTicker","E":1714564800000,"s":"BTCUSDT","p":"-120.5","c":"64250.10","o":"64370.60","v":"1234.5"}"#.to_vec();
        let observation =
            parse_ticker_payload(&mut payload, received_at()).expect("ticker payload should parse");

        assert_eq!(observation.price, 64250.10);
        assert_eq!(observation.timestamp, received_at());
    }

    #[test]
    fn rejects_payload_without_last_price() {
        let mut payload = br#"{"e":"24hrTicker","s":"BTCUSDT"}"#.to_vec();
        assert!(parse_ticker_payload(&mut payload, received_at()).is_err());
    }

    #[test]
    fn rejects_unparseable_price() {
        let mut payload = br#"{"c":"broken"}"#.to_vec();
        let result = parse_ticker_payload(&mut payload, received_at());
        assert!(matches!(result, Err(AppError::ParseFloat(_))));
    }

    #[test]
    fn rejects_non_positive_price() {
        let mut payload = br#"{"c":"0.0"}"#.to_vec();
        let result = parse_ticker_payload(&mut payload, received_at());
        assert!(matches!(result, Err(AppError::MalformedPayload(_))));
    }

    #[test]
    fn rejects_non_json_frames() {
        let mut payload = b"pong".to_vec();
        assert!(parse_ticker_payload(&mut payload, received_at()).is_err());
    }

    #[test]
    fn formats_price_labels_with_grouping() {
        assert_eq!(format_price_label(114_250.0), "$114,250.00");
        assert_eq!(format_price_label(1_234_567.891), "$1,234,567.89");
        assert_eq!(format_price_label(999.5), "$999.50");
        assert_eq!(format_price_label(0.07), "$0.07");
    }

    #[test]
    fn endpoint_annotation_labels_latest_point() {
        let point = Observation::new(received_at(), 64_000.256).unwrap();
        let annotation = EndpointAnnotation::for_point(point);
        assert_eq!(annotation.label, "$64,000.26");
        assert_eq!(annotation.point, point);
    }
}

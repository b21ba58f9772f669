use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use ticker_window::config::TickerConfig;
use ticker_window::market::pipeline::run_ticker_pipeline;
use ticker_window::render::JsonLinesSurface;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrameLine {
    symbol: String,
    series: Vec<PointLine>,
    range: RangeLine,
    endpoint: EndpointLine,
}

#[derive(Debug, Deserialize)]
struct PointLine {
    timestamp: DateTime<Utc>,
    price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeLine {
    y_min: f64,
    y_max: f64,
}

#[derive(Debug, Deserialize)]
struct EndpointLine {
    point: PointLine,
    label: String,
}

#[tokio::test]
async fn mock_feed_streams_json_frames_until_cancelled() {
    let config = TickerConfig {
        mock_mode: true,
        mock_interval: Duration::from_millis(5),
        refresh_interval: Duration::from_millis(25),
        ..TickerConfig::default()
    };
    let buffer = SharedBuffer::default();
    let surface = JsonLinesSurface::new(buffer.clone());
    let cancel = CancellationToken::new();

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        stopper.cancel();
    });

    let state = tokio::time::timeout(
        Duration::from_secs(5),
        run_ticker_pipeline(&config, surface, cancel),
    )
    .await
    .expect("pipeline should stop after cancellation");

    let output = buffer.0.lock().clone();
    let text = String::from_utf8(output).unwrap();
    let mut frames = Vec::new();
    for line in text.lines() {
        let mut bytes = line.as_bytes().to_vec();
        let frame: FrameLine = simd_json::serde::from_slice(&mut bytes).unwrap();
        frames.push(frame);
    }

    assert!(!frames.is_empty());
    assert_eq!(frames.len() as u64, state.frames_rendered);
    assert_eq!(state.render_failures, 0);

    for (index, frame) in frames.iter().enumerate() {
        assert_eq!(frame.symbol, "BTCUSDT");
        assert_eq!(frame.series.len(), index + 1);

        let latest = frame.series.last().unwrap();
        assert_eq!(frame.endpoint.point.price, latest.price);
        assert!(frame.endpoint.label.starts_with("$100,0"));

        for observation in &frame.series {
            assert!(observation.price - frame.range.y_min >= 250.0);
            assert!(frame.range.y_max - observation.price >= 250.0);
        }
        assert_eq!(frame.range.y_min % 250.0, 0.0);
        assert_eq!(frame.range.y_max % 250.0, 0.0);
    }

    for pair in frames.windows(2) {
        let previous = pair[0].series.last().unwrap().timestamp;
        let current = pair[1].series.last().unwrap().timestamp;
        assert!(current >= previous);
    }
}

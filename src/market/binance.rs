use crate::error::AppError;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};

pub const BINANCE_STREAM_BASE_URL: &str = "wss://stream.binance.com:9443/ws";

pub type TickerWsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub fn ticker_endpoint(base_url: &str, symbol: &str) -> String {
    format!(
        "{}/{}@ticker",
        base_url.trim_end_matches('/'),
        symbol.to_ascii_lowercase()
    )
}

/// TCP connect plus upgrade handshake, bounded by `connect_timeout`.
pub async fn connect_ticker_stream(
    endpoint: &str,
    connect_timeout: Duration,
) -> Result<TickerWsStream, AppError> {
    let ws_config = WebSocketConfig {
        max_message_size: Some(1 << 20),
        max_frame_size: Some(1 << 20),
        ..Default::default()
    };

    let handshake = connect_async_with_config(endpoint, Some(ws_config), true);
    let (stream, _) = tokio::time::timeout(connect_timeout, handshake)
        .await
        .map_err(|_| AppError::ConnectTimeout(connect_timeout.as_millis() as u64))??;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_endpoint_uses_lowercase_symbol() {
        let endpoint = ticker_endpoint(BINANCE_STREAM_BASE_URL, "BTCUSDT");
        assert_eq!(endpoint, "wss://stream.binance.com:9443/ws/btcusdt@ticker");
    }

    #[test]
    fn ticker_endpoint_tolerates_trailing_slash() {
        let endpoint = ticker_endpoint("ws://127.0.0.1:9001/ws/", "EthUsdt");
        assert_eq!(endpoint, "ws://127.0.0.1:9001/ws/ethusdt@ticker");
    }

    #[tokio::test]
    async fn connect_fails_fast_when_nothing_listens() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let address = listener.local_addr().expect("local addr should resolve");
        drop(listener);

        let endpoint = ticker_endpoint(&format!("ws://{address}/ws"), "BTCUSDT");
        let result = connect_ticker_stream(&endpoint, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(AppError::WebSocket(_))));
    }

    #[tokio::test]
    async fn connect_gives_up_on_silent_peer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind should succeed");
        let address = listener.local_addr().expect("local addr should resolve");
        let silent_peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept should succeed");
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let endpoint = ticker_endpoint(&format!("ws://{address}/ws"), "BTCUSDT");
        let result = connect_ticker_stream(&endpoint, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(AppError::ConnectTimeout(100))));

        silent_peer.abort();
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket connect timed out after {0}ms")]
    ConnectTimeout(u64),
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("ticker decode error: {0}")]
    SimdJson(#[from] simd_json::Error),
    #[error("price parse error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),
    #[error("malformed ticker payload: {0}")]
    MalformedPayload(String),
    #[error("render surface error: {0}")]
    Render(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(value))
    }
}

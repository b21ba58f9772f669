pub mod backoff;
pub mod binance;
pub mod feed;
pub mod mock;
pub mod pipeline;
pub mod slot;
pub mod types;
pub mod window;

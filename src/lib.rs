//! Client gateway for Binance spot: signed REST execution plus managed
//! websocket streaming sessions.

pub mod config;
pub mod errors;
pub mod rest;
pub mod stream;

pub use config::BinanceConfig;
pub use errors::BinanceError;
pub use rest::{BinanceHttpClient, Method};
pub use stream::{
    handler_fn, BinanceStreamClient, StreamHandler, StreamId, StreamRegistry, UserStreamHandler,
};

//! REST side of the gateway: the request executor, signing helpers, and the
//! typed endpoint surface built on top of them.

pub mod client;
pub mod endpoints;
pub mod models;
pub mod sign;

pub use client::BinanceHttpClient;
pub use reqwest::Method;

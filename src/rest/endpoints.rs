use super::client::BinanceHttpClient;
use super::models::{
    AccountInformation, CanceledOrder, Empty, ListenKey, NewOrder, OpenOrder, OrderAck, OrderBook,
    PriceTicker, ServerTime,
};
use crate::errors::BinanceError;
use reqwest::Method;

/// Typed convenience wrappers over [`BinanceHttpClient::execute`]. Each one
/// assembles a raw parameter string and delegates; nothing here bypasses the
/// executor's signing or classification.
impl BinanceHttpClient {
    /// Test connectivity
    pub async fn ping(&self) -> Result<(), BinanceError> {
        self.execute::<Empty>(Method::GET, "/api/v3/ping", false, "")
            .await?;
        Ok(())
    }

    /// Get the venue's clock
    pub async fn server_time(&self) -> Result<ServerTime, BinanceError> {
        self.execute(Method::GET, "/api/v3/time", false, "").await
    }

    /// Latest price for a symbol
    pub async fn price_ticker(&self, symbol: &str) -> Result<PriceTicker, BinanceError> {
        let params = format!("symbol={}", symbol.to_uppercase());
        self.execute(Method::GET, "/api/v3/ticker/price", false, &params)
            .await
    }

    /// Order book snapshot; `limit` falls back to the venue default
    pub async fn order_book(
        &self,
        symbol: &str,
        limit: Option<u16>,
    ) -> Result<OrderBook, BinanceError> {
        let mut params = format!("symbol={}", symbol.to_uppercase());
        if let Some(limit) = limit {
            params.push_str(&format!("&limit={}", limit));
        }
        self.execute(Method::GET, "/api/v3/depth", false, &params)
            .await
    }

    /// Get account information (signed)
    pub async fn account(&self) -> Result<AccountInformation, BinanceError> {
        self.execute(Method::GET, "/api/v3/account", true, "").await
    }

    /// Place an order (signed)
    pub async fn place_order(&self, order: &NewOrder) -> Result<OrderAck, BinanceError> {
        self.execute(Method::POST, "/api/v3/order", true, &order.to_params())
            .await
    }

    /// Cancel an order by venue order id (signed)
    pub async fn cancel_order(
        &self,
        symbol: &str,
        order_id: i64,
    ) -> Result<CanceledOrder, BinanceError> {
        let params = format!("symbol={}&orderId={}", symbol.to_uppercase(), order_id);
        self.execute(Method::DELETE, "/api/v3/order", true, &params)
            .await
    }

    /// All open orders on a symbol (signed)
    pub async fn open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, BinanceError> {
        let params = format!("symbol={}", symbol.to_uppercase());
        self.execute(Method::GET, "/api/v3/openOrders", true, &params)
            .await
    }

    /// Obtain a listen key for the user-data stream. The key is passed as
    /// the raw stream parameter when opening the multiplexed session and
    /// must be kept alive with [`Self::keepalive_user_stream`].
    pub async fn start_user_stream(&self) -> Result<ListenKey, BinanceError> {
        self.execute(Method::POST, "/api/v3/userDataStream", false, "")
            .await
    }

    /// Extend a listen key's validity
    pub async fn keepalive_user_stream(&self, listen_key: &str) -> Result<(), BinanceError> {
        let params = format!("listenKey={}", listen_key);
        self.execute::<Empty>(Method::PUT, "/api/v3/userDataStream", false, &params)
            .await?;
        Ok(())
    }

    /// Invalidate a listen key
    pub async fn close_user_stream(&self, listen_key: &str) -> Result<(), BinanceError> {
        let params = format!("listenKey={}", listen_key);
        self.execute::<Empty>(Method::DELETE, "/api/v3/userDataStream", false, &params)
            .await?;
        Ok(())
    }
}

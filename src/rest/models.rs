use rust_decimal::Decimal;
use serde::Deserialize;

/// Response to endpoints whose success body is an empty JSON object
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ServerTime {
    #[serde(rename = "serverTime")]
    pub server_time: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceTicker {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
}

/// Order book snapshot as the venue sends it: `[price, qty]` string pairs
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBook {
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    pub bids: Vec<[String; 2]>,
    pub asks: Vec<[String; 2]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Balance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountInformation {
    #[serde(rename = "makerCommission")]
    pub maker_commission: i64,
    #[serde(rename = "takerCommission")]
    pub taker_commission: i64,
    #[serde(rename = "buyerCommission")]
    pub buyer_commission: i64,
    #[serde(rename = "sellerCommission")]
    pub seller_commission: i64,
    #[serde(rename = "canTrade")]
    pub can_trade: bool,
    #[serde(rename = "canWithdraw")]
    pub can_withdraw: bool,
    #[serde(rename = "canDeposit")]
    pub can_deposit: bool,
    #[serde(rename = "updateTime")]
    pub update_time: u64,
    pub balances: Vec<Balance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderAck {
    pub symbol: String,
    #[serde(rename = "orderId")]
    pub order_id: i64,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    #[serde(rename = "transactTime")]
    pub transact_time: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanceledOrder {
    pub symbol: String,
    #[serde(rename = "origClientOrderId")]
    pub orig_client_order_id: String,
    #[serde(rename = "orderId")]
    pub order_id: i64,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenOrder {
    pub symbol: String,
    #[serde(rename = "orderId")]
    pub order_id: i64,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(rename = "origQty", with = "rust_decimal::serde::str")]
    pub orig_qty: Decimal,
    #[serde(rename = "executedQty", with = "rust_decimal::serde::str")]
    pub executed_qty: Decimal,
    pub status: String,
    #[serde(rename = "timeInForce")]
    pub time_in_force: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub side: String,
    pub time: u64,
}

/// Key identifying a user-data stream; passed as the raw stream parameter
/// when opening the multiplexed session
#[derive(Debug, Clone, Deserialize)]
pub struct ListenKey {
    #[serde(rename = "listenKey")]
    pub listen_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
}

impl TimeInForce {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gtc => "GTC",
            Self::Ioc => "IOC",
            Self::Fok => "FOK",
        }
    }
}

/// Order submission parameters.
///
/// Renders itself into the raw parameter string the executor sends, so the
/// request core still only ever sees opaque `key=value` text.
#[derive(Debug, Clone)]
pub struct NewOrder {
    symbol: String,
    side: OrderSide,
    order_type: &'static str,
    quantity: Decimal,
    price: Option<Decimal>,
    time_in_force: Option<TimeInForce>,
    client_order_id: Option<String>,
}

impl NewOrder {
    /// Limit order; time in force defaults to GTC
    #[must_use]
    pub fn limit(symbol: &str, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            side,
            order_type: "LIMIT",
            quantity,
            price: Some(price),
            time_in_force: Some(TimeInForce::Gtc),
            client_order_id: None,
        }
    }

    /// Market order
    #[must_use]
    pub fn market(symbol: &str, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            side,
            order_type: "MARKET",
            quantity,
            price: None,
            time_in_force: None,
            client_order_id: None,
        }
    }

    #[must_use]
    pub const fn time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = Some(tif);
        self
    }

    #[must_use]
    pub fn client_order_id(mut self, id: &str) -> Self {
        self.client_order_id = Some(id.to_string());
        self
    }

    pub(crate) fn to_params(&self) -> String {
        let mut params = format!(
            "symbol={}&side={}&type={}&quantity={}",
            self.symbol,
            self.side.as_str(),
            self.order_type,
            self.quantity
        );
        if let Some(price) = self.price {
            params.push_str(&format!("&price={}", price));
        }
        if let Some(tif) = self.time_in_force {
            params.push_str(&format!("&timeInForce={}", tif.as_str()));
        }
        if let Some(id) = &self.client_order_id {
            params.push_str(&format!("&newClientOrderId={}", id));
        }
        params
    }
}

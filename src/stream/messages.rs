use rust_decimal::Decimal;
use serde::Deserialize;

/// Account state snapshot pushed on the user-data stream
/// (`e == "outboundAccountInfo"`)
#[derive(Debug, Clone, Deserialize)]
pub struct AccountUpdate {
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "m")]
    pub maker_commission: i64,
    #[serde(rename = "t")]
    pub taker_commission: i64,
    #[serde(rename = "b")]
    pub buyer_commission: i64,
    #[serde(rename = "s")]
    pub seller_commission: i64,
    #[serde(rename = "T")]
    pub can_trade: bool,
    #[serde(rename = "W")]
    pub can_withdraw: bool,
    #[serde(rename = "D")]
    pub can_deposit: bool,
    #[serde(rename = "u", default)]
    pub last_update_time: u64,
    #[serde(rename = "B")]
    pub balances: Vec<AssetBalance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetBalance {
    #[serde(rename = "a")]
    pub asset: String,
    #[serde(rename = "f", with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(rename = "l", with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

/// Order lifecycle event pushed on the user-data stream
/// (`e == "executionReport"`); covers both order updates and fills
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionReport {
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub client_order_id: String,
    #[serde(rename = "S")]
    pub side: String,
    #[serde(rename = "o")]
    pub order_type: String,
    #[serde(rename = "f")]
    pub time_in_force: String,
    #[serde(rename = "q", with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(rename = "p", with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(rename = "x")]
    pub execution_type: String,
    #[serde(rename = "X")]
    pub order_status: String,
    #[serde(rename = "r")]
    pub reject_reason: String,
    #[serde(rename = "i")]
    pub order_id: i64,
    #[serde(rename = "l", with = "rust_decimal::serde::str")]
    pub last_executed_qty: Decimal,
    #[serde(rename = "L", with = "rust_decimal::serde::str")]
    pub last_executed_price: Decimal,
    #[serde(rename = "z", with = "rust_decimal::serde::str")]
    pub cumulative_filled_qty: Decimal,
    #[serde(rename = "n", with = "rust_decimal::serde::str")]
    pub commission: Decimal,
    #[serde(rename = "N")]
    pub commission_asset: Option<String>,
    #[serde(rename = "T")]
    pub transaction_time: u64,
    #[serde(rename = "t")]
    pub trade_id: i64,
}

impl ExecutionReport {
    /// Secondary discriminator: whether this report describes a fill.
    /// The venue sends `x` in varying case, so the comparison ignores it.
    #[must_use]
    pub fn is_trade(&self) -> bool {
        self.execution_type.eq_ignore_ascii_case("trade")
    }
}

/// The three outcomes of user-data routing, selected by the `e`
/// discriminator (and `x` for the trade/order split)
#[derive(Debug, Clone)]
pub enum UserStreamEvent {
    Account(AccountUpdate),
    Trade(ExecutionReport),
    Order(ExecutionReport),
}

/// Canonical depth update produced by the depth normalizer; the wire shape
/// (single-letter keys, `[price, qty]` string arrays) never reaches callers
#[derive(Debug, Clone)]
pub struct DepthUpdate {
    pub event_time: u64,
    pub symbol: String,
    pub first_update_id: u64,
    pub final_update_id: u64,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthLevel {
    pub price: Decimal,
    pub qty: Decimal,
}

/// Rolling-window mini ticker (`<symbol>@miniTicker`)
#[derive(Debug, Clone, Deserialize)]
pub struct MiniTicker {
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c", with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(rename = "o", with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(rename = "h", with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(rename = "l", with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(rename = "v", with = "rust_decimal::serde::str")]
    pub volume: Decimal,
    #[serde(rename = "q", with = "rust_decimal::serde::str")]
    pub quote_volume: Decimal,
}

use super::messages::{AccountUpdate, DepthLevel, DepthUpdate, ExecutionReport, UserStreamEvent};
use crate::errors::BinanceError;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// Wire-level user-data event, tagged by the `e` discriminator. Event types
/// this gateway does not route land in `Other`.
#[derive(Debug, Deserialize)]
#[serde(tag = "e")]
enum RawUserEvent {
    #[serde(rename = "outboundAccountInfo")]
    Account(AccountUpdate),
    #[serde(rename = "executionReport")]
    Execution(ExecutionReport),
    #[serde(other)]
    Other,
}

/// Classify one user-data frame into its routed event.
///
/// Two-phase: the `e` tag selects the concrete schema, then execution
/// reports split on `x` (case-insensitive `"trade"`) into trade vs order.
/// `Ok(None)` means a recognized-but-unrouted event type; that frame is
/// dropped by design, not an error.
pub fn classify_user_event(raw: &str) -> Result<Option<UserStreamEvent>, BinanceError> {
    let event: RawUserEvent = serde_json::from_str(raw)
        .map_err(|e| BinanceError::Decode(format!("Malformed user-data frame: {}", e)))?;

    Ok(match event {
        RawUserEvent::Account(update) => Some(UserStreamEvent::Account(update)),
        RawUserEvent::Execution(report) if report.is_trade() => {
            Some(UserStreamEvent::Trade(report))
        }
        RawUserEvent::Execution(report) => Some(UserStreamEvent::Order(report)),
        RawUserEvent::Other => None,
    })
}

/// Decode a depth frame and normalize it
pub fn parse_depth_update(raw: &str) -> Result<DepthUpdate, BinanceError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| BinanceError::Decode(format!("Malformed depth frame: {}", e)))?;
    normalize_depth(&value)
}

/// Reshape the venue's diff-depth payload (single-letter keys, levels as
/// `[price, qty]` string arrays) into the canonical [`DepthUpdate`]
pub fn normalize_depth(value: &Value) -> Result<DepthUpdate, BinanceError> {
    Ok(DepthUpdate {
        event_time: field_u64(value, "E")?,
        symbol: field_str(value, "s")?.to_string(),
        first_update_id: field_u64(value, "U")?,
        final_update_id: field_u64(value, "u")?,
        bids: levels(value, "b")?,
        asks: levels(value, "a")?,
    })
}

fn field_u64(value: &Value, key: &str) -> Result<u64, BinanceError> {
    value.get(key).and_then(Value::as_u64).ok_or_else(|| {
        BinanceError::Decode(format!("Depth frame missing integer field '{}'", key))
    })
}

fn field_str<'a>(value: &'a Value, key: &str) -> Result<&'a str, BinanceError> {
    value.get(key).and_then(Value::as_str).ok_or_else(|| {
        BinanceError::Decode(format!("Depth frame missing string field '{}'", key))
    })
}

fn levels(value: &Value, key: &str) -> Result<Vec<DepthLevel>, BinanceError> {
    value
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| BinanceError::Decode(format!("Depth frame missing level array '{}'", key)))?
        .iter()
        .map(level)
        .collect()
}

fn level(entry: &Value) -> Result<DepthLevel, BinanceError> {
    let pair = entry
        .as_array()
        .filter(|pair| pair.len() >= 2)
        .ok_or_else(|| BinanceError::Decode("Depth level is not a [price, qty] pair".to_string()))?;
    Ok(DepthLevel {
        price: decimal(&pair[0])?,
        qty: decimal(&pair[1])?,
    })
}

fn decimal(value: &Value) -> Result<Decimal, BinanceError> {
    value
        .as_str()
        .and_then(|s| s.parse::<Decimal>().ok())
        .ok_or_else(|| BinanceError::Decode("Depth level entry is not a decimal string".to_string()))
}

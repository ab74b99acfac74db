//! Streaming side of the gateway: session registry, per-session tasks, and
//! the dispatcher that routes decoded frames into caller handlers.

pub mod codec;
pub mod messages;
pub mod registry;
pub mod session;

// Re-export main types for easier importing
pub use messages::{
    AccountUpdate, AssetBalance, DepthLevel, DepthUpdate, ExecutionReport, MiniTicker,
    UserStreamEvent,
};
pub use registry::{StreamId, StreamRegistry};
pub use session::SessionState;

use crate::config::BinanceConfig;
use crate::errors::BinanceError;
use messages::UserStreamEvent as Event;
use serde::de::DeserializeOwned;
use session::{StreamSession, StreamSink};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// Caller-supplied reactions for a typed stream.
///
/// `on_message` fires once per inbound frame, in arrival order for that
/// session, on the session's own task. [`handler_fn`] wraps a plain closure
/// when the default open and error behavior is enough.
pub trait StreamHandler<T>: Send + Sync + 'static {
    fn on_message(&self, message: T);

    /// Fires once the handshake completes and the id is registered
    fn on_open(&self, id: &StreamId) {
        let _ = id;
    }

    /// Decode or transport failure on this session. A decode failure leaves
    /// the session running on the next frame; a transport failure closes it.
    fn on_error(&self, id: &StreamId, error: BinanceError) {
        warn!(stream = %id, %error, "stream error");
    }
}

/// Adapter turning a plain closure into a [`StreamHandler`]
pub struct FnHandler<T, F> {
    callback: F,
    _phantom: PhantomData<fn(T)>,
}

/// Wrap `f` as a [`StreamHandler`]; `on_open` and `on_error` keep their
/// default behavior.
pub fn handler_fn<T, F>(f: F) -> FnHandler<T, F>
where
    F: Fn(T) + Send + Sync + 'static,
{
    FnHandler {
        callback: f,
        _phantom: PhantomData,
    }
}

impl<T, F> StreamHandler<T> for FnHandler<T, F>
where
    T: 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    fn on_message(&self, message: T) {
        (self.callback)(message);
    }
}

/// Caller-supplied reactions for the multiplexed user-data stream: one
/// physical connection, three typed outcomes selected by discriminator.
pub trait UserStreamHandler: Send + Sync + 'static {
    fn on_account_update(&self, update: AccountUpdate);
    fn on_trade_update(&self, report: ExecutionReport);
    fn on_order_update(&self, report: ExecutionReport);

    /// Same contract as [`StreamHandler::on_error`]
    fn on_error(&self, id: &StreamId, error: BinanceError) {
        warn!(stream = %id, %error, "user stream error");
    }
}

/// Stream dispatcher.
///
/// Opens sessions against `<stream url><raw params>`, hands each one to its
/// own task, and exposes close/restart by id. The id is allocated and
/// returned before the handshake begins; registration happens on the open
/// event, so a just-opened id becomes visible to [`Self::close_stream`] /
/// [`Self::restart_stream`] only once the connection is up.
pub struct BinanceStreamClient {
    stream_url: String,
    registry: Arc<StreamRegistry>,
}

impl BinanceStreamClient {
    #[must_use]
    pub fn new(config: &BinanceConfig) -> Self {
        Self {
            stream_url: config.ws_url(),
            registry: Arc::new(StreamRegistry::new()),
        }
    }

    /// Open a typed stream; each text frame is decoded directly into `T`.
    ///
    /// `raw_params` is appended verbatim to the stream base URL (e.g.
    /// `"bnbbtc@miniTicker"`); no subscribe message is sent after
    /// connecting. Must be called within a Tokio runtime.
    pub fn open_stream<T, H>(&self, raw_params: &str, handler: H) -> StreamId
    where
        T: DeserializeOwned + Send + Sync + 'static,
        H: StreamHandler<T>,
    {
        self.spawn_session(
            raw_params,
            TypedSink {
                parse: decode_json::<T>,
                handler,
            },
        )
    }

    /// Open a depth stream routed through the depth normalizer: handlers
    /// receive the canonical [`DepthUpdate`], never the nested wire shape
    pub fn open_depth_stream<H>(&self, raw_params: &str, handler: H) -> StreamId
    where
        H: StreamHandler<DepthUpdate>,
    {
        self.spawn_session(
            raw_params,
            TypedSink {
                parse: codec::parse_depth_update,
                handler,
            },
        )
    }

    /// Open the multiplexed user-data stream; `raw_params` is the listen
    /// key obtained from the REST side. Frames route to the handler's
    /// account/trade/order hooks by discriminator; unrouted event types are
    /// dropped silently.
    pub fn open_user_stream<H>(&self, raw_params: &str, handler: H) -> StreamId
    where
        H: UserStreamHandler,
    {
        self.spawn_session(raw_params, UserSink { handler })
    }

    /// Ask a session to close its transport. False when the id is unknown
    /// (never registered, already closed, or still connecting). Removal
    /// happens asynchronously when the close event fires.
    #[must_use]
    pub fn close_stream(&self, id: &StreamId) -> bool {
        self.registry.close(id)
    }

    /// Ask a session to reconnect a fresh transport under the same id.
    /// False when the id is unknown.
    #[must_use]
    pub fn restart_stream(&self, id: &StreamId) -> bool {
        self.registry.restart(id)
    }

    /// Registry view of the open sessions
    #[must_use]
    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    fn spawn_session<S: StreamSink>(&self, raw_params: &str, sink: S) -> StreamId {
        let id = self.registry.next_id();
        let url = format!("{}{}", self.stream_url, raw_params);
        let session = StreamSession::new(
            id.clone(),
            url,
            Arc::clone(&self.registry),
            Arc::new(sink),
        );
        tokio::spawn(session.run());
        id
    }
}

fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T, BinanceError> {
    serde_json::from_str(raw)
        .map_err(|e| BinanceError::Decode(format!("Failed to decode stream frame: {}", e)))
}

/// Bridges a session to a typed handler through a frame parser (plain serde
/// decode, or the depth normalizer).
struct TypedSink<T, H> {
    parse: fn(&str) -> Result<T, BinanceError>,
    handler: H,
}

impl<T, H> StreamSink for TypedSink<T, H>
where
    T: Send + Sync + 'static,
    H: StreamHandler<T>,
{
    fn opened(&self, id: &StreamId) {
        self.handler.on_open(id);
    }

    fn frame(&self, id: &StreamId, raw: &str) {
        match (self.parse)(raw) {
            Ok(message) => self.handler.on_message(message),
            Err(err) => self.handler.on_error(id, err),
        }
    }

    fn failed(&self, id: &StreamId, err: BinanceError) {
        self.handler.on_error(id, err);
    }
}

/// Bridges the user-data session to its three-way handler.
struct UserSink<H> {
    handler: H,
}

impl<H: UserStreamHandler> StreamSink for UserSink<H> {
    fn opened(&self, _id: &StreamId) {}

    fn frame(&self, id: &StreamId, raw: &str) {
        match codec::classify_user_event(raw) {
            Ok(Some(Event::Account(update))) => self.handler.on_account_update(update),
            Ok(Some(Event::Trade(report))) => self.handler.on_trade_update(report),
            Ok(Some(Event::Order(report))) => self.handler.on_order_update(report),
            Ok(None) => {}
            Err(err) => self.handler.on_error(id, err),
        }
    }

    fn failed(&self, id: &StreamId, err: BinanceError) {
        self.handler.on_error(id, err);
    }
}

//! Wire-level tests for the REST executor against a loopback HTTP server.
//! Every test is offline and deterministic: the responder replies with a
//! canned status and body, and hands back the request head it captured.

use spotgate::config::BinanceConfig;
use spotgate::errors::BinanceError;
use spotgate::rest::models::{NewOrder, OrderSide, TimeInForce};
use spotgate::rest::sign;
use spotgate::{BinanceHttpClient, Method};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::timeout;

const TEST_API_KEY: &str = "test-api-key";
const TEST_SECRET_KEY: &str = "test-secret-key";

/// One-shot HTTP responder: accepts a single connection, captures the request
/// head, and replies with the canned status line and body.
async fn spawn_responder(
    status: &'static str,
    body: &'static str,
) -> (SocketAddr, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (head_tx, head_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            head.extend_from_slice(&chunk[..n]);
            if n == 0 || head.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = head_tx.send(String::from_utf8_lossy(&head).into_owned());
    });

    (addr, head_rx)
}

/// Client with credentials, pointed at the loopback responder
fn client_for(addr: SocketAddr) -> BinanceHttpClient {
    let config = BinanceConfig::new(TEST_API_KEY.to_string(), TEST_SECRET_KEY.to_string())
        .base_url(format!("http://{}", addr));
    BinanceHttpClient::new(config).unwrap()
}

/// Path and query from the captured request head, e.g.
/// `("/api/v3/depth", "symbol=BTCUSDT&limit=5")`
fn path_and_query(head: &str) -> (String, String) {
    let request_line = head.lines().next().unwrap();
    let target = request_line.split_whitespace().nth(1).unwrap();
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target.to_string(), String::new()),
    }
}

async fn captured(head_rx: oneshot::Receiver<String>) -> String {
    timeout(Duration::from_secs(5), head_rx).await.unwrap().unwrap()
}

mod response_classification {
    use super::*;

    #[tokio::test]
    async fn test_gateway_timeout_fails_fast_without_reading_body() {
        // The body is deliberately not JSON; a 504 must map before any
        // body inspection could trip over it.
        let (addr, _head) =
            spawn_responder("504 Gateway Timeout", "<html>upstream timed out</html>").await;

        let result = client_for(addr).server_time().await;
        assert!(matches!(result, Err(BinanceError::GatewayTimeout)));
    }

    #[tokio::test]
    async fn test_api_error_carries_code_and_message() {
        let (addr, _head) =
            spawn_responder("400 Bad Request", r#"{"code":-1121,"msg":"Invalid symbol."}"#).await;

        let result = client_for(addr).price_ticker("NOPE").await;
        match result {
            Err(BinanceError::Api { code, message }) => {
                assert_eq!(code, -1121);
                assert_eq!(message, "Invalid symbol.");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_api_error_defaults_when_body_is_not_json() {
        let (addr, _head) =
            spawn_responder("500 Internal Server Error", "<html>Bad Gateway</html>").await;

        let result = client_for(addr).server_time().await;
        match result {
            Err(BinanceError::Api { code, message }) => {
                assert_eq!(code, 0);
                assert!(message.is_empty());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_body_decodes_into_type() {
        let (addr, _head) = spawn_responder("200 OK", r#"{"serverTime":1499827319559}"#).await;

        let time = client_for(addr).server_time().await.unwrap();
        assert_eq!(time.server_time, 1_499_827_319_559);
    }

    #[tokio::test]
    async fn test_success_body_with_wrong_schema_is_a_decode_error() {
        let (addr, _head) = spawn_responder("200 OK", r#"{"unexpected":true}"#).await;

        let result = client_for(addr).server_time().await;
        assert!(matches!(result, Err(BinanceError::Decode(_))));
    }
}

mod request_building {
    use super::*;

    #[tokio::test]
    async fn test_unsigned_params_are_sent_verbatim() {
        let (addr, head_rx) = spawn_responder(
            "200 OK",
            r#"{"lastUpdateId":1027024,"bids":[],"asks":[]}"#,
        )
        .await;

        let book = client_for(addr).order_book("btcusdt", Some(5)).await.unwrap();
        assert_eq!(book.last_update_id, 1_027_024);

        let head = captured(head_rx).await;
        let (path, query) = path_and_query(&head);
        assert_eq!(path, "/api/v3/depth");
        assert_eq!(query, "symbol=BTCUSDT&limit=5");
        assert!(head.starts_with("GET "));
    }

    #[tokio::test]
    async fn test_no_question_mark_when_params_are_empty() {
        let (addr, head_rx) = spawn_responder("200 OK", "{}").await;

        client_for(addr).ping().await.unwrap();

        let head = captured(head_rx).await;
        let (path, query) = path_and_query(&head);
        assert_eq!(path, "/api/v3/ping");
        assert!(query.is_empty());
        assert!(!head.lines().next().unwrap().contains('?'));
    }

    #[tokio::test]
    async fn test_api_key_header_is_attached() {
        let (addr, head_rx) = spawn_responder("200 OK", r#"{"serverTime":1}"#).await;

        client_for(addr).server_time().await.unwrap();

        let head = captured(head_rx).await;
        let keyed = head
            .lines()
            .any(|line| line.to_ascii_lowercase() == format!("x-mbx-apikey: {}", TEST_API_KEY));
        assert!(keyed, "missing API key header in:\n{}", head);
    }

    #[tokio::test]
    async fn test_no_api_key_header_without_credentials() {
        let (addr, head_rx) = spawn_responder("200 OK", r#"{"serverTime":1}"#).await;

        let config = BinanceConfig::read_only().base_url(format!("http://{}", addr));
        BinanceHttpClient::new(config)
            .unwrap()
            .server_time()
            .await
            .unwrap();

        let head = captured(head_rx).await;
        assert!(!head.to_ascii_lowercase().contains("x-mbx-apikey"));
    }
}

mod signing {
    use super::*;

    /// Splits `<payload>&signature=<sig>` and checks the signature is the
    /// HMAC of exactly the payload that precedes it.
    fn assert_signature_covers_payload(query: &str) -> String {
        let (payload, sig) = query
            .rsplit_once("&signature=")
            .expect("query missing trailing signature");
        let expected = sign::signature(TEST_SECRET_KEY, payload).unwrap();
        assert_eq!(sig, expected, "signature does not cover payload {:?}", payload);
        payload.to_string()
    }

    #[tokio::test]
    async fn test_signed_call_with_empty_params_sends_timestamp_and_signature() {
        let (addr, head_rx) = spawn_responder(
            "200 OK",
            r#"{"makerCommission":15,"takerCommission":15,"buyerCommission":0,"sellerCommission":0,"canTrade":true,"canWithdraw":true,"canDeposit":true,"updateTime":123456789,"balances":[]}"#,
        )
        .await;

        let account = client_for(addr).account().await.unwrap();
        assert!(account.can_trade);

        let head = captured(head_rx).await;
        let (path, query) = path_and_query(&head);
        assert_eq!(path, "/api/v3/account");

        let payload = assert_signature_covers_payload(&query);
        // No leading '&' when the caller params are empty.
        assert!(payload.starts_with("timestamp="), "payload: {:?}", payload);
        assert_eq!(payload.matches('=').count(), 1);
    }

    #[tokio::test]
    async fn test_signed_call_appends_to_params_without_reordering() {
        let (addr, head_rx) = spawn_responder(
            "200 OK",
            r#"{"symbol":"BTCUSDT","orderId":28,"clientOrderId":"6gCrw2kRUAF9CvJDGP16IP","transactTime":1507725176595}"#,
        )
        .await;

        let order = NewOrder::limit("btcusdt", OrderSide::Buy, "0.001".parse().unwrap(), "30000".parse().unwrap())
            .time_in_force(TimeInForce::Ioc);
        let ack = client_for(addr).place_order(&order).await.unwrap();
        assert_eq!(ack.order_id, 28);

        let head = captured(head_rx).await;
        assert!(head.starts_with("POST "));
        let (path, query) = path_and_query(&head);
        assert_eq!(path, "/api/v3/order");

        let payload = assert_signature_covers_payload(&query);
        let (params, tail) = payload.rsplit_once("&timestamp=").unwrap();
        assert_eq!(
            params,
            "symbol=BTCUSDT&side=BUY&type=LIMIT&quantity=0.001&price=30000&timeInForce=IOC"
        );
        assert!(tail.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_listen_key_request_is_keyed_but_unsigned() {
        let (addr, head_rx) = spawn_responder(
            "200 OK",
            r#"{"listenKey":"pqia91ma19a5s61cv6a81va65sdf19v8a65a1a5s61cv6a81va65sdf19v8a65a1"}"#,
        )
        .await;

        let key = client_for(addr).start_user_stream().await.unwrap();
        assert!(!key.listen_key.is_empty());

        let head = captured(head_rx).await;
        assert!(head.starts_with("POST "));
        let (path, query) = path_and_query(&head);
        assert_eq!(path, "/api/v3/userDataStream");
        assert!(query.is_empty(), "listen key request must not be signed");
        assert!(head.to_ascii_lowercase().contains("x-mbx-apikey"));
    }

    #[tokio::test]
    async fn test_generic_execute_signs_caller_params() {
        let (addr, head_rx) = spawn_responder("200 OK", "{}").await;

        let _: serde_json::Value = client_for(addr)
            .execute(Method::GET, "/api/v3/myTrades", true, "symbol=ETHBTC&limit=10")
            .await
            .unwrap();

        let head = captured(head_rx).await;
        let (_, query) = path_and_query(&head);
        let payload = assert_signature_covers_payload(&query);
        assert!(payload.starts_with("symbol=ETHBTC&limit=10&timestamp="));
    }
}

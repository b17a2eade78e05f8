mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use centrifuge_sse::client::Client;
use centrifuge_sse::config::{Config, ReconnectStrategy};
use centrifuge_sse::errors::TransportError;
use centrifuge_sse::protocol::ConnectRequest;
use centrifuge_sse::token::Claims;
use futures::StreamExt;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use common::{Request, bind, read_request, write_event, write_status, write_stream_head};

const WAIT: Duration = Duration::from_secs(5);

/// Hands out a fixed sequence of delays, repeating the last one.
#[derive(Debug)]
struct SequenceReconnect {
    delays: Vec<Duration>,
    next: usize,
}

impl SequenceReconnect {
    fn new(delays: &[u64]) -> Self {
        SequenceReconnect {
            delays: delays.iter().copied().map(Duration::from_millis).collect(),
            next: 0,
        }
    }
}

impl ReconnectStrategy for SequenceReconnect {
    fn next_delay(&mut self) -> Duration {
        let delay = self.delays[self.next.min(self.delays.len() - 1)];
        self.next += 1;
        delay
    }

    fn reset(&mut self) {
        self.next = 0;
    }
}

#[derive(Default)]
struct Counters {
    connected: AtomicUsize,
    disconnected: AtomicUsize,
    reconnects: Mutex<Vec<(String, Duration)>>,
}

fn client_with_counters(url: &str, config: Config) -> (Client, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let mut client = Client::new(url, config).unwrap();

    let c = counters.clone();
    client.on_connected(move || {
        c.connected.fetch_add(1, Ordering::SeqCst);
    });
    let c = counters.clone();
    client.on_disconnected(move || {
        c.disconnected.fetch_add(1, Ordering::SeqCst);
    });
    let c = counters.clone();
    client.on_reconnect(move |err: &TransportError, delay| {
        let kind = match err {
            TransportError::BadStatus(code) => format!("status {}", code),
            TransportError::FrameTooLarge { .. } => "too large".to_string(),
            TransportError::Closed => "closed".to_string(),
            TransportError::Http(_) => "http".to_string(),
        };
        c.reconnects.lock().unwrap().push((kind, delay));
    });

    (client, counters)
}

async fn next_data(events: &mut centrifuge_sse::subscription::EventStream) -> String {
    let event = tokio::time::timeout(WAIT, events.next())
        .await
        .expect("timed out waiting for event")
        .expect("stream ended");
    String::from_utf8(event.data).unwrap()
}

/// Decodes the handshake carried in the `cf_connect` query parameter.
fn connect_request(base: &str, request: &Request) -> ConnectRequest {
    let path = request.request_line.split(' ').nth(1).unwrap();
    let url = url::Url::parse(&format!("{}{}", base, path)).unwrap();
    let (key, connect) = url.query_pairs().next().unwrap();
    assert_eq!(key, "cf_connect");
    serde_json::from_str(&connect).unwrap()
}

fn decode_token(token: &str, validate_exp: bool) -> Claims {
    let mut validation = Validation::new(Algorithm::HS256);
    if !validate_exp {
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
    }
    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(b"secret"), &validation)
        .unwrap()
        .claims
}

/// Accepts stream connections, reporting each request. The first stream
/// ends after one event, later ones stay open.
fn serve_reconnecting(listener: TcpListener, requests: mpsc::UnboundedSender<Request>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut open = Vec::new();
        for i in 1.. {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let _ = requests.send(read_request(&mut stream).await);
            write_stream_head(&mut stream).await;
            write_event(&mut stream, &i.to_string()).await.unwrap();
            if i > 1 {
                open.push(stream);
            }
        }
    })
}

/// Failed attempts are reported once each with the strategy's delays,
/// followed by a single successful connection.
#[tokio::test]
async fn test_reconnect_notifications() {
    let (listener, base) = bind().await;
    let (request_tx, request_rx) = oneshot::channel();

    let server_handle = tokio::spawn(async move {
        let mut open = Vec::new();
        let mut request_tx = Some(request_tx);
        for attempt in 0.. {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let request = read_request(&mut stream).await;
            if attempt < 3 {
                write_status(&mut stream, "503 Service Unavailable").await;
                continue;
            }
            if let Some(tx) = request_tx.take() {
                let _ = tx.send(request);
            }
            write_stream_head(&mut stream).await;
            write_event(&mut stream, "hello").await.unwrap();
            open.push(stream);
        }
    });

    let config = Config::new()
        .with_name("test-client")
        .with_reconnect_strategy(SequenceReconnect::new(&[5, 10, 15]));
    let (client, counters) =
        client_with_counters(&format!("{}/connection/uni_sse", base), config);

    let cancel = CancellationToken::new();
    let mut events = client.subscribe(cancel.clone(), "facts:devops", "1").unwrap();

    assert_eq!(next_data(&mut events).await, "hello");
    assert_eq!(counters.connected.load(Ordering::SeqCst), 1);
    assert_eq!(counters.disconnected.load(Ordering::SeqCst), 0);
    assert_eq!(
        *counters.reconnects.lock().unwrap(),
        vec![
            ("status 503".to_string(), Duration::from_millis(5)),
            ("status 503".to_string(), Duration::from_millis(10)),
            ("status 503".to_string(), Duration::from_millis(15)),
        ]
    );

    let request = request_rx.await.unwrap();
    assert!(request
        .request_line
        .starts_with("GET /connection/uni_sse?cf_connect="));
    assert_eq!(request.header("accept").as_deref(), Some("text/event-stream"));

    let connect = connect_request(&base, &request);
    assert_eq!(connect.name, "test-client");
    assert_eq!(connect.token, "");
    assert_eq!(connect.subs.len(), 1);
    assert!(!connect.subs["facts:devops"].recover);

    events.close().await;
    assert_eq!(counters.disconnected.load(Ordering::SeqCst), 1);
    server_handle.abort();
}

/// A slow consumer blocks the reader instead of losing events.
#[tokio::test]
async fn test_backpressure_keeps_order() {
    let (listener, base) = bind().await;
    let server_handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        write_stream_head(&mut stream).await;
        for i in 0..50 {
            write_event(&mut stream, &i.to_string()).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let config = Config::new().with_event_buffer_size(4);
    let client = Client::new(&base, config).unwrap();
    let mut events = client
        .subscribe(CancellationToken::new(), "news", "1")
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    for i in 0..50 {
        assert_eq!(next_data(&mut events).await, i.to_string());
    }

    events.close().await;
    server_handle.abort();
}

/// Cancelling the caller's token ends the stream and the background task.
#[tokio::test]
async fn test_cancellation_stops_delivery() {
    let (listener, base) = bind().await;
    let server_handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        write_stream_head(&mut stream).await;
        let mut i = 0;
        while write_event(&mut stream, &i.to_string()).await.is_ok() {
            i += 1;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });

    let (client, counters) = client_with_counters(&base, Config::new());
    let cancel = CancellationToken::new();
    let mut events = client.subscribe(cancel.clone(), "news", "1").unwrap();

    assert_eq!(next_data(&mut events).await, "0");

    cancel.cancel();
    assert!(events.is_cancelled());
    let next = tokio::time::timeout(WAIT, events.next()).await.unwrap();
    assert!(next.is_none());
    assert!(events.recv().await.is_none());

    tokio::time::timeout(WAIT, events.close()).await.unwrap();
    assert_eq!(counters.connected.load(Ordering::SeqCst), 1);
    assert_eq!(counters.disconnected.load(Ordering::SeqCst), 1);
    assert!(counters.reconnects.lock().unwrap().is_empty());
    server_handle.abort();
}

/// Dropping the stream releases the connection.
#[tokio::test]
async fn test_drop_closes_connection() {
    let (listener, base) = bind().await;
    let (closed_tx, mut closed_rx) = mpsc::channel(1);
    let server_handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        write_stream_head(&mut stream).await;
        while write_event(&mut stream, "tick").await.is_ok() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let _ = closed_tx.send(()).await;
    });

    let client = Client::new(&base, Config::new()).unwrap();
    let mut events = client
        .subscribe(CancellationToken::new(), "news", "1")
        .unwrap();
    assert_eq!(next_data(&mut events).await, "tick");
    drop(events);

    tokio::time::timeout(WAIT, closed_rx.recv())
        .await
        .expect("connection was not released")
        .unwrap();
    server_handle.abort();
}

/// A stream ending on the server side is reconnected, events keep their order.
#[tokio::test]
async fn test_reconnect_after_server_close() {
    let (listener, base) = bind().await;
    let server_handle = tokio::spawn(async move {
        let mut open = Vec::new();
        for i in 1.. {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            read_request(&mut stream).await;
            write_stream_head(&mut stream).await;
            write_event(&mut stream, &i.to_string()).await.unwrap();
            if i == 1 {
                drop(stream);
            } else {
                open.push(stream);
            }
        }
    });

    let config = Config::new().with_reconnect_strategy(SequenceReconnect::new(&[5]));
    let (client, counters) = client_with_counters(&base, config);
    let mut events = client
        .subscribe(CancellationToken::new(), "news", "1")
        .unwrap();

    assert_eq!(next_data(&mut events).await, "1");
    assert_eq!(next_data(&mut events).await, "2");
    assert_eq!(counters.connected.load(Ordering::SeqCst), 2);
    assert_eq!(counters.disconnected.load(Ordering::SeqCst), 1);
    assert_eq!(
        *counters.reconnects.lock().unwrap(),
        vec![("closed".to_string(), Duration::from_millis(5))]
    );

    events.close().await;
    server_handle.abort();
}

/// Oversized events fail the connection instead of being truncated.
#[tokio::test]
async fn test_oversized_event_reconnects() {
    let (listener, base) = bind().await;
    let server_handle = tokio::spawn(async move {
        let mut open = Vec::new();
        for attempt in 0.. {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            read_request(&mut stream).await;
            write_stream_head(&mut stream).await;
            let data = if attempt == 0 { "x".repeat(256) } else { "small".to_string() };
            let _ = write_event(&mut stream, &data).await;
            open.push(stream);
        }
    });

    let config = Config::new()
        .with_max_buffer_size(64)
        .with_reconnect_strategy(SequenceReconnect::new(&[5]));
    let (client, counters) = client_with_counters(&base, config);
    let mut events = client
        .subscribe(CancellationToken::new(), "news", "1")
        .unwrap();

    assert_eq!(next_data(&mut events).await, "small");
    assert_eq!(
        *counters.reconnects.lock().unwrap(),
        vec![("too large".to_string(), Duration::from_millis(5))]
    );

    events.close().await;
    server_handle.abort();
}

/// Without a listener the subscription keeps retrying until cancelled.
#[tokio::test]
async fn test_retries_until_cancelled() {
    let (listener, base) = bind().await;
    drop(listener);

    let config = Config::new().with_reconnect_strategy(SequenceReconnect::new(&[1]));
    let (client, counters) = client_with_counters(&base, config);
    let cancel = CancellationToken::new();
    let mut events = client.subscribe(cancel.clone(), "news", "1").unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let attempts = counters.reconnects.lock().unwrap().len();
    assert!(attempts > 1, "expected repeated attempts, got {}", attempts);
    assert!(counters
        .reconnects
        .lock()
        .unwrap()
        .iter()
        .all(|(kind, _)| kind == "http"));

    cancel.cancel();
    assert!(events.next().await.is_none());
    tokio::time::timeout(WAIT, events.close()).await.unwrap();
    assert_eq!(counters.connected.load(Ordering::SeqCst), 0);
}

/// With a token lifetime every connection attempt carries a freshly
/// signed token with its own expiry.
#[tokio::test]
async fn test_token_resigned_on_reconnect() {
    let (listener, base) = bind().await;
    let (requests_tx, mut requests) = mpsc::unbounded_channel();
    let server_handle = serve_reconnecting(listener, requests_tx);

    let config = Config::new()
        .with_secret("secret")
        .with_token_ttl(Duration::from_secs(60))
        .with_reconnect_strategy(SequenceReconnect::new(&[5]));
    let client = Client::new(&base, config).unwrap();
    let mut events = client
        .subscribe(CancellationToken::new(), "facts:devops", "1")
        .unwrap();

    assert_eq!(next_data(&mut events).await, "1");
    assert_eq!(next_data(&mut events).await, "2");

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    for _ in 0..2 {
        let request = requests.recv().await.unwrap();
        let connect = connect_request(&base, &request);
        let claims = decode_token(&connect.token, true);

        let exp = claims.exp.expect("token without expiry");
        assert!(exp >= now + 55 && exp <= now + 65, "exp {} now {}", exp, now);
        assert_eq!(claims.sub, "1");
        assert_eq!(claims.subs.keys().collect::<Vec<_>>(), vec!["facts:devops"]);
        assert_eq!(
            connect.subs.keys().collect::<Vec<_>>(),
            claims.subs.keys().collect::<Vec<_>>()
        );
    }

    events.close().await;
    server_handle.abort();
}

/// Without a token lifetime the first handshake is reused as is.
#[tokio::test]
async fn test_handshake_reused_without_ttl() {
    let (listener, base) = bind().await;
    let (requests_tx, mut requests) = mpsc::unbounded_channel();
    let server_handle = serve_reconnecting(listener, requests_tx);

    let config = Config::new()
        .with_secret("secret")
        .with_reconnect_strategy(SequenceReconnect::new(&[5]));
    let client = Client::new(&base, config).unwrap();
    let mut events = client
        .subscribe(CancellationToken::new(), "facts:devops", "1")
        .unwrap();

    assert_eq!(next_data(&mut events).await, "1");
    assert_eq!(next_data(&mut events).await, "2");

    let first = requests.recv().await.unwrap();
    let second = requests.recv().await.unwrap();
    assert_eq!(first.request_line, second.request_line);

    let claims = decode_token(&connect_request(&base, &first).token, false);
    assert_eq!(claims.exp, None);
    assert_eq!(claims.sub, "1");
    assert!(claims.subs.contains_key("facts:devops"));

    events.close().await;
    server_handle.abort();
}

/// The size limit applies per event, not per transport chunk.
#[tokio::test]
async fn test_burst_within_event_limit() {
    use tokio::io::AsyncWriteExt;

    let (listener, base) = bind().await;
    let server_handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        write_stream_head(&mut stream).await;
        let burst: String = (0..20).map(|i| format!("data: {}\n\n", i)).collect();
        stream.write_all(burst.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let config = Config::new()
        .with_max_buffer_size(16)
        .with_reconnect_strategy(SequenceReconnect::new(&[5]));
    let (client, counters) = client_with_counters(&base, config);
    let mut events = client
        .subscribe(CancellationToken::new(), "news", "1")
        .unwrap();

    for i in 0..20 {
        assert_eq!(next_data(&mut events).await, i.to_string());
    }
    assert!(counters.reconnects.lock().unwrap().is_empty());
    assert_eq!(counters.connected.load(Ordering::SeqCst), 1);

    events.close().await;
    server_handle.abort();
}

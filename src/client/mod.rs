//! SSE subscriber for Centrifugo's uni-directional transport.
//!
//! A [`Client`] is configured once and then consumed by
//! [`Client::subscribe`], which spawns one background task per subscription
//! and hands back an [`EventStream`] with the received events.
//!
//! # Example
//!
//! ```rust,no_run
//! use centrifuge_sse::client::Client;
//! use centrifuge_sse::config::Config;
//! use futures::StreamExt;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new().with_secret("jwt-secret");
//! let mut client = Client::new("http://localhost:8000/connection/uni_sse", config)?;
//!
//! client.on_connected(|| println!("connected"));
//! client.on_reconnect(|err, delay| println!("reconnecting in {:?}: {}", delay, err));
//!
//! let cancel = CancellationToken::new();
//! let mut events = client.subscribe(cancel.clone(), "news", "user-1")?;
//! while let Some(event) = events.next().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub(crate) mod connection;
pub mod handshake;
pub(crate) mod inner;
pub mod types;

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{Config, DEFAULT_SSE_URL, ReconnectStrategy};
use crate::errors::{ConfigError, SubscribeError, TransportError};
use crate::subscription::EventStream;

use connection::ConnectionManager;
use handshake::Handshake;
use inner::{ClientInner, ConnectCallback, ReconnectCallback};
pub use types::State;

/// Subscriber session.
///
/// Holds the server url, credentials and options for exactly one
/// subscription. Callbacks registered before [`Client::subscribe`] are
/// moved into the subscription's background task.
pub struct Client {
    url: Url,
    http: reqwest::Client,
    secret: Option<String>,
    name: String,
    token_ttl: Option<Duration>,
    event_buffer_size: usize,
    max_buffer_size: usize,
    reconnect_strategy: Box<dyn ReconnectStrategy>,
    runtime: Option<Handle>,
    log_target: String,
    on_connected: Option<ConnectCallback>,
    on_disconnected: Option<ConnectCallback>,
    on_reconnect: Option<ReconnectCallback>,
}

impl Client {
    /// Creates a new subscriber.
    ///
    /// An empty `url` selects [`DEFAULT_SSE_URL`]. Fails if the
    /// configuration is invalid, the url cannot be parsed, or the
    /// transport cannot be built.
    ///
    /// # Example
    ///
    /// ```rust
    /// use centrifuge_sse::client::Client;
    /// use centrifuge_sse::config::Config;
    ///
    /// let client = Client::new("", Config::new()).unwrap();
    /// assert_eq!(client.url().as_str(), "http://localhost:8000/connection/uni_sse");
    ///
    /// assert!(Client::new("not a url", Config::new()).is_err());
    /// ```
    pub fn new(url: &str, config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let url = if url.is_empty() { DEFAULT_SSE_URL } else { url };
        let url = Url::parse(url)?;
        let http = ConnectionManager::http_client()?;

        Ok(Client {
            url,
            http,
            secret: config.secret,
            name: config.name,
            token_ttl: config.token_ttl,
            event_buffer_size: config.event_buffer_size,
            max_buffer_size: config.max_buffer_size,
            reconnect_strategy: config.reconnect_strategy,
            runtime: config.runtime,
            log_target: config.log_target,
            on_connected: None,
            on_disconnected: None,
            on_reconnect: None,
        })
    }

    /// Subscription endpoint without the connect request.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sets a callback for every successful (re)connection.
    ///
    /// Defaults to an info log entry.
    pub fn on_connected(&mut self, func: impl FnMut() + Send + 'static) {
        self.on_connected = Some(Box::new(func));
    }

    /// Sets a callback for every lost or closed connection.
    ///
    /// Defaults to an info log entry.
    pub fn on_disconnected(&mut self, func: impl FnMut() + Send + 'static) {
        self.on_disconnected = Some(Box::new(func));
    }

    /// Sets a callback invoked before waiting for the next connection attempt,
    /// with the error that caused it and the delay chosen by the reconnect
    /// strategy.
    ///
    /// Defaults to an info log entry.
    pub fn on_reconnect(&mut self, func: impl FnMut(&TransportError, Duration) + Send + 'static) {
        self.on_reconnect = Some(Box::new(func));
    }

    /// Subscribes `user` to `channel` and starts streaming.
    ///
    /// The token and connect request are built before anything is spawned,
    /// so signing and encoding failures are returned here. After that,
    /// transport failures are only reported through [`Client::on_reconnect`]
    /// and the stream reconnects until `cancel` fires or the returned
    /// [`EventStream`] is cancelled or dropped.
    pub fn subscribe(
        self,
        cancel: CancellationToken,
        channel: &str,
        user: &str,
    ) -> Result<EventStream, SubscribeError> {
        let rt = match self.runtime {
            Some(rt) => rt,
            None => Handle::try_current()?,
        };

        let handshake = Handshake {
            base_url: self.url,
            channel: channel.into(),
            user: user.into(),
            name: self.name,
            secret: self.secret,
            token_ttl: self.token_ttl,
        };
        let url = handshake.connect_url()?;
        log::trace!(target: self.log_target.as_str(), "--> {}", url.as_str());

        let (events_write, events_read) = mpsc::channel(self.event_buffer_size);
        let cancel = cancel.child_token();

        let inner = ClientInner {
            http: self.http,
            handshake,
            state: State::Idle,
            max_buffer_size: self.max_buffer_size,
            reconnect_strategy: self.reconnect_strategy,
            log_target: self.log_target.clone(),
            on_connected: self.on_connected,
            on_disconnected: self.on_disconnected,
            on_reconnect: self.on_reconnect,
        };
        let task = rt.spawn(inner.run(url, events_write, cancel.clone()));

        Ok(EventStream::new(events_read, cancel, task, self.log_target))
    }
}

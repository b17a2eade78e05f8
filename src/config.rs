//! # Configuration Module
//!
//! Construction-time options for the SSE subscriber and the reconnection
//! policies it can use.
//!
//! ## Core Types
//!
//! - **Config**: Subscriber options (credentials, buffer sizes, reconnect policy)
//! - **ReconnectStrategy**: Trait for custom reconnection behavior
//! - **BackoffReconnect**: Exponential backoff reconnection strategy

use std::time::Duration;

use tokio::runtime::Handle;

use crate::errors::ConfigError;

/// Subscription endpoint used when `Client::new` is given an empty url.
pub const DEFAULT_SSE_URL: &str = "http://localhost:8000/connection/uni_sse";

/// Default capacity of the queue between the stream reader and the consumer.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 16;

/// Default upper bound for a single event while it is being read (64 MiB).
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Connect and TLS handshake timeout of the streaming transport.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// TCP keep-alive interval of the streaming transport.
pub const KEEP_ALIVE: Duration = Duration::from_secs(10);

/// Subscriber configuration
///
/// Every field has a default, so only the options that differ need to be set.
/// The configuration is validated once by `Client::new` and never
/// changed afterwards.
///
/// ## Example
///
/// ```rust
/// use centrifuge_sse::config::Config;
/// use std::time::Duration;
///
/// let config = Config::new()
///     .with_secret("jwt-secret")
///     .with_name("my-client")
///     .with_token_ttl(Duration::from_secs(3600))
///     .with_event_buffer_size(64);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug)]
pub struct Config {
    /// HMAC secret used to sign the subscription token
    ///
    /// When `None` no token is generated and the connect request carries
    /// an empty token, which only works with anonymous access enabled
    /// on the server.
    pub secret: Option<String>,

    /// Client name sent in the connect request
    pub name: String,

    /// Lifetime of generated tokens
    ///
    /// `None` produces tokens without an `exp` claim. With a lifetime set
    /// the token is signed again before every reconnect attempt.
    pub token_ttl: Option<Duration>,

    /// Capacity of the event queue handed to the consumer
    pub event_buffer_size: usize,

    /// Largest event, in bytes, accepted from the stream
    ///
    /// Larger events fail the connection, which is then re-established
    /// according to the reconnect strategy.
    pub max_buffer_size: usize,

    /// Reconnection strategy for handling disconnections
    pub reconnect_strategy: Box<dyn ReconnectStrategy>,

    /// Optional custom tokio runtime handle
    ///
    /// If not provided, the runtime of the task calling `subscribe` is used.
    pub runtime: Option<Handle>,

    /// Log target of every record the subscriber emits
    pub log_target: String,
}

impl Default for Config {
    /// Creates default configuration
    ///
    /// Defaults:
    /// - No secret (anonymous, empty token)
    /// - Package name as client name
    /// - Tokens without expiry
    /// - 16 queued events
    /// - 64 MiB max event size
    /// - Exponential backoff reconnection capped at 10 seconds
    /// - No custom runtime
    /// - Crate name as log target
    fn default() -> Self {
        Config {
            secret: None,
            name: String::from(env!("CARGO_PKG_NAME")),
            token_ttl: None,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            reconnect_strategy: Box::new(BackoffReconnect::default()),
            runtime: None,
            log_target: String::from(env!("CARGO_CRATE_NAME")),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the secret used to sign subscription tokens
    ///
    /// ## Example
    ///
    /// ```rust
    /// use centrifuge_sse::config::Config;
    ///
    /// let config = Config::new().with_secret("secret");
    /// assert_eq!(config.secret.as_deref(), Some("secret"));
    /// ```
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Sets the client name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the lifetime of generated tokens
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = Some(ttl);
        self
    }

    /// Sets the capacity of the event queue
    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    /// Sets the largest accepted event size in bytes
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Sets the reconnection strategy
    ///
    /// ## Example
    ///
    /// ```rust
    /// use centrifuge_sse::config::{Config, BackoffReconnect};
    /// use std::time::Duration;
    ///
    /// let strategy = BackoffReconnect {
    ///     factor: 2.0,
    ///     min_delay: Duration::from_millis(100),
    ///     max_delay: Duration::from_secs(5),
    ///     ..Default::default()
    /// };
    ///
    /// let config = Config::new().with_reconnect_strategy(strategy);
    /// ```
    pub fn with_reconnect_strategy(mut self, strategy: impl ReconnectStrategy) -> Self {
        self.reconnect_strategy = Box::new(strategy);
        self
    }

    /// Sets a custom tokio runtime handle
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Sets the log target used by the subscriber
    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    /// Checks the buffer sizes
    ///
    /// ## Example
    ///
    /// ```rust
    /// use centrifuge_sse::config::Config;
    ///
    /// assert!(Config::new().with_event_buffer_size(0).validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_buffer_size == 0 {
            return Err(ConfigError::ZeroEventBuffer);
        }
        if self.max_buffer_size == 0 {
            return Err(ConfigError::ZeroMaxBuffer);
        }
        Ok(())
    }
}

/// Trait for implementing custom reconnection strategies
///
/// The strategy is asked for a delay after every failed connection attempt
/// and after every lost connection. It is reset once a connection succeeds.
///
/// ## Example
///
/// ```rust
/// use centrifuge_sse::config::ReconnectStrategy;
/// use std::time::Duration;
///
/// #[derive(Debug, Default)]
/// struct LinearReconnect {
///     attempt: u32,
/// }
///
/// impl ReconnectStrategy for LinearReconnect {
///     fn next_delay(&mut self) -> Duration {
///         self.attempt += 1;
///         Duration::from_millis(100) * self.attempt
///     }
///
///     fn reset(&mut self) {
///         self.attempt = 0;
///     }
/// }
/// ```
pub trait ReconnectStrategy: std::fmt::Debug + Send + 'static {
    /// Returns the delay before the next connection attempt
    fn next_delay(&mut self) -> Duration;

    /// Restarts the schedule after a successful connection
    fn reset(&mut self);
}

/// Exponential backoff reconnection strategy
///
/// ## Algorithm
///
/// The n-th delay since the last reset is `min_delay * factor^n`,
/// clamped between `min_delay` and `max_delay`.
///
/// ## Example
///
/// ```rust
/// use centrifuge_sse::config::{BackoffReconnect, ReconnectStrategy};
/// use std::time::Duration;
///
/// let mut strategy = BackoffReconnect {
///     factor: 2.0,
///     min_delay: Duration::from_millis(100),
///     max_delay: Duration::from_millis(300),
///     ..Default::default()
/// };
///
/// assert_eq!(strategy.next_delay(), Duration::from_millis(100));
/// assert_eq!(strategy.next_delay(), Duration::from_millis(200));
/// assert_eq!(strategy.next_delay(), Duration::from_millis(300));
/// ```
#[derive(Debug, Clone)]
pub struct BackoffReconnect {
    /// Exponential factor for backoff calculation
    pub factor: f64,

    /// Minimum delay between attempts
    pub min_delay: Duration,

    /// Maximum delay between attempts
    pub max_delay: Duration,

    /// Delays handed out since the last reset
    pub attempt: u32,
}

impl ReconnectStrategy for BackoffReconnect {
    fn next_delay(&mut self) -> Duration {
        if self.min_delay > self.max_delay {
            return self.max_delay;
        }

        let exponent = i32::try_from(self.attempt).unwrap_or(i32::MAX);
        self.attempt = self.attempt.saturating_add(1);

        let time = self.min_delay.as_secs_f64() * self.factor.powi(exponent);
        // also catches NaN from a bogus factor
        #[allow(clippy::neg_cmp_op_on_partial_ord)]
        if !(time < self.max_delay.as_secs_f64()) {
            return self.max_delay;
        }
        if time <= self.min_delay.as_secs_f64() {
            return self.min_delay;
        }
        Duration::from_secs_f64(time)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for BackoffReconnect {
    /// Defaults:
    /// - **factor**: 1.5
    /// - **min_delay**: 500ms
    /// - **max_delay**: 10 seconds
    fn default() -> Self {
        BackoffReconnect {
            factor: 1.5,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            attempt: 0,
        }
    }
}

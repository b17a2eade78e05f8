use thiserror::Error;

/// Failure to produce a signed subscription token.
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("signing secret is empty")]
    EmptySecret,
    #[error("failed to sign token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Failure to serialize the connect request.
#[derive(Error, Debug)]
#[error("failed to encode connect request: {0}")]
pub struct EncodingError(#[from] pub serde_json::Error);

/// Rejected subscriber configuration, reported by `Client::new`.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("event buffer size must be positive")]
    ZeroEventBuffer,
    #[error("max buffer size must be positive")]
    ZeroMaxBuffer,
    #[error("invalid subscription url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build http transport: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum SubscribeError {
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Connection level failure of the event stream.
///
/// These never end the stream; they are handed to the reconnect callback
/// together with the delay before the next attempt.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bad status code: {0}")]
    BadStatus(u16),
    #[error("event exceeds max buffer size of {limit} bytes")]
    FrameTooLarge { limit: usize },
    #[error("stream closed by server")]
    Closed,
}

/// Error object reported by the server inside an API response body.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[error("logic error, code: {code}, msg: {message}")]
pub struct LogicError {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed to send request to {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("bad status code: {code}, text: {status}")]
    BadStatus { code: u16, status: String },
    #[error(transparent)]
    Logic(#[from] LogicError),
    #[error("failed to marshal payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to unmarshal response body: {0}")]
    Decode(#[source] serde_json::Error),
}

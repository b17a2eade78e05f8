//! Connect request construction.
//!
//! The uni-directional SSE transport has no command channel, so the whole
//! handshake (client name, token and channel subscriptions) travels as a
//! JSON document in the `cf_connect` query parameter of the stream url.

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::errors::{EncodingError, SigningError, SubscribeError};
use crate::protocol::{ConnectRequest, SubscribeRequest};
use crate::token;

/// Query parameter carrying the connect request.
pub const CONNECT_PARAM: &str = "cf_connect";

/// Builds the connect request for a single channel.
///
/// Recovery is never requested, so the channel entry always has
/// `recover: false`, an empty epoch and a zero offset.
pub fn connect_request(channel: &str, name: &str, token: &str) -> ConnectRequest {
    ConnectRequest {
        name: name.into(),
        token: token.into(),
        subs: HashMap::from([(channel.into(), SubscribeRequest::default())]),
    }
}

/// Appends the encoded connect request to `base_url`.
///
/// ```rust
/// use centrifuge_sse::client::handshake::build_url;
/// use url::Url;
///
/// let base = Url::parse("http://localhost:8000/connection/uni_sse").unwrap();
/// let url = build_url(&base, "news", "my-app", "").unwrap();
/// assert_eq!(url.query_pairs().count(), 1);
/// ```
pub fn build_url(
    base_url: &Url,
    channel: &str,
    name: &str,
    token: &str,
) -> Result<Url, EncodingError> {
    let request = connect_request(channel, name, token);
    let data = serde_json::to_string(&request)?;

    let mut url = base_url.clone();
    url.query_pairs_mut().append_pair(CONNECT_PARAM, &data);
    Ok(url)
}

/// Everything needed to (re)build the stream url of one subscription.
#[derive(Debug, Clone)]
pub(crate) struct Handshake {
    pub(crate) base_url: Url,
    pub(crate) channel: String,
    pub(crate) user: String,
    pub(crate) name: String,
    pub(crate) secret: Option<String>,
    pub(crate) token_ttl: Option<Duration>,
}

impl Handshake {
    /// Signs a fresh token, or returns an empty one without a secret.
    pub(crate) fn token(&self) -> Result<String, SigningError> {
        let Some(ref secret) = self.secret else {
            return Ok(String::new());
        };

        let expires_at = self.token_ttl.map(token::expires_in);
        token::sign(&self.channel, &self.user, secret, expires_at)
    }

    pub(crate) fn connect_url(&self) -> Result<Url, SubscribeError> {
        let token = self.token()?;
        let url = build_url(&self.base_url, &self.channel, &self.name, &token)?;
        Ok(url)
    }

    /// Whether tokens carry an expiry and must be signed again on reconnect.
    pub(crate) fn expires(&self) -> bool {
        self.secret.is_some() && self.token_ttl.is_some()
    }
}

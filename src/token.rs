//! Subscription token signing.
//!
//! Centrifugo accepts a connection token whose `subs` claim lists the
//! channels the connection is subscribed to on connect. Tokens are signed
//! with HS256 using the secret shared with the server.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::errors::SigningError;
use crate::protocol::SubscribeOptions;

/// Claims of a subscription token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User identifier
    pub sub: String,
    /// Server-side subscriptions keyed by channel
    pub subs: HashMap<String, SubscribeOptions>,
    /// Expiration time as unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl Claims {
    pub fn new(channel: &str, user: &str, expires_at: Option<u64>) -> Self {
        Claims {
            sub: user.into(),
            subs: HashMap::from([(channel.into(), SubscribeOptions::default())]),
            exp: expires_at.filter(|exp| *exp > 0),
        }
    }
}

/// Signs a token subscribing `user` to `channel`.
///
/// `expires_at` is a unix timestamp in seconds; `None` (or zero) produces a
/// token that never expires.
///
/// ```rust
/// use centrifuge_sse::token::sign;
///
/// let token = sign("news", "42", "secret", None).unwrap();
/// assert_eq!(token.split('.').count(), 3);
///
/// assert!(sign("news", "42", "", None).is_err());
/// ```
pub fn sign(
    channel: &str,
    user: &str,
    secret: &str,
    expires_at: Option<u64>,
) -> Result<String, SigningError> {
    if secret.is_empty() {
        return Err(SigningError::EmptySecret);
    }

    let claims = Claims::new(channel, user, expires_at);
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Unix timestamp `ttl` from now.
pub(crate) fn expires_in(ttl: Duration) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now + ttl).as_secs()
}

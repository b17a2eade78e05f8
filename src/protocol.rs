//! # Protocol Module
//!
//! Wire types exchanged with Centrifugo: the uni-directional connect
//! request, the `subs` claim of subscription tokens, the server API
//! envelopes and the publication envelope carried by stream events.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::LogicError;

/// Connect request sent in the `cf_connect` query parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub name: String,
    pub token: String,
    pub subs: HashMap<String, SubscribeRequest>,
}

/// Per-channel part of the connect request.
///
/// This client never recovers stream positions, so every request it builds
/// is the default value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Whether the client wants to recover from a known position
    pub recover: bool,
    /// Known stream position epoch
    pub epoch: String,
    /// Known stream position offset
    pub offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolValue {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub value: bool,
}

/// Channel option overrides granted by a subscription token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeOptionOverride {
    /// Participate in channel presence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<BoolValue>,
    /// Send join and leave messages for this client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_leave: Option<BoolValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_push_join_leave: Option<BoolValue>,
    /// Include stream position in the subscribe reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_positioning: Option<BoolValue>,
    /// Recover missed publications on resubscribe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_recovery: Option<BoolValue>,
}

/// Value of one channel entry in the token's `subs` claim.
///
/// Tokens issued by this crate carry the default (empty) options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeOptions {
    /// Custom channel information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Value>,
    #[serde(default, rename = "b64info", skip_serializing_if = "String::is_empty")]
    pub base64_info: String,
    /// Data sent to the client with the subscribe push
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, rename = "b64data", skip_serializing_if = "String::is_empty")]
    pub base64_data: String,
    #[serde(default, rename = "override", skip_serializing_if = "Option::is_none")]
    pub override_: Option<SubscribeOptionOverride>,
}

/// Envelope of every server API call.
#[derive(Debug, Clone, Serialize)]
pub struct ApiRequest<'a, P> {
    pub method: ApiMethod,
    pub params: &'a P,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiMethod {
    Publish,
    Presence,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishParams<'a, T> {
    pub channel: &'a str,
    pub data: &'a T,
    pub skip_history: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PresenceParams<'a> {
    pub channel: &'a str,
}

/// Response envelope of every server API call.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<R> {
    #[serde(default)]
    pub error: Option<LogicError>,
    pub result: Option<R>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PublishResult {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub epoch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PresenceResult {
    #[serde(default)]
    pub presence: HashMap<String, PresenceItem>,
}

/// One connection in a channel's presence set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceItem {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub user: String,
}

/// Payload of a publication event on the uni-SSE transport.
///
/// ```rust
/// use centrifuge_sse::protocol::EventData;
///
/// let data: EventData = serde_json::from_str(
///     r#"{"channel":"news","pub":{"data":{"number":1}}}"#,
/// ).unwrap();
/// assert_eq!(data.channel, "news");
/// assert_eq!(data.publication.unwrap().data["number"], 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub channel: String,
    #[serde(default, rename = "pub")]
    pub publication: Option<Publication>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Publication {
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub offset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Offset {
        offset: u64,
    }

    #[test]
    fn test_api_response_without_default_result() {
        let response: ApiResponse<Offset> = serde_json::from_str(r#"{"result":{"offset":3}}"#).unwrap();
        assert_eq!(response.result, Some(Offset { offset: 3 }));
        assert!(response.error.is_none());

        let response: ApiResponse<Offset> =
            serde_json::from_str(r#"{"error":{"code":102,"message":"unknown channel"}}"#).unwrap();
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, 102);
    }

    #[test]
    fn test_api_request_envelope() {
        let params = PresenceParams { channel: "news" };
        let request = ApiRequest {
            method: ApiMethod::Presence,
            params: &params,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"method": "presence", "params": {"channel": "news"}})
        );
    }
}

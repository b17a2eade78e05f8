//! Centrifugo server HTTP API client.
//!
//! Only the two calls this crate needs are covered: publishing into a
//! channel and querying a channel's presence. Every call is a single
//! POST with no retries.

use std::collections::HashMap;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::ApiError;
use crate::protocol::{
    ApiMethod, ApiRequest, ApiResponse, PresenceItem, PresenceParams, PresenceResult,
    PublishParams, PublishResult,
};

/// Server API client.
///
/// # Example
///
/// ```rust,no_run
/// use centrifuge_sse::api::ApiClient;
///
/// # async fn example() -> Result<(), centrifuge_sse::errors::ApiError> {
/// let api = ApiClient::new("http://localhost:8000/api").with_api_key("api-key");
///
/// api.publish("news", &serde_json::json!({"text": "hello"}), false).await?;
/// let presence = api.get_online_presence("news").await?;
/// println!("{} connections", presence.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    log_target: String,
}

impl ApiClient {
    pub fn new(url: impl Into<String>) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            url: url.into(),
            api_key: None,
            log_target: String::from(env!("CARGO_CRATE_NAME")),
        }
    }

    /// Sets the key sent as `Authorization: apikey <key>`.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Uses an existing HTTP client instead of a default one.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    /// Publishes `data` into `channel`.
    ///
    /// With `skip_history` the publication is not saved to the channel's
    /// history stream.
    pub async fn publish<T: Serialize>(
        &self,
        channel: &str,
        data: &T,
        skip_history: bool,
    ) -> Result<PublishResult, ApiError> {
        let params = PublishParams {
            channel,
            data,
            skip_history,
        };
        let result: Option<PublishResult> = self.call(ApiMethod::Publish, &params).await?;
        Ok(result.unwrap_or_default())
    }

    /// Returns the connections currently subscribed to `channel`, keyed by
    /// client id.
    ///
    /// Presence has to be enabled for the channel namespace on the server.
    pub async fn get_online_presence(
        &self,
        channel: &str,
    ) -> Result<HashMap<String, PresenceItem>, ApiError> {
        let params = PresenceParams { channel };
        let result: Option<PresenceResult> = self.call(ApiMethod::Presence, &params).await?;
        Ok(result.map(|result| result.presence).unwrap_or_default())
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: ApiMethod,
        params: &P,
    ) -> Result<Option<R>, ApiError> {
        let body = serde_json::to_vec(&ApiRequest { method, params }).map_err(ApiError::Encode)?;
        log::trace!(
            target: self.log_target.as_str(),
            "--> {}",
            String::from_utf8_lossy(&body)
        );

        let mut request = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(ref api_key) = self.api_key {
            request = request.header(AUTHORIZATION, format!("apikey {}", api_key));
        }

        let request_error = |source| ApiError::Request {
            url: self.url.clone(),
            source,
        };
        let response = request.send().await.map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            log::debug!(target: self.log_target.as_str(), "unexpected status: {}", status);
            return Err(ApiError::BadStatus {
                code: status.as_u16(),
                status: status.to_string(),
            });
        }

        let data = response.bytes().await.map_err(request_error)?;
        log::trace!(
            target: self.log_target.as_str(),
            "<-- {}",
            String::from_utf8_lossy(&data)
        );

        let response: ApiResponse<R> = serde_json::from_slice(&data).map_err(ApiError::Decode)?;
        if let Some(err) = response.error {
            if err.code != 0 {
                return Err(err.into());
            }
        }
        Ok(response.result)
    }
}

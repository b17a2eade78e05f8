//! Connection management and reconnection logic.
//!
//! This module opens the HTTP event stream on a dedicated transport and
//! waits out reconnect delays. Both suspension points are abandoned as soon
//! as the subscription is cancelled.

use std::time::Duration;

use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{CONNECT_TIMEOUT, KEEP_ALIVE};
use crate::errors::TransportError;

/// Opens event streams and implements reconnect delays.
pub(crate) struct ConnectionManager;

impl ConnectionManager {
    /// Builds the transport used for event streams.
    ///
    /// The connect timeout covers both the TCP connect and the TLS handshake.
    /// No request timeout is set, it would also bound the stream body.
    pub(crate) fn http_client() -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(KEEP_ALIVE)
            .build()
    }

    /// Sends the stream request and checks the response status.
    ///
    /// Returns `None` if interrupted by cancellation.
    pub(crate) async fn do_connect(
        http: &reqwest::Client,
        url: &Url,
        cancel: &CancellationToken,
        log_target: &str,
    ) -> Option<Result<reqwest::Response, TransportError>> {
        let task = async {
            log::debug!(target: log_target, "connecting to {}", url.as_str());
            let response = http
                .get(url.clone())
                .header(ACCEPT, "text/event-stream")
                .header(CACHE_CONTROL, "no-cache")
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                log::debug!(target: log_target, "unexpected status: {}", status);
                return Err(TransportError::BadStatus(status.as_u16()));
            }
            Ok::<_, TransportError>(response)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!(target: log_target, "connect interrupted by user");
                None
            }
            result = task => Some(result)
        }
    }

    /// Sleeps for `delay`. Returns `false` if interrupted by cancellation.
    pub(crate) async fn do_delay(
        delay: Duration,
        cancel: &CancellationToken,
        log_target: &str,
    ) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!(target: log_target, "reconnect interrupted by user");
                false
            }
            _ = tokio::time::sleep(delay) => true
        }
    }
}

//! Background task driving one subscription.
//!
//! The task owns the connection exclusively. It opens the event stream,
//! decodes events into the bounded queue shared with the consumer, and
//! reconnects after any transport failure until cancelled.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ReconnectStrategy;
use crate::errors::TransportError;
use crate::events::Event;
use crate::utils::EventDecoder;

use super::connection::ConnectionManager;
use super::handshake::Handshake;
use super::types::State;

pub(crate) type ConnectCallback = Box<dyn FnMut() + Send + 'static>;
pub(crate) type ReconnectCallback = Box<dyn FnMut(&TransportError, Duration) + Send + 'static>;

/// How a live connection ended.
enum ReadOutcome {
    /// Transport failure, reconnect
    Lost(TransportError),
    /// Cancelled or the consumer went away
    Interrupted,
}

pub(crate) struct ClientInner {
    /// Transport dedicated to this subscription
    pub(crate) http: reqwest::Client,
    pub(crate) handshake: Handshake,
    pub(crate) state: State,
    pub(crate) max_buffer_size: usize,
    pub(crate) reconnect_strategy: Box<dyn ReconnectStrategy>,
    pub(crate) log_target: String,
    pub(crate) on_connected: Option<ConnectCallback>,
    pub(crate) on_disconnected: Option<ConnectCallback>,
    pub(crate) on_reconnect: Option<ReconnectCallback>,
}

impl ClientInner {
    /// Runs the connection cycle until `cancel` fires.
    ///
    /// `url` is the handshake url built by `subscribe`; it is rebuilt before
    /// reconnect attempts only when tokens expire.
    pub(crate) async fn run(
        mut self,
        mut url: Url,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) {
        loop {
            self.set_state(State::Connecting);

            let Some(result) =
                ConnectionManager::do_connect(&self.http, &url, &cancel, &self.log_target).await
            else {
                break;
            };

            let err = match result {
                Ok(response) => {
                    self.reconnect_strategy.reset();
                    self.set_state(State::Connected);
                    let outcome = self.do_read(response, &events, &cancel).await;
                    self.set_state(State::Disconnected);
                    match outcome {
                        ReadOutcome::Lost(err) => err,
                        ReadOutcome::Interrupted => break,
                    }
                }
                Err(err) => err,
            };

            let delay = self.reconnect_strategy.next_delay();
            self.notify_reconnect(&err, delay);
            if !ConnectionManager::do_delay(delay, &cancel, &self.log_target).await {
                break;
            }

            if self.handshake.expires() {
                match self.handshake.connect_url() {
                    Ok(fresh) => url = fresh,
                    Err(err) => {
                        log::warn!(target: self.log_target.as_str(), "failed to refresh token: {}", err);
                    }
                }
            }
        }

        self.set_state(State::Closed);
    }

    /// Reads events from an open stream into the consumer queue.
    ///
    /// A full queue suspends reading until the consumer catches up.
    async fn do_read(
        &mut self,
        response: reqwest::Response,
        events: &mpsc::Sender<Event>,
        cancel: &CancellationToken,
    ) -> ReadOutcome {
        let mut body = std::pin::pin!(response.bytes_stream());
        let mut decoder = EventDecoder::new(self.max_buffer_size, &self.log_target);

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return ReadOutcome::Interrupted,
                chunk = body.next() => chunk,
            };

            let chunk = match chunk {
                Some(Ok(chunk)) => chunk,
                Some(Err(err)) => {
                    log::debug!(target: self.log_target.as_str(), "failed to read stream: {}", err);
                    return ReadOutcome::Lost(err.into());
                }
                None => return ReadOutcome::Lost(TransportError::Closed),
            };

            let fed = decoder.feed(&chunk);

            while let Some(event) = decoder.next_event() {
                log::trace!(target: self.log_target.as_str(), "<-- {:?}", event);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return ReadOutcome::Interrupted,
                    result = events.send(event) => {
                        if result.is_err() {
                            return ReadOutcome::Interrupted;
                        }
                    }
                }
            }

            if let Err(err) = fed {
                return ReadOutcome::Lost(err);
            }
        }
    }

    fn notify_reconnect(&mut self, err: &TransportError, delay: Duration) {
        match self.on_reconnect {
            Some(ref mut on_reconnect) => on_reconnect(err, delay),
            None => {
                log::info!(
                    target: self.log_target.as_str(),
                    "reconnecting after {:?} due to error: {}",
                    delay,
                    err
                );
            }
        }
    }

    fn set_state(&mut self, state: State) {
        if self.state == state {
            return;
        }
        log::debug!(target: self.log_target.as_str(), "state: {:?} -> {:?}", self.state, state);
        self.state = state;

        match state {
            State::Connected => match self.on_connected {
                Some(ref mut on_connected) => on_connected(),
                None => log::info!(target: self.log_target.as_str(), "connected to server"),
            },
            State::Disconnected => match self.on_disconnected {
                Some(ref mut on_disconnected) => on_disconnected(),
                None => log::info!(target: self.log_target.as_str(), "disconnected from server"),
            },
            State::Idle | State::Connecting | State::Closed => {}
        }
    }
}

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::Event;

/// Ordered stream of events of one subscription.
///
/// Events are yielded in the order they were read from the connection.
/// The queue behind the stream is bounded; while it is full the
/// connection is not read. After a reconnect events may be missing or
/// repeated, there is no recovery of missed publications.
///
/// Once the subscription is cancelled, through the token given to
/// `Client::subscribe`, [`EventStream::cancel`] or by dropping the
/// stream, no further events are yielded.
#[derive(Debug)]
pub struct EventStream {
    events: mpsc::Receiver<Event>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    log_target: String,
}

impl EventStream {
    pub(crate) fn new(
        events: mpsc::Receiver<Event>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
        log_target: String,
    ) -> Self {
        EventStream {
            events,
            cancel,
            task: Some(task),
            log_target,
        }
    }

    /// Receives the next event.
    ///
    /// Returns `None` once the subscription is cancelled.
    pub async fn recv(&mut self) -> Option<Event> {
        if self.cancel.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Cancels the subscription without waiting for the connection to close.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels the subscription and waits until its background task has
    /// released the connection.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log::debug!(
                    target: self.log_target.as_str(),
                    "subscription task failed: {:?}",
                    err
                );
            }
        }
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        // the task drops its sender on cancellation, which wakes us
        self.events.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

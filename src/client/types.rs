//! Client types and state management.

/// Lifecycle state of a subscription's connection.
///
/// `Idle -> Connecting -> Connected -> (Disconnected -> Connecting)* -> Closed`
///
/// Transport failures always lead back to `Connecting`; `Closed` is only
/// reached when the subscription is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Subscription created, no connection attempted yet
    Idle,
    /// Opening the event stream
    Connecting,
    /// Event stream is open and being read
    Connected,
    /// Event stream was lost, waiting before the next attempt
    Disconnected,
    /// Subscription was cancelled
    Closed,
}

//! Channel lifecycle as a pure state machine.
//!
//! [`transition`] maps `(state, event)` to the next state plus the effects the
//! channel manager has to carry out. It never touches a socket or a timer, so
//! every edge is unit-testable.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    ClosedPendingRetry,
    /// Terminal, entered only through an explicit shutdown
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::ClosedPendingRetry => "closed_pending_retry",
            ChannelState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Caller asked for a connection
    Connect,
    /// Transport handshake completed
    Established,
    /// Transport closed or failed, for any reason
    Dropped,
    /// Reconnect delay elapsed
    RetryElapsed,
    /// Caller tore the channel down
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    OpenTransport,
    ReleaseTransport,
    ScheduleRetry,
    CancelRetry,
}

pub fn transition(state: ChannelState, event: ChannelEvent) -> (ChannelState, Vec<Effect>) {
    use ChannelEvent as E;
    use ChannelState as S;

    match (state, event) {
        (S::Closed, _) => (S::Closed, vec![]),

        (S::Idle, E::Connect) => (S::Connecting, vec![Effect::OpenTransport]),
        (S::Connecting, E::Established) => (S::Open, vec![]),
        (S::Connecting, E::Dropped) => (S::ClosedPendingRetry, vec![Effect::ScheduleRetry]),
        (S::Open, E::Dropped) => (
            S::ClosedPendingRetry,
            vec![Effect::ReleaseTransport, Effect::ScheduleRetry],
        ),
        (S::ClosedPendingRetry, E::RetryElapsed) => (S::Connecting, vec![Effect::OpenTransport]),

        (S::Idle, E::Shutdown) => (S::Closed, vec![]),
        (S::Connecting | S::Open, E::Shutdown) => (S::Closed, vec![Effect::ReleaseTransport]),
        (S::ClosedPendingRetry, E::Shutdown) => (S::Closed, vec![Effect::CancelRetry]),

        // Stale or redundant events leave the machine where it is
        (state, _) => (state, vec![]),
    }
}

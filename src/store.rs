use crate::error::{AppError, Result};
use crate::snapshot::{SystemSnapshot, RELAY_COUNT};
use crate::ws::protocol::ClientCommand;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Where relay commands go. Implemented by the channel manager; `is_open`
/// is asked explicitly so the store never guesses at connectivity.
pub trait CommandSink {
    fn is_open(&self) -> bool;

    fn send(&self, command: &ClientCommand) -> Result<()>;
}

/// How a relay request was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayDispatch {
    /// Sent to the server; the next inbound snapshot carries the result
    Sent,
    /// Channel unavailable; applied to the local snapshot until the server overwrites it
    AppliedLocally,
}

/// Holder of the currently displayed snapshot.
///
/// Every update replaces the held `Arc<SystemSnapshot>` wholesale, so a
/// reader keeps a consistent snapshot for as long as it holds the `Arc`.
#[derive(Clone)]
pub struct TelemetryStore {
    current: Arc<watch::Sender<Arc<SystemSnapshot>>>,
    last_update: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryStore {
    pub fn new() -> Self {
        let (current, _) = watch::channel(Arc::new(SystemSnapshot::default()));
        Self {
            current: Arc::new(current),
            last_update: Arc::new(Mutex::new(None)),
        }
    }

    pub fn current(&self) -> Arc<SystemSnapshot> {
        self.current.borrow().clone()
    }

    /// Receiver notified after every replacement
    pub fn subscribe(&self) -> watch::Receiver<Arc<SystemSnapshot>> {
        self.current.subscribe()
    }

    /// Time of the most recent replacement, inbound or local
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adopt an authoritative snapshot; last write wins
    pub fn apply_inbound(&self, snapshot: Arc<SystemSnapshot>) {
        debug!(
            pole_connected = snapshot.pole.connected,
            house_connected = snapshot.house.connected,
            risk_score = snapshot.alerts.risk_score,
            "Applying inbound snapshot"
        );
        self.current.send_replace(snapshot);
        self.touch();
    }

    /// Ask for relay `index` to be switched to `desired`.
    ///
    /// With the channel open the command goes to the server and the held
    /// snapshot is left alone. Otherwise, or if the send fails, a copy of the
    /// current snapshot with the relay flipped becomes current.
    pub fn request_relay_change<S>(&self, index: usize, desired: bool, sink: &S) -> Result<RelayDispatch>
    where
        S: CommandSink + ?Sized,
    {
        let command = ClientCommand::set_relay(index, desired)?;

        if sink.is_open() {
            match sink.send(&command) {
                Ok(()) => {
                    info!(relay = index, state = desired, "Relay change sent");
                    return Ok(RelayDispatch::Sent);
                }
                Err(e) => {
                    warn!(relay = index, error = %e, "Relay send failed, applying locally");
                }
            }
        }

        self.apply_local_relay(index, desired)?;
        info!(relay = index, state = desired, "Relay change applied locally");
        Ok(RelayDispatch::AppliedLocally)
    }

    fn apply_local_relay(&self, index: usize, desired: bool) -> Result<()> {
        if index >= RELAY_COUNT {
            return Err(AppError::InvalidRelay(index));
        }

        let mut outcome = Ok(());
        self.current.send_modify(|current| match current.with_relay(index, desired) {
            Ok(next) => *current = Arc::new(next),
            Err(e) => outcome = Err(e),
        });
        outcome?;
        self.touch();
        Ok(())
    }

    fn touch(&self) {
        *self.last_update.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }
}

use crate::config::ChannelConfig;
use crate::error::{AppError, Result};
use crate::snapshot::SystemSnapshot;
use crate::store::CommandSink;
use crate::ws::protocol::{decode_frame, ClientCommand, ServerMessage};
use crate::ws::state::{transition, ChannelEvent, ChannelState, Effect};
use crate::ws::transport::{Connection, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

pub type SnapshotHandler = Box<dyn Fn(Arc<SystemSnapshot>) + Send + Sync>;

/// Owns the single duplex channel to the monitoring endpoint.
///
/// `connect` spawns a driver task that walks the lifecycle state machine:
/// it opens the transport, decodes inbound frames into snapshots for the
/// registered handlers, and reconnects after a fixed delay whenever the
/// transport drops. `close` (also run on drop) aborts the driver, which
/// cancels any pending reconnect.
pub struct ChannelManager<T: Transport> {
    inner: Arc<Inner<T>>,
    outbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

struct Inner<T: Transport> {
    url: String,
    reconnect_delay: Duration,
    transport: T,
    state: watch::Sender<ChannelState>,
    handlers: Mutex<Vec<SnapshotHandler>>,
}

impl<T: Transport> ChannelManager<T> {
    pub fn new(transport: T, url: impl Into<String>, reconnect_delay: Duration) -> Self {
        let (state, _) = watch::channel(ChannelState::Idle);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                reconnect_delay,
                transport,
                state,
                handlers: Mutex::new(Vec::new()),
            }),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            driver: Mutex::new(None),
        }
    }

    pub fn from_config(transport: T, config: &ChannelConfig) -> Self {
        Self::new(transport, config.url.clone(), config.reconnect_delay())
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    /// Lifecycle subscription; the receiver sees every state change
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    /// Register a handler called once per decoded inbound snapshot
    pub fn on_snapshot<F>(&self, handler: F)
    where
        F: Fn(Arc<SystemSnapshot>) + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Open the channel unless one is already open, connecting or scheduled.
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let effects = self.inner.dispatch(ChannelEvent::Connect);
        if !effects.contains(&Effect::OpenTransport) {
            match self.state() {
                ChannelState::Closed => warn!("Ignoring connect on a closed channel"),
                state => debug!(%state, "Channel already active"),
            }
            return;
        }

        let Some(outbound_rx) = self
            .outbound_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            warn!("Channel driver already started");
            return;
        };

        let handle = tokio::spawn(drive(self.inner.clone(), outbound_rx));
        *self.driver.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Fire-and-forget a command. Fails with [`AppError::ChannelNotOpen`]
    /// instead of queueing when the channel is not open.
    pub fn send(&self, command: &ClientCommand) -> Result<()> {
        if self.state() != ChannelState::Open {
            return Err(AppError::ChannelNotOpen);
        }

        let frame = command.to_frame()?;
        self.outbound_tx
            .send(frame)
            .map_err(|_| AppError::ChannelNotOpen)?;
        debug!(?command, "Command dispatched");
        Ok(())
    }

    /// Tear the channel down and cancel any pending reconnect. Safe to call in any state.
    pub fn close(&self) {
        let effects = self.inner.dispatch(ChannelEvent::Shutdown);

        if let Some(driver) = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            driver.abort();
        }

        if !effects.is_empty() {
            info!(?effects, "Channel closed");
        }
    }
}

impl<T: Transport> Drop for ChannelManager<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport> CommandSink for ChannelManager<T> {
    fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    fn send(&self, command: &ClientCommand) -> Result<()> {
        ChannelManager::send(self, command)
    }
}

impl<T: Transport> Inner<T> {
    /// Feed one event through the state machine and publish the new state
    fn dispatch(&self, event: ChannelEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.state.send_if_modified(|state| {
            let (next, fx) = transition(*state, event);
            effects = fx;
            if next == *state {
                return false;
            }
            debug!(from = %state, to = %next, ?event, "Channel transition");
            *state = next;
            true
        });
        effects
    }

    async fn open_transport(&self, outbound_rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Effect> {
        let session = Uuid::new_v4();
        info!(%session, url = %self.url, "Connecting");

        let mut conn = match self.transport.connect(&self.url).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(
                    %session,
                    error = %e,
                    retry_ms = self.reconnect_delay.as_millis() as u64,
                    "Connection attempt failed"
                );
                return self.dispatch(ChannelEvent::Dropped);
            }
        };

        // Commands accepted while the previous session was open but never
        // written must not replay onto this one
        let mut stale = 0usize;
        while outbound_rx.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!(%session, stale, "Discarded unsent commands from previous session");
        }

        let effects = self.dispatch(ChannelEvent::Established);
        if *self.state.borrow() != ChannelState::Open {
            return effects;
        }
        info!(%session, "Channel open");

        let reason = self.run_session(&mut conn, outbound_rx).await;
        drop(conn);
        warn!(
            %session,
            %reason,
            retry_ms = self.reconnect_delay.as_millis() as u64,
            "Channel lost"
        );

        self.dispatch(ChannelEvent::Dropped)
    }

    /// Pump frames in both directions until the transport ends
    async fn run_session(
        &self,
        conn: &mut T::Conn,
        outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> String {
        loop {
            tokio::select! {
                frame = conn.recv() => match frame {
                    Some(Ok(text)) => self.deliver(&text),
                    Some(Err(e)) => return e.to_string(),
                    None => return "closed by peer".to_string(),
                },
                Some(frame) = outbound_rx.recv() => {
                    if let Err(e) = conn.send(frame).await {
                        return e.to_string();
                    }
                }
            }
        }
    }

    fn deliver(&self, text: &str) {
        match decode_frame(text) {
            Ok(ServerMessage::Update { data }) => {
                let snapshot = Arc::new(data);
                let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
                for handler in handlers.iter() {
                    handler(snapshot.clone());
                }
            }
            Err(AppError::UnexpectedFrame(kind)) => {
                debug!(frame_type = %kind, "Ignoring non-update frame");
            }
            Err(e) => {
                warn!(error = %e, "Dropping undecodable frame");
            }
        }
    }
}

/// Effect interpreter for the channel state machine. Runs until the machine
/// stops producing effects, which only happens after shutdown.
async fn drive<T: Transport>(
    inner: Arc<Inner<T>>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
) {
    let mut pending = VecDeque::from([Effect::OpenTransport]);

    while let Some(effect) = pending.pop_front() {
        let next = match effect {
            Effect::OpenTransport => inner.open_transport(&mut outbound_rx).await,
            Effect::ScheduleRetry => {
                tokio::time::sleep(inner.reconnect_delay).await;
                inner.dispatch(ChannelEvent::RetryElapsed)
            }
            // The connection is dropped when its session ends and the retry
            // timer lives on this task, so both are released by the caller
            // aborting the driver.
            Effect::ReleaseTransport | Effect::CancelRetry => Vec::new(),
        };
        pending.extend(next);
    }

    debug!("Channel driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RefusingTransport;

    struct NeverConn;

    impl Connection for NeverConn {
        async fn recv(&mut self) -> Option<Result<String>> {
            None
        }

        async fn send(&mut self, _text: String) -> Result<()> {
            Ok(())
        }
    }

    impl Transport for RefusingTransport {
        type Conn = NeverConn;

        async fn connect(&self, _url: &str) -> Result<NeverConn> {
            Err(AppError::WebSocket("connection refused".to_string()))
        }
    }

    fn manager() -> ChannelManager<RefusingTransport> {
        ChannelManager::new(RefusingTransport, "ws://localhost:1/ws/client", DEFAULT_RECONNECT_DELAY)
    }

    #[test]
    fn test_new_manager_is_idle() {
        let channel = manager();
        assert_eq!(channel.state(), ChannelState::Idle);
        assert_eq!(channel.url(), "ws://localhost:1/ws/client");
    }

    #[test]
    fn test_send_fails_when_not_open() {
        let channel = manager();
        let command = ClientCommand::set_relay(0, true).unwrap();

        assert!(matches!(channel.send(&command), Err(AppError::ChannelNotOpen)));
    }

    #[test]
    fn test_close_before_connect_is_terminal() {
        let channel = manager();
        channel.close();
        assert_eq!(channel.state(), ChannelState::Closed);

        // No runtime needed: connect on a closed channel never spawns
        channel.connect();
        assert_eq!(channel.state(), ChannelState::Closed);
    }

    #[test]
    fn test_deliver_invokes_handlers_once_per_snapshot() {
        let channel = manager();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        channel.on_snapshot(move |snapshot| sink.lock().unwrap().push(snapshot.alerts.risk_score));

        channel.inner.deliver(r#"{"type":"update","data":{"alerts":{"risk_score":0.5}}}"#);
        channel.inner.deliver("garbage");
        channel.inner.deliver(r#"{"type":"hello"}"#);
        channel.inner.deliver(r#"{"type":"update","data":{"alerts":{"risk_score":0.25}}}"#);

        assert_eq!(*seen.lock().unwrap(), vec![0.5, 0.25]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connection_schedules_retry() {
        let channel = manager();
        let mut states = channel.state_changes();

        channel.connect();
        states
            .wait_for(|s| *s == ChannelState::ClosedPendingRetry)
            .await
            .unwrap();

        channel.close();
        assert_eq!(channel.state(), ChannelState::Closed);
    }
}

use std::{future::Future, time::Duration};

use anyhow::Result;
use tokio::{sync::watch, time::sleep};
use tracing::{debug, info, warn};

use crate::events::Platform;

/// Fixed wait between reconnect attempts. No backoff and no retry
/// cap: the overlay is an unattended broadcast display, so giving up
/// is worse than retrying forever.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closed,
}

/// Per-adapter connection bookkeeping, owned by the supervisor loop.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub retry_count: u32,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            retry_count: 0,
        }
    }

    pub fn begin_attempt(&mut self) {
        self.status = ConnectionStatus::Connecting;
    }

    pub fn mark_open(&mut self) {
        self.status = ConnectionStatus::Open;
    }

    pub fn attempt_closed(&mut self) {
        self.status = ConnectionStatus::Closed;
        self.retry_count += 1;
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps one adapter: `connect` performs the handshake and yields the
/// session future, which runs until the connection dies. After every
/// closure the adapter is recreated from scratch (fresh socket, fresh
/// handshake) after a fixed delay; no in-flight state survives a
/// reconnect. The session-level `shutdown` signal is the only exit
/// and is observed at every suspension point, so teardown cancels an
/// in-flight session and abandons the retry sleep.
pub async fn supervise<C, F, S>(
    platform: Platform,
    mut shutdown: watch::Receiver<bool>,
    mut connect: C,
) where
    C: FnMut() -> F,
    F: Future<Output = Result<S>>,
    S: Future<Output = Result<()>>,
{
    let mut state = ConnectionState::new();
    loop {
        if *shutdown.borrow() {
            break;
        }
        state.begin_attempt();
        debug!(
            adapter = platform.label(),
            status = ?state.status,
            attempt = state.retry_count + 1,
            "connecting"
        );
        tokio::select! {
            _ = shutdown.changed() => break,
            connected = connect() => match connected {
                Ok(session) => {
                    state.mark_open();
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        result = session => {
                            state.attempt_closed();
                            match result {
                                Ok(()) => info!(
                                    adapter = platform.label(),
                                    attempts = state.retry_count,
                                    "connection closed, reconnecting"
                                ),
                                Err(err) => warn!(
                                    ?err,
                                    adapter = platform.label(),
                                    attempts = state.retry_count,
                                    "connection dropped, reconnecting"
                                ),
                            }
                        }
                    }
                }
                Err(err) => {
                    state.attempt_closed();
                    warn!(
                        ?err,
                        adapter = platform.label(),
                        attempts = state.retry_count,
                        "connection attempt failed, retrying"
                    );
                }
            }
        }
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(RECONNECT_DELAY) => {}
        }
    }
    info!(adapter = platform.label(), "supervisor stopped");
}

#[cfg(test)]
mod tests {
    use std::future::{ready, Ready};
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };
    use std::time::Duration;

    use tokio::sync::watch;

    use super::{supervise, ConnectionState, ConnectionStatus};
    use crate::events::Platform;

    type ReadySession = Ready<anyhow::Result<()>>;

    fn refused() -> anyhow::Result<ReadySession> {
        Err(anyhow::anyhow!("connection refused"))
    }

    #[test]
    fn connection_state_tracks_attempts() {
        let mut state = ConnectionState::new();
        assert_eq!(state.status, ConnectionStatus::Connecting);
        assert_eq!(state.retry_count, 0);
        state.mark_open();
        assert_eq!(state.status, ConnectionStatus::Open);
        state.attempt_closed();
        assert_eq!(state.status, ConnectionStatus::Closed);
        assert_eq!(state.retry_count, 1);
        state.begin_attempt();
        assert_eq!(state.status, ConnectionStatus::Connecting);
        assert_eq!(state.retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_each_closure_after_fixed_delay() {
        let attempts = Arc::new(AtomicU32::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counter = attempts.clone();
        let handle = tokio::spawn(supervise(Platform::Kick, shutdown_rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                refused()
            }
        }));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        // Three more closures -> three more attempts, 5s apart.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 5);

        shutdown_tx.send(true).expect("supervisor should be alive");
        handle.await.expect("supervisor task should finish");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_reconnection() {
        let attempts = Arc::new(AtomicU32::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counter = attempts.clone();
        let handle = tokio::spawn(supervise(Platform::Twitch, shutdown_rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(ready(Ok(())))
            }
        }));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        shutdown_tx.send(true).expect("supervisor should be alive");
        handle.await.expect("supervisor task should finish");

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_inflight_session() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(supervise(Platform::Twitch, shutdown_rx, || async {
            Ok(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
        }));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).expect("supervisor should be alive");
        handle.await.expect("supervisor task should finish");
    }
}

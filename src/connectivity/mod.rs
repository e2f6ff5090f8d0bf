//! Connectivity tracking with debounced online promotion.
//!
//! Offline reports are believed immediately; online only counts after
//! the link stays up through a short settle window, so a flapping radio
//! cannot trigger work that needs a real connection. A manual offline
//! override sits on top of whatever the system reports.

pub mod probe;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{info, warn};

pub use probe::ApiHealthProbe;

/// How long an online report must stand uncontradicted before the state
/// flips to online.
pub const ONLINE_SETTLE: Duration = Duration::from_millis(200);

/// One reading of the network, as a probe or the platform reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetSample {
    pub connected: bool,
    /// `None` when the platform cannot tell; treated as reachable.
    pub internet_reachable: Option<bool>,
}

impl NetSample {
    pub fn online(&self) -> bool {
        self.connected && self.internet_reachable.unwrap_or(true)
    }
}

/// Source of network samples.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn sample(&self) -> NetSample;
}

/// Combined connectivity state other components react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub sys_online: bool,
    pub override_offline: bool,
}

impl ConnectivityState {
    pub fn is_offline(&self) -> bool {
        self.override_offline || !self.sys_online
    }

    pub fn reason(&self) -> ConnectivityReason {
        if self.override_offline {
            ConnectivityReason::Override
        } else if self.sys_online {
            ConnectivityReason::Online
        } else {
            ConnectivityReason::NoInternet
        }
    }
}

impl Default for ConnectivityState {
    /// Optimistic until the first sample lands, so startup work is not
    /// held back on devices where the first reading arrives late.
    fn default() -> Self {
        Self {
            sys_online: true,
            override_offline: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityReason {
    Override,
    NoInternet,
    Online,
}

/// Message type for the connectivity monitor
#[derive(Debug)]
pub enum ConnectivityMessage {
    /// A fresh network reading
    Sample(NetSample),
    /// Manual offline toggle from settings
    SetOverride(bool),
    /// Shutdown the monitor
    Shutdown,
}

/// Handle to feed the monitor and read the current state
#[derive(Clone)]
pub struct ConnectivityHandle {
    tx: mpsc::Sender<ConnectivityMessage>,
    state: watch::Receiver<ConnectivityState>,
}

impl ConnectivityHandle {
    /// Push a network reading into the monitor.
    pub async fn report(&self, sample: NetSample) {
        if let Err(e) = self.tx.send(ConnectivityMessage::Sample(sample)).await {
            warn!("Failed to deliver network sample: {}", e);
        }
    }

    /// Flip the manual offline override. Applies without debounce.
    pub async fn set_override(&self, offline: bool) {
        if let Err(e) = self.tx.send(ConnectivityMessage::SetOverride(offline)).await {
            warn!("Failed to deliver override change: {}", e);
        }
    }

    /// Shutdown the monitor
    pub async fn shutdown(&self) {
        let _ = self.tx.send(ConnectivityMessage::Shutdown).await;
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    pub fn is_offline(&self) -> bool {
        self.state().is_offline()
    }

    /// Watch receiver for reacting to state transitions.
    pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.state.clone()
    }
}

/// Monitor service that folds samples and the override into one state.
pub struct ConnectivityMonitor {
    rx: mpsc::Receiver<ConnectivityMessage>,
    state_tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    pub fn new() -> (Self, ConnectivityHandle) {
        let (tx, rx) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(ConnectivityState::default());
        let handle = ConnectivityHandle {
            tx,
            state: state_rx,
        };
        (Self { rx, state_tx }, handle)
    }

    /// Run the monitor loop.
    ///
    /// Every sample cancels a pending online promotion; an offline
    /// sample applies at once, an online one re-arms the settle timer.
    pub async fn run(mut self) {
        info!("Connectivity monitor started");

        let mut pending_online: Option<Instant> = None;

        loop {
            let settle = async move {
                match pending_online {
                    Some(deadline) => time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(ConnectivityMessage::Sample(sample)) => {
                        pending_online = None;
                        if sample.online() {
                            pending_online = Some(Instant::now() + ONLINE_SETTLE);
                        } else {
                            self.set_sys_online(false);
                        }
                    }
                    Some(ConnectivityMessage::SetOverride(offline)) => {
                        self.set_override(offline);
                    }
                    Some(ConnectivityMessage::Shutdown) | None => {
                        info!("Connectivity monitor shutting down");
                        break;
                    }
                },
                _ = settle => {
                    pending_online = None;
                    self.set_sys_online(true);
                }
            }
        }
    }

    fn set_sys_online(&self, online: bool) {
        let current = *self.state_tx.borrow();
        if current.sys_online == online {
            return;
        }

        info!(
            "Connectivity changed: {}",
            if online { "online" } else { "offline" }
        );
        let mut next = current;
        next.sys_online = online;
        let _ = self.state_tx.send(next);
    }

    fn set_override(&self, offline: bool) {
        let current = *self.state_tx.borrow();
        if current.override_offline == offline {
            return;
        }

        info!("Offline override set to {}", offline);
        let mut next = current;
        next.override_offline = offline;
        let _ = self.state_tx.send(next);
    }
}

/// Spawn the monitor plus a polling loop feeding it probe samples.
pub fn spawn_connectivity_monitor(
    probe: Arc<dyn NetworkProbe>,
    poll_interval: Duration,
) -> (ConnectivityHandle, JoinHandle<()>) {
    let (monitor, handle) = ConnectivityMonitor::new();

    tokio::spawn(async move {
        monitor.run().await;
    });

    let probe_task = spawn_probe_loop(probe, handle.clone(), poll_interval);
    (handle, probe_task)
}

/// Poll the probe on an interval, starting with an immediate sample.
/// Exits once the monitor is gone.
pub fn spawn_probe_loop(
    probe: Arc<dyn NetworkProbe>,
    handle: ConnectivityHandle,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sample = probe.sample().await;
                    if handle
                        .tx
                        .send(ConnectivityMessage::Sample(sample))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                _ = handle.tx.closed() => break,
            }
        }
    })
}

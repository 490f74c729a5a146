//! Turns lifecycle signals into pending-action flags.
//!
//! `signal-hook` owns the actual signal handlers and only writes to its
//! self-pipe. The stream side runs as an ordinary task on the runtime and is
//! the sole writer of [`PendingActions`]; the controller is the sole reader.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::StreamExt;
use signal_hook::consts::signal::{SIGCHLD, SIGHUP, SIGINT, SIGTERM};
use signal_hook_tokio::{Handle, Signals};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::SetupError;

/// Signals the supervisor listens to.
pub const LIFECYCLE_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGHUP, SIGCHLD];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Terminate,
    Reload,
    ChildStateChanged,
}

impl Notification {
    pub fn from_signal(signal: i32) -> Option<Self> {
        match signal {
            SIGTERM | SIGINT => Some(Notification::Terminate),
            SIGHUP => Some(Notification::Reload),
            SIGCHLD => Some(Notification::ChildStateChanged),
            _ => None,
        }
    }
}

/// Sticky, coalescing flags shared between the bridge and the controller.
#[derive(Debug, Default)]
pub struct PendingActions {
    terminate: AtomicBool,
    restart: AtomicBool,
    reap: AtomicBool,
    wake: Notify,
}

impl PendingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a notification and wakes the controller if it is waiting.
    pub fn raise(&self, notification: Notification) {
        let flag = match notification {
            Notification::Terminate => &self.terminate,
            Notification::Reload => &self.restart,
            Notification::ChildStateChanged => &self.reap,
        };
        flag.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Terminate is never cleared: once requested the pool only winds down.
    pub fn terminate_requested(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    pub fn restart_requested(&self) -> bool {
        self.restart.load(Ordering::Acquire)
    }

    pub fn reap_requested(&self) -> bool {
        self.reap.load(Ordering::Acquire)
    }

    pub fn take_restart(&self) -> bool {
        self.restart.swap(false, Ordering::AcqRel)
    }

    pub fn take_reap(&self) -> bool {
        self.reap.swap(false, Ordering::AcqRel)
    }

    /// Completes after the next `raise`, or immediately if one happened since
    /// the last wake-up was consumed.
    pub async fn notified(&self) {
        self.wake.notified().await
    }
}

/// Running bridge; closing it stops signal delivery to the stream.
pub struct Bridge {
    handle: Handle,
    task: JoinHandle<()>,
}

impl Bridge {
    pub async fn close(self) {
        self.handle.close();
        let _ = self.task.await;
    }
}

/*
    @@@
    @install();
    . Registers SIGTERM, SIGINT, SIGHUP and SIGCHLD with signal-hook-tokio.
    . Spawns the task that maps each delivered signal to a flag on `pending`.
    . Must be called from inside the runtime.
*/
pub fn install(pending: Arc<PendingActions>) -> Result<Bridge, SetupError> {
    let signals = Signals::new(LIFECYCLE_SIGNALS).map_err(SetupError::Signals)?;
    let handle = signals.handle();
    let task = tokio::spawn(forward(signals, pending));
    info!("signal bridge installed");
    Ok(Bridge { handle, task })
}

async fn forward(mut signals: Signals, pending: Arc<PendingActions>) {
    while let Some(signal) = signals.next().await {
        if let Some(notification) = Notification::from_signal(signal) {
            debug!(signal, ?notification, "notification received");
            pending.raise(notification);
        }
    }
}

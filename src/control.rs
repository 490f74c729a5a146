use std::sync::Arc;
use std::time::Duration;

use nix::unistd::getpid;
use tracing::{debug, error, info, warn};

use crate::error::SetupError;
use crate::launcher::Launcher;
use crate::runtime::{Collected, ProcessControl, WorkerExit};
use crate::signals::PendingActions;
use crate::slots::SlotTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Running,
    Restarting,
    Stopping,
    Stopped,
}

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    Complete,
    /// A terminate request arrived while draining for a restart.
    Preempted,
}

/*
    @@@
    @Controller;
    . Owns the slot table, the launcher and the process control for one pool.
    . Reads the pending-action flags once per tick and moves between Running, Restarting and Stopping.
    . Only this type mutates the slot table.
*/
pub struct Controller<L, P> {
    slots: SlotTable,
    launcher: L,
    procs: P,
    pending: Arc<PendingActions>,
    tick: Duration,
    state: ControllerState,
}

impl<L: Launcher, P: ProcessControl> Controller<L, P> {
    pub fn new(
        workers: usize,
        launcher: L,
        procs: P,
        pending: Arc<PendingActions>,
        tick: Duration,
    ) -> Result<Self, SetupError> {
        Ok(Controller {
            slots: SlotTable::new(workers)?,
            launcher,
            procs,
            pending,
            tick,
            state: ControllerState::Running,
        })
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    /// Spawns the first N workers, then ticks until the pool is stopped.
    pub async fn run(mut self) {
        let started = self.start_workers().await;
        info!(
            pid = getpid().as_raw(),
            workers = self.slots.size(),
            started,
            "controller running"
        );
        while self.step().await != ControllerState::Stopped {}
    }

    /// Runs one tick of the state machine and returns the resulting state.
    pub async fn step(&mut self) -> ControllerState {
        match self.state {
            ControllerState::Running => self.tick_running().await,
            ControllerState::Restarting => self.restart().await,
            ControllerState::Stopping => self.shutdown().await,
            ControllerState::Stopped => {}
        }
        self.state
    }

    /// Fills every empty slot with a fresh worker. Returns how many started.
    pub async fn start_workers(&mut self) -> usize {
        let mut started = 0;
        for index in self.slots.empty_slots() {
            match self.launcher.spawn().await {
                Ok(id) => match self.slots.install(index, id) {
                    Ok(()) => {
                        info!(slot = index, pid = id.as_raw(), "spawned worker");
                        started += 1;
                    }
                    Err(e) => error!(slot = index, error = %e, "cannot track new worker"),
                },
                Err(e) => error!(slot = index, error = %e, "failed to spawn worker"),
            }
        }
        started
    }

    async fn tick_running(&mut self) {
        if self.pending.take_reap() {
            self.reap_nonblocking().await;
        }

        if self.pending.terminate_requested() {
            self.state = ControllerState::Stopping;
        } else if self.pending.take_restart() {
            self.state = ControllerState::Restarting;
        } else {
            self.idle().await;
        }
    }

    async fn restart(&mut self) {
        info!("restart requested: stopping workers");
        self.terminate_all();
        match self.drain(true).await {
            Drain::Complete if !self.pending.terminate_requested() => {
                info!("all workers stopped, restarting");
                let started = self.start_workers().await;
                info!(started, workers = self.slots.size(), "restart complete");
                self.state = ControllerState::Running;
            }
            Drain::Complete | Drain::Preempted => {
                warn!("termination requested during restart, abandoning restart");
                self.state = ControllerState::Stopping;
            }
        }
    }

    async fn shutdown(&mut self) {
        info!("termination requested: shutting down workers");
        self.terminate_all();
        self.drain(false).await;
        let released = self.slots.release();
        info!(slots = released, "all workers stopped, exiting");
        self.state = ControllerState::Stopped;
    }

    fn terminate_all(&mut self) {
        let occupied: Vec<_> = self.slots.occupied().collect();
        for (index, id) in occupied {
            info!(slot = index, pid = id.as_raw(), "sending SIGTERM");
            if let Err(e) = self.procs.terminate(id) {
                error!(slot = index, error = %e, "termination request failed");
            }
        }
    }

    /*
        @@@
        @reap_nonblocking();
        . Collects every child that has already terminated, without blocking.
        . Frees the dead worker's slot and, unless a restart or shutdown is pending, refills it.
        . A failed spawn leaves the slot empty; nothing retries it.
    */
    pub async fn reap_nonblocking(&mut self) -> usize {
        let mut reaped = 0;
        loop {
            match self.procs.try_collect() {
                Ok(Collected::Exited(exit)) => {
                    reaped += 1;
                    self.replace(exit).await;
                }
                Ok(Collected::Idle) | Ok(Collected::NoChildren) => break,
                Err(e) => {
                    error!(error = %e, "failed to collect terminated workers");
                    break;
                }
            }
        }
        reaped
    }

    async fn replace(&mut self, exit: WorkerExit) {
        let vacated = self.slots.vacate(exit.id);
        info!(
            pid = exit.id.as_raw(),
            slot = ?vacated,
            status = %exit.kind,
            "reaped worker"
        );

        if self.pending.terminate_requested() || self.pending.restart_requested() {
            return;
        }

        let Some(index) = vacated.or_else(|| self.slots.first_empty()) else {
            debug!(pid = exit.id.as_raw(), "untracked child exited, pool is full");
            return;
        };

        match self.launcher.spawn().await {
            Ok(id) => match self.slots.install(index, id) {
                Ok(()) => info!(slot = index, pid = id.as_raw(), "respawned worker"),
                Err(e) => error!(slot = index, error = %e, "cannot track respawned worker"),
            },
            Err(e) => error!(
                slot = index,
                dead = exit.id.as_raw(),
                error = %e,
                "failed to respawn worker, slot left empty"
            ),
        }
    }

    /*
        @@@
        @drain();
        . Collects every child of the process until none remain, clearing slots as it goes.
        . Sleeps between passes until a child exits, a notification arrives, or a tick elapses.
        . When `preemptible`, a terminate request ends the drain early so the caller can stop instead of restart.
        . There is no timeout: a worker that ignores SIGTERM keeps this waiting.
    */
    async fn drain(&mut self, preemptible: bool) -> Drain {
        loop {
            loop {
                match self.procs.try_collect() {
                    Ok(Collected::Exited(exit)) => {
                        let slot = self.slots.vacate(exit.id);
                        info!(pid = exit.id.as_raw(), slot = ?slot, status = %exit.kind, "reaped worker");
                    }
                    Ok(Collected::Idle) => break,
                    Ok(Collected::NoChildren) => return Drain::Complete,
                    Err(e) => {
                        error!(error = %e, "failed to collect workers while draining");
                        break;
                    }
                }
            }

            if preemptible && self.pending.terminate_requested() {
                return Drain::Preempted;
            }
            self.idle().await;
        }
    }

    async fn idle(&self) {
        tokio::select! {
            _ = self.pending.notified() => {}
            _ = tokio::time::sleep(self.tick) => {}
        }
    }
}

//! In-memory process table standing in for fork/kill/waitpid in tests.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::Signal;

use crate::error::{CollectionError, SpawnError, TerminateError};
use crate::launcher::Launcher;
use crate::runtime::{Collected, ExitKind, ProcessControl, WorkerExit};
use crate::slots::WorkerId;

#[derive(Debug, Default)]
struct Kernel {
    next_pid: i32,
    alive: BTreeSet<WorkerId>,
    zombies: VecDeque<WorkerExit>,
    ignores_sigterm: HashSet<WorkerId>,
    terminated: HashSet<WorkerId>,
    spawns: usize,
    failing_spawns: usize,
    failing_collects: usize,
}

impl Kernel {
    fn new_pid(&mut self) -> WorkerId {
        self.next_pid += 1;
        let id = WorkerId::from_raw(1000 + self.next_pid);
        self.alive.insert(id);
        id
    }

    fn exit(&mut self, id: WorkerId, kind: ExitKind) {
        if self.alive.remove(&id) {
            self.zombies.push_back(WorkerExit { id, kind });
        }
    }
}

/// Shared handle: clone it into the controller as both launcher and process
/// control, keep one to poke at the fake processes.
#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    kernel: Arc<Mutex<Kernel>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn kernel(&self) -> MutexGuard<'_, Kernel> {
        self.kernel.lock().unwrap()
    }

    /// Kills a worker from outside, like `kill -9`.
    pub fn crash(&self, id: WorkerId) {
        self.kernel().exit(id, ExitKind::Signal(Signal::SIGKILL));
    }

    /// Makes the worker ignore termination requests.
    pub fn ignore_sigterm(&self, id: WorkerId) {
        self.kernel().ignores_sigterm.insert(id);
    }

    /// A live child the controller never launched.
    pub fn adopt_untracked(&self) -> WorkerId {
        self.kernel().new_pid()
    }

    pub fn fail_next_spawns(&self, count: usize) {
        self.kernel().failing_spawns = count;
    }

    pub fn fail_next_collect(&self) {
        self.kernel().failing_collects += 1;
    }

    pub fn spawn_count(&self) -> usize {
        self.kernel().spawns
    }

    pub fn live_count(&self) -> usize {
        self.kernel().alive.len()
    }

    pub fn is_alive(&self, id: WorkerId) -> bool {
        self.kernel().alive.contains(&id)
    }

    pub fn terminated(&self, id: WorkerId) -> bool {
        self.kernel().terminated.contains(&id)
    }
}

#[async_trait]
impl Launcher for FakeHost {
    async fn spawn(&self) -> Result<WorkerId, SpawnError> {
        let mut kernel = self.kernel();
        if kernel.failing_spawns > 0 {
            kernel.failing_spawns -= 1;
            return Err(SpawnError::Fork(Errno::EAGAIN));
        }
        kernel.spawns += 1;
        Ok(kernel.new_pid())
    }
}

impl ProcessControl for FakeHost {
    fn terminate(&mut self, id: WorkerId) -> Result<(), TerminateError> {
        let mut kernel = self.kernel();
        let is_zombie = kernel.zombies.iter().any(|z| z.id == id);
        if !kernel.alive.contains(&id) && !is_zombie {
            return Err(TerminateError { id, source: Errno::ESRCH });
        }
        kernel.terminated.insert(id);
        if !kernel.ignores_sigterm.contains(&id) {
            kernel.exit(id, ExitKind::Code(0));
        }
        Ok(())
    }

    fn try_collect(&mut self) -> Result<Collected, CollectionError> {
        let mut kernel = self.kernel();
        if kernel.failing_collects > 0 {
            kernel.failing_collects -= 1;
            return Err(CollectionError(Errno::EINVAL));
        }
        if let Some(exit) = kernel.zombies.pop_front() {
            return Ok(Collected::Exited(exit));
        }
        if kernel.alive.is_empty() {
            Ok(Collected::NoChildren)
        } else {
            Ok(Collected::Idle)
        }
    }
}

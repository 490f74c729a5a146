use std::fmt;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::error::{CollectionError, TerminateError};
use crate::slots::WorkerId;

/// How a collected child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Code(i32),
    Signal(Signal),
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitKind::Code(code) => write!(f, "exit code {}", code),
            ExitKind::Signal(sig) => write!(f, "killed by {}", sig),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub id: WorkerId,
    pub kind: ExitKind,
}

/// Result of one non-blocking collection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collected {
    Exited(WorkerExit),
    /// Children exist but none has terminated yet.
    Idle,
    /// The process has no children left at all.
    NoChildren,
}

/// Everything the controller needs from the OS besides spawning.
pub trait ProcessControl {
    fn terminate(&mut self, id: WorkerId) -> Result<(), TerminateError>;
    fn try_collect(&mut self) -> Result<Collected, CollectionError>;
}

/// `kill(2)` and `waitpid(2)` on the real process tree.
#[derive(Debug, Default)]
pub struct NixProcesses;

impl ProcessControl for NixProcesses {
    fn terminate(&mut self, id: WorkerId) -> Result<(), TerminateError> {
        kill(id.pid(), Signal::SIGTERM).map_err(|source| TerminateError { id, source })
    }

    /*
        @@@
        @try_collect();
        . Waits for any child with WNOHANG, so it never blocks.
        . Stopped and continued children are not exits: they are skipped and the wait is retried.
        . ECHILD means nothing is left to collect; EINTR is retried.
    */
    fn try_collect(&mut self) -> Result<Collected, CollectionError> {
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    return Ok(Collected::Exited(WorkerExit {
                        id: pid.into(),
                        kind: ExitKind::Code(code),
                    }));
                }
                Ok(WaitStatus::Signaled(pid, sig, _)) => {
                    return Ok(Collected::Exited(WorkerExit {
                        id: pid.into(),
                        kind: ExitKind::Signal(sig),
                    }));
                }
                Ok(WaitStatus::StillAlive) => return Ok(Collected::Idle),
                Ok(_) => continue,
                Err(Errno::ECHILD) => return Ok(Collected::NoChildren),
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(CollectionError(errno)),
            }
        }
    }
}

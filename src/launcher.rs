use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use nix::libc;
use nix::sys::signal::{
    pthread_sigmask, sigaction, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
};
use nix::unistd::{fork, getpid, ForkResult};

use tracing::error;

use crate::error::SpawnError;
use crate::slots::WorkerId;

/// Creates worker processes. Retrying a failed spawn is the caller's business.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn spawn(&self) -> Result<WorkerId, SpawnError>;
}

/// The unit of work a forked worker runs until it is told to terminate.
pub trait Payload: Send + Sync {
    fn run(&self) -> !;
}

/// Prints one heartbeat line per period.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    pub period: Duration,
}

impl Payload for Heartbeat {
    fn run(&self) -> ! {
        let pid = getpid();
        let mut beat: u64 = 0;
        loop {
            beat += 1;
            let mut out = std::io::stdout().lock();
            let written = writeln!(
                out,
                "[worker {}] heartbeat {} at {}",
                pid,
                beat,
                Local::now().format("%H:%M:%S")
            )
            .and_then(|_| out.flush());
            drop(out);
            if written.is_err() {
                // stdout is gone, nobody is listening any more
                exit_now(1);
            }
            std::thread::sleep(self.period);
        }
    }
}

/*
    @@@
    @ForkLauncher;
    . Forks the supervisor; the child installs the worker-local signal overrides and runs the payload.
    . The child never returns into the supervisor's code: the payload loops until SIGTERM/SIGINT ends it.
*/
pub struct ForkLauncher<P: Payload> {
    payload: P,
}

impl<P: Payload> ForkLauncher<P> {
    pub fn new(payload: P) -> Self {
        ForkLauncher { payload }
    }
}

#[async_trait]
impl<P: Payload> Launcher for ForkLauncher<P> {
    async fn spawn(&self) -> Result<WorkerId, SpawnError> {
        // Signals stay blocked until the child has replaced the inherited
        // handlers, so an early SIGTERM is held pending instead of lost.
        let mut saved = SigSet::empty();
        pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&SigSet::all()), Some(&mut saved))?;

        // SAFETY: the supervisor runs on a single-threaded runtime, so no other
        // thread can hold a lock across the fork. The child only touches
        // sigaction, stdout and sleep before it exits.
        let forked = unsafe { fork() };
        match forked {
            Ok(ForkResult::Child) => {
                install_worker_overrides();
                if pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&saved), None).is_err() {
                    exit_now(1);
                }
                self.payload.run()
            }
            Ok(ForkResult::Parent { child }) => {
                if let Err(e) = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&saved), None) {
                    error!(pid = child.as_raw(), error = %e, "failed to restore signal mask after fork");
                }
                Ok(child.into())
            }
            Err(errno) => {
                pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&saved), None)?;
                Err(errno.into())
            }
        }
    }
}

extern "C" fn worker_terminate(_: libc::c_int) {
    exit_now(0);
}

fn exit_now(code: i32) -> ! {
    // SAFETY: _exit is async-signal-safe and skips the parent's atexit state.
    unsafe { libc::_exit(code) }
}

/// Replaces the handlers inherited from the supervisor. Without this a worker
/// would feed its own signals into the supervisor's self-pipe.
fn install_worker_overrides() {
    let overrides = [
        (Signal::SIGTERM, SigHandler::Handler(worker_terminate)),
        (Signal::SIGINT, SigHandler::Handler(worker_terminate)),
        (Signal::SIGHUP, SigHandler::SigIgn),
        (Signal::SIGCHLD, SigHandler::SigDfl),
    ];
    for (signal, handler) in overrides {
        let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
        // SAFETY: the handler only calls _exit.
        if unsafe { sigaction(signal, &action) }.is_err() {
            exit_now(1);
        }
    }
}

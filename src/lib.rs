/* src/lib.rs */

// Re-export modules for both binary and tests
pub mod control;
pub mod error;
pub mod launcher;
pub mod logger;
pub mod parse;
pub mod runtime;
pub mod signals;
pub mod slots;

#[cfg(test)]
pub mod testing;

pub use control::{Controller, ControllerState};
pub use launcher::{ForkLauncher, Heartbeat, Launcher, Payload};
pub use runtime::{NixProcesses, ProcessControl};
pub use signals::{Notification, PendingActions};
pub use slots::{SlotTable, WorkerId};

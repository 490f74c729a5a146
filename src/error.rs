use std::collections::TryReserveError;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use crate::slots::WorkerId;

/// Fatal failures while bringing the supervisor up.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to install the signal bridge")]
    Signals(#[source] std::io::Error),

    #[error("failed to allocate a slot table for {workers} workers")]
    SlotTable {
        workers: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("failed to install the log subscriber: {0}")]
    Logging(String),

    #[error("failed to build the async runtime")]
    Runtime(#[source] std::io::Error),
}

/// A worker process could not be created. Recoverable: the slot stays empty.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("fork failed: {0}")]
    Fork(#[from] Errno),
}

/// `waitpid` failed for a reason other than "no children".
#[derive(Debug, Error)]
#[error("waitpid failed: {0}")]
pub struct CollectionError(#[from] pub Errno);

#[derive(Debug, Error)]
#[error("failed to send SIGTERM to {id}: {source}")]
pub struct TerminateError {
    pub id: WorkerId,
    #[source]
    pub source: Errno,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("slot {index} is out of range (pool size {size})")]
    OutOfRange { index: usize, size: usize },

    #[error("slot {index} is already occupied by {occupant}")]
    Occupied { index: usize, occupant: WorkerId },

    #[error("{id} already occupies slot {index}")]
    Duplicate { id: WorkerId, index: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

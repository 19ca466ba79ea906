//! Error taxonomy shared by the sequencer, the batch remover and the adapters.

use crate::DeviceId;
use serde::{Deserialize, Serialize};
use std::num::ParseIntError;
use std::path::PathBuf;

/// Abort-class failures of a single device removal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecommissionError {
    /// Device could not be established as down. Nothing was mutated.
    #[error("osd.{id} cannot be removed: {reason}")]
    PreconditionFailed { id: DeviceId, reason: String },

    /// Mark-out was rejected. Nothing irreversible was done.
    #[error("failed to mark osd.{id} out: {output}")]
    MarkOutFailed { id: DeviceId, output: String },

    /// Purge was rejected after mark-out; the device may be out but not purged.
    #[error("failed to purge osd.{id}, device is out but may not be purged: {output}")]
    PurgeFailed { id: DeviceId, output: String },
}

impl DecommissionError {
    pub fn device(&self) -> DeviceId {
        match self {
            Self::PreconditionFailed { id, .. }
            | Self::MarkOutFailed { id, .. }
            | Self::PurgeFailed { id, .. } => *id,
        }
    }

    /// True when cluster state may already be partially mutated.
    pub fn is_irreversible(&self) -> bool {
        matches!(self, Self::PurgeFailed { .. })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid device id {input:?}: {source}")]
pub struct ParseDeviceIdError {
    pub input: String,
    #[source]
    pub source: ParseIntError,
}

/// A cluster command that did not succeed. `output` holds whatever the
/// command printed so it can be surfaced to the operator.
#[derive(Debug, Clone, thiserror::Error)]
#[error("`{command}` failed: {message}")]
pub struct CommandError {
    pub command: String,
    pub output: String,
    pub message: String,
}

impl CommandError {
    pub fn new(command: impl Into<String>, output: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            message: message.into(),
        }
    }

    /// Output if the command printed any, otherwise the failure message.
    pub fn detail(&self) -> &str {
        if self.output.trim().is_empty() {
            self.message.as_str()
        } else {
            self.output.trim()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("osd.{0} not found in the topology map")]
    DeviceNotFound(DeviceId),

    #[error("osd.{0} is not placed under any host")]
    NoHost(DeviceId),

    #[error("osd.{id} reports unknown status {status:?}")]
    UnknownStatus { id: DeviceId, status: String },

    #[error("topology query failed: {0}")]
    Command(#[from] CommandError),

    #[error("failed to parse topology map: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkloadError {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("failed to manage {kind} {name}: {message}")]
    Failed {
        kind: String,
        name: String,
        message: String,
    },
}

impl WorkloadError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigWriteError {
    #[error("cluster config is incomplete: {0}")]
    Incomplete(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures that abort an entire batch.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("failed to write the cluster config: {0}")]
    ConfigWrite(#[from] ConfigWriteError),
}

//! Collaborators the orchestrator drives. Production adapters live in
//! `decom-host-linux`; tests substitute recording fakes.

use crate::{
    CommandError, ConfigWriteError, DeviceId, DeviceLiveness, HostAffinity, QueryError,
    WorkloadError,
};
use std::fmt;
use std::sync::Arc;

/// Fresh, uncached view of the topology map.
pub trait ClusterStateQuery: Send + Sync {
    fn device_liveness(&self, id: DeviceId) -> Result<DeviceLiveness, QueryError>;

    fn host_affinity(&self, id: DeviceId) -> Result<HostAffinity, QueryError>;
}

/// Blocking round-trip to the cluster control plane. Timeouts and retries
/// are the implementation's concern.
pub trait CommandExecutor: Send + Sync {
    fn execute_with_output(&self, program: &str, args: &[&str]) -> Result<String, CommandError>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for Arc<T> {
    fn execute_with_output(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        (**self).execute_with_output(program, args)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    Job,
    PersistentVolumeClaim,
}

impl WorkloadKind {
    pub fn resource(self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::Job => "job",
            Self::PersistentVolumeClaim => "pvc",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

pub trait WorkloadManager: Send + Sync {
    /// Deleting an absent workload reports `WorkloadError::NotFound`.
    fn delete_workload(&self, namespace: &str, kind: WorkloadKind, name: &str) -> Result<(), WorkloadError>;

    /// Claim backing the given deployment, if it runs on one.
    fn backing_claim(&self, namespace: &str, deployment: &str) -> Result<Option<String>, WorkloadError>;
}

pub trait ConfigMaterializer: Send + Sync {
    fn write_cluster_config(&self) -> Result<(), ConfigWriteError>;
}

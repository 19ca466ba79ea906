use crate::ceph_admin::CephAdmin;
use crate::host_locks::HostLocks;
use decom_core::{
    osd_deployment_name, osd_prepare_job_name, Advisory, ClusterStateQuery, CommandExecutor,
    DecommissionError, DeviceId, HostAffinity, Step, WorkloadKind, WorkloadManager,
};
use decom_safety::{can_purge, SafetyDecision};
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug, Clone)]
pub struct SequencerSettings {
    pub namespace: String,
    pub ceph_binary: String,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            namespace: "rook-ceph".to_string(),
            ceph_binary: "ceph".to_string(),
        }
    }
}

/// Result of a single step. Advisory failures are recorded and skipped
/// over; fatal ones end the removal.
#[derive(Debug)]
pub enum StepOutcome {
    Completed,
    Advisory(Advisory),
    Fatal(DecommissionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub id: DeviceId,
    pub host: HostAffinity,
    pub advisories: Vec<Advisory>,
}

/// Removes one device at a time:
/// locate & check liveness, mark out, tear down workloads, purge, reclaim host.
pub struct Sequencer<'a> {
    state: &'a dyn ClusterStateQuery,
    admin: CephAdmin<'a>,
    workloads: &'a dyn WorkloadManager,
    namespace: String,
    host_locks: HostLocks,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        state: &'a dyn ClusterStateQuery,
        commands: &'a dyn CommandExecutor,
        workloads: &'a dyn WorkloadManager,
        settings: SequencerSettings,
    ) -> Self {
        Self {
            state,
            admin: CephAdmin::new(commands, settings.ceph_binary),
            workloads,
            namespace: settings.namespace,
            host_locks: HostLocks::new(),
        }
    }

    pub fn remove_device(&self, id: DeviceId) -> Result<Removal, DecommissionError> {
        let span = info_span!("remove_device", osd = %id);
        let _enter = span.enter();
        info!("removing device");

        let host = self.check_precondition(id)?;
        // Devices sharing a host never mutate concurrently.
        let advisories = self
            .host_locks
            .with_host(&host, || self.mutate(id, &host))?;

        info!(host = %host, advisories = advisories.len(), "completed removal of device");
        Ok(Removal {
            id,
            host,
            advisories,
        })
    }

    /// Steps 2 to 5. Caller holds the host's lock.
    fn mutate(&self, id: DeviceId, host: &HostAffinity) -> Result<Vec<Advisory>, DecommissionError> {
        let mut advisories = Vec::new();
        record(self.mark_out(id), &mut advisories)?;
        for outcome in self.teardown(id) {
            record(outcome, &mut advisories)?;
        }
        record(self.purge(id), &mut advisories)?;
        record(self.reclaim_host(host), &mut advisories)?;
        Ok(advisories)
    }

    /// Step 1 only. Used by dry runs; never mutates the cluster.
    pub fn check_precondition(&self, id: DeviceId) -> Result<HostAffinity, DecommissionError> {
        let precondition = |reason: String| DecommissionError::PreconditionFailed { id, reason };

        let host = self
            .state
            .host_affinity(id)
            .map_err(|err| precondition(format!("cannot locate device: {}", err)))?;
        let liveness = self
            .state
            .device_liveness(id)
            .map_err(|err| precondition(format!("cannot determine liveness: {}", err)))?;
        debug!(host = %host, liveness = %liveness, "located device");

        match can_purge(liveness) {
            SafetyDecision::Allow => Ok(host),
            SafetyDecision::Deny(reason) => {
                warn!(host = %host, "refusing to remove device that is up");
                Err(precondition(reason))
            }
        }
    }

    fn mark_out(&self, id: DeviceId) -> StepOutcome {
        match self.admin.mark_out(id) {
            Ok(_) => {
                info!("marked device out");
                StepOutcome::Completed
            }
            Err(err) => StepOutcome::Fatal(DecommissionError::MarkOutFailed {
                id,
                output: err.detail().to_string(),
            }),
        }
    }

    fn teardown(&self, id: DeviceId) -> Vec<StepOutcome> {
        let deployment = osd_deployment_name(id);
        let mut outcomes = Vec::new();

        // The claim label has to be read before the deployment is gone.
        let claim = match self.workloads.backing_claim(&self.namespace, &deployment) {
            Ok(claim) => claim,
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                outcomes.push(advisory(
                    Step::Teardown,
                    format!("cannot determine backing claim of {}: {}", deployment, err),
                ));
                None
            }
        };

        info!(deployment = %deployment, "removing the device deployment");
        outcomes.push(self.delete_workload(WorkloadKind::Deployment, &deployment));

        if let Some(claim) = claim {
            let job = osd_prepare_job_name(&claim);
            outcomes.push(self.delete_workload(WorkloadKind::Job, &job));
            outcomes.push(self.delete_workload(WorkloadKind::PersistentVolumeClaim, &claim));
        }
        outcomes
    }

    fn delete_workload(&self, kind: WorkloadKind, name: &str) -> StepOutcome {
        match self.workloads.delete_workload(&self.namespace, kind, name) {
            Ok(()) => StepOutcome::Completed,
            Err(err) if err.is_not_found() => {
                debug!(kind = %kind, name, "workload already absent");
                StepOutcome::Completed
            }
            Err(err) => advisory(Step::Teardown, format!("failed to delete {} {}: {}", kind, name, err)),
        }
    }

    fn purge(&self, id: DeviceId) -> StepOutcome {
        match self.admin.purge(id) {
            Ok(_) => {
                info!("purged device");
                StepOutcome::Completed
            }
            Err(err) => {
                error!(
                    output = %err.detail(),
                    "purge failed after mark-out; device needs operator attention"
                );
                StepOutcome::Fatal(DecommissionError::PurgeFailed {
                    id,
                    output: err.detail().to_string(),
                })
            }
        }
    }

    /// Expected to fail while sibling devices remain on the host.
    fn reclaim_host(&self, host: &HostAffinity) -> StepOutcome {
        match self.admin.remove_crush_host(host) {
            Ok(_) => {
                info!(host = %host, "removed host from the topology map");
                StepOutcome::Completed
            }
            Err(err) => advisory(
                Step::ReclaimHost,
                format!("unable to remove host {}: {}", host, err.detail()),
            ),
        }
    }
}

fn advisory(step: Step, message: String) -> StepOutcome {
    StepOutcome::Advisory(Advisory::new(step, message))
}

fn record(outcome: StepOutcome, advisories: &mut Vec<Advisory>) -> Result<(), DecommissionError> {
    match outcome {
        StepOutcome::Completed => Ok(()),
        StepOutcome::Advisory(advisory) => {
            warn!(step = %advisory.step, message = %advisory.message, "continuing past best-effort step");
            advisories.push(advisory);
            Ok(())
        }
        StepOutcome::Fatal(err) => Err(err),
    }
}

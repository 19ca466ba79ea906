//! In-memory cluster used by the unit tests. Every collaborator call is
//! appended to `calls` so tests can assert on ordering.

use decom_core::{
    ClusterStateQuery, CommandError, CommandExecutor, ConfigMaterializer, ConfigWriteError,
    DeviceId, DeviceLiveness, HostAffinity, QueryError, WorkloadError, WorkloadKind,
    WorkloadManager,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct FakeCluster {
    devices: HashMap<DeviceId, (HostAffinity, DeviceLiveness)>,
    failing_commands: Vec<(String, String)>,
    workload_failures: HashMap<String, WorkloadError>,
    claims: HashMap<String, String>,
    unreadable: HashMap<DeviceId, HostAffinity>,
    config_fails: bool,
    calls: Mutex<Vec<String>>,
    out_not_purged: AtomicUsize,
    max_out_not_purged: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, id: u32, host: &str, liveness: DeviceLiveness) -> Self {
        self.devices
            .insert(DeviceId::new(id), (HostAffinity::new(host), liveness));
        self
    }

    /// Device is placed under `host` but reports a status that is neither up nor down.
    pub fn with_unreadable_device(mut self, id: u32, host: &str) -> Self {
        self.unreadable
            .insert(DeviceId::new(id), HostAffinity::new(host));
        self
    }

    /// Any ceph command containing `pattern` fails with `output`.
    pub fn fail_command(mut self, pattern: &str, output: &str) -> Self {
        self.failing_commands
            .push((pattern.to_string(), output.to_string()));
        self
    }

    pub fn fail_workload(mut self, name: &str, err: WorkloadError) -> Self {
        self.workload_failures.insert(name.to_string(), err);
        self
    }

    pub fn with_claim(mut self, deployment: &str, claim: &str) -> Self {
        self.claims.insert(deployment.to_string(), claim.to_string());
        self
    }

    pub fn fail_config_write(mut self) -> Self {
        self.config_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change cluster state, in order.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with("ceph ") || call.starts_with("delete "))
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Highest number of devices seen marked out but not yet purged.
    pub fn max_out_not_purged(&self) -> usize {
        self.max_out_not_purged.load(Ordering::SeqCst)
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn lookup(&self, id: DeviceId) -> Result<&(HostAffinity, DeviceLiveness), QueryError> {
        self.devices.get(&id).ok_or(QueryError::DeviceNotFound(id))
    }
}

impl ClusterStateQuery for FakeCluster {
    fn device_liveness(&self, id: DeviceId) -> Result<DeviceLiveness, QueryError> {
        self.push(format!("query liveness {}", id));
        if self.unreadable.contains_key(&id) {
            return Err(QueryError::UnknownStatus {
                id,
                status: "destroyed".to_string(),
            });
        }
        self.lookup(id).map(|(_, liveness)| *liveness)
    }

    fn host_affinity(&self, id: DeviceId) -> Result<HostAffinity, QueryError> {
        self.push(format!("query host {}", id));
        if let Some(host) = self.unreadable.get(&id) {
            return Ok(host.clone());
        }
        self.lookup(id).map(|(host, _)| host.clone())
    }
}

impl CommandExecutor for FakeCluster {
    fn execute_with_output(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
        let command = format!("{} {}", program, args.join(" "));
        self.push(command.clone());
        match args {
            ["osd", "out", ..] => {
                let now = self.out_not_purged.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_out_not_purged.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
            }
            ["osd", "purge", ..] => {
                self.out_not_purged.fetch_sub(1, Ordering::SeqCst);
            }
            _ => {}
        }
        match self
            .failing_commands
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
        {
            Some((_, output)) => Err(CommandError::new(command, output.clone(), "exit status 1")),
            None => Ok(String::new()),
        }
    }
}

impl WorkloadManager for FakeCluster {
    fn delete_workload(&self, _namespace: &str, kind: WorkloadKind, name: &str) -> Result<(), WorkloadError> {
        self.push(format!("delete {} {}", kind, name));
        match self.workload_failures.get(name) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn backing_claim(&self, _namespace: &str, deployment: &str) -> Result<Option<String>, WorkloadError> {
        self.push(format!("claim {}", deployment));
        Ok(self.claims.get(deployment).cloned())
    }
}

impl ConfigMaterializer for FakeCluster {
    fn write_cluster_config(&self) -> Result<(), ConfigWriteError> {
        self.push("write config".to_string());
        if self.config_fails {
            return Err(ConfigWriteError::Incomplete("fsid missing".to_string()));
        }
        Ok(())
    }
}

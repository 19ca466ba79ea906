use decom_core::{CommandError, CommandExecutor, DeviceId, HostAffinity};

/// Builds the cluster admin commands the sequencer issues.
pub struct CephAdmin<'a> {
    executor: &'a dyn CommandExecutor,
    ceph_binary: String,
}

impl<'a> CephAdmin<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, ceph_binary: impl Into<String>) -> Self {
        Self {
            executor,
            ceph_binary: ceph_binary.into(),
        }
    }

    pub fn mark_out(&self, id: DeviceId) -> Result<String, CommandError> {
        let daemon = id.daemon_name();
        self.ceph(&["osd", "out", &daemon])
    }

    pub fn purge(&self, id: DeviceId) -> Result<String, CommandError> {
        let daemon = id.daemon_name();
        self.ceph(&["osd", "purge", &daemon, "--force", "--yes-i-really-mean-it"])
    }

    /// Fails while other devices are still placed under the host.
    pub fn remove_crush_host(&self, host: &HostAffinity) -> Result<String, CommandError> {
        self.ceph(&["osd", "crush", "rm", host.as_str()])
    }

    fn ceph(&self, args: &[&str]) -> Result<String, CommandError> {
        self.executor.execute_with_output(&self.ceph_binary, args)
    }
}

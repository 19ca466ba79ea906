use decom_core::{CommandError, CommandExecutor, WorkloadError, WorkloadKind, WorkloadManager, PVC_LABEL};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct KubectlWorkloads<E> {
    executor: E,
    kubectl_binary: String,
    request_timeout_secs: Option<u64>,
}

impl<E: CommandExecutor> KubectlWorkloads<E> {
    pub fn new(executor: E, kubectl_binary: impl Into<String>) -> Self {
        Self {
            executor,
            kubectl_binary: kubectl_binary.into(),
            request_timeout_secs: None,
        }
    }

    pub fn with_request_timeout(mut self, secs: Option<u64>) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    fn run(&self, namespace: &str, args: &[&str]) -> Result<String, CommandError> {
        let timeout = self
            .request_timeout_secs
            .map(|secs| format!("--request-timeout={}s", secs));
        let mut full: Vec<&str> = vec!["--namespace", namespace];
        if let Some(timeout) = timeout.as_deref() {
            full.push(timeout);
        }
        full.extend_from_slice(args);
        self.executor.execute_with_output(&self.kubectl_binary, &full)
    }
}

fn is_not_found(err: &CommandError) -> bool {
    err.output.contains("NotFound") || err.output.contains("not found")
}

fn classify(err: CommandError, kind: &str, name: &str) -> WorkloadError {
    if is_not_found(&err) {
        WorkloadError::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    } else {
        WorkloadError::Failed {
            kind: kind.to_string(),
            name: name.to_string(),
            message: err.detail().to_string(),
        }
    }
}

impl<E: CommandExecutor> WorkloadManager for KubectlWorkloads<E> {
    fn delete_workload(&self, namespace: &str, kind: WorkloadKind, name: &str) -> Result<(), WorkloadError> {
        debug!(namespace, kind = %kind, name, "deleting workload");
        self.run(namespace, &["delete", kind.resource(), name])
            .map(|_| ())
            .map_err(|err| classify(err, kind.resource(), name))
    }

    fn backing_claim(&self, namespace: &str, deployment: &str) -> Result<Option<String>, WorkloadError> {
        let jsonpath = format!(
            "jsonpath={{.metadata.labels.{}}}",
            PVC_LABEL.replace('.', "\\.")
        );
        let output = self
            .run(namespace, &["get", "deployment", deployment, "-o", jsonpath.as_str()])
            .map_err(|err| classify(err, WorkloadKind::Deployment.resource(), deployment))?;
        let claim = output.trim();
        Ok((!claim.is_empty()).then(|| claim.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedExecutor {
        calls: Mutex<Vec<Vec<String>>>,
        reply: Result<String, CommandError>,
    }

    impl ScriptedExecutor {
        fn replying(reply: Result<String, CommandError>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reply,
            }
        }
    }

    impl CommandExecutor for ScriptedExecutor {
        fn execute_with_output(&self, program: &str, args: &[&str]) -> Result<String, CommandError> {
            let mut call = vec![program.to_string()];
            call.extend(args.iter().map(|arg| arg.to_string()));
            self.calls.lock().unwrap().push(call);
            self.reply.clone()
        }
    }

    #[test]
    fn deletes_deployment_in_namespace() {
        let workloads = KubectlWorkloads::new(ScriptedExecutor::replying(Ok(String::new())), "kubectl")
            .with_request_timeout(Some(15));
        workloads
            .delete_workload("rook-ceph", WorkloadKind::Deployment, "rook-ceph-osd-3")
            .unwrap();
        let calls = workloads.executor.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            vec![
                "kubectl",
                "--namespace",
                "rook-ceph",
                "--request-timeout=15s",
                "delete",
                "deployment",
                "rook-ceph-osd-3"
            ]
        );
    }

    #[test]
    fn maps_not_found_output() {
        let err = CommandError::new(
            "kubectl delete",
            "Error from server (NotFound): deployments.apps \"rook-ceph-osd-3\" not found",
            "exit status 1",
        );
        let workloads = KubectlWorkloads::new(ScriptedExecutor::replying(Err(err)), "kubectl");
        let result = workloads.delete_workload("rook-ceph", WorkloadKind::Deployment, "rook-ceph-osd-3");
        assert!(result.unwrap_err().is_not_found());
    }

    #[test]
    fn other_failures_are_not_not_found() {
        let err = CommandError::new("kubectl delete", "Unauthorized", "exit status 1");
        let workloads = KubectlWorkloads::new(ScriptedExecutor::replying(Err(err)), "kubectl");
        let result = workloads.delete_workload("rook-ceph", WorkloadKind::Job, "x");
        assert!(matches!(result, Err(WorkloadError::Failed { .. })));
    }

    #[test]
    fn reads_backing_claim_label() {
        let workloads = KubectlWorkloads::new(
            ScriptedExecutor::replying(Ok("set1-data-0\n".to_string())),
            "kubectl",
        );
        assert_eq!(
            workloads.backing_claim("rook-ceph", "rook-ceph-osd-3").unwrap(),
            Some("set1-data-0".to_string())
        );
        let calls = workloads.executor.calls.lock().unwrap();
        assert_eq!(
            calls[0].last().map(String::as_str),
            Some("jsonpath={.metadata.labels.ceph\\.rook\\.io/pvc}")
        );
    }

    #[test]
    fn empty_label_means_no_claim() {
        let workloads = KubectlWorkloads::new(ScriptedExecutor::replying(Ok(String::new())), "kubectl");
        assert_eq!(workloads.backing_claim("rook-ceph", "rook-ceph-osd-3").unwrap(), None);
    }
}

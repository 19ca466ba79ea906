use decom_core::{ClusterStateQuery, CommandExecutor, DeviceId, DeviceLiveness, HostAffinity, QueryError};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct OsdTree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub children: Vec<i64>,
}

impl OsdTree {
    pub fn parse(json: &str) -> Result<Self, QueryError> {
        serde_json::from_str(json).map_err(|err| QueryError::Parse(err.to_string()))
    }

    fn osd(&self, id: DeviceId) -> Option<&TreeNode> {
        let key = i64::from(id.get());
        self.nodes.iter().find(|node| node.kind == "osd" && node.id == key)
    }

    pub fn liveness(&self, id: DeviceId) -> Result<DeviceLiveness, QueryError> {
        let node = self.osd(id).ok_or(QueryError::DeviceNotFound(id))?;
        let status = node.status.as_deref().unwrap_or_default();
        DeviceLiveness::from_status(status).ok_or_else(|| QueryError::UnknownStatus {
            id,
            status: status.to_string(),
        })
    }

    pub fn host(&self, id: DeviceId) -> Result<HostAffinity, QueryError> {
        self.osd(id).ok_or(QueryError::DeviceNotFound(id))?;
        let key = i64::from(id.get());
        self.nodes
            .iter()
            .find(|node| node.kind == "host" && node.children.contains(&key))
            .map(|node| HostAffinity::new(node.name.clone()))
            .ok_or(QueryError::NoHost(id))
    }
}

/// Reads `ceph osd tree` on every call; nothing is cached between lookups.
#[derive(Debug, Clone)]
pub struct OsdTreeQuery<E> {
    executor: E,
    ceph_binary: String,
}

impl<E: CommandExecutor> OsdTreeQuery<E> {
    pub fn new(executor: E, ceph_binary: impl Into<String>) -> Self {
        Self {
            executor,
            ceph_binary: ceph_binary.into(),
        }
    }

    pub fn fetch(&self) -> Result<OsdTree, QueryError> {
        let output = self
            .executor
            .execute_with_output(&self.ceph_binary, &["osd", "tree", "--format", "json"])?;
        OsdTree::parse(&output)
    }
}

impl<E: CommandExecutor> ClusterStateQuery for OsdTreeQuery<E> {
    fn device_liveness(&self, id: DeviceId) -> Result<DeviceLiveness, QueryError> {
        self.fetch()?.liveness(id)
    }

    fn host_affinity(&self, id: DeviceId) -> Result<HostAffinity, QueryError> {
        self.fetch()?.host(id)
    }
}

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_NAMESPACE: &str = "DECOM_NAMESPACE";
pub const ENV_ADMIN_SECRET: &str = "DECOM_ADMIN_SECRET";
pub const ENV_CONFIG_DIR: &str = "DECOM_CONFIG_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomConfig {
    /// Namespace the OSD workloads run in.
    pub namespace: String,
    pub ceph_binary: String,
    pub kubectl_binary: String,
    pub command_timeout_secs: Option<u64>,
    /// Number of devices removed concurrently. 1 keeps removal serial.
    pub parallelism: usize,
    pub report_base: Option<PathBuf>,
    pub cluster: ClusterInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterInfo {
    pub fsid: String,
    pub mon_endpoints: Vec<String>,
    pub config_dir: PathBuf,
    pub admin_secret: Option<String>,
}

impl Default for DecomConfig {
    fn default() -> Self {
        Self {
            namespace: "rook-ceph".to_string(),
            ceph_binary: "ceph".to_string(),
            kubectl_binary: "kubectl".to_string(),
            command_timeout_secs: Some(30),
            parallelism: 1,
            report_base: None,
            cluster: ClusterInfo::default(),
        }
    }
}

impl Default for ClusterInfo {
    fn default() -> Self {
        Self {
            fsid: String::new(),
            mon_endpoints: Vec::new(),
            config_dir: PathBuf::from("/var/lib/rook/decom"),
            admin_secret: None,
        }
    }
}

impl DecomConfig {
    /// Defaults when no path is given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse JSON config {}", path.display()))
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse YAML config {}", path.display()))
        }
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(namespace) = lookup(ENV_NAMESPACE).filter(|v| !v.trim().is_empty()) {
            self.namespace = namespace;
        }
        if let Some(secret) = lookup(ENV_ADMIN_SECRET).filter(|v| !v.trim().is_empty()) {
            self.cluster.admin_secret = Some(secret);
        }
        if let Some(dir) = lookup(ENV_CONFIG_DIR).filter(|v| !v.trim().is_empty()) {
            self.cluster.config_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(anyhow!("namespace must not be empty"));
        }
        if self.parallelism == 0 {
            return Err(anyhow!("parallelism must be > 0"));
        }
        if self.ceph_binary.trim().is_empty() || self.kubectl_binary.trim().is_empty() {
            return Err(anyhow!("ceph_binary and kubectl_binary must be set"));
        }
        self.cluster.validate()
    }
}

impl ClusterInfo {
    pub fn validate(&self) -> Result<()> {
        if self.fsid.trim().is_empty() {
            return Err(anyhow!("cluster.fsid is required"));
        }
        if self.mon_endpoints.is_empty() {
            return Err(anyhow!("cluster.mon_endpoints must list at least one monitor"));
        }
        if self.admin_secret.as_deref().map_or(true, |s| s.trim().is_empty()) {
            return Err(anyhow!(
                "cluster admin secret missing, set cluster.admin_secret or {}",
                ENV_ADMIN_SECRET
            ));
        }
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("ceph.conf")
    }

    pub fn keyring_path(&self) -> PathBuf {
        self.config_dir.join("keyring")
    }
}

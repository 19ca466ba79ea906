use decom_config::ClusterInfo;
use decom_core::{ConfigMaterializer, ConfigWriteError};
use std::fs;
use std::path::Path;
use tracing::info;

/// Materializes `ceph.conf` and the admin keyring so the `ceph` tool can
/// reach the monitors.
#[derive(Debug, Clone)]
pub struct CephConfigWriter {
    cluster: ClusterInfo,
}

impl CephConfigWriter {
    pub fn new(cluster: ClusterInfo) -> Self {
        Self { cluster }
    }

    /// Environment for `ProcessExecutor` pointing the tools at the written files.
    pub fn ceph_env(&self, connect_timeout_secs: Option<u64>) -> Vec<(String, String)> {
        let mut ceph_args = format!("--keyring={}", self.cluster.keyring_path().display());
        if let Some(secs) = connect_timeout_secs {
            ceph_args.push_str(&format!(" --connect-timeout={}", secs));
        }
        vec![
            (
                "CEPH_CONF".to_string(),
                self.cluster.config_path().display().to_string(),
            ),
            ("CEPH_ARGS".to_string(), ceph_args),
        ]
    }
}

pub fn render_ceph_conf(cluster: &ClusterInfo) -> String {
    format!(
        "[global]\nfsid = {}\nmon_host = {}\nkeyring = {}\n",
        cluster.fsid,
        cluster.mon_endpoints.join(","),
        cluster.keyring_path().display()
    )
}

pub fn render_keyring(secret: &str) -> String {
    format!("[client.admin]\n\tkey = {}\n", secret)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigWriteError> {
    fs::write(path, contents).map_err(|source| ConfigWriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Creates the file owner-only before the secret is written, then tightens
/// the mode of a file that already existed.
#[cfg(unix)]
fn write_secret_file(path: &Path, contents: &str) -> Result<(), ConfigWriteError> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let io_err = |source| ConfigWriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(io_err)?;
    restrict_permissions(path)?;
    file.write_all(contents.as_bytes()).map_err(io_err)
}

#[cfg(not(unix))]
fn write_secret_file(path: &Path, contents: &str) -> Result<(), ConfigWriteError> {
    write_file(path, contents)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), ConfigWriteError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| {
        ConfigWriteError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), ConfigWriteError> {
    Ok(())
}

impl ConfigMaterializer for CephConfigWriter {
    fn write_cluster_config(&self) -> Result<(), ConfigWriteError> {
        self.cluster
            .validate()
            .map_err(|err| ConfigWriteError::Incomplete(err.to_string()))?;
        let secret = self
            .cluster
            .admin_secret
            .as_deref()
            .ok_or_else(|| ConfigWriteError::Incomplete("admin secret missing".to_string()))?;

        let dir = &self.cluster.config_dir;
        fs::create_dir_all(dir).map_err(|source| ConfigWriteError::Io {
            path: dir.clone(),
            source,
        })?;

        let keyring = self.cluster.keyring_path();
        write_secret_file(&keyring, &render_keyring(secret))?;
        write_file(&self.cluster.config_path(), &render_ceph_conf(&self.cluster))?;

        info!(dir = %dir.display(), "wrote cluster config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cluster(dir: PathBuf) -> ClusterInfo {
        ClusterInfo {
            fsid: "6b1e0b0a-0000-4000-8000-000000000000".to_string(),
            mon_endpoints: vec!["10.0.0.1:6789".to_string(), "10.0.0.2:6789".to_string()],
            config_dir: dir,
            admin_secret: Some("AQBsecret==".to_string()),
        }
    }

    #[test]
    fn writes_conf_and_keyring() {
        let dir = std::env::temp_dir()
            .join(format!("decom-conf-{}", uuid::Uuid::new_v4()))
            .join("nested");
        let writer = CephConfigWriter::new(cluster(dir.clone()));
        writer.write_cluster_config().unwrap();

        let conf = fs::read_to_string(dir.join("ceph.conf")).unwrap();
        assert!(conf.contains("fsid = 6b1e0b0a-0000-4000-8000-000000000000"));
        assert!(conf.contains("mon_host = 10.0.0.1:6789,10.0.0.2:6789"));
        let keyring = fs::read_to_string(dir.join("keyring")).unwrap();
        assert!(keyring.contains("key = AQBsecret=="));
        fs::remove_dir_all(dir.parent().unwrap()).ok();
    }

    #[cfg(unix)]
    #[test]
    fn keyring_is_owner_only_even_when_it_existed() {
        use std::os::unix::fs::PermissionsExt;
        let dir = std::env::temp_dir().join(format!("decom-keyring-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let keyring = dir.join("keyring");
        fs::write(&keyring, "stale").unwrap();
        fs::set_permissions(&keyring, fs::Permissions::from_mode(0o644)).unwrap();

        CephConfigWriter::new(cluster(dir.clone()))
            .write_cluster_config()
            .unwrap();

        let mode = fs::metadata(&keyring).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(fs::read_to_string(&keyring).unwrap().contains("AQBsecret=="));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn refuses_incomplete_cluster_info() {
        let mut info = cluster(std::env::temp_dir().join("decom-never-written"));
        info.admin_secret = None;
        let err = CephConfigWriter::new(info).write_cluster_config().unwrap_err();
        assert!(matches!(err, ConfigWriteError::Incomplete(_)));
    }

    #[test]
    fn env_points_tools_at_written_files() {
        let writer = CephConfigWriter::new(cluster(PathBuf::from("/tmp/decom")));
        let env = writer.ceph_env(Some(20));
        assert_eq!(env[0], ("CEPH_CONF".to_string(), "/tmp/decom/ceph.conf".to_string()));
        assert_eq!(
            env[1].1,
            "--keyring=/tmp/decom/keyring --connect-timeout=20"
        );
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

mod contracts;
mod error;

pub use contracts::{ClusterStateQuery, CommandExecutor, ConfigMaterializer, WorkloadKind, WorkloadManager};
pub use error::{
    BatchError, CommandError, ConfigWriteError, DecommissionError, ParseDeviceIdError, QueryError,
    WorkloadError,
};

pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Prefix shared by every OSD workload the operator manages.
pub const OSD_APP_PREFIX: &str = "rook-ceph-osd";

/// Deployment label naming the claim a PVC-backed OSD runs on.
pub const PVC_LABEL: &str = "ceph.rook.io/pvc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u32);

impl DeviceId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Name the cluster uses for this device in admin commands, e.g. `osd.3`.
    pub fn daemon_name(self) -> String {
        format!("osd.{}", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ParseDeviceIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        input
            .trim()
            .parse::<u32>()
            .map(DeviceId)
            .map_err(|source| ParseDeviceIdError {
                input: input.to_string(),
                source,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceLiveness {
    Up,
    Down,
}

impl DeviceLiveness {
    pub fn from_status(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceLiveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostAffinity(String);

impl HostAffinity {
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostAffinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The ordered steps of a single device removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    LocateAndCheck,
    MarkOut,
    Teardown,
    Purge,
    ReclaimHost,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocateAndCheck => "locate-and-check",
            Self::MarkOut => "mark-out",
            Self::Teardown => "teardown",
            Self::Purge => "purge",
            Self::ReclaimHost => "reclaim-host",
        };
        f.write_str(name)
    }
}

/// A tolerated failure of a best-effort step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub step: Step,
    pub message: String,
}

impl Advisory {
    pub fn new(step: Step, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    InvalidIdentifier { message: String },
    DryRun { host: HostAffinity },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemovalOutcome {
    Succeeded {
        id: DeviceId,
        host: HostAffinity,
        advisories: Vec<Advisory>,
    },
    Skipped {
        identifier: String,
        reason: SkipReason,
    },
    Failed {
        id: DeviceId,
        error: DecommissionError,
    },
}

impl RemovalOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Identifier as the operator supplied it, or the parsed id.
    pub fn subject(&self) -> String {
        match self {
            Self::Succeeded { id, .. } | Self::Failed { id, .. } => id.to_string(),
            Self::Skipped { identifier, .. } => identifier.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub schema_version: String,
    pub started_at_utc: String,
    pub finished_at_utc: String,
    pub dry_run: bool,
    pub outcomes: Vec<RemovalOutcome>,
}

impl BatchReport {
    pub fn new(started_at_utc: String, dry_run: bool, outcomes: Vec<RemovalOutcome>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            started_at_utc,
            finished_at_utc: now_utc_rfc3339(),
            dry_run,
            outcomes,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.count(|outcome| matches!(outcome, RemovalOutcome::Succeeded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, RemovalOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(RemovalOutcome::is_failure)
    }

    /// Devices that may be marked out but not purged.
    pub fn purge_failures(&self) -> usize {
        self.count(|outcome| {
            matches!(outcome, RemovalOutcome::Failed { error, .. } if error.is_irreversible())
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&RemovalOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|outcome| pred(*outcome)).count()
    }
}

pub fn osd_deployment_name(id: DeviceId) -> String {
    format!("{}-{}", OSD_APP_PREFIX, id)
}

pub fn osd_prepare_job_name(claim: &str) -> String {
    format!("{}-prepare-{}", OSD_APP_PREFIX, claim)
}

pub fn now_utc_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

use anyhow::{Context, Result};
use decom_core::{now_utc_rfc3339, BatchReport, RemovalOutcome, SkipReason};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct ReportPaths {
    pub run_id: String,
    pub root: PathBuf,
    pub run_json: PathBuf,
    pub run_digest: PathBuf,
    pub logs_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct Summary {
    succeeded: usize,
    skipped: usize,
    failed: usize,
    purge_failures: usize,
}

#[derive(Debug, Serialize)]
struct RunDocument<'a> {
    written_at_utc: String,
    summary: Summary,
    #[serde(flatten)]
    report: &'a BatchReport,
}

/// Writes `reports/<run_id>/{run.json, run.json.sha256, logs.txt}` under `base`.
pub fn create_removal_report(
    base: impl AsRef<Path>,
    report: &BatchReport,
    logs: Option<&str>,
) -> Result<ReportPaths> {
    let run_id = report.run_id.to_string();
    let root = base.as_ref().join("reports").join(&run_id);
    std::fs::create_dir_all(&root)
        .with_context(|| format!("create report dir {}", root.display()))?;

    let run_json = root.join("run.json");
    let run_digest = root.join("run.json.sha256");
    let logs_path = root.join("logs.txt");

    let document = RunDocument {
        written_at_utc: now_utc_rfc3339(),
        summary: Summary {
            succeeded: report.succeeded(),
            skipped: report.skipped(),
            failed: report.failed(),
            purge_failures: report.purge_failures(),
        },
        report,
    };
    let data = serde_json::to_string_pretty(&document)?;
    std::fs::write(&run_json, &data).with_context(|| format!("write {}", run_json.display()))?;
    std::fs::write(&run_digest, format!("{}  run.json\n", sha256_hex(data.as_bytes())))?;
    std::fs::write(&logs_path, logs.unwrap_or(""))?;

    Ok(ReportPaths {
        run_id,
        root,
        run_json,
        run_digest,
        logs_path,
    })
}

/// One line per outcome, suitable for `logs.txt` and terminal output.
pub fn render_outcome_lines(report: &BatchReport) -> Vec<String> {
    report
        .outcomes
        .iter()
        .map(|outcome| match outcome {
            RemovalOutcome::Succeeded { id, host, advisories } => {
                let mut line = format!("osd.{} removed (host {})", id, host);
                for advisory in advisories {
                    line.push_str(&format!("; {}: {}", advisory.step, advisory.message));
                }
                line
            }
            RemovalOutcome::Skipped {
                identifier,
                reason: SkipReason::InvalidIdentifier { message },
            } => format!("{:?} skipped: {}", identifier, message),
            RemovalOutcome::Skipped {
                identifier,
                reason: SkipReason::DryRun { host },
            } => format!("osd.{} would be removed (host {})", identifier.trim(), host),
            RemovalOutcome::Failed { error, .. } => format!("FAILED {}", error),
        })
        .collect()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

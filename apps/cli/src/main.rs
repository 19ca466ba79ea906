use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use decom_config::DecomConfig;
use decom_core::{BatchReport, ClusterStateQuery, ConfigMaterializer, DeviceId};
use decom_host_linux::{CephConfigWriter, KubectlWorkloads, OsdTreeQuery, ProcessExecutor};
use decom_report::{create_removal_report, render_outcome_lines};
use decom_safety::{check_operator_intent, require_confirmation_token, SafetyContext, SafetyDecision};
use decom_workflow_engine::{BatchOptions, BatchRemover, Sequencer, SequencerSettings};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Remove storage devices (OSDs) from a running cluster
#[derive(Debug, Parser)]
#[command(name = "decom")]
#[command(version)]
struct Cli {
    /// Configuration file (.json or .yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Mark out, tear down and purge the given devices
    Remove {
        /// Device ids, e.g. `3 4 7`
        #[arg(required = true)]
        ids: Vec<String>,

        /// Required for anything but a dry run
        #[arg(long)]
        force: bool,

        /// Token printed by `decom token`
        #[arg(long, value_name = "TOKEN")]
        confirm: Option<String>,

        /// Only check which devices could be removed
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        parallelism: Option<usize>,

        #[arg(long)]
        namespace: Option<String>,

        /// Write a report bundle under this directory
        #[arg(long, value_name = "DIR")]
        report_base: Option<PathBuf>,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the host and liveness of a device
    Status { id: String },

    /// Print a confirmation token for `remove --confirm`
    Token,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!(?cli, "starting");

    let mut config = DecomConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Token => {
            println!("{}", require_confirmation_token());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status { id } => {
            config.validate()?;
            let id: DeviceId = id.parse()?;
            let writer = CephConfigWriter::new(config.cluster.clone());
            writer.write_cluster_config()?;
            let executor = build_executor(&writer, &config);
            let query = OsdTreeQuery::new(executor, config.ceph_binary.clone());
            let host = query.host_affinity(id)?;
            let liveness = query.device_liveness(id)?;
            println!("{} host={} status={}", id.daemon_name(), host, liveness);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Remove {
            ids,
            force,
            confirm,
            dry_run,
            parallelism,
            namespace,
            report_base,
            json,
        } => {
            if let Some(namespace) = namespace {
                config.namespace = namespace;
            }
            if let Some(parallelism) = parallelism {
                config.parallelism = parallelism;
            }
            if report_base.is_some() {
                config.report_base = report_base;
            }
            config.validate()?;

            let ctx = SafetyContext {
                force_mode: force,
                confirmation_token: confirm,
                dry_run,
            };
            if let SafetyDecision::Deny(reason) = check_operator_intent(&ctx) {
                return Err(anyhow!(reason));
            }

            run_remove(&config, &ids, dry_run, json)
        }
    }
}

fn run_remove(config: &DecomConfig, ids: &[String], dry_run: bool, json: bool) -> Result<ExitCode> {
    let writer = CephConfigWriter::new(config.cluster.clone());
    let executor = build_executor(&writer, config);
    let state = OsdTreeQuery::new(Arc::clone(&executor), config.ceph_binary.clone());
    let workloads = KubectlWorkloads::new(Arc::clone(&executor), config.kubectl_binary.clone())
        .with_request_timeout(config.command_timeout_secs);

    let sequencer = Sequencer::new(
        &state,
        &*executor,
        &workloads,
        SequencerSettings {
            namespace: config.namespace.clone(),
            ceph_binary: config.ceph_binary.clone(),
        },
    );
    let options = BatchOptions {
        dry_run,
        parallelism: config.parallelism,
    };
    let report = BatchRemover::new(&writer, &sequencer, options)
        .remove_devices(ids)
        .context("device removal aborted")?;

    let lines = render_outcome_lines(&report);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in &lines {
            println!("{}", line);
        }
        println!(
            "succeeded={} skipped={} failed={}",
            report.succeeded(),
            report.skipped(),
            report.failed()
        );
    }

    finish_run(&report, &lines, config.report_base.as_deref(), |count| {
        error!(
            count,
            "some devices are marked out but not purged, operator attention required"
        )
    })?;
    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Raises the unpurged-device alert before anything that can fail, then
/// writes the report bundle if a base directory is configured.
fn finish_run(
    report: &BatchReport,
    lines: &[String],
    report_base: Option<&Path>,
    alert_unpurged: impl FnOnce(usize),
) -> Result<()> {
    if report.purge_failures() > 0 {
        alert_unpurged(report.purge_failures());
    }
    if let Some(base) = report_base {
        let paths = create_removal_report(base, report, Some(&lines.join("\n")))?;
        info!(root = %paths.root.display(), "wrote removal report");
    }
    Ok(())
}

fn build_executor(writer: &CephConfigWriter, config: &DecomConfig) -> Arc<ProcessExecutor> {
    let executor = writer
        .ceph_env(config.command_timeout_secs)
        .into_iter()
        .fold(ProcessExecutor::new(), |executor, (key, value)| executor.with_env(key, value));
    Arc::new(executor)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "decom={level},decom_workflow_engine={level},decom_host_linux={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

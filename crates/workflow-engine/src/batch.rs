use crate::sequencer::Sequencer;
use decom_core::{
    now_utc_rfc3339, BatchError, BatchReport, ConfigMaterializer, DeviceId, RemovalOutcome,
    SkipReason,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Only run the liveness check; nothing is mutated.
    pub dry_run: bool,
    /// Worker threads. 1 processes devices serially in input order.
    pub parallelism: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            parallelism: 1,
        }
    }
}

enum Planned {
    Device { identifier: String, id: DeviceId },
    Done(RemovalOutcome),
}

pub struct BatchRemover<'a> {
    config: &'a dyn ConfigMaterializer,
    sequencer: &'a Sequencer<'a>,
    options: BatchOptions,
}

impl<'a> BatchRemover<'a> {
    pub fn new(config: &'a dyn ConfigMaterializer, sequencer: &'a Sequencer<'a>, options: BatchOptions) -> Self {
        Self {
            config,
            sequencer,
            options,
        }
    }

    /// Removes every listed device, isolating per-device failures. Only a
    /// failure to write the cluster config aborts the batch.
    pub fn remove_devices<S: AsRef<str>>(&self, identifiers: &[S]) -> Result<BatchReport, BatchError> {
        let started_at = now_utc_rfc3339();

        if let Err(err) = self.config.write_cluster_config() {
            error!(error = %err, "failed to write the cluster config");
            return Err(err.into());
        }

        let plan = plan(identifiers);
        let outcomes = if self.options.parallelism > 1 {
            self.run_parallel(plan)
        } else {
            plan.into_iter().map(|planned| self.run_one(planned)).collect()
        };

        let report = BatchReport::new(started_at, self.options.dry_run, outcomes);
        info!(
            run_id = %report.run_id,
            succeeded = report.succeeded(),
            skipped = report.skipped(),
            failed = report.failed(),
            "finished removing devices"
        );
        Ok(report)
    }

    fn run_one(&self, planned: Planned) -> RemovalOutcome {
        match planned {
            Planned::Done(outcome) => outcome,
            Planned::Device { identifier, id } => self.process(identifier, id),
        }
    }

    fn run_parallel(&self, plan: Vec<Planned>) -> Vec<RemovalOutcome> {
        let total = plan.len();
        let workers = self.options.parallelism.min(total).max(1);
        let slots: Vec<std::sync::Mutex<Option<Planned>>> =
            plan.into_iter().map(|p| std::sync::Mutex::new(Some(p))).collect();
        let cursor = AtomicUsize::new(0);
        let (slots, cursor) = (&slots, &cursor);

        let mut finished: Vec<(usize, RemovalOutcome)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let index = cursor.fetch_add(1, Ordering::SeqCst);
                            if index >= total {
                                break;
                            }
                            let planned = slots[index]
                                .lock()
                                .unwrap_or_else(std::sync::PoisonError::into_inner)
                                .take();
                            if let Some(planned) = planned {
                                done.push((index, self.run_one(planned)));
                            }
                        }
                        done
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
                })
                .collect()
        });

        finished.sort_by_key(|(index, _)| *index);
        finished.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn process(&self, identifier: String, id: DeviceId) -> RemovalOutcome {
        if self.options.dry_run {
            return match self.sequencer.check_precondition(id) {
                Ok(host) => {
                    info!(osd = %id, host = %host, "dry run: device would be removed");
                    RemovalOutcome::Skipped {
                        identifier,
                        reason: SkipReason::DryRun { host },
                    }
                }
                Err(error) => {
                    warn!(osd = %id, error = %error, "dry run: device cannot be removed");
                    RemovalOutcome::Failed { id, error }
                }
            };
        }

        match self.sequencer.remove_device(id) {
            Ok(removal) => RemovalOutcome::Succeeded {
                id,
                host: removal.host,
                advisories: removal.advisories,
            },
            Err(error) => {
                error!(osd = %id, error = %error, "failed to remove device");
                RemovalOutcome::Failed { id, error }
            }
        }
    }
}

fn plan<S: AsRef<str>>(identifiers: &[S]) -> Vec<Planned> {
    let mut seen = HashSet::new();
    identifiers
        .iter()
        .map(|identifier| {
            let identifier = identifier.as_ref();
            info!(identifier, "removing device");
            match identifier.parse::<DeviceId>() {
                Err(err) => {
                    error!(identifier, error = %err, "invalid device id");
                    Planned::Done(skip(identifier, err.to_string()))
                }
                Ok(id) if !seen.insert(id) => {
                    warn!(osd = %id, "device listed more than once");
                    Planned::Done(skip(identifier, format!("duplicate of osd.{}", id)))
                }
                Ok(id) => Planned::Device {
                    identifier: identifier.to_string(),
                    id,
                },
            }
        })
        .collect()
}

fn skip(identifier: &str, message: String) -> RemovalOutcome {
    RemovalOutcome::Skipped {
        identifier: identifier.to_string(),
        reason: SkipReason::InvalidIdentifier { message },
    }
}

//! Device decommissioning: the per-device [`Sequencer`] and the
//! [`BatchRemover`] that drives it over a list of operator-supplied ids.

mod batch;
mod ceph_admin;
mod host_locks;
mod sequencer;

#[cfg(test)]
mod testing;

pub use batch::{BatchOptions, BatchRemover};
pub use ceph_admin::CephAdmin;
pub use host_locks::HostLocks;
pub use sequencer::{Removal, Sequencer, SequencerSettings, StepOutcome};

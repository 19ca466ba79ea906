//! Linux adapters that talk to a live cluster through the `ceph` and
//! `kubectl` command line tools.

pub mod ceph_config;
pub mod executor;
pub mod kubectl;
pub mod osd_tree;

pub use ceph_config::CephConfigWriter;
pub use executor::ProcessExecutor;
pub use kubectl::KubectlWorkloads;
pub use osd_tree::OsdTreeQuery;

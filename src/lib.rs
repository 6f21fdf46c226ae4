//! Keeps KEDA cron `ScaledObject`s in step with the scaling schedule
//! configured for each namespace.
//!
//! [`policy`] resolves the schedule for a workload, [`translate`] maps it to
//! and from a `ScaledObject`, and [`patch`] computes the JSON patch between
//! two policies. [`reconciliation`] drives them against a cluster.

pub mod error;
pub mod patch;
pub mod policy;
pub mod reconciliation;
pub mod translate;

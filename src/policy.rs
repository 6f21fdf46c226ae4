//! Scaling policies and their resolution from the namespace configuration.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize};

/// Resolved scaling parameters for a single workload.
///
/// Fields omitted from a configuration document take their zero value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Cron schedule at which the workload is scaled up.
    pub start: String,
    /// Cron schedule at which the workload is scaled back down.
    pub stop: String,
    pub desired: i32,
    pub min: i32,
    pub max: i32,
}

impl Policy {
    /// Policy applied to every workload of a namespace whose configuration
    /// has no `default` entry.
    pub fn fallback() -> Self {
        Policy {
            start: FALLBACK_START.to_string(),
            stop: FALLBACK_STOP.to_string(),
            desired: 1,
            min: 0,
            max: 1,
        }
    }
}

pub const FALLBACK_START: &str = "0 9 * * 1,2,3,4,5";
pub const FALLBACK_STOP: &str = "0 20 * * 1,2,3,4,5";

/// Workload kinds which can carry an override in [`LayeredConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-namespace scaling configuration, as stored in the `config` entry of
/// the namespace's configuration map.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayeredConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Policy>,

    #[serde(
        default,
        deserialize_with = "without_null_entries",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub deployments: BTreeMap<String, Policy>,

    #[serde(
        default,
        deserialize_with = "without_null_entries",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub statefulsets: BTreeMap<String, Policy>,
}

/// Entries left without a value (`api:`) are not overrides.
fn without_null_entries<'de, D>(deserializer: D) -> Result<BTreeMap<String, Policy>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<BTreeMap<String, Option<Policy>>>::deserialize(deserializer)?;

    Ok(entries
        .into_iter()
        .flatten()
        .filter_map(|(name, policy)| Some((name, policy?)))
        .collect())
}

impl LayeredConfig {
    pub fn from_yaml(document: &str) -> Result<Self, serde_yaml::Error> {
        // Empty and null documents are a valid, empty configuration.
        if document.trim().is_empty() {
            return Ok(LayeredConfig::default());
        }
        Ok(serde_yaml::from_str::<Option<LayeredConfig>>(document)?.unwrap_or_default())
    }

    pub fn overrides(&self, kind: WorkloadKind) -> &BTreeMap<String, Policy> {
        match kind {
            WorkloadKind::Deployment => &self.deployments,
            WorkloadKind::StatefulSet => &self.statefulsets,
        }
    }

    pub fn has_overrides(&self) -> bool {
        !self.deployments.is_empty() || !self.statefulsets.is_empty()
    }
}

/// Layer of the configuration a resolved policy was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicySource {
    /// The configuration has no default, so the built-in policy applies.
    /// Overrides are not consulted in this case.
    Fallback,
    Override,
    Default,
}

impl fmt::Display for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicySource::Fallback => "fallback",
            PolicySource::Override => "override",
            PolicySource::Default => "default",
        })
    }
}

/// Effective policy for the named workload.
pub fn resolve(name: &str, kind: WorkloadKind, config: &LayeredConfig) -> Policy {
    resolve_with_source(name, kind, config).0
}

pub fn resolve_with_source(
    name: &str,
    kind: WorkloadKind,
    config: &LayeredConfig,
) -> (Policy, PolicySource) {
    let Some(default) = &config.default else {
        return (Policy::fallback(), PolicySource::Fallback);
    };

    match config.overrides(kind).get(name) {
        Some(policy) => (policy.clone(), PolicySource::Override),
        None => (default.clone(), PolicySource::Default),
    }
}

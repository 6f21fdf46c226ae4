//! Conversion between [`Policy`] and KEDA [`ScaledObject`]s carrying a cron trigger.

use std::collections::BTreeMap;

use cron_scaler_crds::{
    cron_metadata, ScaleTarget, ScaleTrigger, ScaledObject, ScaledObjectSpec, CRON_TRIGGER_TYPE,
};
use kube::ResourceExt as _;

use crate::{
    error::{Error, Result},
    policy::{Policy, WorkloadKind},
};

/// Schedule assumed for a scaled object without a cron trigger.
pub const UNSCHEDULED_START: &str = "00 10 * * 1,2,3,4,5";
pub const UNSCHEDULED_STOP: &str = "00 20 * * 1,2,3,4,5";

/// Desired replica count assumed for a scaled object without a cron trigger.
pub const UNSCHEDULED_DESIRED_REPLICAS: i32 = 1;

/// Timezone written into every cron trigger we create.
pub const CRON_TIMEZONE: &str = "Asia/Singapore";

/// How the desired replica count of an existing scaled object was obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicaCount {
    /// No cron trigger present; [`UNSCHEDULED_DESIRED_REPLICAS`] was assumed.
    Absent,
    Parsed(i32),
    /// The trigger's `desiredReplicas` was missing or not an integer.
    /// The decoded policy reports zero in this case.
    Unparsable { raw: String },
}

impl ReplicaCount {
    pub fn value(&self) -> i32 {
        match self {
            ReplicaCount::Absent => UNSCHEDULED_DESIRED_REPLICAS,
            ReplicaCount::Parsed(replicas) => *replicas,
            ReplicaCount::Unparsable { .. } => 0,
        }
    }
}

/// Policy currently expressed by a scaled object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observed {
    pub policy: Policy,
    pub desired_replicas: ReplicaCount,
}

pub fn parse_replicas(raw: &str) -> Result<i32> {
    raw.parse::<i32>().map_err(|source| Error::Parse {
        field: cron_metadata::DESIRED_REPLICAS,
        raw: raw.to_string(),
        source,
    })
}

/// Reads the policy back out of an existing scaled object.
///
/// Replica bounds are mandatory. The cron trigger is not: without one, the
/// `UNSCHEDULED_*` values stand in for the schedule and desired replicas.
pub fn decode(scaled_object: &ScaledObject) -> Result<Observed> {
    let spec = &scaled_object.spec;

    let min = spec.min_replica_count.ok_or_else(|| Error::InvalidBounds {
        name: scaled_object.name_any(),
        missing: "minReplicaCount",
    })?;
    let max = spec.max_replica_count.ok_or_else(|| Error::InvalidBounds {
        name: scaled_object.name_any(),
        missing: "maxReplicaCount",
    })?;

    let mut start = UNSCHEDULED_START.to_string();
    let mut stop = UNSCHEDULED_STOP.to_string();
    let mut desired_replicas = ReplicaCount::Absent;

    // With several cron triggers, the last one wins.
    if let Some(trigger) = scaled_object.cron_triggers().last() {
        let metadata = |key: &str| trigger.metadata.get(key).cloned().unwrap_or_default();

        let raw = metadata(cron_metadata::DESIRED_REPLICAS);
        desired_replicas = match parse_replicas(&raw) {
            Ok(replicas) => ReplicaCount::Parsed(replicas),
            Err(_) => ReplicaCount::Unparsable { raw },
        };
        start = metadata(cron_metadata::START);
        stop = metadata(cron_metadata::END);
    }

    Ok(Observed {
        policy: Policy {
            start,
            stop,
            desired: desired_replicas.value(),
            min,
            max,
        },
        desired_replicas,
    })
}

/// Builds a new scaled object targeting the named workload.
pub fn encode(namespace: &str, name: &str, kind: WorkloadKind, policy: &Policy) -> ScaledObject {
    let metadata = BTreeMap::from([
        (
            cron_metadata::DESIRED_REPLICAS.to_string(),
            policy.desired.to_string(),
        ),
        (cron_metadata::START.to_string(), policy.start.clone()),
        (cron_metadata::END.to_string(), policy.stop.clone()),
        (cron_metadata::TIMEZONE.to_string(), CRON_TIMEZONE.to_string()),
    ]);

    let mut scaled_object = ScaledObject::new(
        name,
        ScaledObjectSpec {
            scale_target_ref: ScaleTarget {
                name: name.to_string(),
                api_version: None,
                kind: Some(kind.to_string()),
            },
            min_replica_count: Some(policy.min),
            max_replica_count: Some(policy.max),
            triggers: vec![ScaleTrigger {
                name: Some(CRON_TRIGGER_TYPE.to_string()),
                type_: CRON_TRIGGER_TYPE.to_string(),
                metadata,
            }],
            ..ScaledObjectSpec::default()
        },
    );
    scaled_object.metadata.namespace = Some(namespace.to_string());

    scaled_object
}

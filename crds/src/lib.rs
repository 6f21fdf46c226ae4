use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Trigger type recognized by KEDA's cron scaler.
pub const CRON_TRIGGER_TYPE: &str = "cron";

/// Metadata keys understood by the cron scaler.
pub mod cron_metadata {
    pub const DESIRED_REPLICAS: &str = "desiredReplicas";
    pub const START: &str = "start";
    pub const END: &str = "end";
    pub const TIMEZONE: &str = "timezone";
}

/// KEDA ScaledObject, restricted to the fields this controller reads or writes.
/// Unknown fields in objects read from the cluster are ignored.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "keda.sh",
    version = "v1alpha1",
    kind = "ScaledObject",
    shortname = "so",
    namespaced,
    status = "ScaledObjectStatus",
    printcolumn = r#"{"name": "Target", "type": "string", "jsonPath": ".spec.scaleTargetRef.name"}"#,
    printcolumn = r#"{"name": "Min", "type": "integer", "jsonPath": ".spec.minReplicaCount"}"#,
    printcolumn = r#"{"name": "Max", "type": "integer", "jsonPath": ".spec.maxReplicaCount"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ScaledObjectSpec {
    pub scale_target_ref: ScaleTarget,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replica_count: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replica_count: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_interval: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_period: Option<i32>,

    #[serde(default)]
    pub triggers: Vec<ScaleTrigger>,
}

/// Workload scaled by a [`ScaledObject`].
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScaleTarget {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Defaults to `Deployment` on the KEDA side when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScaleTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ScaleTrigger {
    pub fn is_cron(&self) -> bool {
        self.type_ == CRON_TRIGGER_TYPE
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScaledObjectStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_target_kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_replica_count: Option<i32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<serde_json::Value>,
}

impl ScaledObject {
    /// Cron triggers in declaration order.
    pub fn cron_triggers(&self) -> impl Iterator<Item = &ScaleTrigger> {
        self.spec.triggers.iter().filter(|trigger| trigger.is_cron())
    }
}

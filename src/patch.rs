//! Minimal JSON patches moving an existing scaled object to a desired policy.

use serde::{Serialize, Serializer};

use crate::policy::Policy;

/// A `replace` operation on one of the fields a [`Policy`] maps onto.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchOp {
    MaxReplicas(i32),
    MinReplicas(i32),
    DesiredReplicas(i32),
    Start(String),
    Stop(String),
}

impl PatchOp {
    pub fn path(&self) -> &'static str {
        match self {
            PatchOp::MaxReplicas(_) => "/spec/maxReplicaCount",
            PatchOp::MinReplicas(_) => "/spec/minReplicaCount",
            PatchOp::DesiredReplicas(_) => "/spec/triggers/0/metadata/desiredReplicas",
            PatchOp::Start(_) => "/spec/triggers/0/metadata/start",
            PatchOp::Stop(_) => "/spec/triggers/0/metadata/end",
        }
    }
}

#[derive(Serialize)]
struct Replace<T> {
    op: &'static str,
    path: &'static str,
    value: T,
}

impl Serialize for PatchOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let path = self.path();
        match self {
            PatchOp::MaxReplicas(replicas) | PatchOp::MinReplicas(replicas) => Replace {
                op: "replace",
                path,
                value: replicas,
            }
            .serialize(serializer),
            // Trigger metadata is a string map.
            PatchOp::DesiredReplicas(replicas) => Replace {
                op: "replace",
                path,
                value: replicas.to_string(),
            }
            .serialize(serializer),
            PatchOp::Start(schedule) | PatchOp::Stop(schedule) => Replace {
                op: "replace",
                path,
                value: schedule,
            }
            .serialize(serializer),
        }
    }
}

/// Operations needed to turn `current` into `desired`, one per differing
/// field, always in the order max, min, desired, start, stop.
pub fn diff(desired: &Policy, current: &Policy) -> Vec<PatchOp> {
    let mut patches = Vec::new();

    if desired.max != current.max {
        patches.push(PatchOp::MaxReplicas(desired.max));
    }
    if desired.min != current.min {
        patches.push(PatchOp::MinReplicas(desired.min));
    }
    if desired.desired != current.desired {
        patches.push(PatchOp::DesiredReplicas(desired.desired));
    }
    if desired.start != current.start {
        patches.push(PatchOp::Start(desired.start.clone()));
    }
    if desired.stop != current.stop {
        patches.push(PatchOp::Stop(desired.stop.clone()));
    }

    patches
}

/// Converts the operations into a patch body for `kube::api::Patch::Json`.
pub fn to_json_patch(patches: &[PatchOp]) -> crate::error::Result<json_patch::Patch> {
    Ok(serde_json::from_value(serde_json::to_value(patches)?)?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{diff, to_json_patch, PatchOp};
    use crate::{
        policy::{Policy, WorkloadKind},
        translate::{decode, encode},
    };

    fn weekday_policy() -> Policy {
        Policy {
            start: "0 9 * * 1-5".to_string(),
            stop: "0 20 * * 1-5".to_string(),
            desired: 2,
            min: 0,
            max: 3,
        }
    }

    #[test]
    fn identical_policies_need_no_patch() {
        for policy in [weekday_policy(), Policy::fallback(), Policy::default()] {
            assert!(diff(&policy, &policy).is_empty());
        }
    }

    #[test]
    fn raised_maximum_is_a_single_replace() {
        let desired = weekday_policy();
        let current = decode(&encode(
            "shop",
            "web",
            WorkloadKind::Deployment,
            &Policy {
                max: 1,
                ..weekday_policy()
            },
        ))
        .unwrap()
        .policy;

        let patches = diff(&desired, &current);

        assert_eq!(patches, vec![PatchOp::MaxReplicas(3)]);
        assert_eq!(
            serde_json::to_value(&patches).unwrap(),
            json!([{"op": "replace", "path": "/spec/maxReplicaCount", "value": 3}])
        );
    }

    #[test]
    fn each_field_maps_to_its_own_path() {
        let desired = weekday_policy();
        let cases = [
            (Policy { max: 9, ..desired.clone() }, "/spec/maxReplicaCount"),
            (Policy { min: 1, ..desired.clone() }, "/spec/minReplicaCount"),
            (
                Policy { desired: 7, ..desired.clone() },
                "/spec/triggers/0/metadata/desiredReplicas",
            ),
            (
                Policy { start: "0 8 * * *".to_string(), ..desired.clone() },
                "/spec/triggers/0/metadata/start",
            ),
            (
                Policy { stop: "0 21 * * *".to_string(), ..desired.clone() },
                "/spec/triggers/0/metadata/end",
            ),
        ];

        for (current, path) in cases {
            let patches = diff(&desired, &current);
            assert_eq!(patches.len(), 1, "expected one patch for {path}");
            assert_eq!(patches[0].path(), path);
        }
    }

    #[test]
    fn patches_are_emitted_in_fixed_order() {
        let desired = weekday_policy();
        let current = Policy {
            start: "0 6 * * *".to_string(),
            stop: "0 23 * * *".to_string(),
            desired: 1,
            min: 1,
            max: 1,
        };

        assert_eq!(
            serde_json::to_value(diff(&desired, &current)).unwrap(),
            json!([
                {"op": "replace", "path": "/spec/maxReplicaCount", "value": 3},
                {"op": "replace", "path": "/spec/minReplicaCount", "value": 0},
                {"op": "replace", "path": "/spec/triggers/0/metadata/desiredReplicas", "value": "2"},
                {"op": "replace", "path": "/spec/triggers/0/metadata/start", "value": "0 9 * * 1-5"},
                {"op": "replace", "path": "/spec/triggers/0/metadata/end", "value": "0 20 * * 1-5"},
            ])
        );
    }

    #[test]
    fn applying_the_diff_reaches_the_desired_policy() {
        let desired = weekday_policy();
        let currents = [
            Policy::fallback(),
            Policy { desired: 5, ..weekday_policy() },
            Policy {
                start: "15 7 * * 6".to_string(),
                stop: "45 22 * * 0".to_string(),
                desired: 0,
                min: 4,
                max: 8,
            },
        ];

        for current in currents {
            let existing = encode("shop", "web", WorkloadKind::Deployment, &current);
            let patch = to_json_patch(&diff(&desired, &current)).unwrap();

            let mut document = serde_json::to_value(&existing).unwrap();
            json_patch::patch(&mut document, &patch.0).unwrap();

            let patched = serde_json::from_value(document).unwrap();
            assert_eq!(decode(&patched).unwrap().policy, desired);
        }
    }

    #[test]
    fn empty_diff_is_an_empty_patch() {
        let patch = to_json_patch(&[]).unwrap();
        assert!(patch.0.is_empty());
    }
}

use std::collections::{BTreeMap, BTreeSet};

use cron_scaler_crds::ScaledObject;
use k8s_openapi::api::{
    apps::v1::{Deployment, StatefulSet},
    core::v1::{ConfigMap, Namespace},
};
use kube::{
    api::{ListParams, Patch, PatchParams, PostParams},
    Api, Client, ResourceExt as _,
};
use tracing::{debug, error, info, warn};

use crate::{
    error::Result,
    patch::{diff, to_json_patch, PatchOp},
    policy::{resolve_with_source, LayeredConfig, PolicySource, WorkloadKind},
    translate::{decode, encode, ReplicaCount},
};

pub const CONTROLLER_NAME: &str = "cron-scaler";

pub const DEFAULT_CONFIG_MAP: &str = "scaling-configuration";
pub const DEFAULT_CONFIG_KEY: &str = "config";

#[derive(Clone, Debug)]
pub struct Settings {
    pub excluded_namespaces: BTreeSet<String>,
    pub config_map: String,
    pub config_key: String,
    /// Submit creations and patches as server-side dry runs.
    pub dry_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            excluded_namespaces: BTreeSet::new(),
            config_map: DEFAULT_CONFIG_MAP.to_string(),
            config_key: DEFAULT_CONFIG_KEY.to_string(),
            dry_run: false,
        }
    }
}

/// Counts of what a reconciliation pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub created: usize,
    pub patched: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped_namespaces: usize,
    pub failed_namespaces: usize,
}

impl Summary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.failed_namespaces > 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workload {
    pub name: String,
    pub kind: WorkloadKind,
}

/// What has to happen to a workload's scaled object.
#[derive(Clone, Debug)]
pub enum Action {
    Create(ScaledObject),
    Patch(Vec<PatchOp>),
    Unchanged,
}

/// Decides how to bring `existing` in line with the configured policy for `workload`.
pub fn plan(
    namespace: &str,
    workload: &Workload,
    config: &LayeredConfig,
    existing: Option<&ScaledObject>,
) -> Result<Action> {
    let (desired, source) = resolve_with_source(&workload.name, workload.kind, config);
    debug!(
        "{} {namespace}/{} uses {source} policy {desired:?}",
        workload.kind, workload.name
    );

    let Some(existing) = existing else {
        return Ok(Action::Create(encode(
            namespace,
            &workload.name,
            workload.kind,
            &desired,
        )));
    };

    let current = decode(existing)?;
    if let ReplicaCount::Unparsable { raw } = &current.desired_replicas {
        warn!(
            "scaledobject {namespace}/{} has unparsable desiredReplicas {raw:?}, treating as 0",
            existing.name_any()
        );
    }

    let patches = diff(&desired, &current.policy);
    if patches.is_empty() {
        Ok(Action::Unchanged)
    } else {
        Ok(Action::Patch(patches))
    }
}

struct NamespaceState {
    config: LayeredConfig,
    workloads: Vec<Workload>,
    scaled_objects: BTreeMap<String, ScaledObject>,
}

/// Reads the namespace configuration out of its configmap.
///
/// A missing configmap or entry is an empty configuration, so every
/// workload of the namespace gets the fallback policy.
pub fn layered_config(
    namespace: &str,
    config_map: Option<&ConfigMap>,
    settings: &Settings,
) -> Result<LayeredConfig> {
    let Some(config_map) = config_map else {
        debug!(
            "namespace {namespace} has no configmap {}, using fallback policy",
            settings.config_map
        );
        return Ok(LayeredConfig::default());
    };

    let Some(document) = config_map
        .data
        .as_ref()
        .and_then(|data| data.get(&settings.config_key))
    else {
        warn!(
            "configmap {namespace}/{} has no {:?} entry, using fallback policy",
            settings.config_map, settings.config_key
        );
        return Ok(LayeredConfig::default());
    };

    Ok(LayeredConfig::from_yaml(document)?)
}

async fn fetch_namespace(
    client: &Client,
    namespace: &str,
    settings: &Settings,
) -> Result<NamespaceState> {
    let config_maps = Api::<ConfigMap>::namespaced(client.clone(), namespace);
    let deployments = Api::<Deployment>::namespaced(client.clone(), namespace);
    let statefulsets = Api::<StatefulSet>::namespaced(client.clone(), namespace);
    let scaled_objects = Api::<ScaledObject>::namespaced(client.clone(), namespace);

    let list_params = ListParams::default();
    let (config_map, deployments, statefulsets, scaled_objects) = futures::try_join!(
        config_maps.get_opt(&settings.config_map),
        deployments.list(&list_params),
        statefulsets.list(&list_params),
        scaled_objects.list(&list_params),
    )?;

    let workloads = deployments
        .iter()
        .map(|deployment| Workload {
            name: deployment.name_any(),
            kind: WorkloadKind::Deployment,
        })
        .chain(statefulsets.iter().map(|statefulset| Workload {
            name: statefulset.name_any(),
            kind: WorkloadKind::StatefulSet,
        }))
        .collect();

    Ok(NamespaceState {
        config: layered_config(namespace, config_map.as_ref(), settings)?,
        workloads,
        scaled_objects: scaled_objects
            .into_iter()
            .map(|scaled_object| (scaled_object.name_any(), scaled_object))
            .collect(),
    })
}

async fn apply(
    api: &Api<ScaledObject>,
    name: &str,
    action: Action,
    dry_run: bool,
) -> Result<()> {
    match action {
        Action::Create(scaled_object) => {
            let params = PostParams {
                dry_run,
                field_manager: Some(CONTROLLER_NAME.to_string()),
                ..PostParams::default()
            };

            api.create(&params, &scaled_object).await?;
        }
        Action::Patch(patches) => {
            info!("{}", serde_json::to_string(&patches)?);

            let params = PatchParams {
                dry_run,
                field_manager: Some(CONTROLLER_NAME.to_string()),
                ..PatchParams::default()
            };

            api.patch(name, &params, &Patch::Json::<()>(to_json_patch(&patches)?))
                .await?;
        }
        Action::Unchanged => {}
    }

    Ok(())
}

async fn reconcile_namespace(
    client: &Client,
    namespace: &str,
    settings: &Settings,
    summary: &mut Summary,
) -> Result<()> {
    let state = fetch_namespace(client, namespace, settings).await?;

    if state.config.default.is_none() && state.config.has_overrides() {
        warn!(
            "namespace {namespace} configures overrides without a default; \
             all workloads get the {} policy",
            PolicySource::Fallback
        );
    }

    let api = Api::<ScaledObject>::namespaced(client.clone(), namespace);
    let mut seen = BTreeSet::new();

    for workload in &state.workloads {
        if !seen.insert(workload.name.as_str()) {
            warn!(
                "{} {namespace}/{} shares its name with another workload, skipping",
                workload.kind, workload.name
            );
            continue;
        }

        let action = match plan(
            namespace,
            workload,
            &state.config,
            state.scaled_objects.get(&workload.name),
        ) {
            Ok(action) => action,
            Err(e) => {
                error!("{} {namespace}/{}: {e}", workload.kind, workload.name);
                summary.failed += 1;
                continue;
            }
        };

        let outcome = match &action {
            Action::Create(_) => {
                info!("creating scaledobject for {} {namespace}/{}", workload.kind, workload.name);
                &mut summary.created
            }
            Action::Patch(patches) => {
                info!(
                    "patching scaledobject {namespace}/{} ({} changes)",
                    workload.name,
                    patches.len()
                );
                &mut summary.patched
            }
            Action::Unchanged => {
                debug!("scaledobject {namespace}/{} is up to date", workload.name);
                &mut summary.unchanged
            }
        };

        match apply(&api, &workload.name, action, settings.dry_run).await {
            Ok(()) => *outcome += 1,
            Err(e) => {
                error!("failed to update scaledobject {namespace}/{}: {e}", workload.name);
                summary.failed += 1;
            }
        }
    }

    Ok(())
}

/// Runs a single pass over every namespace not excluded by `settings`.
pub async fn reconcile(client: Client, settings: &Settings) -> Result<Summary> {
    let namespaces = Api::<Namespace>::all(client.clone())
        .list(&ListParams::default())
        .await?;

    let mut summary = Summary::default();

    for namespace in namespaces {
        let namespace = namespace.name_any();
        if settings.excluded_namespaces.contains(&namespace) {
            debug!("namespace {namespace} is excluded");
            summary.skipped_namespaces += 1;
            continue;
        }

        info!("reconciling namespace {namespace}");
        if let Err(e) = reconcile_namespace(&client, &namespace, settings, &mut summary).await {
            error!("namespace {namespace} reconciliation encountered error: {e}");
            summary.failed_namespaces += 1;
        }
    }

    Ok(summary)
}

use std::num::ParseIntError;

use kube::config::{InClusterError, KubeconfigError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] KubeconfigError),

    #[error("in-cluster config error: {0}")]
    InCluster(#[from] InClusterError),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot parse {field} {raw:?}: {source}")]
    Parse {
        field: &'static str,
        raw: String,
        #[source]
        source: ParseIntError,
    },

    #[error("scaledobject {name} has no {missing} set")]
    InvalidBounds { name: String, missing: &'static str },
}

/// Short alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

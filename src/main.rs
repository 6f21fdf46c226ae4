use std::{path::PathBuf, process::ExitCode};

use clap::{ArgAction, Parser, Subcommand};
use cron_scaler::{
    error::Result,
    reconciliation::{self, Settings, DEFAULT_CONFIG_KEY, DEFAULT_CONFIG_MAP},
};
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Use in-cluster service account credentials.
    #[arg(long, global = true, default_value_t = true, action = ArgAction::Set)]
    incluster: bool,

    /// Kubeconfig used when not running in-cluster. Defaults to the
    /// standard kubeconfig lookup.
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a single reconciliation pass over all namespaces.
    Reconcile(ReconcileArgs),
}

#[derive(Debug, clap::Args)]
struct ReconcileArgs {
    /// Namespace to leave untouched. May be repeated or comma separated.
    #[arg(long = "excluded-namespace", value_delimiter = ',')]
    excluded_namespaces: Vec<String>,

    /// Name of the configmap holding each namespace's scaling configuration.
    #[arg(long, default_value = DEFAULT_CONFIG_MAP)]
    config_map: String,

    /// Key of the configmap entry holding the configuration document.
    #[arg(long, default_value = DEFAULT_CONFIG_KEY)]
    config_key: String,

    /// Send creations and patches as server-side dry runs.
    #[arg(long)]
    dry_run: bool,
}

impl From<ReconcileArgs> for Settings {
    fn from(args: ReconcileArgs) -> Self {
        Settings {
            excluded_namespaces: args.excluded_namespaces.into_iter().collect(),
            config_map: args.config_map,
            config_key: args.config_key,
            dry_run: args.dry_run,
        }
    }
}

async fn client(args: &Args) -> Result<Client> {
    let config = if args.incluster {
        Config::incluster()?
    } else if let Some(path) = &args.kubeconfig {
        Config::from_custom_kubeconfig(Kubeconfig::read_from(path)?, &KubeConfigOptions::default())
            .await?
    } else {
        Config::from_kubeconfig(&KubeConfigOptions::default()).await?
    };

    Ok(Client::try_from(config)?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let client = match client(&args).await {
        Ok(client) => client,
        Err(e) => {
            error!("failed to connect to cluster: {e}");
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Command::Reconcile(reconcile_args) => {
            let settings = Settings::from(reconcile_args);

            match reconciliation::reconcile(client, &settings).await {
                Ok(summary) => {
                    info!("reconciled {:?}", summary);
                    if summary.has_failures() {
                        ExitCode::FAILURE
                    } else {
                        ExitCode::SUCCESS
                    }
                }
                Err(e) => {
                    error!("reconcile failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

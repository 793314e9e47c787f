//! Kubeforge CLI - test-cluster infrastructure and worker machine lifecycle

use clap::{Args, Parser, Subcommand};
use kubeforge_provision::{Provider, ProvisionSettings};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod cluster;
mod commands;
mod display;
mod error;
mod exit_codes;
mod interrupt;

use error::Result;
use interrupt::Interrupt;

#[derive(Parser)]
#[command(name = "kubeforge")]
#[command(version)]
#[command(about = "Provision test-cluster infrastructure and manage machine-controller worker machines", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Cancel the operation after this long (e.g. 30m, 1h30m)
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
}

#[derive(Args)]
struct TerraformArgs {
    /// Cloud provider (aws, digitalocean, hetzner)
    provider: Provider,

    /// Scratch directory of the test run, removed on cleanup
    #[arg(long)]
    test_path: Option<PathBuf>,

    /// Unique run identifier, used as the remote state key
    #[arg(long, env = "BUILD_ID")]
    identifier: Option<String>,

    /// Directory containing one terraform configuration per provider
    #[arg(long)]
    terraform_dir: Option<PathBuf>,

    /// Terraform executable
    #[arg(long)]
    terraform_bin: Option<String>,

    /// State file read by `terraform output`
    #[arg(long)]
    state_file: Option<String>,
}

impl TerraformArgs {
    fn settings(&self) -> ProvisionSettings {
        let defaults = ProvisionSettings::default();
        ProvisionSettings {
            terraform_root: self.terraform_dir.clone().unwrap_or(defaults.terraform_root),
            terraform_binary: self.terraform_bin.clone().unwrap_or(defaults.terraform_binary),
            state_file: self.state_file.clone().unwrap_or(defaults.state_file),
        }
    }

    fn test_path(&self) -> PathBuf {
        self.test_path.clone().unwrap_or_default()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build infrastructure and print the terraform outputs as JSON
    Provision {
        #[command(flatten)]
        terraform: TerraformArgs,

        /// Write the outputs JSON to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Destroy infrastructure and remove the test directory
    Cleanup {
        #[command(flatten)]
        terraform: TerraformArgs,
    },

    /// Deploy the machine-controller or wait for it
    #[command(subcommand)]
    MachineController(MachineControllerCommands),

    /// Manage worker machines
    #[command(subcommand)]
    Machines(MachinesCommands),
}

#[derive(Subcommand)]
enum MachineControllerCommands {
    /// Apply the controller and webhook manifests
    Deploy {
        /// Cluster config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// machine-controller manifest
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// machine-controller webhook manifest
        #[arg(long)]
        webhook_manifest: Option<PathBuf>,

        /// Wait for the components to become ready
        #[arg(long)]
        wait: bool,
    },

    /// Wait for the webhook and controller to become ready
    Wait {
        /// Cluster config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MachinesCommands {
    /// Delete all MachineDeployments, MachineSets and Machines
    Delete {
        /// Cluster config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Namespace holding the machine objects (overrides the config)
        #[arg(short, long)]
        namespace: Option<String>,
    },
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(command: Commands, cancel: &CancellationToken) -> Result<()> {
    match command {
        Commands::Provision { terraform, output } => {
            commands::provision::run(
                terraform.provider,
                &terraform.settings(),
                &terraform.test_path(),
                terraform.identifier.clone(),
                output.as_deref(),
                cancel,
            )
            .await
        }

        Commands::Cleanup { terraform } => {
            commands::cleanup::run(
                terraform.provider,
                &terraform.settings(),
                &terraform.test_path(),
                terraform.identifier.clone(),
                cancel,
            )
            .await
        }

        Commands::MachineController(MachineControllerCommands::Deploy {
            config,
            manifest,
            webhook_manifest,
            wait,
        }) => {
            let config = cluster::load_config(config.as_deref())?;
            commands::machine_controller::deploy(
                &config,
                manifest.as_deref(),
                webhook_manifest.as_deref(),
                wait,
                cancel,
            )
            .await
        }

        Commands::MachineController(MachineControllerCommands::Wait { config }) => {
            let config = cluster::load_config(config.as_deref())?;
            commands::machine_controller::wait(&config, cancel).await
        }

        Commands::Machines(MachinesCommands::Delete { config, namespace }) => {
            let config = cluster::load_config(config.as_deref())?;
            commands::machines::delete(&config, namespace, cancel).await
        }
    }
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let timeout = cli.timeout;
    let interrupt = Interrupt::install(timeout);

    if let Err(err) = run(cli.command, interrupt.token()).await {
        let err = match timeout {
            Some(timeout) if interrupt.timed_out() => err.into_timeout(timeout),
            _ => err,
        };
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

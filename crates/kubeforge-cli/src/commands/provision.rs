//! Provision command - build test infrastructure with terraform

use console::style;
use kubeforge_core::EnvCredentials;
use kubeforge_provision::{
    ProcessRunner, Provider, ProvisionSettings, Provisioner, TerraformOutputs,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::display;
use crate::error::Result;

/// Run the provision command
pub async fn run(
    provider: Provider,
    settings: &ProvisionSettings,
    test_path: &Path,
    identifier: Option<String>,
    output: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<()> {
    let provisioner = Provisioner::new(
        provider,
        settings,
        test_path,
        identifier,
        Arc::new(EnvCredentials),
        ProcessRunner::new(),
    );

    eprintln!(
        "{} Provisioning {} infrastructure from {}",
        style("→").blue().bold(),
        style(provider).cyan(),
        provisioner.terraform().working_dir().display()
    );

    let spinner = display::spinner("terraform init / apply");
    let result = provisioner.provision(cancel).await;
    spinner.finish_and_clear();
    let json = result?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &json).await?;
            eprintln!(
                "{} Outputs written to {}",
                style("✓").green().bold(),
                path.display()
            );
        }
        None => println!("{}", json.trim_end()),
    }

    match TerraformOutputs::parse(&json) {
        Ok(outputs) => display::print_outputs(&outputs),
        Err(e) => eprintln!("{} Outputs are not valid JSON: {}", style("!").yellow(), e),
    }
    eprintln!("{} Infrastructure ready", style("✓").green().bold());

    Ok(())
}

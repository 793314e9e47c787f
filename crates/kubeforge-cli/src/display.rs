//! Display formatting for CLI output
//!
//! Human-readable progress goes to stderr; stdout is reserved for
//! machine-readable output such as the terraform outputs JSON.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use kubeforge_kube::DeletionSummary;
use kubeforge_provision::{OutputValue, TerraformOutputs};
use std::time::Duration;

/// Spinner on stderr for a long-running step
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// One output value as shown to the user
pub fn format_output_value(output: &OutputValue) -> String {
    if output.sensitive {
        return "<sensitive>".to_string();
    }
    match &output.value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn print_outputs(outputs: &TerraformOutputs) {
    if outputs.is_empty() {
        eprintln!("{} No terraform outputs", style("!").yellow());
        return;
    }

    eprintln!("{}", style("Outputs:").bold());
    let width = outputs.names().map(str::len).max().unwrap_or(0);
    for name in outputs.names() {
        if let Some(output) = outputs.get(name) {
            eprintln!(
                "  {}  {}",
                style(format!("{:width$}", name, width = width)).cyan(),
                format_output_value(output)
            );
        }
    }
}

pub fn format_deletion_summary(summary: &DeletionSummary) -> String {
    if summary.skipped {
        return "No machines deleted (skipped)".to_string();
    }
    format!(
        "Deleted {} MachineDeployment(s), {} MachineSet(s), {} Machine(s)",
        summary.machine_deployments, summary.machine_sets, summary.machines
    )
}

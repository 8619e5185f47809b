//! Display formatting for CLI output
//!
//! Step progress goes to stderr so stdout only carries the final URL.

use console::style;
use homeport_core::{StepOutcome, StepReporter, StepStatus};
use homeport_install::{InstallOutcome, LaunchOutcome, UninstallOutcome};

/// Prints each step as it completes
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl StepReporter for ConsoleReporter {
    fn report(&self, outcome: &StepOutcome) {
        eprintln!("{}", format_step(outcome));
    }
}

fn format_step(outcome: &StepOutcome) -> String {
    let icon = match outcome.status {
        StepStatus::Ok => style("✓").green().bold(),
        StepStatus::Warn => style("⚠").yellow().bold(),
        StepStatus::Fail => style("✗").red().bold(),
    };
    format!(
        "{} {} {}",
        icon,
        style(format!("{:<16}", outcome.step)).dim(),
        outcome.message
    )
}

/// Header printed before a command starts
pub fn print_header(action: &str, cluster: &str, provider: &str) {
    eprintln!(
        "{} {} cluster {} ({})",
        style("→").blue().bold(),
        action,
        style(cluster).cyan(),
        style(provider).yellow()
    );
    eprintln!();
}

pub fn print_install_summary(outcome: &InstallOutcome) {
    eprintln!();
    for release in &outcome.releases {
        eprintln!(
            "  {} {} {} (revision {}, {})",
            style("•").dim(),
            style(&release.name).cyan(),
            release.chart_version,
            release.revision,
            release.namespace
        );
    }
    eprintln!();

    match &outcome.launch {
        LaunchOutcome::Launched { url } => {
            eprintln!("{} homeport is running at {}", style("✓").green().bold(), style(url).cyan());
        }
        LaunchOutcome::Manual { url, .. } | LaunchOutcome::Skipped { url } => {
            eprintln!(
                "{} homeport is running; open {} in your browser",
                style("✓").green().bold(),
                style(url).cyan()
            );
        }
    }
    println!("{}", outcome.url());
}

pub fn print_uninstall_summary(cluster: &str, outcome: &UninstallOutcome) {
    eprintln!();
    if !outcome.cluster_existed {
        eprintln!(
            "{} cluster {} does not exist, nothing to do",
            style("✓").green().bold(),
            style(cluster).cyan()
        );
        return;
    }

    let warnings = outcome
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Warn)
        .count();
    if warnings == 0 {
        eprintln!("{} homeport uninstalled", style("✓").green().bold());
    } else {
        eprintln!(
            "{} homeport uninstalled with {}",
            style("⚠").yellow().bold(),
            pluralize(warnings, "warning", "warnings")
        );
    }
}

/// Format count with proper pluralization
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_step() {
        console::set_colors_enabled(false);
        let line = format_step(&StepOutcome::warn("liveness", "open http://localhost:8000"));
        assert!(line.starts_with("⚠ liveness"));
        assert!(line.ends_with("open http://localhost:8000"));
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize(1, "warning", "warnings"), "1 warning");
        assert_eq!(pluralize(3, "warning", "warnings"), "3 warnings");
    }
}

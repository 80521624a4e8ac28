//! Output formatting - plain ASCII terminal output, or JSON with `--json`

use owo_colors::OwoColorize;
use patchwise_common::{
    InstallReport, SimulationEntry, SimulationReport, UpdatePlan, UpdateSummary, Version,
};
use serde_json::{json, Value};

pub fn plan_json(plan: &UpdatePlan) -> Value {
    json!({
        "current_version": plan.current_version(),
        "latest_version": plan.latest_version(),
        "new_version_available": plan.new_version_available(),
        "pending": plan.entries().iter().map(|e| json!({
            "version": e.version,
            "download_url": e.download_url,
        })).collect::<Vec<_>>(),
    })
}

pub fn print_plan(plan: &UpdatePlan) {
    println!("Current version: {}", plan.current_version());
    if !plan.new_version_available() {
        println!("{} No update available", "[OK]".bright_green());
        return;
    }

    println!(
        "{} Latest version: {}",
        "[UPDATE]".yellow(),
        plan.latest_version().bold()
    );
    println!("Pending ({}):", plan.len());
    for entry in plan.entries() {
        println!("  * {}  {}", entry.version, entry.download_url.dimmed());
    }
}

fn entry_line(entry: &SimulationEntry) -> String {
    let target = entry
        .target_file
        .as_ref()
        .unwrap_or(&entry.target_folder)
        .display()
        .to_string();

    let mut notes = Vec::new();
    if !entry.folder_existed {
        notes.push("new folder");
    }
    if !entry.folder_writable {
        notes.push("folder not writable");
    }
    if entry.file_existed {
        notes.push("replaces file");
    }
    if !entry.file_writable {
        notes.push("file not writable");
    }
    if entry.is_embedded_script {
        notes.push("script");
    }

    if notes.is_empty() {
        format!("{} -> {}", entry.name, target)
    } else {
        format!("{} -> {} ({})", entry.name, target, notes.join(", "))
    }
}

pub fn print_simulation(report: &SimulationReport) {
    println!();
    println!("Package {}", report.package.display().bold());
    for entry in &report.entries {
        if entry.is_blocking() {
            println!("  {} {}", "[BLOCKED]".bright_red(), entry_line(entry).bright_red());
        } else {
            println!("  {} {}", "[OK]".bright_green(), entry_line(entry));
        }
    }

    let blocking = report.blocking_entries().count();
    if blocking == 0 {
        println!("{} {} entries can be placed", "[OK]".bright_green(), report.entries.len());
    } else {
        println!("{} {} blocking entries", "[FAILED]".bright_red(), blocking);
    }
}

pub fn print_install(version: &Version, report: &InstallReport) {
    println!();
    println!("Version {}: {} files extracted", version.bold(), report.extracted.len());
    for (name, reason) in &report.skipped {
        println!("  {} {}: {}", "[SKIPPED]".yellow(), name, reason);
    }
}

pub fn print_summary(summary: &UpdateSummary) {
    println!();
    if summary.applied.is_empty() {
        if summary.is_success() {
            println!("{} No update available", "[OK]".bright_green());
        }
    } else {
        let verb = if summary.simulated { "Simulated" } else { "Applied" };
        let list = summary
            .applied
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!("{} {}: {}", "[OK]".bright_green(), verb, list);
    }

    if let Some(error) = &summary.error {
        println!("{} [{}] {}", "[FAILED]".bright_red(), summary.outcome, error);
    }
    println!(
        "{}",
        format!("Finished in {} ms", summary.duration_ms()).dimmed()
    );
}

pub fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! Output formatting for the `relpipe` CLI.
//!
//! Progress and summaries are plain text written to an injected writer
//! (stderr in the binary), so tests can capture them.

use crate::pipeline::{PipelineReport, Plan, ShowReport};
use crate::version_store::NextVersion;
use camino::Utf8PathBuf;
use std::fmt::Display;
use std::io::Write;

/// Writes one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Format the dry-run plan.
///
/// # Example
///
/// ```
/// use camino::Utf8PathBuf;
/// use relpipe::module::ModuleName;
/// use relpipe::output::plan_text;
/// use relpipe::pipeline::{Plan, VariantPlan};
/// use relpipe::version_store::NextVersion;
///
/// let plan = Plan {
///     next: NextVersion { build: 21, version: "1.0.21".to_owned() },
///     build_order: vec![ModuleName::from("Core")],
///     variants: vec![VariantPlan {
///         name: "bb45".to_owned(),
///         modules: vec![ModuleName::from("Core")],
///         archive_path: Utf8PathBuf::from("dist/bb45-1.0.21.zip"),
///     }],
///     publish_remote: None,
/// };
///
/// let text = plan_text(&plan);
/// assert!(text.contains("Dry run"));
/// assert!(text.contains("1.0.21"));
/// ```
#[must_use]
pub fn plan_text(plan: &Plan) -> String {
    let mut lines = vec![
        "Dry run - no files will be modified".to_owned(),
        String::new(),
        format!("Next version: {} (build {})", plan.next.version, plan.next.build),
        format!("Build order: {}", join(&plan.build_order)),
        String::new(),
        "Variants:".to_owned(),
    ];
    for variant in &plan.variants {
        lines.push(format!("  - {}: {}", variant.name, join(&variant.modules)));
        lines.push(format!("    archive: {}", variant.archive_path));
    }
    lines.push(String::new());
    lines.push(match &plan.publish_remote {
        Some(remote) => format!("Publish to: {remote}"),
        None => "Publish: skipped".to_owned(),
    });
    lines.join("\n")
}

/// Format the persisted manifest and descriptor versions.
#[must_use]
pub fn show_text(report: &ShowReport) -> String {
    let mut lines = vec![match &report.manifest {
        Some(manifest) => format!(
            "{} {} (build {}, {})",
            manifest.app, manifest.version, manifest.build, manifest.timestamp
        ),
        None => "No build recorded yet".to_owned(),
    }];
    lines.push(String::new());
    lines.push("Descriptors:".to_owned());
    for descriptor in &report.descriptors {
        let version = descriptor.version.as_deref().unwrap_or("<no Version line>");
        lines.push(format!(
            "  - {}: {version} ({})",
            descriptor.module, descriptor.path
        ));
    }
    lines.join("\n")
}

/// Format the summary printed after a successful run.
#[must_use]
pub fn release_summary(report: &PipelineReport) -> String {
    let count = report.bundles.len();
    let plural = if count == 1 { "bundle" } else { "bundles" };
    let mut lines = vec![format!(
        "Released {} as {count} {plural}:",
        report.version.version
    )];
    for bundle in &report.bundles {
        lines.push(format!("  - {} (sha256 {})", bundle.archive_path, bundle.sha256));
    }
    match &report.publish {
        Some(publish) => lines.push(format!(
            "Pushed {} file(s) to {} from {}",
            publish.published_files.len(),
            publish.branch,
            publish.staging_dir
        )),
        None => lines.push("Not published".to_owned()),
    }
    lines.join("\n")
}

/// Format the result of a version bump.
#[must_use]
pub fn version_message(next: &NextVersion) -> String {
    format!("Build number is now {} ({})", next.build, next.version)
}

/// Format the result of `clean`.
#[must_use]
pub fn clean_message(removed: &[Utf8PathBuf]) -> String {
    if removed.is_empty() {
        return "Nothing to clean".to_owned();
    }
    removed
        .iter()
        .map(|dir| format!("Removed {dir}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn join(names: &[impl Display]) -> String {
    names
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

//! Release repository publishing.
//!
//! Publishing rebuilds a local staging clone of the release repository from
//! scratch on every run, lays the release bundles out in it, and force-pushes
//! a single commit. Nothing is retried: a failed clone or push stops the run
//! and leaves the staging directory for inspection.

use crate::error::{PipelineError, Result};
use crate::module::ModuleName;
use crate::packager::ReleaseBundle;
use crate::process::{CommandExecutor, Invocation, execute, output_message};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use relpipe_common::clear_directory;
use std::fs::{self, File};
use std::time::Duration;
use zip::ZipArchive;

/// Branch pushed when the configuration names none.
pub const DEFAULT_BRANCH: &str = "main";

/// Where and how to publish.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Git remote URL or path of the release repository.
    pub remote: String,
    /// Local working clone, wiped before each publish.
    pub staging_dir: Utf8PathBuf,
    /// Branch to force-push.
    pub branch: String,
    /// Commit message for the release commit.
    pub commit_message: String,
    /// Modules whose code file is a nested archive to unpack on publish.
    pub expand_modules: Vec<ModuleName>,
    /// Git executable.
    pub git: String,
    /// Upper bound on each git command.
    pub timeout: Option<Duration>,
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    /// The staging clone that was pushed.
    pub staging_dir: Utf8PathBuf,
    /// Branch that was pushed.
    pub branch: String,
    /// Commit message used.
    pub commit_message: String,
    /// Files written to the staging clone, relative to it, sorted.
    pub published_files: Vec<String>,
}

/// Publishes release bundles to a git repository.
pub struct Publisher<'a> {
    config: &'a PublishConfig,
    executor: &'a dyn CommandExecutor,
}

impl<'a> Publisher<'a> {
    /// Create a publisher running git through `executor`.
    #[must_use]
    pub fn new(config: &'a PublishConfig, executor: &'a dyn CommandExecutor) -> Self {
        Self { config, executor }
    }

    /// Clone the release repository, stage `bundles`, commit, and force-push.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Publish`] naming the failed step: `clone`,
    /// `copy`, `stage`, `commit`, or `push`.
    pub fn publish(&self, bundles: &[ReleaseBundle]) -> Result<PublishResult> {
        let staging = &self.config.staging_dir;

        clear_directory(staging).map_err(|err| publish_error("clone", &err))?;
        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent).map_err(|err| publish_error("clone", &err))?;
        }
        info!("cloning {} into {staging}", self.config.remote);
        self.git(
            "clone",
            None,
            &["clone", self.config.remote.as_str(), staging.as_str()],
        )?;

        let mut published_files = Vec::new();
        for bundle in bundles {
            published_files.extend(self.stage_bundle(bundle)?);
        }
        published_files.sort();
        published_files.dedup();

        self.git("stage", Some(staging), &["add", "-A"])?;
        self.git(
            "commit",
            Some(staging),
            &[
                "commit",
                "--allow-empty",
                "-m",
                self.config.commit_message.as_str(),
            ],
        )?;
        info!("pushing {} to {}", self.config.branch, self.config.remote);
        self.git(
            "push",
            Some(staging),
            &["push", "--force", "origin", self.config.branch.as_str()],
        )?;

        Ok(PublishResult {
            staging_dir: staging.clone(),
            branch: self.config.branch.clone(),
            commit_message: self.config.commit_message.clone(),
            published_files,
        })
    }

    /// Copy one bundle into the staging clone, returning the relative paths
    /// written.
    fn stage_bundle(&self, bundle: &ReleaseBundle) -> Result<Vec<String>> {
        let staging = &self.config.staging_dir;
        let variant_dir = staging.join(&bundle.variant);
        fs::create_dir_all(&variant_dir).map_err(|err| publish_error("copy", &err))?;

        let mut written = vec![copy_into(&bundle.archive_path, staging, "")?];
        for artifact in &bundle.signed_artifacts {
            let expanded = if self.config.expand_modules.contains(&artifact.module) {
                expand_into(&artifact.code_path, &variant_dir)?
            } else {
                None
            };
            match expanded {
                Some(names) => written.extend(
                    names
                        .into_iter()
                        .map(|name| format!("{}/{name}", bundle.variant)),
                ),
                None => written.push(copy_into(
                    &artifact.code_path,
                    &variant_dir,
                    &bundle.variant,
                )?),
            }
        }
        written.push(copy_into(
            &bundle.merged_descriptor,
            &variant_dir,
            &bundle.variant,
        )?);
        debug!("staged {} file(s) for {}", written.len(), bundle.variant);
        Ok(written)
    }

    fn git(&self, operation: &'static str, cwd: Option<&Utf8Path>, args: &[&str]) -> Result<()> {
        let mut invocation = Invocation::new(self.config.git.as_str()).args(args.iter().copied());
        if let Some(dir) = cwd {
            invocation = invocation.current_dir(dir);
        }
        if let Some(timeout) = self.config.timeout {
            invocation = invocation.timeout(timeout);
        }

        let output = execute(self.executor, &invocation).map_err(|err| PipelineError::Publish {
            operation,
            message: err.to_string(),
        })?;
        if !output.status.success() {
            return Err(PipelineError::Publish {
                operation,
                message: output_message(&output),
            });
        }
        Ok(())
    }
}

fn publish_error(operation: &'static str, err: &dyn std::fmt::Display) -> PipelineError {
    PipelineError::Publish {
        operation,
        message: err.to_string(),
    }
}

/// Copy `source` into `dir`, returning its path relative to the staging root.
fn copy_into(source: &Utf8Path, dir: &Utf8Path, relative_dir: &str) -> Result<String> {
    let name = source
        .file_name()
        .ok_or_else(|| publish_error("copy", &format!("{source} has no file name")))?;
    fs::copy(source, dir.join(name))
        .map_err(|err| publish_error("copy", &format!("{source}: {err}")))?;
    Ok(if relative_dir.is_empty() {
        name.to_owned()
    } else {
        format!("{relative_dir}/{name}")
    })
}

/// Unpack `source` into `dir` when it is a zip container.
///
/// Returns `None` for a plain code file so the caller copies it unchanged.
fn expand_into(source: &Utf8Path, dir: &Utf8Path) -> Result<Option<Vec<String>>> {
    let file = File::open(source).map_err(|err| publish_error("copy", &format!("{source}: {err}")))?;
    let Ok(mut archive) = ZipArchive::new(file) else {
        debug!("{source} is not a container; copying as-is");
        return Ok(None);
    };

    let names: Vec<String> = archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(str::to_owned)
        .collect();
    archive
        .extract(dir)
        .map_err(|err| publish_error("copy", &format!("failed to expand {source}: {err}")))?;
    debug!("expanded {source} into {} file(s)", names.len());
    Ok(Some(names))
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;

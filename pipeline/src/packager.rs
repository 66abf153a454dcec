//! Signing, descriptor merging, and release archiving.
//!
//! Packaging one variant runs three steps, each fatal on failure:
//!
//! 1. sign every `.cod` in `<build_root>/<variant>` with the vendor signer,
//! 2. merge the per-module `.jad` descriptors into
//!    `<build_root>/<variant>/merged/<app>.jad`, then delete the secondaries,
//! 3. zip the signed `.cod` files and the merged descriptor into
//!    `<dist_dir>/<variant>-<version>.zip`.
//!
//! The merge tool may exit before its output is on disk, so step 2 polls for
//! the merged descriptor with a bounded timeout.

use crate::credential::SigningCredential;
use crate::error::{PipelineError, Result};
use crate::module::{CompiledArtifact, ModuleName, PlatformVariant};
use crate::process::{CommandExecutor, Invocation, execute, output_message};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use relpipe_common::{PollSettings, remove_file_if_present, wait_for_path};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::time::Duration;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Tool paths and settings for packaging.
#[derive(Debug, Clone)]
pub struct PackagerConfig {
    /// Application name; names the merged descriptor.
    pub app: String,
    /// Directory holding `<variant>/` compiler outputs.
    pub build_root: Utf8PathBuf,
    /// Directory receiving release archives.
    pub dist_dir: Utf8PathBuf,
    /// Program that runs the signature tool (usually `java`).
    pub signer: Utf8PathBuf,
    /// Signature tool jar.
    pub signature_tool: Utf8PathBuf,
    /// Descriptor merge tool.
    pub merge_tool: Utf8PathBuf,
    /// Module whose descriptor leads the merge; the first artifact when unset.
    pub primary_module: Option<ModuleName>,
    /// How long and how often to poll for the merged descriptor.
    pub merge_poll: PollSettings,
    /// Upper bound on each signer or merge tool run.
    pub tool_timeout: Option<Duration>,
}

/// A signed, merged, and archived release for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseBundle {
    /// Variant the bundle was built for.
    pub variant: String,
    /// Release version.
    pub version: String,
    /// `<dist_dir>/<variant>-<version>.zip`.
    pub archive_path: Utf8PathBuf,
    /// Artifacts whose `.cod` files were signed and archived.
    pub signed_artifacts: Vec<CompiledArtifact>,
    /// Merged descriptor included in the archive.
    pub merged_descriptor: Utf8PathBuf,
    /// Lowercase hex SHA-256 of the archive.
    pub sha256: String,
}

/// Archive file name for a variant and version.
///
/// # Examples
///
/// ```
/// use relpipe::packager::archive_name;
///
/// assert_eq!(archive_name("bb45", "1.0.21"), "bb45-1.0.21.zip");
/// ```
#[must_use]
pub fn archive_name(variant: &str, version: &str) -> String {
    format!("{variant}-{version}.zip")
}

/// Packages compiled artifacts into release bundles.
pub struct Packager<'a> {
    config: &'a PackagerConfig,
    credential: &'a SigningCredential,
    executor: &'a dyn CommandExecutor,
}

impl<'a> Packager<'a> {
    /// Create a packager signing with `credential`.
    #[must_use]
    pub fn new(
        config: &'a PackagerConfig,
        credential: &'a SigningCredential,
        executor: &'a dyn CommandExecutor,
    ) -> Self {
        Self {
            config,
            credential,
            executor,
        }
    }

    /// Sign, merge, and archive `artifacts` for `variant` at `version`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyBundle`] for an empty artifact list, and
    /// the errors of [`Self::sign`], [`Self::merge`], and [`Self::archive`].
    pub fn package(
        &self,
        artifacts: &[CompiledArtifact],
        variant: &PlatformVariant,
        version: &str,
    ) -> Result<ReleaseBundle> {
        if artifacts.is_empty() {
            return Err(PipelineError::EmptyBundle {
                variant: variant.name.clone(),
            });
        }

        self.sign(variant)?;
        let merged_descriptor = self.merge(artifacts, variant)?;
        let (archive_path, sha256) = self.archive(artifacts, &merged_descriptor, variant, version)?;

        Ok(ReleaseBundle {
            variant: variant.name.clone(),
            version: version.to_owned(),
            archive_path,
            signed_artifacts: artifacts.to_vec(),
            merged_descriptor,
            sha256,
        })
    }

    /// Sign every code file in the variant's output directory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SigningFailed`] when the signer cannot be run
    /// or exits unsuccessfully.
    pub fn sign(&self, variant: &PlatformVariant) -> Result<()> {
        let failed = |message: String| PipelineError::SigningFailed {
            variant: variant.name.clone(),
            message,
        };

        let output_dir = variant.output_dir(&self.config.build_root);
        let invocation = self.with_timeout(
            Invocation::new(self.config.signer.as_str())
                .arg("-jar")
                .arg(self.config.signature_tool.as_str())
                .args(["-a", "-p"])
                .secret_arg(self.credential.password())
                .arg("-r")
                .arg(output_dir.as_str()),
        );

        info!("signing {} artifacts in {output_dir}", variant.name);
        let output = execute(self.executor, &invocation).map_err(|err| failed(err.to_string()))?;
        if !output.status.success() {
            return Err(failed(output_message(&output)));
        }
        Ok(())
    }

    /// Merge the artifacts' descriptors and return the merged descriptor path.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MergeFailed`] when the merge tool cannot be
    /// run or exits unsuccessfully, [`PipelineError::MergeTimeout`] when its
    /// output never appears, and I/O errors from file clean-up.
    pub fn merge(
        &self,
        artifacts: &[CompiledArtifact],
        variant: &PlatformVariant,
    ) -> Result<Utf8PathBuf> {
        let failed = |message: String| PipelineError::MergeFailed {
            variant: variant.name.clone(),
            message,
        };

        let (primary, secondaries) = self.split_primary(artifacts).ok_or_else(|| {
            PipelineError::EmptyBundle {
                variant: variant.name.clone(),
            }
        })?;
        let merged = self.merged_descriptor_path(variant);
        if let Some(parent) = merged.parent() {
            fs::create_dir_all(parent)?;
        }
        remove_file_if_present(&merged)?;

        let invocation = self.with_timeout(
            Invocation::new(self.config.merge_tool.as_str())
                .arg("-n")
                .arg(merged.as_str())
                .arg(primary.descriptor_path.as_str())
                .args(
                    secondaries
                        .iter()
                        .map(|artifact| artifact.descriptor_path.as_str()),
                ),
        );

        info!(
            "merging {} descriptor(s) into {merged} (primary {})",
            artifacts.len(),
            primary.module
        );
        let output = execute(self.executor, &invocation).map_err(|err| failed(err.to_string()))?;
        if !output.status.success() {
            return Err(failed(output_message(&output)));
        }

        let waited = wait_for_path(&merged, self.config.merge_poll).map_err(|source| {
            PipelineError::MergeTimeout {
                variant: variant.name.clone(),
                source,
            }
        })?;
        debug!("merged descriptor ready after {}ms", waited.as_millis());

        for artifact in secondaries {
            remove_file_if_present(&artifact.descriptor_path)?;
        }
        Ok(merged)
    }

    /// Zip the code files and merged descriptor into the release archive.
    ///
    /// Returns the archive path and its SHA-256 digest. An existing archive
    /// with the same name is overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Archive`] for zip failures and I/O errors for
    /// unreadable inputs or an unwritable output directory.
    pub fn archive(
        &self,
        artifacts: &[CompiledArtifact],
        merged_descriptor: &Utf8Path,
        variant: &PlatformVariant,
        version: &str,
    ) -> Result<(Utf8PathBuf, String)> {
        fs::create_dir_all(&self.config.dist_dir)?;
        let archive_path = self
            .config
            .dist_dir
            .join(archive_name(&variant.name, version));

        let entries = artifacts
            .iter()
            .map(|artifact| artifact.code_path.as_path())
            .chain(std::iter::once(merged_descriptor));
        write_zip(&archive_path, entries)?;

        let sha256 = compute_sha256(&archive_path)?;
        info!("wrote {archive_path} (sha256 {sha256})");
        Ok((archive_path, sha256))
    }

    /// Path of the merged descriptor for `variant`.
    #[must_use]
    pub fn merged_descriptor_path(&self, variant: &PlatformVariant) -> Utf8PathBuf {
        variant
            .output_dir(&self.config.build_root)
            .join("merged")
            .join(format!("{}.jad", self.config.app))
    }

    fn split_primary<'c>(
        &self,
        artifacts: &'c [CompiledArtifact],
    ) -> Option<(&'c CompiledArtifact, Vec<&'c CompiledArtifact>)> {
        let configured = self.config.primary_module.as_ref().and_then(|name| {
            let found = artifacts.iter().position(|artifact| artifact.module == *name);
            if found.is_none() {
                warn!("primary module {name} was not built; using the first artifact");
            }
            found
        });
        let index = configured.unwrap_or(0);
        let primary = artifacts.get(index)?;
        let secondaries = artifacts
            .iter()
            .enumerate()
            .filter(|(position, _)| *position != index)
            .map(|(_, artifact)| artifact)
            .collect();
        Some((primary, secondaries))
    }

    fn with_timeout(&self, invocation: Invocation) -> Invocation {
        match self.config.tool_timeout {
            Some(timeout) => invocation.timeout(timeout),
            None => invocation,
        }
    }
}

fn write_zip<'p>(archive_path: &Utf8Path, entries: impl Iterator<Item = &'p Utf8Path>) -> Result<()> {
    let archive_error = |source: zip::result::ZipError| PipelineError::Archive {
        path: archive_path.to_owned(),
        source,
    };

    let file = File::create(archive_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for entry in entries {
        let name = entry.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{entry} has no file name"),
            )
        })?;
        zip.start_file(name, options).map_err(archive_error)?;
        let mut source = File::open(entry)?;
        io::copy(&mut source, &mut zip)?;
    }
    zip.finish().map_err(archive_error)?;
    Ok(())
}

/// Compute the SHA-256 digest of a file as lowercase hex.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn compute_sha256(path: &Utf8Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        let Some(chunk) = buffer.get(..bytes_read) else {
            break;
        };
        if chunk.is_empty() {
            break;
        }
        hasher.update(chunk);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
#[path = "packager_tests.rs"]
mod tests;

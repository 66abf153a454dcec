//! Error types for the release pipeline.
//!
//! Every stage failure is fatal. Variants carry enough structure (module,
//! variant, path, tool output) for the operator to locate the root cause
//! before re-running the whole pipeline.

use crate::descriptor::DescriptorError;
use crate::module::ModuleName;
use camino::Utf8PathBuf;
use relpipe_common::{FilesError, PollTimeout};
use std::fmt;
use thiserror::Error;

/// Pipeline stage reported when a per-variant step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Descriptor file-list and version regeneration.
    Regenerate,
    /// Module compilation.
    Compile,
    /// Signing, descriptor merging, and archiving.
    Package,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Regenerate => "regenerate",
            Self::Compile => "compile",
            Self::Package => "package",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while running the release pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The persisted build manifest exists but does not have the expected shape.
    #[error("build manifest {path} is corrupt: {reason}")]
    ManifestCorrupt {
        /// Manifest file path.
        path: Utf8PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// A module descriptor is missing its version line or file-list section.
    #[error("descriptor {path} is malformed")]
    DescriptorFormat {
        /// Descriptor file path.
        path: Utf8PathBuf,
        /// What was wrong with it.
        #[source]
        source: DescriptorError,
    },

    /// Enumerating a module's source or resource files failed.
    #[error("failed to list files for module {module}")]
    FileListing {
        /// Module whose directories were being walked.
        module: ModuleName,
        /// Underlying enumeration error.
        #[source]
        source: FilesError,
    },

    /// A module was compiled before one of its dependencies.
    #[error("module {module} depends on {dependency}, which has not been built for {variant}")]
    DependencyNotBuilt {
        /// Module being compiled.
        module: ModuleName,
        /// Dependency with no artifact in this run.
        dependency: ModuleName,
        /// Platform variant being built.
        variant: String,
    },

    /// The vendor compiler failed for a module.
    #[error("compilation of {module} for {variant} failed: {message}")]
    CompileFailed {
        /// Module that failed to compile.
        module: ModuleName,
        /// Platform variant being built.
        variant: String,
        /// Trimmed compiler output or spawn error.
        message: String,
    },

    /// The signing password could not be loaded.
    #[error("signing credential {path} unavailable: {reason}")]
    CredentialMissing {
        /// Password file path.
        path: Utf8PathBuf,
        /// Why the credential could not be used.
        reason: String,
    },

    /// The merge tool exited but its output never appeared.
    #[error("merged descriptor for {variant} never appeared")]
    MergeTimeout {
        /// Platform variant being packaged.
        variant: String,
        /// Poll details.
        #[source]
        source: PollTimeout,
    },

    /// Publishing to the release repository failed.
    #[error("publish {operation} failed: {message}")]
    Publish {
        /// The publishing step that failed (clone, stage, commit, push).
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The configuration file could not be parsed or is inconsistent.
    #[error("invalid configuration {path}: {reason}")]
    Config {
        /// Configuration file path.
        path: Utf8PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// The configuration file does not exist.
    #[error("configuration file {path} not found")]
    ConfigNotFound {
        /// Path that was looked up.
        path: Utf8PathBuf,
    },

    /// A module depends on a module that is not configured.
    #[error("module {module} depends on unknown module {dependency}")]
    UnknownDependency {
        /// Declaring module.
        module: ModuleName,
        /// Name that matched no configured module.
        dependency: ModuleName,
    },

    /// The module dependency graph contains a cycle.
    #[error("dependency cycle detected: {}", format_cycle(.cycle))]
    DependencyCycle {
        /// Modules forming the cycle, first module repeated at the end.
        cycle: Vec<ModuleName>,
    },

    /// A variant name matched no configured platform variant.
    #[error("unknown platform variant {name}")]
    UnknownVariant {
        /// Requested variant name.
        name: String,
    },

    /// A module resolved for one variant was handed to another variant's build.
    #[error("module {module} was resolved for {found}, not {expected}")]
    VariantMismatch {
        /// Module in question.
        module: ModuleName,
        /// Variant being built.
        expected: String,
        /// Variant the module was resolved for.
        found: String,
    },

    /// The signing tool failed.
    #[error("signing {variant} artifacts failed: {message}")]
    SigningFailed {
        /// Platform variant being packaged.
        variant: String,
        /// Trimmed signer output.
        message: String,
    },

    /// The descriptor merge tool failed.
    #[error("merging {variant} descriptors failed: {message}")]
    MergeFailed {
        /// Platform variant being packaged.
        variant: String,
        /// Trimmed merge tool output.
        message: String,
    },

    /// Packaging was requested with no compiled artifacts.
    #[error("no artifacts to package for {variant}")]
    EmptyBundle {
        /// Platform variant being packaged.
        variant: String,
    },

    /// Writing or reading a zip archive failed.
    #[error("archive {path} could not be written")]
    Archive {
        /// Archive path.
        path: Utf8PathBuf,
        /// Underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// A per-variant stage failed.
    #[error("{stage} stage failed for {variant}")]
    StageFailed {
        /// Stage that failed.
        stage: Stage,
        /// Platform variant being built.
        variant: String,
        /// Underlying failure, naming the module where relevant.
        #[source]
        source: Box<PipelineError>,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Wraps `self` as a failure of `stage` for `variant`.
    #[must_use]
    pub fn in_stage(self, stage: Stage, variant: &str) -> Self {
        Self::StageFailed {
            stage,
            variant: variant.to_owned(),
            source: Box::new(self),
        }
    }
}

fn format_cycle(cycle: &[ModuleName]) -> String {
    cycle
        .iter()
        .map(ModuleName::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type alias using [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;

//! Release pipeline orchestration.
//!
//! [`run_pipeline`] composes the stages strictly in sequence: load the
//! signing credential, order modules by dependency, bump the build number,
//! then for each selected variant regenerate descriptors, compile, and
//! package. Publishing runs once after every variant has been packaged. The
//! first failure halts the run; per-variant failures are wrapped in
//! [`PipelineError::StageFailed`] naming the stage and variant.
//!
//! The read-only helpers [`plan`] and [`show`] and the [`bump_version`] and
//! [`clean`] commands share the same configuration and never touch the
//! toolchain.

use crate::compiler::ModuleCompiler;
use crate::config::Config;
use crate::credential::SigningCredential;
use crate::descriptor::{Descriptor, DescriptorError, VERSION_KEY};
use crate::error::{PipelineError, Result, Stage};
use crate::graph::ModuleGraph;
use crate::manifest_gen::ManifestGenerator;
use crate::module::{ModuleName, ModuleSpec, PlatformVariant};
use crate::output::write_stderr_line;
use crate::packager::{Packager, ReleaseBundle, archive_name};
use crate::process::CommandExecutor;
use crate::publisher::{PublishResult, Publisher};
use crate::version_store::{BuildManifest, NextVersion, VersionStore};
use camino::Utf8PathBuf;
use log::info;
use relpipe_common::clear_directory;
use std::fs;
use std::io::Write;

/// Shared state for one pipeline invocation.
pub struct PipelineContext<'a> {
    /// Loaded configuration.
    pub config: &'a Config,
    /// Runs the compiler, signer, merge tool, and git.
    pub executor: &'a dyn CommandExecutor,
    /// Suppress progress output.
    pub quiet: bool,
}

/// Options for a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Variants to build; all configured variants when empty.
    pub variants: Vec<String>,
    /// Stop after packaging.
    pub skip_publish: bool,
    /// Stamp the build manifest with this time instead of the clock.
    pub timestamp: Option<String>,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// The version that was built.
    pub version: NextVersion,
    /// One bundle per variant, in build order.
    pub bundles: Vec<ReleaseBundle>,
    /// Publish outcome; `None` when skipped or not configured.
    pub publish: Option<PublishResult>,
}

/// Runs the whole pipeline.
///
/// # Errors
///
/// Returns [`PipelineError::CredentialMissing`] before anything else runs
/// when the password file is unusable, graph and variant-selection errors
/// before the build number is bumped, [`PipelineError::StageFailed`] for
/// per-variant failures, and [`PipelineError::Publish`] for publishing.
pub fn run_pipeline(
    context: &PipelineContext<'_>,
    options: &RunOptions,
    stderr: &mut dyn Write,
) -> Result<PipelineReport> {
    let config = context.config;
    let credential = SigningCredential::load(&config.toolchain.password_file)?;
    let order = ordered_specs(config)?;
    let variants = config.select_variants(&options.variants)?;

    let version = version_store(config, options.timestamp.as_deref()).next_version()?;
    progress(
        context,
        stderr,
        format!(
            "Building {} {} (build {}) for {} variant(s)",
            config.app,
            version.version,
            version.build,
            variants.len()
        ),
    );

    let mut bundles = Vec::with_capacity(variants.len());
    for variant in variants {
        bundles.push(build_variant(
            context,
            &credential,
            &order,
            variant,
            &version.version,
            stderr,
        )?);
    }

    let publish = if options.skip_publish {
        info!("publishing skipped on request");
        None
    } else {
        publish_bundles(context, &bundles, &version.version, stderr)?
    };

    Ok(PipelineReport {
        version,
        bundles,
        publish,
    })
}

fn build_variant(
    context: &PipelineContext<'_>,
    credential: &SigningCredential,
    order: &[&ModuleSpec],
    variant: &PlatformVariant,
    version: &str,
    stderr: &mut dyn Write,
) -> Result<ReleaseBundle> {
    let config = context.config;
    let name = variant.name.as_str();
    let specs: Vec<&ModuleSpec> = order
        .iter()
        .copied()
        .filter(|spec| spec.applies_to(name))
        .collect();

    progress(
        context,
        stderr,
        format!("[{name}] regenerating {} descriptor(s)", specs.len()),
    );
    let generator = ManifestGenerator::new(&config.root_dir, &config.build_root, version);
    let modules = specs
        .iter()
        .map(|spec| {
            generator
                .regenerate(spec, variant)
                .map(|updated| updated.module)
        })
        .collect::<Result<Vec<_>>>()
        .map_err(|err| err.in_stage(Stage::Regenerate, name))?;

    progress(
        context,
        stderr,
        format!("[{name}] compiling {} module(s)", modules.len()),
    );
    let compile_config = config.compile_config();
    let artifacts = ModuleCompiler::new(&compile_config, context.executor)
        .compile(&modules, variant)
        .map_err(|err| err.in_stage(Stage::Compile, name))?;

    progress(
        context,
        stderr,
        format!("[{name}] signing and packaging {} artifact(s)", artifacts.len()),
    );
    let packager_config = config.packager_config();
    let bundle = Packager::new(&packager_config, credential, context.executor)
        .package(&artifacts, variant, version)
        .map_err(|err| err.in_stage(Stage::Package, name))?;
    progress(
        context,
        stderr,
        format!("[{name}] wrote {}", bundle.archive_path),
    );
    Ok(bundle)
}

fn publish_bundles(
    context: &PipelineContext<'_>,
    bundles: &[ReleaseBundle],
    version: &str,
    stderr: &mut dyn Write,
) -> Result<Option<PublishResult>> {
    let Some(publish_config) = context.config.publish_config(version) else {
        info!("no release repository configured; publishing skipped");
        return Ok(None);
    };
    progress(
        context,
        stderr,
        format!(
            "Publishing {} bundle(s) to {}",
            bundles.len(),
            publish_config.remote
        ),
    );
    Publisher::new(&publish_config, context.executor)
        .publish(bundles)
        .map(Some)
}

/// Increments the build number without building anything.
///
/// # Errors
///
/// As for [`VersionStore::next_version`].
pub fn bump_version(config: &Config, timestamp: Option<&str>) -> Result<NextVersion> {
    version_store(config, timestamp).next_version()
}

/// Per-variant part of a [`Plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPlan {
    /// Variant name.
    pub name: String,
    /// Modules built for this variant, in build order.
    pub modules: Vec<ModuleName>,
    /// Archive the run would write.
    pub archive_path: Utf8PathBuf,
}

/// What a run would do, computed without side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// The version a run would build.
    pub next: NextVersion,
    /// Topological build order over all modules.
    pub build_order: Vec<ModuleName>,
    /// Selected variants, in build order.
    pub variants: Vec<VariantPlan>,
    /// Release repository, unless publishing would be skipped.
    pub publish_remote: Option<String>,
}

/// Computes a dry-run [`Plan`].
///
/// # Errors
///
/// Returns graph, variant-selection, and manifest errors; nothing is written.
pub fn plan(config: &Config, options: &RunOptions) -> Result<Plan> {
    let order = ordered_specs(config)?;
    let next = config.version_store().preview()?;
    let variants = config
        .select_variants(&options.variants)?
        .into_iter()
        .map(|variant| VariantPlan {
            name: variant.name.clone(),
            modules: order
                .iter()
                .filter(|spec| spec.applies_to(&variant.name))
                .map(|spec| spec.name.clone())
                .collect(),
            archive_path: config
                .dist_dir
                .join(archive_name(&variant.name, &next.version)),
        })
        .collect();
    let publish_remote = if options.skip_publish {
        None
    } else {
        config.publish.as_ref().map(|publish| publish.remote.clone())
    };

    Ok(Plan {
        next,
        build_order: order.iter().map(|spec| spec.name.clone()).collect(),
        variants,
        publish_remote,
    })
}

/// The version recorded in one module descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorVersion {
    /// Module name.
    pub module: ModuleName,
    /// Descriptor path.
    pub path: Utf8PathBuf,
    /// `Version=` value, if the line exists.
    pub version: Option<String>,
}

/// Persisted state: the build manifest and each descriptor's version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowReport {
    /// The build manifest, or `None` before the first bump.
    pub manifest: Option<BuildManifest>,
    /// Descriptors, in declaration order.
    pub descriptors: Vec<DescriptorVersion>,
}

/// Reads the persisted state without modifying it.
///
/// # Errors
///
/// Returns [`PipelineError::ManifestCorrupt`] for a corrupt manifest,
/// [`PipelineError::DescriptorFormat`] for an unparseable descriptor, and
/// I/O errors for unreadable files.
pub fn show(config: &Config) -> Result<ShowReport> {
    let manifest = config.version_store().current()?;
    let descriptors = config
        .modules
        .iter()
        .map(|spec| -> Result<DescriptorVersion> {
            let path = config.root_dir.join(&spec.descriptor);
            let text = fs::read_to_string(&path)?;
            let descriptor =
                Descriptor::parse(&text).map_err(|source: DescriptorError| {
                    PipelineError::DescriptorFormat {
                        path: path.clone(),
                        source,
                    }
                })?;
            Ok(DescriptorVersion {
                module: spec.name.clone(),
                version: descriptor.property(VERSION_KEY).map(str::to_owned),
                path,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ShowReport {
        manifest,
        descriptors,
    })
}

/// Removes the build root and dist directory, returning the directories
/// that were cleared.
///
/// # Errors
///
/// Returns I/O errors other than a directory already being absent.
pub fn clean(config: &Config) -> Result<Vec<Utf8PathBuf>> {
    let mut removed = Vec::new();
    for dir in [&config.build_root, &config.dist_dir] {
        if dir.exists() {
            clear_directory(dir)?;
            info!("removed {dir}");
            removed.push(dir.clone());
        }
    }
    Ok(removed)
}

fn ordered_specs(config: &Config) -> Result<Vec<&ModuleSpec>> {
    let order = ModuleGraph::new(&config.modules)?.build_order()?;
    Ok(order
        .iter()
        .filter_map(|name| config.modules.iter().find(|spec| spec.name == *name))
        .collect())
}

fn version_store(config: &Config, timestamp: Option<&str>) -> VersionStore {
    let store = config.version_store();
    match timestamp {
        Some(timestamp) => store.with_fixed_timestamp(timestamp),
        None => store,
    }
}

fn progress(context: &PipelineContext<'_>, stderr: &mut dyn Write, message: String) {
    if !context.quiet {
        write_stderr_line(stderr, message);
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

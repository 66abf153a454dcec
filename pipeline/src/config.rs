//! `relpipe.toml` configuration.
//!
//! Everything the pipeline touches on disk or executes comes from here:
//! tool paths, the password file, timeouts, platform variants, modules, and
//! the release repository. Relative paths resolve against the directory
//! holding the configuration file, which is also the project root. Bare
//! program names such as `java` or `git` are left alone so the OS resolves
//! them on `PATH`.

use crate::compiler::CompileConfig;
use crate::error::{PipelineError, Result};
use crate::module::{ModuleName, ModuleSpec, PlatformVariant};
use crate::packager::PackagerConfig;
use crate::publisher::{DEFAULT_BRANCH, PublishConfig};
use crate::version_store::{DEFAULT_VERSION_PREFIX, VersionStore};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use relpipe_common::PollSettings;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "relpipe.toml";

/// Placeholder replaced with the release version in commit messages.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Application name; stored in the build manifest and names the merged
    /// descriptor.
    pub app: String,
    /// Compiler output directory.
    #[serde(default = "Config::default_build_root")]
    pub build_root: Utf8PathBuf,
    /// Release archive directory.
    #[serde(default = "Config::default_dist_dir")]
    pub dist_dir: Utf8PathBuf,
    /// Persisted build manifest.
    #[serde(default = "Config::default_version_file")]
    pub version_file: Utf8PathBuf,
    /// Version prefix; versions read `<prefix>.<build>`.
    #[serde(default = "Config::default_version_prefix")]
    pub version_prefix: String,
    /// Module whose descriptor leads the merge.
    #[serde(default)]
    pub primary_module: Option<ModuleName>,
    /// External tool settings.
    pub toolchain: ToolchainConfig,
    /// Platform variants, built in this order.
    pub variants: Vec<PlatformVariant>,
    /// Modules, in declaration order.
    pub modules: Vec<ModuleSpec>,
    /// Release repository; publishing is skipped when absent.
    #[serde(default)]
    pub publish: Option<PublishSettings>,
    /// Project root; the directory holding the configuration file.
    #[serde(skip)]
    pub root_dir: Utf8PathBuf,
}

/// Signer, merge tool, and timeout settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Program that runs the signature tool.
    #[serde(default = "ToolchainConfig::default_signer")]
    pub signer: Utf8PathBuf,
    /// Signature tool jar.
    pub signature_tool: Utf8PathBuf,
    /// Descriptor merge tool.
    pub merge_tool: Utf8PathBuf,
    /// File holding the signing password.
    pub password_file: Utf8PathBuf,
    /// How long to wait for the merged descriptor to appear.
    #[serde(default = "ToolchainConfig::default_merge_timeout_secs")]
    pub merge_timeout_secs: u64,
    /// Interval between checks for the merged descriptor.
    #[serde(default = "ToolchainConfig::default_merge_poll_interval_millis")]
    pub merge_poll_interval_millis: u64,
    /// Upper bound on one compiler run; unbounded when absent.
    #[serde(default)]
    pub compiler_timeout_secs: Option<u64>,
    /// Upper bound on one signer or merge tool run; unbounded when absent.
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
    /// Compiler warning keys.
    #[serde(default)]
    pub warn_keys: Vec<String>,
}

/// Release repository settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishSettings {
    /// Git remote of the release repository.
    pub remote: String,
    /// Local staging clone.
    #[serde(default = "PublishSettings::default_staging_dir")]
    pub staging_dir: Utf8PathBuf,
    /// Branch to force-push.
    #[serde(default = "PublishSettings::default_branch")]
    pub branch: String,
    /// Commit message; `{version}` is replaced with the release version.
    #[serde(default = "PublishSettings::default_commit_message")]
    pub commit_message: String,
    /// Modules whose code file is a container to unpack when publishing.
    #[serde(default)]
    pub expand_modules: Vec<ModuleName>,
    /// Git executable.
    #[serde(default = "PublishSettings::default_git")]
    pub git: String,
    /// Upper bound on each git command; unbounded when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    fn default_build_root() -> Utf8PathBuf {
        Utf8PathBuf::from("build")
    }

    fn default_dist_dir() -> Utf8PathBuf {
        Utf8PathBuf::from("dist")
    }

    fn default_version_file() -> Utf8PathBuf {
        Utf8PathBuf::from("build.json")
    }

    fn default_version_prefix() -> String {
        DEFAULT_VERSION_PREFIX.to_owned()
    }

    /// Load and validate the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigNotFound`] when the file does not
    /// exist, and [`PipelineError::Config`] when it cannot be parsed or is
    /// inconsistent.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::ConfigNotFound {
                    path: path.to_owned(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let root_dir = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
            _ => Utf8PathBuf::from("."),
        };
        debug!("loading {path} with project root {root_dir}");
        Self::parse(&text, path, &root_dir)
    }

    /// Parse configuration text, resolving paths against `root_dir`.
    ///
    /// `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] when the text cannot be parsed or
    /// the configuration is inconsistent.
    pub fn parse(text: &str, path: &Utf8Path, root_dir: &Utf8Path) -> Result<Self> {
        let mut config: Self = toml::from_str(text).map_err(|err| PipelineError::Config {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;
        config.root_dir = root_dir.to_owned();
        config.resolve_paths();
        config.validate().map_err(|reason| PipelineError::Config {
            path: path.to_owned(),
            reason,
        })?;
        Ok(config)
    }

    fn resolve_paths(&mut self) {
        let root = self.root_dir.clone();
        self.build_root = root.join(&self.build_root);
        self.dist_dir = root.join(&self.dist_dir);
        self.version_file = root.join(&self.version_file);

        let toolchain = &mut self.toolchain;
        toolchain.signer = resolve_program(&root, &toolchain.signer);
        toolchain.signature_tool = root.join(&toolchain.signature_tool);
        toolchain.merge_tool = resolve_program(&root, &toolchain.merge_tool);
        toolchain.password_file = root.join(&toolchain.password_file);

        for variant in &mut self.variants {
            variant.compiler = resolve_program(&root, &variant.compiler);
            variant.base_library = root.join(&variant.base_library);
        }
        if let Some(publish) = &mut self.publish {
            publish.staging_dir = root.join(&publish.staging_dir);
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.app.trim().is_empty() {
            return Err("app must not be empty".to_owned());
        }
        if self.variants.is_empty() {
            return Err("at least one platform variant is required".to_owned());
        }
        if self.modules.is_empty() {
            return Err("at least one module is required".to_owned());
        }

        for module in &self.modules {
            module.name.validate()?;
        }
        let variant_names = unique_names(self.variants.iter().map(|v| v.name.as_str()))
            .map_err(|name| format!("platform variant {name} is declared twice"))?;
        let module_names = unique_names(self.modules.iter().map(|m| m.name.as_str()))
            .map_err(|name| format!("module {name} is declared twice"))?;

        for module in &self.modules {
            let declared = module
                .variants
                .iter()
                .flatten()
                .chain(module.variant_source_dirs.keys());
            for variant in declared {
                if !variant_names.contains(variant.as_str()) {
                    return Err(format!(
                        "module {} names unknown variant {variant}",
                        module.name
                    ));
                }
            }
        }
        self.check_dependency_variants()?;

        let referenced = self.primary_module.iter().chain(
            self.publish
                .iter()
                .flat_map(|publish| publish.expand_modules.iter()),
        );
        for name in referenced {
            if !module_names.contains(name.as_str()) {
                return Err(format!("unknown module {name}"));
            }
        }
        Ok(())
    }

    /// A dependency must be built for every variant its dependant is built
    /// for. Unknown dependencies are left to the module graph.
    fn check_dependency_variants(&self) -> std::result::Result<(), String> {
        for module in &self.modules {
            for dependency in &module.depends_on {
                let Some(target) = self.modules.iter().find(|m| m.name == *dependency) else {
                    continue;
                };
                let uncovered = self
                    .variants
                    .iter()
                    .map(|variant| variant.name.as_str())
                    .find(|variant| module.applies_to(variant) && !target.applies_to(variant));
                if let Some(variant) = uncovered {
                    return Err(format!(
                        "module {} depends on {dependency}, which is not built for {variant}",
                        module.name
                    ));
                }
            }
        }
        Ok(())
    }

    /// Variants to build: those named in `filter` (in configuration order),
    /// or all of them when `filter` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownVariant`] for a name that matches no
    /// configured variant.
    pub fn select_variants(&self, filter: &[String]) -> Result<Vec<&PlatformVariant>> {
        if let Some(unknown) = filter
            .iter()
            .find(|name| !self.variants.iter().any(|v| v.name == **name))
        {
            return Err(PipelineError::UnknownVariant {
                name: unknown.clone(),
            });
        }
        Ok(self
            .variants
            .iter()
            .filter(|variant| filter.is_empty() || filter.contains(&variant.name))
            .collect())
    }

    /// Build manifest store for this project.
    #[must_use]
    pub fn version_store(&self) -> VersionStore {
        VersionStore::new(self.version_file.clone(), self.app.clone())
            .with_prefix(self.version_prefix.clone())
    }

    /// Compiler settings.
    #[must_use]
    pub fn compile_config(&self) -> CompileConfig {
        CompileConfig {
            root_dir: self.root_dir.clone(),
            build_root: self.build_root.clone(),
            warn_keys: self.toolchain.warn_keys.clone(),
            timeout: self.toolchain.compiler_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Signing, merge, and archive settings.
    #[must_use]
    pub fn packager_config(&self) -> PackagerConfig {
        let toolchain = &self.toolchain;
        PackagerConfig {
            app: self.app.clone(),
            build_root: self.build_root.clone(),
            dist_dir: self.dist_dir.clone(),
            signer: toolchain.signer.clone(),
            signature_tool: toolchain.signature_tool.clone(),
            merge_tool: toolchain.merge_tool.clone(),
            primary_module: self.primary_module.clone(),
            merge_poll: PollSettings::new(
                Duration::from_secs(toolchain.merge_timeout_secs),
                Duration::from_millis(toolchain.merge_poll_interval_millis),
            ),
            tool_timeout: toolchain.tool_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Publishing settings for `version`, or `None` when no release
    /// repository is configured.
    #[must_use]
    pub fn publish_config(&self, version: &str) -> Option<PublishConfig> {
        self.publish.as_ref().map(|publish| PublishConfig {
            remote: publish.remote.clone(),
            staging_dir: publish.staging_dir.clone(),
            branch: publish.branch.clone(),
            commit_message: publish.commit_message.replace(VERSION_PLACEHOLDER, version),
            expand_modules: publish.expand_modules.clone(),
            git: publish.git.clone(),
            timeout: publish.timeout_secs.map(Duration::from_secs),
        })
    }
}

impl ToolchainConfig {
    fn default_signer() -> Utf8PathBuf {
        Utf8PathBuf::from("java")
    }

    const fn default_merge_timeout_secs() -> u64 {
        30
    }

    const fn default_merge_poll_interval_millis() -> u64 {
        250
    }
}

impl PublishSettings {
    fn default_staging_dir() -> Utf8PathBuf {
        Utf8PathBuf::from("staging")
    }

    fn default_branch() -> String {
        DEFAULT_BRANCH.to_owned()
    }

    fn default_commit_message() -> String {
        format!("Release {VERSION_PLACEHOLDER}")
    }

    fn default_git() -> String {
        "git".to_owned()
    }
}

/// Bare program names stay as-is for `PATH` lookup; anything with a
/// directory component resolves against `root`.
fn resolve_program(root: &Utf8Path, program: &Utf8Path) -> Utf8PathBuf {
    if program.components().count() > 1 {
        root.join(program)
    } else {
        program.to_owned()
    }
}

/// Collects `names`, returning the first duplicate as an error.
fn unique_names<'a>(
    names: impl Iterator<Item = &'a str>,
) -> std::result::Result<HashSet<&'a str>, &'a str> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(name);
        }
    }
    Ok(seen)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

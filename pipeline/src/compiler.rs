//! Vendor compiler orchestration.
//!
//! Modules are compiled one at a time in the order supplied, which must be a
//! topological order of the dependency graph. Each module imports the SDK
//! base library plus the `.jar` outputs of everything it transitively
//! depends on, so later modules can only be built once earlier ones have
//! produced artifacts in the same call.

use crate::error::{PipelineError, Result};
use crate::module::{CompiledArtifact, Module, ModuleName, PlatformVariant};
use crate::process::{CommandExecutor, Invocation, execute, output_message};
use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use relpipe_common::remove_file_if_present;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::time::Duration;

/// Settings shared by every compiler invocation.
#[derive(Debug, Clone)]
pub struct CompileConfig {
    /// Project root; the compiler runs here and file lists are relative to it.
    pub root_dir: Utf8PathBuf,
    /// Directory that receives `<variant>/<module>.{cod,jar,jad}`.
    pub build_root: Utf8PathBuf,
    /// Warning keys passed as `warnkey=`; omitted when empty.
    pub warn_keys: Vec<String>,
    /// Upper bound on one compiler run.
    pub timeout: Option<Duration>,
}

/// Compiles resolved modules for one platform variant.
pub struct ModuleCompiler<'a> {
    config: &'a CompileConfig,
    executor: &'a dyn CommandExecutor,
}

impl<'a> ModuleCompiler<'a> {
    /// Create a compiler that runs commands through `executor`.
    #[must_use]
    pub fn new(config: &'a CompileConfig, executor: &'a dyn CommandExecutor) -> Self {
        Self { config, executor }
    }

    /// Compile `modules`, in order, for `variant`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::VariantMismatch`] for a module resolved for a
    /// different variant, [`PipelineError::DependencyNotBuilt`] when a
    /// dependency has not been compiled earlier in this call, and
    /// [`PipelineError::CompileFailed`] when the compiler cannot be run, exits
    /// unsuccessfully, or does not produce the module's `.cod` file.
    pub fn compile(
        &self,
        modules: &[Module],
        variant: &PlatformVariant,
    ) -> Result<Vec<CompiledArtifact>> {
        let output_dir = variant.output_dir(&self.config.build_root);
        fs::create_dir_all(&output_dir)?;

        let mut artifacts: Vec<CompiledArtifact> = Vec::with_capacity(modules.len());
        for module in modules {
            check_ready(module, variant, &artifacts)?;
            let imports = import_list(module, modules, &artifacts, variant);
            let artifact = CompiledArtifact::at(&module.name, &variant.name, &output_dir);

            info!("compiling {} for {}", module.name, variant.name);
            self.run_compiler(module, variant, &artifact, &imports)?;
            artifacts.push(artifact);
        }
        Ok(artifacts)
    }

    /// The command line used to compile `module`.
    #[must_use]
    pub fn invocation(
        &self,
        module: &Module,
        variant: &PlatformVariant,
        imports: &[&Utf8Path],
    ) -> Invocation {
        let output_stem = variant
            .output_dir(&self.config.build_root)
            .join(module.name.as_str());
        let import_arg = imports
            .iter()
            .map(|path| path.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let mut invocation = Invocation::new(variant.compiler.as_str())
            .arg("-quiet")
            .arg(format!("{}={output_stem}", module.kind.output_key()))
            .arg(module.descriptor_path.as_str());
        if !self.config.warn_keys.is_empty() {
            invocation = invocation.arg(format!("warnkey={}", self.config.warn_keys.join(";")));
        }
        invocation = invocation
            .arg(format!("import={import_arg}"))
            .args(module.files())
            .current_dir(self.config.root_dir.clone());
        if let Some(timeout) = self.config.timeout {
            invocation = invocation.timeout(timeout);
        }
        invocation
    }

    fn run_compiler(
        &self,
        module: &Module,
        variant: &PlatformVariant,
        artifact: &CompiledArtifact,
        imports: &[&Utf8Path],
    ) -> Result<()> {
        let failed = |message: String| PipelineError::CompileFailed {
            module: module.name.clone(),
            variant: variant.name.clone(),
            message,
        };

        // Outputs from an earlier run must not pass for this run's output.
        for stale in [
            &artifact.code_path,
            &artifact.library_path,
            &artifact.descriptor_path,
        ] {
            remove_file_if_present(stale)?;
        }

        let invocation = self.invocation(module, variant, imports);
        let output = execute(self.executor, &invocation).map_err(|err| failed(err.to_string()))?;
        if !output.status.success() {
            let message = output_message(&output);
            return Err(failed(if message.is_empty() {
                format!("compiler exited with {}", output.status)
            } else {
                message
            }));
        }

        if !artifact.code_path.is_file() {
            return Err(failed(format!(
                "compiler reported success but {} is missing",
                artifact.code_path
            )));
        }
        Ok(())
    }
}

fn check_ready(
    module: &Module,
    variant: &PlatformVariant,
    artifacts: &[CompiledArtifact],
) -> Result<()> {
    if module.variant != variant.name {
        return Err(PipelineError::VariantMismatch {
            module: module.name.clone(),
            expected: variant.name.clone(),
            found: module.variant.clone(),
        });
    }

    let missing = module
        .depends_on
        .iter()
        .find(|dependency| !artifacts.iter().any(|artifact| artifact.module == **dependency));
    match missing {
        Some(dependency) => Err(PipelineError::DependencyNotBuilt {
            module: module.name.clone(),
            dependency: dependency.clone(),
            variant: variant.name.clone(),
        }),
        None => Ok(()),
    }
}

/// The SDK base library, then the `.jar` of every transitive dependency in
/// the order those dependencies were built.
fn import_list<'m>(
    module: &Module,
    modules: &[Module],
    artifacts: &'m [CompiledArtifact],
    variant: &'m PlatformVariant,
) -> Vec<&'m Utf8Path> {
    let by_name: HashMap<&ModuleName, &Module> =
        modules.iter().map(|entry| (&entry.name, entry)).collect();

    let mut wanted: HashSet<&ModuleName> = HashSet::new();
    let mut stack: Vec<&ModuleName> = module.depends_on.iter().collect();
    while let Some(name) = stack.pop() {
        if !wanted.insert(name) {
            continue;
        }
        if let Some(dependency) = by_name.get(name) {
            stack.extend(dependency.depends_on.iter());
        }
    }

    std::iter::once(variant.base_library.as_path())
        .chain(
            artifacts
                .iter()
                .filter(|artifact| wanted.contains(&artifact.module))
                .map(|artifact| artifact.library_path.as_path()),
        )
        .collect()
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;

//! Module and platform-variant model.
//!
//! [`ModuleSpec`] and [`PlatformVariant`] are read from configuration.
//! [`Module`] is a spec resolved against one variant, with its file lists
//! enumerated. [`CompiledArtifact`] records the deterministic output paths the
//! compiler produced for one module.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// A semantic module name.
///
/// Module names double as output file stems, so `Core` compiles to
/// `Core.cod`, `Core.jar`, and `Core.jad`. Configured names are checked with
/// [`ModuleName::validate`]; this type does not check itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct ModuleName(String);

impl ModuleName {
    /// Create a new module name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the module name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the name is usable as a file stem inside the build root.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the name is blank or
    /// contains a path separator.
    pub fn validate(&self) -> Result<(), String> {
        if self.0.trim().is_empty() {
            return Err("module name must not be empty".to_owned());
        }
        if self.0.contains(['/', '\\']) {
            return Err(format!("module name {} contains a path separator", self.0));
        }
        Ok(())
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ModuleName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the compiler should treat a module's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// A shared library other modules import (`library=`).
    Library,
    /// An application entry point (`codename=`).
    Application,
}

impl ModuleKind {
    /// The compiler's output-naming argument key for this kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use relpipe::module::ModuleKind;
    ///
    /// assert_eq!(ModuleKind::Library.output_key(), "library");
    /// assert_eq!(ModuleKind::Application.output_key(), "codename");
    /// ```
    #[must_use]
    pub const fn output_key(self) -> &'static str {
        match self {
            Self::Library => "library",
            Self::Application => "codename",
        }
    }
}

/// One target SDK generation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformVariant {
    /// Short name, used for output directories and archive names (e.g. `bb45`).
    pub name: String,
    /// Path to this variant's compiler executable.
    pub compiler: Utf8PathBuf,
    /// Path to the SDK base library every module imports.
    pub base_library: Utf8PathBuf,
}

impl PlatformVariant {
    /// Output directory for this variant under `build_root`.
    #[must_use]
    pub fn output_dir(&self, build_root: &Utf8Path) -> Utf8PathBuf {
        build_root.join(&self.name)
    }
}

/// Configured description of a compilable module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSpec {
    /// Module name.
    pub name: ModuleName,
    /// Library or application.
    pub kind: ModuleKind,
    /// Descriptor path, relative to the project root.
    pub descriptor: Utf8PathBuf,
    /// Source directories, relative to the project root.
    #[serde(default)]
    pub source_dirs: Vec<Utf8PathBuf>,
    /// Resource directories, relative to the project root.
    #[serde(default)]
    pub resource_dirs: Vec<Utf8PathBuf>,
    /// Modules this module imports.
    #[serde(default)]
    pub depends_on: Vec<ModuleName>,
    /// Variants this module is built for; all variants when absent.
    #[serde(default)]
    pub variants: Option<Vec<String>>,
    /// Extra source directories added for specific variants.
    #[serde(default)]
    pub variant_source_dirs: BTreeMap<String, Vec<Utf8PathBuf>>,
}

impl ModuleSpec {
    /// Returns `true` when this module is built for `variant`.
    #[must_use]
    pub fn applies_to(&self, variant: &str) -> bool {
        self.variants
            .as_ref()
            .is_none_or(|names| names.iter().any(|name| name == variant))
    }

    /// Source directories for `variant`: the common ones, then the
    /// variant-specific extras.
    pub fn source_dirs_for<'a>(&'a self, variant: &str) -> impl Iterator<Item = &'a Utf8Path> {
        let extra = self
            .variant_source_dirs
            .get(variant)
            .map(Vec::as_slice)
            .unwrap_or_default();
        self.source_dirs
            .iter()
            .chain(extra.iter())
            .map(Utf8PathBuf::as_path)
    }
}

/// A module resolved for one platform variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Module name.
    pub name: ModuleName,
    /// Library or application.
    pub kind: ModuleKind,
    /// Variant this module was resolved for.
    pub variant: String,
    /// Source files, `/`-separated and relative to the project root.
    pub source_files: Vec<String>,
    /// Resource files, `/`-separated and relative to the project root.
    pub resource_files: Vec<String>,
    /// Direct dependencies, in declaration order.
    pub depends_on: Vec<ModuleName>,
    /// Descriptor path.
    pub descriptor_path: Utf8PathBuf,
}

impl Module {
    /// Sources followed by resources, the order the compiler expects.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.source_files
            .iter()
            .chain(&self.resource_files)
            .map(String::as_str)
    }
}

/// Output of compiling one module for one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// Module that was compiled.
    pub module: ModuleName,
    /// Variant it was compiled for.
    pub variant: String,
    /// `.jar` import library, consumed by dependants.
    pub library_path: Utf8PathBuf,
    /// `.cod` code file, the signed deliverable.
    pub code_path: Utf8PathBuf,
    /// `.jad` descriptor emitted alongside the code file.
    pub descriptor_path: Utf8PathBuf,
}

impl CompiledArtifact {
    /// Deterministic artifact paths for `module` under `output_dir`.
    #[must_use]
    pub fn at(module: &ModuleName, variant: &str, output_dir: &Utf8Path) -> Self {
        let path = |ext: &str| output_dir.join(format!("{module}.{ext}"));
        Self {
            module: module.clone(),
            variant: variant.to_owned(),
            library_path: path("jar"),
            code_path: path("cod"),
            descriptor_path: path("jad"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("Core", true)]
    #[case::dotted("LogicMail.Tests", true)]
    #[case::empty("", false)]
    #[case::blank("  ", false)]
    #[case::parent_escape("../x", false)]
    #[case::backslash("a\\b", false)]
    fn module_names_must_be_plain_file_stems(#[case] name: &str, #[case] valid: bool) {
        assert_eq!(ModuleName::from(name).validate().is_ok(), valid);
    }

    fn spec(variants: Option<Vec<&str>>) -> ModuleSpec {
        ModuleSpec {
            name: ModuleName::from("Core"),
            kind: ModuleKind::Library,
            descriptor: Utf8PathBuf::from("core/Core.jdp"),
            source_dirs: vec![Utf8PathBuf::from("core/src")],
            resource_dirs: Vec::new(),
            depends_on: Vec::new(),
            variants: variants.map(|names| names.into_iter().map(str::to_owned).collect()),
            variant_source_dirs: BTreeMap::from([(
                "bb60".to_owned(),
                vec![Utf8PathBuf::from("core/src-bb60")],
            )]),
        }
    }

    #[rstest]
    #[case::all_variants(None, "bb45", true)]
    #[case::listed(Some(vec!["bb45", "bb60"]), "bb60", true)]
    #[case::not_listed(Some(vec!["bb45"]), "bb60", false)]
    fn applies_to_honours_variant_subset(
        #[case] variants: Option<Vec<&str>>,
        #[case] variant: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(spec(variants).applies_to(variant), expected);
    }

    #[rstest]
    #[case::without_extras("bb45", vec!["core/src"])]
    #[case::with_extras("bb60", vec!["core/src", "core/src-bb60"])]
    fn source_dirs_for_appends_variant_extras(#[case] variant: &str, #[case] expected: Vec<&str>) {
        let spec = spec(None);
        let dirs: Vec<&str> = spec.source_dirs_for(variant).map(Utf8Path::as_str).collect();
        assert_eq!(dirs, expected);
    }

    #[test]
    fn artifact_paths_are_derived_from_module_name() {
        let artifact =
            CompiledArtifact::at(&ModuleName::from("Core"), "bb45", Utf8Path::new("/b/bb45"));
        assert_eq!(artifact.code_path, Utf8PathBuf::from("/b/bb45/Core.cod"));
        assert_eq!(artifact.library_path, Utf8PathBuf::from("/b/bb45/Core.jar"));
        assert_eq!(artifact.descriptor_path, Utf8PathBuf::from("/b/bb45/Core.jad"));
    }

    #[test]
    fn module_kind_deserialises_from_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: ModuleKind,
        }
        let parsed: Wrapper = toml::from_str("kind = \"application\"").expect("parse kind");
        assert_eq!(parsed.kind, ModuleKind::Application);
    }
}

//! Descriptor regeneration.
//!
//! Before each build the module descriptor's `[Files` section is rebuilt from
//! the directories on disk and its `Version=` line is set to the new version.
//! The same file list is written to `<build_root>/<variant>/<module>.files`
//! for reference.

use crate::descriptor::{Descriptor, DescriptorError, FILES_SECTION, VERSION_KEY};
use crate::error::{PipelineError, Result};
use crate::module::{Module, ModuleSpec, PlatformVariant};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use relpipe_common::relative_files;
use std::fs;

/// Result of regenerating one module's descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedDescriptor {
    /// The module resolved for the variant, with its enumerated files.
    pub module: Module,
    /// Version the descriptor carried before the rewrite.
    pub previous_version: String,
    /// Path of the auxiliary file list.
    pub file_list_path: Utf8PathBuf,
}

/// Rewrites module descriptors for a new version.
#[derive(Debug, Clone, Copy)]
pub struct ManifestGenerator<'a> {
    root_dir: &'a Utf8Path,
    build_root: &'a Utf8Path,
    version: &'a str,
}

impl<'a> ManifestGenerator<'a> {
    /// Generator for `version`, resolving module paths against `root_dir`
    /// and writing file lists under `build_root`.
    #[must_use]
    pub const fn new(root_dir: &'a Utf8Path, build_root: &'a Utf8Path, version: &'a str) -> Self {
        Self {
            root_dir,
            build_root,
            version,
        }
    }

    /// Regenerate `spec`'s descriptor for `variant`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FileListing`] when a source or resource
    /// directory is missing, [`PipelineError::DescriptorFormat`] when the
    /// descriptor lacks a `Version=` line or a closed `[Files` section, and
    /// I/O errors from reading or writing.
    pub fn regenerate(
        &self,
        spec: &ModuleSpec,
        variant: &PlatformVariant,
    ) -> Result<UpdatedDescriptor> {
        let source_files = self.enumerate(spec, spec.source_dirs_for(&variant.name))?;
        let resource_files =
            self.enumerate(spec, spec.resource_dirs.iter().map(Utf8PathBuf::as_path))?;
        debug!(
            "{} has {} source and {} resource file(s) for {}",
            spec.name,
            source_files.len(),
            resource_files.len(),
            variant.name
        );

        let module = Module {
            name: spec.name.clone(),
            kind: spec.kind,
            variant: variant.name.clone(),
            source_files,
            resource_files,
            depends_on: spec.depends_on.clone(),
            descriptor_path: self.root_dir.join(&spec.descriptor),
        };
        let files: Vec<String> = module.files().map(str::to_owned).collect();

        let previous_version = self.rewrite_descriptor(&module.descriptor_path, files.clone())?;
        let file_list_path = self.write_file_list(&module, variant, &files)?;

        info!(
            "regenerated {} descriptor ({previous_version} -> {})",
            module.name, self.version
        );
        Ok(UpdatedDescriptor {
            module,
            previous_version,
            file_list_path,
        })
    }

    fn enumerate<'s>(
        &self,
        spec: &ModuleSpec,
        dirs: impl Iterator<Item = &'s Utf8Path>,
    ) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for dir in dirs {
            let listed = relative_files(self.root_dir, &self.root_dir.join(dir)).map_err(
                |source| PipelineError::FileListing {
                    module: spec.name.clone(),
                    source,
                },
            )?;
            files.extend(listed);
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    fn rewrite_descriptor(&self, path: &Utf8Path, files: Vec<String>) -> Result<String> {
        let format_error = |source: DescriptorError| PipelineError::DescriptorFormat {
            path: path.to_owned(),
            source,
        };

        let text = fs::read_to_string(path)?;
        let mut descriptor = Descriptor::parse(&text).map_err(format_error)?;
        let previous = descriptor
            .set_property(VERSION_KEY, self.version)
            .map_err(format_error)?;
        descriptor
            .replace_section(FILES_SECTION, files)
            .map_err(format_error)?;

        let rendered = descriptor.render();
        if rendered != text {
            fs::write(path, rendered)?;
        }
        Ok(previous)
    }

    fn write_file_list(
        &self,
        module: &Module,
        variant: &PlatformVariant,
        files: &[String],
    ) -> Result<Utf8PathBuf> {
        let dir = variant.output_dir(self.build_root);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.files", module.name));

        let mut contents = files.join("\n");
        if !files.is_empty() {
            contents.push('\n');
        }
        fs::write(&path, contents)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleKind, ModuleName};
    use rstest::{fixture, rstest};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const DESCRIPTOR: &str = "Type=2\n[Files\nstale/Gone.java\n]\nVersion=1.0.20\n";

    struct Project {
        _temp: TempDir,
        root: Utf8PathBuf,
        spec: ModuleSpec,
        variant: PlatformVariant,
    }

    impl Project {
        fn build_root(&self) -> Utf8PathBuf {
            self.root.join("build")
        }

        fn write(&self, relative: &str, contents: &str) {
            let path = self.root.join(relative);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, contents).expect("write");
        }
    }

    #[fixture]
    fn project() -> Project {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        let project = Project {
            _temp: temp,
            root,
            spec: ModuleSpec {
                name: ModuleName::from("Core"),
                kind: ModuleKind::Library,
                descriptor: Utf8PathBuf::from("core/Core.jdp"),
                source_dirs: vec![Utf8PathBuf::from("core/src")],
                resource_dirs: vec![Utf8PathBuf::from("core/res")],
                depends_on: Vec::new(),
                variants: None,
                variant_source_dirs: BTreeMap::from([(
                    "bb60".to_owned(),
                    vec![Utf8PathBuf::from("core/src-bb60")],
                )]),
            },
            variant: PlatformVariant {
                name: "bb45".to_owned(),
                compiler: Utf8PathBuf::from("rapc"),
                base_library: Utf8PathBuf::from("net_rim_api.jar"),
            },
        };
        project.write("core/Core.jdp", DESCRIPTOR);
        project.write("core/src/org/mail/Pop.java", "");
        project.write("core/src/org/app/Main.java", "");
        project.write("core/src-bb60/org/Touch.java", "");
        project.write("core/res/icon.png", "");
        project
    }

    fn generate(project: &Project) -> Result<UpdatedDescriptor> {
        let build_root = project.build_root();
        ManifestGenerator::new(&project.root, &build_root, "1.0.21")
            .regenerate(&project.spec, &project.variant)
    }

    #[rstest]
    fn rewrites_file_list_and_version(project: Project) {
        let updated = generate(&project).expect("regenerate");

        assert_eq!(updated.previous_version, "1.0.20");
        assert_eq!(
            fs::read_to_string(project.root.join("core/Core.jdp")).expect("read"),
            concat!(
                "Type=2\n[Files\n",
                "core/src/org/app/Main.java\n",
                "core/src/org/mail/Pop.java\n",
                "core/res/icon.png\n",
                "]\nVersion=1.0.21\n",
            )
        );
        assert_eq!(updated.module.resource_files, vec!["core/res/icon.png"]);
    }

    #[rstest]
    fn writes_auxiliary_file_list(project: Project) {
        let updated = generate(&project).expect("regenerate");
        assert_eq!(
            updated.file_list_path,
            project.build_root().join("bb45/Core.files")
        );
        assert_eq!(
            fs::read_to_string(&updated.file_list_path).expect("read"),
            "core/src/org/app/Main.java\ncore/src/org/mail/Pop.java\ncore/res/icon.png\n"
        );
    }

    #[rstest]
    fn variant_extra_sources_are_included(mut project: Project) {
        project.variant.name = "bb60".to_owned();
        let updated = generate(&project).expect("regenerate");
        assert!(
            updated
                .module
                .source_files
                .contains(&"core/src-bb60/org/Touch.java".to_owned())
        );
        assert_eq!(updated.module.variant, "bb60");
    }

    #[rstest]
    fn regeneration_is_byte_identical_across_runs(project: Project) {
        generate(&project).expect("first run");
        let first = fs::read(project.root.join("core/Core.jdp")).expect("read");
        generate(&project).expect("second run");
        let second = fs::read(project.root.join("core/Core.jdp")).expect("read");
        assert_eq!(first, second);
    }

    #[rstest]
    #[case::no_version("Type=2\n[Files\n]\n")]
    #[case::no_files("Version=1.0.20\n")]
    #[case::unterminated_files("Version=1.0.20\n[Files\na.java\n")]
    fn malformed_descriptor_is_a_hard_stop(project: Project, #[case] descriptor: &str) {
        project.write("core/Core.jdp", descriptor);
        let err = generate(&project).expect_err("malformed");
        assert!(matches!(err, PipelineError::DescriptorFormat { .. }));
        assert_eq!(
            fs::read_to_string(project.root.join("core/Core.jdp")).expect("read"),
            descriptor,
            "a malformed descriptor must be left untouched"
        );
    }

    #[rstest]
    fn missing_source_directory_names_module(mut project: Project) {
        project.spec.source_dirs.push(Utf8PathBuf::from("core/missing"));
        let err = generate(&project).expect_err("missing dir");
        assert!(matches!(
            err,
            PipelineError::FileListing { ref module, .. } if module.as_str() == "Core"
        ));
    }

    #[test]
    fn descriptor_error_is_exposed_as_source() {
        let err = PipelineError::DescriptorFormat {
            path: Utf8PathBuf::from("Core.jdp"),
            source: DescriptorError::MissingSection {
                name: "Files".to_owned(),
            },
        };
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "missing [Files section");
    }
}

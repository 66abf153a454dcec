//! Test support for pipeline behavioural tests.
//!
//! [`Project`] lays out a throwaway project tree with module sources,
//! descriptors, a signing password, and a build manifest, then parses a
//! `relpipe.toml` rooted there.

use camino::{Utf8Path, Utf8PathBuf};
use relpipe::config::Config;
use std::fs;
use tempfile::TempDir;

/// Password written to the project's `sigpass` file.
pub const PASSWORD: &str = "hunter2";

/// Descriptor every generated module starts with.
pub const DESCRIPTOR: &str = "Type=Library\nVersion=1.0.20\n[Files\n]\n";

/// Two modules, `Extension` importing `Core`, built for one variant and
/// published to a dummy remote.
pub const CONFIG: &str = r#"
app = "LogicMail"

[toolchain]
signature_tool = "sdk/SignatureTool.jar"
merge_tool = "sdk/bin/UpdateJad"
password_file = "sigpass"
merge_timeout_secs = 1
merge_poll_interval_millis = 5

[[variants]]
name = "bb45"
compiler = "sdk/4.5/bin/rapc"
base_library = "sdk/4.5/lib/net_rim_api.jar"

[[modules]]
name = "Core"
kind = "application"
descriptor = "Core/Core.jdp"
source_dirs = ["Core/src"]

[[modules]]
name = "Extension"
kind = "library"
descriptor = "Extension/Extension.jdp"
source_dirs = ["Extension/src"]
depends_on = ["Core"]

[publish]
remote = "git@example.com:logicmail/releases.git"
"#;

/// A temporary project tree.
pub struct Project {
    _temp: TempDir,
    root: Utf8PathBuf,
}

impl Project {
    /// An empty project directory.
    pub fn empty() -> Self {
        let temp = TempDir::new().expect("create temp project");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 temp dir");
        Self { _temp: temp, root }
    }

    /// `Core` and `Extension` sources and descriptors, the signing password,
    /// and a manifest at build 20.
    pub fn standard() -> Self {
        let project = Self::empty();
        project.add_module("Core");
        project.add_module("Extension");
        project.write("sigpass", &format!("{PASSWORD}\n"));
        project.write_manifest(20);
        project
    }

    /// Project root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Absolute path of `relative` inside the project.
    pub fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(&path, contents).expect("write project file");
    }

    /// Contents of `relative`.
    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).expect("read project file")
    }

    /// Remove `relative`.
    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.path(relative)).expect("remove project file");
    }

    /// A module with one source file and the default descriptor.
    pub fn add_module(&self, name: &str) {
        self.write(&format!("{name}/src/{name}.java"), "class X {}\n");
        self.write(&format!("{name}/{name}.jdp"), DESCRIPTOR);
    }

    /// A `build.json` recording `build`.
    pub fn write_manifest(&self, build: u64) {
        self.write(
            "build.json",
            &format!(
                r#"{{"build": {build}, "version": "1.0.{build}", "app": "LogicMail", "time": "2026-10-15T08:00:00Z"}}"#
            ),
        );
    }

    /// Parse `text` as this project's `relpipe.toml`.
    pub fn config(&self, text: &str) -> Config {
        Config::parse(text, &self.path("relpipe.toml"), &self.root).expect("parse config")
    }
}

//! Persistent, monotonic build counter.
//!
//! The build manifest is a small JSON record stored at a configured path:
//!
//! ```json
//! {
//!   "build": 21,
//!   "version": "1.0.21",
//!   "app": "LogicMail",
//!   "time": "2026-10-16T09:30:00Z"
//! }
//! ```
//!
//! [`VersionStore::next_version`] reads the record, increments the build
//! number, and rewrites it wholesale. The read-modify-write runs under an
//! exclusive advisory lock on `<manifest>.lock`, and the new record is
//! written to a temporary file in the same directory before being renamed
//! over the old one.

use crate::error::{PipelineError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use tempfile::NamedTempFile;

/// Version prefix used when none is configured.
pub const DEFAULT_VERSION_PREFIX: &str = "1.0";

/// The persisted build record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Monotonic build number.
    pub build: u64,
    /// `<prefix>.<build>`.
    pub version: String,
    /// Application name.
    pub app: String,
    /// UTC time of the last bump, `YYYY-MM-DDThh:mm:ssZ`.
    #[serde(rename = "time")]
    pub timestamp: String,
}

/// The build number and version produced by one bump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextVersion {
    /// New build number.
    pub build: u64,
    /// New version string.
    pub version: String,
}

/// Reads and bumps the build manifest.
#[derive(Debug, Clone)]
pub struct VersionStore {
    path: Utf8PathBuf,
    app: String,
    prefix: String,
    fixed_timestamp: Option<String>,
}

impl VersionStore {
    /// Store backed by the manifest at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, app: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            app: app.into(),
            prefix: DEFAULT_VERSION_PREFIX.to_owned(),
            fixed_timestamp: None,
        }
    }

    /// Use `prefix` instead of [`DEFAULT_VERSION_PREFIX`].
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Stamp manifests with `timestamp` instead of the current time.
    #[must_use]
    pub fn with_fixed_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.fixed_timestamp = Some(timestamp.into());
        self
    }

    /// Manifest file path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The persisted manifest, or `None` before the first bump.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ManifestCorrupt`] when the file cannot be
    /// parsed, and I/O errors when it cannot be read.
    pub fn current(&self) -> Result<Option<BuildManifest>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|err| PipelineError::ManifestCorrupt {
                path: self.path.clone(),
                reason: err.to_string(),
            })
    }

    /// What [`Self::next_version`] would return, without writing anything.
    ///
    /// # Errors
    ///
    /// As for [`Self::current`].
    pub fn preview(&self) -> Result<NextVersion> {
        let build = self.following_build(self.current()?.as_ref())?;
        Ok(self.version_for(build))
    }

    /// Increment the build number and persist the new manifest.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ManifestCorrupt`] when the existing manifest
    /// is malformed (it is never silently reset), and I/O errors when the
    /// lock, read, or write fails.
    pub fn next_version(&self) -> Result<NextVersion> {
        let parent = self.parent_dir();
        fs::create_dir_all(parent)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;
        debug!("locked {}", self.lock_path());

        let build = self.following_build(self.current()?.as_ref())?;
        let next = self.version_for(build);
        let manifest = BuildManifest {
            build,
            version: next.version.clone(),
            app: self.app.clone(),
            timestamp: self.timestamp()?,
        };
        self.persist(parent, &manifest)?;
        // Dropping the handle releases the lock.
        drop(lock);

        info!("build number is now {} ({})", next.build, next.version);
        Ok(next)
    }

    fn following_build(&self, current: Option<&BuildManifest>) -> Result<u64> {
        let previous = current.map_or(0, |manifest| manifest.build);
        previous
            .checked_add(1)
            .ok_or_else(|| PipelineError::ManifestCorrupt {
                path: self.path.clone(),
                reason: "build number overflow".to_owned(),
            })
    }

    fn version_for(&self, build: u64) -> NextVersion {
        NextVersion {
            build,
            version: format!("{}.{build}", self.prefix),
        }
    }

    fn persist(&self, parent: &Utf8Path, manifest: &BuildManifest) -> Result<()> {
        let json = serde_json::to_string_pretty(manifest).map_err(io::Error::other)?;
        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(json.as_bytes())?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    fn timestamp(&self) -> Result<String> {
        match &self.fixed_timestamp {
            Some(timestamp) => Ok(timestamp.clone()),
            None => relpipe_common::now_utc_iso8601()
                .map_err(|err| PipelineError::Io(io::Error::other(err))),
        }
    }

    fn parent_dir(&self) -> &Utf8Path {
        self.path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."))
    }

    fn lock_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}.lock", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        store: VersionStore,
    }

    #[fixture]
    fn fixture() -> Fixture {
        let temp = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(temp.path().join("release/build.json"))
            .expect("utf8 temp dir");
        let store = VersionStore::new(path, "LogicMail").with_fixed_timestamp("2026-10-16T09:30:00Z");
        Fixture { _temp: temp, store }
    }

    #[rstest]
    fn first_bump_creates_manifest_at_build_one(fixture: Fixture) {
        let next = fixture.store.next_version().expect("bump");
        assert_eq!(
            next,
            NextVersion {
                build: 1,
                version: "1.0.1".to_owned(),
            }
        );

        let manifest = fixture.store.current().expect("read").expect("manifest exists");
        assert_eq!(manifest.app, "LogicMail");
        assert_eq!(manifest.timestamp, "2026-10-16T09:30:00Z");
    }

    #[rstest]
    fn each_bump_increments_by_exactly_one(fixture: Fixture) {
        let builds: Vec<u64> = (0..3)
            .map(|_| fixture.store.next_version().expect("bump").build)
            .collect();
        assert_eq!(builds, vec![1, 2, 3]);
    }

    #[rstest]
    fn manifest_uses_time_key_on_disk(fixture: Fixture) {
        fixture.store.next_version().expect("bump");
        let raw = fs::read_to_string(fixture.store.path()).expect("read raw");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["build"], 1);
        assert_eq!(value["version"], "1.0.1");
        assert_eq!(value["time"], "2026-10-16T09:30:00Z");
    }

    #[rstest]
    fn corrupt_manifest_is_an_error_not_a_reset(fixture: Fixture) {
        let path = fixture.store.path();
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, "{\"build\": \"twenty\"}").expect("write corrupt");

        let err = fixture.store.next_version().expect_err("corrupt");
        assert!(matches!(err, PipelineError::ManifestCorrupt { .. }));
        assert_eq!(
            fs::read_to_string(path).expect("still there"),
            "{\"build\": \"twenty\"}"
        );
    }

    #[rstest]
    fn preview_does_not_write(fixture: Fixture) {
        let next = fixture.store.preview().expect("preview");
        assert_eq!(next.build, 1);
        assert!(!fixture.store.path().exists());
    }

    #[rstest]
    fn custom_prefix_is_applied(fixture: Fixture) {
        let store = fixture.store.clone().with_prefix("2.3");
        assert_eq!(store.next_version().expect("bump").version, "2.3.1");
    }
}

//! Signing credential.
//!
//! The signing password lives in a file outside the repository. It is loaded
//! once at pipeline start and passed explicitly to the packager.

use crate::error::{PipelineError, Result};
use camino::Utf8Path;
use std::fmt;
use std::fs;
use std::io;

/// The signing tool's keystore password.
///
/// `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredential {
    password: String,
}

impl SigningCredential {
    /// Wrap an already-known password.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    /// Read the password from `path`, ignoring trailing line breaks.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CredentialMissing`] when the file does not
    /// exist or holds no password, and I/O errors for other read failures.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let missing = |reason: &str| PipelineError::CredentialMissing {
            path: path.to_owned(),
            reason: reason.to_owned(),
        };

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(missing("file not found"));
            }
            Err(err) => return Err(err.into()),
        };

        let password = contents.trim_end_matches(['\r', '\n']);
        if password.trim().is_empty() {
            return Err(missing("file is empty"));
        }
        Ok(Self::new(password))
    }

    /// The password, for passing to the signing tool.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("password", &"********")
            .finish()
    }
}

//! Shared helpers for the relpipe release pipeline: deterministic file
//! enumeration, bounded polling for files written by external tools, and UTC
//! timestamp formatting.

pub mod files;
pub mod poll;
pub mod timestamp;

pub use files::{FilesError, clear_directory, relative_files, remove_file_if_present};
pub use poll::{PollSettings, PollTimeout, wait_for_path};
pub use timestamp::{format_epoch_secs, now_utc_iso8601};

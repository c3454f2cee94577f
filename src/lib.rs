//! Spec fixtures as flat text archives.
//!
//! A spec test case is a directory holding an `input.scss` or `input.sass` and the
//! files it is expected to produce. [`SpecDir`] gives one read-only view over such
//! directories whether they live on disk or inside an `.hrx` archive,
//! [`to_archive_text`] flattens a tree into a single diff-friendly archive, and
//! [`SpecDir::with_real_files`] writes an archived case to disk for exactly as long as a
//! test runner needs it.
mod api;
pub mod archive;
pub mod classify;
pub mod config;
pub mod errors;
pub mod fs;
pub mod materialize;
pub mod spec_dir;
mod transactions;
pub mod vfs;

pub use api::{from_archive_text, list_tests, load, to_archive, SpecPathError};
pub use archive::{to_archive_text, SECTION_SEPARATOR};
pub use config::Config;
pub use spec_dir::{SpecDir, SpecDirError};

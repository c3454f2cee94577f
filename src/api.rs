use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    archive,
    config::{self, Config},
    fs::{FileSystem, RealFs},
    materialize,
    spec_dir::{self, SpecDir, ARCHIVE_EXTENSION},
    vfs::DirNode,
};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SpecPathError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    SpecDir(#[from] spec_dir::SpecDirError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] config::ConfigError),
}

impl From<crate::vfs::ArchiveError> for SpecPathError {
    fn from(error: crate::vfs::ArchiveError) -> Self {
        Self::SpecDir(error.into())
    }
}

/// Opens a spec directory on disk.
///
/// `path` may name a directory or an `.hrx` archive; `foo` also resolves to `foo.hrx`
/// when no directory `foo` exists. Archive-backed directories materialize next to the
/// archive, at its path without the extension.
///
/// # Errors
///
/// Returns a [`SpecPathError`] if:
///
/// - The directory cannot be listed or the archive cannot be read.
/// - The archive is malformed.
pub fn load(path: impl AsRef<Path>, config: &Config) -> Result<SpecDir, SpecPathError> {
    let path = path.as_ref();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFs::new(config));

    if config.cleanup_on_interrupt {
        materialize::install_interrupt_cleanup();
    }

    let is_archive = path
        .extension()
        .is_some_and(|ext| ext == ARCHIVE_EXTENSION);
    let sibling_archive = path.with_extension(ARCHIVE_EXTENSION);

    let dir = if is_archive {
        SpecDir::from_archive_file(path, fs)?
    } else if !fs.exists(path) && fs.exists(&sibling_archive) {
        SpecDir::from_archive_file(sibling_archive, fs)?
    } else {
        SpecDir::from_disk(path, fs)?
    };

    log::debug!(
        "loaded {} ({})",
        dir.path().display(),
        if dir.is_archive() { "archive" } else { "disk" }
    );

    Ok(dir)
}

/// Decodes archive text that did not come from a file. The result materializes at
/// `virtual_path`.
pub fn from_archive_text(
    text: &str,
    virtual_path: impl Into<PathBuf>,
    fs: Arc<dyn FileSystem>,
) -> Result<SpecDir, SpecPathError> {
    let tree = DirNode::parse(text)?;

    Ok(SpecDir::from_archive(virtual_path, tree, fs))
}

/// Loads `path` and serializes it into archive text.
pub fn to_archive(path: impl AsRef<Path>, config: &Config) -> Result<String, SpecPathError> {
    let dir = load(path, config)?;

    Ok(archive::to_archive_text(&dir)?)
}

/// Loads `path` and collects the relative path of every test directory in it.
pub fn list_tests(
    path: impl AsRef<Path>,
    prefix: &str,
    config: &Config,
) -> Result<Vec<String>, SpecPathError> {
    let dir = load(path, config)?;
    let mut tests = Vec::new();

    dir.for_each_test(prefix, |test| -> Result<(), SpecPathError> {
        tests.push(test.rel_path());
        Ok(())
    })?;

    Ok(tests)
}

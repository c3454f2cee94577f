use std::{fs, path::Path};

use walkdir::WalkDir;

use crate::{
    config::Config,
    errors::{FileOperation, IoError},
};

/// A name found directly inside a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// The filesystem primitives the rest of the crate is allowed to use.
///
/// Everything that touches disk goes through this trait so that traversal and
/// serialization can run against an archive without any real files, and so tests can
/// substitute a filesystem that fails on purpose.
pub trait FileSystem: std::fmt::Debug + Send + Sync {
    fn read(&self, path: &Path) -> Result<Vec<u8>, IoError>;
    /// Lists the direct children of `path`.
    fn list(&self, path: &Path) -> Result<Vec<DirEntry>, IoError>;
    /// Creates a single directory. Fails if it already exists.
    fn create_dir(&self, path: &Path) -> Result<(), IoError>;
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), IoError>;
    fn remove_dir_all(&self, path: &Path) -> Result<(), IoError>;
    fn exists(&self, path: &Path) -> bool;
}

/// [`FileSystem`] backed by the real disk.
#[derive(Debug, Clone)]
pub struct RealFs {
    sort_listings: bool,
}
impl RealFs {
    pub fn new(config: &Config) -> Self {
        Self {
            sort_listings: config.sort_listings,
        }
    }
}
impl Default for RealFs {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
impl FileSystem for RealFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>, IoError> {
        fs::read(path).map_err(|error| IoError::new(FileOperation::Read, path.into(), error))
    }

    fn list(&self, path: &Path) -> Result<Vec<DirEntry>, IoError> {
        // walkdir yields nothing below a file instead of failing
        if path.is_file() {
            return Err(IoError::new(
                FileOperation::ReadDir,
                path.into(),
                std::io::ErrorKind::NotADirectory.into(),
            ));
        }

        let mut walker = WalkDir::new(path).min_depth(1).max_depth(1);
        if self.sort_listings {
            walker = walker.sort_by_file_name();
        }

        let mut entries = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(error) => {
                    let failed = error.path().unwrap_or(path);

                    Err(IoError::new(
                        FileOperation::ReadDir,
                        failed.to_path_buf(),
                        error.into(),
                    ))?
                }
            };

            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                // follow symlinks so linked fixture directories still count as directories
                is_dir: entry.path().is_dir(),
            });
        }

        Ok(entries)
    }

    fn create_dir(&self, path: &Path) -> Result<(), IoError> {
        fs::create_dir(path).map_err(|error| IoError::new(FileOperation::Mkdir, path.into(), error))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), IoError> {
        fs::write(path, contents)
            .map_err(|error| IoError::new(FileOperation::Write, path.into(), error))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<(), IoError> {
        fs::remove_dir_all(path)
            .map_err(|error| IoError::new(FileOperation::Remove, path.into(), error))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

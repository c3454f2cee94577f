use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use miette::Diagnostic;
use thiserror::Error;

use crate::{
    classify::find_input_file,
    errors::IoError,
    fs::FileSystem,
    vfs::{ArchiveError, DirNode},
};

pub const ARCHIVE_EXTENSION: &str = "hrx";

#[derive(Debug, Error, Diagnostic)]
pub enum SpecDirError {
    #[error("I/O error within spec directory domain")]
    #[diagnostic(code(specpath::spec_dir::io))]
    Io(#[from] IoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] ArchiveError),

    #[error("'{name}' not found in '{dir}'")]
    #[diagnostic(
        code(specpath::spec_dir::not_found),
        help("Only names listed by `files()` or `subdirs()` can be looked up")
    )]
    NotFound { name: String, dir: PathBuf },

    #[error("refusing to materialize into existing directory '{path}'")]
    #[diagnostic(
        code(specpath::spec_dir::already_exists),
        help("A previous run may have been killed before cleaning up; remove the directory and retry")
    )]
    AlreadyExists { path: PathBuf },

    #[error("unable to remove materialized directory '{path}'")]
    #[diagnostic(
        code(specpath::spec_dir::cleanup),
        help("The directory must be removed by hand before the next run")
    )]
    Cleanup {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("'{path}' is not valid UTF-8")]
    #[diagnostic(
        code(specpath::spec_dir::invalid_utf8),
        help("Archives can only hold text files")
    )]
    InvalidUtf8 { path: PathBuf },

    #[error("test action failed")]
    #[diagnostic(code(specpath::spec_dir::action))]
    Action(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// How a subdirectory of a physical directory is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Child {
    Directory,
    /// `<name>.hrx` next to the listing.
    Archive,
}

/// Snapshot of a physical directory taken when its view is created.
#[derive(Debug, Clone, Default)]
pub(crate) struct Listing {
    files: Vec<String>,
    subdirs: IndexMap<String, Child>,
}

#[derive(Debug, Clone)]
pub(crate) enum Backing {
    Physical(Listing),
    Archive(Arc<DirNode>),
}

/// A read-only view of a spec directory, whether it lives on disk or inside an archive.
///
/// Views of subdirectories are cheap: archive-backed views share the decoded tree, and
/// disk-backed views only list their own level.
#[derive(Debug, Clone)]
pub struct SpecDir {
    pub(crate) path: PathBuf,
    rel: Vec<String>,
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) backing: Backing,
}

impl SpecDir {
    /// Creates a view of a real directory.
    ///
    /// `<name>.hrx` files in the directory are presented as a subdirectory `<name>`
    /// backed by the archive. A real directory with the same name takes precedence.
    pub fn from_disk(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Result<Self, SpecDirError> {
        let path = path.into();
        let mut listing = Listing::default();

        for entry in fs.list(&path)? {
            if entry.is_dir {
                listing.subdirs.insert(entry.name, Child::Directory);
                continue;
            }

            let archive_stem = Path::new(&entry.name)
                .extension()
                .filter(|ext| *ext == ARCHIVE_EXTENSION)
                .and_then(|_| Path::new(&entry.name).file_stem())
                .map(|stem| stem.to_string_lossy().into_owned());

            match archive_stem {
                Some(stem) => {
                    listing.subdirs.entry(stem).or_insert(Child::Archive);
                }
                None => listing.files.push(entry.name),
            }
        }

        log::debug!(
            "listed {}: {} files, {} subdirectories",
            path.display(),
            listing.files.len(),
            listing.subdirs.len()
        );

        Ok(Self {
            path,
            rel: Vec::new(),
            fs,
            backing: Backing::Physical(listing),
        })
    }

    /// Creates a view of a decoded archive that will materialize at `path`.
    pub fn from_archive(path: impl Into<PathBuf>, tree: DirNode, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            rel: Vec::new(),
            fs,
            backing: Backing::Archive(Arc::new(tree)),
        }
    }

    /// Reads and decodes an `.hrx` file. The view's path is the archive path without
    /// its extension, which is where it materializes.
    pub fn from_archive_file(
        archive_path: impl AsRef<Path>,
        fs: Arc<dyn FileSystem>,
    ) -> Result<Self, SpecDirError> {
        let archive_path = archive_path.as_ref();
        let bytes = fs.read(archive_path)?;
        let text = String::from_utf8(bytes).map_err(|_| SpecDirError::InvalidUtf8 {
            path: archive_path.to_path_buf(),
        })?;

        let tree = DirNode::parse(&text)?;

        log::debug!("decoded archive {}", archive_path.display());

        Ok(Self::from_archive(archive_path.with_extension(""), tree, fs))
    }

    /// Absolute location on disk, or where an archive-backed directory materializes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the root of the traversal that produced this view, always
    /// `/`-separated.
    pub fn rel_path(&self) -> String {
        self.rel.join("/")
    }

    pub fn is_archive(&self) -> bool {
        matches!(self.backing, Backing::Archive(_))
    }

    /// Names of the files directly in this directory.
    pub fn files(&self) -> Vec<&str> {
        match &self.backing {
            Backing::Physical(listing) => listing.files.iter().map(String::as_str).collect(),
            Backing::Archive(node) => node.file_names().collect(),
        }
    }

    /// Names of the subdirectories directly in this directory.
    pub fn subdirs(&self) -> Vec<&str> {
        match &self.backing {
            Backing::Physical(listing) => listing.subdirs.keys().map(String::as_str).collect(),
            Backing::Archive(node) => node.dir_names().collect(),
        }
    }

    pub fn has_file(&self, name: &str) -> bool {
        match &self.backing {
            Backing::Physical(listing) => listing.files.iter().any(|file| file == name),
            Backing::Archive(node) => node.file(name).is_some(),
        }
    }

    pub fn is_test_dir(&self) -> bool {
        self.input_file().is_some()
    }

    /// `input.scss` or `input.sass`, or `None` if this is not a test directory.
    pub fn input_file(&self) -> Option<&str> {
        find_input_file(self.files())
    }

    fn not_found(&self, name: &str) -> SpecDirError {
        SpecDirError::NotFound {
            name: name.to_string(),
            dir: self.path.clone(),
        }
    }

    pub fn contents(&self, name: &str) -> Result<Vec<u8>, SpecDirError> {
        match &self.backing {
            Backing::Physical(_) if self.has_file(name) => Ok(self.fs.read(&self.path.join(name))?),
            Backing::Physical(_) => Err(self.not_found(name)),
            Backing::Archive(node) => node
                .file(name)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| self.not_found(name)),
        }
    }

    /// Returns a view of the subdirectory `name`.
    pub fn subitem(&self, name: &str) -> Result<SpecDir, SpecDirError> {
        let path = self.path.join(name);

        let mut child = match &self.backing {
            Backing::Physical(listing) => match listing.subdirs.get(name) {
                Some(Child::Directory) => Self::from_disk(path, Arc::clone(&self.fs))?,
                Some(Child::Archive) => {
                    let archive = self.path.join(format!("{name}.{ARCHIVE_EXTENSION}"));
                    Self::from_archive_file(archive, Arc::clone(&self.fs))?
                }
                None => return Err(self.not_found(name)),
            },
            Backing::Archive(node) => {
                let tree = node.dir(name).ok_or_else(|| self.not_found(name))?;
                Self {
                    path,
                    rel: Vec::new(),
                    fs: Arc::clone(&self.fs),
                    backing: Backing::Archive(Arc::clone(tree)),
                }
            }
        };

        child.rel = self.rel.clone();
        child.rel.push(name.to_string());

        Ok(child)
    }

    /// The same view with its relative path reset to `prefix`.
    pub fn rebased(&self, prefix: &str) -> SpecDir {
        let mut rebased = self.clone();
        rebased.rel = prefix
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        rebased
    }

    /// Calls `visitor` for every test directory at or below this one, depth first.
    ///
    /// `prefix` becomes the [`rel_path`](Self::rel_path) of this directory. A test
    /// directory's own subdirectories are still searched, since nested test suites are
    /// allowed. Calls happen one at a time, in order, and the first error stops the walk.
    pub fn for_each_test<E, F>(&self, prefix: &str, mut visitor: F) -> Result<(), E>
    where
        F: FnMut(&SpecDir) -> Result<(), E>,
        E: From<SpecDirError>,
    {
        self.rebased(prefix).visit_tests(&mut visitor)
    }

    fn visit_tests<E, F>(&self, visitor: &mut F) -> Result<(), E>
    where
        F: FnMut(&SpecDir) -> Result<(), E>,
        E: From<SpecDirError>,
    {
        if self.is_test_dir() {
            log::debug!("visiting test {}", self.rel_path());
            visitor(self)?;
        }

        for name in self.subdirs() {
            self.subitem(name)?.visit_tests(visitor)?;
        }

        Ok(())
    }
}

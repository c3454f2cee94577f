use std::sync::Arc;

use indexmap::IndexMap;
use miette::Diagnostic;
use thiserror::Error;

/// Every way a decoded archive can fail to describe a directory tree.
#[derive(Debug, Error, Diagnostic)]
pub enum ArchiveError {
    #[error("malformed archive: {source}")]
    #[diagnostic(
        code(specpath::archive::parse),
        help("Every entry must start with `<===> ` followed by a relative path")
    )]
    Parse {
        #[source]
        source: hrx::errors::ParseError,
    },

    #[error("malformed archive: '{path}' appears more than once")]
    #[diagnostic(code(specpath::archive::duplicate_path))]
    DuplicatePath { path: String },

    #[error("malformed archive: '{path}' is used both as a file and as a directory")]
    #[diagnostic(code(specpath::archive::path_conflict))]
    PathConflict { path: String },
}

/// One directory level of a decoded archive.
///
/// Files and subdirectories keep the order in which they first appeared in the
/// archive. Subdirectories are reference counted so a view of a nested directory shares
/// the tree instead of copying it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirNode {
    files: IndexMap<String, Vec<u8>>,
    dirs: IndexMap<String, Arc<DirNode>>,
}
impl DirNode {
    /// Decodes archive text into a tree.
    pub fn parse(text: &str) -> Result<Self, ArchiveError> {
        let entries = hrx::parse(text).map_err(|source| ArchiveError::Parse { source })?;

        Self::from_entries(entries)
    }

    pub fn from_entries<I>(entries: I) -> Result<Self, ArchiveError>
    where
        I: IntoIterator<Item = hrx::Entry>,
    {
        let mut root = Self::default();

        for entry in entries {
            match entry.kind {
                hrx::EntryKind::File(contents) => {
                    root.insert_file(&entry.path, contents.into_bytes())?
                }
                hrx::EntryKind::Directory => {
                    root.insert_dir(&entry.path)?;
                }
            }
        }

        Ok(root)
    }

    /// Walks to (creating as needed) the directory `segments` points at.
    fn descend(&mut self, path: &str, segments: &[&str]) -> Result<&mut DirNode, ArchiveError> {
        let mut current = self;

        for segment in segments {
            if current.files.contains_key(*segment) {
                return Err(ArchiveError::PathConflict {
                    path: path.to_string(),
                });
            }
            current = Arc::make_mut(current.dirs.entry(segment.to_string()).or_default());
        }

        Ok(current)
    }

    pub fn insert_file(&mut self, path: &str, contents: Vec<u8>) -> Result<(), ArchiveError> {
        let segments: Vec<&str> = path.split('/').collect();
        let (name, parents) = segments
            .split_last()
            .ok_or_else(|| ArchiveError::PathConflict {
                path: path.to_string(),
            })?;

        let parent = self.descend(path, parents)?;

        if parent.dirs.contains_key(*name) {
            return Err(ArchiveError::PathConflict {
                path: path.to_string(),
            });
        }
        if parent.files.contains_key(*name) {
            return Err(ArchiveError::DuplicatePath {
                path: path.to_string(),
            });
        }

        parent.files.insert(name.to_string(), contents);

        Ok(())
    }

    pub fn insert_dir(&mut self, path: &str) -> Result<&mut DirNode, ArchiveError> {
        let segments: Vec<&str> = path.split('/').collect();

        self.descend(path, &segments)
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn dir_names(&self) -> impl Iterator<Item = &str> {
        self.dirs.keys().map(String::as_str)
    }

    pub fn file_entries(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files
            .iter()
            .map(|(name, contents)| (name.as_str(), contents.as_slice()))
    }

    pub fn dir_entries(&self) -> impl Iterator<Item = (&str, &DirNode)> {
        self.dirs
            .iter()
            .map(|(name, node)| (name.as_str(), node.as_ref()))
    }

    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn dir(&self, name: &str) -> Option<&Arc<DirNode>> {
        self.dirs.get(name)
    }
}

//! Serializing a spec directory tree into a single archive.
//!
//! The order of entries depends only on the directory structure and file names, never
//! on contents, so the same tree always produces the same text.

use crate::{
    classify::FileKind,
    spec_dir::{SpecDir, SpecDirError},
};

/// Placed between the sections of two directories. Decodes as an archive comment.
pub const SECTION_SEPARATOR: &str = "\n<===>\n================================================================================\n";

/// Serializes `root` and everything below it. Paths in the archive are relative to
/// `root`.
pub fn to_archive_text(root: &SpecDir) -> Result<String, SpecDirError> {
    let sections = sections(&root.rebased(""))?;

    log::debug!(
        "serialized {} into {} sections",
        root.path().display(),
        sections.len()
    );

    Ok(sections.join(SECTION_SEPARATOR))
}

fn sections(dir: &SpecDir) -> Result<Vec<String>, SpecDirError> {
    if dir.is_test_dir() {
        Ok(vec![test_dir_section(dir)?])
    } else {
        plain_dir_sections(dir)
    }
}

fn archive_path(dir: &SpecDir, name: &str) -> String {
    let rel = dir.rel_path();
    if rel.is_empty() {
        name.to_string()
    } else {
        format!("{rel}/{name}")
    }
}

/// Renders `<===> path` headers and contents for `names`, joined by newlines.
fn file_entries(dir: &SpecDir, names: &[&str]) -> Result<String, SpecDirError> {
    let mut entries = Vec::with_capacity(names.len());

    for name in names {
        let contents = String::from_utf8(dir.contents(name)?).map_err(|_| {
            SpecDirError::InvalidUtf8 {
                path: dir.path().join(name),
            }
        })?;

        entries.push(format!("<===> {}\n{}", archive_path(dir, name), contents));
    }

    Ok(entries.join("\n"))
}

fn subdir_sections(dir: &SpecDir) -> Result<Vec<String>, SpecDirError> {
    let mut all = Vec::new();

    for name in dir.subdirs() {
        all.extend(sections(&dir.subitem(name)?)?);
    }

    Ok(all)
}

/// One section for the directory's own files, if it has any, then its subdirectories.
fn plain_dir_sections(dir: &SpecDir) -> Result<Vec<String>, SpecDirError> {
    let files = dir.files();
    let subdirs = subdir_sections(dir)?;

    if files.is_empty() {
        return Ok(subdirs);
    }

    let mut all = vec![file_entries(dir, &files)?];
    all.extend(subdirs);

    Ok(all)
}

/// A test directory is a single section: what the test reads, then nested cases, then
/// what the test is expected to produce.
fn test_dir_section(dir: &SpecDir) -> Result<String, SpecDirError> {
    let files = dir.files();
    let of_kind = |kind: FileKind| {
        files
            .iter()
            .copied()
            .filter(|name| FileKind::of(name) == kind)
            .collect::<Vec<_>>()
    };
    let sorted_of_kind = |kind: FileKind| {
        let mut names = of_kind(kind);
        names.sort_unstable();
        names
    };

    let blocks = [
        file_entries(dir, &of_kind(FileKind::Options))?,
        file_entries(dir, &of_kind(FileKind::Input))?,
        // listing order, not re-sorted
        file_entries(dir, &of_kind(FileKind::Other))?,
        subdir_sections(dir)?.join("\n"),
        file_entries(dir, &of_kind(FileKind::Output))?,
        file_entries(dir, &sorted_of_kind(FileKind::AlternateOutput))?,
        file_entries(dir, &sorted_of_kind(FileKind::Warning))?,
        file_entries(dir, &sorted_of_kind(FileKind::Error))?,
    ];

    Ok(blocks
        .into_iter()
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

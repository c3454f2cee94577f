//! Writing archive-backed spec directories to disk for the duration of a test run.
//!
//! The directory a [`SpecDir::with_real_files`] call creates is removed on every way out
//! of the call: a normal return, an `Err` from the action, or a panic unwinding through
//! it. Interrupts are covered on a best-effort basis by
//! [`install_interrupt_cleanup`], which removes every directory still registered when
//! SIGINT or SIGTERM arrives. A `SIGKILL` or `std::process::exit` elsewhere can still
//! leave a directory behind; the next materialization then fails with
//! [`SpecDirError::AlreadyExists`] instead of reusing it.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    classify::{find_input_file, FileKind},
    errors::IoError,
    fs::FileSystem,
    spec_dir::{Backing, SpecDir, SpecDirError},
    transactions::{RollbackOperation, Transaction},
    vfs::DirNode,
};

/// Materialized directories that still exist, for the interrupt handler.
static LIVE_DIRS: Mutex<Vec<(PathBuf, Arc<dyn FileSystem>)>> = Mutex::new(Vec::new());

/// Registration in [`LIVE_DIRS`], released on drop.
struct LiveDir(PathBuf);
impl LiveDir {
    fn register(path: &Path, fs: &Arc<dyn FileSystem>) -> Self {
        LIVE_DIRS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.to_path_buf(), Arc::clone(fs)));

        LiveDir(path.to_path_buf())
    }
}
impl Drop for LiveDir {
    fn drop(&mut self) {
        LIVE_DIRS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(path, _)| *path != self.0);
    }
}

/// Removes every materialized directory that is still registered.
fn remove_live_dirs() {
    let dirs = std::mem::take(&mut *LIVE_DIRS.lock().unwrap_or_else(PoisonError::into_inner));

    for (path, fs) in dirs {
        log::debug!("interrupted, removing dir: {}", path.display());
        if let Err(error) = fs.remove_dir_all(&path) {
            log::warn!("unable to remove {} after interrupt: {error}", path.display());
        }
    }
}

/// Installs a SIGINT/SIGTERM listener that removes live materialized directories and
/// then exits with `128 + signal`. Only the first call has any effect.
#[cfg(unix)]
pub fn install_interrupt_cleanup() {
    use signal_hook::{
        consts::{SIGINT, SIGTERM},
        iterator::Signals,
    };
    use std::sync::Once;

    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            std::thread::spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    remove_live_dirs();
                    std::process::exit(128 + signal);
                }
            });
            log::debug!("interrupt cleanup installed");
        }
        Err(error) => log::warn!("unable to install interrupt cleanup: {error}"),
    });
}

/// Interrupt cleanup needs unix signals; elsewhere only the scoped cleanup applies.
#[cfg(not(unix))]
pub fn install_interrupt_cleanup() {
    log::debug!("interrupt cleanup is not supported on this platform");
}

/// Ancestors of `path` that do not exist yet, innermost first.
fn missing_ancestors(fs: &dyn FileSystem, path: &Path) -> Vec<PathBuf> {
    path.ancestors()
        .skip(1)
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .take_while(|ancestor| !fs.exists(ancestor))
        .map(Path::to_path_buf)
        .collect()
}

/// Writes the files of `node` a test run may read, then recurses.
///
/// A test directory contributes its input and helper files; expectations and
/// `options.yml` stay in the archive. A plain directory contributes everything.
fn write_sources(fs: &dyn FileSystem, dir: &Path, node: &DirNode) -> Result<(), IoError> {
    let is_test_dir = find_input_file(node.file_names()).is_some();

    for (name, contents) in node.file_entries() {
        if is_test_dir && !FileKind::of(name).is_source() {
            continue;
        }
        let path = dir.join(name);
        log::trace!("writing {}", path.display());
        fs.write(&path, contents)?;
    }

    for (name, child) in node.dir_entries() {
        let path = dir.join(name);
        fs.create_dir(&path)?;
        write_sources(fs, &path, child)?;
    }

    Ok(())
}

impl SpecDir {
    /// Runs `action` while this directory exists as real files at [`path`](Self::path).
    ///
    /// For an archive-backed directory a fresh directory is created (an existing one is
    /// an [`SpecDirError::AlreadyExists`] error and is left untouched), the sources are
    /// written into it, `action` runs, and the directory is removed again however
    /// `action` finishes. A directory that already lives on disk just runs `action`.
    ///
    /// Whatever `action` returns is returned unchanged. If removal fails after `action`
    /// failed, the removal error is logged and the action's error is returned; if
    /// `action` succeeded, the removal error is returned as [`SpecDirError::Cleanup`].
    pub fn with_real_files<T, E, F>(&self, action: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<SpecDirError>,
    {
        let Backing::Archive(tree) = &self.backing else {
            log::debug!("{} is already on disk", self.path.display());
            return action();
        };

        if self.fs.exists(&self.path) {
            return Err(SpecDirError::AlreadyExists {
                path: self.path.clone(),
            }
            .into());
        }

        let mut trx = Transaction::new(Arc::clone(&self.fs));

        // a nested view of an archive also needs the directories above it
        let ancestors = missing_ancestors(self.fs.as_ref(), &self.path);
        for ancestor in ancestors.iter().rev() {
            self.fs.create_dir(ancestor).map_err(SpecDirError::from)?;
            trx.add_operation(RollbackOperation::RemoveDir(ancestor.clone()));
        }

        self.fs.create_dir(&self.path).map_err(|error| {
            if error.kind() == std::io::ErrorKind::AlreadyExists {
                SpecDirError::AlreadyExists {
                    path: self.path.clone(),
                }
            } else {
                SpecDirError::Io(error)
            }
        })?;
        trx.add_operation(RollbackOperation::RemoveDir(self.path.clone()));

        let outermost = ancestors.last().unwrap_or(&self.path);
        let live = LiveDir::register(outermost, &self.fs);

        log::debug!("materializing {}", self.path.display());
        write_sources(self.fs.as_ref(), &self.path, tree).map_err(SpecDirError::from)?;

        let outcome = action();

        let cleanup = trx.rollback();
        drop(live);

        match (outcome, cleanup) {
            (outcome, Ok(())) => outcome,
            (Err(error), Err(cleanup)) => {
                log::warn!(
                    "unable to remove materialized directory {}: {cleanup}",
                    self.path.display()
                );
                Err(error)
            }
            (Ok(_), Err(cleanup)) => Err(SpecDirError::Cleanup {
                path: self.path.clone(),
                source: cleanup,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::FileOperation, fs::RealFs};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    const BASIC: &str = "<===> options.yml\n:todo:\n- libsass\n<===> input.scss\n@use 'util';\n<===> _util.scss\na {b: c}\n<===> sub/_deep.scss\n<===> output.css\na {\n  b: c;\n}\n<===> warning\nWARNING: careful\n";

    fn basic(root: &Path, fs: Arc<dyn FileSystem>) -> SpecDir {
        SpecDir::from_archive(root.join("basic"), DirNode::parse(BASIC).unwrap(), fs)
    }

    /// Held by every test here, since [`remove_live_dirs`] empties the whole registry.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn serial() -> std::sync::MutexGuard<'static, ()> {
        SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(path: &Path) -> bool {
        LIVE_DIRS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(live, _)| live == path)
    }

    /// Real disk, except that directories can never be removed.
    #[derive(Debug)]
    struct StickyFs(RealFs);
    impl FileSystem for StickyFs {
        fn read(&self, path: &Path) -> Result<Vec<u8>, IoError> {
            self.0.read(path)
        }
        fn list(&self, path: &Path) -> Result<Vec<crate::fs::DirEntry>, IoError> {
            self.0.list(path)
        }
        fn create_dir(&self, path: &Path) -> Result<(), IoError> {
            self.0.create_dir(path)
        }
        fn write(&self, path: &Path, contents: &[u8]) -> Result<(), IoError> {
            self.0.write(path, contents)
        }
        fn remove_dir_all(&self, path: &Path) -> Result<(), IoError> {
            Err(IoError::new(
                FileOperation::Remove,
                path.to_path_buf(),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "sticky"),
            ))
        }
        fn exists(&self, path: &Path) -> bool {
            self.0.exists(path)
        }
    }

    #[test]
    fn test_writes_sources_only() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let dir = basic(root.path(), Arc::new(RealFs::default()));

        dir.with_real_files(|| -> Result<(), SpecDirError> {
            let path = dir.path();
            assert!(path.is_dir());
            assert!(is_live(path));
            assert!(path.join("input.scss").exists());
            assert!(path.join("_util.scss").exists());
            assert!(path.join("sub").join("_deep.scss").exists());
            assert!(!path.join("output.css").exists());
            assert!(!path.join("warning").exists());
            assert!(!path.join("options.yml").exists());
            assert_eq!(
                std::fs::read_to_string(path.join("input.scss")).unwrap(),
                "@use 'util';"
            );
            Ok(())
        })
        .unwrap();

        assert!(!dir.path().exists());
        assert!(!is_live(dir.path()));
    }

    #[test]
    fn test_plain_directory_writes_every_file() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let tree = DirNode::parse("<===> output.css\n<===> notes.txt\n").unwrap();
        let dir = SpecDir::from_archive(root.path().join("plain"), tree, Arc::new(RealFs::default()));

        dir.with_real_files(|| -> Result<(), SpecDirError> {
            assert!(dir.path().join("output.css").exists());
            assert!(dir.path().join("notes.txt").exists());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_returns_action_value_and_cleans_up() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let dir = basic(root.path(), Arc::new(RealFs::default()));

        let value = dir.with_real_files(|| Ok::<_, SpecDirError>(42)).unwrap();

        assert_eq!(value, 42);
        assert!(!dir.path().exists());
    }

    #[test]
    fn test_deletes_directory_on_error() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let dir = basic(root.path(), Arc::new(RealFs::default()));

        let result: Result<(), SpecDirError> =
            dir.with_real_files(|| Err(SpecDirError::Action("Fail!".into())));

        match result {
            Err(SpecDirError::Action(error)) => assert_eq!(error.to_string(), "Fail!"),
            other => panic!("expected the action's error, got {other:?}"),
        }
        assert!(!dir.path().exists());
    }

    #[test]
    fn test_deletes_directory_on_panic() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let dir = basic(root.path(), Arc::new(RealFs::default()));

        let result = catch_unwind(AssertUnwindSafe(|| {
            dir.with_real_files(|| -> Result<(), SpecDirError> { panic!("runner crashed") })
        }));

        assert!(result.is_err());
        assert!(!dir.path().exists());
        assert!(!is_live(dir.path()));
    }

    #[test]
    fn test_refuses_existing_directory() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let dir = basic(root.path(), Arc::new(RealFs::default()));
        std::fs::create_dir(dir.path()).unwrap();
        std::fs::write(dir.path().join("stale.txt"), "left over").unwrap();

        let mut called = false;
        let result = dir.with_real_files(|| -> Result<(), SpecDirError> {
            called = true;
            Ok(())
        });

        assert!(matches!(result, Err(SpecDirError::AlreadyExists { .. })));
        assert!(!called);
        assert!(dir.path().join("stale.txt").exists());
    }

    #[test]
    fn test_cleanup_failure_does_not_mask_action_error() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let dir = basic(root.path(), Arc::new(StickyFs(RealFs::default())));

        let result: Result<(), SpecDirError> =
            dir.with_real_files(|| Err(SpecDirError::Action("Fail!".into())));

        assert!(matches!(result, Err(SpecDirError::Action(_))));
    }

    #[test]
    fn test_cleanup_failure_is_reported_after_success() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let dir = basic(root.path(), Arc::new(StickyFs(RealFs::default())));

        let result = dir.with_real_files(|| Ok::<_, SpecDirError>(()));

        assert!(matches!(result, Err(SpecDirError::Cleanup { .. })));
        assert!(!is_live(dir.path()));
    }

    #[test]
    fn test_nested_view_creates_and_removes_ancestors() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let dir = basic(root.path(), Arc::new(RealFs::default()));
        let sub = dir.subitem("sub").unwrap();

        sub.with_real_files(|| -> Result<(), SpecDirError> {
            assert!(sub.path().join("_deep.scss").exists());
            assert!(is_live(&root.path().join("basic")));
            Ok(())
        })
        .unwrap();

        assert!(!root.path().join("basic").exists());
    }

    #[test]
    fn test_disk_directory_is_left_alone() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("input.scss"), "a {}").unwrap();
        let dir = SpecDir::from_disk(root.path(), Arc::new(RealFs::default())).unwrap();

        dir.with_real_files(|| Ok::<_, SpecDirError>(())).unwrap();

        assert!(root.path().join("input.scss").exists());
    }

    #[test]
    fn test_remove_live_dirs_deletes_registered_directories() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("live");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("input.scss"), "a {}").unwrap();
        let fs: Arc<dyn FileSystem> = Arc::new(RealFs::default());
        let live = LiveDir::register(&path, &fs);
        assert!(is_live(&path));

        remove_live_dirs();

        assert!(!path.exists());
        assert!(!is_live(&path));
        drop(live);
        assert!(LIVE_DIRS.lock().unwrap_or_else(PoisonError::into_inner).is_empty());
    }

    #[test]
    fn test_remove_live_dirs_keeps_going_after_a_failure() {
        let _serial = serial();
        let root = tempfile::tempdir().unwrap();
        let sticky_path = root.path().join("sticky");
        let path = root.path().join("live");
        std::fs::create_dir(&sticky_path).unwrap();
        std::fs::create_dir(&path).unwrap();
        let sticky: Arc<dyn FileSystem> = Arc::new(StickyFs(RealFs::default()));
        let fs: Arc<dyn FileSystem> = Arc::new(RealFs::default());
        let _sticky_live = LiveDir::register(&sticky_path, &sticky);
        let _live = LiveDir::register(&path, &fs);

        remove_live_dirs();

        assert!(sticky_path.exists());
        assert!(!path.exists());
        assert!(!is_live(&sticky_path));
    }
}

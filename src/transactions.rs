use std::{path::PathBuf, sync::Arc};

use crate::{errors::IoError, fs::FileSystem};

/// Enum of possible operations to rollback
#[derive(Debug)]
pub enum RollbackOperation {
    RemoveDir(PathBuf),
}

/// Tracks what has been created on disk so it can be undone.
///
/// Rolling back explicitly with [`Transaction::rollback`] reports the first failure to
/// the caller. A transaction dropped with operations still registered (an early `?`
/// return, or unwinding out of a panicking action) rolls back best effort and only logs
/// failures, since `Drop` cannot return them.
///
/// # Example
///
/// ```rust,ignore
/// let mut trx = Transaction::new(fs);
/// trx.add_operation(RollbackOperation::RemoveDir("some/path".into()));
/// trx.rollback()?; // some/path is gone
/// ```
#[derive(Debug)]
pub struct Transaction {
    fs: Arc<dyn FileSystem>,
    rollback_operations: Vec<RollbackOperation>,
}
impl Transaction {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Transaction {
            fs,
            rollback_operations: vec![],
        }
    }
    /// Registers an operation that undoes something this transaction created.
    pub fn add_operation(&mut self, operation: RollbackOperation) {
        self.rollback_operations.push(operation);
    }
    /// Undoes every registered operation, newest first.
    ///
    /// All operations are attempted even if one fails; the first failure is returned
    /// and later ones are logged.
    pub fn rollback(mut self) -> Result<(), IoError> {
        let mut first_failure = None;

        for failure in self.run_rollback() {
            if first_failure.is_none() {
                first_failure = Some(failure);
            } else {
                log::warn!("rollback failed: {failure}");
            }
        }

        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn run_rollback(&mut self) -> Vec<IoError> {
        let mut failures = Vec::new();

        while let Some(operation) = self.rollback_operations.pop() {
            match operation {
                RollbackOperation::RemoveDir(path) => {
                    log::debug!("removing dir: {}", path.display());
                    if let Err(error) = self.fs.remove_dir_all(&path) {
                        failures.push(error);
                    }
                }
            }
        }

        failures
    }
}
impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.rollback_operations.is_empty() {
            log::debug!("transaction dropped, rolling back operations");
            for failure in self.run_rollback() {
                log::warn!("rollback failed: {failure}");
            }
        }
    }
}

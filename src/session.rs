use std::env as stdenv;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::history::HistoryRing;
use crate::jobs::{JobTable, ProcessControl, SharedJobTable, SystemProcesses};

/// State of one shell process, shared by every command it runs.
///
/// The session contains:
/// - `current_dir` / `previous_dir`: the working directory and the one before
///   the last successful `cd` (`None` until the first change).
/// - `interpreter`: the POSIX shell external commands are delegated to.
/// - `should_exit`: set by `quit` so the interactive loop knows to stop.
/// - the job table and the command history, owned for the session's lifetime.
#[derive(Debug)]
pub struct Session {
    pub current_dir: PathBuf,
    pub previous_dir: Option<PathBuf>,
    pub interpreter: PathBuf,
    pub should_exit: bool,
    jobs: SharedJobTable,
    history: HistoryRing,
}

impl Session {
    /// Capture the process's working directory and track children through
    /// the real OS primitives.
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self::with_process_control(interpreter, Arc::new(SystemProcesses))
    }

    pub fn with_process_control(
        interpreter: impl Into<PathBuf>,
        control: Arc<dyn ProcessControl>,
    ) -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            current_dir,
            previous_dir: None,
            interpreter: interpreter.into(),
            should_exit: false,
            jobs: SharedJobTable::new(JobTable::new(control)),
            history: HistoryRing::new(),
        }
    }

    pub fn jobs(&self) -> &SharedJobTable {
        &self.jobs
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryRing {
        &mut self.history
    }

    /// Change the process working directory to `target`, resolved against
    /// `current_dir`. On success `previous_dir` becomes the old `current_dir`;
    /// on failure neither changes.
    pub fn change_dir(&mut self, target: &Path) -> Result<()> {
        let new_dir = self.current_dir.join(target);
        let canonical = fs::canonicalize(&new_dir).context("chdir failed")?;
        stdenv::set_current_dir(&canonical).context("chdir failed")?;

        let old = std::mem::replace(&mut self.current_dir, canonical);
        self.previous_dir = Some(old);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    pub(crate) fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_new_session_has_no_previous_dir() {
        let session = Session::new("/bin/sh");
        assert!(session.previous_dir.is_none());
        assert!(!session.should_exit);
        assert!(session.history().is_empty());
        assert!(session.jobs().lock().is_empty());
    }

    #[test]
    fn test_change_dir_updates_both_dirs() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();

        let mut session = Session::new("/bin/sh");
        let before = session.current_dir.clone();
        session.change_dir(temp.path()).unwrap();

        assert_eq!(session.current_dir, canonical_temp);
        assert_eq!(session.previous_dir, Some(before));
        assert_eq!(fs::canonicalize(stdenv::current_dir().unwrap()).unwrap(), canonical_temp);

        stdenv::set_current_dir(orig).unwrap();
    }

    #[test]
    fn test_change_dir_failure_changes_nothing() {
        let _lock = lock_current_dir();
        let mut session = Session::new("/bin/sh");
        let before = session.current_dir.clone();

        let err = session
            .change_dir(Path::new("/definitely/not/a/dir"))
            .unwrap_err();
        assert!(format!("{err:#}").starts_with("chdir failed: "));
        assert_eq!(session.current_dir, before);
        assert!(session.previous_dir.is_none());
    }
}

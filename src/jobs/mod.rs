//! Tracking of the child processes spawned by the shell.
//!
//! A [`JobTable`] holds every background or stopped job plus the single
//! foreground slot. A live job is always in exactly one of the two places:
//! either it sits in the table, or the interpreter is waiting on it through
//! the slot. The table is shared with the signal bridge through
//! [`SharedJobTable`], and every transition between the two places happens
//! while that lock is held.

pub mod foreground;
mod process;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use thiserror::Error;
use tracing::{debug, warn};

pub use process::{ProcessControl, ProcessState, SystemProcesses};

/// Shell-assigned identifier of a job, distinct from the OS process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped,
}

/// A background or stopped job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// Leader of the job's process group.
    pub pid: Pid,
    /// Command line as the user typed it.
    pub command: String,
    pub created_at: Instant,
    pub status: JobStatus,
}

impl Job {
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// The job the interpreter is synchronously waiting on.
///
/// A freshly spawned foreground command has no id yet; one is allocated only
/// if it gets parked in the table. A job brought back with `fg` keeps its id.
#[derive(Debug, Clone)]
pub struct ForegroundJob {
    pub id: Option<JobId>,
    pub pid: Pid,
    pub command: String,
    pub created_at: Instant,
}

impl ForegroundJob {
    pub fn new(command: impl Into<String>, pid: Pid) -> Self {
        Self {
            id: None,
            pid,
            command: command.into(),
            created_at: Instant::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job-id {0} does not exist")]
    NoSuchJob(JobId),
    #[error("{call} failed: {source}")]
    Sys {
        call: &'static str,
        #[source]
        source: Errno,
    },
}

impl JobError {
    fn kill(source: Errno) -> Self {
        JobError::Sys {
            call: "kill",
            source,
        }
    }
}

/// Outcome of signalling one job during [`JobTable::kill_all`].
#[derive(Debug)]
pub struct KillReport {
    pub pid: Pid,
    pub command: String,
    pub result: Result<(), JobError>,
}

pub struct JobTable {
    jobs: BTreeMap<JobId, Job>,
    max_job_id: u32,
    foreground: Option<ForegroundJob>,
    control: Arc<dyn ProcessControl>,
}

impl fmt::Debug for JobTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobTable")
            .field("jobs", &self.jobs)
            .field("max_job_id", &self.max_job_id)
            .field("foreground", &self.foreground)
            .finish_non_exhaustive()
    }
}

impl JobTable {
    pub fn new(control: Arc<dyn ProcessControl>) -> Self {
        Self {
            jobs: BTreeMap::new(),
            max_job_id: 0,
            foreground: None,
            control,
        }
    }

    /// Handle to the process primitives, usable without holding the table.
    pub fn control(&self) -> Arc<dyn ProcessControl> {
        Arc::clone(&self.control)
    }

    /// Insert a running job. Without an explicit id the next one is
    /// allocated; an explicit id is trusted as-is.
    pub fn add(&mut self, command: impl Into<String>, pid: Pid, id: Option<JobId>) -> JobId {
        let id = match id {
            Some(id) => {
                self.max_job_id = self.max_job_id.max(id.0);
                id
            }
            None => {
                self.max_job_id += 1;
                JobId(self.max_job_id)
            }
        };
        let job = Job {
            id,
            pid,
            command: command.into(),
            created_at: Instant::now(),
            status: JobStatus::Running,
        };
        debug!(job = %id, pid = %pid, command = %job.command, "job added");
        self.jobs.insert(id, job);
        id
    }

    /// Reap every job whose process has exited and return the removed jobs.
    ///
    /// A failing poll leaves its job in place and does not stop the scan.
    pub fn remove_finished(&mut self) -> Vec<Job> {
        let mut finished = Vec::new();
        for job in self.jobs.values() {
            match self.control.poll(job.pid) {
                Ok(ProcessState::Exited(code)) => {
                    debug!(job = %job.id, pid = %job.pid, code, "job finished");
                    finished.push(job.id);
                }
                Ok(_) => {}
                Err(e) => warn!(job = %job.id, pid = %job.pid, error = %e, "waitpid failed"),
            }
        }

        let removed: Vec<Job> = finished
            .into_iter()
            .filter_map(|id| self.jobs.remove(&id))
            .collect();
        if !removed.is_empty() {
            self.recompute_max_job_id();
        }
        removed
    }

    pub fn remove_by_id(&mut self, id: JobId) -> Result<Job, JobError> {
        let job = self.jobs.remove(&id).ok_or(JobError::NoSuchJob(id))?;
        self.recompute_max_job_id();
        debug!(job = %id, "job removed");
        Ok(job)
    }

    fn recompute_max_job_id(&mut self) {
        self.max_job_id = self.jobs.keys().next_back().map_or(0, |id| id.0);
    }

    /// Continue job `id` and move it from the table into the foreground slot.
    ///
    /// Returns the job's pid; the caller is expected to wait on it with
    /// [`foreground::wait`]. Nothing changes if the continue signal fails.
    pub fn move_to_foreground(&mut self, id: JobId) -> Result<Pid, JobError> {
        let pid = self.get(id).ok_or(JobError::NoSuchJob(id))?.pid;
        self.control
            .signal(pid, Signal::SIGCONT)
            .map_err(JobError::kill)?;

        let job = self.remove_by_id(id)?;
        debug!(job = %id, pid = %pid, "job moved to foreground");
        self.foreground = Some(ForegroundJob {
            id: Some(job.id),
            pid: job.pid,
            command: job.command,
            created_at: job.created_at,
        });
        Ok(pid)
    }

    /// Continue job `id` in the background.
    pub fn resume_in_place(&mut self, id: JobId) -> Result<(), JobError> {
        let job = self.jobs.get_mut(&id).ok_or(JobError::NoSuchJob(id))?;
        self.control
            .signal(job.pid, Signal::SIGCONT)
            .map_err(JobError::kill)?;
        job.status = JobStatus::Running;
        debug!(job = %id, pid = %job.pid, "job resumed in background");
        Ok(())
    }

    /// Send `signal` to job `id`, keeping its recorded status in step with
    /// stop and continue signals.
    pub fn signal_job(&mut self, id: JobId, signal: Signal) -> Result<Pid, JobError> {
        let job = self.jobs.get_mut(&id).ok_or(JobError::NoSuchJob(id))?;
        self.control
            .signal(job.pid, signal)
            .map_err(JobError::kill)?;
        match signal {
            Signal::SIGSTOP | Signal::SIGTSTP | Signal::SIGTTIN | Signal::SIGTTOU => {
                job.status = JobStatus::Stopped
            }
            Signal::SIGCONT => job.status = JobStatus::Running,
            _ => {}
        }
        Ok(job.pid)
    }

    /// Check that job `id`'s process group still exists without signalling it.
    pub fn check_job(&self, id: JobId) -> Result<Pid, JobError> {
        let pid = self.get(id).ok_or(JobError::NoSuchJob(id))?.pid;
        self.control.check_exists(pid).map_err(JobError::kill)?;
        Ok(pid)
    }

    /// SIGKILL every tracked job and forget all of them.
    pub fn kill_all(&mut self) -> Vec<KillReport> {
        let reports = self
            .jobs
            .values()
            .map(|job| {
                let result = self
                    .control
                    .signal(job.pid, Signal::SIGKILL)
                    .map_err(JobError::kill);
                if let Err(e) = &result {
                    warn!(job = %job.id, pid = %job.pid, error = %e, "failed to kill job");
                }
                KillReport {
                    pid: job.pid,
                    command: job.command.clone(),
                    result,
                }
            })
            .collect();
        self.jobs.clear();
        self.max_job_id = 0;
        reports
    }

    pub fn set_status(&mut self, id: JobId, status: JobStatus) -> Result<(), JobError> {
        let job = self.jobs.get_mut(&id).ok_or(JobError::NoSuchJob(id))?;
        job.status = status;
        Ok(())
    }

    pub fn foreground(&self) -> Option<&ForegroundJob> {
        self.foreground.as_ref()
    }

    pub fn set_foreground(&mut self, job: ForegroundJob) {
        debug!(pid = %job.pid, command = %job.command, "foreground job set");
        self.foreground = Some(job);
    }

    pub fn take_foreground(&mut self) -> Option<ForegroundJob> {
        self.foreground.take()
    }

    /// Move the foreground job into the table as a stopped job, preserving
    /// its id if it already had one.
    pub fn park_foreground(&mut self) -> Option<JobId> {
        let fg = self.foreground.take()?;
        let id = self.add(fg.command, fg.pid, fg.id);
        if let Some(job) = self.jobs.get_mut(&id) {
            job.status = JobStatus::Stopped;
        }
        Some(id)
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn get_by_pid(&self, pid: Pid) -> Option<&Job> {
        self.jobs.values().find(|job| job.pid == pid)
    }

    /// The job with the highest id.
    pub fn last_job(&self) -> Option<&Job> {
        self.jobs.values().next_back()
    }

    /// The stopped job with the highest id.
    pub fn last_stopped(&self) -> Option<&Job> {
        self.jobs
            .values()
            .rev()
            .find(|job| job.status == JobStatus::Stopped)
    }

    pub fn contains_stopped(&self) -> bool {
        self.jobs.values().any(|job| job.status == JobStatus::Stopped)
    }

    /// Jobs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn max_job_id(&self) -> u32 {
        self.max_job_id
    }
}

/// [`JobTable`] shared between the interpreter and the signal bridge.
#[derive(Debug, Clone)]
pub struct SharedJobTable {
    inner: Arc<Mutex<JobTable>>,
}

impl SharedJobTable {
    pub fn new(table: JobTable) -> Self {
        Self {
            inner: Arc::new(Mutex::new(table)),
        }
    }

    /// Lock the table. A panic in another holder does not leave the table in
    /// a half-updated state, so a poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, JobTable> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

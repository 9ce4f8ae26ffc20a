//! Blocking wait on the foreground job.
//!
//! The table lock is released for the whole wait so the signal bridge can
//! stop or kill the foreground process and update the table meanwhile. The
//! bridge holds the lock from the moment it signals the process until the
//! table reflects the change, so once the wait returns, re-locking the table
//! observes the bridge's update.

use nix::unistd::Pid;
use tracing::{debug, warn};

use super::{ForegroundJob, JobError, JobId, JobStatus, ProcessState, SharedJobTable};

/// How a foreground wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundOutcome {
    /// The process terminated; carries its exit code.
    Exited(i32),
    /// The process was stopped and now sits in the table under this id.
    Stopped(JobId),
    /// The process stopped but is no longer tracked anywhere.
    Lost,
}

/// Put a freshly spawned job in the foreground slot and wait on it.
pub fn run(jobs: &SharedJobTable, job: ForegroundJob) -> Result<ForegroundOutcome, JobError> {
    let pid = job.pid;
    jobs.lock().set_foreground(job);
    wait(jobs, pid)
}

/// Block until the foreground process `pid` exits or stops, then settle the
/// foreground slot.
///
/// If the process stopped without the signal bridge noticing (someone else
/// sent it a stop signal), it is parked in the table here instead.
pub fn wait(jobs: &SharedJobTable, pid: Pid) -> Result<ForegroundOutcome, JobError> {
    let control = jobs.lock().control();
    debug!(pid = %pid, "waiting on foreground job");
    let state = control.wait(pid);

    let mut table = jobs.lock();
    let holds_pid = table.foreground().is_some_and(|fg| fg.pid == pid);
    match state {
        Ok(ProcessState::Exited(code)) => {
            if holds_pid {
                table.take_foreground();
            } else if let Some(id) = table.get_by_pid(pid).map(|job| job.id) {
                // Parked by a suspend that raced with the exit.
                table.remove_by_id(id)?;
            }
            debug!(pid = %pid, code, "foreground job exited");
            Ok(ForegroundOutcome::Exited(code))
        }
        Ok(state @ (ProcessState::Stopped | ProcessState::Running)) => {
            let id = if holds_pid {
                table.park_foreground()
            } else {
                table.get_by_pid(pid).map(|job| job.id)
            };
            let Some(id) = id else {
                warn!(pid = %pid, "stopped foreground job is not tracked");
                return Ok(ForegroundOutcome::Lost);
            };
            if state == ProcessState::Running {
                table.set_status(id, JobStatus::Running)?;
            }
            debug!(pid = %pid, job = %id, "foreground job parked");
            Ok(ForegroundOutcome::Stopped(id))
        }
        Err(source) => {
            if holds_pid {
                table.take_foreground();
            }
            Err(JobError::Sys {
                call: "waitpid",
                source,
            })
        }
    }
}

//! OS process primitives used by the job table.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;

/// State of a child process as reported by a status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Still alive and not reported as stopped.
    Running,
    /// Stopped by a signal; the process can be continued.
    Stopped,
    /// Terminated. Carries the exit code, or 128 + signal number when the
    /// process was killed by a signal.
    Exited(i32),
}

/// Signal delivery and status queries for child process groups.
///
/// The job table talks to the OS exclusively through this trait so the
/// bookkeeping can be exercised without real children.
pub trait ProcessControl: Send + Sync {
    /// Send `signal` to the process group led by `pid`.
    fn signal(&self, pid: Pid, signal: Signal) -> nix::Result<()>;

    /// Send the null signal to the group led by `pid`: checks that it still
    /// exists and may be signalled, without delivering anything.
    fn check_exists(&self, pid: Pid) -> nix::Result<()>;

    /// Non-blocking status poll. An exited child is reaped by this call.
    fn poll(&self, pid: Pid) -> nix::Result<ProcessState>;

    /// Block until `pid` exits or is stopped.
    fn wait(&self, pid: Pid) -> nix::Result<ProcessState>;
}

/// [`ProcessControl`] backed by `killpg(2)` and `waitpid(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn signal(&self, pid: Pid, signal: Signal) -> nix::Result<()> {
        signal::killpg(pid, signal)
    }

    fn check_exists(&self, pid: Pid) -> nix::Result<()> {
        signal::killpg(pid, None::<Signal>)
    }

    fn poll(&self, pid: Pid) -> nix::Result<ProcessState> {
        waitpid(pid, Some(WaitPidFlag::WNOHANG)).map(state_from_wait)
    }

    fn wait(&self, pid: Pid) -> nix::Result<ProcessState> {
        loop {
            match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Continued(_)) => continue,
                Ok(status) => return Ok(state_from_wait(status)),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

fn state_from_wait(status: WaitStatus) -> ProcessState {
    match status {
        WaitStatus::Exited(_, code) => ProcessState::Exited(code),
        WaitStatus::Signaled(_, signal, _) => ProcessState::Exited(128 + signal as i32),
        WaitStatus::Stopped(..) => ProcessState::Stopped,
        _ => ProcessState::Running,
    }
}

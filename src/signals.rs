//! Forwarding of terminal signals to the foreground job.
//!
//! Foreground jobs run in their own process group, so Ctrl-Z and Ctrl-C
//! reach the shell instead of the job. The bridge receives them on a
//! dedicated thread and acts on the job table while the interpreter is
//! parked in [`crate::jobs::foreground::wait`].

use std::io::{self, Write};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use signal_hook::consts::{SIGINT, SIGTSTP};
use signal_hook::iterator::Signals;
use tracing::{debug, warn};

use crate::PROGRAM_TAG;
use crate::jobs::SharedJobTable;

pub struct SignalBridge {
    jobs: SharedJobTable,
}

impl SignalBridge {
    pub fn new(jobs: SharedJobTable) -> Self {
        Self { jobs }
    }

    /// Start receiving SIGTSTP and SIGINT on a background thread. Notices go
    /// to standard output.
    pub fn install(self) -> Result<JoinHandle<()>> {
        let mut signals =
            Signals::new([SIGTSTP, SIGINT]).context("failed to register signal handlers")?;
        let handle = thread::Builder::new()
            .name("signal-bridge".into())
            .spawn(move || {
                for signal in signals.forever() {
                    let mut out = io::stdout();
                    let res = match signal {
                        SIGTSTP => self.on_suspend(&mut out),
                        SIGINT => self.on_interrupt(&mut out),
                        _ => Ok(()),
                    };
                    if let Err(e) = res.and_then(|()| out.flush()) {
                        warn!(error = %e, "failed to write signal notice");
                    }
                }
            })
            .context("failed to spawn signal thread")?;
        Ok(handle)
    }

    /// Stop the foreground job and park it in the table as stopped.
    pub fn on_suspend(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{PROGRAM_TAG}: got ctrl-Z")?;
        let mut table = self.jobs.lock();
        let Some(pid) = table.foreground().map(|fg| fg.pid) else {
            return Ok(());
        };
        if let Err(e) = table.control().signal(pid, Signal::SIGSTOP) {
            warn!(pid = %pid, error = %e, "failed to stop foreground job");
            return writeln!(out, "{PROGRAM_TAG} error: kill failed: {e}");
        }
        let id = table.park_foreground();
        debug!(pid = %pid, job = ?id, "foreground job stopped");
        writeln!(out, "{PROGRAM_TAG}: process {pid} was stopped")
    }

    /// Kill the foreground job. It never enters the table.
    pub fn on_interrupt(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{PROGRAM_TAG}: got ctrl-C")?;
        let mut table = self.jobs.lock();
        let Some(pid) = table.foreground().map(|fg| fg.pid) else {
            return Ok(());
        };
        if let Err(e) = table.control().signal(pid, Signal::SIGKILL) {
            warn!(pid = %pid, error = %e, "failed to kill foreground job");
            return writeln!(out, "{PROGRAM_TAG} error: kill failed: {e}");
        }
        table.take_foreground();
        debug!(pid = %pid, "foreground job killed");
        writeln!(out, "{PROGRAM_TAG}: process {pid} was killed")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nix::unistd::Pid;

    use super::*;
    use crate::jobs::testing::FakeProcesses;
    use crate::jobs::{ForegroundJob, JobId, JobStatus, JobTable};

    fn bridge() -> (Arc<FakeProcesses>, SharedJobTable, SignalBridge) {
        let fake = Arc::new(FakeProcesses::default());
        let jobs = SharedJobTable::new(JobTable::new(fake.clone()));
        (fake, jobs.clone(), SignalBridge::new(jobs))
    }

    fn text(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_suspend_without_foreground_is_noop() {
        let (fake, jobs, bridge) = bridge();
        let mut out = Vec::new();
        bridge.on_suspend(&mut out).unwrap();

        assert_eq!(text(out), "smash: got ctrl-Z\n");
        assert!(jobs.lock().is_empty());
        assert!(fake.sent().is_empty());
    }

    #[test]
    fn test_suspend_parks_new_foreground_job() {
        let (fake, jobs, bridge) = bridge();
        let pid = Pid::from_raw(500);
        jobs.lock().add("sleep 9 &", Pid::from_raw(499), None);
        jobs.lock().set_foreground(ForegroundJob::new("sleep 100", pid));

        let mut out = Vec::new();
        bridge.on_suspend(&mut out).unwrap();

        assert_eq!(
            text(out),
            "smash: got ctrl-Z\nsmash: process 500 was stopped\n"
        );
        assert_eq!(fake.sent(), vec![(pid, Signal::SIGSTOP)]);
        let table = jobs.lock();
        assert!(table.foreground().is_none());
        let job = table.get(JobId(2)).unwrap();
        assert_eq!(job.pid, pid);
        assert_eq!(job.command, "sleep 100");
        assert_eq!(job.status, JobStatus::Stopped);
    }

    #[test]
    fn test_suspend_preserves_existing_id() {
        let (_, jobs, bridge) = bridge();
        let pid = Pid::from_raw(500);
        {
            let mut table = jobs.lock();
            table.add("a &", Pid::from_raw(498), None);
            table.add("b &", pid, None);
            table.add("c &", Pid::from_raw(501), None);
            table.move_to_foreground(JobId(2)).unwrap();
        }

        bridge.on_suspend(&mut Vec::new()).unwrap();

        let table = jobs.lock();
        let job = table.get_by_pid(pid).unwrap();
        assert_eq!(job.id, JobId(2));
        assert_eq!(job.command, "b &");
        assert_eq!(job.status, JobStatus::Stopped);
    }

    #[test]
    fn test_suspend_signal_failure_keeps_foreground() {
        let (fake, jobs, bridge) = bridge();
        let pid = Pid::from_raw(500);
        fake.fail_signals(pid);
        jobs.lock().set_foreground(ForegroundJob::new("sleep 100", pid));

        let mut out = Vec::new();
        bridge.on_suspend(&mut out).unwrap();

        assert!(text(out).contains("smash error: kill failed"));
        let table = jobs.lock();
        assert!(table.is_empty());
        assert_eq!(table.foreground().unwrap().pid, pid);
    }

    #[test]
    fn test_interrupt_kills_without_table_entry() {
        let (fake, jobs, bridge) = bridge();
        let pid = Pid::from_raw(500);
        jobs.lock().set_foreground(ForegroundJob::new("sleep 100", pid));

        let mut out = Vec::new();
        bridge.on_interrupt(&mut out).unwrap();

        assert_eq!(
            text(out),
            "smash: got ctrl-C\nsmash: process 500 was killed\n"
        );
        assert_eq!(fake.sent(), vec![(pid, Signal::SIGKILL)]);
        let table = jobs.lock();
        assert!(table.foreground().is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_interrupt_without_foreground_is_noop() {
        let (fake, jobs, bridge) = bridge();
        jobs.lock().add("sleep 9 &", Pid::from_raw(499), None);

        let mut out = Vec::new();
        bridge.on_interrupt(&mut out).unwrap();

        assert_eq!(text(out), "smash: got ctrl-C\n");
        assert!(fake.sent().is_empty());
        assert_eq!(jobs.lock().len(), 1);
    }
}

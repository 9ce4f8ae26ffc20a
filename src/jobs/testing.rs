//! In-memory [`ProcessControl`] for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

use super::{ProcessControl, ProcessState};

/// Pretend process table. Every pid is alive and running until told
/// otherwise; signals are recorded rather than delivered.
#[derive(Debug, Default)]
pub struct FakeProcesses {
    state: Mutex<FakeState>,
}

#[derive(Debug, Default)]
struct FakeState {
    sent: Vec<(Pid, Signal)>,
    exited: HashSet<Pid>,
    failing_signals: HashSet<Pid>,
    failing_polls: HashSet<Pid>,
    wait_results: HashMap<Pid, ProcessState>,
}

impl FakeProcesses {
    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Mark `pid` as exited so the next poll reaps it.
    pub fn exit(&self, pid: Pid) {
        self.state().exited.insert(pid);
    }

    /// Make every signal sent to `pid` fail with `ESRCH`.
    pub fn fail_signals(&self, pid: Pid) {
        self.state().failing_signals.insert(pid);
    }

    /// Make polls of `pid` fail with `ECHILD`.
    pub fn fail_poll(&self, pid: Pid) {
        self.state().failing_polls.insert(pid);
    }

    /// What a blocking wait on `pid` reports. Defaults to a clean exit.
    pub fn on_wait(&self, pid: Pid, state: ProcessState) {
        self.state().wait_results.insert(pid, state);
    }

    /// Signals successfully sent so far, in order.
    pub fn sent(&self) -> Vec<(Pid, Signal)> {
        self.state().sent.clone()
    }
}

impl ProcessControl for FakeProcesses {
    fn signal(&self, pid: Pid, signal: Signal) -> nix::Result<()> {
        let mut state = self.state();
        if state.failing_signals.contains(&pid) {
            return Err(Errno::ESRCH);
        }
        state.sent.push((pid, signal));
        Ok(())
    }

    fn check_exists(&self, pid: Pid) -> nix::Result<()> {
        if self.state().failing_signals.contains(&pid) {
            Err(Errno::ESRCH)
        } else {
            Ok(())
        }
    }

    fn poll(&self, pid: Pid) -> nix::Result<ProcessState> {
        let state = self.state();
        if state.failing_polls.contains(&pid) {
            Err(Errno::ECHILD)
        } else if state.exited.contains(&pid) {
            Ok(ProcessState::Exited(0))
        } else {
            Ok(ProcessState::Running)
        }
    }

    fn wait(&self, pid: Pid) -> nix::Result<ProcessState> {
        let state = self.state();
        Ok(state
            .wait_results
            .get(&pid)
            .copied()
            .unwrap_or(ProcessState::Exited(0)))
    }
}

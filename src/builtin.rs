use crate::PROGRAM_TAG;
use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::interpreter::Factory;
use crate::jobs::foreground::{self, ForegroundOutcome};
use crate::jobs::{JobError, JobId, JobStatus};
use crate::session::Session;
use anyhow::{Context, Result, anyhow, bail};
use argh::{EarlyExit, FromArgs};
use nix::sys::signal::Signal;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use tracing::debug;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "jobs" or "cd".
    fn name() -> &'static str;

    /// Whether arguments starting with `-` are values (`kill -9`, `cd -`)
    /// rather than flags.
    fn dash_values() -> bool {
        false
    }

    /// Executes the command against the session.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, stdout, session) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stdout, "{PROGRAM_TAG} error: {e:#}")?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    name: &'static str,
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _session: &mut Session,
    ) -> Result<ExitCode> {
        if self.is_error {
            debug!(command = self.name, reason = %self.output.trim_end(), "rejected arguments");
            writeln!(stdout, "{PROGRAM_TAG} error: {}: invalid arguments", self.name)?;
            Ok(1)
        } else {
            stdout.write_all(self.output.as_bytes())?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        name: &str,
        args: &[&str],
        _line: &str,
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }
        let mut argv = Vec::with_capacity(args.len() + 1);
        if T::dash_values() {
            argv.push("--");
        }
        argv.extend_from_slice(args);
        Some(match T::from_args(&[name], &argv) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                name: T::name(),
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

/// Exit code of a foreground wait that ended with the job stopped.
fn stopped_exit_code() -> ExitCode {
    128 + Signal::SIGTSTP as i32
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        writeln!(stdout, "{}", session.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// `cd -` returns to the previous directory; without a target, changes to $HOME.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to, or - for the previous directory.
    pub targets: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn dash_values() -> bool {
        true
    }

    fn execute(self, _stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        if self.targets.len() > 1 {
            bail!("cd: too many arguments");
        }
        let target = match self.targets.first().map(String::as_str) {
            Some("-") => session
                .previous_dir
                .clone()
                .ok_or_else(|| anyhow!("cd: OLDPWD not set"))?,
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => std::env::var_os("HOME")
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("cd: HOME not set"))?,
        };
        session.change_dir(&target)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the process id of the shell.
pub struct ShowPid {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for ShowPid {
    fn name() -> &'static str {
        "showpid"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        writeln!(stdout, "{PROGRAM_TAG} pid is {}", std::process::id())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the command history, oldest first.
pub struct History {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        for entry in session.history().entries() {
            writeln!(stdout, "{:>5}  {}", entry.seq, entry.line)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List background and stopped jobs.
pub struct Jobs {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "jobs"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        let mut table = session.jobs().lock();
        table.remove_finished();
        for job in table.iter() {
            write!(
                stdout,
                "[{}] {} : {} {} secs",
                job.id,
                job.command,
                job.pid,
                job.elapsed().as_secs()
            )?;
            if job.status == JobStatus::Stopped {
                write!(stdout, " (stopped)")?;
            }
            writeln!(stdout)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Remove jobs whose process has exited and report each one.
pub struct Reap {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Reap {
    fn name() -> &'static str {
        "reap"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        let finished = session.jobs().lock().remove_finished();
        for job in finished {
            writeln!(stdout, "[{}] {} : {} done", job.id, job.command, job.pid)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Send a signal to a job.
pub struct Kill {
    #[argh(positional)]
    /// signal number prefixed with a dash, e.g. -9.
    pub signal: String,

    #[argh(positional)]
    /// id of the job to signal.
    pub job_id: u32,
}

impl BuiltinCommand for Kill {
    fn name() -> &'static str {
        "kill"
    }

    fn dash_values() -> bool {
        true
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        let signum: i32 = self
            .signal
            .strip_prefix('-')
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| anyhow!("kill: invalid arguments"))?;
        let id = JobId(self.job_id);

        let mut table = session.jobs().lock();
        table.remove_finished();
        if table.get(id).is_none() {
            bail!("kill: job-id {id} does not exist");
        }
        let pid = if signum == 0 {
            table.check_job(id)?
        } else {
            let signal = Signal::try_from(signum).map_err(|source| JobError::Sys {
                call: "kill",
                source,
            })?;
            table.signal_job(id, signal)?
        };
        writeln!(stdout, "signal number {signum} was sent to pid {pid}")?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Continue a job in the foreground and wait for it.
pub struct Fg {
    #[argh(positional)]
    /// id of the job; defaults to the job with the highest id.
    pub job_id: Option<u32>,
}

impl BuiltinCommand for Fg {
    fn name() -> &'static str {
        "fg"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        let pid = {
            let mut table = session.jobs().lock();
            table.remove_finished();
            let job = match self.job_id {
                Some(id) => table
                    .get(JobId(id))
                    .ok_or_else(|| anyhow!("fg: job-id {id} does not exist"))?,
                None => table
                    .last_job()
                    .ok_or_else(|| anyhow!("fg: jobs list is empty"))?,
            };
            let id = job.id;
            writeln!(stdout, "{} : {}", job.command, job.pid)?;
            table.move_to_foreground(id)?
        };
        stdout.flush()?;

        match foreground::wait(session.jobs(), pid)? {
            ForegroundOutcome::Exited(code) => Ok(code),
            ForegroundOutcome::Stopped(_) | ForegroundOutcome::Lost => Ok(stopped_exit_code()),
        }
    }
}

#[derive(FromArgs)]
/// Continue a stopped job in the background.
pub struct Bg {
    #[argh(positional)]
    /// id of the job; defaults to the stopped job with the highest id.
    pub job_id: Option<u32>,
}

impl BuiltinCommand for Bg {
    fn name() -> &'static str {
        "bg"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        let mut table = session.jobs().lock();
        table.remove_finished();
        let job = match self.job_id {
            Some(id) => {
                let job = table
                    .get(JobId(id))
                    .ok_or_else(|| anyhow!("bg: job-id {id} does not exist"))?;
                if job.status == JobStatus::Running {
                    bail!("bg: job-id {id} is already running in the background");
                }
                job
            }
            None => table
                .last_stopped()
                .ok_or_else(|| anyhow!("bg: there is no stopped jobs to resume"))?,
        };
        let id = job.id;
        writeln!(stdout, "{} : {}", job.command, job.pid)?;
        table.resume_in_place(id)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell. `quit kill` terminates every job first.
pub struct Quit {
    #[argh(positional, greedy)]
    /// pass kill to send SIGKILL to every job before exiting.
    pub args: Vec<String>,
}

impl BuiltinCommand for Quit {
    fn name() -> &'static str {
        "quit"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        if self.args.first().is_some_and(|arg| arg == "kill") {
            let mut table = session.jobs().lock();
            table.remove_finished();
            writeln!(
                stdout,
                "{PROGRAM_TAG}: sending SIGKILL signal to {} jobs:",
                table.len()
            )?;
            for report in table.kill_all() {
                match report.result {
                    Ok(()) => writeln!(stdout, "{}: {}", report.pid, report.command)?,
                    Err(e) => writeln!(stdout, "{PROGRAM_TAG} error: {e}")?,
                }
            }
        }
        session.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Copy a file. The destination must not exist.
pub struct Cp {
    #[argh(positional)]
    /// file to copy.
    pub source: String,

    #[argh(positional)]
    /// path of the new copy.
    pub destination: String,
}

impl BuiltinCommand for Cp {
    fn name() -> &'static str {
        "cp"
    }

    fn execute(self, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        let mut input = File::open(&self.source).context("open failed")?;
        let mut output = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o664)
            .open(&self.destination)
            .context("open failed")?;
        io::copy(&mut input, &mut output).context("copy failed")?;
        writeln!(
            stdout,
            "{PROGRAM_TAG}: {} was copied to {}",
            self.source, self.destination
        )?;
        Ok(0)
    }
}

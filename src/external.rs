use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::interpreter::Factory;
use crate::jobs::ForegroundJob;
use crate::jobs::foreground::{self, ForegroundOutcome};
use crate::parser;
use crate::session::Session;
use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::io::Write;
use std::os::unix::process::CommandExt;
use tracing::debug;

/// Command that is not a builtin. The whole line is handed to the session's
/// interpreter as `<interpreter> -c <line>`.
pub struct ExternalCommand {
    line: String,
}

impl ExternalCommand {
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }
}

/// Matches every line, so it must be registered after the builtins.
impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        _name: &str,
        _args: &[&str],
        line: &str,
    ) -> Option<Box<dyn ExecutableCommand>> {
        Some(Box::new(ExternalCommand::new(line.trim())))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        session: &mut Session,
    ) -> Result<ExitCode> {
        let Self { line } = *self;
        let background = parser::is_background(&line);
        let script = parser::strip_background_marker(&line);

        // The child shares the terminal; anything we buffered goes first.
        stdout.flush()?;
        let child = std::process::Command::new(&session.interpreter)
            .arg("-c")
            .arg(script)
            .current_dir(&session.current_dir)
            .process_group(0)
            .spawn()
            .context("fork failed")?;
        let pid = Pid::from_raw(child.id() as i32);

        if background {
            let id = session.jobs().lock().add(line, pid, None);
            debug!(job = %id, pid = %pid, "started background job");
            return Ok(0);
        }

        match foreground::run(session.jobs(), ForegroundJob::new(line, pid))? {
            ForegroundOutcome::Exited(code) => Ok(code),
            ForegroundOutcome::Stopped(_) | ForegroundOutcome::Lost => {
                Ok(128 + Signal::SIGTSTP as i32)
            }
        }
    }
}

use crate::session::Session;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Foreground commands killed by a signal report 128 + the signal number.
pub type ExitCode = i32;

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command against the session, writing its output to `stdout`.
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session)
    -> Result<ExitCode>;
}

/// Factory that tries to create a command from a parsed command line.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Attempt to create a command for `name` with `args`.
    ///
    /// `line` is the command line exactly as submitted, for commands that
    /// need more than the split words.
    fn try_create(
        &self,
        name: &str,
        args: &[&str],
        line: &str,
    ) -> Option<Box<dyn ExecutableCommand>>;
}

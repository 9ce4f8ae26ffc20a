use crate::PROGRAM_TAG;
use crate::command::{CommandFactory, ExitCode};
use crate::parser;
use crate::session::Session;
use anyhow::anyhow;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use tracing::debug;

/// Factory allows creating instances of ExecutableCommand.
///
/// One factory per builtin, plus one for [`crate::external::ExternalCommand`].
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The shell's command loop: records history, dispatches each line to the
/// first factory that accepts it, and reaps finished jobs afterwards.
///
/// Example
/// ```
/// use smash::Interpreter;
/// let mut sh = Interpreter::default();
/// let mut out = Vec::new();
/// let code = sh.execute_line("showpid", &mut out).unwrap();
/// assert_eq!(code, 0);
/// assert!(String::from_utf8(out).unwrap().starts_with("smash pid is "));
/// ```
pub struct Interpreter {
    session: Session,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(session: Session, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self { session, commands }
    }

    /// Create an interpreter over `session` with the builtins and the
    /// external command launcher.
    pub fn with_session(session: Session) -> Self {
        Self::new(session, default_commands())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn should_exit(&self) -> bool {
        self.session.should_exit
    }

    /// Run one command line.
    ///
    /// Failures of the command itself are reported on `stdout` and yield
    /// exit code 1. An `Err` means the line could not be dispatched or the
    /// output could not be written.
    pub fn execute_line(&mut self, line: &str, stdout: &mut dyn Write) -> anyhow::Result<ExitCode> {
        if line.trim().is_empty() {
            return Ok(0);
        }
        self.session.history_mut().record(line);

        let words = parser::split_words(parser::strip_background_marker(line));
        let res = self.dispatch(&words, line, stdout);

        let reaped = self.session.jobs().lock().remove_finished();
        if !reaped.is_empty() {
            debug!(count = reaped.len(), "reaped finished jobs");
        }
        res
    }

    fn dispatch(
        &mut self,
        words: &[&str],
        line: &str,
        stdout: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        let (name, args) = match words.split_first() {
            Some((name, args)) => (*name, args),
            None => ("", &[][..]),
        };
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(name, args, line) {
                return match cmd.execute(stdout, &mut self.session) {
                    Ok(code) => Ok(code),
                    Err(e) => {
                        writeln!(stdout, "{PROGRAM_TAG} error: {e:#}")?;
                        Ok(1)
                    }
                };
            }
        }
        Err(anyhow!("command not found: {name}"))
    }

    /// Read-Eval-Print Loop over the terminal until `quit` or end of input.
    pub fn repl(&mut self, prompt: &str) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;
        let mut stdout = std::io::stdout();

        while !self.should_exit() {
            match rl.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    if let Err(e) = self.execute_line(&line, &mut stdout) {
                        writeln!(stdout, "{PROGRAM_TAG} error: {e:#}")?;
                    }
                    stdout.flush()?;
                }
                Err(ReadlineError::Interrupted) => {
                    writeln!(stdout, "{PROGRAM_TAG}: got ctrl-C")?;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }
}

fn default_commands() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    use crate::external::ExternalCommand;
    vec![
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<ShowPid>::default()),
        Box::new(Factory::<History>::default()),
        Box::new(Factory::<Jobs>::default()),
        Box::new(Factory::<Reap>::default()),
        Box::new(Factory::<Kill>::default()),
        Box::new(Factory::<Fg>::default()),
        Box::new(Factory::<Bg>::default()),
        Box::new(Factory::<Quit>::default()),
        Box::new(Factory::<Cp>::default()),
        // Accepts every line, keep it last.
        Box::new(Factory::<ExternalCommand>::default()),
    ]
}

impl Default for Interpreter {
    /// Interpreter over a fresh session that runs external commands with
    /// [`crate::DEFAULT_INTERPRETER`].
    fn default() -> Self {
        Self::with_session(Session::new(crate::DEFAULT_INTERPRETER))
    }
}

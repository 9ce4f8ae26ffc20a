use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use smash::{Config, Interpreter, PROGRAM_TAG, Session, SignalBridge};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let config: Config = argh::from_env();
    match run(config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{PROGRAM_TAG} error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<ExitCode> {
    let mut interpreter = Interpreter::with_session(Session::new(config.interpreter));
    SignalBridge::new(interpreter.session().jobs().clone()).install()?;

    if let Some(line) = config.command {
        let mut stdout = io::stdout();
        let code = interpreter.execute_line(&line, &mut stdout)?;
        stdout.flush()?;
        return Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)));
    }

    tracing::debug!(pid = std::process::id(), "starting interactive session");
    interpreter.repl(&config.prompt)?;
    Ok(ExitCode::SUCCESS)
}

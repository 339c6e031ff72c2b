//! Purpose: Hold top-level CLI command dispatch for `yamlscript`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Input is read before the native library is touched.
//! Invariants: Sessions are closed explicitly on success so teardown failures surface.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::CommandFactory;
use yamlscript::api::{LIBYAMLSCRIPT_VERSION, Locator, Session};

use super::*;

pub(super) fn dispatch_command(cli: Cli) -> Result<RunOutcome, Error> {
    let timeout = cli.timeout_ms.map(Duration::from_millis);
    match cli.command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "yamlscript", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_json(
                &json!({
                    "yamlscript": env!("CARGO_PKG_VERSION"),
                    "libyamlscript": LIBYAMLSCRIPT_VERSION,
                }),
                false,
            );
            Ok(RunOutcome::ok())
        }
        Command::Locate => {
            let path = resolve_library(cli.lib.as_deref())?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            emit_json(
                &json!({
                    "path": path.display().to_string(),
                    "filename": filename,
                    "version": LIBYAMLSCRIPT_VERSION,
                }),
                false,
            );
            Ok(RunOutcome::ok())
        }
        Command::Load { file, pretty } => {
            let source = read_source(file.as_deref())?;
            let session = open_session(cli.lib.as_deref())?;
            let value = match timeout {
                Some(timeout) => session.load_with_timeout(&source, timeout)?,
                None => session.load(&source)?,
            };
            session.close()?;
            emit_json(&value, pretty);
            Ok(RunOutcome::ok())
        }
        Command::Compile { file } => {
            let source = read_source(file.as_deref())?;
            let session = open_session(cli.lib.as_deref())?;
            let code = match timeout {
                Some(timeout) => session.compile_with_timeout(&source, timeout)?,
                None => session.compile(&source)?,
            };
            session.close()?;
            println!("{code}");
            Ok(RunOutcome::ok())
        }
    }
}

fn resolve_library(lib: Option<&Path>) -> Result<PathBuf, Error> {
    match lib {
        Some(path) if path.is_file() => std::path::absolute(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to resolve library path")
                .with_path(path)
                .with_source(err)
        }),
        Some(path) => Err(Error::new(ErrorKind::LibraryNotFound)
            .with_message("library file given by --lib does not exist")
            .with_path(path)),
        None => Locator::from_env().locate(),
    }
}

fn open_session(lib: Option<&Path>) -> Result<Session, Error> {
    let path = resolve_library(lib)?;
    Session::from_path(path)
}

fn read_source(file: Option<&Path>) -> Result<String, Error> {
    match file {
        None => read_stdin(),
        Some(path) if path == Path::new("-") => read_stdin(),
        Some(path) => fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read source file")
                .with_path(path)
                .with_source(err)
        }),
    }
}

fn read_stdin() -> Result<String, Error> {
    let mut source = String::new();
    io::stdin().read_to_string(&mut source).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read source from stdin")
            .with_source(err)
    })?;
    Ok(source)
}

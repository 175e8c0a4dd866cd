//! Contact book command-line entry point.
//!
//! # Responsibility
//! - Resolve configuration and start file logging.
//! - Acquire the configured backing store once and release it on every exit
//!   path.
//! - Hand the loaded Person Store to the interactive shell.

mod config;
mod shell;

use clap::Parser;
use config::{Backend, Cli, Settings};
use contactbook_core::db::open_db;
use contactbook_core::{
    init_logging, CsvPersonRepository, PersonRepository, PersonStore, SqlitePersonRepository,
};
use log::{error, info};
use shell::Shell;
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let settings = Cli::parse().into_settings();

    // The session runs without file logging when it cannot start.
    if let Err(err) = init_logging(&settings.log_level, &settings.log_dir) {
        eprintln!("warning: file logging disabled: {err}");
    }

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=app_exit module=cli status=error");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<(), String> {
    info!(
        "event=app_config module=cli status=ok backend={:?} schema={}",
        settings.backend, settings.schema
    );

    match settings.backend {
        Backend::Csv => {
            let repo = CsvPersonRepository::open(&settings.path, settings.schema)
                .map_err(|err| unavailable(settings, &err))?;
            session(repo, settings)
        }
        Backend::Sqlite => {
            let conn = open_db(&settings.path).map_err(|err| unavailable(settings, &err))?;
            session(SqlitePersonRepository::new(&conn, settings.schema), settings)
        }
    }
}

fn session<R: PersonRepository>(repo: R, settings: &Settings) -> Result<(), String> {
    let mut store =
        PersonStore::load(repo, settings.schema).map_err(|err| unavailable(settings, &err))?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    Shell::new(&mut store, stdin.lock(), stdout.lock())
        .run()
        .map_err(|err| format!("terminal I/O failed: {err}"))?;

    store.into_repository();
    Ok(())
}

fn unavailable(settings: &Settings, err: &dyn std::error::Error) -> String {
    format!(
        "cannot open backing store `{}`: {err}",
        settings.path.display()
    )
}

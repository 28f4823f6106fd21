//! nodectl - console for the ManagerService.
//!
//! `nodectl exec <command...>` runs one command and exits; without `exec`
//! it starts an interactive prompt.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use nodemgr_core::cli::{ConsoleCli, EXEC_USAGE, init_tracing};
use nodemgr_core::client::connect_lazy;
use nodemgr_core::console::{
    Dispatcher, EditorReader, Registry, Session, run_interactive, run_once,
};
use nodemgr_core::error::{EXIT_FAILURE, EXIT_USAGE};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = ConsoleCli::parse();
    init_tracing("warn");

    let socket_path = match cli.socket.socket_path() {
        Ok(path) => path,
        Err(err) => {
            eprintln!("Error: cannot resolve socket path: {err}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    // Exec needs a command before anything else happens.
    let line = match &cli.mode {
        Some(mode) => match mode.command_line() {
            Some(line) => Some(line),
            None => {
                eprintln!("{EXEC_USAGE}");
                return ExitCode::from(EXIT_USAGE);
            }
        },
        None => None,
    };

    let registry = Registry::builtin();
    // Connecting lazily keeps flag validation ahead of any socket access.
    let client = connect_lazy(&socket_path);
    let mut session = Session::new(Dispatcher::new(registry, client));
    tracing::debug!(socket = %socket_path.display(), "console ready");

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    match line {
        Some(line) => ExitCode::from(run_once(&mut session, &line, &mut stdout, &mut stderr).await),
        None => {
            let mut reader = match EditorReader::new(registry) {
                Ok(reader) => reader,
                Err(err) => {
                    eprintln!("Error: {err}");
                    return ExitCode::from(EXIT_FAILURE);
                }
            };
            match run_interactive(&mut session, &mut reader, &mut stdout, &mut stderr).await {
                Ok(()) => {
                    let _ = stdout.flush();
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    ExitCode::from(EXIT_FAILURE)
                }
            }
        }
    }
}

//! One-shot and interactive console front-ends.

use std::io::Write;
use std::time::Duration;

use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use crate::console::dispatch::{ManagerApi, Outcome};
use crate::console::registry::Registry;
use crate::console::session::Session;
use crate::error::EXIT_USAGE;

pub const PROMPT: &str = "$ ";
pub const GOODBYE: &str = "Bye!";

// Pause between repeated read failures so a broken terminal does not spin.
const READ_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLine {
    Line(String),
    Interrupted,
    Eof,
    Failed(String),
}

/// Source of interactive input lines.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> ReadLine;

    fn add_history(&mut self, _line: &str) {}
}

struct ConsoleHelper {
    registry: Registry,
}

impl Completer for ConsoleHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok(self.registry.complete(line, pos))
    }
}

impl Hinter for ConsoleHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for ConsoleHelper {}

impl Validator for ConsoleHelper {}

impl Helper for ConsoleHelper {}

/// Terminal line editor with history and tab completion from the registry.
pub struct EditorReader {
    editor: Editor<ConsoleHelper, DefaultHistory>,
}

impl EditorReader {
    pub fn new(registry: Registry) -> rustyline::Result<Self> {
        let mut editor: Editor<ConsoleHelper, DefaultHistory> = Editor::new()?;
        editor.set_helper(Some(ConsoleHelper { registry }));
        Ok(Self { editor })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> ReadLine {
        // readline blocks the thread until a line is entered.
        match tokio::task::block_in_place(|| self.editor.readline(prompt)) {
            Ok(line) => ReadLine::Line(line),
            Err(ReadlineError::Interrupted) => ReadLine::Interrupted,
            Err(ReadlineError::Eof) => ReadLine::Eof,
            Err(err) => ReadLine::Failed(err.to_string()),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(err) = self.editor.add_history_entry(line) {
            tracing::warn!(error = %err, "failed to record history entry");
        }
    }
}

/// Runs the read-dispatch-print loop until `exit` or end of input.
pub async fn run_interactive<A, R, O, E>(
    session: &mut Session<A>,
    reader: &mut R,
    out: &mut O,
    err: &mut E,
) -> std::io::Result<()>
where
    A: ManagerApi,
    R: LineReader,
    O: Write,
    E: Write,
{
    let mut last_read_failed = false;
    loop {
        let line = match reader.read_line(PROMPT) {
            ReadLine::Line(line) => line,
            ReadLine::Interrupted => continue,
            ReadLine::Eof => return Ok(()),
            ReadLine::Failed(message) => {
                writeln!(err, "Error: failed to read line: {message}")?;
                if last_read_failed {
                    tokio::time::sleep(READ_RETRY_DELAY).await;
                }
                last_read_failed = true;
                continue;
            }
        };
        last_read_failed = false;
        if !line.trim().is_empty() {
            reader.add_history(line.trim());
        }

        match session.submit(&line).await {
            Ok(Outcome::Output(text)) if text.is_empty() => {}
            Ok(Outcome::Output(text)) | Ok(Outcome::NotFound(text)) => writeln!(out, "{text}")?,
            Ok(Outcome::Empty) => {}
            Ok(Outcome::Exit) => {
                writeln!(out, "{GOODBYE}")?;
                return Ok(());
            }
            Err(error) => writeln!(err, "Error: {error}")?,
        }
        out.flush()?;
    }
}

/// Dispatches a single line and returns the process exit code.
pub async fn run_once<A, O, E>(session: &mut Session<A>, line: &str, out: &mut O, err: &mut E) -> u8
where
    A: ManagerApi,
    O: Write,
    E: Write,
{
    let (stdout_text, stderr_text, code) = match session.submit(line).await {
        Ok(Outcome::Output(text)) => (Some(text), None, 0),
        Ok(Outcome::NotFound(guidance)) => (None, Some(guidance), EXIT_USAGE),
        Ok(Outcome::Exit) | Ok(Outcome::Empty) => (None, None, 0),
        Err(error) => (None, Some(format!("Error: {error}")), error.exit_code()),
    };
    // Nothing useful can be done if the standard streams are gone.
    if let Some(text) = stdout_text.filter(|text| !text.is_empty()) {
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
    if let Some(text) = stderr_text {
        let _ = writeln!(err, "{text}");
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::dispatch::Dispatcher;
    use crate::error::EXIT_FAILURE;
    use nodemgr_proto::nodemgr::v1::{
        Ack, DialPeerRequest, NetInfoRequest, NetInfoResponse, PruneBlocksRequest, StatusRequest,
        StatusResponse,
    };
    use std::collections::VecDeque;
    use tonic::Status;

    struct FixedApi;

    #[tonic::async_trait]
    impl ManagerApi for FixedApi {
        async fn status(&self, _request: StatusRequest) -> Result<StatusResponse, Status> {
            Ok(StatusResponse {
                latest_block_height: 3,
                ..StatusResponse::default()
            })
        }

        async fn net_info(&self, _request: NetInfoRequest) -> Result<NetInfoResponse, Status> {
            Err(Status::internal("peer table unavailable"))
        }

        async fn dial_peer(&self, _request: DialPeerRequest) -> Result<Ack, Status> {
            Ok(Ack {})
        }

        async fn prune_blocks(&self, _request: PruneBlocksRequest) -> Result<Ack, Status> {
            Ok(Ack {})
        }
    }

    struct ScriptedReader {
        script: VecDeque<ReadLine>,
        history: Vec<String>,
    }

    impl ScriptedReader {
        fn new(script: impl IntoIterator<Item = ReadLine>) -> Self {
            Self {
                script: script.into_iter().collect(),
                history: Vec::new(),
            }
        }
    }

    impl LineReader for ScriptedReader {
        fn read_line(&mut self, _prompt: &str) -> ReadLine {
            self.script.pop_front().unwrap_or(ReadLine::Eof)
        }

        fn add_history(&mut self, line: &str) {
            self.history.push(line.to_string());
        }
    }

    fn session() -> Session<FixedApi> {
        Session::new(Dispatcher::new(Registry::builtin(), FixedApi))
    }

    fn line(text: &str) -> ReadLine {
        ReadLine::Line(text.to_string())
    }

    #[tokio::test]
    async fn loop_survives_errors_and_ends_on_exit() {
        let mut session = session();
        let mut reader = ScriptedReader::new([
            line("status"),
            ReadLine::Failed("bad utf-8".to_string()),
            ReadLine::Interrupted,
            line("net_info"),
            line("foobar"),
            line("exit"),
            line("status"),
        ]);
        let mut out = Vec::new();
        let mut err = Vec::new();
        run_interactive(&mut session, &mut reader, &mut out, &mut err)
            .await
            .expect("io");

        let out = String::from_utf8(out).expect("utf-8");
        let err = String::from_utf8(err).expect("utf-8");
        assert!(out.starts_with("latest_block_height: 3\n"));
        assert!(out.contains("help"));
        assert!(out.ends_with("Bye!\n"));
        assert!(err.contains("failed to read line: bad utf-8"));
        assert!(err.contains("rpc error: code = Internal desc = peer table unavailable"));
        assert_eq!(session.history(), ["status", "net_info", "foobar", "exit"]);
        assert_eq!(reader.history, ["status", "net_info", "foobar", "exit"]);
        assert_eq!(reader.script.len(), 1);
    }

    #[tokio::test]
    async fn repeated_read_failures_do_not_end_the_loop() {
        let mut session = session();
        let failures = (0..20).map(|idx| ReadLine::Failed(format!("read {idx}")));
        let mut reader = ScriptedReader::new(failures.chain([line("exit")]));
        let mut out = Vec::new();
        let mut err = Vec::new();
        run_interactive(&mut session, &mut reader, &mut out, &mut err)
            .await
            .expect("io");

        let err = String::from_utf8(err).expect("utf-8");
        assert_eq!(err.lines().count(), 20);
        assert!(err.contains("read 19"));
        assert_eq!(String::from_utf8(out).expect("utf-8"), "Bye!\n");
        assert_eq!(session.history(), ["exit"]);
    }

    #[tokio::test]
    async fn loop_ends_quietly_on_eof() {
        let mut session = session();
        let mut reader = ScriptedReader::new([line("dp --address=x@y:1")]);
        let mut out = Vec::new();
        let mut err = Vec::new();
        run_interactive(&mut session, &mut reader, &mut out, &mut err)
            .await
            .expect("io");
        assert_eq!(String::from_utf8(out).expect("utf-8"), "OK\n");
        assert!(err.is_empty());
    }

    #[tokio::test]
    async fn run_once_maps_outcomes_to_exit_codes() {
        for (input, code, stdout, stderr) in [
            ("status --json", 0, "{\"Version\":\"\"", ""),
            ("pb --from=2 --to=1", EXIT_USAGE, "", "invalid height range"),
            ("foobar", EXIT_USAGE, "", "help"),
            ("ni", EXIT_FAILURE, "", "Internal"),
        ] {
            let mut session = session();
            let mut out = Vec::new();
            let mut err = Vec::new();
            let got = run_once(&mut session, input, &mut out, &mut err).await;
            let out = String::from_utf8(out).expect("utf-8");
            let err = String::from_utf8(err).expect("utf-8");
            assert_eq!(got, code, "{input}");
            assert!(out.starts_with(stdout), "{input}: {out}");
            assert!(err.contains(stderr), "{input}: {err}");
        }
    }
}

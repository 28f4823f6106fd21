//! Operator console: command table, dispatch of one line to one remote call,
//! rendering, and the one-shot and interactive front-ends.

pub mod dispatch;
pub mod registry;
pub mod render;
pub mod reply;
pub mod repl;
pub mod session;

pub use dispatch::{Dispatcher, ManagerApi, Outcome};
pub use registry::Registry;
pub use reply::{OutputFormat, Reply, Request, Response};
pub use repl::{EditorReader, LineReader, ReadLine, run_interactive, run_once};
pub use session::Session;

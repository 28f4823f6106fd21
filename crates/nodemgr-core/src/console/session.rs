//! Console state kept for the life of the process.

use crate::console::dispatch::{Dispatcher, ManagerApi, Outcome};
use crate::error::ConsoleError;

/// The dispatcher with its channel, plus every line submitted so far.
pub struct Session<A> {
    dispatcher: Dispatcher<A>,
    history: Vec<String>,
}

impl<A: ManagerApi> Session<A> {
    pub fn new(dispatcher: Dispatcher<A>) -> Self {
        Self {
            dispatcher,
            history: Vec::new(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<A> {
        &self.dispatcher
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Records the line, whatever its outcome, then dispatches it.
    pub async fn submit(&mut self, line: &str) -> Result<Outcome, ConsoleError> {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            self.history.push(trimmed.to_string());
        }
        self.dispatcher.dispatch(line).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::registry::Registry;
    use nodemgr_proto::nodemgr::v1::{
        Ack, DialPeerRequest, NetInfoRequest, NetInfoResponse, PruneBlocksRequest, StatusRequest,
        StatusResponse,
    };
    use tonic::Status;

    struct DownApi;

    fn socket_closed() -> Status {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "socket closed");
        Status::from_error(Box::new(io))
    }

    #[tonic::async_trait]
    impl ManagerApi for DownApi {
        async fn status(&self, _request: StatusRequest) -> Result<StatusResponse, Status> {
            Err(socket_closed())
        }

        async fn net_info(&self, _request: NetInfoRequest) -> Result<NetInfoResponse, Status> {
            Err(socket_closed())
        }

        async fn dial_peer(&self, _request: DialPeerRequest) -> Result<Ack, Status> {
            Err(socket_closed())
        }

        async fn prune_blocks(&self, _request: PruneBlocksRequest) -> Result<Ack, Status> {
            Err(socket_closed())
        }
    }

    #[tokio::test]
    async fn history_keeps_every_line_in_order() {
        let mut session = Session::new(Dispatcher::new(Registry::builtin(), DownApi));

        assert!(session.submit("status\n").await.is_err());
        assert!(matches!(
            session.submit("foobar").await,
            Ok(Outcome::NotFound(_))
        ));
        assert!(session.submit("pb --from=3 --to=1").await.is_err());
        assert!(matches!(session.submit("  ").await, Ok(Outcome::Empty)));
        assert!(matches!(session.submit("exit").await, Ok(Outcome::Exit)));

        assert_eq!(
            session.history(),
            ["status", "foobar", "pb --from=3 --to=1", "exit"]
        );
    }

    #[tokio::test]
    async fn transport_failure_is_not_fatal_to_the_session() {
        let mut session = Session::new(Dispatcher::new(Registry::builtin(), DownApi));
        let err = session.submit("net_info").await.expect_err("node is down");
        assert!(matches!(err, ConsoleError::Transport(_)));
        assert!(matches!(
            session.submit("help").await,
            Ok(Outcome::Output(_))
        ));
    }
}

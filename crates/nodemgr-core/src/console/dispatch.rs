//! Turns one console line into at most one remote call and its rendered
//! output.

use clap::error::ErrorKind;
use nodemgr_proto::nodemgr::v1::manager_service_client::ManagerServiceClient;
use nodemgr_proto::nodemgr::v1::{
    Ack, DialPeerRequest, NetInfoRequest, NetInfoResponse, PruneBlocksRequest, StatusRequest,
    StatusResponse,
};
use tonic::Status;
use tonic::transport::Channel;

use crate::console::registry::{CommandKind, JSON_FLAG, JSON_FLAG_SHORT, Registry};
use crate::console::reply::{OutputFormat, Reply, Request, Response};
use crate::error::ConsoleError;

/// The remote calls the console can make.
#[tonic::async_trait]
pub trait ManagerApi: Send + Sync {
    async fn status(&self, request: StatusRequest) -> Result<StatusResponse, Status>;
    async fn net_info(&self, request: NetInfoRequest) -> Result<NetInfoResponse, Status>;
    async fn dial_peer(&self, request: DialPeerRequest) -> Result<Ack, Status>;
    async fn prune_blocks(&self, request: PruneBlocksRequest) -> Result<Ack, Status>;
}

// The generated methods take `&mut self`; call them by path so the `&self`
// trait methods of the same name are not picked up instead.
#[tonic::async_trait]
impl ManagerApi for ManagerServiceClient<Channel> {
    async fn status(&self, request: StatusRequest) -> Result<StatusResponse, Status> {
        let mut client = self.clone();
        let response = ManagerServiceClient::status(&mut client, tonic::Request::new(request)).await?;
        Ok(response.into_inner())
    }

    async fn net_info(&self, request: NetInfoRequest) -> Result<NetInfoResponse, Status> {
        let mut client = self.clone();
        let response =
            ManagerServiceClient::net_info(&mut client, tonic::Request::new(request)).await?;
        Ok(response.into_inner())
    }

    async fn dial_peer(&self, request: DialPeerRequest) -> Result<Ack, Status> {
        let mut client = self.clone();
        let response =
            ManagerServiceClient::dial_peer(&mut client, tonic::Request::new(request)).await?;
        Ok(response.into_inner())
    }

    async fn prune_blocks(&self, request: PruneBlocksRequest) -> Result<Ack, Status> {
        let mut client = self.clone();
        let response =
            ManagerServiceClient::prune_blocks(&mut client, tonic::Request::new(request)).await?;
        Ok(response.into_inner())
    }
}

/// Result of a dispatched line that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Text to print on standard output.
    Output(String),
    /// The command name is not in the registry; carries guidance text.
    NotFound(String),
    /// The session should end.
    Exit,
    /// Blank line.
    Empty,
}

pub struct Dispatcher<A> {
    registry: Registry,
    api: A,
}

impl<A: ManagerApi> Dispatcher<A> {
    pub fn new(registry: Registry, api: A) -> Self {
        Self { registry, api }
    }

    pub fn registry(&self) -> Registry {
        self.registry
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn dispatch(&self, line: &str) -> Result<Outcome, ConsoleError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut format = OutputFormat::Text;
        let mut tokens = Vec::new();
        for token in line.split_whitespace() {
            if token.eq_ignore_ascii_case(JSON_FLAG) || token.eq_ignore_ascii_case(JSON_FLAG_SHORT)
            {
                format = OutputFormat::Json;
            } else {
                tokens.push(token);
            }
        }
        let Some((name, args)) = tokens.split_first() else {
            return Ok(Outcome::Empty);
        };

        let Some(command) = self.registry.lookup(name) else {
            return Ok(Outcome::NotFound(format!(
                "command not found: {name} (type 'help' to list commands)"
            )));
        };
        match command.kind {
            CommandKind::Exit => return Ok(Outcome::Exit),
            CommandKind::Help => return Ok(Outcome::Output(self.registry.help_text())),
            _ => {}
        }

        let matches = match command.parser().try_get_matches_from(args) {
            Ok(matches) => matches,
            Err(err) if err.kind() == ErrorKind::DisplayHelp => {
                return Ok(Outcome::Output(err.to_string().trim_end().to_string()));
            }
            Err(err) => {
                return Err(ConsoleError::Validation(
                    err.to_string().trim_end().to_string(),
                ));
            }
        };
        let request = Request::from_matches(command, &matches)?;
        tracing::debug!(command = command.name, ?request, "calling manager service");

        let response = self.invoke(&request).await?;
        let reply = Reply { request, response };
        Ok(Outcome::Output(reply.render(format)?))
    }

    async fn invoke(&self, request: &Request) -> Result<Response, ConsoleError> {
        let response = match request {
            Request::Status(request) => Response::Status(self.api.status(request.clone()).await?),
            Request::NetInfo(request) => {
                Response::NetInfo(self.api.net_info(request.clone()).await?)
            }
            Request::DialPeer(request) => {
                Response::DialPeer(self.api.dial_peer(request.clone()).await?)
            }
            Request::PruneBlocks(request) => {
                Response::PruneBlocks(self.api.prune_blocks(request.clone()).await?)
            }
        };
        Ok(response)
    }
}

//! Typed requests and responses for one console invocation.

use clap::ArgMatches;
use nodemgr_proto::nodemgr::v1::{
    Ack, DialPeerRequest, NetInfoRequest, NetInfoResponse, PruneBlocksRequest, StatusRequest,
    StatusResponse,
};

use crate::console::registry::{CommandKind, CommandSpec};
use crate::console::render;
use crate::error::ConsoleError;

/// Text shown for an empty acknowledgement.
pub const ACK_TEXT: &str = "OK";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Status(StatusRequest),
    NetInfo(NetInfoRequest),
    DialPeer(DialPeerRequest),
    PruneBlocks(PruneBlocksRequest),
}

impl Request {
    /// Builds the request for `command` from its parsed flags and checks it
    /// before anything is sent.
    pub fn from_matches(command: &CommandSpec, matches: &ArgMatches) -> Result<Self, ConsoleError> {
        let request = match command.kind {
            CommandKind::Status => Request::Status(StatusRequest {}),
            CommandKind::NetInfo => Request::NetInfo(NetInfoRequest {}),
            CommandKind::DialPeer => Request::DialPeer(DialPeerRequest {
                address: matches
                    .get_one::<String>("address")
                    .cloned()
                    .unwrap_or_default(),
                persistent: matches
                    .get_one::<bool>("persistent")
                    .copied()
                    .unwrap_or(false),
            }),
            CommandKind::PruneBlocks => Request::PruneBlocks(PruneBlocksRequest {
                from_height: required_height(matches, "from")?,
                to_height: required_height(matches, "to")?,
            }),
            CommandKind::Help | CommandKind::Exit => {
                return Err(ConsoleError::Validation(format!(
                    "`{}` does not call the node",
                    command.name
                )));
            }
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ConsoleError> {
        match self {
            Request::DialPeer(request) if request.address.trim().is_empty() => Err(
                ConsoleError::Validation("--address must not be empty".to_string()),
            ),
            Request::PruneBlocks(request)
                if request.from_height < 0 || request.to_height < 0 =>
            {
                Err(ConsoleError::Validation(
                    "heights must be non-negative".to_string(),
                ))
            }
            Request::PruneBlocks(request) if request.to_height < request.from_height => {
                Err(ConsoleError::Validation(format!(
                    "invalid height range: --to ({}) is below --from ({})",
                    request.to_height, request.from_height
                )))
            }
            _ => Ok(()),
        }
    }
}

fn required_height(matches: &ArgMatches, name: &str) -> Result<i64, ConsoleError> {
    matches
        .get_one::<i64>(name)
        .copied()
        .ok_or_else(|| ConsoleError::Validation(format!("missing --{name}")))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Status(StatusResponse),
    NetInfo(NetInfoResponse),
    DialPeer(Ack),
    PruneBlocks(Ack),
}

impl Response {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Response::Status(response) => render::json(response),
            Response::NetInfo(response) => render::json(response),
            Response::DialPeer(ack) | Response::PruneBlocks(ack) => render::json(ack),
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        match self {
            Response::Status(response) => render::text(response),
            Response::NetInfo(response) => render::text(response),
            Response::DialPeer(_) | Response::PruneBlocks(_) => Ok(ACK_TEXT.to_string()),
        }
    }
}

/// One invocation's request paired with the response it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub request: Request,
    pub response: Response,
}

impl Reply {
    pub fn render(&self, format: OutputFormat) -> Result<String, ConsoleError> {
        let rendered = match format {
            OutputFormat::Json => self.response.to_json()?,
            OutputFormat::Text => self.response.to_text()?,
        };
        Ok(rendered)
    }
}

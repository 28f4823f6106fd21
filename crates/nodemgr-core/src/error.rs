//! Error types for the console and the socket server.

use std::path::PathBuf;

use thiserror::Error;
use tonic::Status;

/// Exit code for invalid console input (bad flags, unknown command).
pub const EXIT_USAGE: u8 = 2;
/// Exit code for transport, remote and rendering failures.
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Rejected before any remote call was attempted.
    #[error("{0}")]
    Validation(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error: code = {:?} desc = {}", .0.code(), .0.message())]
    Remote(Status),
    #[error("failed to render response: {0}")]
    Render(#[from] serde_json::Error),
}

impl ConsoleError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ConsoleError::Validation(_) => EXIT_USAGE,
            ConsoleError::Transport(_) | ConsoleError::Remote(_) | ConsoleError::Render(_) => {
                EXIT_FAILURE
            }
        }
    }
}

impl From<Status> for ConsoleError {
    fn from(status: Status) -> Self {
        // Statuses built by the channel itself (connect refused, reset) carry
        // the underlying transport error as their source; statuses sent by
        // the server never do.
        if std::error::Error::source(&status).is_some() {
            ConsoleError::Transport(with_sources(&status))
        } else {
            ConsoleError::Remote(status)
        }
    }
}

impl From<tonic::transport::Error> for ConsoleError {
    fn from(err: tonic::transport::Error) -> Self {
        ConsoleError::Transport(with_sources(&err))
    }
}

fn with_sources(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = match err.downcast_ref::<Status>() {
        Some(status) => status.message().to_string(),
        None => err.to_string(),
    };
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("socket {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("grpc server failed: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn channel_failure_is_a_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = ConsoleError::from(Status::from_error(Box::new(io)));
        assert!(matches!(err, ConsoleError::Transport(ref message) if message.contains("connection refused")));
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn unavailable_sent_by_the_server_stays_remote() {
        let err = ConsoleError::from(Status::unavailable("node unavailable: consensus rpc down"));
        assert!(matches!(err, ConsoleError::Remote(ref status) if status.code() == Code::Unavailable));
        assert_eq!(
            err.to_string(),
            "rpc error: code = Unavailable desc = node unavailable: consensus rpc down"
        );
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn remote_error_keeps_code_and_message() {
        let err = ConsoleError::from(Status::failed_precondition("latest block must be kept"));
        assert_eq!(
            err.to_string(),
            "rpc error: code = FailedPrecondition desc = latest block must be kept"
        );
    }

    #[test]
    fn validation_maps_to_usage_exit_code() {
        let err = ConsoleError::Validation("missing --address".to_string());
        assert_eq!(err.exit_code(), EXIT_USAGE);
        assert_eq!(err.to_string(), "missing --address");
    }
}

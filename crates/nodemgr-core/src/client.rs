//! gRPC channel to the ManagerService over a unix socket.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper_util::rt::TokioIo;
use nodemgr_proto::nodemgr::v1::manager_service_client::ManagerServiceClient;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};

// The URI is required by the endpoint but never dialed; the connector
// always opens the socket path.
const PLACEHOLDER_URI: &str = "http://[::]:50051";

fn endpoint() -> Endpoint {
    Endpoint::from_static(PLACEHOLDER_URI)
}

#[derive(Debug, Clone)]
struct SocketConnector {
    socket_path: Arc<PathBuf>,
}

impl SocketConnector {
    fn new(socket_path: &Path) -> Self {
        Self {
            socket_path: Arc::new(socket_path.to_path_buf()),
        }
    }
}

impl tower::Service<Uri> for SocketConnector {
    type Response = TokioIo<UnixStream>;
    type Error = std::io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _uri: Uri) -> Self::Future {
        let socket_path = Arc::clone(&self.socket_path);
        Box::pin(async move {
            let stream = UnixStream::connect(socket_path.as_path()).await?;
            Ok(TokioIo::new(stream))
        })
    }
}

/// Connects now; fails if nothing is listening on the socket.
pub async fn connect(
    socket_path: &Path,
) -> Result<ManagerServiceClient<Channel>, tonic::transport::Error> {
    let channel = endpoint()
        .connect_with_connector(SocketConnector::new(socket_path))
        .await?;
    Ok(ManagerServiceClient::new(channel))
}

/// Connects on first use; socket failures surface as `Unavailable` calls.
pub fn connect_lazy(socket_path: &Path) -> ManagerServiceClient<Channel> {
    let channel = endpoint().connect_with_connector_lazy(SocketConnector::new(socket_path));
    ManagerServiceClient::new(channel)
}

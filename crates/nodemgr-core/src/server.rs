//! Unix-socket lifecycle for the ManagerService.
//!
//! [`serve`] binds the socket, serves on one task and waits for the shutdown
//! signal on another. It returns only after both tasks are done, so the
//! socket can be rebound as soon as it returns.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use nodemgr_proto::nodemgr::v1::manager_service_server::ManagerServiceServer;
use tokio::net::UnixListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;

use crate::api::NodeManagerService;
use crate::error::ServeError;
use crate::shutdown::ShutdownState;

/// Removes a socket file left behind by a previous process.
pub fn remove_stale_socket(socket_path: &Path) -> Result<bool, ServeError> {
    match std::fs::remove_file(socket_path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ServeError::Io {
            path: socket_path.to_path_buf(),
            source,
        }),
    }
}

pub async fn serve(
    socket_path: &Path,
    service: NodeManagerService,
    shutdown: Arc<ShutdownState>,
) -> Result<(), ServeError> {
    if remove_stale_socket(socket_path)? {
        tracing::info!(socket = %socket_path.display(), "removed stale socket file");
    }
    let listener = UnixListener::bind(socket_path).map_err(|source| ServeError::Io {
        path: socket_path.to_path_buf(),
        source,
    })?;
    tracing::info!(socket = %socket_path.display(), "manager service listening");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let (done_tx, done_rx) = oneshot::channel::<()>();

    let server = Server::builder()
        .add_service(ManagerServiceServer::new(service))
        .serve_with_incoming_shutdown(UnixListenerStream::new(listener), async move {
            let _ = stop_rx.await;
        });
    let serve_task = tokio::spawn(async move {
        let result = server.await;
        let _ = done_tx.send(());
        result
    });

    let waiter = tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("graceful stop requested; draining in-flight calls");
                let _ = stop_tx.send(());
            }
            _ = done_rx => {}
        }
    });

    let (served, waited) = tokio::join!(serve_task, waiter);
    let result = match served {
        Ok(Ok(())) => waited.map_err(ServeError::from),
        Ok(Err(err)) => Err(ServeError::from(err)),
        Err(err) => Err(ServeError::from(err)),
    };

    remove_stale_socket(socket_path)?;
    match &result {
        Ok(()) => tracing::info!(socket = %socket_path.display(), "manager service stopped"),
        Err(err) => tracing::error!(error = %err, "manager service stopped with error"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodemgr_node::{LocalNode, LocalNodeConfig};
    use std::time::Duration;

    fn service() -> NodeManagerService {
        NodeManagerService::new(Arc::new(LocalNode::new(LocalNodeConfig::default())))
    }

    #[test]
    fn remove_stale_socket_reports_whether_a_file_existed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("file.sock");
        assert!(!remove_stale_socket(&path).expect("missing file"));
        std::fs::write(&path, b"address already in use").expect("write stale file");
        assert!(remove_stale_socket(&path).expect("stale file"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn serve_replaces_stale_file_and_cleans_up_on_shutdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("file.sock");
        std::fs::write(&path, b"address already in use").expect("write stale file");

        let shutdown = ShutdownState::new();
        let task = {
            let path = path.clone();
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { serve(&path, service(), shutdown).await })
        };
        for _ in 0..100 {
            if tokio::net::UnixStream::connect(&path).await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::net::UnixStream::connect(&path)
            .await
            .expect("socket accepts connections");

        shutdown.begin();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("serve returned")
            .expect("serve joined")
            .expect("serve result");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn serve_fails_when_socket_directory_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("file.sock");
        let err = serve(&path, service(), ShutdownState::new())
            .await
            .expect_err("bind must fail");
        assert!(matches!(err, ServeError::Io { .. }));
    }
}

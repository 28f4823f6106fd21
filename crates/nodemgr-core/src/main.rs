//! nodemgrd - runs an in-memory node and serves the ManagerService on a
//! unix socket until interrupted.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nodemgr_core::api::NodeManagerService;
use nodemgr_core::cli::{DaemonCli, ensure_socket_dir, init_tracing};
use nodemgr_core::server::serve;
use nodemgr_core::shutdown::{ShutdownState, trigger_on_ctrl_c};
use nodemgr_node::LocalNode;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = DaemonCli::parse();
    init_tracing("info");

    let socket_path = cli.socket.socket_path()?;
    ensure_socket_dir(&socket_path)?;

    let node = Arc::new(LocalNode::new(cli.node_config()));
    for _ in 0..cli.seed_blocks {
        node.produce_block();
    }
    tracing::info!(
        node_id = %node.node_id(),
        moniker = %cli.moniker,
        seed_blocks = cli.seed_blocks,
        "node started"
    );

    let shutdown = ShutdownState::new();
    let signal = trigger_on_ctrl_c(Arc::clone(&shutdown));

    let producer = (cli.block_interval_ms > 0).then(|| {
        let node = Arc::clone(&node);
        let shutdown = Arc::clone(&shutdown);
        let period = Duration::from_millis(cli.block_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticker.tick() => {
                        node.produce_block();
                    }
                }
            }
        })
    });

    let service = NodeManagerService::new(node);
    let result = serve(&socket_path, service, Arc::clone(&shutdown)).await;

    // Serve can also end on its own error; stop the helpers either way.
    shutdown.begin();
    if let Some(producer) = producer {
        producer.await?;
    }
    signal.await?;
    result?;
    Ok(())
}

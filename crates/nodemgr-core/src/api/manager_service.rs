//! ManagerService gRPC service implementation.
//!
//! Each handler is an independent call against the node's consensus-RPC
//! client; the service keeps no state of its own between calls.

use std::sync::Arc;

use chrono::SecondsFormat;
use nodemgr_node::{NetInfo, NodeError, NodeRpc, NodeStatus};
use nodemgr_proto::nodemgr::v1::{
    Ack, DialPeerRequest, NetInfoRequest, NetInfoResponse, NodeInfo, NodeInfoOther,
    ProtocolVersion, PruneBlocksRequest, PubKey, StatusRequest, StatusResponse, SyncInfo,
    TmStatus, ValidatorInfo, manager_service_server::ManagerService,
};
use tonic::{Request, Response, Status};

/// The ManagerService implementation.
#[derive(Clone)]
pub struct NodeManagerService {
    node: Arc<dyn NodeRpc>,
}

impl NodeManagerService {
    pub fn new(node: Arc<dyn NodeRpc>) -> Self {
        Self { node }
    }
}

fn classify(err: NodeError) -> Status {
    match err {
        NodeError::Unavailable(message) => Status::unavailable(message),
        NodeError::Rejected(message) => Status::failed_precondition(message),
        NodeError::Unsupported(message) => Status::unimplemented(message),
        NodeError::Internal(message) => Status::internal(message),
    }
}

fn node_info(info: nodemgr_node::NodeInfo) -> NodeInfo {
    NodeInfo {
        protocol_version: Some(ProtocolVersion {
            p2p: info.protocol_version.p2p,
            block: info.protocol_version.block,
            app: info.protocol_version.app,
        }),
        id: info.id,
        listen_addr: info.listen_addr,
        network: info.network,
        version: info.version,
        channels: info.channels,
        moniker: info.moniker,
        other: Some(NodeInfoOther {
            tx_index: info.other.tx_index,
            rpc_address: info.other.rpc_address,
        }),
    }
}

pub fn status_response(status: NodeStatus) -> StatusResponse {
    let sync = status.sync_info;
    let latest_block_time = sync
        .latest_block_time
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    let version = status.node_info.version.clone();
    StatusResponse {
        version,
        latest_block_hash: sync.latest_block_hash.clone(),
        latest_app_hash: sync.latest_app_hash.clone(),
        latest_block_height: sync.latest_block_height,
        latest_block_time: latest_block_time.clone(),
        earliest_block_height: sync.earliest_block_height,
        tm_status: Some(TmStatus {
            node_info: Some(node_info(status.node_info)),
            sync_info: Some(SyncInfo {
                latest_block_hash: sync.latest_block_hash,
                latest_app_hash: sync.latest_app_hash,
                latest_block_height: sync.latest_block_height,
                latest_block_time,
                earliest_block_height: sync.earliest_block_height,
                catching_up: sync.catching_up,
            }),
            validator_info: Some(ValidatorInfo {
                address: status.validator_info.address,
                pub_key: Some(PubKey {
                    r#type: status.validator_info.pub_key.key_type,
                    value: status.validator_info.pub_key.value,
                }),
                voting_power: status.validator_info.voting_power,
            }),
        }),
    }
}

/// Copies the node's net-info view into the wire schema field by field.
/// Fields the schema does not carry (per-peer connection stats) are dropped.
pub fn net_info_response(info: &NetInfo) -> Result<NetInfoResponse, serde_json::Error> {
    let value = serde_json::to_value(info)?;
    serde_json::from_value(value)
}

#[tonic::async_trait]
impl ManagerService for NodeManagerService {
    async fn status(
        &self,
        _request: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        tracing::debug!("status requested");
        let status = self.node.status().await.map_err(|err| {
            tracing::warn!(error = %err, "status failed");
            Status::internal(err.to_string())
        })?;
        Ok(Response::new(status_response(status)))
    }

    async fn net_info(
        &self,
        _request: Request<NetInfoRequest>,
    ) -> Result<Response<NetInfoResponse>, Status> {
        tracing::debug!("net_info requested");
        let info = self.node.net_info().await.map_err(|err| {
            tracing::warn!(error = %err, "net_info failed");
            Status::internal(err.to_string())
        })?;
        let response = net_info_response(&info).map_err(|err| Status::internal(err.to_string()))?;
        Ok(Response::new(response))
    }

    async fn dial_peer(&self, request: Request<DialPeerRequest>) -> Result<Response<Ack>, Status> {
        let request = request.into_inner();
        if request.address.is_empty() {
            return Err(Status::invalid_argument("missing peer address"));
        }
        tracing::debug!(address = %request.address, persistent = request.persistent, "dial_peer requested");
        self.node
            .dial_peers(std::slice::from_ref(&request.address), request.persistent)
            .await
            .map_err(|err| {
                tracing::warn!(address = %request.address, error = %err, "dial_peer failed");
                classify(err)
            })?;
        Ok(Response::new(Ack {}))
    }

    async fn prune_blocks(
        &self,
        request: Request<PruneBlocksRequest>,
    ) -> Result<Response<Ack>, Status> {
        let request = request.into_inner();
        if request.from_height < 0 || request.to_height < 0 {
            return Err(Status::invalid_argument("heights must be non-negative"));
        }
        if request.to_height < request.from_height {
            return Err(Status::invalid_argument(format!(
                "to_height {} is below from_height {}",
                request.to_height, request.from_height
            )));
        }
        tracing::debug!(
            from_height = request.from_height,
            to_height = request.to_height,
            "prune_blocks requested"
        );
        let pruned = self
            .node
            .prune_blocks(request.from_height, request.to_height)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "prune_blocks failed");
                classify(err)
            })?;
        tracing::info!(pruned, "prune_blocks completed");
        Ok(Response::new(Ack {}))
    }
}

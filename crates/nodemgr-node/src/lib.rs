//! Node manager node library.
//!
//! This crate provides the consensus-RPC seam the manager service talks to
//! ([`NodeRpc`]) together with an in-memory engine implementing it: a block
//! store with inclusive range pruning and a peer book of dialed peers.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use nodemgr_hash::{app_hash, block_hash, hash_hex, id_hex, node_id, sha256, validator_address};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_NETWORK: &str = "nodemgr-devnet";
pub const DEFAULT_LISTEN_ADDR: &str = "tcp://0.0.0.0:26656";
pub const DEFAULT_RPC_ADDR: &str = "tcp://127.0.0.1:26657";
pub const PUB_KEY_TYPE: &str = "tendermint/PubKeyEd25519";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProtocolVersion {
    pub p2p: u64,
    pub block: u64,
    pub app: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeInfoOther {
    pub tx_index: String,
    pub rpc_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeInfo {
    pub protocol_version: ProtocolVersion,
    pub id: String,
    pub listen_addr: String,
    pub network: String,
    pub version: String,
    pub channels: String,
    pub moniker: String,
    pub other: NodeInfoOther,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyncInfo {
    pub latest_block_hash: String,
    pub latest_app_hash: String,
    pub latest_block_height: i64,
    pub latest_block_time: DateTime<Utc>,
    pub earliest_block_height: i64,
    pub catching_up: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PubKey {
    #[serde(rename = "Type")]
    pub key_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValidatorInfo {
    pub address: String,
    pub pub_key: PubKey,
    pub voting_power: i64,
}

/// Snapshot returned by the node's status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeStatus {
    pub node_info: NodeInfo,
    pub sync_info: SyncInfo,
    pub validator_info: ValidatorInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectionStatus {
    pub duration_ms: u64,
    pub send_rate: i64,
    pub recv_rate: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PeerInfo {
    pub node_info: NodeInfo,
    pub is_outbound: bool,
    pub connection_status: ConnectionStatus,
    pub remote_ip: String,
}

/// Snapshot returned by the node's net-info endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetInfo {
    pub listening: bool,
    pub listeners: Vec<String>,
    pub n_peers: i64,
    pub peers: Vec<PeerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("node unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Rejected(String),
    #[error("not supported by this node: {0}")]
    Unsupported(String),
    #[error("internal node error: {0}")]
    Internal(String),
}

impl From<StoreError> for NodeError {
    fn from(err: StoreError) -> Self {
        NodeError::Rejected(err.to_string())
    }
}

impl From<PeerError> for NodeError {
    fn from(err: PeerError) -> Self {
        NodeError::Rejected(err.to_string())
    }
}

/// Client for the node's consensus engine.
///
/// Implementations may block on network or local calls; callers that need a
/// bound on latency wrap individual calls in a deadline.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    async fn status(&self) -> Result<NodeStatus, NodeError>;
    async fn net_info(&self) -> Result<NetInfo, NodeError>;
    /// Dials every address; `persistent` peers are reconnected by the node
    /// after this call returns.
    async fn dial_peers(&self, peers: &[String], persistent: bool) -> Result<(), NodeError>;
    /// Removes blocks in the inclusive height range and returns how many were
    /// removed.
    async fn prune_blocks(&self, from_height: i64, to_height: i64) -> Result<u64, NodeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub height: i64,
    pub hash: [u8; 32],
    pub app_hash: [u8; 32],
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("invalid height range: from {from} to {to}")]
    InvalidRange { from: i64, to: i64 },
    #[error("block store is empty")]
    Empty,
    #[error("range up to height {to} includes latest block {latest}, which must be kept")]
    HeadNotPrunable { to: i64, latest: i64 },
}

pub trait BlockStore: Send + Sync {
    /// Commits the next block on top of the current head.
    fn commit(&self, time: DateTime<Utc>) -> Block;
    fn latest(&self) -> Option<Block>;
    /// Lowest retained height.
    fn base(&self) -> Option<i64>;
    fn block(&self, height: i64) -> Option<Block>;
    fn prune(&self, from_height: i64, to_height: i64) -> Result<u64, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryBlockStore {
    blocks: RwLock<BTreeMap<i64, Block>>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockStore for InMemoryBlockStore {
    fn commit(&self, time: DateTime<Utc>) -> Block {
        let mut blocks = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
        let (height, parent) = match blocks.last_key_value() {
            Some((height, head)) => (height + 1, head.hash),
            None => (1, [0u8; 32]),
        };
        let time_nanos = time.timestamp_nanos_opt().unwrap_or_default();
        let hash = block_hash(height, &parent, time_nanos);
        let block = Block {
            height,
            hash,
            app_hash: app_hash(height, &hash),
            time,
        };
        blocks.insert(height, block.clone());
        block
    }

    fn latest(&self) -> Option<Block> {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_key_value()
            .map(|(_, block)| block.clone())
    }

    fn base(&self) -> Option<i64> {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .first_key_value()
            .map(|(height, _)| *height)
    }

    fn block(&self, height: i64) -> Option<Block> {
        self.blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&height)
            .cloned()
    }

    fn prune(&self, from_height: i64, to_height: i64) -> Result<u64, StoreError> {
        if from_height < 0 || to_height < from_height {
            return Err(StoreError::InvalidRange {
                from: from_height,
                to: to_height,
            });
        }
        let mut blocks = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
        let latest = *blocks.last_key_value().ok_or(StoreError::Empty)?.0;
        if (from_height..=to_height).contains(&latest) {
            return Err(StoreError::HeadNotPrunable {
                to: to_height,
                latest,
            });
        }
        let doomed: Vec<i64> = blocks
            .range(from_height..=to_height)
            .map(|(height, _)| *height)
            .collect();
        for height in &doomed {
            blocks.remove(height);
        }
        Ok(doomed.len() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("peer address must look like <id>@<host>:<port>, got {0:?}")]
    Malformed(String),
    #[error("peer id must be 40 hex characters, got {0:?}")]
    InvalidId(String),
    #[error("invalid peer port in {0:?}")]
    InvalidPort(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn parse(address: &str) -> Result<Self, PeerError> {
        let (id, endpoint) = address
            .split_once('@')
            .ok_or_else(|| PeerError::Malformed(address.to_string()))?;
        if id.len() != 40 || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PeerError::InvalidId(id.to_string()));
        }
        let (host, port) = endpoint
            .rsplit_once(':')
            .ok_or_else(|| PeerError::Malformed(address.to_string()))?;
        if host.is_empty() {
            return Err(PeerError::Malformed(address.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| PeerError::InvalidPort(address.to_string()))?;
        Ok(Self {
            id: id.to_ascii_lowercase(),
            host: host.to_string(),
            port,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    pub address: PeerAddress,
    pub persistent: bool,
    pub first_dialed_at: DateTime<Utc>,
    pub dial_count: u64,
}

/// Outbound peers the node has been asked to dial, keyed by peer id.
#[derive(Debug, Default)]
pub struct PeerBook {
    peers: DashMap<String, PeerEntry>,
}

impl PeerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a dial. A peer once marked persistent stays persistent.
    pub fn dial(&self, address: &str, persistent: bool) -> Result<PeerEntry, PeerError> {
        let address = PeerAddress::parse(address)?;
        let now = Utc::now();
        let mut entry = self
            .peers
            .entry(address.id.clone())
            .or_insert_with(|| PeerEntry {
                address: address.clone(),
                persistent: false,
                first_dialed_at: now,
                dial_count: 0,
            });
        entry.address = address;
        entry.persistent |= persistent;
        entry.dial_count += 1;
        Ok(entry.clone())
    }

    pub fn get(&self, id: &str) -> Option<PeerEntry> {
        self.peers.get(id).map(|entry| entry.clone())
    }

    /// Entries ordered by peer id.
    pub fn entries(&self) -> Vec<PeerEntry> {
        let mut entries: Vec<PeerEntry> = self.peers.iter().map(|entry| entry.clone()).collect();
        entries.sort_by(|a, b| a.address.id.cmp(&b.address.id));
        entries
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LocalNodeConfig {
    pub moniker: String,
    pub network: String,
    pub listen_addr: String,
    pub rpc_address: String,
    pub version: String,
    pub voting_power: i64,
}

impl Default for LocalNodeConfig {
    fn default() -> Self {
        Self {
            moniker: "local".to_string(),
            network: DEFAULT_NETWORK.to_string(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            rpc_address: DEFAULT_RPC_ADDR.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            voting_power: 10,
        }
    }
}

/// Single-validator node kept entirely in memory.
pub struct LocalNode {
    config: LocalNodeConfig,
    public_key: [u8; 32],
    blocks: Arc<dyn BlockStore>,
    peers: PeerBook,
}

impl LocalNode {
    pub fn new(config: LocalNodeConfig) -> Self {
        Self::with_block_store(config, Arc::new(InMemoryBlockStore::new()))
    }

    pub fn with_block_store(config: LocalNodeConfig, blocks: Arc<dyn BlockStore>) -> Self {
        // Identity is derived from the moniker so restarts keep the same id.
        let public_key = sha256(config.moniker.as_bytes());
        Self {
            config,
            public_key,
            blocks,
            peers: PeerBook::new(),
        }
    }

    pub fn node_id(&self) -> String {
        id_hex(&node_id(&self.public_key))
    }

    pub fn blocks(&self) -> &Arc<dyn BlockStore> {
        &self.blocks
    }

    pub fn peers(&self) -> &PeerBook {
        &self.peers
    }

    pub fn produce_block(&self) -> Block {
        let block = self.blocks.commit(Utc::now());
        tracing::debug!(height = block.height, "committed block");
        block
    }

    fn node_info(&self) -> NodeInfo {
        NodeInfo {
            protocol_version: ProtocolVersion {
                p2p: 8,
                block: 11,
                app: 1,
            },
            id: self.node_id(),
            listen_addr: self.config.listen_addr.clone(),
            network: self.config.network.clone(),
            version: self.config.version.clone(),
            channels: "40202122233038606100".to_string(),
            moniker: self.config.moniker.clone(),
            other: NodeInfoOther {
                tx_index: "on".to_string(),
                rpc_address: self.config.rpc_address.clone(),
            },
        }
    }

    fn sync_info(&self) -> SyncInfo {
        match self.blocks.latest() {
            Some(head) => SyncInfo {
                latest_block_hash: hash_hex(&head.hash),
                latest_app_hash: hash_hex(&head.app_hash),
                latest_block_height: head.height,
                latest_block_time: head.time,
                earliest_block_height: self.blocks.base().unwrap_or(head.height),
                catching_up: false,
            },
            None => SyncInfo {
                latest_block_hash: String::new(),
                latest_app_hash: String::new(),
                latest_block_height: 0,
                latest_block_time: DateTime::<Utc>::UNIX_EPOCH,
                earliest_block_height: 0,
                catching_up: false,
            },
        }
    }

    fn peer_info(&self, entry: &PeerEntry, now: DateTime<Utc>) -> PeerInfo {
        let connected_for = now
            .signed_duration_since(entry.first_dialed_at)
            .num_milliseconds()
            .max(0) as u64;
        PeerInfo {
            node_info: NodeInfo {
                id: entry.address.id.clone(),
                listen_addr: entry.address.endpoint(),
                network: self.config.network.clone(),
                ..NodeInfo::default()
            },
            is_outbound: true,
            connection_status: ConnectionStatus {
                duration_ms: connected_for,
                send_rate: 0,
                recv_rate: 0,
            },
            remote_ip: entry.address.host.clone(),
        }
    }
}

#[async_trait]
impl NodeRpc for LocalNode {
    async fn status(&self) -> Result<NodeStatus, NodeError> {
        Ok(NodeStatus {
            node_info: self.node_info(),
            sync_info: self.sync_info(),
            validator_info: ValidatorInfo {
                address: hash_hex(&validator_address(&self.public_key)),
                pub_key: PubKey {
                    key_type: PUB_KEY_TYPE.to_string(),
                    value: general_purpose::STANDARD.encode(self.public_key),
                },
                voting_power: self.config.voting_power,
            },
        })
    }

    async fn net_info(&self) -> Result<NetInfo, NodeError> {
        let now = Utc::now();
        let peers: Vec<PeerInfo> = self
            .peers
            .entries()
            .iter()
            .map(|entry| self.peer_info(entry, now))
            .collect();
        Ok(NetInfo {
            listening: true,
            listeners: vec![format!("Listener(@{})", self.config.listen_addr)],
            n_peers: peers.len() as i64,
            peers,
        })
    }

    async fn dial_peers(&self, peers: &[String], persistent: bool) -> Result<(), NodeError> {
        for address in peers {
            let entry = self.peers.dial(address, persistent)?;
            tracing::info!(
                peer = %entry.address.id,
                endpoint = %entry.address.endpoint(),
                persistent = entry.persistent,
                "dialed peer"
            );
        }
        Ok(())
    }

    async fn prune_blocks(&self, from_height: i64, to_height: i64) -> Result<u64, NodeError> {
        let pruned = self.blocks.prune(from_height, to_height)?;
        tracing::info!(
            from_height,
            to_height,
            pruned,
            base = ?self.blocks.base(),
            "pruned blocks"
        );
        Ok(pruned)
    }
}

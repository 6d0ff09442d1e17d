//! Shared test fixtures
//!
//! One deterministic template/aux/submission fixture used across the
//! evaluator and server tests, plus mock daemon nodes and stores.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use mergepool_core::{get_chain, AssembledHeader, AuxBlock, BitcoinBlock, Template};
use mergepool_rpc::{Manager, RpcError, RpcTransport};
use mergepool_storage::{MemoryStore, Share, ShareStore, StorageError};

use crate::config::{NodeConfig, PoolConfig};
use crate::server::PoolServer;
use crate::session::Session;
use crate::work::LiveWork;

pub(crate) const MINER_ADDRESS: &str = "Baaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

pub(crate) const REWARD_PUBKEY: &str =
    "021111111111111111111111111111111111111111111111111111111111111111";

pub(crate) const AUX1_HASH: &str =
    "a617dfb275f834e26a6f0c94052dd88982c86297dba990fd96645026e7c69e10";

pub(crate) const AUX2_HASH: &str =
    "6b31977a8ac73ede3f3653ea0d96bc3656242461e31d771985a0b17084d3cf91";

/// Display-order scrypt digest of the fixture submission against the
/// single-aux fixture work
pub(crate) const FIXTURE_POW_DISPLAY: &str =
    "be7f47bc37b196df2e2a658724e7abd262d2ea77cd631be202bc6a3ef593a96c";

fn node_config(chain: &str, reward_to: &str) -> NodeConfig {
    NodeConfig {
        chain: chain.to_string(),
        rpc_urls: vec![format!("http://127.0.0.1:0/{}", chain)],
        rpc_user: "user".to_string(),
        rpc_password: "pass".to_string(),
        reward_to: reward_to.to_string(),
        reward_pub_script_key: REWARD_PUBKEY.to_string(),
    }
}

pub(crate) fn fixture_config() -> PoolConfig {
    let mut nodes = HashMap::new();
    nodes.insert(
        "bellscoin".to_string(),
        node_config("bellscoin", MINER_ADDRESS),
    );
    nodes.insert(
        "dogecoin".to_string(),
        node_config("dogecoin", "DH5yaieqoZN36fDVciNyRueRGvGLR3mr7L"),
    );
    PoolConfig {
        pool_name: "mergepool".to_string(),
        pool_difficulty: 1.0,
        share_flush_interval: "5s".to_string(),
        connection_timeout: "10m".to_string(),
        stratum_bind: "127.0.0.1:0".to_string(),
        notify_bind: None,
        template_refresh_interval: "30s".to_string(),
        aux_merkle_size: 4,
        block_signature: hex::encode(b"/mergepool/"),
        testnet: false,
        block_chain_order: vec!["bellscoin".to_string(), "dogecoin".to_string()],
        nodes,
    }
}

pub(crate) fn fixture_config_two_aux() -> PoolConfig {
    let mut config = fixture_config();
    config.nodes.insert(
        "pepecoin".to_string(),
        node_config("pepecoin", "DH5yaieqoZN36fDVciNyRueRGvGLR3mr7L"),
    );
    config.block_chain_order.push("pepecoin".to_string());
    config
}

pub(crate) fn fixture_template(target: &str) -> Template {
    Template {
        version: 0x2000_0000,
        previous_block_hash: "84fd9bac333ad79154348296204fa7f8c537a96e08983e5f73b3f5aca8e8edf7"
            .to_string(),
        target: target.to_string(),
        bits: "1e0ffff0".to_string(),
        cur_time: 1_722_500_000,
        height: 100,
        coinbase_value: 5_000_000_000,
        ..Default::default()
    }
}

pub(crate) fn fixture_aux(target: &str) -> AuxBlock {
    AuxBlock {
        hash: AUX1_HASH.to_string(),
        chain_id: 1,
        coinbase_hash: AUX2_HASH.to_string(),
        height: 5000,
        target: target.to_string(),
        bits: "1e0ffff0".to_string(),
        chain: "dogecoin".to_string(),
        ..Default::default()
    }
}

fn generate_work(template: Template, aux_blocks: Vec<AuxBlock>) -> LiveWork {
    let (block, work) = BitcoinBlock::generate(
        template,
        get_chain("bellscoin").unwrap(),
        &aux_blocks,
        4,
        0,
        b"/mergepool/",
        REWARD_PUBKEY,
        8,
        "00000001",
        true,
    )
    .unwrap();
    LiveWork {
        job_id: "00000001".to_string(),
        block,
        aux_blocks,
        work,
    }
}

/// Live work with one dogecoin aux block
pub(crate) fn fixture_work(primary_target: &str, aux_target: &str) -> LiveWork {
    generate_work(fixture_template(primary_target), vec![fixture_aux(aux_target)])
}

/// Live work with dogecoin and pepecoin aux blocks
pub(crate) fn fixture_work_two_aux(
    primary_target: &str,
    aux1_target: &str,
    aux2_target: &str,
) -> LiveWork {
    let aux2 = AuxBlock {
        hash: AUX2_HASH.to_string(),
        chain_id: 2,
        coinbase_hash: AUX1_HASH.to_string(),
        height: 6000,
        target: aux2_target.to_string(),
        bits: "1e0ffff0".to_string(),
        chain: "pepecoin".to_string(),
        ..Default::default()
    };
    generate_work(
        fixture_template(primary_target),
        vec![fixture_aux(aux1_target), aux2],
    )
}

/// The canonical fixture submission assembled against `live`
pub(crate) fn submit_fixture(live: &LiveWork) -> AssembledHeader {
    live.block
        .assemble_header("010203040a0b0c0d", "66ab43a0", "00ff00ff")
        .unwrap()
}

/// `mining.submit` params for the fixture submission
pub(crate) fn submit_params(job_id: &str) -> Vec<Value> {
    vec![
        json!(format!("{}.rig1", MINER_ADDRESS)),
        json!(job_id),
        json!("0a0b0c0d"),
        json!("66ab43a0"),
        json!("00ff00ff"),
    ]
}

pub(crate) fn fixture_share() -> Share {
    Share {
        pool_id: "mergepool".to_string(),
        block_height: 100,
        miner: MINER_ADDRESS.to_string(),
        worker: "rig1".to_string(),
        user_agent: "cpuminer/2.5".to_string(),
        difficulty: 1.0,
        network_difficulty: 1234.5,
        ip_address: "127.0.0.1".to_string(),
        created: Utc::now(),
    }
}

/// Mock daemon node recording every call
pub(crate) struct MockChainNode {
    chain: String,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl MockChainNode {
    pub(crate) fn new(chain: &str) -> Arc<Self> {
        Arc::new(MockChainNode {
            chain: chain.to_string(),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub(crate) fn calls_for(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| *m == method)
            .count()
    }

    pub(crate) fn fail_method(&self, method: &str) {
        self.failing.lock().unwrap().insert(method.to_string());
    }
}

#[async_trait]
impl RpcTransport for MockChainNode {
    async fn call(&self, method: &str, _params: Value) -> Result<Value, RpcError> {
        self.calls.lock().unwrap().push(method.to_string());
        if self.failing.lock().unwrap().contains(method) {
            return Err(RpcError::Transport("injected mock failure".to_string()));
        }
        match method {
            "getblocktemplate" => Ok(serde_json::to_value(fixture_template(&"ff".repeat(32)))?),
            "createauxblock" => Ok(serde_json::to_value(fixture_aux(&"ff".repeat(32)))?),
            "getauxblock" => Ok(json!(true)),
            "submitblock" => Ok(Value::Null),
            other => Err(RpcError::InvalidResponse(format!(
                "mock has no handler for {}",
                other
            ))),
        }
    }

    fn endpoint(&self) -> &str {
        &self.chain
    }
}

/// Share store that fails its first batch, then recovers
pub(crate) struct FlakyShareStore {
    fail_next: AtomicBool,
    inserted: tokio::sync::RwLock<Vec<Share>>,
}

impl FlakyShareStore {
    pub(crate) fn failing_once() -> Self {
        FlakyShareStore {
            fail_next: AtomicBool::new(true),
            inserted: tokio::sync::RwLock::new(Vec::new()),
        }
    }

    pub(crate) async fn inserted(&self) -> usize {
        self.inserted.read().await.len()
    }
}

#[async_trait]
impl ShareStore for FlakyShareStore {
    async fn insert_batch(&self, shares: &[Share]) -> Result<(), StorageError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Database("injected failure".to_string()));
        }
        self.inserted.write().await.extend_from_slice(shares);
        Ok(())
    }
}

/// A server over mock managers and a shared in-memory store
pub(crate) fn test_server(
    config: PoolConfig,
) -> (
    Arc<PoolServer>,
    Arc<MemoryStore>,
    HashMap<String, Arc<MockChainNode>>,
) {
    let store = Arc::new(MemoryStore::new());
    let mut managers = HashMap::new();
    let mut nodes = HashMap::new();
    for name in &config.block_chain_order {
        let node = MockChainNode::new(name);
        managers.insert(
            name.clone(),
            Manager::new(name.clone(), vec![node.clone()]),
        );
        nodes.insert(name.clone(), node);
    }
    let server = Arc::new(
        PoolServer::new(config, managers, store.clone(), store.clone()).unwrap(),
    );
    (server, store, nodes)
}

pub(crate) fn test_server_with_stores(config: PoolConfig) -> (Arc<PoolServer>, Arc<MemoryStore>) {
    let (server, store, _) = test_server(config);
    (server, store)
}

/// A server whose share store is caller-provided
pub(crate) fn test_server_with_share_store(
    config: PoolConfig,
    share_store: Arc<FlakyShareStore>,
) -> (Arc<PoolServer>, Arc<MemoryStore>) {
    let found_store = Arc::new(MemoryStore::new());
    let mut managers = HashMap::new();
    for name in &config.block_chain_order {
        let node = MockChainNode::new(name);
        managers.insert(name.clone(), Manager::new(name.clone(), vec![node]));
    }
    let server = Arc::new(
        PoolServer::new(config, managers, share_store, found_store.clone()).unwrap(),
    );
    (server, found_store)
}

/// A detached session with the fixture extranonce1
pub(crate) fn test_session(
    _server: &Arc<PoolServer>,
) -> (Arc<Mutex<Session>>, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(16);
    let session = Arc::new(Mutex::new(Session::new(
        1,
        "127.0.0.1".to_string(),
        "01020304".to_string(),
        tx,
    )));
    (session, rx)
}

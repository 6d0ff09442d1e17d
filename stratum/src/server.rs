//! Pool Server
//!
//! Owns the shared state and the long-running tasks: the Stratum
//! listener with one reader and one writer task per miner, the template
//! refresh loop, the block-notification hint listener, the share-buffer
//! flusher and the idle-session reaper.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::codec::{FramedRead, LinesCodec};

use mergepool_consensus::Target;
use mergepool_core::{get_chain, ChainSpec, Submission};
use mergepool_rpc::Manager;
use mergepool_storage::{FoundStore, Share, ShareStore};
use mergepool_util::parse_duration;

use crate::config::PoolConfig;
use crate::protocol::{
    notify_line, set_difficulty_line, subscribe_result, StratumRequest, StratumResponse,
};
use crate::session::Session;
use crate::share::{validate_and_weigh, ShareStatus};
use crate::work::LiveWork;
use crate::PoolError;

/// Session reaper cadence
const REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// State guarded by the pool lock
pub(crate) struct PoolState {
    /// The work snapshot miners are solving; `None` until the first fetch
    pub live: Option<Arc<LiveWork>>,
}

/// The merged-mining pool server
pub struct PoolServer {
    pub(crate) config: PoolConfig,

    /// Primary chain profile
    pub(crate) chain: &'static dyn ChainSpec,

    /// Daemon managers keyed by chain name
    pub(crate) managers: HashMap<String, Manager>,

    pub(crate) shares_store: Arc<dyn ShareStore>,
    pub(crate) found_store: Arc<dyn FoundStore>,

    pub(crate) state: RwLock<PoolState>,
    pub(crate) share_buffer: Mutex<Vec<Share>>,

    sessions: RwLock<HashMap<u64, Arc<Mutex<Session>>>>,
    session_seq: AtomicU64,
    extranonce_seq: AtomicU32,
    free_extranonces: Mutex<Vec<u32>>,
    pub(crate) job_seq: AtomicU64,
}

impl PoolServer {
    /// Builds the server, validating configuration fatally
    pub fn new(
        config: PoolConfig,
        managers: HashMap<String, Manager>,
        shares_store: Arc<dyn ShareStore>,
        found_store: Arc<dyn FoundStore>,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        let chain = get_chain(config.primary_chain())?;
        for name in &config.block_chain_order {
            if !managers.contains_key(name) {
                return Err(PoolError::Config(format!("no RPC manager for {}", name)));
            }
        }

        Ok(PoolServer {
            config,
            chain,
            managers,
            shares_store,
            found_store,
            state: RwLock::new(PoolState { live: None }),
            share_buffer: Mutex::new(Vec::new()),
            sessions: RwLock::new(HashMap::new()),
            session_seq: AtomicU64::new(0),
            extranonce_seq: AtomicU32::new(0),
            free_extranonces: Mutex::new(Vec::new()),
            job_seq: AtomicU64::new(0),
        })
    }

    /// The daemon manager for a chain
    pub(crate) fn manager(&self, chain: &str) -> Result<&Manager, PoolError> {
        self.managers
            .get(chain)
            .ok_or_else(|| PoolError::Config(format!("no RPC manager for {}", chain)))
    }

    /// Runs the pool until the process exits
    pub async fn run(self: Arc<Self>) -> Result<(), PoolError> {
        info!(
            "Starting pool '{}' for chains [{}]",
            self.config.pool_name,
            self.config.block_chain_order.join(", ")
        );

        // Initial work; a pool with nothing to hand out must not listen.
        let live = self.refresh_work().await?;
        info!(
            "Initial work at height {} with {} aux chain(s)",
            live.block.template.height,
            live.aux_blocks.len()
        );

        self.spawn_flush_task(parse_duration(&self.config.share_flush_interval)?);
        self.spawn_refresh_task(parse_duration(&self.config.template_refresh_interval)?);
        self.spawn_reaper_task(parse_duration(&self.config.connection_timeout)?);
        if let Some(bind) = self.config.notify_bind.clone() {
            let server = self.clone();
            tokio::spawn(async move { server.run_notify_listener(bind).await });
        }

        let listener = TcpListener::bind(&self.config.stratum_bind).await?;
        info!("Stratum server listening on {}", self.config.stratum_bind);
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New miner connection from {}", addr);
                    let server = self.clone();
                    tokio::spawn(async move { server.handle_connection(stream, addr).await });
                }
                Err(err) => error!("Error accepting connection: {}", err),
            }
        }
    }

    fn spawn_flush_task(self: &Arc<Self>, interval: Duration) {
        info!(
            "Share buffer flushes every {}",
            self.config.share_flush_interval
        );
        let server = self.clone();
        tokio::spawn(async move {
            loop {
                time::sleep(interval).await;
                match server.flush_shares().await {
                    Ok(0) => {}
                    Ok(count) => debug!("Flushed {} share(s)", count),
                    Err(err) => error!("Share flush failed, batch re-buffered: {}", err),
                }
            }
        });
    }

    fn spawn_refresh_task(self: &Arc<Self>, interval: Duration) {
        let server = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await; // the initial fetch already happened
            loop {
                ticker.tick().await;
                match server.refresh_work().await {
                    Ok(live) => server.broadcast_work(&live),
                    Err(err) => {
                        // Keep serving the cached work while daemons flap.
                        error!("Template refresh failed: {}", err);
                    }
                }
            }
        });
    }

    fn spawn_reaper_task(self: &Arc<Self>, timeout: Duration) {
        let server = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(REAPER_INTERVAL);
            loop {
                ticker.tick().await;
                server.reap_idle_sessions(timeout);
            }
        });
    }

    /// Re-fetches work when a daemon pokes the notification port
    async fn run_notify_listener(self: Arc<Self>, bind: String) {
        let listener = match TcpListener::bind(&bind).await {
            Ok(listener) => listener,
            Err(err) => {
                error!("Block notification listener failed to bind {}: {}", bind, err);
                return;
            }
        };
        info!("Block notification listener on {}", bind);
        loop {
            match listener.accept().await {
                Ok((_stream, addr)) => {
                    debug!("Block notification from {}", addr);
                    match self.refresh_work().await {
                        Ok(live) => self.broadcast_work(&live),
                        Err(err) => error!("Refresh after block notification failed: {}", err),
                    }
                }
                Err(err) => error!("Block notification accept failed: {}", err),
            }
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let (reader, writer) = stream.into_split();
        let (tx, mut rx) = mpsc::channel::<String>(64);

        let session_id = self.session_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let extranonce1 = self.allocate_extranonce1();
        let session = Arc::new(Mutex::new(Session::new(
            session_id,
            addr.ip().to_string(),
            extranonce1,
            tx,
        )));
        self.sessions
            .write()
            .unwrap()
            .insert(session_id, session.clone());

        tokio::spawn(async move {
            let mut writer = BufWriter::new(writer);
            while let Some(line) = rx.recv().await {
                if writer.write_all(line.as_bytes()).await.is_err()
                    || writer.write_all(b"\n").await.is_err()
                    || writer.flush().await.is_err()
                {
                    break;
                }
            }
        });

        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(8192));
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!("Error reading from {}: {}", addr, err);
                    break;
                }
            };
            match serde_json::from_str::<StratumRequest>(&line) {
                Ok(request) => {
                    let id = request.id.clone().unwrap_or(Value::Null);
                    let response = match self.dispatch(&session, &request).await {
                        Ok(result) => StratumResponse::ok(id, result),
                        Err(err) => {
                            debug!("{} from {}: {}", request.method, addr, err);
                            StratumResponse::err(id, err.stratum_code(), &err.to_string())
                        }
                    };
                    let reply = response.to_line();
                    session.lock().unwrap().send_line(reply);
                }
                Err(err) => warn!("Invalid stratum request from {}: {}", addr, err),
            }
        }

        debug!("Miner connection closed: {}", addr);
        self.drop_session(session_id);
    }

    /// Routes one request to its handler
    pub(crate) async fn dispatch(
        &self,
        session: &Arc<Mutex<Session>>,
        request: &StratumRequest,
    ) -> Result<Value, PoolError> {
        session.lock().unwrap().touch();
        match request.method.as_str() {
            "mining.subscribe" => self.handle_subscribe(session, &request.params),
            "mining.authorize" => self.handle_authorize(session, &request.params),
            "mining.submit" => self.handle_submit(session, &request.params).await,
            other => Err(PoolError::Protocol(format!(
                "unsupported method: {}",
                other
            ))),
        }
    }

    fn handle_subscribe(
        &self,
        session: &Arc<Mutex<Session>>,
        params: &[Value],
    ) -> Result<Value, PoolError> {
        let user_agent = params
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut session = session.lock().unwrap();
        session.user_agent = user_agent;
        session.subscribed = true;
        Ok(subscribe_result(
            session.id,
            &session.extranonce1,
            session.extranonce2_size,
        ))
    }

    fn handle_authorize(
        &self,
        session: &Arc<Mutex<Session>>,
        params: &[Value],
    ) -> Result<Value, PoolError> {
        let worker = params
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| PoolError::Protocol("authorize expects a worker name".to_string()))?;
        {
            let mut session = session.lock().unwrap();
            let mut parts = worker.splitn(2, '.');
            session.miner_address = parts.next().unwrap_or_default().to_string();
            session.rig_id = parts.next().unwrap_or_default().to_string();
            session.authorized = true;
        }
        info!("Worker authorized: {}", worker);
        self.push_work_to(session);
        Ok(Value::Bool(true))
    }

    /// Evaluates one submitted share
    pub(crate) async fn handle_submit(
        &self,
        session: &Arc<Mutex<Session>>,
        params: &[Value],
    ) -> Result<Value, PoolError> {
        let submission =
            Submission::from_params(params).map_err(|e| PoolError::Protocol(e.to_string()))?;

        let mut parts = submission.worker.splitn(2, '.');
        let miner_address = parts.next().unwrap_or_default();
        let rig_id = parts.next().ok_or(PoolError::InvalidMinerAddress)?;
        let address_ok = if self.config.testnet {
            self.chain.valid_testnet_address(miner_address)
        } else {
            self.chain.valid_mainnet_address(miner_address)
        };
        if !address_ok {
            return Err(PoolError::InvalidMinerAddress);
        }

        let live = self
            .state
            .read()
            .unwrap()
            .live
            .clone()
            .ok_or(PoolError::TemplateNotReady)?;
        if submission.job_id != live.job_id {
            session.lock().unwrap().shares_rejected += 1;
            return Err(PoolError::StaleWork(submission.job_id));
        }

        let (extranonce1, user_agent, ip) = {
            let session = session.lock().unwrap();
            (
                session.extranonce1.clone(),
                session.user_agent.clone(),
                session.ip.clone(),
            )
        };
        let extranonce = format!("{}{}", extranonce1, submission.extranonce2);
        let assembled = live
            .block
            .assemble_header(&extranonce, &submission.ntime, &submission.nonce)
            .map_err(|e| PoolError::Protocol(e.to_string()))?;
        let outcome = validate_and_weigh(
            &live.block,
            &assembled,
            &live.aux_blocks,
            self.config.pool_difficulty,
        )?;

        let height = live.block.template.height;
        if outcome.status == ShareStatus::Invalid {
            session.lock().unwrap().shares_rejected += 1;
            info!(
                "Invalid share for block {}:{} from {} [{}] [{}/{}]",
                self.config.primary_chain(),
                height,
                ip,
                rig_id,
                outcome.share_difficulty,
                self.config.pool_difficulty
            );
            return Ok(Value::Bool(false));
        }

        session.lock().unwrap().shares_accepted += 1;
        info!(
            "Valid share for block {}:{} from {} [{}] [{}/{}]",
            self.config.primary_chain(),
            height,
            ip,
            rig_id,
            outcome.share_difficulty,
            self.config.pool_difficulty
        );

        let network_difficulty = Target::from_be_hex(&live.block.template.target)?
            .to_difficulty()?
            * self.chain.share_multiplier();
        self.push_share(Share {
            pool_id: self.config.pool_name.clone(),
            block_height: height,
            miner: miner_address.to_string(),
            worker: rig_id.to_string(),
            user_agent,
            difficulty: outcome.share_difficulty,
            network_difficulty,
            ip_address: ip,
            created: Utc::now(),
        });

        if outcome.status == ShareStatus::Candidate {
            self.submit_candidates(&live, &assembled, &outcome, miner_address, rig_id)
                .await;
        }

        Ok(Value::Bool(true))
    }

    /// Pushes the current difficulty and job to one session
    fn push_work_to(&self, session: &Arc<Mutex<Session>>) {
        let live = self.state.read().unwrap().live.clone();
        if let Some(live) = live {
            let difficulty_line = set_difficulty_line(self.config.pool_difficulty);
            let job_line = notify_line(&live.work);
            let mut session = session.lock().unwrap();
            session.difficulty = self.config.pool_difficulty;
            session.send_line(difficulty_line);
            session.send_line(job_line);
        }
    }

    /// Broadcasts a job to every connected session
    pub fn broadcast_work(&self, live: &LiveWork) {
        let line = notify_line(&live.work);
        let sessions = self.sessions.read().unwrap();
        for session in sessions.values() {
            session.lock().unwrap().send_line(line.clone());
        }
        debug!("Sent job {} to {} session(s)", live.job_id, sessions.len());
    }

    fn reap_idle_sessions(&self, timeout: Duration) {
        let idle: Vec<u64> = {
            let sessions = self.sessions.read().unwrap();
            sessions
                .iter()
                .filter(|(_, session)| {
                    session.lock().unwrap().last_activity.elapsed() > timeout
                })
                .map(|(id, _)| *id)
                .collect()
        };
        for id in idle {
            info!("Reaping idle session {}", id);
            self.drop_session(id);
        }
    }

    fn drop_session(&self, session_id: u64) {
        let removed = self.sessions.write().unwrap().remove(&session_id);
        if let Some(session) = removed {
            let extranonce1 = session.lock().unwrap().extranonce1.clone();
            self.release_extranonce1(&extranonce1);
        }
    }

    fn allocate_extranonce1(&self) -> String {
        let reused = self.free_extranonces.lock().unwrap().pop();
        let value =
            reused.unwrap_or_else(|| self.extranonce_seq.fetch_add(1, Ordering::Relaxed) + 1);
        format!("{:08x}", value)
    }

    fn release_extranonce1(&self, extranonce1: &str) {
        if let Ok(value) = u32::from_str_radix(extranonce1, 16) {
            self.free_extranonces.lock().unwrap().push(value);
        }
    }

    /// Number of connected sessions
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    #[cfg(test)]
    pub(crate) fn install_live(&self, live: LiveWork) {
        self.state.write().unwrap().live = Some(Arc::new(live));
    }
}

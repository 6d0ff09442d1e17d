//! Template Fetching and Live Work
//!
//! One fetch cycle pulls the primary template and every configured aux
//! chain's work unit, then projects them into a fresh `LiveWork`
//! snapshot. The snapshot replaces the previous one atomically; shares
//! are only evaluated against the snapshot their job id names.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{debug, warn};

use mergepool_core::{AuxBlock, BitcoinBlock, Template, Work};

use crate::server::PoolServer;
use crate::session::{EXTRANONCE1_SIZE, EXTRANONCE2_SIZE};
use crate::PoolError;

/// The work snapshot miners are currently solving
#[derive(Debug)]
pub struct LiveWork {
    /// Job id broadcast with the work
    pub job_id: String,

    /// Assembled primary work
    pub block: BitcoinBlock,

    /// Aux blocks committed to in the coinbase, in configured order
    pub aux_blocks: Vec<AuxBlock>,

    /// The miner-facing job tuple
    pub work: Work,
}

impl PoolServer {
    /// Fetches all templates and installs a fresh live work snapshot
    ///
    /// A failed aux fetch drops that chain from the round; a failed
    /// primary fetch is an error and leaves the previous snapshot
    /// serving.
    pub async fn refresh_work(&self) -> Result<Arc<LiveWork>, PoolError> {
        let template = self.fetch_primary_template().await?;
        let aux_blocks = self.fetch_aux_blocks().await;

        let clean_jobs = match &self.state.read().unwrap().live {
            Some(live) => live.block.template.previous_block_hash != template.previous_block_hash,
            None => true,
        };

        let job_id = format!("{:08x}", self.job_seq.fetch_add(1, Ordering::Relaxed) + 1);
        let signature = self.config.block_signature_bytes()?;
        let node = self
            .config
            .node(self.config.primary_chain())
            .ok_or_else(|| PoolError::Config("primary node missing".to_string()))?;

        let (block, work) = BitcoinBlock::generate(
            template,
            self.chain,
            &aux_blocks,
            self.config.aux_merkle_size,
            0,
            &signature,
            &node.reward_pub_script_key,
            EXTRANONCE1_SIZE + EXTRANONCE2_SIZE,
            &job_id,
            clean_jobs,
        )?;

        debug!(
            "New job {} at height {} with {} aux block(s), clean_jobs={}",
            job_id,
            block.template.height,
            aux_blocks.len(),
            clean_jobs
        );

        let live = Arc::new(LiveWork {
            job_id,
            block,
            aux_blocks,
            work,
        });
        self.state.write().unwrap().live = Some(live.clone());
        Ok(live)
    }

    async fn fetch_primary_template(&self) -> Result<Template, PoolError> {
        let manager = self.manager(self.config.primary_chain())?;
        let raw = manager.get_block_template().await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Pulls aux work from every configured aux chain, skipping chains
    /// that fail this round
    async fn fetch_aux_blocks(&self) -> Vec<AuxBlock> {
        let mut aux_blocks = Vec::new();
        for chain_name in self.config.aux_chains() {
            let manager = match self.manager(chain_name) {
                Ok(manager) => manager,
                Err(err) => {
                    warn!("{}", err);
                    continue;
                }
            };
            let node = match self.config.node(chain_name) {
                Some(node) => node,
                None => continue,
            };
            match manager.create_aux_block(&node.reward_to).await {
                Ok(raw) => match serde_json::from_value::<AuxBlock>(raw) {
                    Ok(mut aux) => {
                        aux.normalize_target();
                        aux.chain = chain_name.clone();
                        aux_blocks.push(aux);
                    }
                    Err(err) => warn!("Malformed aux block from {}: {}", chain_name, err),
                },
                Err(err) => warn!("No aux {} block found: {}", chain_name, err),
            }
        }
        aux_blocks
    }
}

#[cfg(test)]
mod tests {
    use crate::test_util::{fixture_config, test_server};
    use crate::PoolError;

    #[tokio::test]
    async fn test_refresh_installs_live_work() {
        let (server, _store, nodes) = test_server(fixture_config());
        let live = server.refresh_work().await.unwrap();

        assert_eq!(live.job_id, "00000001");
        assert_eq!(live.block.template.height, 100);
        assert_eq!(live.aux_blocks.len(), 1);
        assert_eq!(live.aux_blocks[0].chain, "dogecoin");
        assert!(live.work.clean_jobs);
        assert_eq!(nodes["bellscoin"].calls_for("getblocktemplate"), 1);
        assert_eq!(nodes["dogecoin"].calls_for("createauxblock"), 1);

        // Same tip on the second fetch: new job, no clean-jobs flag.
        let live = server.refresh_work().await.unwrap();
        assert_eq!(live.job_id, "00000002");
        assert!(!live.work.clean_jobs);
    }

    #[tokio::test]
    async fn test_aux_failure_drops_chain_for_the_round() {
        let (server, _store, nodes) = test_server(fixture_config());
        nodes["dogecoin"].fail_method("createauxblock");

        let live = server.refresh_work().await.unwrap();
        assert!(live.aux_blocks.is_empty());
        assert_eq!(live.block.template.height, 100);
    }

    #[tokio::test]
    async fn test_primary_failure_keeps_cached_work() {
        let (server, _store, nodes) = test_server(fixture_config());
        let first = server.refresh_work().await.unwrap();

        nodes["bellscoin"].fail_method("getblocktemplate");
        let err = server.refresh_work().await.unwrap_err();
        assert!(matches!(err, PoolError::Rpc(_)));

        // The previous snapshot still serves shares.
        let live = server.state.read().unwrap().live.clone().unwrap();
        assert_eq!(live.job_id, first.job_id);
    }
}

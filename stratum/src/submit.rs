//! Submission Coordinator
//!
//! Drives a candidate share out to every chain it won. Auxiliary chains
//! submit first; the primary goes last so its block already carries a
//! commitment the aux daemons accepted. One chain failing never blocks
//! the others, and every outcome lands in a `Found` record.

use chrono::Utc;
use log::{error, info};

use mergepool_consensus::Target;
use mergepool_core::{get_chain, AssembledHeader, AuxBlock, AuxPow};
use mergepool_storage::{Found, FoundStatus};
use mergepool_util::reverse_hex;

use crate::server::PoolServer;
use crate::share::{describe_candidates, ShareOutcome};
use crate::work::LiveWork;
use crate::PoolError;

impl PoolServer {
    /// Submits a candidate share to every winning chain and logs one
    /// aggregated outcome line
    pub(crate) async fn submit_candidates(
        &self,
        live: &LiveWork,
        assembled: &AssembledHeader,
        outcome: &ShareOutcome,
        miner_address: &str,
        rig_id: &str,
    ) {
        let kind = describe_candidates(&outcome.candidates, &self.config.block_chain_order);
        let mut attempted = Vec::new();
        let mut succeeded = Vec::new();

        for (index, aux) in live.aux_blocks.iter().enumerate() {
            if !outcome.candidates.get(index + 1).copied().unwrap_or(false) {
                continue;
            }
            let tag = format!("{}:{}", aux.chain, aux.height);
            attempted.push(tag.clone());
            match self
                .submit_aux(live, assembled, index, aux, miner_address, &kind)
                .await
            {
                Ok(()) => succeeded.push(tag),
                Err(err) => error!("{} block submission failed: {}", aux.chain, err),
            }
        }

        if outcome.candidates[0] {
            let tag = format!(
                "{}:{}",
                self.config.primary_chain(),
                live.block.template.height
            );
            attempted.push(tag.clone());
            match self.submit_primary(live, assembled, miner_address, &kind).await {
                Ok(()) => succeeded.push(tag),
                Err(err) => error!(
                    "{} block submission failed: {}",
                    self.config.primary_chain(),
                    err
                ),
            }
        }

        info!(
            "{} from {} [{}]: attempted [{}], succeeded [{}]",
            kind,
            miner_address,
            rig_id,
            attempted.join(", "),
            succeeded.join(", ")
        );
    }

    async fn submit_aux(
        &self,
        live: &LiveWork,
        assembled: &AssembledHeader,
        index: usize,
        aux: &AuxBlock,
        miner_address: &str,
        kind: &str,
    ) -> Result<(), PoolError> {
        let manager = self.manager(&aux.chain)?;
        let auxpow = AuxPow::assemble(
            &live.block,
            assembled,
            &live.aux_blocks,
            self.config.aux_merkle_size,
            index,
        )?;

        let aux_target = Target::from_be_hex(&reverse_hex(&aux.target)?)?;
        let network_difficulty =
            aux_target.to_difficulty()? * get_chain(&aux.chain)?.share_multiplier();

        let mut found = Found {
            pool_id: self.config.pool_name.clone(),
            chain: aux.chain.clone(),
            status: FoundStatus::Pending,
            kind: kind.to_string(),
            confirmation_progress: 0.0,
            miner: miner_address.to_string(),
            source: String::new(),
            block_height: aux.height,
            hash: aux.hash.clone(),
            // Rarely present on stock aux daemons; kept for the ones
            // patched to return it.
            transaction_confirmation_data: reverse_hex(&aux.coinbase_hash).unwrap_or_default(),
            network_difficulty,
            created: Utc::now(),
        };

        let result = manager
            .submit_aux_block(&aux.hash, &auxpow.to_hex())
            .await;
        match result {
            Ok(true) => {
                self.found_store.insert(found).await?;
                Ok(())
            }
            Ok(false) => {
                found.status = FoundStatus::Failed;
                self.found_store.insert(found).await?;
                Err(PoolError::Protocol(format!(
                    "{} daemon rejected the aux block",
                    aux.chain
                )))
            }
            Err(err) => {
                found.status = FoundStatus::Failed;
                self.found_store.insert(found).await?;
                Err(err.into())
            }
        }
    }

    async fn submit_primary(
        &self,
        live: &LiveWork,
        assembled: &AssembledHeader,
        miner_address: &str,
        kind: &str,
    ) -> Result<(), PoolError> {
        let manager = self.manager(self.config.primary_chain())?;
        let network_difficulty = Target::from_be_hex(&live.block.template.target)?
            .to_difficulty()?
            * self.chain.share_multiplier();

        let mut found = Found {
            pool_id: self.config.pool_name.clone(),
            chain: self.config.primary_chain().to_string(),
            status: FoundStatus::Pending,
            kind: kind.to_string(),
            confirmation_progress: 0.0,
            miner: miner_address.to_string(),
            source: String::new(),
            block_height: live.block.template.height,
            hash: assembled.pow_display_hex(),
            transaction_confirmation_data: assembled.coinbase_display_hex(),
            network_difficulty,
            created: Utc::now(),
        };

        match manager.submit_block(&live.block.submit_hex(assembled)).await {
            Ok(()) => {
                self.found_store.insert(found).await?;
                Ok(())
            }
            Err(err) => {
                found.status = FoundStatus::Failed;
                self.found_store.insert(found).await?;
                Err(err.into())
            }
        }
    }
}

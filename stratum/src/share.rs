//! Share Evaluation
//!
//! Classifies an assembled header against three tiers of targets: the
//! primary network target, each auxiliary chain's target, and the pool's
//! own softer share target. The candidate vector says, per chain, whether
//! the hash wins a block there; the coordinator submits to each winning
//! chain independently.

use mergepool_consensus::Target;
use mergepool_core::{AssembledHeader, AuxBlock, BitcoinBlock};
use mergepool_util::reverse_hex;

use crate::PoolError;

/// Classification of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareStatus {
    /// Misses even the pool target
    Invalid,

    /// Counts as a share, wins no block
    Valid,

    /// Wins at least one chain
    Candidate,
}

/// Evaluation result for one submission
#[derive(Debug, Clone)]
pub struct ShareOutcome {
    pub status: ShareStatus,

    /// Winning chains: index 0 is the primary, 1.. the aux chains in
    /// template order
    pub candidates: Vec<bool>,

    /// Share difficulty at the pool target
    pub share_difficulty: f64,
}

impl ShareOutcome {
    /// Whether any chain won
    pub fn any_candidate(&self) -> bool {
        self.candidates.iter().any(|c| *c)
    }
}

/// The pool's share target for a chain profile
pub fn pool_target(pool_difficulty: f64, share_multiplier: f64) -> Result<Target, PoolError> {
    Ok(Target::from_difficulty(pool_difficulty / share_multiplier)?)
}

/// Compares the header digest against the primary, aux and pool targets
pub fn validate_and_weigh(
    block: &BitcoinBlock,
    assembled: &AssembledHeader,
    aux_blocks: &[AuxBlock],
    pool_difficulty: f64,
) -> Result<ShareOutcome, PoolError> {
    let primary_target = Target::from_be_hex(&block.template.target)?;
    let pool_target = pool_target(pool_difficulty, block.chain.share_multiplier())?;
    let share_difficulty = pool_target.to_difficulty()?;

    let mut candidates = vec![false; aux_blocks.len() + 1];
    candidates[0] = primary_target.met_by(&assembled.pow);

    for (i, aux) in aux_blocks.iter().enumerate() {
        if aux.target.is_empty() {
            // Daemon sent no target this round; the chain cannot win.
            continue;
        }
        // Aux targets arrive big-endian from the daemon and compare as
        // little-endian numbers.
        let aux_target = Target::from_be_hex(&reverse_hex(&aux.target)?)?;
        candidates[i + 1] = aux_target.met_by(&assembled.pow);
    }

    let status = if candidates.iter().any(|c| *c) {
        ShareStatus::Candidate
    } else if pool_target.met_by(&assembled.pow) {
        ShareStatus::Valid
    } else {
        ShareStatus::Invalid
    };

    Ok(ShareOutcome {
        status,
        candidates,
        share_difficulty,
    })
}

/// Human-readable candidate description for logs and found records
pub fn describe_candidates(candidates: &[bool], chain_order: &[String]) -> String {
    let names: Vec<&str> = candidates
        .iter()
        .zip(chain_order.iter())
        .filter(|(won, _)| **won)
        .map(|(_, name)| name.as_str())
        .collect();
    if names.is_empty() {
        "share".to_string()
    } else {
        format!("{} candidate", names.join("+"))
    }
}

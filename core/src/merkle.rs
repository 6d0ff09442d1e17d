//! Transaction Merkle Engine
//!
//! Computes the Stratum-style Merkle branch for the coinbase: the sibling
//! hash at each level of the tree built over the coinbase followed by the
//! template transactions. Miners fold a fresh coinbase hash through the
//! branch to recompute the root without seeing the other transactions.

use mergepool_crypto::double_sha256;

/// Joins two nodes with double SHA-256
fn merkle_join(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left);
    buf[32..].copy_from_slice(right);
    double_sha256(&buf)
}

/// Precomputes the coinbase Merkle branch over the template transactions
///
/// `tx_hashes` excludes the coinbase itself; the returned steps are the
/// sibling at each level for the leaf at position zero. Odd levels
/// duplicate their last element; a singleton tree yields no steps.
pub fn merkle_steps(tx_hashes: &[[u8; 32]]) -> Vec<[u8; 32]> {
    let mut steps = Vec::new();
    // `level` holds the concrete hashes to the right of the coinbase slot.
    let mut level: Vec<[u8; 32]> = tx_hashes.to_vec();
    while !level.is_empty() {
        steps.push(level[0]);
        // Pad so the level, coinbase slot included, pairs up evenly.
        if (level.len() + 1) % 2 == 1 {
            level.push(*level.last().expect("level is non-empty"));
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level[1..].chunks(2) {
            next.push(merkle_join(&pair[0], &pair[1]));
        }
        level = next;
    }
    steps
}

/// Folds a coinbase hash through a precomputed branch to the root
pub fn fold_coinbase(coinbase_hash: [u8; 32], steps: &[[u8; 32]]) -> [u8; 32] {
    let mut root = coinbase_hash;
    for step in steps {
        root = merkle_join(&root, step);
    }
    root
}

/// Full Merkle root over an explicit hash list, duplicating the last
/// element on odd levels
///
/// A singleton list is its own root; the duplication rule is not applied
/// to it.
pub fn merkle_root(hashes: &[[u8; 32]]) -> Option<[u8; 32]> {
    if hashes.is_empty() {
        return None;
    }
    let mut level = hashes.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().expect("level is non-empty"));
        }
        level = level
            .chunks(2)
            .map(|pair| merkle_join(&pair[0], &pair[1]))
            .collect();
    }
    Some(level[0])
}

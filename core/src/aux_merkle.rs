//! Aux-Chain Merkle Tree
//!
//! Places each auxiliary chain's header hash in a fixed power-of-two slot
//! tree, derives the branch an aux daemon needs to prove its leaf, and
//! packs the starting slot index into the 4-byte little-endian mask.
//!
//! Slot placement must match the aux daemons' own derivation exactly: the
//! linear-congruential step below, with u32 wrap-around, is what Namecoin
//! descendants compute from the chain id. Any deviation produces AuxPoW
//! the daemon rejects.

use mergepool_crypto::double_sha256;
use mergepool_util::reverse_bytes;

use crate::encoding::decode_hash32;
use crate::template::AuxBlock;
use crate::CoreError;

/// The slot an aux chain occupies in a tree of height `tree_height`
pub fn expected_slot(chain_id: u32, tree_height: u32) -> u32 {
    let mut rand: u32 = 12345u32.wrapping_add(chain_id);
    rand = rand.wrapping_mul(1103515245).wrapping_add(12345);
    rand % (1 << tree_height)
}

/// log2 of the slot count, rejecting non-power-of-two sizes
pub fn tree_height(merkle_size: u32) -> Result<u32, CoreError> {
    if merkle_size == 0 || !merkle_size.is_power_of_two() {
        return Err(CoreError::BadMerkleSize(merkle_size));
    }
    Ok(merkle_size.trailing_zeros())
}

/// The slot a specific aux block lands in
pub fn slot_for(aux: &AuxBlock, merkle_size: u32) -> Result<u32, CoreError> {
    Ok(expected_slot(aux.chain_id, tree_height(merkle_size)?))
}

/// Places aux block hashes into their slots; unused slots hold 32 zero
/// bytes
///
/// Two chains resolving to the same slot is a configuration error and
/// fails fast rather than silently overwriting.
pub fn build_aux_leaves(
    aux_blocks: &[AuxBlock],
    merkle_size: u32,
) -> Result<Vec<[u8; 32]>, CoreError> {
    let height = tree_height(merkle_size)?;
    let mut leaves = vec![[0u8; 32]; merkle_size as usize];
    let mut occupants: Vec<Option<u32>> = vec![None; merkle_size as usize];

    for aux in aux_blocks {
        let hash = decode_hash32(&aux.hash, "aux block hash")?;
        let slot = expected_slot(aux.chain_id, height) as usize;
        if let Some(first) = occupants[slot] {
            return Err(CoreError::AuxSlotCollision {
                slot: slot as u32,
                first,
                second: aux.chain_id,
            });
        }
        occupants[slot] = Some(aux.chain_id);
        let mut leaf = [0u8; 32];
        leaf.copy_from_slice(&reverse_bytes(&hash));
        leaves[slot] = leaf;
    }

    Ok(leaves)
}

/// Pairwise double-SHA-256 root of a full slot array
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(&pair[0]);
                buf[32..].copy_from_slice(&pair[1]);
                double_sha256(&buf)
            })
            .collect();
    }
    level[0]
}

/// Extracts the sibling chain proving `index`, together with the root
///
/// The returned mask is the starting slot index, serialized little-endian
/// when the branch goes on the wire.
pub fn branch_for(
    leaves: &[[u8; 32]],
    index: u32,
) -> Result<(Vec<[u8; 32]>, [u8; 32]), CoreError> {
    if index as usize >= leaves.len() {
        return Err(CoreError::AuxIndexOutOfRange(index, leaves.len() as u32));
    }
    let mut branch = Vec::new();
    let mut level = leaves.to_vec();
    let mut idx = index as usize;
    while level.len() > 1 {
        branch.push(level[idx ^ 1]);
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(&pair[0]);
                buf[32..].copy_from_slice(&pair[1]);
                double_sha256(&buf)
            })
            .collect();
        idx /= 2;
    }
    Ok((branch, level[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUX1_HASH: &str = "a617dfb275f834e26a6f0c94052dd88982c86297dba990fd96645026e7c69e10";
    const AUX2_HASH: &str = "6b31977a8ac73ede3f3653ea0d96bc3656242461e31d771985a0b17084d3cf91";

    fn aux(hash: &str, chain_id: u32) -> AuxBlock {
        AuxBlock {
            hash: hash.to_string(),
            chain_id,
            ..Default::default()
        }
    }

    #[test]
    fn test_slot_placement_is_stable() {
        // Pinned against the reference LCG; these must never change.
        assert_eq!(expected_slot(0, 2), 2);
        assert_eq!(expected_slot(1, 2), 3);
        assert_eq!(expected_slot(2, 2), 0);
        assert_eq!(expected_slot(98, 2), 0);
        assert_eq!(expected_slot(1, 3), 3);
        assert_eq!(expected_slot(98, 4), 8);
        for _ in 0..3 {
            assert_eq!(expected_slot(1000, 2), 2);
        }
    }

    #[test]
    fn test_tree_height() {
        assert_eq!(tree_height(2).unwrap(), 1);
        assert_eq!(tree_height(4).unwrap(), 2);
        assert_eq!(tree_height(16).unwrap(), 4);
        assert!(tree_height(0).is_err());
        assert!(tree_height(3).is_err());
    }

    #[test]
    fn test_leaves_reverse_hashes_and_zero_fill() {
        let leaves = build_aux_leaves(&[aux(AUX1_HASH, 1)], 4).unwrap();
        // chain id 1 lands in slot 3 at height 2
        assert_eq!(leaves[3], {
            let mut h = decode_hash32(AUX1_HASH, "hash").unwrap();
            h.reverse();
            h
        });
        assert_eq!(leaves[0], [0u8; 32]);
        assert_eq!(leaves[1], [0u8; 32]);
        assert_eq!(leaves[2], [0u8; 32]);
    }

    #[test]
    fn test_collision_fails_fast() {
        // chain ids 2 and 98 both resolve to slot 0 in a 4-slot tree
        let result = build_aux_leaves(&[aux(AUX1_HASH, 2), aux(AUX2_HASH, 98)], 4);
        assert!(matches!(
            result,
            Err(CoreError::AuxSlotCollision {
                slot: 0,
                first: 2,
                second: 98
            })
        ));
    }

    #[test]
    fn test_root_and_branch_golden() {
        let leaves = build_aux_leaves(&[aux(AUX1_HASH, 1)], 4).unwrap();
        let root = merkle_root(&leaves);
        assert_eq!(
            hex::encode(root),
            "fc6aed747e7011b29ca54d04add0a48de75f0cdffbf9753659c802712bc7dbd0"
        );

        let (branch, branch_root) = branch_for(&leaves, 3).unwrap();
        assert_eq!(branch_root, root);
        assert_eq!(
            branch.iter().map(hex::encode).collect::<Vec<_>>(),
            vec![
                "0000000000000000000000000000000000000000000000000000000000000000",
                "e2f61c3f71d1defd3fa999dfa36953755c690689799962b48bebd836974e8cf9",
            ]
        );
    }

    #[test]
    fn test_two_chains_distinct_slots() {
        let leaves = build_aux_leaves(&[aux(AUX1_HASH, 1), aux(AUX2_HASH, 2)], 4).unwrap();
        assert_eq!(
            hex::encode(merkle_root(&leaves)),
            "031e81dba95274aa6b93da08b3ffda9555c01527f837115fce638481c4cd1882"
        );

        let (branch1, _) = branch_for(&leaves, 3).unwrap();
        assert_eq!(
            hex::encode(branch1[1]),
            "9abf204f5e2dfa2c50f34d4a3c7e1aad406ab1702bb383035eb9d16e538d192c"
        );
        let (branch2, _) = branch_for(&leaves, 0).unwrap();
        assert_eq!(
            hex::encode(branch2[1]),
            "3baba55baa0dc98c1f1a49bd1bab860af75a1dd38342c39d4f6ed4a5b98be5bb"
        );
    }

    #[test]
    fn test_empty_aux_list_roots_over_zero_leaves() {
        let leaves = build_aux_leaves(&[], 4).unwrap();
        assert!(leaves.iter().all(|leaf| *leaf == [0u8; 32]));
        // Root is still well-defined so the scriptSig marker stays intact.
        let root = merkle_root(&leaves);
        assert_ne!(root, [0u8; 32]);
    }

    #[test]
    fn test_full_tree_uses_every_slot() {
        // Chain ids 0..4 cover slots 2, 3, 0, 1 in a 4-slot tree.
        let blocks: Vec<AuxBlock> = (0..4).map(|id| aux(AUX1_HASH, id)).collect();
        let leaves = build_aux_leaves(&blocks, 4).unwrap();
        assert!(leaves.iter().all(|leaf| *leaf != [0u8; 32]));
    }

    #[test]
    fn test_branch_index_out_of_range() {
        let leaves = build_aux_leaves(&[], 4).unwrap();
        assert!(branch_for(&leaves, 4).is_err());
    }
}

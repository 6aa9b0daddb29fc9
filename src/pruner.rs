//! Removes nodes that a cleaning pass decided not to keep.
//!
//! Every occupied node is visited once via a single-threaded scan, and
//! nodes not marked in `keep` are unlinked from their neighbors before
//! being deleted, so no dangling edge ever survives a prune (I1).
//! Deletion mutates the shared table and its neighbors' edge bits in
//! place, so unlike the read-only traversals in [`crate::supernode`]
//! and [`crate::clean`] this pass is not split across buckets: two
//! threads deleting adjacent nodes could race on the same reciprocal
//! edge.

use crate::bitset::AtomicBitset;
use crate::graph_store::{Direction, GraphStore, Orientation};
use crate::hashtable::KmerHashTable;

/// Delete every occupied node whose bit is clear in `keep`.
///
/// For each such node, every neighbor reachable via a union edge has
/// its reciprocal edge bit cleared first, then this node's color
/// edges, coverage, and in-color bits are cleared (I3), and finally
/// the node itself is removed from the hash table. Runs as a single
/// sequential pass; `nthreads` is accepted only for symmetry with the
/// other [`crate::clean::CleanEngine`] stages it's called alongside
/// and is currently unused.
pub fn prune_nodes_lacking_flag(
    table: &KmerHashTable,
    store: &GraphStore,
    _nthreads: usize,
    keep: &AtomicBitset,
) {
    let mut to_delete = Vec::new();
    table.iterate(|hkey, _bk| {
        if !keep.get(hkey.0) {
            to_delete.push(hkey);
        }
    });

    for hkey in to_delete {
        let bk = match table.kmer_at(hkey) {
            Some(bk) => bk,
            None => continue,
        };

        let mut neighbors = Vec::new();
        for orient in [Orientation::Forward, Orientation::Reverse] {
            let edges = store.edges_union(hkey);
            neighbors.extend(
                store
                    .next_nodes(table, &bk, orient, edges)
                    .into_iter()
                    .map(|(nh, _, _)| nh),
            );
        }

        for neighbor_hkey in neighbors {
            clear_edge_pointing_to(table, store, neighbor_hkey, hkey);
        }

        store.clear_node(hkey);
        table.delete(hkey);
    }
}

/// Clear the raw edge bit on `from_hkey` that resolves (via
/// [`GraphStore::next_nodes`]) to `to_hkey`, across every color. Reuses
/// the same neighbor-resolution logic traversal uses, so the bit
/// cleared is always the exact one a prior `add_edge` set.
fn clear_edge_pointing_to(
    table: &KmerHashTable,
    store: &GraphStore,
    from_hkey: crate::hashtable::HKey,
    to_hkey: crate::hashtable::HKey,
) {
    let bk = match table.kmer_at(from_hkey) {
        Some(bk) => bk,
        None => return,
    };

    for orient in [Orientation::Forward, Orientation::Reverse] {
        let edges = store.edges_union(from_hkey);
        for (nh, _norient, base) in store.next_nodes(table, &bk, orient, edges) {
            if nh == to_hkey {
                let (dir, raw_base) = match orient {
                    Orientation::Forward => (Direction::Outgoing, base),
                    Orientation::Reverse => (Direction::Incoming, complement(base)),
                };
                store.clear_reciprocal_edge(from_hkey, dir, raw_base);
            }
        }
    }
}

#[inline]
fn complement(base: u8) -> u8 {
    3 - (base & 0x3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_store::Direction as Dir;
    use crate::kmer::BinaryKmer;

    #[test]
    fn prune_removes_unflagged_nodes_and_neighbor_edges() {
        let table = KmerHashTable::new(3, 64);
        let store = GraphStore::new(table.capacity(), 1);

        // AAA -> AAC: both windows are already canonical as written, so
        // the raw base codes line up directly with the stored orientation.
        let a = BinaryKmer::from_str("AAA", 3).unwrap();
        let b = BinaryKmer::from_str("AAC", 3).unwrap();
        let mut inserted = false;
        let ha = table.find_or_insert(&a, &mut inserted).unwrap();
        let hb = table.find_or_insert(&b, &mut inserted).unwrap();

        store.add_edge(ha, 0, Dir::Outgoing, 1); // C
        store.add_edge(hb, 0, Dir::Incoming, 0); // A

        let keep = AtomicBitset::new(table.capacity());
        keep.set(hb.0);
        // ha is not kept.

        prune_nodes_lacking_flag(&table, &store, 1, &keep);

        assert_eq!(table.find(&a), crate::hashtable::HKEY_NONE);
        assert!(table.find(&b).is_some());
        assert!(store.edges(hb, 0).is_empty());
    }
}

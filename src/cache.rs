//! Path cache: records supernodes visited while threading reads
//! through the graph, one path at a time.
//!
//! A [`GraphCache`] owns four arenas (nodes, supernodes, steps, paths)
//! addressed by `u32` index instead of pointers. A [`CacheSupernode`]
//! caches a supernode's node run plus its up-to-4 predecessors and
//! successors so repeated traversal of the same supernode from a
//! different color doesn't repeat the union-edge walk. A [`CacheStep`]
//! is one visit to a supernode within a path; steps belonging to the
//! same supernode are additionally threaded together via `next_step`
//! so every path that touched a supernode can be enumerated. A
//! [`CachePath`] is a contiguous run of steps in `step_buf` — callers
//! build one path at a time and never revisit an old one, so a path's
//! steps are always its `[first_step, first_step + num_steps)` slice.

use crate::graph_store::{dBNode, GraphStore, Orientation};
use crate::hashtable::{HKey, KmerHashTable};
use crate::supernode::supernode_from;
use std::collections::HashMap;

/// A cached supernode: its node run plus cached adjacency.
#[derive(Debug, Clone)]
pub struct CacheSupernode {
    pub first_node_id: u32,
    pub num_nodes: u32,
    pub first_step: Option<u32>,
    pub prev_nodes: [Option<dBNode>; 4],
    pub next_nodes: [Option<dBNode>; 4],
    pub prev_bases: u8,
    pub next_bases: u8,
    pub num_prev: u8,
    pub num_next: u8,
}

/// A single visit to a supernode within a path.
#[derive(Debug, Clone, Copy)]
pub struct CacheStep {
    pub orient: Orientation,
    pub supernode: u32,
    pub pathid: u32,
    pub next_step: Option<u32>,
}

/// A contiguous run of steps in `step_buf`.
#[derive(Debug, Clone, Copy)]
pub struct CachePath {
    pub first_step: u32,
    pub num_steps: u32,
}

/// Builds and stores paths through the graph. Not safe to share across
/// threads: build one path at a time within a single cache.
pub struct GraphCache<'a> {
    table: &'a KmerHashTable,
    store: &'a GraphStore,
    node_buf: Vec<dBNode>,
    snode_buf: Vec<CacheSupernode>,
    step_buf: Vec<CacheStep>,
    path_buf: Vec<CachePath>,
    snode_hash: HashMap<HKey, u32>,
}

impl<'a> GraphCache<'a> {
    pub fn new(table: &'a KmerHashTable, store: &'a GraphStore) -> Self {
        Self {
            table,
            store,
            node_buf: Vec::new(),
            snode_buf: Vec::new(),
            step_buf: Vec::new(),
            path_buf: Vec::new(),
            snode_hash: HashMap::new(),
        }
    }

    /// Drop all cached paths/steps/supernodes, keeping allocated
    /// capacity for reuse.
    pub fn reset(&mut self) {
        self.node_buf.clear();
        self.snode_buf.clear();
        self.step_buf.clear();
        self.path_buf.clear();
        self.snode_hash.clear();
    }

    pub fn num_nodes(&self) -> usize {
        self.node_buf.len()
    }

    pub fn num_supernodes(&self) -> usize {
        self.snode_buf.len()
    }

    pub fn num_steps(&self) -> usize {
        self.step_buf.len()
    }

    pub fn num_paths(&self) -> usize {
        self.path_buf.len()
    }

    pub fn supernode(&self, id: u32) -> &CacheSupernode {
        &self.snode_buf[id as usize]
    }

    pub fn step(&self, id: u32) -> &CacheStep {
        &self.step_buf[id as usize]
    }

    pub fn path(&self, id: u32) -> &CachePath {
        &self.path_buf[id as usize]
    }

    /// Begin a new path. Returns its id.
    pub fn new_path(&mut self) -> u32 {
        let id = self.path_buf.len() as u32;
        self.path_buf.push(CachePath {
            first_step: self.step_buf.len() as u32,
            num_steps: 0,
        });
        id
    }

    /// Record a visit to `node`'s supernode within path `pathid`.
    /// Returns the new step's id.
    pub fn new_step(&mut self, node: dBNode, pathid: u32) -> u32 {
        let snode_id = self.find_or_add_supernode(node.hkey);
        let stepid = self.step_buf.len() as u32;

        let prev_head = self.snode_buf[snode_id as usize].first_step;
        self.step_buf.push(CacheStep {
            orient: node.orient,
            supernode: snode_id,
            pathid,
            next_step: prev_head,
        });
        self.snode_buf[snode_id as usize].first_step = Some(stepid);
        self.path_buf[pathid as usize].num_steps += 1;
        stepid
    }

    fn find_or_add_supernode(&mut self, hkey: HKey) -> u32 {
        if let Some(&id) = self.snode_hash.get(&hkey) {
            return id;
        }

        let buf = supernode_from(self.table, self.store, hkey);
        let first_node_id = self.node_buf.len() as u32;
        self.node_buf.extend_from_slice(&buf.nodes);

        let first = buf.nodes[0];
        let last = *buf.nodes.last().unwrap();
        let (prev_nodes, prev_bases, num_prev) = predecessors(self.table, self.store, first);
        let (next_nodes, next_bases, num_next) = successors(self.table, self.store, last);

        let id = self.snode_buf.len() as u32;
        self.snode_buf.push(CacheSupernode {
            first_node_id,
            num_nodes: buf.nodes.len() as u32,
            first_step: None,
            prev_nodes,
            next_nodes,
            prev_bases,
            next_bases,
            num_prev,
            num_next,
        });

        for n in &buf.nodes {
            self.snode_hash.insert(n.hkey, id);
        }
        id
    }

    /// Append every node of `snode`, read in `orient`, to `nbuf`.
    pub fn fetch_supernode_nodes(&self, snode: &CacheSupernode, orient: Orientation, nbuf: &mut Vec<dBNode>) {
        let start = snode.first_node_id as usize;
        let end = start + snode.num_nodes as usize;
        match orient {
            Orientation::Forward => nbuf.extend_from_slice(&self.node_buf[start..end]),
            Orientation::Reverse => {
                nbuf.extend(self.node_buf[start..end].iter().rev().map(|n| dBNode {
                    hkey: n.hkey,
                    orient: n.orient.flip(),
                }));
            }
        }
    }

    /// Append every node visited by path `end_step.pathid` strictly
    /// before `end_step`.
    pub fn fetch_path_nodes_before(&self, end_step: u32, nbuf: &mut Vec<dBNode>) {
        let step = &self.step_buf[end_step as usize];
        let path = &self.path_buf[step.pathid as usize];
        for sid in path.first_step..end_step {
            let s = &self.step_buf[sid as usize];
            let snode = &self.snode_buf[s.supernode as usize];
            self.fetch_supernode_nodes(snode, s.orient, nbuf);
        }
    }

    /// Whether every node in `snode` carries `color`.
    pub fn supernode_has_color(&self, snode: &CacheSupernode, color: usize) -> bool {
        let start = snode.first_node_id as usize;
        let end = start + snode.num_nodes as usize;
        self.node_buf[start..end]
            .iter()
            .all(|n| self.store.in_color(n.hkey, color))
    }

    /// Whether every node visited by the path up to and including
    /// `end_step` carries `color`.
    pub fn path_has_color(&self, end_step: u32, color: usize) -> bool {
        let mut nbuf = Vec::new();
        self.fetch_path_nodes_before(end_step, &mut nbuf);
        let step = &self.step_buf[end_step as usize];
        let snode = &self.snode_buf[step.supernode as usize];
        self.fetch_supernode_nodes(snode, step.orient, &mut nbuf);
        nbuf.iter().all(|n| self.store.in_color(n.hkey, color))
    }

    /// Look up the supernode id already caching `hkey`, if any.
    pub fn find_supernode(&self, hkey: HKey) -> Option<u32> {
        self.snode_hash.get(&hkey).copied()
    }

    /// The orientation under which `snode`'s first node matches
    /// `first_node`.
    pub fn supernode_orient_for(&self, snode: &CacheSupernode, first_node: dBNode) -> Orientation {
        let stored_first = self.node_buf[snode.first_node_id as usize];
        if stored_first.hkey == first_node.hkey {
            stored_first.orient
        } else {
            stored_first.orient.flip()
        }
    }
}

fn pack_bases(nodes: &[(dBNode, u8)]) -> (u8, u8) {
    let mut packed = 0u8;
    for (i, (_, base)) in nodes.iter().enumerate().take(4) {
        packed |= (base & 0x3) << (i * 2);
    }
    (packed, nodes.len().min(4) as u8)
}

fn successors(
    table: &KmerHashTable,
    store: &GraphStore,
    node: dBNode,
) -> ([Option<dBNode>; 4], u8, u8) {
    let bk = table.kmer_at(node.hkey).expect("cached node missing from table");
    let edges = store.edges_union(node.hkey);
    let found = store.next_nodes(table, &bk, node.orient, edges);
    let pairs: Vec<(dBNode, u8)> = found
        .into_iter()
        .map(|(hkey, orient, base)| (dBNode { hkey, orient }, base))
        .collect();
    let (packed, count) = pack_bases(&pairs);
    let mut out = [None; 4];
    for (i, (n, _)) in pairs.iter().enumerate().take(4) {
        out[i] = Some(*n);
    }
    (out, packed, count)
}

fn predecessors(
    table: &KmerHashTable,
    store: &GraphStore,
    node: dBNode,
) -> ([Option<dBNode>; 4], u8, u8) {
    let bk = table.kmer_at(node.hkey).expect("cached node missing from table");
    let edges = store.edges_union(node.hkey);
    let observed = match node.orient {
        Orientation::Forward => bk.clone(),
        Orientation::Reverse => bk.reverse_complement(),
    };
    let in_nibble = edges.incoming(node.orient);
    let mut pairs = Vec::with_capacity(4);
    for base in 0..4u8 {
        if in_nibble & (1 << base) == 0 {
            continue;
        }
        let shifted = observed.prepend(base);
        let canon = shifted.canonical();
        let hkey = table.find(&canon);
        if hkey.is_some() {
            let orient = if shifted == canon {
                Orientation::Forward
            } else {
                Orientation::Reverse
            };
            pairs.push((dBNode { hkey, orient }, base));
        }
    }
    let (packed, count) = pack_bases(&pairs);
    let mut out = [None; 4];
    for (i, (n, _)) in pairs.iter().enumerate().take(4) {
        out[i] = Some(*n);
    }
    (out, packed, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_store::Direction;
    use crate::kmer::BinaryKmer;

    fn link(table: &KmerHashTable, store: &GraphStore, a: &str, b: &str, k: usize) -> (HKey, HKey) {
        let ka = BinaryKmer::from_str(a, k).unwrap();
        let kb = BinaryKmer::from_str(b, k).unwrap();
        let mut inserted = false;
        let ha = table.find_or_insert(&ka, &mut inserted).unwrap();
        let hb = table.find_or_insert(&kb, &mut inserted).unwrap();
        let last = match b.as_bytes()[k - 1] {
            b'A' => 0,
            b'C' => 1,
            b'G' => 2,
            _ => 3,
        };
        let first = match a.as_bytes()[0] {
            b'A' => 0,
            b'C' => 1,
            b'G' => 2,
            _ => 3,
        };
        store.add_edge(ha, 0, Direction::Outgoing, last);
        store.add_edge(hb, 0, Direction::Incoming, first);
        (ha, hb)
    }

    #[test]
    fn caching_same_supernode_twice_reuses_entry() {
        let table = KmerHashTable::new(3, 64);
        let store = GraphStore::new(table.capacity(), 1);
        let (ha, hb) = link(&table, &store, "AAA", "AAC", 3);

        let mut cache = GraphCache::new(&table, &store);
        let id1 = cache.find_or_add_supernode(ha);
        let id2 = cache.find_or_add_supernode(hb);
        assert_eq!(id1, id2);
        assert_eq!(cache.num_supernodes(), 1);
    }

    #[test]
    fn path_records_steps_in_order() {
        let table = KmerHashTable::new(3, 64);
        let store = GraphStore::new(table.capacity(), 1);
        let (ha, hb) = link(&table, &store, "AAA", "AAC", 3);
        let (_hb2, hc) = link(&table, &store, "AAC", "ACA", 3);
        assert_eq!(hb, _hb2);

        let mut cache = GraphCache::new(&table, &store);
        let pathid = cache.new_path();
        cache.new_step(dBNode { hkey: ha, orient: Orientation::Forward }, pathid);
        let end = cache.new_step(dBNode { hkey: hc, orient: Orientation::Forward }, pathid);

        assert_eq!(cache.path(pathid).num_steps, 2);
        // Both steps land in the same supernode (ha, hb, hc all chain
        // together), so there's nothing strictly before the last step
        // other than the first step's own supernode contents.
        let mut nbuf = Vec::new();
        cache.fetch_path_nodes_before(end, &mut nbuf);
        assert!(!nbuf.is_empty());
    }
}

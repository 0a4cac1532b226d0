use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};

/// Caller-supplied opaque node/edge identity (`string` or `u64`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExternalId {
    Num(u64),
    Str(Arc<str>),
}

impl From<u64> for ExternalId {
    fn from(v: u64) -> Self {
        ExternalId::Num(v)
    }
}

impl From<&str> for ExternalId {
    fn from(v: &str) -> Self {
        ExternalId::Str(Arc::from(v))
    }
}

impl From<String> for ExternalId {
    fn from(v: String) -> Self {
        ExternalId::Str(Arc::from(v.as_str()))
    }
}

pub type NodeHandle = ExternalId;
pub type EdgeHandle = ExternalId;

/// Per-node attribute row: `(radius, r, g, b, selected, hovered)`.
pub type NodeAttributes = [f32; 6];
/// Per-edge attribute row: `(width, r, g, b, selected, hovered, curvature, reserved)`.
pub type EdgeAttributes = [f32; 8];

const DEFAULT_CAPACITY: u32 = 256;

fn initial_capacity(count: u32) -> u32 {
    (count.saturating_mul(2)).max(DEFAULT_CAPACITY)
}

fn grow(required: u32, current: u32) -> u32 {
    let mut cap = current.max(DEFAULT_CAPACITY);
    while cap < required {
        cap = cap.saturating_mul(2);
    }
    cap
}

/// Dense, slot-indexed CPU shadow of the graph plus ID<->slot maps.
///
/// Pre-allocated typed arrays sized to capacity, a free-slot list, and a
/// single source of truth the GPU side mirrors. Nodes/edges are freed only
/// by direct caller action (never implicitly, the way a dividing-cell
/// allocator would recycle a slot mid-simulation), so a simple immediate
/// free/allocate model is enough here.
pub struct GraphState {
    pub node_capacity: u32,
    pub node_high_water: u32,
    pub growth_enabled: bool,

    pub positions_x: Vec<f32>,
    pub positions_y: Vec<f32>,
    pub velocities_x: Vec<f32>,
    pub velocities_y: Vec<f32>,
    pub node_attributes: Vec<NodeAttributes>,
    pub node_depth: Vec<f32>,
    pub node_category: Vec<u8>,
    pub node_alive: Vec<bool>,

    node_id_map: HashMap<NodeHandle, u32>,
    node_slot_to_id: Vec<Option<NodeHandle>>,

    pub edge_capacity: u32,
    pub edge_count: u32,
    pub edge_sources: Vec<u32>,
    pub edge_targets: Vec<u32>,
    pub edge_attributes: Vec<EdgeAttributes>,
    pub edge_weight: Vec<f32>,
    pub edge_category: Vec<u8>,

    edge_id_map: HashMap<EdgeHandle, u32>,
    edge_slot_to_id: Vec<EdgeHandle>,

    /// Forward adjacency: for each node slot, the list of incident edge slots.
    adjacency: Vec<Vec<u32>>,
    /// Inverse adjacency: for each node slot, edges where it is the target.
    inverse_adjacency: Vec<Vec<u32>>,
}

impl GraphState {
    pub fn new(node_count_hint: u32, edge_count_hint: u32) -> Self {
        let node_capacity = initial_capacity(node_count_hint);
        let edge_capacity = initial_capacity(edge_count_hint);
        Self {
            node_capacity,
            node_high_water: 0,
            growth_enabled: true,
            positions_x: vec![0.0; node_capacity as usize],
            positions_y: vec![0.0; node_capacity as usize],
            velocities_x: vec![0.0; node_capacity as usize],
            velocities_y: vec![0.0; node_capacity as usize],
            node_attributes: vec![[0.0; 6]; node_capacity as usize],
            node_depth: vec![0.0; node_capacity as usize],
            node_category: vec![0; node_capacity as usize],
            node_alive: vec![false; node_capacity as usize],
            node_id_map: HashMap::new(),
            node_slot_to_id: vec![None; node_capacity as usize],
            edge_capacity,
            edge_count: 0,
            edge_sources: vec![0; edge_capacity as usize],
            edge_targets: vec![0; edge_capacity as usize],
            edge_attributes: vec![[0.0; 8]; edge_capacity as usize],
            edge_weight: vec![1.0; edge_capacity as usize],
            edge_category: vec![0; edge_capacity as usize],
            edge_id_map: HashMap::new(),
            edge_slot_to_id: Vec::new(),
            adjacency: vec![Vec::new(); node_capacity as usize],
            inverse_adjacency: vec![Vec::new(); node_capacity as usize],
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_id_map.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count as usize
    }

    pub fn node_slot(&self, id: &NodeHandle) -> Option<u32> {
        self.node_id_map.get(id).copied()
    }

    pub fn edge_slot(&self, id: &EdgeHandle) -> Option<u32> {
        self.edge_id_map.get(id).copied()
    }

    pub fn node_id_at(&self, slot: u32) -> Option<&NodeHandle> {
        self.node_slot_to_id.get(slot as usize).and_then(|o| o.as_ref())
    }

    pub fn edge_id_at(&self, slot: u32) -> Option<&EdgeHandle> {
        self.edge_slot_to_id.get(slot as usize)
    }

    /// Allocate the next never-used node slot, growing capacity if
    /// permitted. Freed slots are never handed back out here — a freed
    /// slot stays dead (zeroed, excluded from every pass) until the next
    /// `reload`/full rebuild of this `GraphState`; see spec.md §9, "Slot
    /// recycling vs. stability".
    pub fn allocate_node_slot(&mut self) -> EngineResult<u32> {
        if self.node_high_water >= self.node_capacity {
            if !self.growth_enabled {
                return Err(EngineError::CapacityExceeded {
                    requested: self.node_high_water + 1,
                    capacity: self.node_capacity,
                });
            }
            self.grow_node_capacity(self.node_high_water + 1);
        }
        let slot = self.node_high_water;
        self.node_high_water += 1;
        Ok(slot)
    }

    /// Insert a new node under `id`, allocating a slot for it.
    pub fn add_node(
        &mut self,
        id: NodeHandle,
        x: f32,
        y: f32,
        radius: f32,
        color: [f32; 3],
    ) -> EngineResult<u32> {
        if self.node_id_map.contains_key(&id) {
            return Err(EngineError::DuplicateId);
        }
        let slot = self.allocate_node_slot()?;
        let s = slot as usize;
        self.positions_x[s] = x;
        self.positions_y[s] = y;
        self.velocities_x[s] = 0.0;
        self.velocities_y[s] = 0.0;
        self.node_attributes[s] = [radius, color[0], color[1], color[2], 0.0, 0.0];
        self.node_depth[s] = 0.0;
        self.node_category[s] = 0;
        self.node_alive[s] = true;
        self.node_slot_to_id[s] = Some(id.clone());
        self.node_id_map.insert(id, slot);
        self.adjacency[s].clear();
        self.inverse_adjacency[s].clear();
        Ok(slot)
    }

    /// Zero a node's row and drop it from the ID map. The slot is not
    /// reused until the next `reload`/full rebuild of this `GraphState`
    /// (high-water is preserved).
    pub fn free_node_slot(&mut self, id: &NodeHandle) -> Option<u32> {
        let slot = self.node_id_map.remove(id)?;
        let s = slot as usize;
        self.positions_x[s] = 0.0;
        self.positions_y[s] = 0.0;
        self.velocities_x[s] = 0.0;
        self.velocities_y[s] = 0.0;
        self.node_attributes[s] = [0.0; 6];
        self.node_depth[s] = 0.0;
        self.node_alive[s] = false;
        self.node_slot_to_id[s] = None;
        Some(slot)
    }

    pub fn add_edge(
        &mut self,
        id: EdgeHandle,
        source: &NodeHandle,
        target: &NodeHandle,
        width: f32,
        color: [f32; 3],
        weight: f32,
        category: u8,
    ) -> EngineResult<u32> {
        if self.edge_id_map.contains_key(&id) {
            return Err(EngineError::DuplicateId);
        }
        let src_slot = self.node_slot(source).ok_or(EngineError::UnknownId)?;
        let tgt_slot = self.node_slot(target).ok_or(EngineError::UnknownId)?;

        if self.edge_count >= self.edge_capacity {
            self.grow_edge_capacity(self.edge_count + 1);
        }
        let slot = self.edge_count;
        let s = slot as usize;
        self.edge_sources[s] = src_slot;
        self.edge_targets[s] = tgt_slot;
        self.edge_attributes[s] = [width, color[0], color[1], color[2], 0.0, 0.0, 0.0, 0.0];
        self.edge_weight[s] = weight;
        self.edge_category[s] = category;
        self.edge_slot_to_id.push(id.clone());
        self.edge_id_map.insert(id, slot);
        self.edge_count += 1;
        self.add_edge_adjacency(slot, src_slot, tgt_slot);
        Ok(slot)
    }

    /// Swap-remove an edge, returning the slot that was moved into its
    /// place (if any) so the caller can rewrite that GPU row.
    pub fn free_edge_slot(&mut self, id: &EdgeHandle) -> Option<(u32, Option<u32>)> {
        let slot = self.edge_id_map.remove(id)?;
        let s = slot as usize;
        let src = self.edge_sources[s];
        let tgt = self.edge_targets[s];
        self.remove_edge_adjacency(slot, src, tgt);

        let last = self.edge_count - 1;
        let swapped_from = if slot != last {
            let l = last as usize;
            let moved_src = self.edge_sources[l];
            let moved_tgt = self.edge_targets[l];
            self.edge_sources[s] = moved_src;
            self.edge_targets[s] = moved_tgt;
            self.edge_attributes[s] = self.edge_attributes[l];
            self.edge_weight[s] = self.edge_weight[l];
            self.edge_category[s] = self.edge_category[l];

            let moved_id = self.edge_slot_to_id[l].clone();
            self.remove_edge_adjacency(last, moved_src, moved_tgt);
            self.add_edge_adjacency(slot, moved_src, moved_tgt);
            self.edge_id_map.insert(moved_id.clone(), slot);
            self.edge_slot_to_id[s] = moved_id;
            Some(last)
        } else {
            None
        };

        self.edge_slot_to_id.truncate(last as usize);
        self.edge_count = last;
        Some((slot, swapped_from))
    }

    pub fn add_edge_adjacency(&mut self, edge_slot: u32, src: u32, tgt: u32) {
        self.adjacency[src as usize].push(edge_slot);
        self.inverse_adjacency[tgt as usize].push(edge_slot);
    }

    pub fn remove_edge_adjacency(&mut self, edge_slot: u32, src: u32, tgt: u32) {
        if let Some(pos) = self.adjacency[src as usize].iter().position(|&e| e == edge_slot) {
            self.adjacency[src as usize].swap_remove(pos);
        }
        if let Some(pos) = self.inverse_adjacency[tgt as usize].iter().position(|&e| e == edge_slot) {
            self.inverse_adjacency[tgt as usize].swap_remove(pos);
        }
    }

    pub fn adjacency_of(&self, slot: u32) -> &[u32] {
        &self.adjacency[slot as usize]
    }

    pub fn inverse_adjacency_of(&self, slot: u32) -> &[u32] {
        &self.inverse_adjacency[slot as usize]
    }

    fn grow_node_capacity(&mut self, required: u32) {
        let new_capacity = grow(required, self.node_capacity);
        self.positions_x.resize(new_capacity as usize, 0.0);
        self.positions_y.resize(new_capacity as usize, 0.0);
        self.velocities_x.resize(new_capacity as usize, 0.0);
        self.velocities_y.resize(new_capacity as usize, 0.0);
        self.node_attributes.resize(new_capacity as usize, [0.0; 6]);
        self.node_depth.resize(new_capacity as usize, 0.0);
        self.node_category.resize(new_capacity as usize, 0);
        self.node_alive.resize(new_capacity as usize, false);
        self.node_slot_to_id.resize(new_capacity as usize, None);
        self.adjacency.resize(new_capacity as usize, Vec::new());
        self.inverse_adjacency.resize(new_capacity as usize, Vec::new());
        log::info!(
            "GraphState: grew node capacity {} -> {}",
            self.node_capacity,
            new_capacity
        );
        self.node_capacity = new_capacity;
    }

    fn grow_edge_capacity(&mut self, required: u32) {
        let new_capacity = grow(required, self.edge_capacity);
        self.edge_sources.resize(new_capacity as usize, 0);
        self.edge_targets.resize(new_capacity as usize, 0);
        self.edge_attributes.resize(new_capacity as usize, [0.0; 8]);
        self.edge_weight.resize(new_capacity as usize, 1.0);
        self.edge_category.resize(new_capacity as usize, 0);
        log::info!(
            "GraphState: grew edge capacity {} -> {}",
            self.edge_capacity,
            new_capacity
        );
        self.edge_capacity = new_capacity;
    }

    /// Produce `(offsets[node_high_water+1], targets[edge_count])` for the
    /// forward direction (source -> target), for algorithms that need
    /// O(1) "neighbors of node i".
    pub fn generate_forward_csr(&self) -> super::Csr {
        super::csr::build(
            self.node_high_water,
            self.edge_count,
            &self.edge_sources,
            &self.edge_targets,
        )
    }

    /// Same as `generate_forward_csr` but indexed by target (inverse CSR;
    /// "who points at node i").
    pub fn generate_inverse_csr(&self) -> super::Csr {
        super::csr::build(
            self.node_high_water,
            self.edge_count,
            &self.edge_targets,
            &self.edge_sources,
        )
    }

    /// Reset to an empty graph at the given capacity hints, used only by
    /// full `load()`/reload (the only path that truly recycles slots; see
    /// spec.md §9's "Slot recycling vs. stability" note).
    pub fn reload(&mut self, node_count_hint: u32, edge_count_hint: u32) {
        *self = Self::new(node_count_hint, edge_count_hint);
    }

    /// Recompute `node_depth` for hierarchical layouts: depth-from-root
    /// via each node's first inbound edge as its parent, propagated with
    /// the same fixed-point relaxation `RelativityAtlas::rebuild_hierarchy`
    /// uses on the GPU side (`algorithms/relativity_atlas.rs`), bounded by
    /// node count rather than requiring a topological order (arbitrary
    /// graphs, including cyclic ones, must still terminate). Non-hierarchical
    /// algorithms never call this, leaving every depth at 0 (spec's stated
    /// no-op for those backends).
    pub fn recompute_node_depths(&mut self) {
        let n = self.node_high_water as usize;
        if n == 0 {
            return;
        }
        const NO_PARENT: u32 = u32::MAX;
        let inverse = self.generate_inverse_csr();
        let mut parent = vec![NO_PARENT; n];
        for i in 0..n {
            if let Some(&p) = inverse.neighbors(i as u32).first() {
                if p != i as u32 {
                    parent[i] = p;
                }
            }
        }
        let mut depth = vec![0f32; n];
        for _ in 0..n.min(256) {
            let mut changed = false;
            for i in 0..n {
                let p = parent[i];
                if p != NO_PARENT {
                    let candidate = depth[p as usize] + 1.0;
                    if candidate > depth[i] {
                        depth[i] = candidate;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        self.node_depth[..n].copy_from_slice(&depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> NodeHandle {
        ExternalId::Num(n)
    }

    #[test]
    fn add_then_remove_restores_counts() {
        let mut g = GraphState::new(4, 4);
        g.add_node(id(1), 0.0, 0.0, 1.0, [1.0, 1.0, 1.0]).unwrap();
        g.add_node(id(2), 1.0, 0.0, 1.0, [1.0, 1.0, 1.0]).unwrap();
        assert_eq!(g.node_count(), 2);
        g.free_node_slot(&id(1));
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut g = GraphState::new(4, 4);
        g.add_node(id(1), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        let err = g.add_node(id(1), 0.0, 0.0, 1.0, [0.0; 3]).unwrap_err();
        assert_eq!(err, EngineError::DuplicateId);
    }

    #[test]
    fn unknown_edge_endpoint_is_unknown_id() {
        let mut g = GraphState::new(4, 4);
        g.add_node(id(1), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        let err = g
            .add_edge(id(100), &id(1), &id(2), 1.0, [0.0; 3], 1.0, 0)
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownId);
    }

    #[test]
    fn edge_swap_remove_preserves_endpoint_invariant() {
        let mut g = GraphState::new(4, 4);
        g.add_node(id(1), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        g.add_node(id(2), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        g.add_node(id(3), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        g.add_edge(id(10), &id(1), &id(2), 1.0, [0.0; 3], 1.0, 0).unwrap();
        g.add_edge(id(11), &id(2), &id(3), 1.0, [0.0; 3], 1.0, 0).unwrap();
        g.free_edge_slot(&id(10));
        assert_eq!(g.edge_count(), 1);
        // remaining edge still points at live node slots
        let n1 = g.node_slot(&id(2)).unwrap();
        let n2 = g.node_slot(&id(3)).unwrap();
        assert!(g.edge_sources[0] == n1 || g.edge_sources[0] == n2);
    }

    #[test]
    fn capacity_grows_geometrically() {
        let mut g = GraphState::new(1, 0);
        assert_eq!(g.node_capacity, 256);
        for i in 0..300u64 {
            g.add_node(id(i), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        }
        assert!(g.node_capacity >= 300);
        assert_eq!(g.node_count(), 300);
    }

    #[test]
    fn capacity_exceeded_when_growth_disabled() {
        let mut g = GraphState::new(1, 0);
        g.growth_enabled = false;
        g.node_capacity = 1;
        g.positions_x.resize(1, 0.0);
        g.positions_y.resize(1, 0.0);
        g.velocities_x.resize(1, 0.0);
        g.velocities_y.resize(1, 0.0);
        g.node_attributes.resize(1, [0.0; 6]);
        g.node_depth.resize(1, 0.0);
        g.node_category.resize(1, 0);
        g.node_alive.resize(1, false);
        g.node_slot_to_id.resize(1, None);
        g.adjacency.resize(1, Vec::new());
        g.inverse_adjacency.resize(1, Vec::new());

        g.add_node(id(1), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        let err = g.add_node(id(2), 0.0, 0.0, 1.0, [0.0; 3]).unwrap_err();
        assert_eq!(
            err,
            EngineError::CapacityExceeded {
                requested: 2,
                capacity: 1
            }
        );
    }
}

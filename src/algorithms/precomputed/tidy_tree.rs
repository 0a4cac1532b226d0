//! Tidy-tree layout: a non-overlapping tree
//! layout computed bottom-up from subtree widths, grounded in the classic
//! Reingold-Tilford shape (each internal node centered over its
//! children's combined width) simplified to a single pass without the
//! "thread" contour-merging step — acceptable for the node counts this
//! engine targets, and noted as a simplification in DESIGN.md.

use crate::config::TidyTreeConfig;
use crate::graph::GraphState;

const NO_PARENT: u32 = u32::MAX;

pub fn layout(graph: &GraphState, cfg: &TidyTreeConfig) -> Vec<[f32; 2]> {
    let n = graph.node_high_water as usize;
    let mut out = vec![[cfg.root_x, cfg.root_y]; n];
    if n == 0 {
        return out;
    }

    let csr = graph.generate_forward_csr();
    let mut parent = vec![NO_PARENT; n];
    let mut roots = Vec::new();
    for s in 0..n {
        if let Some(&edge) = graph.inverse_adjacency_of(s as u32).first() {
            parent[s] = graph.edge_sources[edge as usize];
        } else {
            roots.push(s as u32);
        }
    }
    if roots.is_empty() {
        roots.push(0);
    }

    // Bottom-up subtree width: post-order via explicit stack (the graph
    // may not be a perfect tree, but cycles are broken by `parent` only
    // ever pointing toward a single head edge).
    let mut width = vec![cfg.node_separation; n];
    let mut order = Vec::with_capacity(n);
    let mut visited = vec![false; n];
    for &r in &roots {
        post_order(&csr, r, &mut visited, &mut order);
    }
    for &node in &order {
        let children = csr.neighbors(node);
        if !children.is_empty() {
            let total: f32 = children.iter().map(|&c| width[c as usize]).sum();
            width[node as usize] = total.max(cfg.node_separation);
        }
    }

    // Top-down x/y assignment: each node centered over the span its
    // children occupy, depth driving y.
    fn assign(
        csr: &crate::graph::Csr,
        width: &[f32],
        cfg: &TidyTreeConfig,
        node: u32,
        center_x: f32,
        depth: u32,
        out: &mut [[f32; 2]],
    ) {
        out[node as usize] = [center_x, cfg.root_y + depth as f32 * cfg.level_separation];
        let children = csr.neighbors(node);
        if children.is_empty() {
            return;
        }
        let total_width: f32 = children.iter().map(|&c| width[c as usize]).sum();
        let mut cursor = center_x - total_width / 2.0;
        for &c in children {
            let w = width[c as usize];
            assign(csr, width, cfg, c, cursor + w / 2.0, depth + 1, out);
            cursor += w;
        }
    }

    let mut root_cursor = cfg.root_x - width.iter().sum::<f32>() / 2.0;
    for &r in &roots {
        let w = width[r as usize];
        assign(&csr, &width, cfg, r, root_cursor + w / 2.0, 0, &mut out);
        root_cursor += w;
    }
    out
}

fn post_order(csr: &crate::graph::Csr, node: u32, visited: &mut [bool], order: &mut Vec<u32>) {
    if visited[node as usize] {
        return;
    }
    visited[node as usize] = true;
    for &c in csr.neighbors(node) {
        post_order(csr, c, visited, order);
    }
    order.push(node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ExternalId, GraphState};

    #[test]
    fn children_of_same_parent_do_not_overlap() {
        let mut g = GraphState::new(4, 4);
        let root = g.add_node(ExternalId::Num(0), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        let a = g.add_node(ExternalId::Num(1), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        let b = g.add_node(ExternalId::Num(2), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        let _ = (root, a, b);
        g.add_edge(ExternalId::Num(10), &ExternalId::Num(0), &ExternalId::Num(1), 1.0, [0.0; 3], 1.0, 0)
            .unwrap();
        g.add_edge(ExternalId::Num(11), &ExternalId::Num(0), &ExternalId::Num(2), 1.0, [0.0; 3], 1.0, 0)
            .unwrap();
        let cfg = TidyTreeConfig::default();
        let out = layout(&g, &cfg);
        let dx = (out[a as usize][0] - out[b as usize][0]).abs();
        assert!(dx >= cfg.node_separation * 0.5);
    }
}

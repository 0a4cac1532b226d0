//! Codebase layout: nested circle-packing over the
//! repository -> directory -> file -> symbol hierarchy implied by
//! `node_category` and the forward CSR. Children are packed onto a ring
//! sized to fit their own radii side by side (a simplified approximation
//! of enclosing-circle packing, not Wang/Collins' exact algorithm — noted
//! in DESIGN.md) and each parent's radius grows to contain its children
//! plus its category's padding.

use crate::config::CodebaseConfig;
use crate::graph::GraphState;

const NO_PARENT: u32 = u32::MAX;

/// `node_category`: 0 = repository, 1 = directory, 2 = file, 3 = symbol.
fn padding_for(category: u8, cfg: &CodebaseConfig) -> f32 {
    match category {
        0 => cfg.repository_padding,
        1 => cfg.directory_padding,
        2 => cfg.file_padding,
        _ => 0.0,
    }
}

pub fn layout(graph: &GraphState, cfg: &CodebaseConfig) -> Vec<[f32; 2]> {
    let n = graph.node_high_water as usize;
    let mut out = vec![[0.0f32; 2]; n];
    if n == 0 {
        return out;
    }

    let csr = graph.generate_forward_csr();
    let mut roots = Vec::new();
    for s in 0..n {
        if graph.inverse_adjacency_of(s as u32).is_empty() {
            roots.push(s as u32);
        }
    }
    if roots.is_empty() {
        roots.push(0);
    }

    // Bottom-up radius: leaves get `symbol_radius`, internal nodes grow to
    // contain a ring of their children plus padding.
    let mut radius = vec![cfg.symbol_radius; n];
    let mut order = Vec::with_capacity(n);
    let mut visited = vec![false; n];
    for &r in &roots {
        post_order(&csr, r, &mut visited, &mut order);
    }
    for &node in &order {
        let children = csr.neighbors(node);
        if children.is_empty() {
            continue;
        }
        let child_radii: Vec<f32> = children.iter().map(|&c| radius[c as usize]).collect();
        let sum_diameters: f32 = child_radii.iter().map(|r| 2.0 * r).sum();
        let packed_radius = (sum_diameters / std::f32::consts::TAU).max(child_radii.iter().cloned().fold(0.0, f32::max));
        let category = graph.node_category[node as usize];
        radius[node as usize] = packed_radius + padding_for(category, cfg);
    }

    // Top-down placement: each node's children are placed evenly around
    // its own center at a distance that keeps their circles from
    // overlapping the parent's padding boundary.
    fn place(
        csr: &crate::graph::Csr,
        radius: &[f32],
        node: u32,
        center: [f32; 2],
        out: &mut [[f32; 2]],
    ) {
        out[node as usize] = center;
        let children = csr.neighbors(node);
        let k = children.len();
        if k == 0 {
            return;
        }
        let ring_radius = radius[node as usize] * 0.6;
        for (idx, &c) in children.iter().enumerate() {
            let angle = (idx as f32 / k as f32) * std::f32::consts::TAU;
            let child_center = [
                center[0] + angle.cos() * ring_radius,
                center[1] + angle.sin() * ring_radius,
            ];
            place(csr, radius, c, child_center, out);
        }
    }

    let mut cursor_x = 0.0f32;
    for &r in &roots {
        let rad = radius[r as usize];
        place(&csr, &radius, r, [cursor_x + rad, 0.0], &mut out);
        cursor_x += 2.0 * rad + cfg.repository_padding;
    }

    let _ = NO_PARENT;
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
    fn parent_radius_grows_with_children() {
        let mut g = GraphState::new(4, 4);
        g.add_node(ExternalId::Num(0), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
        for i in 1..6u64 {
            g.add_node(ExternalId::Num(i), 0.0, 0.0, 1.0, [0.0; 3]).unwrap();
            g.add_edge(
                ExternalId::Num(100 + i),
                &ExternalId::Num(0),
                &ExternalId::Num(i),
                1.0,
                [0.0; 3],
                1.0,
                0,
            )
            .unwrap();
        }
        let cfg = CodebaseConfig::default();
        let out = layout(&g, &cfg);
        assert_eq!(out.len(), 6);
        // children should not all collapse onto the parent's position
        let spread = out[1][0] != out[2][0] || out[1][1] != out[2][1];
        assert!(spread);
    }
}

//! CPU reference integrator: a headless-adapter-free
//! mirror of the per-tick math every WGSL kernel runs, so the engine's
//! invariants and end-to-end scenarios can be tested without a live GPU.
//!
//! This module is the CPU twin of [`crate::pipeline::SimulationPipeline`],
//! reading the exact same [`crate::config::ForceConfig`] and mirroring
//! each shader's arithmetic line for line (`shaders/repulsion_n2.wgsl`,
//! `shaders/repulsion_linlog.wgsl`, `shaders/repulsion_tfdp.wgsl`,
//! `shaders/springs.wgsl`, `shaders/integrate.wgsl`,
//! `shaders/collision_tiled.wgsl`).
//!
//! Barnes-Hut's CPU twin approximates the same O(N^2) physics as
//! [`AlgorithmKind::N2`] rather than re-deriving a Karras radix tree on
//! the CPU: the tree is an *approximation* of exact pairwise repulsion,
//! so substituting the exact form here preserves every property test
//! that only asserts bounded/converging motion, not bit-exact agreement
//! with the GPU tree traversal (noted in DESIGN.md).

use crate::algorithms::AlgorithmKind;
use crate::alpha::AlphaController;
use crate::config::{ForceConfig, GravityCurve};
use crate::graph::GraphState;

const DEPTH_SETTLING_SPREAD: f32 = 0.15;
const DEFAULT_RADIUS: f32 = 5.0;
const NO_PINNED_NODE: u32 = u32::MAX;

/// Runs one tick of the full clear -> repulsion -> springs -> integrate
/// -> collision pipeline directly against `graph`'s CPU shadow arrays, in
/// place, using plain `f32` math instead of GPU buffers. Used by the test
/// suite and by [`crate::facade::EngineFacade`]'s `Backend::Cpu` mode.
pub fn tick(graph: &mut GraphState, alpha: &mut AlphaController, config: &ForceConfig, algorithm: AlgorithmKind) {
    let n = graph.node_high_water as usize;
    if n == 0 {
        return;
    }

    alpha.tick();
    let a = alpha.alpha;
    let damping = alpha.effective_damping(config.velocity_decay);

    let mut forces = vec![[0.0f32; 2]; n];
    let handles_gravity = match algorithm {
        AlgorithmKind::RelativityAtlas => true,
        AlgorithmKind::LinLog => config.linlog.strong_gravity,
        _ => false,
    };

    if matches!(
        algorithm,
        AlgorithmKind::RelativityAtlas | AlgorithmKind::TidyTree | AlgorithmKind::Community | AlgorithmKind::Codebase
    ) {
        graph.recompute_node_depths();
    }

    match algorithm {
        AlgorithmKind::N2 | AlgorithmKind::BarnesHut => repulsion_n2(graph, &mut forces, config, n),
        AlgorithmKind::LinLog => repulsion_linlog(graph, &mut forces, config, n),
        AlgorithmKind::TFdp => repulsion_tfdp(graph, &mut forces, config, n),
        AlgorithmKind::RelativityAtlas => repulsion_relativity_atlas(graph, &mut forces, config, n),
        AlgorithmKind::TidyTree | AlgorithmKind::Community | AlgorithmKind::Codebase => {
            spring_to_target(graph, &mut forces, config, algorithm, n)
        }
    }

    if !algorithm.is_precomputed() {
        apply_springs(graph, &mut forces, config);
    }

    let gravity_strength = if handles_gravity { 0.0 } else { config.center_strength };
    integrate(graph, &forces, config, a, damping, gravity_strength, n);

    if config.collision_enabled {
        apply_collision_tiled(graph, config, n);
    }
}

fn dist_dir(dx: f32, dy: f32, min_dist: f32) -> (f32, f32, f32) {
    let d = (dx * dx + dy * dy).sqrt().max(min_dist);
    (dx / d, dy / d, d)
}

/// Mirrors `shaders/repulsion_n2.wgsl`.
fn repulsion_n2(graph: &GraphState, forces: &mut [[f32; 2]], config: &ForceConfig, n: usize) {
    for i in 0..n {
        if !graph.node_alive[i] {
            continue;
        }
        let (xi, yi) = (graph.positions_x[i], graph.positions_y[i]);
        let mut accum = [0.0f32; 2];
        for j in 0..n {
            if i == j || !graph.node_alive[j] {
                continue;
            }
            let dx = xi - graph.positions_x[j];
            let dy = yi - graph.positions_y[j];
            let raw_dist = (dx * dx + dy * dy).sqrt();
            if raw_dist > config.repulsion_distance_max {
                continue;
            }
            let (ux, uy, d) = dist_dir(dx, dy, config.repulsion_distance_min);
            let mag = config.repulsion_strength / (d * d);
            accum[0] += ux * mag;
            accum[1] += uy * mag;
        }
        forces[i][0] += accum[0];
        forces[i][1] += accum[1];
    }
}

/// Mirrors `shaders/repulsion_linlog.wgsl`.
fn repulsion_linlog(graph: &GraphState, forces: &mut [[f32; 2]], config: &ForceConfig, n: usize) {
    let cfg = &config.linlog;
    for i in 0..n {
        if !graph.node_alive[i] {
            continue;
        }
        let (xi, yi) = (graph.positions_x[i], graph.positions_y[i]);
        let mut accum = [0.0f32; 2];
        for j in 0..n {
            if i == j || !graph.node_alive[j] {
                continue;
            }
            let dx = xi - graph.positions_x[j];
            let dy = yi - graph.positions_y[j];
            let (ux, uy, d) = dist_dir(dx, dy, 0.01);
            let mag = cfg.repulsion_k / d;
            accum[0] += ux * mag;
            accum[1] += uy * mag;
        }
        if cfg.strong_gravity {
            accum[0] -= (xi - config.center_x) * cfg.gravity_strength;
            accum[1] -= (yi - config.center_y) * cfg.gravity_strength;
        }
        forces[i][0] += accum[0];
        forces[i][1] += accum[1];
    }
}

/// Mirrors `shaders/repulsion_tfdp.wgsl`.
fn repulsion_tfdp(graph: &GraphState, forces: &mut [[f32; 2]], config: &ForceConfig, n: usize) {
    let cfg = &config.t_fdp;
    for i in 0..n {
        if !graph.node_alive[i] {
            continue;
        }
        let (xi, yi) = (graph.positions_x[i], graph.positions_y[i]);
        let mut accum = [0.0f32; 2];
        for j in 0..n {
            if i == j || !graph.node_alive[j] {
                continue;
            }
            let dx = xi - graph.positions_x[j];
            let dy = yi - graph.positions_y[j];
            let (ux, uy, d) = dist_dir(dx, dy, 0.01);
            let mag = cfg.gamma * cfg.alpha / d.powf(1.0 + cfg.beta);
            accum[0] += ux * mag;
            accum[1] += uy * mag;
        }
        forces[i][0] += accum[0];
        forces[i][1] += accum[1];
    }
}

/// Simplified CPU twin of `shaders/repulsion_relativity_atlas.wgsl`:
/// parent-child orbit spring (toward `sqrt(sibling_count) * orbit_radius`)
/// plus tangential sibling repulsion and subtree-mass-weighted gravity.
/// Cousin repulsion, the phantom-zone collision margin, and the
/// density-field term are intentionally not reproduced here — they are
/// optional refinements (default-disabled in [`crate::config::RelativityAtlasConfig`])
/// layered on top of this core, and the CPU reference only needs to back
/// property tests over the always-on forces (noted in DESIGN.md).
fn repulsion_relativity_atlas(graph: &GraphState, forces: &mut [[f32; 2]], config: &ForceConfig, n: usize) {
    let cfg = &config.relativity;
    let csr = graph.generate_inverse_csr();

    // parent[i] = the node with an edge pointing at i, if any (first wins).
    let mut parent = vec![NO_PINNED_NODE; n];
    for i in 0..n {
        if let Some(&p) = csr.neighbors(i as u32).first() {
            parent[i] = p;
        }
    }

    // subtree mass, bottom-up: process in reverse high-water order is not
    // topologically safe for arbitrary graphs, so accumulate iteratively
    // until stable (bounded by node count).
    let mut mass = vec![cfg.base_mass; n];
    for _ in 0..4 {
        let snapshot = mass.clone();
        for i in 0..n {
            let p = parent[i];
            if p != NO_PINNED_NODE {
                mass[p as usize] += cfg.child_mass_factor * snapshot[i];
            }
        }
    }

    let mut sibling_count = vec![0u32; n];
    for i in 0..n {
        let p = parent[i];
        if p != NO_PINNED_NODE {
            sibling_count[p as usize] += 1;
        }
    }

    for i in 0..n {
        if !graph.node_alive[i] {
            continue;
        }
        let (xi, yi) = (graph.positions_x[i], graph.positions_y[i]);
        let mut accum = [0.0f32; 2];

        let p = parent[i];
        if p != NO_PINNED_NODE {
            let pu = p as usize;
            let dx = xi - graph.positions_x[pu];
            let dy = yi - graph.positions_y[pu];
            let (ux, uy, d) = dist_dir(dx, dy, 0.01);
            let target = (sibling_count[pu].max(1) as f32).sqrt() * cfg.orbit_radius;
            let spring = (target - d) * (1.0 - cfg.orbit_spring_damping);
            accum[0] += ux * spring;
            accum[1] += uy * spring;
            accum[0] -= uy * spring * cfg.tangential_multiplier * 0.1;
            accum[1] += ux * spring * cfg.tangential_multiplier * 0.1;

            for j in 0..n {
                if j == i || parent[j] != p {
                    continue;
                }
                let dxj = xi - graph.positions_x[j];
                let dyj = yi - graph.positions_y[j];
                let (uxj, uyj, dj) = dist_dir(dxj, dyj, 0.01);
                let mag = cfg.sibling_spread * cfg.orbit_radius / (dj * dj);
                accum[0] += uxj * mag;
                accum[1] += uyj * mag;
            }
        }

        let to_center = (config.center_x - xi, config.center_y - yi);
        let d = (to_center.0 * to_center.0 + to_center.1 * to_center.1).sqrt().max(0.01);
        let curve = match cfg.gravity_curve {
            GravityCurve::Linear => d,
            GravityCurve::Inverse => 1.0 / d,
            GravityCurve::Soft => d.sqrt(),
            GravityCurve::Custom(exp) => d.powf(exp),
        };
        let g = cfg.gravity_strength * mass[i] * curve / d;
        accum[0] += to_center.0 * g;
        accum[1] += to_center.1 * g;

        forces[i][0] += accum[0];
        forces[i][1] += accum[1];
    }
}

/// CPU twin of `shaders/spring_to_target.wgsl`, backed by the same
/// per-kind CPU layout function the GPU path uploads as its target
/// buffer ("Precomputed layouts").
fn spring_to_target(graph: &GraphState, forces: &mut [[f32; 2]], config: &ForceConfig, algorithm: AlgorithmKind, n: usize) {
    use crate::algorithms::precomputed::{codebase_layout, community_layout, tidy_tree_layout};
    let (targets, stiffness, damping) = match algorithm {
        AlgorithmKind::TidyTree => (
            tidy_tree_layout(graph, &config.tidy_tree),
            config.tidy_tree.spring_to_target_stiffness,
            config.tidy_tree.spring_to_target_damping,
        ),
        AlgorithmKind::Community => (
            community_layout(graph, &config.community),
            config.community.spring_to_target_stiffness,
            config.community.spring_to_target_damping,
        ),
        AlgorithmKind::Codebase => (
            codebase_layout(graph, &config.codebase),
            config.codebase.spring_to_target_stiffness,
            config.codebase.spring_to_target_damping,
        ),
        _ => unreachable!("spring_to_target only called for precomputed kinds"),
    };
    for i in 0..n.min(targets.len()) {
        if !graph.node_alive[i] {
            continue;
        }
        let dx = targets[i][0] - graph.positions_x[i];
        let dy = targets[i][1] - graph.positions_y[i];
        forces[i][0] += dx * stiffness * damping;
        forces[i][1] += dy * stiffness * damping;
    }
}

/// Mirrors `shaders/springs.wgsl`.
fn apply_springs(graph: &GraphState, forces: &mut [[f32; 2]], config: &ForceConfig) {
    for e in 0..graph.edge_count() {
        let src = graph.edge_sources[e] as usize;
        let tgt = graph.edge_targets[e] as usize;
        if src == tgt {
            continue;
        }
        let dx = graph.positions_x[tgt] - graph.positions_x[src];
        let dy = graph.positions_y[tgt] - graph.positions_y[src];
        let d = (dx * dx + dy * dy).sqrt().max(0.0001);
        let (ux, uy) = (dx / d, dy / d);
        let mag = config.spring_strength * (d - config.spring_length);
        forces[src][0] += ux * mag;
        forces[src][1] += uy * mag;
        forces[tgt][0] -= ux * mag;
        forces[tgt][1] -= uy * mag;
    }
}

/// Mirrors `shaders/integrate.wgsl`, writing the result back into
/// `graph`'s `positions_x/y`/`velocities_x/y` in place (the CPU twin has
/// no ping-pong buffers to swap — `positions_x/y` always holds "current").
fn integrate(
    graph: &mut GraphState,
    forces: &[[f32; 2]],
    config: &ForceConfig,
    alpha: f32,
    damping: f32,
    gravity_strength: f32,
    n: usize,
) {
    let pinned = config.pinned_node.unwrap_or(NO_PINNED_NODE);
    for i in 0..n {
        if !graph.node_alive[i] {
            continue;
        }
        if i as u32 == pinned {
            graph.velocities_x[i] = 0.0;
            graph.velocities_y[i] = 0.0;
            continue;
        }
        let to_center = (config.center_x - graph.positions_x[i], config.center_y - graph.positions_y[i]);
        let ax = forces[i][0] + to_center.0 * gravity_strength;
        let ay = forces[i][1] + to_center.1 * gravity_strength;
        let depth_factor = 1.0 + graph.node_depth[i] * DEPTH_SETTLING_SPREAD;

        let mut vx = graph.velocities_x[i] + ax * (alpha * config.time_step * depth_factor);
        let mut vy = graph.velocities_y[i] + ay * (alpha * config.time_step * depth_factor);
        vx *= damping;
        vy *= damping;
        let speed = (vx * vx + vy * vy).sqrt();
        if speed > config.max_velocity {
            let scale = config.max_velocity / speed;
            vx *= scale;
            vy *= scale;
        }
        graph.velocities_x[i] = vx;
        graph.velocities_y[i] = vy;
        graph.positions_x[i] += vx * config.time_step;
        graph.positions_y[i] += vy * config.time_step;
    }
}

/// Mirrors `shaders/collision_tiled.wgsl`, including its per-iteration
/// `storageBarrier()` semantics (each iteration here reads the
/// already-corrected positions from the previous iteration, matching the
/// GPU pass's implicit write-then-barrier-then-read-again loop).
fn apply_collision_tiled(graph: &mut GraphState, config: &ForceConfig, n: usize) {
    let radius_of = |attrs: &[f32; 6]| -> f32 {
        if attrs[0] > 0.0 {
            attrs[0]
        } else {
            DEFAULT_RADIUS
        }
    };
    for _pass in 0..config.collision_iterations {
        let snapshot_x = graph.positions_x.clone();
        let snapshot_y = graph.positions_y.clone();
        for i in 0..n {
            if !graph.node_alive[i] {
                continue;
            }
            let ri = radius_of(&graph.node_attributes[i]) * config.collision_radius_multiplier;
            let mut px = snapshot_x[i];
            let mut py = snapshot_y[i];
            // At most one tie-break nudge per node per pass: applying it
            // once (not once per exactly-coincident neighbor) keeps the
            // displacement bounded regardless of cluster size.
            let mut nudged = false;
            for j in 0..n {
                if j == i || !graph.node_alive[j] {
                    continue;
                }
                let rj = radius_of(&graph.node_attributes[j]) * config.collision_radius_multiplier;
                let dx = px - snapshot_x[j];
                let dy = py - snapshot_y[j];
                let dist = (dx * dx + dy * dy).sqrt();
                let min_dist = ri + rj;
                if dist < min_dist && dist > 0.0001 {
                    let push = (min_dist - dist) * 0.5 * config.collision_strength;
                    px += (dx / dist) * push;
                    py += (dy / dist) * push;
                } else if dist <= 0.0001 && !nudged {
                    // Exactly-coincident tie-break: scatter onto a
                    // phyllotaxis spiral keyed by node index so an
                    // arbitrarily large coincident cluster spreads onto
                    // distinct rays at distinct radii (angle alone repeats
                    // near-collisions at Fibonacci-spaced indices).
                    let golden_angle = std::f32::consts::PI * (3.0 - 5f32.sqrt());
                    let angle = i as f32 * golden_angle;
                    let radius = min_dist * (0.5 + (i as f32).sqrt());
                    px += angle.cos() * radius;
                    py += angle.sin() * radius;
                    nudged = true;
                }
            }
            graph.positions_x[i] = px;
            graph.positions_y[i] = py;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ExternalId;

    fn id(n: u64) -> ExternalId {
        ExternalId::Num(n)
    }

    #[test]
    fn empty_graph_tick_is_noop() {
        let mut g = GraphState::new(0, 0);
        let mut alpha = AlphaController::default();
        let config = ForceConfig::default();
        tick(&mut g, &mut alpha, &config, AlgorithmKind::N2);
        assert_eq!(alpha.tick_count, 0);
    }

    #[test]
    fn two_node_spring_converges_to_rest_length() {
        let mut g = GraphState::new(2, 1);
        g.add_node(id(1), -100.0, 0.0, 1.0, [0.0; 3]).unwrap();
        g.add_node(id(2), 100.0, 0.0, 1.0, [0.0; 3]).unwrap();
        g.add_edge(id(10), &id(1), &id(2), 1.0, [0.0; 3], 1.0, 0).unwrap();

        let mut config = ForceConfig::default();
        config.spring_strength = 0.5;
        config.spring_length = 20.0;
        config.center_strength = 0.0;
        config.repulsion_strength = 0.0;
        config.velocity_decay = 0.2;
        config.time_step = 1.0;
        config.collision_enabled = false;
        let mut alpha = AlphaController::default();
        alpha.alpha = 1.0;
        alpha.alpha_decay = 0.0;

        for _ in 0..200 {
            tick(&mut g, &mut alpha, &config, AlgorithmKind::N2);
        }
        let dx = g.positions_x[0] - g.positions_x[1];
        let dy = g.positions_y[0] - g.positions_y[1];
        let dist = (dx * dx + dy * dy).sqrt();
        assert!((19.0..=21.0).contains(&dist), "dist={dist}");
    }

    #[test]
    fn pinned_node_position_is_exact() {
        let mut g = GraphState::new(2, 0);
        g.add_node(id(1), 5.0, 5.0, 1.0, [0.0; 3]).unwrap();
        g.add_node(id(2), -5.0, -5.0, 1.0, [0.0; 3]).unwrap();
        let mut config = ForceConfig::default();
        config.pinned_node = Some(0);
        let mut alpha = AlphaController::default();
        alpha.alpha = 1.0;

        for _ in 0..1000 {
            tick(&mut g, &mut alpha, &config, AlgorithmKind::N2);
        }
        assert_eq!(g.positions_x[0], 5.0);
        assert_eq!(g.positions_y[0], 5.0);
    }

    #[test]
    fn collision_separates_coincident_nodes() {
        let mut g = GraphState::new(100, 0);
        for i in 0..100u64 {
            g.add_node(id(i), 0.0, 0.0, 5.0, [0.0; 3]).unwrap();
        }
        let mut config = ForceConfig::default();
        config.repulsion_strength = 0.0;
        config.spring_strength = 0.0;
        config.center_strength = 0.0;
        config.collision_radius_multiplier = 1.0;
        config.collision_strength = 1.0;
        config.collision_iterations = 4;
        config.max_velocity = 0.0;
        let mut alpha = AlphaController::default();
        alpha.alpha = 0.0;

        apply_collision_tiled(&mut g, &config, 100);

        for i in 0..100 {
            for j in (i + 1)..100 {
                let dx = g.positions_x[i] - g.positions_x[j];
                let dy = g.positions_y[i] - g.positions_y[j];
                let dist = (dx * dx + dy * dy).sqrt();
                assert!(dist >= 9.0, "pair ({i},{j}) too close: {dist}");
            }
        }
    }

    #[test]
    fn single_node_centers_over_time() {
        let mut g = GraphState::new(1, 0);
        g.add_node(id(1), 100.0, 0.0, 1.0, [0.0; 3]).unwrap();
        let mut config = ForceConfig::default();
        config.center_strength = 0.05;
        config.velocity_decay = 0.3;
        let mut alpha = AlphaController::default();
        alpha.alpha = 1.0;
        alpha.alpha_decay = 0.0;

        let start = g.positions_x[0].abs();
        for _ in 0..300 {
            tick(&mut g, &mut alpha, &config, AlgorithmKind::N2);
        }
        assert!(g.positions_x[0].abs() < start);
    }
}

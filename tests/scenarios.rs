//! End-to-end scenarios S1-S6, run against the CPU
//! reference integrator ([`forcegraph::cpu`]) via [`forcegraph::EngineFacade`]
//! in `Backend::Cpu` mode, since a headless test runner has no live GPU
//! adapter to drive the WGSL path.

use forcegraph::{Backend, EdgeInput, EngineFacade, ExternalId, ForceConfigPatch, GraphInput, NodeInput};

fn node(id: u64, x: f32, y: f32) -> NodeInput {
    NodeInput {
        id: Some(forcegraph::input::IdSpec::Num(id)),
        x: Some(x),
        y: Some(y),
        ..Default::default()
    }
}

fn node_with_radius(id: u64, x: f32, y: f32, radius: f32) -> NodeInput {
    NodeInput {
        id: Some(forcegraph::input::IdSpec::Num(id)),
        x: Some(x),
        y: Some(y),
        radius: Some(radius),
        ..Default::default()
    }
}

fn dist(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// S1: two-node spring settles to within [19, 21] of rest length 20.
#[test]
fn s1_two_node_spring_settles_near_rest_length() {
    let mut engine = EngineFacade::new(Backend::Cpu).unwrap();
    engine
        .load(GraphInput {
            nodes: vec![node(1, -100.0, 0.0), node(2, 100.0, 0.0)],
            edges: vec![EdgeInput {
                source: forcegraph::input::IdSpec::Num(1),
                target: forcegraph::input::IdSpec::Num(2),
                width: None,
                color: None,
                weight: None,
                edge_type: None,
            }],
        })
        .unwrap();

    engine.set_force_config(ForceConfigPatch {
        spring_strength: Some(0.5),
        spring_length: Some(20.0),
        center_strength: Some(0.0),
        repulsion_strength: Some(0.0),
        velocity_decay: Some(0.2),
        time_step: Some(1.0),
        collision_enabled: Some(false),
        ..Default::default()
    });
    engine.start();

    for _ in 0..200 {
        engine.tick().unwrap();
    }

    let a = engine.node_position(&ExternalId::Num(1)).unwrap();
    let b = engine.node_position(&ExternalId::Num(2)).unwrap();
    let d = dist(a, b);
    assert!((19.0..=21.0).contains(&d), "distance {d} outside [19, 21]");
}

/// S2: three-node triangle under pure repulsion expands monotonically
/// while staying congruent (equilateral distances evolve together).
#[test]
fn s2_triangle_charge_only_expands_and_stays_congruent() {
    let mut engine = EngineFacade::new(Backend::Cpu).unwrap();
    engine
        .load(GraphInput {
            nodes: vec![node(1, 0.0, 0.0), node(2, 1.0, 0.0), node(3, 0.0, 1.0)],
            edges: vec![],
        })
        .unwrap();
    engine.set_force_config(ForceConfigPatch {
        repulsion_strength: Some(-1000.0),
        center_strength: Some(0.0),
        collision_enabled: Some(false),
        ..Default::default()
    });
    engine.start();

    let mut last_d01 = 1.0_f32;
    for _ in 0..50 {
        engine.tick().unwrap();
        let a = engine.node_position(&ExternalId::Num(1)).unwrap();
        let b = engine.node_position(&ExternalId::Num(2)).unwrap();
        let d = dist(a, b);
        assert!(d >= last_d01 - 1e-4, "distance shrank: {d} < {last_d01}");
        last_d01 = d;
    }
    assert!(last_d01 > 1.0, "triangle never expanded");
}

/// S3: 100 coincident nodes separate to >= ~10 units apart after one tick
/// of collision resolution with all other forces zeroed.
#[test]
fn s3_coincident_nodes_separate_after_one_collision_tick() {
    let mut engine = EngineFacade::new(Backend::Cpu).unwrap();
    let nodes: Vec<NodeInput> = (0..100).map(|i| node_with_radius(i, 0.0, 0.0, 5.0)).collect();
    engine.load(GraphInput { nodes, edges: vec![] }).unwrap();
    engine.set_force_config(ForceConfigPatch {
        repulsion_strength: Some(0.0),
        spring_strength: Some(0.0),
        center_strength: Some(0.0),
        collision_enabled: Some(true),
        collision_strength: Some(1.0),
        collision_iterations: Some(4),
        max_velocity: Some(0.0),
        ..Default::default()
    });
    engine.start();
    engine.tick().unwrap();

    let positions: Vec<(f32, f32)> = (0..100)
        .map(|i| engine.node_position(&ExternalId::Num(i)).unwrap())
        .collect();
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            let d = dist(positions[i], positions[j]);
            assert!(d >= 9.0, "pair ({i},{j}) only {d} apart");
        }
    }
}

/// S4: incrementally adding a node to a 1000-node graph doesn't disturb
/// existing positions beyond the bound implied by max_velocity, and the
/// new node has moved under repulsion.
#[test]
fn s4_incremental_add_keeps_existing_positions_bounded() {
    let mut engine = EngineFacade::new(Backend::Cpu).unwrap();
    let nodes: Vec<NodeInput> = (0..1000)
        .map(|i| {
            let t = i as f32 * 0.3737;
            node(i, t.cos() * 200.0, t.sin() * 200.0)
        })
        .collect();
    engine.load(GraphInput { nodes, edges: vec![] }).unwrap();
    engine.start();
    for _ in 0..10 {
        engine.tick().unwrap();
    }

    let before: Vec<(f32, f32)> = (0..1000)
        .map(|i| engine.node_position(&ExternalId::Num(i)).unwrap())
        .collect();

    let new_id = ExternalId::Num(1000);
    engine.add_node(new_id.clone(), NodeInput { x: Some(0.0), y: Some(0.0), ..Default::default() }).unwrap();
    let new_start = engine.node_position(&new_id).unwrap();

    for _ in 0..10 {
        engine.tick().unwrap();
    }

    assert_eq!(engine.node_count(), 1001);

    let new_end = engine.node_position(&new_id).unwrap();
    assert!(dist(new_start, new_end) >= 1.0, "new node barely moved: {new_start:?} -> {new_end:?}");

    let max_velocity = engine.force_config().max_velocity;
    for i in 0..1000u64 {
        let after = engine.node_position(&ExternalId::Num(i)).unwrap();
        let moved = dist(before[i as usize], after);
        assert!(moved <= max_velocity * 10.0 + 1.0, "node {i} moved too far: {moved}");
    }
}

/// S5: switching N2 -> Barnes-Hut after 100 ticks each keeps position
/// norms bounded and reports the new algorithm id.
#[test]
fn s5_algorithm_switch_keeps_positions_bounded() {
    let mut engine = EngineFacade::new(Backend::Cpu).unwrap();
    let nodes: Vec<NodeInput> = (0..2000)
        .map(|i| {
            let t = i as f32 * 0.618;
            node(i, t.cos() * 300.0, t.sin() * 300.0)
        })
        .collect();
    engine.load(GraphInput { nodes, edges: vec![] }).unwrap();
    engine.start();

    for _ in 0..100 {
        engine.tick().unwrap();
    }
    engine.set_force_algorithm("barnes-hut").unwrap();
    assert_eq!(engine.active_algorithm().name(), "barnes-hut");

    for _ in 0..100 {
        engine.tick().unwrap();
    }

    for i in 0..2000u64 {
        let (x, y) = engine.node_position(&ExternalId::Num(i)).unwrap();
        assert!(x.is_finite() && y.is_finite(), "node {i} diverged to non-finite");
        assert!((x * x + y * y).sqrt() < 1.0e6, "node {i} diverged: ({x}, {y})");
    }
}

/// S6: a pinned node holds its exact position across 1000 ticks of an
/// otherwise-active simulation.
#[test]
fn s6_pinned_node_position_is_exact_across_many_ticks() {
    let mut engine = EngineFacade::new(Backend::Cpu).unwrap();
    let nodes: Vec<NodeInput> = (0..50)
        .map(|i| {
            let t = i as f32 * 1.37;
            node(i, t.cos() * 100.0, t.sin() * 100.0)
        })
        .collect();
    engine.load(GraphInput { nodes, edges: vec![] }).unwrap();

    let pin_id = ExternalId::Num(0);
    let pinned_at = engine.node_position(&pin_id).unwrap();
    engine.pin_node(&pin_id).unwrap();
    engine.start();

    for _ in 0..1000 {
        engine.tick().unwrap();
    }

    assert_eq!(engine.node_position(&pin_id), Some(pinned_at));
}

//! EngineFacade (C7): the public entry point. Coordinates GraphState,
//! BufferSet, AlphaController, the AlgorithmRegistry, CollisionResolver
//! (via SimulationPipeline), and the event bus behind one `&mut self` API.
//!
//! A single owning struct that holds the device/queue plus every GPU
//! resource and exposes `update`/mutation methods, behind two selectable
//! backends ([`Backend::Gpu`], [`Backend::Cpu`]) so this crate can also
//! run headless in CI.

use crate::algorithms::{AlgorithmKind, AlgorithmRegistry};
use crate::alpha::AlphaController;
use crate::buffers::BufferSet;
use crate::config::{ForceConfig, ForceConfigPatch};
use crate::cpu;
use crate::error::{EngineError, EngineResult};
use crate::events::{DragPhase, EngineEvent, EngineEventKind, EventBus, HoverPhase};
use crate::graph::{EdgeHandle, ExternalId, GraphState, NodeHandle};
use crate::input::{ColorSpec, EdgeInput, GraphInput, IdSpec, NodeInput, TypedGraphInput};
use crate::pipeline::SimulationPipeline;

/// Reheat magnitudes used by mutation calls ("alpha bump
/// (0.05-0.2 depending on magnitude)"/"bump alpha >= 0.3"/">= 0.5").
mod reheat {
    pub const SINGLE_MUTATION: f32 = 0.1;
    pub const BATCH_MUTATION: f32 = 0.2;
    pub const DRAG_OR_CONFIG: f32 = 0.3;
    pub const ALGORITHM_SWITCH: f32 = 0.5;
}

/// Selects whether [`EngineFacade`] drives the real GPU compute pipeline
/// or the headless [`crate::cpu`] reference integrator. `Cpu` is the
/// graceful-degradation path when no compute-capable adapter is available
/// and the caller opts in, not a silent fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Gpu,
    Cpu,
}

struct GpuState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: BufferSet,
    registry: AlgorithmRegistry,
    pipeline: SimulationPipeline,
}

/// Per-call outcome for batch mutation APIs: returned count plus a
/// per-item `Option`.
pub struct BatchResult<T> {
    pub succeeded: usize,
    pub results: Vec<Option<T>>,
}

/// Public entry point. Owns [`GraphState`], the alpha controller,
/// the active [`ForceConfig`], and (in [`Backend::Gpu`] mode) every GPU
/// resource. A disposed facade ignores all subsequent mutation calls
/// (`EngineError::DisposedAccess`).
pub struct EngineFacade {
    graph: GraphState,
    alpha: AlphaController,
    config: ForceConfig,
    active_algorithm: AlgorithmKind,
    topology_dirty: bool,
    events: EventBus,
    disposed: bool,
    gpu: Option<GpuState>,
}

fn phyllotaxis_positions(n: usize) -> Vec<(f32, f32)> {
    // Sunflower-seed spiral: near-uniform density initial layout used
    // when the caller supplies no explicit x/y (`load`).
    let golden_angle = std::f32::consts::PI * (3.0 - 5f32.sqrt());
    let scale = (n as f32).sqrt() * 10.0;
    (0..n)
        .map(|i| {
            let r = scale * ((i as f32 + 0.5) / n as f32).sqrt();
            let theta = i as f32 * golden_angle;
            (r * theta.cos(), r * theta.sin())
        })
        .collect()
}

impl EngineFacade {
    /// Construct a new engine. `Backend::Gpu` acquires a compute-capable
    /// adapter/device (bubbling `UnsupportedPlatform`/`PipelineCompile`/
    /// `BufferAlloc` — construction errors bubble out of the factory);
    /// `Backend::Cpu` never touches `wgpu`.
    pub fn new(backend: Backend) -> EngineResult<Self> {
        let gpu = match backend {
            Backend::Cpu => None,
            Backend::Gpu => Some(Self::init_gpu(256)?),
        };
        Ok(Self {
            graph: GraphState::new(0, 0),
            alpha: AlphaController::default(),
            config: ForceConfig::default(),
            active_algorithm: AlgorithmKind::N2,
            topology_dirty: true,
            events: EventBus::new(),
            disposed: false,
            gpu,
        })
    }

    fn init_gpu(node_capacity: u32) -> EngineResult<GpuState> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(EngineError::UnsupportedPlatform)?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("forcegraph_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| EngineError::BufferAlloc(e.to_string()))?;

        let buffers = BufferSet::new(&device, node_capacity, node_capacity);
        let registry = AlgorithmRegistry::new(&device, node_capacity, node_capacity)?;
        let mut pipeline = SimulationPipeline::new(&device, node_capacity)?;
        pipeline.rebuild_bind_groups(&device, &buffers);

        Ok(GpuState { device, queue, buffers, registry, pipeline })
    }

    fn ensure_not_disposed(&self) -> EngineResult<()> {
        if self.disposed {
            Err(EngineError::DisposedAccess)
        } else {
            Ok(())
        }
    }

    // ---- graph load -----------------------------------------------------

    /// Parse `input`, reset the graph, assign phyllotaxis positions to any
    /// node missing explicit `x`/`y`, upload to the GPU (if active), reset
    /// alpha to 1. `fit-viewport` is a rendering-collaborator hook out of
    /// scope here.
    pub fn load(&mut self, input: GraphInput) -> EngineResult<()> {
        self.ensure_not_disposed()?;
        self.graph.reload(input.nodes.len() as u32, input.edges.len() as u32);

        let defaults = phyllotaxis_positions(input.nodes.len());
        for (i, node) in input.nodes.iter().enumerate() {
            let id: NodeHandle = node
                .id
                .as_ref()
                .map(ExternalId::from)
                .unwrap_or_else(|| ExternalId::Num(i as u64));
            let (default_x, default_y) = defaults[i];
            let x = node.x.unwrap_or(default_x);
            let y = node.y.unwrap_or(default_y);
            let radius = node.radius.unwrap_or(5.0);
            let color = node.color.as_ref().map(ColorSpec::to_rgb).unwrap_or([0.6, 0.6, 0.6]);
            let slot = self.graph.add_node(id, x, y, radius, color)?;
            if let Some(ty) = &node.node_type {
                self.graph.node_category[slot as usize] = category_tag(ty);
            }
        }

        for (i, edge) in input.edges.iter().enumerate() {
            let source: NodeHandle = ExternalId::from(&edge.source);
            let target: NodeHandle = ExternalId::from(&edge.target);
            let width = edge.width.unwrap_or(1.0);
            let color = edge.color.as_ref().map(ColorSpec::to_rgb).unwrap_or([0.5, 0.5, 0.5]);
            let weight = edge.weight.unwrap_or(1.0);
            let eid: EdgeHandle = ExternalId::Num(i as u64);
            self.graph.add_edge(eid, &source, &target, width, color, weight, 0)?;
        }

        self.topology_dirty = true;
        self.alpha.restart();

        if let Some(gpu) = &mut self.gpu {
            let node_capacity = self.graph.node_capacity.max(gpu.buffers.node_capacity);
            if node_capacity > gpu.buffers.node_capacity || self.graph.edge_capacity > gpu.buffers.edge_capacity {
                gpu.buffers.grow(&gpu.device, &gpu.queue, &self.graph);
                gpu.registry.resize_all(&gpu.device, gpu.buffers.node_capacity, gpu.buffers.edge_capacity);
                gpu.pipeline.resize(&gpu.device, gpu.buffers.node_capacity)?;
            }
            gpu.buffers.upload_all_positions(&gpu.queue, &self.graph);
            gpu.buffers.upload_edges(&gpu.queue, &self.graph);
            gpu.buffers.upload_node_flags(&gpu.queue, &self.graph);
            gpu.pipeline.rebuild_bind_groups(&gpu.device, &gpu.buffers);
            gpu.registry.rebuild_all_bind_groups(&gpu.device, &gpu.buffers);
        }

        self.events.emit(
            EngineEventKind::GraphLoad { node_count: self.graph.node_count(), edge_count: self.graph.edge_count() },
            self.alpha.tick_count,
        );
        Ok(())
    }

    /// Zero-copy-friendly columnar bulk load (the "typed" variant).
    /// `InvalidGraphData` surfaces the first column whose length doesn't
    /// match its declared count.
    pub fn load_typed(&mut self, input: TypedGraphInput) -> EngineResult<()> {
        input.validate().map_err(|(expected, actual)| EngineError::InvalidGraphData { expected, actual })?;
        let mut graph_input = GraphInput::default();
        for i in 0..input.node_count {
            graph_input.nodes.push(NodeInput {
                id: input.node_ids.get(i).cloned(),
                x: input.node_x.get(i).copied(),
                y: input.node_y.get(i).copied(),
                radius: input.node_radius.get(i).copied(),
                color: input.node_color.get(i).map(|c| ColorSpec::Rgb(*c)),
                ..Default::default()
            });
        }
        for i in 0..input.edge_count {
            let source = input.edge_sources.get(i).cloned().ok_or(EngineError::InvalidGraphData {
                expected: input.edge_count,
                actual: input.edge_sources.len(),
            })?;
            let target = input.edge_targets.get(i).cloned().ok_or(EngineError::InvalidGraphData {
                expected: input.edge_count,
                actual: input.edge_targets.len(),
            })?;
            graph_input.edges.push(EdgeInput {
                source,
                target,
                width: None,
                color: None,
                weight: input.edge_weight.get(i).copied(),
                edge_type: None,
            });
        }
        self.load(graph_input)
    }

    // ---- mutation ---------------------------------------------------

    pub fn add_node(&mut self, id: impl Into<NodeHandle>, node: NodeInput) -> EngineResult<u32> {
        self.ensure_not_disposed()?;
        let id = id.into();
        let defaults = phyllotaxis_positions(self.graph.node_count() + 1);
        let (default_x, default_y) = *defaults.last().unwrap();
        let x = node.x.unwrap_or(default_x);
        let y = node.y.unwrap_or(default_y);
        let radius = node.radius.unwrap_or(5.0);
        let color = node.color.as_ref().map(ColorSpec::to_rgb).unwrap_or([0.6, 0.6, 0.6]);
        let slot = self.graph.add_node(id.clone(), x, y, radius, color)?;
        self.topology_dirty = true;

        if let Some(gpu) = &mut self.gpu {
            if self.graph.node_high_water > gpu.buffers.node_capacity {
                gpu.buffers.grow(&gpu.device, &gpu.queue, &self.graph);
                gpu.registry.resize_all(&gpu.device, gpu.buffers.node_capacity, gpu.buffers.edge_capacity);
                gpu.pipeline.resize(&gpu.device, gpu.buffers.node_capacity)?;
                gpu.pipeline.rebuild_bind_groups(&gpu.device, &gpu.buffers);
                gpu.registry.rebuild_all_bind_groups(&gpu.device, &gpu.buffers);
            }
            let _ = gpu.buffers.write_position(&gpu.queue, slot, x, y);
            let _ = gpu.buffers.write_node_flag(&gpu.queue, slot, true);
        }

        self.alpha.bump(reheat::SINGLE_MUTATION);
        self.events.emit(EngineEventKind::NodeAdd { id }, self.alpha.tick_count);
        Ok(slot)
    }

    pub fn remove_node(&mut self, id: &NodeHandle) -> EngineResult<bool> {
        self.ensure_not_disposed()?;
        let Some(slot) = self.graph.node_slot(id) else {
            return Ok(false);
        };

        // Cascade: every edge incident to this node's slot must go too, or
        // it keeps pulling its surviving endpoint toward the zeroed row
        // left behind (spec §3/§8 invariant 1). Collect by id (not slot)
        // since `free_edge_slot`'s swap-remove can reshuffle edge slots as
        // we remove them one at a time.
        let mut incident: Vec<u32> = self.graph.adjacency_of(slot).to_vec();
        incident.extend(self.graph.inverse_adjacency_of(slot).iter().copied());
        incident.sort_unstable();
        incident.dedup();
        let incident_ids: Vec<EdgeHandle> =
            incident.into_iter().filter_map(|e| self.graph.edge_id_at(e).cloned()).collect();
        for edge_id in &incident_ids {
            self.graph.free_edge_slot(edge_id);
        }

        self.graph.free_node_slot(id);
        self.topology_dirty = true;
        if let Some(gpu) = &mut self.gpu {
            if !incident_ids.is_empty() {
                gpu.buffers.upload_edges(&gpu.queue, &self.graph);
            }
            let _ = gpu.buffers.write_node_flag(&gpu.queue, slot, false);
        }
        for edge_id in incident_ids {
            self.events.emit(EngineEventKind::EdgeRemove { id: edge_id }, self.alpha.tick_count);
        }
        self.alpha.bump(reheat::SINGLE_MUTATION);
        self.events.emit(EngineEventKind::NodeRemove { id: id.clone() }, self.alpha.tick_count);
        Ok(true)
    }

    pub fn add_edge(&mut self, id: impl Into<EdgeHandle>, edge: EdgeInput) -> EngineResult<u32> {
        self.ensure_not_disposed()?;
        let id = id.into();
        let source: NodeHandle = ExternalId::from(&edge.source);
        let target: NodeHandle = ExternalId::from(&edge.target);
        let width = edge.width.unwrap_or(1.0);
        let color = edge.color.as_ref().map(ColorSpec::to_rgb).unwrap_or([0.5, 0.5, 0.5]);
        let weight = edge.weight.unwrap_or(1.0);
        let slot = self.graph.add_edge(id.clone(), &source, &target, width, color, weight, 0)?;
        self.topology_dirty = true;

        if let Some(gpu) = &mut self.gpu {
            if self.graph.edge_count > gpu.buffers.edge_capacity {
                gpu.buffers.grow(&gpu.device, &gpu.queue, &self.graph);
                gpu.pipeline.rebuild_bind_groups(&gpu.device, &gpu.buffers);
                gpu.registry.rebuild_all_bind_groups(&gpu.device, &gpu.buffers);
            } else {
                gpu.buffers.upload_edges(&gpu.queue, &self.graph);
            }
        }
        let _ = slot;

        self.alpha.bump(reheat::SINGLE_MUTATION);
        self.events.emit(EngineEventKind::EdgeAdd { id }, self.alpha.tick_count);
        Ok(slot)
    }

    pub fn remove_edge(&mut self, id: &EdgeHandle) -> EngineResult<bool> {
        self.ensure_not_disposed()?;
        let Some((_slot, _swapped_from)) = self.graph.free_edge_slot(id) else {
            return Ok(false);
        };
        self.topology_dirty = true;
        if let Some(gpu) = &mut self.gpu {
            gpu.buffers.upload_edges(&gpu.queue, &self.graph);
        }
        self.alpha.bump(reheat::SINGLE_MUTATION);
        self.events.emit(EngineEventKind::EdgeRemove { id: id.clone() }, self.alpha.tick_count);
        Ok(true)
    }

    /// Batch node add: one alpha bump for the whole batch rather than
    /// per-node, returning a count plus a per-item `Option`.
    pub fn add_nodes(&mut self, nodes: Vec<(NodeHandle, NodeInput)>) -> BatchResult<u32> {
        let mut results = Vec::with_capacity(nodes.len());
        let mut succeeded = 0;
        for (id, input) in nodes {
            match self.add_node(id, input) {
                Ok(slot) => {
                    results.push(Some(slot));
                    succeeded += 1;
                }
                Err(_) => results.push(None),
            }
        }
        if succeeded > 1 {
            self.alpha.bump(reheat::BATCH_MUTATION);
        }
        BatchResult { succeeded, results }
    }

    // ---- algorithm / config -------------------------------------------

    /// Switch the active repulsion backend by its wire name. The
    /// old algorithm's buffers/bind groups are simply left alone (every
    /// backend is preallocated to current capacity up front by
    /// [`AlgorithmRegistry::new`]); only the active selection changes plus
    /// a CSR/target reupload on the next tick via `topology_dirty`.
    pub fn set_force_algorithm(&mut self, name: &str) -> EngineResult<()> {
        self.ensure_not_disposed()?;
        let kind = AlgorithmKind::from_name(name).ok_or_else(|| EngineError::UnknownAlgorithm(name.to_string()))?;
        self.active_algorithm = kind;
        self.topology_dirty = true;
        if let Some(gpu) = &mut self.gpu {
            gpu.registry.set_active(kind);
        }
        self.alpha.bump(reheat::ALGORITHM_SWITCH);
        Ok(())
    }

    pub fn active_algorithm(&self) -> AlgorithmKind {
        self.active_algorithm
    }

    /// Validated partial merge: never throws, out-of-range values are
    /// clamped.
    pub fn set_force_config(&mut self, patch: ForceConfigPatch) {
        self.config.apply_patch(patch);
        self.alpha.bump(reheat::DRAG_OR_CONFIG);
    }

    pub fn force_config(&self) -> &ForceConfig {
        &self.config
    }

    // ---- lifecycle ------------------------------------------------------

    pub fn start(&mut self) {
        self.alpha.start();
    }

    pub fn pause(&mut self) {
        self.alpha.pause();
    }

    pub fn stop(&mut self) {
        self.alpha.stop();
    }

    pub fn restart(&mut self) {
        self.alpha.restart();
    }

    pub fn on_tab_hidden(&mut self) {
        self.alpha.on_hidden();
    }

    pub fn on_tab_visible(&mut self) {
        self.alpha.on_visible();
    }

    /// Permanently disable the engine; every subsequent mutation call
    /// returns `DisposedAccess`, and any readback that resolves after this
    /// point silently drops its result.
    pub fn dispose(&mut self) {
        self.alpha.stop();
        self.disposed = true;
        self.gpu = None;
    }

    // ---- per-tick --------------------------------------------------

    /// Advance the simulation by one tick, if running. A no-op on an
    /// empty graph or when stopped/paused.
    pub fn tick(&mut self) -> EngineResult<()> {
        self.ensure_not_disposed()?;
        if !self.alpha.is_running() {
            return Ok(());
        }
        if self.graph.node_high_water == 0 {
            return Ok(());
        }
        match &mut self.gpu {
            Some(gpu) => gpu.pipeline.tick(
                &gpu.device,
                &gpu.queue,
                &mut self.graph,
                &mut gpu.buffers,
                &mut gpu.registry,
                &mut self.alpha,
                &self.config,
                &mut self.topology_dirty,
            ),
            None => {
                cpu::tick(&mut self.graph, &mut self.alpha, &self.config, self.active_algorithm);
                Ok(())
            }
        }
    }

    // ---- position / selection access ------------------------------------

    pub fn node_position(&self, id: &NodeHandle) -> Option<(f32, f32)> {
        let slot = self.graph.node_slot(id)? as usize;
        Some((self.graph.positions_x[slot], self.graph.positions_y[slot]))
    }

    /// Writes both ping-pong position buffers for `slot` (if GPU-backed),
    /// pins the node, and bumps alpha.
    pub fn set_node_position(&mut self, id: &NodeHandle, x: f32, y: f32) -> EngineResult<()> {
        self.ensure_not_disposed()?;
        let slot = self.graph.node_slot(id).ok_or(EngineError::UnknownId)?;
        self.graph.positions_x[slot as usize] = x;
        self.graph.positions_y[slot as usize] = y;
        if let Some(gpu) = &self.gpu {
            gpu.buffers.write_position(&gpu.queue, slot, x, y)?;
        }
        self.config.pinned_node = Some(slot);
        self.alpha.bump(reheat::DRAG_OR_CONFIG);
        self.events.emit(EngineEventKind::NodeDrag { id: id.clone(), phase: DragPhase::Move, x, y }, self.alpha.tick_count);
        Ok(())
    }

    pub fn pin_node(&mut self, id: &NodeHandle) -> EngineResult<()> {
        let slot = self.graph.node_slot(id).ok_or(EngineError::UnknownId)?;
        self.config.pinned_node = Some(slot);
        self.events.emit(EngineEventKind::NodePin { id: id.clone() }, self.alpha.tick_count);
        Ok(())
    }

    pub fn unpin_node(&mut self, id: &NodeHandle) -> EngineResult<()> {
        let slot = self.graph.node_slot(id).ok_or(EngineError::UnknownId)?;
        if self.config.pinned_node == Some(slot) {
            self.config.pinned_node = None;
        }
        self.events.emit(EngineEventKind::NodeUnpin { id: id.clone() }, self.alpha.tick_count);
        Ok(())
    }

    /// Flips the GPU `selected` attribute flag for every listed node.
    /// Unknown IDs are skipped rather than treated as an error.
    pub fn select_nodes(&mut self, ids: &[NodeHandle]) {
        let mut selected = 0usize;
        for id in ids {
            if let Some(slot) = self.graph.node_slot(id) {
                self.graph.node_attributes[slot as usize][4] = 1.0;
                selected += 1;
            }
        }
        self.events.emit(EngineEventKind::SelectionChange { node_count: selected, edge_count: 0 }, self.alpha.tick_count);
    }

    pub fn select_edges(&mut self, ids: &[EdgeHandle]) {
        let mut selected = 0usize;
        for id in ids {
            if let Some(slot) = self.graph.edge_slot(id) {
                self.graph.edge_attributes[slot as usize][4] = 1.0;
                selected += 1;
            }
        }
        self.events.emit(EngineEventKind::SelectionChange { node_count: 0, edge_count: selected }, self.alpha.tick_count);
    }

    pub fn set_node_hover(&mut self, id: &NodeHandle, phase: HoverPhase) {
        self.events.emit(EngineEventKind::NodeHover { id: id.clone(), phase }, self.alpha.tick_count);
    }

    // ---- bulk columnar setters --------------------------------------------

    /// Overwrite every node's color attribute from a flat `[r,g,b]` array
    /// indexed by slot. `InvalidGraphData` if `colors.len() !=
    /// node_high_water`.
    pub fn set_node_colors(&mut self, colors: &[[f32; 3]]) -> EngineResult<()> {
        let expected = self.graph.node_high_water as usize;
        if colors.len() != expected {
            return Err(EngineError::InvalidGraphData { expected, actual: colors.len() });
        }
        for (i, c) in colors.iter().enumerate() {
            self.graph.node_attributes[i][1] = c[0];
            self.graph.node_attributes[i][2] = c[1];
            self.graph.node_attributes[i][3] = c[2];
        }
        Ok(())
    }

    pub fn set_edge_widths(&mut self, widths: &[f32]) -> EngineResult<()> {
        let expected = self.graph.edge_count();
        if widths.len() != expected {
            return Err(EngineError::InvalidGraphData { expected, actual: widths.len() });
        }
        for (i, w) in widths.iter().enumerate() {
            self.graph.edge_attributes[i][0] = *w;
        }
        Ok(())
    }

    pub fn set_edge_curvatures(&mut self, curvatures: &[f32]) -> EngineResult<()> {
        let expected = self.graph.edge_count();
        if curvatures.len() != expected {
            return Err(EngineError::InvalidGraphData { expected, actual: curvatures.len() });
        }
        for (i, c) in curvatures.iter().enumerate() {
            self.graph.edge_attributes[i][6] = *c;
        }
        Ok(())
    }

    // ---- events -----------------------------------------------------

    pub fn on(&mut self, event: &'static str, handler: impl FnMut(&EngineEvent) + Send + 'static) {
        self.events.on(event, handler);
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain()
    }

    // ---- introspection ----------------------------------------------

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn alpha(&self) -> f32 {
        self.alpha.alpha
    }

    pub fn is_running(&self) -> bool {
        self.alpha.is_running()
    }
}

/// `repository|directory|file|symbol` -> a stable small tag, per
/// Relativity Atlas/codebase-packing's per-node category use.
fn category_tag(ty: &str) -> u8 {
    match ty {
        "repository" => 0,
        "directory" => 1,
        "file" => 2,
        "symbol" => 3,
        _ => 255,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{EdgeInput, GraphInput, IdSpec, NodeInput};

    fn engine() -> EngineFacade {
        EngineFacade::new(Backend::Cpu).unwrap()
    }

    fn node(id: u64) -> NodeInput {
        NodeInput { id: Some(IdSpec::Num(id)), ..Default::default() }
    }

    #[test]
    fn load_then_tick_on_empty_graph_is_noop() {
        let mut e = engine();
        e.load(GraphInput::default()).unwrap();
        e.start();
        e.tick().unwrap();
        assert_eq!(e.node_count(), 0);
    }

    #[test]
    fn load_assigns_phyllotaxis_positions_when_absent() {
        let mut e = engine();
        let input = GraphInput { nodes: vec![node(1), node(2), node(3)], edges: vec![] };
        e.load(input).unwrap();
        let (x0, y0) = e.node_position(&ExternalId::Num(1)).unwrap();
        let (x1, y1) = e.node_position(&ExternalId::Num(2)).unwrap();
        assert!((x0, y0) != (x1, y1));
    }

    #[test]
    fn add_then_remove_node_restores_count() {
        let mut e = engine();
        e.load(GraphInput::default()).unwrap();
        let id = ExternalId::Num(1);
        e.add_node(id.clone(), NodeInput::default()).unwrap();
        assert_eq!(e.node_count(), 1);
        e.remove_node(&id).unwrap();
        assert_eq!(e.node_count(), 0);
    }

    #[test]
    fn pin_holds_position_across_ticks() {
        let mut e = engine();
        let input = GraphInput { nodes: vec![node(1), node(2)], edges: vec![] };
        e.load(input).unwrap();
        let id = ExternalId::Num(1);
        e.set_node_position(&id, 42.0, -7.0).unwrap();
        e.start();
        for _ in 0..50 {
            e.tick().unwrap();
        }
        assert_eq!(e.node_position(&id), Some((42.0, -7.0)));
    }

    #[test]
    fn unknown_algorithm_surfaces_error() {
        let mut e = engine();
        let err = e.set_force_algorithm("not-a-real-algorithm").unwrap_err();
        assert!(matches!(err, EngineError::UnknownAlgorithm(_)));
    }

    #[test]
    fn set_force_config_never_errors_on_out_of_range() {
        let mut e = engine();
        e.set_force_config(ForceConfigPatch { theta: Some(999.0), ..Default::default() });
        assert_eq!(e.force_config().theta, 2.0);
    }

    #[test]
    fn dispose_rejects_further_mutation() {
        let mut e = engine();
        e.dispose();
        let err = e.add_node(ExternalId::Num(1), NodeInput::default()).unwrap_err();
        assert_eq!(err, EngineError::DisposedAccess);
    }

    #[test]
    fn bulk_color_setter_rejects_length_mismatch() {
        let mut e = engine();
        let input = GraphInput { nodes: vec![node(1), node(2)], edges: vec![] };
        e.load(input).unwrap();
        let err = e.set_node_colors(&[[1.0, 0.0, 0.0]]).unwrap_err();
        assert_eq!(err, EngineError::InvalidGraphData { expected: 2, actual: 1 });
    }

    #[test]
    fn duplicate_edge_endpoint_via_unknown_id_returns_error() {
        let mut e = engine();
        e.load(GraphInput { nodes: vec![node(1)], edges: vec![] }).unwrap();
        let err = e
            .add_edge(
                ExternalId::Num(100),
                EdgeInput { source: IdSpec::Num(1), target: IdSpec::Num(999), width: None, color: None, weight: None, edge_type: None },
            )
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownId);
    }
}

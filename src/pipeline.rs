//! SimulationPipeline (C6): per-tick command encoding.
//!
//! Builds one command encoder, records every pass in a fixed order,
//! submits once, then reads results back through a mapped staging buffer.
//! Readback is non-blocking, driven by `crossbeam-channel` and polled every
//! tick via `wgpu::PollType::Poll`, so a slow readback never stalls the
//! host loop.

use crossbeam_channel::Receiver;

use crate::algorithms::{AlgorithmKind, AlgorithmRegistry};
use crate::alpha::AlphaController;
use crate::buffers::BufferSet;
use crate::collision::CollisionResolver;
use crate::config::ForceConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::GraphState;
use crate::stages::{ClearStage, IntegrateStage, IntegrationParams, SpringsStage, NO_PINNED_NODE};

/// Frames between asynchronous position readbacks.
pub const DEFAULT_SYNC_INTERVAL: u32 = 5;

/// Depth-staggered settling spread applied in `IntegrationUniforms`. Not
/// exposed as a `ForceConfig` tunable — only carried as a uniform field;
/// fixed at the value the hierarchical backends were tuned against.
const DEPTH_SETTLING_SPREAD: f32 = 0.15;

enum Readback {
    Idle,
    Pending {
        receiver: Receiver<Result<(), wgpu::BufferAsyncError>>,
        node_count: u32,
    },
}

pub struct SimulationPipeline {
    clear: ClearStage,
    springs: SpringsStage,
    integrate: IntegrateStage,
    collision: CollisionResolver,
    sync_interval: u32,
    frames_since_sync: u32,
    readback: Readback,
    stopped: bool,
}

fn all_positions_non_finite(graph: &GraphState) -> bool {
    let n = graph.node_high_water as usize;
    if n == 0 {
        return false;
    }
    (0..n).all(|i| !graph.positions_x[i].is_finite() || !graph.positions_y[i].is_finite())
}

impl SimulationPipeline {
    pub fn new(device: &wgpu::Device, node_capacity: u32) -> EngineResult<Self> {
        Ok(Self {
            clear: ClearStage::new(device),
            springs: SpringsStage::new(device),
            integrate: IntegrateStage::new(device),
            collision: CollisionResolver::new(device, node_capacity)?,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            frames_since_sync: 0,
            readback: Readback::Idle,
            stopped: false,
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn set_sync_interval(&mut self, interval: u32) {
        self.sync_interval = interval.max(1);
    }

    /// Rebuild the fixed-stage bind groups that reference the ping-pong
    /// buffers or collision's private grid buffers. Called after
    /// construction and after every `BufferSet::grow`. The per-tick
    /// rebuild needed by the ping-pong swap itself happens inside `tick`.
    pub fn rebuild_bind_groups(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        self.clear.rebuild_bind_group(device, buffers);
        self.springs.rebuild_bind_group(device, buffers);
        self.integrate.rebuild_bind_group(device, buffers);
        self.collision.rebuild_bind_groups(device, buffers);
    }

    pub fn resize(&mut self, device: &wgpu::Device, node_capacity: u32) -> EngineResult<()> {
        self.collision.ensure_backend(device, node_capacity)?;
        self.collision.resize_buffers(device, node_capacity);
        Ok(())
    }

    /// Run one tick. `topology_dirty` is cleared after a precomputed
    /// layout consumes it (those algorithms recompute their CPU layout
    /// only when the graph structure actually changed, not every frame).
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        graph: &mut GraphState,
        buffers: &mut BufferSet,
        registry: &mut AlgorithmRegistry,
        alpha: &mut AlphaController,
        config: &ForceConfig,
        topology_dirty: &mut bool,
    ) -> EngineResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.poll_readback(device, buffers, graph);

        let node_count = graph.node_high_water;
        if node_count == 0 {
            return Ok(());
        }

        let kind = registry.active().kind();
        let requires_bounds =
            registry.active().requires_bounds() || (kind == AlgorithmKind::RelativityAtlas && config.relativity.density_field_enabled);
        if requires_bounds && all_positions_non_finite(graph) {
            self.stopped = true;
            alpha.stop();
            log::error!(
                "SimulationPipeline: stopping, {} requires a valid bounding box but every position is non-finite",
                kind.name()
            );
            return Err(EngineError::Corrupted);
        }

        alpha.tick();
        let handles_gravity = registry.active().handles_gravity();
        let is_precomputed = kind.is_precomputed();
        let damping = alpha.effective_damping(config.velocity_decay);
        let edge_count = graph.edge_count() as u32;

        // Ping-pong swap flips which physical buffer `positions_in`/`_out`
        // (and `velocities_in`/`_out`) resolve to, so every bind group that
        // references them must be rebuilt with the fresh identity before
        // this tick's passes are recorded.
        self.springs.rebuild_bind_group(device, buffers);
        self.integrate.rebuild_bind_group(device, buffers);
        self.collision.rebuild_bind_groups(device, buffers);
        registry.active_mut().rebuild_bind_groups(device, buffers);

        if !is_precomputed || *topology_dirty {
            registry.active_mut().update_uniforms(queue, graph, config, alpha.alpha);
        }
        if *topology_dirty && (kind == AlgorithmKind::RelativityAtlas || is_precomputed) {
            graph.recompute_node_depths();
            queue.write_buffer(&buffers.node_depth, 0, bytemuck::cast_slice(&graph.node_depth[..node_count as usize]));
        }
        if is_precomputed {
            *topology_dirty = false;
        }

        self.clear.update_uniforms(queue, buffers, node_count);
        self.springs.update_uniforms(queue, buffers, edge_count, config);
        self.collision.update_uniforms(queue, buffers, graph, config);

        let pinned_node = config.pinned_node.unwrap_or(NO_PINNED_NODE);
        let gravity_strength = if handles_gravity { 0.0 } else { config.center_strength };
        self.integrate.update_uniforms(
            queue,
            buffers,
            &IntegrationParams {
                node_count,
                dt: config.time_step,
                damping,
                max_velocity: config.max_velocity,
                alpha: alpha.alpha,
                depth_settling_spread: DEPTH_SETTLING_SPREAD,
                alpha_min: alpha.alpha_min,
                gravity_strength,
                center_x: config.center_x,
                center_y: config.center_y,
                pinned_node,
            },
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("simulation_tick"),
        });
        self.clear.record(&mut encoder, node_count);
        registry.active().record_repulsion_pass(&mut encoder, node_count);
        if !is_precomputed {
            self.springs.record(&mut encoder, edge_count);
        }
        self.integrate.record(&mut encoder, node_count);
        if config.collision_enabled {
            self.collision.record(&mut encoder, node_count);
        }

        self.frames_since_sync += 1;
        let sync_due = self.frames_since_sync >= self.sync_interval && matches!(self.readback, Readback::Idle);
        if sync_due {
            let bytes = (node_count as u64) * 8;
            encoder.copy_buffer_to_buffer(buffers.positions_in(), 0, &buffers.readback, 0, bytes);
        }

        queue.submit(Some(encoder.finish()));
        buffers.swap();

        if sync_due {
            self.begin_readback(buffers, node_count);
            self.frames_since_sync = 0;
        }

        Ok(())
    }

    fn begin_readback(&mut self, buffers: &BufferSet, node_count: u32) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let bytes = (node_count as u64) * 8;
        buffers.readback.slice(0..bytes).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.readback = Readback::Pending { receiver: rx, node_count };
    }

    /// Non-blocking: advances the device's mapping callbacks and, if a
    /// pending readback has resolved, copies it into the CPU shadow and
    /// unmaps the staging buffer. `ReadbackFailed` is logged and
    /// swallowed — the next sync interval simply tries again.
    fn poll_readback(&mut self, device: &wgpu::Device, buffers: &BufferSet, graph: &mut GraphState) {
        let (rx, mapped_node_count) = match &self.readback {
            Readback::Idle => return,
            Readback::Pending { receiver, node_count } => (receiver, *node_count),
        };
        let _ = device.poll(wgpu::PollType::Poll);
        match rx.try_recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::warn!("SimulationPipeline: position readback failed: {e}");
                self.readback = Readback::Idle;
                return;
            }
            Err(_) => return,
        }

        let n = (mapped_node_count as usize).min(graph.node_high_water as usize);
        {
            let bytes = (mapped_node_count as u64) * 8;
            let view = buffers.readback.slice(0..bytes).get_mapped_range();
            let positions: &[[f32; 2]] = bytemuck::cast_slice(&view);
            for i in 0..n {
                graph.positions_x[i] = positions[i][0];
                graph.positions_y[i] = positions[i][1];
            }
        }
        buffers.readback.unmap();
        self.readback = Readback::Idle;
    }
}

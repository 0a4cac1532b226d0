//! BufferSet (C2): owns every GPU buffer shared across passes, including
//! the ping-pong position/velocity pair, and the growth protocol that
//! reallocates + reuploads + signals bind-group rebuilds.
//!
//! Follows an "allocate typed storage buffers up front, expose read/write
//! accessors, swap an index instead of moving data" idiom: a 2-buffer
//! position/velocity ping-pong (simulation doesn't need a third "render"
//! buffer here — the CPU shadow plays that role).

pub mod layout;

use wgpu::util::DeviceExt;

use crate::error::{EngineError, EngineResult};
use crate::graph::GraphState;
use layout::{
    ClearUniforms, CollisionUniforms, GridCollisionUniforms, IntegrationUniforms,
    RepulsionUniforms, SpringUniforms,
};

fn vec2_buffer(device: &wgpu::Device, label: &str, capacity: u32) -> wgpu::Buffer {
    let size = (capacity as u64) * 8; // vec2<f32>
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size.max(16),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}

fn u32_buffer(device: &wgpu::Device, label: &str, count: u32, extra: wgpu::BufferUsages) -> wgpu::Buffer {
    let size = (count as u64) * 4;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size.max(16),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | extra,
        mapped_at_creation: false,
    })
}

const DEFAULT_CAPACITY: u32 = 256;

/// Mirrors `graph::state`'s geometric-doubling growth policy so GPU buffer
/// capacity and CPU shadow capacity never diverge.
fn next_capacity(required: u32, current: u32) -> u32 {
    let mut cap = current.max(DEFAULT_CAPACITY);
    while cap < required {
        cap = cap.saturating_mul(2);
    }
    cap
}

fn uniform_buffer<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, init: T) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(&init),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Owns the six per-node vec2 buffers (positions x2, velocities x2,
/// forces, readback), the per-edge/per-node attribute buffers, and the
/// four uniform buffers, per
pub struct BufferSet {
    pub node_capacity: u32,
    pub edge_capacity: u32,

    positions: [wgpu::Buffer; 2],
    velocities: [wgpu::Buffer; 2],
    ping: usize,

    pub forces: wgpu::Buffer,
    pub readback: wgpu::Buffer,

    pub edge_sources: wgpu::Buffer,
    pub edge_targets: wgpu::Buffer,
    pub node_flags: wgpu::Buffer,
    pub node_depth: wgpu::Buffer,
    pub node_attributes: wgpu::Buffer,
    pub edge_attributes: wgpu::Buffer,

    pub clear_uniforms: wgpu::Buffer,
    pub repulsion_uniforms: wgpu::Buffer,
    pub spring_uniforms: wgpu::Buffer,
    pub integration_uniforms: wgpu::Buffer,
    pub collision_uniforms: wgpu::Buffer,
    pub grid_collision_uniforms: wgpu::Buffer,
}

impl BufferSet {
    pub fn new(device: &wgpu::Device, node_capacity: u32, edge_capacity: u32) -> Self {
        Self {
            node_capacity,
            edge_capacity,
            positions: [
                vec2_buffer(device, "positions_a", node_capacity),
                vec2_buffer(device, "positions_b", node_capacity),
            ],
            velocities: [
                vec2_buffer(device, "velocities_a", node_capacity),
                vec2_buffer(device, "velocities_b", node_capacity),
            ],
            ping: 0,
            forces: vec2_buffer(device, "forces", node_capacity),
            readback: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("readback"),
                size: ((node_capacity as u64) * 8).max(16),
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            edge_sources: u32_buffer(device, "edge_sources", edge_capacity, wgpu::BufferUsages::empty()),
            edge_targets: u32_buffer(device, "edge_targets", edge_capacity, wgpu::BufferUsages::empty()),
            node_flags: u32_buffer(device, "node_flags", node_capacity, wgpu::BufferUsages::empty()),
            node_depth: u32_buffer(device, "node_depth", node_capacity, wgpu::BufferUsages::empty()),
            node_attributes: u32_buffer(device, "node_attributes", node_capacity * 6, wgpu::BufferUsages::empty()),
            edge_attributes: u32_buffer(device, "edge_attributes", edge_capacity * 8, wgpu::BufferUsages::empty()),
            clear_uniforms: uniform_buffer(device, "clear_uniforms", ClearUniforms::zeroed_default()),
            repulsion_uniforms: uniform_buffer(device, "repulsion_uniforms", RepulsionUniforms::zeroed_default()),
            spring_uniforms: uniform_buffer(device, "spring_uniforms", SpringUniforms::zeroed_default()),
            integration_uniforms: uniform_buffer(device, "integration_uniforms", IntegrationUniforms::zeroed_default()),
            collision_uniforms: uniform_buffer(device, "collision_uniforms", CollisionUniforms::zeroed_default()),
            grid_collision_uniforms: uniform_buffer(device, "grid_collision_uniforms", GridCollisionUniforms::zeroed_default()),
        }
    }

    pub fn positions_in(&self) -> &wgpu::Buffer {
        &self.positions[self.ping]
    }

    pub fn positions_out(&self) -> &wgpu::Buffer {
        &self.positions[1 - self.ping]
    }

    pub fn velocities_in(&self) -> &wgpu::Buffer {
        &self.velocities[self.ping]
    }

    pub fn velocities_out(&self) -> &wgpu::Buffer {
        &self.velocities[1 - self.ping]
    }

    /// Swap ping-pong roles. Call only after the tick's command buffer has
    /// been submitted.
    pub fn swap(&mut self) {
        self.ping = 1 - self.ping;
    }

    /// Growth protocol:
    /// 1. Allocate new buffers at `new_capacity`.
    /// 2. Upload all live rows from the CPU shadow into BOTH ping-pong
    ///    position/velocity buffers (preserves ping-pong correctness).
    /// 3. The caller (SimulationPipeline/EngineFacade) must recreate every
    ///    bind group that referenced the old buffers — `BufferSet` only
    ///    owns buffer identity, not bind groups.
    pub fn grow(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, graph: &GraphState) {
        let new_node_capacity = next_capacity(graph.node_high_water, self.node_capacity);
        let new_edge_capacity = next_capacity(graph.edge_count, self.edge_capacity);

        let grew_nodes = new_node_capacity > self.node_capacity;
        let grew_edges = new_edge_capacity > self.edge_capacity;

        if grew_nodes {
            let new_positions = [
                vec2_buffer(device, "positions_a", new_node_capacity),
                vec2_buffer(device, "positions_b", new_node_capacity),
            ];
            let new_velocities = [
                vec2_buffer(device, "velocities_a", new_node_capacity),
                vec2_buffer(device, "velocities_b", new_node_capacity),
            ];
            let interleaved: Vec<[f32; 2]> = (0..graph.node_high_water as usize)
                .map(|i| [graph.positions_x[i], graph.positions_y[i]])
                .collect();
            let vel_interleaved: Vec<[f32; 2]> = (0..graph.node_high_water as usize)
                .map(|i| [graph.velocities_x[i], graph.velocities_y[i]])
                .collect();
            let bytes = bytemuck::cast_slice(&interleaved);
            let vel_bytes = bytemuck::cast_slice(&vel_interleaved);
            queue.write_buffer(&new_positions[0], 0, bytes);
            queue.write_buffer(&new_positions[1], 0, bytes);
            queue.write_buffer(&new_velocities[0], 0, vel_bytes);
            queue.write_buffer(&new_velocities[1], 0, vel_bytes);

            self.positions = new_positions;
            self.velocities = new_velocities;
            self.ping = 0;
            self.forces = vec2_buffer(device, "forces", new_node_capacity);
            self.readback = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("readback"),
                size: ((new_node_capacity as u64) * 8).max(16),
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.node_flags = u32_buffer(device, "node_flags", new_node_capacity, wgpu::BufferUsages::empty());
            self.node_depth = u32_buffer(device, "node_depth", new_node_capacity, wgpu::BufferUsages::empty());
            self.node_attributes =
                u32_buffer(device, "node_attributes", new_node_capacity * 6, wgpu::BufferUsages::empty());
            self.node_capacity = new_node_capacity;
            self.upload_node_flags(queue, graph);
            log::info!("BufferSet: grew node buffers to capacity {}", new_node_capacity);
        }

        if grew_edges {
            self.edge_sources = u32_buffer(device, "edge_sources", new_edge_capacity, wgpu::BufferUsages::empty());
            self.edge_targets = u32_buffer(device, "edge_targets", new_edge_capacity, wgpu::BufferUsages::empty());
            self.edge_attributes =
                u32_buffer(device, "edge_attributes", new_edge_capacity * 8, wgpu::BufferUsages::empty());
            queue.write_buffer(&self.edge_sources, 0, bytemuck::cast_slice(&graph.edge_sources[..graph.edge_count as usize]));
            queue.write_buffer(&self.edge_targets, 0, bytemuck::cast_slice(&graph.edge_targets[..graph.edge_count as usize]));
            self.edge_capacity = new_edge_capacity;
            log::info!("BufferSet: grew edge buffers to capacity {}", new_edge_capacity);
        }
    }

    /// Targeted single-node write: writes one 8-byte `vec2<f32>` slice at
    /// `slot * 8` into BOTH ping-pong position buffers, avoiding a full
    /// upload and a one-frame visual jump on
    /// drag/add.
    pub fn write_position(&self, queue: &wgpu::Queue, slot: u32, x: f32, y: f32) -> EngineResult<()> {
        if slot >= self.node_capacity {
            return Err(EngineError::UnknownId);
        }
        let offset = (slot as u64) * 8;
        let bytes = bytemuck::bytes_of(&[x, y]);
        queue.write_buffer(&self.positions[0], offset, bytes);
        queue.write_buffer(&self.positions[1], offset, bytes);
        Ok(())
    }

    pub fn write_velocity(&self, queue: &wgpu::Queue, slot: u32, vx: f32, vy: f32) -> EngineResult<()> {
        if slot >= self.node_capacity {
            return Err(EngineError::UnknownId);
        }
        let offset = (slot as u64) * 8;
        let bytes = bytemuck::bytes_of(&[vx, vy]);
        queue.write_buffer(&self.velocities[0], offset, bytes);
        queue.write_buffer(&self.velocities[1], offset, bytes);
        Ok(())
    }

    pub fn upload_edges(&self, queue: &wgpu::Queue, graph: &GraphState) {
        let n = graph.edge_count() ;
        if n == 0 {
            return;
        }
        queue.write_buffer(&self.edge_sources, 0, bytemuck::cast_slice(&graph.edge_sources[..n]));
        queue.write_buffer(&self.edge_targets, 0, bytemuck::cast_slice(&graph.edge_targets[..n]));
        queue.write_buffer(&self.edge_attributes, 0, bytemuck::cast_slice(&graph.edge_attributes[..n]));
    }

    pub fn upload_all_positions(&self, queue: &wgpu::Queue, graph: &GraphState) {
        let n = graph.node_high_water as usize;
        let interleaved: Vec<[f32; 2]> = (0..n).map(|i| [graph.positions_x[i], graph.positions_y[i]]).collect();
        let bytes: &[u8] = bytemuck::cast_slice(&interleaved);
        queue.write_buffer(&self.positions[0], 0, bytes);
        queue.write_buffer(&self.positions[1], 0, bytes);
    }

    /// Reupload the whole `node_flags` liveness mask (1 = alive, 0 =
    /// freed) for every slot up to `node_high_water`. A freed slot's row
    /// is zeroed but its GPU index is never reused until `reload`, so
    /// every force/collision pass binds this buffer and skips dead slots
    /// rather than treating a zeroed row as a real body at the origin.
    pub fn upload_node_flags(&self, queue: &wgpu::Queue, graph: &GraphState) {
        let n = graph.node_high_water as usize;
        if n == 0 {
            return;
        }
        let flags: Vec<u32> = (0..n).map(|i| graph.node_alive[i] as u32).collect();
        queue.write_buffer(&self.node_flags, 0, bytemuck::cast_slice(&flags));
    }

    /// Targeted single-slot liveness write, used by `add_node`/`remove_node`
    /// so a mutation doesn't force a full `node_flags` reupload.
    pub fn write_node_flag(&self, queue: &wgpu::Queue, slot: u32, alive: bool) -> EngineResult<()> {
        if slot >= self.node_capacity {
            return Err(EngineError::UnknownId);
        }
        let offset = (slot as u64) * 4;
        queue.write_buffer(&self.node_flags, offset, bytemuck::bytes_of(&(alive as u32)));
        Ok(())
    }
}

trait ZeroedDefault: Sized + bytemuck::Pod {
    fn zeroed_default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}
impl ZeroedDefault for ClearUniforms {}
impl ZeroedDefault for RepulsionUniforms {}
impl ZeroedDefault for SpringUniforms {}
impl ZeroedDefault for IntegrationUniforms {}
impl ZeroedDefault for CollisionUniforms {}
impl ZeroedDefault for GridCollisionUniforms {}

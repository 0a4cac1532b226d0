//! CollisionResolver (C5): keeps node circles from overlapping after
//! integration. Two backends selected by live node count:
//! [`tiled`] (O(N^2), used below `GRID_CROSSOVER`) and [`grid`] (spatial
//! hash with atomic linked lists, used above it).
//!
//! The grid backend keeps a three-pass clear/insert/collision shape, and
//! the tiled backend adds a fallback for small graphs, where building a
//! grid costs more than it saves.

pub mod grid;
pub mod tiled;

use crate::buffers::BufferSet;
use crate::config::ForceConfig;
use crate::error::EngineResult;
use crate::graph::GraphState;

/// Below this many live nodes, `tiled`'s O(N^2) pass is cheaper than
/// building and walking a grid.
pub const GRID_CROSSOVER: u32 = 5000;
/// Hard cap on grid dimensions in either axis.
pub const MAX_GRID_DIM: u32 = 256;

pub enum CollisionBackend {
    Tiled(tiled::TiledCollision),
    Grid(grid::GridCollision),
}

pub struct CollisionResolver {
    backend: CollisionBackend,
}

impl CollisionResolver {
    pub fn new(device: &wgpu::Device, node_capacity: u32) -> EngineResult<Self> {
        let backend = if node_capacity > GRID_CROSSOVER {
            CollisionBackend::Grid(grid::GridCollision::new(device)?)
        } else {
            CollisionBackend::Tiled(tiled::TiledCollision::new(device)?)
        };
        Ok(Self { backend })
    }

    /// Re-select the backend if `node_count` has crossed `GRID_CROSSOVER`
    /// since the last tick, rebuilding pipelines/buffers for the new one.
    pub fn ensure_backend(&mut self, device: &wgpu::Device, node_capacity: u32) -> EngineResult<()> {
        let want_grid = node_capacity > GRID_CROSSOVER;
        let is_grid = matches!(self.backend, CollisionBackend::Grid(_));
        if want_grid != is_grid {
            log::info!(
                "CollisionResolver: switching backend ({} -> {}) at node_capacity={}",
                if is_grid { "grid" } else { "tiled" },
                if want_grid { "grid" } else { "tiled" },
                node_capacity
            );
            self.backend = if want_grid {
                CollisionBackend::Grid(grid::GridCollision::new(device)?)
            } else {
                CollisionBackend::Tiled(tiled::TiledCollision::new(device)?)
            };
        }
        Ok(())
    }

    pub fn resize_buffers(&mut self, device: &wgpu::Device, node_capacity: u32) {
        match &mut self.backend {
            CollisionBackend::Tiled(t) => t.resize_buffers(device, node_capacity),
            CollisionBackend::Grid(g) => g.resize_buffers(device, node_capacity),
        }
    }

    pub fn rebuild_bind_groups(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        match &mut self.backend {
            CollisionBackend::Tiled(t) => t.rebuild_bind_groups(device, buffers),
            CollisionBackend::Grid(g) => g.rebuild_bind_groups(device, buffers),
        }
    }

    /// Push this tick's `CollisionUniforms` (shared by both backends) and,
    /// for the grid backend, the derived `GridCollisionUniforms` (cell
    /// size/grid dimensions computed from the live bounding box).
    pub fn update_uniforms(&mut self, queue: &wgpu::Queue, buffers: &BufferSet, graph: &GraphState, config: &ForceConfig) {
        use crate::buffers::layout::CollisionUniforms;
        let node_count = graph.node_high_water;
        let default_radius = 5.0;
        queue.write_buffer(
            &buffers.collision_uniforms,
            0,
            bytemuck::bytes_of(&CollisionUniforms {
                node_count,
                strength: config.collision_strength,
                radius_multiplier: config.collision_radius_multiplier,
                iterations: config.collision_iterations,
                default_radius,
                _pad: [0; 3],
            }),
        );
        if let CollisionBackend::Grid(g) = &self.backend {
            g.update_grid_uniforms(queue, buffers, graph, config, default_radius);
        }
    }

    /// Record this tick's collision pass(es) into `encoder`. Grid backend
    /// emits three dispatches (clear, insert, resolve); tiled emits one.
    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32) {
        if node_count == 0 {
            return;
        }
        match &self.backend {
            CollisionBackend::Tiled(t) => t.record(encoder, node_count),
            CollisionBackend::Grid(g) => g.record(encoder, node_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossover_constant_matches_spec_default() {
        assert_eq!(GRID_CROSSOVER, 5000);
    }
}

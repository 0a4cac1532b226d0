//! Spatial-hash grid collision resolution, used above
//! [`super::GRID_CROSSOVER`]. Three dispatches per tick: clear the
//! per-cell head pointers, insert every node into its cell via an atomic
//! linked-list push, then resolve collisions by walking each node's own
//! cell plus its 8 neighbors.
//!
//! Grid dimensions/cell size are resized every tick from the graph's live
//! bounding box rather than a fixed world extent.

use crate::buffers::layout::GridCollisionUniforms;
use crate::buffers::BufferSet;
use crate::config::ForceConfig;
use crate::error::EngineResult;
use crate::graph::GraphState;

use super::super::algorithms::{compile_shader, compute_pipeline, storage_entry, uniform_entry, workgroups_for};
use super::MAX_GRID_DIM;

const CLEAR_SHADER: &str = include_str!("../../shaders/grid_clear.wgsl");
const INSERT_SHADER: &str = include_str!("../../shaders/grid_insert.wgsl");
const RESOLVE_SHADER: &str = include_str!("../../shaders/grid_resolve.wgsl");
const WORKGROUP_SIZE: u32 = 64;
/// Sentinel marking an empty cell head / list terminator.
const EMPTY: u32 = u32::MAX;

pub struct GridCollision {
    clear_pipeline: wgpu::ComputePipeline,
    insert_pipeline: wgpu::ComputePipeline,
    resolve_pipeline: wgpu::ComputePipeline,
    clear_layout: wgpu::BindGroupLayout,
    insert_layout: wgpu::BindGroupLayout,
    resolve_layout: wgpu::BindGroupLayout,
    clear_bind_group: Option<wgpu::BindGroup>,
    insert_bind_group: Option<wgpu::BindGroup>,
    resolve_bind_group: Option<wgpu::BindGroup>,
    cell_heads: Option<wgpu::Buffer>,
    node_next: Option<wgpu::Buffer>,
    node_capacity: u32,
    total_cells: u32,
}

impl GridCollision {
    pub fn new(device: &wgpu::Device) -> EngineResult<Self> {
        let clear_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grid_clear_layout"),
            entries: &[storage_entry(0, false), uniform_entry(1)],
        });
        let insert_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grid_insert_layout"),
            entries: &[
                storage_entry(0, true),  // positions
                storage_entry(1, false), // cell_heads
                storage_entry(2, false), // node_next
                uniform_entry(3),
                storage_entry(4, true), // node_flags
            ],
        });
        let resolve_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grid_resolve_layout"),
            entries: &[
                storage_entry(0, false), // positions (resolved in place)
                storage_entry(1, true),  // node attributes
                storage_entry(2, true),  // cell_heads
                storage_entry(3, true),  // node_next
                uniform_entry(4),
                storage_entry(5, true), // node_flags
            ],
        });

        let clear_module = compile_shader(device, "grid_clear", CLEAR_SHADER);
        let insert_module = compile_shader(device, "grid_insert", INSERT_SHADER);
        let resolve_module = compile_shader(device, "grid_resolve", RESOLVE_SHADER);

        let clear_pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grid_clear_pipeline_layout"),
            bind_group_layouts: &[&clear_layout],
            push_constant_ranges: &[],
        });
        let insert_pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grid_insert_pipeline_layout"),
            bind_group_layouts: &[&insert_layout],
            push_constant_ranges: &[],
        });
        let resolve_pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grid_resolve_pipeline_layout"),
            bind_group_layouts: &[&resolve_layout],
            push_constant_ranges: &[],
        });

        Ok(Self {
            clear_pipeline: compute_pipeline(device, "grid_clear_pipeline", &clear_pl, &clear_module, "main"),
            insert_pipeline: compute_pipeline(device, "grid_insert_pipeline", &insert_pl, &insert_module, "main"),
            resolve_pipeline: compute_pipeline(device, "grid_resolve_pipeline", &resolve_pl, &resolve_module, "main"),
            clear_layout,
            insert_layout,
            resolve_layout,
            clear_bind_group: None,
            insert_bind_group: None,
            resolve_bind_group: None,
            cell_heads: None,
            node_next: None,
            node_capacity: 0,
            total_cells: 0,
        })
    }

    pub fn resize_buffers(&mut self, device: &wgpu::Device, node_capacity: u32) {
        if node_capacity > self.node_capacity {
            self.node_next = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("grid_node_next"),
                size: ((node_capacity as u64) * 4).max(16),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.node_capacity = node_capacity;
        }
        let total_cells = (MAX_GRID_DIM * MAX_GRID_DIM).max(1);
        if self.cell_heads.is_none() {
            self.cell_heads = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("grid_cell_heads"),
                size: (total_cells as u64) * 4,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.total_cells = total_cells;
        }
    }

    pub fn rebuild_bind_groups(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        let (Some(cell_heads), Some(node_next)) = (&self.cell_heads, &self.node_next) else {
            return;
        };
        self.clear_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grid_clear_bind_group"),
            layout: &self.clear_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: cell_heads.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.grid_collision_uniforms.as_entire_binding(),
                },
            ],
        }));
        self.insert_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grid_insert_bind_group"),
            layout: &self.insert_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.positions_out().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: cell_heads.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: node_next.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffers.grid_collision_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: buffers.node_flags.as_entire_binding(),
                },
            ],
        }));
        self.resolve_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grid_resolve_bind_group"),
            layout: &self.resolve_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.positions_out().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.node_attributes.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: cell_heads.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: node_next.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: buffers.grid_collision_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: buffers.node_flags.as_entire_binding(),
                },
            ],
        }));
    }

    /// Derive grid dimensions/cell size from the live CPU-shadow bounding
    /// box (padded 10%) and push `GridCollisionUniforms`. Capped at
    /// `MAX_GRID_DIM` per axis so a few far-flung outlier nodes can never
    /// blow the cell-heads buffer up past its fixed allocation.
    pub fn update_grid_uniforms(
        &self,
        queue: &wgpu::Queue,
        buffers: &BufferSet,
        graph: &GraphState,
        config: &ForceConfig,
        default_radius: f32,
    ) {
        let n = graph.node_high_water as usize;
        let mut min = (0.0f32, 0.0f32);
        let mut max = (1.0f32, 1.0f32);
        if n > 0 {
            min = (f32::MAX, f32::MAX);
            max = (f32::MIN, f32::MIN);
            for i in 0..n {
                min.0 = min.0.min(graph.positions_x[i]);
                min.1 = min.1.min(graph.positions_y[i]);
                max.0 = max.0.max(graph.positions_x[i]);
                max.1 = max.1.max(graph.positions_y[i]);
            }
        }
        let pad_x = (max.0 - min.0).max(1.0) * 0.1;
        let pad_y = (max.1 - min.1).max(1.0) * 0.1;
        min.0 -= pad_x;
        min.1 -= pad_y;
        max.0 += pad_x;
        max.1 += pad_y;

        let cell_size = (default_radius * config.collision_radius_multiplier * 2.0).max(1.0);
        let grid_w = (((max.0 - min.0) / cell_size).ceil() as u32).clamp(1, MAX_GRID_DIM);
        let grid_h = (((max.1 - min.1) / cell_size).ceil() as u32).clamp(1, MAX_GRID_DIM);

        queue.write_buffer(
            &buffers.grid_collision_uniforms,
            0,
            bytemuck::bytes_of(&GridCollisionUniforms {
                node_count: graph.node_high_water,
                grid_w,
                grid_h,
                cell_size,
                bounds_min_x: min.0,
                bounds_min_y: min.1,
                strength: config.collision_strength,
                radius_multiplier: config.collision_radius_multiplier,
                default_radius,
                total_cells: grid_w * grid_h,
                _pad: [0; 2],
            }),
        );
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32) {
        let (Some(clear_bg), Some(insert_bg), Some(resolve_bg)) =
            (&self.clear_bind_group, &self.insert_bind_group, &self.resolve_bind_group)
        else {
            return;
        };

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("grid_clear_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.clear_pipeline);
            pass.set_bind_group(0, clear_bg, &[]);
            pass.dispatch_workgroups(workgroups_for(self.total_cells, WORKGROUP_SIZE), 1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("grid_insert_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.insert_pipeline);
            pass.set_bind_group(0, insert_bg, &[]);
            pass.dispatch_workgroups(workgroups_for(node_count, WORKGROUP_SIZE), 1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("grid_resolve_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.resolve_pipeline);
            pass.set_bind_group(0, resolve_bg, &[]);
            pass.dispatch_workgroups(workgroups_for(node_count, WORKGROUP_SIZE), 1, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sentinel_is_u32_max() {
        assert_eq!(EMPTY, u32::MAX);
    }
}

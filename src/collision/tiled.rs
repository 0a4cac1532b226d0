//! Tiled (O(N^2)) collision resolution, used below
//! [`super::GRID_CROSSOVER`]. Every node checks every other node for
//! overlap and is pushed apart in one dispatch; `collision_iterations`
//! controls how many times the shader loops internally, since
//! resolving all overlaps in a dense cluster can take several passes.
//!
//! A single bind-group/single-dispatch pass over workgroup-tiled shared
//! memory.

use crate::buffers::BufferSet;
use crate::error::EngineResult;

use super::super::algorithms::{compile_shader, compute_pipeline, storage_entry, uniform_entry, workgroups_for};

const SHADER_SRC: &str = include_str!("../../shaders/collision_tiled.wgsl");
const WORKGROUP_SIZE: u32 = 64;

pub struct TiledCollision {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
}

impl TiledCollision {
    pub fn new(device: &wgpu::Device) -> EngineResult<Self> {
        let module = compile_shader(device, "collision_tiled", SHADER_SRC);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("collision_tiled_layout"),
            entries: &[
                storage_entry(0, false), // positions (read_write, resolved in place)
                storage_entry(1, true),  // node attributes (radius is field 0)
                uniform_entry(2),
                storage_entry(3, true), // node_flags
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("collision_tiled_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = compute_pipeline(device, "collision_tiled_pipeline", &pipeline_layout, &module, "main");
        Ok(Self {
            pipeline,
            layout,
            bind_group: None,
        })
    }

    pub fn resize_buffers(&mut self, _device: &wgpu::Device, _node_capacity: u32) {}

    pub fn rebuild_bind_groups(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("collision_tiled_bind_group"),
            layout: &self.layout,
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
                    resource: buffers.collision_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffers.node_flags.as_entire_binding(),
                },
            ],
        }));
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("collision_tiled_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(node_count, WORKGROUP_SIZE), 1, 1);
    }
}

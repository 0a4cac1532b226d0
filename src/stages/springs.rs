//! Pass 3/5 of a tick: edge springs, `F = strength * (dist -
//! rest_length) * unit(dist)`, split between endpoints. Skipped entirely
//! when there are no edges, or when the active algorithm is a
//! precomputed layout (`AlgorithmKind::is_precomputed`) — those hold
//! nodes at a target position via their own spring-to-target pass
//! instead, and running both would fight each other.

use crate::algorithms::{compile_shader, compute_pipeline, storage_entry, uniform_entry, workgroups_for};
use crate::buffers::layout::SpringUniforms;
use crate::buffers::BufferSet;
use crate::config::ForceConfig;

const SHADER_SRC: &str = include_str!("../../shaders/springs.wgsl");
const WORKGROUP_SIZE: u32 = 256;

pub struct SpringsStage {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
}

impl SpringsStage {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = compile_shader(device, "springs", SHADER_SRC);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("springs_layout"),
            entries: &[
                storage_entry(0, true),  // positions
                storage_entry(1, false), // forces (atomic accumulate)
                storage_entry(2, true),  // edge_sources
                storage_entry(3, true),  // edge_targets
                uniform_entry(4),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("springs_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = compute_pipeline(device, "springs_pipeline", &pipeline_layout, &module, "main");
        Self {
            pipeline,
            layout,
            bind_group: None,
        }
    }

    pub fn rebuild_bind_group(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("springs_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.positions_in().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.forces.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffers.edge_sources.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffers.edge_targets.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: buffers.spring_uniforms.as_entire_binding(),
                },
            ],
        }));
    }

    pub fn update_uniforms(&self, queue: &wgpu::Queue, buffers: &BufferSet, edge_count: u32, config: &ForceConfig) {
        queue.write_buffer(
            &buffers.spring_uniforms,
            0,
            bytemuck::bytes_of(&SpringUniforms {
                edge_count,
                strength: config.spring_strength,
                rest_length: config.spring_length,
                _pad: 0,
            }),
        );
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, edge_count: u32) {
        if edge_count == 0 {
            return;
        }
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("springs_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(edge_count, WORKGROUP_SIZE), 1, 1);
    }
}

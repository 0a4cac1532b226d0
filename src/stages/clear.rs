//! Pass 1/5 of a tick: zero the force accumulator before repulsion and
//! springs add into it.

use crate::algorithms::{compile_shader, compute_pipeline, storage_entry, uniform_entry, workgroups_for};
use crate::buffers::layout::ClearUniforms;
use crate::buffers::BufferSet;

const SHADER_SRC: &str = include_str!("../../shaders/clear_forces.wgsl");
const WORKGROUP_SIZE: u32 = 256;

pub struct ClearStage {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
}

impl ClearStage {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = compile_shader(device, "clear_forces", SHADER_SRC);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("clear_forces_layout"),
            entries: &[storage_entry(0, false), uniform_entry(1)],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("clear_forces_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = compute_pipeline(device, "clear_forces_pipeline", &pipeline_layout, &module, "main");
        Self {
            pipeline,
            layout,
            bind_group: None,
        }
    }

    pub fn rebuild_bind_group(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("clear_forces_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.forces.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.clear_uniforms.as_entire_binding(),
                },
            ],
        }));
    }

    pub fn update_uniforms(&self, queue: &wgpu::Queue, buffers: &BufferSet, node_count: u32) {
        queue.write_buffer(
            &buffers.clear_uniforms,
            0,
            bytemuck::bytes_of(&ClearUniforms {
                node_count,
                _pad: [0; 3],
            }),
        );
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("clear_forces_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(node_count, WORKGROUP_SIZE), 1, 1);
    }
}

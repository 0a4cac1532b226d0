//! Pass 5/5 of a tick: turn accumulated `forces` into the next
//! position/velocity pair. The only stage that writes to the ping-pong
//! `_out` halves of [`BufferSet`] — repulsion, springs and collision all
//! read/write the `_in` half in place.

use crate::algorithms::{compile_shader, compute_pipeline, storage_entry, uniform_entry, workgroups_for};
use crate::buffers::layout::IntegrationUniforms;
use crate::buffers::BufferSet;

const SHADER_SRC: &str = include_str!("../../shaders/integrate.wgsl");
const WORKGROUP_SIZE: u32 = 256;

/// Sentinel for "no node pinned", mirroring `relativity_atlas::NO_PARENT`.
pub const NO_PINNED_NODE: u32 = u32::MAX;

pub struct IntegrateStage {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
}

#[allow(clippy::too_many_arguments)]
pub struct IntegrationParams {
    pub node_count: u32,
    pub dt: f32,
    pub damping: f32,
    pub max_velocity: f32,
    pub alpha: f32,
    pub depth_settling_spread: f32,
    pub alpha_min: f32,
    pub gravity_strength: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub pinned_node: u32,
}

impl IntegrateStage {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = compile_shader(device, "integrate", SHADER_SRC);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("integrate_layout"),
            entries: &[
                storage_entry(0, true),  // positions_in
                storage_entry(1, false), // positions_out
                storage_entry(2, true),  // velocities_in
                storage_entry(3, false), // velocities_out
                storage_entry(4, true),  // forces
                storage_entry(5, true),  // node_depth
                uniform_entry(6),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("integrate_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = compute_pipeline(device, "integrate_pipeline", &pipeline_layout, &module, "main");
        Self {
            pipeline,
            layout,
            bind_group: None,
        }
    }

    /// Rebuilt whenever the ping-pong side flips or buffers are grown —
    /// both change which physical buffer `_in`/`_out` point at.
    pub fn rebuild_bind_group(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("integrate_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.positions_in().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.positions_out().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffers.velocities_in().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffers.velocities_out().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: buffers.forces.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: buffers.node_depth.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: buffers.integration_uniforms.as_entire_binding(),
                },
            ],
        }));
    }

    pub fn update_uniforms(&self, queue: &wgpu::Queue, buffers: &BufferSet, params: &IntegrationParams) {
        queue.write_buffer(
            &buffers.integration_uniforms,
            0,
            bytemuck::bytes_of(&IntegrationUniforms {
                node_count: params.node_count,
                dt: params.dt,
                damping: params.damping,
                max_velocity: params.max_velocity,
                alpha: params.alpha,
                depth_settling_spread: params.depth_settling_spread,
                alpha_min: params.alpha_min,
                gravity_strength: params.gravity_strength,
                center_x: params.center_x,
                center_y: params.center_y,
                pinned_node: params.pinned_node,
                _pad: 0,
            }),
        );
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("integrate_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(node_count, WORKGROUP_SIZE), 1, 1);
    }
}

//! LinLog energy-model repulsion: repulsion falls off
//! as `1/d` instead of `1/d^2`, producing tighter, more clustered layouts;
//! optional strong-gravity pulls every node toward the origin regardless
//! of degree.
//!
//! Grounded in the same single-dispatch shape as [`super::n2`], since
//! LinLog is still an O(N^2) all-pairs pass — only the force law and the
//! extra gravity term differ.

use wgpu::util::DeviceExt;

use super::{compile_shader, compute_pipeline, storage_entry, uniform_entry, workgroups_for, Algorithm, AlgorithmKind};
use crate::buffers::BufferSet;
use crate::config::ForceConfig;
use crate::error::EngineResult;
use crate::graph::GraphState;

const SHADER_SRC: &str = include_str!("../../shaders/repulsion_linlog.wgsl");
const WORKGROUP_SIZE: u32 = 64;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct LinLogUniforms {
    node_count: u32,
    repulsion_k: f32,
    attraction_exponent: f32,
    strong_gravity: u32,
    gravity_strength: f32,
    center_x: f32,
    center_y: f32,
    _pad: f32,
}

pub struct LinLog {
    pipeline: Option<wgpu::ComputePipeline>,
    layout: Option<wgpu::BindGroupLayout>,
    bind_group: Option<wgpu::BindGroup>,
    uniforms: Option<wgpu::Buffer>,
    strong_gravity: bool,
}

impl LinLog {
    pub fn new() -> Self {
        Self {
            pipeline: None,
            layout: None,
            bind_group: None,
            uniforms: None,
            strong_gravity: false,
        }
    }
}

impl Algorithm for LinLog {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::LinLog
    }

    fn handles_gravity(&self) -> bool {
        self.strong_gravity
    }

    fn create_pipelines(&mut self, device: &wgpu::Device) -> EngineResult<()> {
        let module = compile_shader(device, "repulsion_linlog", SHADER_SRC);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("repulsion_linlog_layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                uniform_entry(2),
                storage_entry(3, true), // node_flags
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("repulsion_linlog_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        self.pipeline = Some(compute_pipeline(
            device,
            "repulsion_linlog_pipeline",
            &pipeline_layout,
            &module,
            "main",
        ));
        self.layout = Some(layout);
        Ok(())
    }

    fn resize_buffers(&mut self, device: &wgpu::Device, _node_capacity: u32, _edge_capacity: u32) {
        if self.uniforms.is_none() {
            self.uniforms = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("repulsion_linlog_uniforms"),
                contents: bytemuck::bytes_of(&LinLogUniforms {
                    node_count: 0,
                    repulsion_k: 1.0,
                    attraction_exponent: 0.0,
                    strong_gravity: 0,
                    gravity_strength: 0.01,
                    center_x: 0.0,
                    center_y: 0.0,
                    _pad: 0.0,
                }),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            }));
        }
    }

    fn rebuild_bind_groups(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        let (Some(layout), Some(uniforms)) = (&self.layout, &self.uniforms) else {
            return;
        };
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("repulsion_linlog_bind_group"),
            layout,
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
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffers.node_flags.as_entire_binding(),
                },
            ],
        }));
    }

    fn update_uniforms(&mut self, queue: &wgpu::Queue, graph: &GraphState, config: &ForceConfig, _alpha: f32) {
        self.strong_gravity = config.linlog.strong_gravity;
        if let Some(buf) = &self.uniforms {
            queue.write_buffer(
                buf,
                0,
                bytemuck::bytes_of(&LinLogUniforms {
                    node_count: graph.node_high_water,
                    repulsion_k: config.linlog.repulsion_k,
                    attraction_exponent: config.linlog.attraction_exponent,
                    strong_gravity: config.linlog.strong_gravity as u32,
                    gravity_strength: config.linlog.gravity_strength,
                    center_x: config.center_x,
                    center_y: config.center_y,
                    _pad: 0.0,
                }),
            );
        }
    }

    fn record_repulsion_pass(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32) {
        let (Some(pipeline), Some(bind_group)) = (&self.pipeline, &self.bind_group) else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("repulsion_linlog_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(node_count, WORKGROUP_SIZE), 1, 1);
    }
}

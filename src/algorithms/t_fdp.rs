//! t-FDP: repulsion exponent tunable via `beta`, scaled by
//! `alpha` and `gamma`, subject to the paper's convergence constraint
//! `alpha * (1 + beta) < 1` ([`crate::config::TFdpConfig::enforce_constraint`]
//! keeps the CPU-side config valid; this backend just consumes it).
//!
//! Same single-dispatch O(N^2) shape as [`super::n2`]/[`super::linlog`].

use wgpu::util::DeviceExt;

use super::{compile_shader, compute_pipeline, storage_entry, uniform_entry, workgroups_for, Algorithm, AlgorithmKind};
use crate::buffers::BufferSet;
use crate::config::ForceConfig;
use crate::error::EngineResult;
use crate::graph::GraphState;

const SHADER_SRC: &str = include_str!("../../shaders/repulsion_tfdp.wgsl");
const WORKGROUP_SIZE: u32 = 64;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct TFdpUniforms {
    node_count: u32,
    alpha: f32,
    beta: f32,
    gamma: f32,
    edge_weight_scale: f32,
    _pad: [f32; 3],
}

pub struct TFdp {
    pipeline: Option<wgpu::ComputePipeline>,
    layout: Option<wgpu::BindGroupLayout>,
    bind_group: Option<wgpu::BindGroup>,
    uniforms: Option<wgpu::Buffer>,
}

impl TFdp {
    pub fn new() -> Self {
        Self {
            pipeline: None,
            layout: None,
            bind_group: None,
            uniforms: None,
        }
    }
}

impl Algorithm for TFdp {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::TFdp
    }

    fn create_pipelines(&mut self, device: &wgpu::Device) -> EngineResult<()> {
        let module = compile_shader(device, "repulsion_tfdp", SHADER_SRC);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("repulsion_tfdp_layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                uniform_entry(2),
                storage_entry(3, true), // node_flags
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("repulsion_tfdp_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        self.pipeline = Some(compute_pipeline(
            device,
            "repulsion_tfdp_pipeline",
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
                label: Some("repulsion_tfdp_uniforms"),
                contents: bytemuck::bytes_of(&TFdpUniforms {
                    node_count: 0,
                    alpha: 0.2,
                    beta: 2.0,
                    gamma: 1.0,
                    edge_weight_scale: 1.0,
                    _pad: [0.0; 3],
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
            label: Some("repulsion_tfdp_bind_group"),
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
        let mut cfg = config.t_fdp.clone();
        cfg.enforce_constraint();
        if let Some(buf) = &self.uniforms {
            queue.write_buffer(
                buf,
                0,
                bytemuck::bytes_of(&TFdpUniforms {
                    node_count: graph.node_high_water,
                    alpha: cfg.alpha,
                    beta: cfg.beta,
                    gamma: cfg.gamma,
                    edge_weight_scale: cfg.edge_weight_scale,
                    _pad: [0.0; 3],
                }),
            );
        }
    }

    fn record_repulsion_pass(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32) {
        let (Some(pipeline), Some(bind_group)) = (&self.pipeline, &self.bind_group) else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("repulsion_tfdp_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(node_count, WORKGROUP_SIZE), 1, 1);
    }
}

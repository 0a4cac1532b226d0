//! Naive O(N^2) repulsion. Every node repels every other
//! node directly; the simplest possible correct backend, used below the
//! Barnes-Hut crossover (default: N < 2000) and as the CPU reference
//! path's ground truth.
//!
//! One bind group, one pipeline, one dispatch over `node_count`.

use wgpu::util::DeviceExt;

use super::{compile_shader, compute_pipeline, storage_entry, uniform_entry, workgroups_for, Algorithm, AlgorithmKind};
use crate::buffers::BufferSet;
use crate::config::ForceConfig;
use crate::error::EngineResult;
use crate::graph::GraphState;

const SHADER_SRC: &str = include_str!("../../shaders/repulsion_n2.wgsl");
const WORKGROUP_SIZE: u32 = 64;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct N2Uniforms {
    node_count: u32,
    strength: f32,
    min_distance: f32,
    max_distance: f32,
}

pub struct NaiveN2 {
    pipeline: Option<wgpu::ComputePipeline>,
    layout: Option<wgpu::BindGroupLayout>,
    bind_group: Option<wgpu::BindGroup>,
    uniforms: Option<wgpu::Buffer>,
    node_count: u32,
}

impl NaiveN2 {
    pub fn new() -> Self {
        Self {
            pipeline: None,
            layout: None,
            bind_group: None,
            uniforms: None,
            node_count: 0,
        }
    }
}

impl Algorithm for NaiveN2 {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::N2
    }

    fn create_pipelines(&mut self, device: &wgpu::Device) -> EngineResult<()> {
        let module = compile_shader(device, "repulsion_n2", SHADER_SRC);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("repulsion_n2_layout"),
            entries: &[
                storage_entry(0, true),  // positions
                storage_entry(1, false), // forces (accumulate)
                uniform_entry(2),        // uniforms
                storage_entry(3, true),  // node_flags
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("repulsion_n2_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        self.pipeline = Some(compute_pipeline(
            device,
            "repulsion_n2_pipeline",
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
                label: Some("repulsion_n2_uniforms"),
                contents: bytemuck::bytes_of(&N2Uniforms {
                    node_count: 0,
                    strength: -50.0,
                    min_distance: 1.0,
                    max_distance: 1000.0,
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
            label: Some("repulsion_n2_bind_group"),
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
        self.node_count = graph.node_high_water;
        if let Some(buf) = &self.uniforms {
            queue.write_buffer(
                buf,
                0,
                bytemuck::bytes_of(&N2Uniforms {
                    node_count: graph.node_high_water,
                    strength: config.repulsion_strength,
                    min_distance: config.repulsion_distance_min,
                    max_distance: config.repulsion_distance_max,
                }),
            );
        }
    }

    fn record_repulsion_pass(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32) {
        let (Some(pipeline), Some(bind_group)) = (&self.pipeline, &self.bind_group) else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("repulsion_n2_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(node_count, WORKGROUP_SIZE), 1, 1);
    }
}

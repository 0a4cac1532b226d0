//! Precomputed layouts: tidy-tree, community, and codebase are
//! computed once per topology change on the CPU rather than iterated
//! every tick, then held in place by a spring-to-target GPU pass shared
//! by all three — recomputing a circle-packing or Louvain partition every
//! frame would be wasted work once the graph stops changing.
//!
//! A CPU-owned authoritative layout pass, consumed by the GPU path as
//! plain data rather than recomputed there.

mod codebase;
mod community;
mod tidy_tree;

pub(crate) use codebase::layout as codebase_layout;
pub(crate) use community::layout as community_layout;
pub(crate) use tidy_tree::layout as tidy_tree_layout;

use wgpu::util::DeviceExt;

use super::{compile_shader, compute_pipeline, storage_entry, uniform_entry, workgroups_for, Algorithm, AlgorithmKind};
use crate::buffers::BufferSet;
use crate::config::ForceConfig;
use crate::error::EngineResult;
use crate::graph::GraphState;

const SHADER_SRC: &str = include_str!("../../../shaders/spring_to_target.wgsl");
const WORKGROUP_SIZE: u32 = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrecomputedKind {
    TidyTree,
    Community,
    Codebase,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SpringToTargetUniforms {
    node_count: u32,
    stiffness: f32,
    damping: f32,
    _pad: u32,
}

/// Shared backend for all three precomputed-layout algorithms: only the
/// CPU-side layout function and per-kind config differ.
pub struct PrecomputedAlgorithm {
    kind: PrecomputedKind,
    pipeline: Option<wgpu::ComputePipeline>,
    layout: Option<wgpu::BindGroupLayout>,
    bind_group: Option<wgpu::BindGroup>,
    uniforms: Option<wgpu::Buffer>,
    targets: Option<wgpu::Buffer>,
    node_capacity: u32,
}

impl PrecomputedAlgorithm {
    pub fn new(kind: PrecomputedKind) -> Self {
        Self {
            kind,
            pipeline: None,
            layout: None,
            bind_group: None,
            uniforms: None,
            targets: None,
            node_capacity: 0,
        }
    }

    fn compute_targets(&self, graph: &GraphState, config: &ForceConfig) -> Vec<[f32; 2]> {
        match self.kind {
            PrecomputedKind::TidyTree => tidy_tree::layout(graph, &config.tidy_tree),
            PrecomputedKind::Community => community::layout(graph, &config.community),
            PrecomputedKind::Codebase => codebase::layout(graph, &config.codebase),
        }
    }

    fn stiffness_damping(&self, config: &ForceConfig) -> (f32, f32) {
        match self.kind {
            PrecomputedKind::TidyTree => (
                config.tidy_tree.spring_to_target_stiffness,
                config.tidy_tree.spring_to_target_damping,
            ),
            PrecomputedKind::Community => (
                config.community.spring_to_target_stiffness,
                config.community.spring_to_target_damping,
            ),
            PrecomputedKind::Codebase => (
                config.codebase.spring_to_target_stiffness,
                config.codebase.spring_to_target_damping,
            ),
        }
    }
}

impl Algorithm for PrecomputedAlgorithm {
    fn kind(&self) -> AlgorithmKind {
        match self.kind {
            PrecomputedKind::TidyTree => AlgorithmKind::TidyTree,
            PrecomputedKind::Community => AlgorithmKind::Community,
            PrecomputedKind::Codebase => AlgorithmKind::Codebase,
        }
    }

    fn requires_csr(&self) -> bool {
        true
    }

    fn create_pipelines(&mut self, device: &wgpu::Device) -> EngineResult<()> {
        let module = compile_shader(device, "spring_to_target", SHADER_SRC);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("spring_to_target_layout"),
            entries: &[storage_entry(0, true), storage_entry(1, false), storage_entry(2, true), uniform_entry(3)],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("spring_to_target_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        self.pipeline = Some(compute_pipeline(device, "spring_to_target_pipeline", &pipeline_layout, &module, "main"));
        self.layout = Some(layout);
        Ok(())
    }

    fn resize_buffers(&mut self, device: &wgpu::Device, node_capacity: u32, _edge_capacity: u32) {
        if self.uniforms.is_none() {
            self.uniforms = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("spring_to_target_uniforms"),
                contents: bytemuck::bytes_of(&SpringToTargetUniforms {
                    node_count: 0,
                    stiffness: 0.3,
                    damping: 0.8,
                    _pad: 0,
                }),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            }));
        }
        if node_capacity > self.node_capacity {
            self.targets = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("spring_to_target_targets"),
                size: ((node_capacity as u64) * 8).max(16),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.node_capacity = node_capacity;
        }
    }

    fn rebuild_bind_groups(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        let (Some(layout), Some(uniforms), Some(targets)) = (&self.layout, &self.uniforms, &self.targets) else {
            return;
        };
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("spring_to_target_bind_group"),
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
                    resource: targets.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        }));
    }

    fn update_uniforms(&mut self, queue: &wgpu::Queue, graph: &GraphState, config: &ForceConfig, _alpha: f32) {
        // Recomputed whenever the tick driver calls this (SimulationPipeline
        // only calls it after a topology-changing mutation bumped alpha, so
        // this is not a full per-frame recompute in practice).
        let targets = self.compute_targets(graph, config);
        if let Some(buf) = &self.targets {
            if !targets.is_empty() {
                queue.write_buffer(buf, 0, bytemuck::cast_slice(&targets));
            }
        }
        let (stiffness, damping) = self.stiffness_damping(config);
        if let Some(buf) = &self.uniforms {
            queue.write_buffer(
                buf,
                0,
                bytemuck::bytes_of(&SpringToTargetUniforms {
                    node_count: graph.node_high_water,
                    stiffness,
                    damping,
                    _pad: 0,
                }),
            );
        }
    }

    fn record_repulsion_pass(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32) {
        let (Some(pipeline), Some(bind_group)) = (&self.pipeline, &self.bind_group) else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("spring_to_target_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(node_count, WORKGROUP_SIZE), 1, 1);
    }
}

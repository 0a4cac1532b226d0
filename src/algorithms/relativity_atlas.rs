//! Relativity Atlas: hierarchical repulsion for tree-shaped
//! graphs. A node's depth and subtree mass are propagated up a directed
//! hierarchy (first incoming edge = parent) on the CPU each tick via the
//! forward CSR, then a GPU kernel applies an orbit spring toward each
//! node's parent, a tangential term, sibling ("cousin") repulsion scoped
//! to a parent's own children, and a configurable gravity curve scaled by
//! subtree mass.
//!
//! Uses the same CPU-aggregate / GPU-consume split as [`super::barnes_hut`],
//! generalized from a spatial tree to the graph's own hierarchy.

use wgpu::util::DeviceExt;

use super::{compile_shader, compute_pipeline, storage_entry, uniform_entry, workgroups_for, Algorithm, AlgorithmKind};
use crate::buffers::BufferSet;
use crate::config::{ForceConfig, GravityCurve};
use crate::error::EngineResult;
use crate::graph::GraphState;

const SHADER_SRC: &str = include_str!("../../shaders/repulsion_relativity_atlas.wgsl");
const WORKGROUP_SIZE: u32 = 64;
const NO_PARENT: u32 = u32::MAX;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct AtlasUniforms {
    node_count: u32,
    gravity_curve: u32,
    cousin_repulsion_enabled: u32,
    phantom_zone_enabled: u32,
    base_mass: f32,
    child_mass_factor: f32,
    orbit_radius: f32,
    tangential_multiplier: f32,
    cousin_repulsion_strength: f32,
    phantom_zone_margin: f32,
    density_field_enabled: u32,
    density_field_strength: f32,
    gravity_strength: f32,
    gravity_curve_custom: f32,
    orbit_spring_damping: f32,
    sibling_spread: f32,
    center_x: f32,
    center_y: f32,
    _pad: [f32; 2],
}

pub struct RelativityAtlas {
    pipeline: Option<wgpu::ComputePipeline>,
    layout: Option<wgpu::BindGroupLayout>,
    bind_group: Option<wgpu::BindGroup>,
    uniforms: Option<wgpu::Buffer>,
    parents: Option<wgpu::Buffer>,
    depths: Option<wgpu::Buffer>,
    subtree_masses: Option<wgpu::Buffer>,
    csr_offsets: Option<wgpu::Buffer>,
    csr_targets: Option<wgpu::Buffer>,
    node_capacity: u32,
    edge_capacity: u32,
}

impl RelativityAtlas {
    pub fn new() -> Self {
        Self {
            pipeline: None,
            layout: None,
            bind_group: None,
            uniforms: None,
            parents: None,
            depths: None,
            subtree_masses: None,
            csr_offsets: None,
            csr_targets: None,
            node_capacity: 0,
            edge_capacity: 0,
        }
    }

    /// Recompute parent/depth/subtree-mass from the graph's current
    /// forward CSR and upload them. First incoming edge of a node (its
    /// inverse-adjacency head) is taken as its hierarchical parent; nodes
    /// with no incoming edges are roots (see DESIGN.md for why this edge
    /// direction was chosen as the hierarchy edge).
    pub fn rebuild_hierarchy(&mut self, queue: &wgpu::Queue, graph: &GraphState) {
        let n = graph.node_high_water as usize;
        if n == 0 {
            return;
        }
        let mut parent = vec![NO_PARENT; n];
        for s in 0..n {
            if let Some(&edge) = graph.inverse_adjacency_of(s as u32).first() {
                parent[s] = graph.edge_sources[edge as usize];
            }
        }

        let mut depth = vec![0f32; n];
        let mut order: Vec<u32> = (0..n as u32).collect();
        // BFS via repeated relaxation (no guaranteed topological order on
        // the slot array); bounded by node count so it always terminates.
        for _ in 0..n {
            let mut changed = false;
            for &s in order.iter() {
                let p = parent[s as usize];
                if p != NO_PARENT && p != s {
                    let candidate = depth[p as usize] + 1.0;
                    if candidate > depth[s as usize] {
                        depth[s as usize] = candidate;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        order.sort_by(|&a, &b| depth[a as usize].partial_cmp(&depth[b as usize]).unwrap());

        let mut subtree_mass = vec![1f32; n];
        for &s in order.iter().rev() {
            let p = parent[s as usize];
            if p != NO_PARENT && p != s {
                subtree_mass[p as usize] += subtree_mass[s as usize];
            }
        }

        let csr = graph.generate_forward_csr();

        if let Some(buf) = &self.parents {
            queue.write_buffer(buf, 0, bytemuck::cast_slice(&parent));
        }
        if let Some(buf) = &self.depths {
            queue.write_buffer(buf, 0, bytemuck::cast_slice(&depth));
        }
        if let Some(buf) = &self.subtree_masses {
            queue.write_buffer(buf, 0, bytemuck::cast_slice(&subtree_mass));
        }
        if let Some(buf) = &self.csr_offsets {
            queue.write_buffer(buf, 0, bytemuck::cast_slice(&csr.offsets));
        }
        if let Some(buf) = &self.csr_targets {
            if !csr.targets.is_empty() {
                queue.write_buffer(buf, 0, bytemuck::cast_slice(&csr.targets));
            }
        }
    }
}

impl Algorithm for RelativityAtlas {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::RelativityAtlas
    }

    fn handles_gravity(&self) -> bool {
        true
    }

    fn requires_csr(&self) -> bool {
        true
    }

    fn create_pipelines(&mut self, device: &wgpu::Device) -> EngineResult<()> {
        let module = compile_shader(device, "repulsion_relativity_atlas", SHADER_SRC);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("repulsion_relativity_atlas_layout"),
            entries: &[
                storage_entry(0, true),  // positions
                storage_entry(1, false), // forces
                storage_entry(2, true),  // parents
                storage_entry(3, true),  // depths
                storage_entry(4, true),  // subtree masses
                storage_entry(5, true),  // csr offsets
                storage_entry(6, true),  // csr targets
                uniform_entry(7),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("repulsion_relativity_atlas_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        self.pipeline = Some(compute_pipeline(
            device,
            "repulsion_relativity_atlas_pipeline",
            &pipeline_layout,
            &module,
            "main",
        ));
        self.layout = Some(layout);
        Ok(())
    }

    fn resize_buffers(&mut self, device: &wgpu::Device, node_capacity: u32, edge_capacity: u32) {
        if self.uniforms.is_none() {
            self.uniforms = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("repulsion_relativity_atlas_uniforms"),
                contents: bytemuck::bytes_of(&AtlasUniforms::zeroed()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            }));
        }
        if node_capacity > self.node_capacity {
            self.parents = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("relativity_atlas_parents"),
                size: ((node_capacity as u64) * 4).max(16),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.depths = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("relativity_atlas_depths"),
                size: ((node_capacity as u64) * 4).max(16),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.subtree_masses = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("relativity_atlas_subtree_masses"),
                size: ((node_capacity as u64) * 4).max(16),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.csr_offsets = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("relativity_atlas_csr_offsets"),
                size: (((node_capacity + 1) as u64) * 4).max(16),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.node_capacity = node_capacity;
        }
        if edge_capacity > self.edge_capacity {
            self.csr_targets = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("relativity_atlas_csr_targets"),
                size: ((edge_capacity as u64) * 4).max(16),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.edge_capacity = edge_capacity;
        }
    }

    fn rebuild_bind_groups(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        let (Some(layout), Some(uniforms), Some(parents), Some(depths), Some(masses), Some(offsets), Some(targets)) = (
            &self.layout,
            &self.uniforms,
            &self.parents,
            &self.depths,
            &self.subtree_masses,
            &self.csr_offsets,
            &self.csr_targets,
        ) else {
            return;
        };
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("repulsion_relativity_atlas_bind_group"),
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
                    resource: parents.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: depths.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: masses.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: offsets.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: targets.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        }));
    }

    fn update_uniforms(&mut self, queue: &wgpu::Queue, graph: &GraphState, config: &ForceConfig, _alpha: f32) {
        self.rebuild_hierarchy(queue, graph);
        let c = &config.relativity;
        let (curve_tag, custom) = match c.gravity_curve {
            GravityCurve::Linear => (0u32, 0.0),
            GravityCurve::Inverse => (1u32, 0.0),
            GravityCurve::Soft => (2u32, 0.0),
            GravityCurve::Custom(exp) => (3u32, exp),
        };
        if let Some(buf) = &self.uniforms {
            queue.write_buffer(
                buf,
                0,
                bytemuck::bytes_of(&AtlasUniforms {
                    node_count: graph.node_high_water,
                    gravity_curve: curve_tag,
                    cousin_repulsion_enabled: c.cousin_repulsion_enabled as u32,
                    phantom_zone_enabled: c.phantom_zone_enabled as u32,
                    base_mass: c.base_mass,
                    child_mass_factor: c.child_mass_factor,
                    orbit_radius: c.orbit_radius,
                    tangential_multiplier: c.tangential_multiplier,
                    cousin_repulsion_strength: c.cousin_repulsion_strength,
                    phantom_zone_margin: c.phantom_zone_margin,
                    density_field_enabled: c.density_field_enabled as u32,
                    density_field_strength: c.density_field_strength,
                    gravity_strength: c.gravity_strength,
                    gravity_curve_custom: custom,
                    orbit_spring_damping: c.orbit_spring_damping,
                    sibling_spread: c.sibling_spread,
                    center_x: config.center_x,
                    center_y: config.center_y,
                    _pad: [0.0; 2],
                }),
            );
        }
    }

    fn record_repulsion_pass(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32) {
        let (Some(pipeline), Some(bind_group)) = (&self.pipeline, &self.bind_group) else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("repulsion_relativity_atlas_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(node_count, WORKGROUP_SIZE), 1, 1);
    }
}

impl AtlasUniforms {
    fn zeroed() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_rebuild_assigns_increasing_depth() {
        // This is exercised end-to-end via the CPU reference backend in
        // integration tests; here we just check the pure helper math used
        // by `rebuild_hierarchy` doesn't panic on a disconnected node.
        let parent = vec![NO_PARENT, 0u32, 1u32];
        let mut depth = vec![0f32; 3];
        for _ in 0..3 {
            let mut changed = false;
            for s in 0..3 {
                let p = parent[s];
                if p != NO_PARENT {
                    let candidate = depth[p as usize] + 1.0;
                    if candidate > depth[s] {
                        depth[s] = candidate;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        assert_eq!(depth, vec![0.0, 1.0, 2.0]);
    }
}

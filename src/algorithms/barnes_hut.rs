//! Barnes-Hut repulsion: builds a linear BVH over
//! node positions every tick (Morton codes + radix sort + Karras
//! construction, bottom-up center-of-mass aggregation) on the CPU, then
//! uploads the tree and lets a GPU kernel do the theta-criterion
//! traversal per node. Crossover default: used above ~2000 nodes where
//! [`super::n2`]'s O(N^2) cost dominates.
//!
//! Tree construction happens once per tick on the CPU (bucket counts,
//! prefix sum, then a scatter pass build the sorted Morton order), leaving
//! the GPU side to do only per-node tree lookups.

use wgpu::util::DeviceExt;

use super::{compile_shader, compute_pipeline, storage_entry, uniform_entry, workgroups_for, Algorithm, AlgorithmKind};
use crate::buffers::BufferSet;
use crate::config::ForceConfig;
use crate::error::EngineResult;
use crate::graph::GraphState;

const SHADER_SRC: &str = include_str!("../../shaders/repulsion_barnes_hut.wgsl");
const WORKGROUP_SIZE: u32 = 64;
/// Caps traversal stack depth in the shader; also the cap on tree depth a
/// 32-bit interleaved Morton code can usefully distinguish.
const MAX_TRAVERSAL_DEPTH: u32 = 64;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BhUniforms {
    node_count: u32,
    internal_node_count: u32,
    strength: f32,
    min_distance: f32,
    theta: f32,
    max_depth: u32,
    _pad: [u32; 2],
}

/// One node of the linear BVH: leaves and internal nodes share a layout,
/// distinguished by the high bit of `left`/`right` (set = leaf index into
/// the sorted position array, clear = internal node index).
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuTreeNode {
    com_x: f32,
    com_y: f32,
    mass: f32,
    half_extent: f32,
    left: u32,
    right: u32,
}

const LEAF_BIT: u32 = 0x8000_0000;

fn morton_code(x: f32, y: f32, min: (f32, f32), inv_extent: (f32, f32)) -> u32 {
    let nx = ((x - min.0) * inv_extent.0).clamp(0.0, 1.0);
    let ny = ((y - min.1) * inv_extent.1).clamp(0.0, 1.0);
    let xi = (nx * 65535.0) as u32;
    let yi = (ny * 65535.0) as u32;
    interleave16(xi) | (interleave16(yi) << 1)
}

fn interleave16(mut v: u32) -> u32 {
    v &= 0x0000_ffff;
    v = (v | (v << 8)) & 0x00ff_00ff;
    v = (v | (v << 4)) & 0x0f0f_0f0f;
    v = (v | (v << 2)) & 0x3333_3333;
    v = (v | (v << 1)) & 0x5555_5555;
    v
}

/// LSD radix sort over the low 32 bits of the Morton code, 8 bits per
/// pass, stable (required so ties resolve deterministically tick to
/// tick —).
fn radix_sort_by_morton(order: &mut [u32], codes: &[u32]) {
    let mut buf = order.to_vec();
    for pass in 0..4u32 {
        let shift = pass * 8;
        let mut counts = [0u32; 257];
        for &idx in order.iter() {
            let bucket = ((codes[idx as usize] >> shift) & 0xff) as usize;
            counts[bucket + 1] += 1;
        }
        for i in 0..256 {
            counts[i + 1] += counts[i];
        }
        for &idx in order.iter() {
            let bucket = ((codes[idx as usize] >> shift) & 0xff) as usize;
            buf[counts[bucket] as usize] = idx;
            counts[bucket] += 1;
        }
        order.copy_from_slice(&buf);
    }
}

fn clz32(v: u32) -> u32 {
    if v == 0 {
        32
    } else {
        v.leading_zeros()
    }
}

/// Common-prefix length between `sorted_codes[i]` and `sorted_codes[j]`,
/// Karras's `delta` function; out-of-range indices return -1 (treated as
/// `-1i32` below) so boundary nodes never extend past the array.
fn delta(sorted_codes: &[u32], i: i64, j: i64) -> i64 {
    let n = sorted_codes.len() as i64;
    if j < 0 || j >= n {
        return -1;
    }
    let (a, b) = (sorted_codes[i as usize], sorted_codes[j as usize]);
    if a == b {
        // tie-break on index to keep delta strictly increasing with |i-j|
        64 + clz32((i as u32) ^ (j as u32)) as i64
    } else {
        clz32(a ^ b) as i64
    }
}

/// Karras 2012 "Maximizing Parallelism in the Construction of BVHs,
/// Octrees, and k-d Trees": one internal node per leaf-1, built directly
/// from sorted Morton codes without any pointer-chasing recursion.
struct KarrasNode {
    left: u32,
    right: u32,
}

fn build_karras_tree(sorted_codes: &[u32]) -> Vec<KarrasNode> {
    let n = sorted_codes.len();
    if n < 2 {
        return Vec::new();
    }
    let mut internal = Vec::with_capacity(n - 1);
    for i in 0..(n - 1) {
        let ii = i as i64;
        let d = if delta(sorted_codes, ii, ii + 1) > delta(sorted_codes, ii, ii - 1) {
            1i64
        } else {
            -1i64
        };
        let delta_min = delta(sorted_codes, ii, ii - d);
        let mut l_max = 2i64;
        while delta(sorted_codes, ii, ii + l_max * d) > delta_min {
            l_max *= 2;
        }
        let mut l = 0i64;
        let mut t = l_max / 2;
        while t >= 1 {
            if delta(sorted_codes, ii, ii + (l + t) * d) > delta_min {
                l += t;
            }
            t /= 2;
        }
        let j = ii + l * d;
        let delta_node = delta(sorted_codes, ii, j);

        let mut s = 0i64;
        let mut t = l;
        loop {
            t = (t + 1) / 2;
            if delta(sorted_codes, ii, ii + (s + t) * d) > delta_node {
                s += t;
            }
            if t == 1 {
                break;
            }
        }
        let gamma = ii + s * d + d.min(0);

        let (lo, hi) = if d > 0 { (ii, j) } else { (j, ii) };
        let left = if gamma == lo { LEAF_BIT | gamma as u32 } else { gamma as u32 };
        let right = if gamma + 1 == hi {
            LEAF_BIT | ((gamma + 1) as u32)
        } else {
            (gamma + 1) as u32
        };
        internal.push(KarrasNode { left, right });
    }
    internal
}

/// Bottom-up center-of-mass aggregation and bounding-extent computation
/// over the Karras tree, producing the GPU-uploadable node array (leaves
/// first conceptually, but addressed via the `LEAF_BIT` tag so a single
/// flat `internal_nodes` array suffices for traversal).
fn aggregate(
    sorted_positions: &[(f32, f32)],
    internal: &[KarrasNode],
) -> Vec<GpuTreeNode> {
    let n = sorted_positions.len();
    if internal.is_empty() {
        if n == 1 {
            return vec![GpuTreeNode {
                com_x: sorted_positions[0].0,
                com_y: sorted_positions[0].1,
                mass: 1.0,
                half_extent: 0.0,
                left: LEAF_BIT,
                right: LEAF_BIT,
            }];
        }
        return Vec::new();
    }
    let mut nodes: Vec<GpuTreeNode> = internal
        .iter()
        .map(|k| GpuTreeNode {
            com_x: 0.0,
            com_y: 0.0,
            mass: 0.0,
            half_extent: 0.0,
            left: k.left,
            right: k.right,
        })
        .collect();

    /// Returns `(com_x, com_y, mass, min_x, max_x, min_y, max_y)`.
    fn resolve(
        nodes: &mut [GpuTreeNode],
        sorted_positions: &[(f32, f32)],
        idx: u32,
    ) -> (f32, f32, f32, f32, f32, f32, f32) {
        if idx & LEAF_BIT != 0 {
            let (x, y) = sorted_positions[(idx & !LEAF_BIT) as usize];
            return (x, y, 1.0, x, x, y, y);
        }
        let node_idx = idx as usize;
        let (left, right) = (nodes[node_idx].left, nodes[node_idx].right);
        let (lcx, lcy, lm, lminx, lmaxx, lminy, lmaxy) = resolve(nodes, sorted_positions, left);
        let (rcx, rcy, rm, rminx, rmaxx, rminy, rmaxy) = resolve(nodes, sorted_positions, right);

        let total_mass = lm + rm;
        let com_x = (lcx * lm + rcx * rm) / total_mass;
        let com_y = (lcy * lm + rcy * rm) / total_mass;
        let minx = lminx.min(rminx);
        let maxx = lmaxx.max(rmaxx);
        let miny = lminy.min(rminy);
        let maxy = lmaxy.max(rmaxy);

        nodes[node_idx].com_x = com_x;
        nodes[node_idx].com_y = com_y;
        nodes[node_idx].mass = total_mass;
        nodes[node_idx].half_extent = (maxx - minx).max(maxy - miny) * 0.5;
        (com_x, com_y, total_mass, minx, maxx, miny, maxy)
    }

    resolve(&mut nodes, sorted_positions, 0);
    nodes
}

pub struct BarnesHut {
    pipeline: Option<wgpu::ComputePipeline>,
    layout: Option<wgpu::BindGroupLayout>,
    bind_group: Option<wgpu::BindGroup>,
    uniforms: Option<wgpu::Buffer>,
    tree_nodes: Option<wgpu::Buffer>,
    leaf_positions: Option<wgpu::Buffer>,
    tree_capacity: u32,
    /// Live (non-freed) node count from the most recent `rebuild_tree`,
    /// used as `internal_node_count` instead of `node_high_water` since
    /// dead slots are excluded from the tree itself.
    live_count: u32,
}

impl BarnesHut {
    pub fn new() -> Self {
        Self {
            pipeline: None,
            layout: None,
            bind_group: None,
            uniforms: None,
            tree_nodes: None,
            leaf_positions: None,
            tree_capacity: 0,
            live_count: 0,
        }
    }

    /// Build the tree on CPU from the live CPU-shadow positions and
    /// upload it. Called once per tick before `record_repulsion_pass`.
    /// Separate from `update_uniforms` because it needs the full
    /// position array rather than just scalar tunables.
    ///
    /// Freed slots (`node_alive[i] == false`) are excluded from the tree
    /// entirely rather than sorted in as a zero-mass leaf sitting at the
    /// origin: the tree's leaf/internal indices are local to this build's
    /// own sorted order, not the original slot space, so dropping dead
    /// slots up front means a live node's traversal never sees one as a
    /// phantom body.
    pub fn rebuild_tree(&mut self, queue: &wgpu::Queue, graph: &GraphState) {
        let high_water = graph.node_high_water as usize;
        let live: Vec<u32> = (0..high_water as u32).filter(|&i| graph.node_alive[i as usize]).collect();
        let n = live.len();
        self.live_count = n as u32;
        if n == 0 {
            return;
        }
        let mut min = (f32::MAX, f32::MAX);
        let mut max = (f32::MIN, f32::MIN);
        for &i in &live {
            let i = i as usize;
            min.0 = min.0.min(graph.positions_x[i]);
            min.1 = min.1.min(graph.positions_y[i]);
            max.0 = max.0.max(graph.positions_x[i]);
            max.1 = max.1.max(graph.positions_y[i]);
        }
        let extent = ((max.0 - min.0).max(1e-3), (max.1 - min.1).max(1e-3));
        let inv_extent = (1.0 / extent.0, 1.0 / extent.1);

        let codes: Vec<u32> = live
            .iter()
            .map(|&i| morton_code(graph.positions_x[i as usize], graph.positions_y[i as usize], min, inv_extent))
            .collect();
        let mut order: Vec<u32> = (0..n as u32).collect();
        radix_sort_by_morton(&mut order, &codes);

        let sorted_codes: Vec<u32> = order.iter().map(|&i| codes[i as usize]).collect();
        let sorted_positions: Vec<(f32, f32)> = order
            .iter()
            .map(|&i| {
                let slot = live[i as usize] as usize;
                (graph.positions_x[slot], graph.positions_y[slot])
            })
            .collect();

        let internal = build_karras_tree(&sorted_codes);
        let gpu_nodes = aggregate(&sorted_positions, &internal);

        if let (Some(tree_buf), Some(leaf_buf)) = (&self.tree_nodes, &self.leaf_positions) {
            if !gpu_nodes.is_empty() {
                queue.write_buffer(tree_buf, 0, bytemuck::cast_slice(&gpu_nodes));
            }
            let leaf_bytes: Vec<[f32; 2]> = sorted_positions.iter().map(|&(x, y)| [x, y]).collect();
            queue.write_buffer(leaf_buf, 0, bytemuck::cast_slice(&leaf_bytes));
        }
    }
}

impl Algorithm for BarnesHut {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::BarnesHut
    }

    fn requires_bounds(&self) -> bool {
        true
    }

    fn create_pipelines(&mut self, device: &wgpu::Device) -> EngineResult<()> {
        let module = compile_shader(device, "repulsion_barnes_hut", SHADER_SRC);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("repulsion_barnes_hut_layout"),
            entries: &[
                storage_entry(0, true),  // positions (indexed by live slot)
                storage_entry(1, false), // forces
                storage_entry(2, true),  // tree nodes
                storage_entry(3, true),  // sorted leaf positions
                uniform_entry(4),
                storage_entry(5, true),  // node_flags
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("repulsion_barnes_hut_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        self.pipeline = Some(compute_pipeline(
            device,
            "repulsion_barnes_hut_pipeline",
            &pipeline_layout,
            &module,
            "main",
        ));
        self.layout = Some(layout);
        Ok(())
    }

    fn resize_buffers(&mut self, device: &wgpu::Device, node_capacity: u32, _edge_capacity: u32) {
        if self.uniforms.is_none() {
            self.uniforms = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("repulsion_barnes_hut_uniforms"),
                contents: bytemuck::bytes_of(&BhUniforms {
                    node_count: 0,
                    internal_node_count: 0,
                    strength: -50.0,
                    min_distance: 1.0,
                    theta: 0.8,
                    max_depth: MAX_TRAVERSAL_DEPTH,
                    _pad: [0; 2],
                }),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            }));
        }
        if node_capacity > self.tree_capacity {
            self.tree_nodes = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("barnes_hut_tree_nodes"),
                size: ((node_capacity.max(1) as u64) * std::mem::size_of::<GpuTreeNode>() as u64).max(32),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.leaf_positions = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("barnes_hut_leaf_positions"),
                size: ((node_capacity.max(1) as u64) * 8).max(16),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.tree_capacity = node_capacity;
        }
    }

    fn rebuild_bind_groups(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        let (Some(layout), Some(uniforms), Some(tree), Some(leaves)) =
            (&self.layout, &self.uniforms, &self.tree_nodes, &self.leaf_positions)
        else {
            return;
        };
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("repulsion_barnes_hut_bind_group"),
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
                    resource: tree.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: leaves.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: buffers.node_flags.as_entire_binding(),
                },
            ],
        }));
    }

    fn update_uniforms(&mut self, queue: &wgpu::Queue, graph: &GraphState, config: &ForceConfig, _alpha: f32) {
        self.rebuild_tree(queue, graph);
        let n = graph.node_high_water;
        if let Some(buf) = &self.uniforms {
            queue.write_buffer(
                buf,
                0,
                bytemuck::bytes_of(&BhUniforms {
                    node_count: n,
                    internal_node_count: self.live_count.saturating_sub(1),
                    strength: config.repulsion_strength,
                    min_distance: config.repulsion_distance_min,
                    theta: config.theta,
                    max_depth: MAX_TRAVERSAL_DEPTH,
                    _pad: [0; 2],
                }),
            );
        }
    }

    fn record_repulsion_pass(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32) {
        let (Some(pipeline), Some(bind_group)) = (&self.pipeline, &self.bind_group) else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("repulsion_barnes_hut_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups_for(node_count, WORKGROUP_SIZE), 1, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn morton_code_is_order_preserving_along_x() {
        let min = (0.0, 0.0);
        let inv = (1.0 / 100.0, 1.0 / 100.0);
        let a = morton_code(1.0, 0.0, min, inv);
        let b = morton_code(99.0, 0.0, min, inv);
        assert!(b > a);
    }

    #[test]
    fn karras_tree_has_n_minus_one_internal_nodes() {
        let codes: Vec<u32> = vec![1, 4, 9, 20, 55, 80];
        let tree = build_karras_tree(&codes);
        assert_eq!(tree.len(), codes.len() - 1);
    }

    #[test]
    fn aggregate_conserves_total_mass() {
        let positions = vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)];
        let codes: Vec<u32> = vec![0, 1, 2, 3];
        let tree = build_karras_tree(&codes);
        let nodes = aggregate(&positions, &tree);
        assert_eq!(nodes[0].mass, 4.0);
    }
}

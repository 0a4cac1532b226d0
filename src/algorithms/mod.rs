//! Algorithm (C4): pluggable repulsion force backends.
//!
//! Each backend owns its own pipeline + bind-group-layout + bind-group
//! trio and is asked to record itself into a shared encoder, behind a
//! single trait every repulsion backend implements, so `SimulationPipeline`
//! can swap backends without knowing their internals.

mod barnes_hut;
mod linlog;
mod n2;
pub mod precomputed;
mod relativity_atlas;
mod t_fdp;

pub use barnes_hut::BarnesHut;
pub use linlog::LinLog;
pub use n2::NaiveN2;
pub use precomputed::{PrecomputedAlgorithm, PrecomputedKind};
pub use relativity_atlas::RelativityAtlas;
pub use t_fdp::TFdp;

use crate::buffers::BufferSet;
use crate::config::ForceConfig;
use crate::error::EngineResult;
use crate::graph::GraphState;

/// Shared bind-group-layout-entry helpers: every backend needs the same
/// two variants (read-write storage, read-only storage), so they live
/// here once instead of being rebuilt per module.
pub(crate) fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn workgroups_for(count: u32, workgroup_size: u32) -> u32 {
    (count + workgroup_size - 1) / workgroup_size
}

pub(crate) fn compile_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

pub(crate) fn compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        module,
        entry_point: Some(entry_point),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    })
}

/// Identifies which registered backend is active; also the wire form for
/// `EngineFacade::set_force_algorithm`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    N2,
    BarnesHut,
    LinLog,
    TFdp,
    RelativityAtlas,
    TidyTree,
    Community,
    Codebase,
}

impl AlgorithmKind {
    pub fn name(self) -> &'static str {
        match self {
            AlgorithmKind::N2 => "n2",
            AlgorithmKind::BarnesHut => "barnes-hut",
            AlgorithmKind::LinLog => "linlog",
            AlgorithmKind::TFdp => "t-fdp",
            AlgorithmKind::RelativityAtlas => "relativity-atlas",
            AlgorithmKind::TidyTree => "tidy-tree",
            AlgorithmKind::Community => "community",
            AlgorithmKind::Codebase => "codebase",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "n2" => Some(AlgorithmKind::N2),
            "barnes-hut" => Some(AlgorithmKind::BarnesHut),
            "linlog" => Some(AlgorithmKind::LinLog),
            "t-fdp" => Some(AlgorithmKind::TFdp),
            "relativity-atlas" => Some(AlgorithmKind::RelativityAtlas),
            "tidy-tree" => Some(AlgorithmKind::TidyTree),
            "community" => Some(AlgorithmKind::Community),
            "codebase" => Some(AlgorithmKind::Codebase),
            _ => None,
        }
    }

    /// True for the three algorithms that hold nodes at a CPU-computed
    /// target position rather than computing live pairwise repulsion
    ///.
    pub fn is_precomputed(self) -> bool {
        matches!(self, AlgorithmKind::TidyTree | AlgorithmKind::Community | AlgorithmKind::Codebase)
    }
}

/// A pluggable repulsion backend. Implementors own whatever
/// extra GPU buffers/pipelines they need (e.g. Barnes-Hut's radix-sorted
/// tree) and are asked once per tick to append their compute passes to a
/// shared encoder, after `ClearUniforms`/forces have been zeroed and
/// before springs run.
pub trait Algorithm {
    fn kind(&self) -> AlgorithmKind;

    /// True if this backend also applies a gravity/centering term itself
    /// (Relativity Atlas, LinLog strong-gravity) rather than relying on
    /// the pipeline's generic center-force pass.
    fn handles_gravity(&self) -> bool {
        false
    }

    /// True if this backend needs `GraphState`'s CSR adjacency rebuilt
    /// whenever the topology changes (hierarchical backends).
    fn requires_csr(&self) -> bool {
        false
    }

    /// True if this backend needs a valid (non-degenerate) scene bounding
    /// box to operate (Barnes-Hut's Morton-code quantization). Absent
    /// bounds (e.g. every position non-finite) stop the simulation rather
    /// than run the pass against garbage input — see
    /// `SimulationPipeline`'s fatal guard.
    fn requires_bounds(&self) -> bool {
        false
    }

    /// (Re)build whatever device-side pipelines this backend needs.
    /// Called once at construction and again if the shader source for
    /// this backend is ever hot-reloaded (not exposed publicly today,
    /// but kept separate from `new` for that reason).
    fn create_pipelines(&mut self, device: &wgpu::Device) -> EngineResult<()>;

    /// (Re)allocate any backend-private buffers sized to `node_capacity`.
    /// Called on construction and after every `BufferSet::grow`.
    fn resize_buffers(&mut self, device: &wgpu::Device, node_capacity: u32, edge_capacity: u32);

    /// Rebuild bind groups that reference `buffers`' current buffer
    /// identities. Called after construction and after every
    /// `BufferSet::grow` (buffer identities change on growth).
    fn rebuild_bind_groups(&mut self, device: &wgpu::Device, buffers: &BufferSet);

    /// Push this tick's uniform values to the device.
    fn update_uniforms(
        &mut self,
        queue: &wgpu::Queue,
        graph: &GraphState,
        config: &ForceConfig,
        alpha: f32,
    );

    /// Record this backend's repulsion pass(es) into `encoder`. Must read
    /// `buffers.positions_in()` and accumulate into `buffers.forces`
    /// (never write positions/velocities directly —
    /// "repulsion backends only ever touch the forces buffer").
    fn record_repulsion_pass(&self, encoder: &mut wgpu::CommandEncoder, node_count: u32);
}

/// Holds one constructed instance of every registered backend plus the
/// active selection; owned by `SimulationPipeline`.
pub struct AlgorithmRegistry {
    active: AlgorithmKind,
    n2: NaiveN2,
    barnes_hut: BarnesHut,
    linlog: LinLog,
    t_fdp: TFdp,
    relativity_atlas: RelativityAtlas,
    tidy_tree: PrecomputedAlgorithm,
    community: PrecomputedAlgorithm,
    codebase: PrecomputedAlgorithm,
}

impl AlgorithmRegistry {
    pub fn new(device: &wgpu::Device, node_capacity: u32, edge_capacity: u32) -> EngineResult<Self> {
        let mut n2 = NaiveN2::new();
        let mut barnes_hut = BarnesHut::new();
        let mut linlog = LinLog::new();
        let mut t_fdp = TFdp::new();
        let mut relativity_atlas = RelativityAtlas::new();
        let mut tidy_tree = PrecomputedAlgorithm::new(PrecomputedKind::TidyTree);
        let mut community = PrecomputedAlgorithm::new(PrecomputedKind::Community);
        let mut codebase = PrecomputedAlgorithm::new(PrecomputedKind::Codebase);

        for a in [
            &mut n2 as &mut dyn Algorithm,
            &mut barnes_hut,
            &mut linlog,
            &mut t_fdp,
            &mut relativity_atlas,
            &mut tidy_tree,
            &mut community,
            &mut codebase,
        ] {
            a.create_pipelines(device)?;
            a.resize_buffers(device, node_capacity, edge_capacity);
        }

        Ok(Self {
            active: AlgorithmKind::N2,
            n2,
            barnes_hut,
            linlog,
            t_fdp,
            relativity_atlas,
            tidy_tree,
            community,
            codebase,
        })
    }

    pub fn active_kind(&self) -> AlgorithmKind {
        self.active
    }

    pub fn set_active(&mut self, kind: AlgorithmKind) {
        self.active = kind;
    }

    pub fn active(&self) -> &dyn Algorithm {
        match self.active {
            AlgorithmKind::N2 => &self.n2,
            AlgorithmKind::BarnesHut => &self.barnes_hut,
            AlgorithmKind::LinLog => &self.linlog,
            AlgorithmKind::TFdp => &self.t_fdp,
            AlgorithmKind::RelativityAtlas => &self.relativity_atlas,
            AlgorithmKind::TidyTree => &self.tidy_tree,
            AlgorithmKind::Community => &self.community,
            AlgorithmKind::Codebase => &self.codebase,
        }
    }

    pub fn active_mut(&mut self) -> &mut dyn Algorithm {
        match self.active {
            AlgorithmKind::N2 => &mut self.n2,
            AlgorithmKind::BarnesHut => &mut self.barnes_hut,
            AlgorithmKind::LinLog => &mut self.linlog,
            AlgorithmKind::TFdp => &mut self.t_fdp,
            AlgorithmKind::RelativityAtlas => &mut self.relativity_atlas,
            AlgorithmKind::TidyTree => &mut self.tidy_tree,
            AlgorithmKind::Community => &mut self.community,
            AlgorithmKind::Codebase => &mut self.codebase,
        }
    }

    fn all_mut(&mut self) -> [&mut dyn Algorithm; 8] {
        [
            &mut self.n2,
            &mut self.barnes_hut,
            &mut self.linlog,
            &mut self.t_fdp,
            &mut self.relativity_atlas,
            &mut self.tidy_tree,
            &mut self.community,
            &mut self.codebase,
        ]
    }

    pub fn resize_all(&mut self, device: &wgpu::Device, node_capacity: u32, edge_capacity: u32) {
        for a in self.all_mut() {
            a.resize_buffers(device, node_capacity, edge_capacity);
        }
    }

    pub fn rebuild_all_bind_groups(&mut self, device: &wgpu::Device, buffers: &BufferSet) {
        for a in self.all_mut() {
            a.rebuild_bind_groups(device, buffers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrips_through_name() {
        for k in [
            AlgorithmKind::N2,
            AlgorithmKind::BarnesHut,
            AlgorithmKind::LinLog,
            AlgorithmKind::TFdp,
            AlgorithmKind::RelativityAtlas,
        ] {
            assert_eq!(AlgorithmKind::from_name(k.name()), Some(k));
        }
    }

    #[test]
    fn unknown_name_returns_none() {
        assert_eq!(AlgorithmKind::from_name("not-a-thing"), None);
    }
}

//! The three fixed (non-pluggable) passes every tick runs regardless of
//! which repulsion [`crate::algorithms::Algorithm`] is active: clearing
//! the force accumulator, edge springs, and integration. Grounded in the
//! teacher's `GpuComputePipelines`/`GpuComputeBindGroups` split
//! (`rendering/gpu_compute_pipeline.rs`) — same "one pipeline, one
//! bind-group-layout, one rebuildable bind group" shape as every
//! [`crate::algorithms::Algorithm`] backend, just not swappable.

mod clear;
mod integrate;
mod springs;

pub use clear::ClearStage;
pub use integrate::{IntegrateStage, IntegrationParams, NO_PINNED_NODE};
pub use springs::SpringsStage;

//! GPU-layout uniform structs, bit-exact to std140/std430
//! 16-byte alignment rules, via the `#[repr(C)] derive(Pod, Zeroable)` +
//! explicit padding-field idiom.

use bytemuck::{Pod, Zeroable};

/// 16 B.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ClearUniforms {
    pub node_count: u32,
    pub _pad: [u32; 3],
}

/// 16 B.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct RepulsionUniforms {
    pub node_count: u32,
    pub strength: f32,
    pub min_distance: f32,
    pub _pad: u32,
}

/// 16 B.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SpringUniforms {
    pub edge_count: u32,
    pub strength: f32,
    pub rest_length: f32,
    pub _pad: u32,
}

/// 48 B.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct IntegrationUniforms {
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
    pub _pad: u32,
}

/// 32 B.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CollisionUniforms {
    pub node_count: u32,
    pub strength: f32,
    pub radius_multiplier: f32,
    pub iterations: u32,
    pub default_radius: f32,
    pub _pad: [u32; 3],
}

/// 48 B.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GridCollisionUniforms {
    pub node_count: u32,
    pub grid_w: u32,
    pub grid_h: u32,
    pub cell_size: f32,
    pub bounds_min_x: f32,
    pub bounds_min_y: f32,
    pub strength: f32,
    pub radius_multiplier: f32,
    pub default_radius: f32,
    pub total_cells: u32,
    pub _pad: [u32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_match_gpu_layout() {
        assert_eq!(std::mem::size_of::<ClearUniforms>(), 16);
        assert_eq!(std::mem::size_of::<RepulsionUniforms>(), 16);
        assert_eq!(std::mem::size_of::<SpringUniforms>(), 16);
        assert_eq!(std::mem::size_of::<IntegrationUniforms>(), 48);
        assert_eq!(std::mem::size_of::<CollisionUniforms>(), 32);
        assert_eq!(std::mem::size_of::<GridCollisionUniforms>(), 48);
    }
}

//! Force configuration: tunables for every force stage plus per-algorithm
//! blocks. A flat `Default`-documented struct of physical tunables shared
//! across CPU and GPU paths, extended with a validated partial-merge so no
//! tunable can ever put the simulation in an invalid state.

use serde::{Deserialize, Serialize};

fn clamp(v: f32, lo: f32, hi: f32) -> f32 {
    v.max(lo).min(hi)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForceConfig {
    pub repulsion_strength: f32,
    pub repulsion_distance_min: f32,
    pub repulsion_distance_max: f32,
    pub spring_strength: f32,
    pub spring_length: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub center_strength: f32,
    pub velocity_decay: f32,
    pub max_velocity: f32,
    pub time_step: f32,
    pub pinned_node: Option<u32>,
    pub theta: f32,

    pub collision_enabled: bool,
    pub collision_strength: f32,
    pub collision_radius_multiplier: f32,
    pub collision_iterations: u32,

    pub relativity: RelativityAtlasConfig,
    pub linlog: LinLogConfig,
    pub t_fdp: TFdpConfig,
    pub tidy_tree: TidyTreeConfig,
    pub community: CommunityConfig,
    pub codebase: CodebaseConfig,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            repulsion_strength: -50.0,
            repulsion_distance_min: 1.0,
            repulsion_distance_max: 1000.0,
            spring_strength: 0.1,
            spring_length: 30.0,
            center_x: 0.0,
            center_y: 0.0,
            center_strength: 0.01,
            velocity_decay: 0.4,
            max_velocity: 50.0,
            time_step: 1.0,
            pinned_node: None,
            theta: 0.8,
            collision_enabled: true,
            collision_strength: 0.7,
            collision_radius_multiplier: 1.0,
            collision_iterations: 1,
            relativity: RelativityAtlasConfig::default(),
            linlog: LinLogConfig::default(),
            t_fdp: TFdpConfig::default(),
            tidy_tree: TidyTreeConfig::default(),
            community: CommunityConfig::default(),
            codebase: CodebaseConfig::default(),
        }
    }
}

/// A sparse set of overrides applied via `EngineFacade::set_force_config`.
/// Every present field is clamped; absent fields leave the current value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ForceConfigPatch {
    pub repulsion_strength: Option<f32>,
    pub repulsion_distance_min: Option<f32>,
    pub repulsion_distance_max: Option<f32>,
    pub spring_strength: Option<f32>,
    pub spring_length: Option<f32>,
    pub center_x: Option<f32>,
    pub center_y: Option<f32>,
    pub center_strength: Option<f32>,
    pub velocity_decay: Option<f32>,
    pub max_velocity: Option<f32>,
    pub time_step: Option<f32>,
    pub pinned_node: Option<Option<u32>>,
    pub theta: Option<f32>,
    pub collision_enabled: Option<bool>,
    pub collision_strength: Option<f32>,
    pub collision_radius_multiplier: Option<f32>,
    pub collision_iterations: Option<u32>,
    pub relativity: Option<RelativityAtlasConfig>,
    pub linlog: Option<LinLogConfig>,
    pub t_fdp: Option<TFdpConfig>,
    pub tidy_tree: Option<TidyTreeConfig>,
    pub community: Option<CommunityConfig>,
    pub codebase: Option<CodebaseConfig>,
}

impl ForceConfig {
    /// Merge `patch` into `self`, clamping every touched field to its
    /// documented range and enforcing cross-parameter constraints. Never
    /// fails.
    pub fn apply_patch(&mut self, patch: ForceConfigPatch) {
        if let Some(v) = patch.repulsion_strength {
            self.repulsion_strength = clamp(v, -10_000.0, 10_000.0);
        }
        if let Some(v) = patch.repulsion_distance_min {
            self.repulsion_distance_min = clamp(v, 0.01, 10_000.0);
        }
        if let Some(v) = patch.repulsion_distance_max {
            self.repulsion_distance_max = clamp(v, self.repulsion_distance_min, 100_000.0);
        }
        if let Some(v) = patch.spring_strength {
            self.spring_strength = clamp(v, 0.0, 10.0);
        }
        if let Some(v) = patch.spring_length {
            self.spring_length = clamp(v, 0.0, 10_000.0);
        }
        if let Some(v) = patch.center_x {
            self.center_x = v;
        }
        if let Some(v) = patch.center_y {
            self.center_y = v;
        }
        if let Some(v) = patch.center_strength {
            self.center_strength = clamp(v, 0.0, 1.0);
        }
        if let Some(v) = patch.velocity_decay {
            self.velocity_decay = clamp(v, 0.0, 1.0);
        }
        if let Some(v) = patch.max_velocity {
            self.max_velocity = clamp(v, 0.001, 100_000.0);
        }
        if let Some(v) = patch.time_step {
            self.time_step = clamp(v, 0.0, 10.0);
        }
        if let Some(v) = patch.pinned_node {
            self.pinned_node = v;
        }
        if let Some(v) = patch.theta {
            self.theta = clamp(v, 0.1, 2.0);
        }
        if let Some(v) = patch.collision_enabled {
            self.collision_enabled = v;
        }
        if let Some(v) = patch.collision_strength {
            self.collision_strength = clamp(v, 0.0, 1.0);
        }
        if let Some(v) = patch.collision_radius_multiplier {
            self.collision_radius_multiplier = clamp(v, 0.1, 10.0);
        }
        if let Some(v) = patch.collision_iterations {
            self.collision_iterations = v.clamp(1, 16);
        }
        if let Some(v) = patch.relativity {
            self.relativity = v;
        }
        if let Some(v) = patch.linlog {
            self.linlog = v;
        }
        if let Some(mut v) = patch.t_fdp {
            v.enforce_constraint();
            self.t_fdp = v;
        }
        if let Some(v) = patch.tidy_tree {
            self.tidy_tree = v;
        }
        if let Some(v) = patch.community {
            self.community = v;
        }
        if let Some(v) = patch.codebase {
            self.codebase = v;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum GravityCurve {
    Linear,
    Inverse,
    Soft,
    Custom(f32),
}

impl Default for GravityCurve {
    fn default() -> Self {
        GravityCurve::Soft
    }
}

/// Tunables for the Relativity Atlas hierarchical backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativityAtlasConfig {
    pub base_mass: f32,
    pub child_mass_factor: f32,
    pub orbit_radius: f32,
    pub tangential_multiplier: f32,
    pub cousin_repulsion_enabled: bool,
    pub cousin_repulsion_strength: f32,
    pub phantom_zone_enabled: bool,
    pub phantom_zone_margin: f32,
    pub density_field_enabled: bool,
    pub density_field_strength: f32,
    pub gravity_curve: GravityCurve,
    pub gravity_strength: f32,
    pub orbit_spring_damping: f32,
    pub sibling_spread: f32,
}

impl Default for RelativityAtlasConfig {
    fn default() -> Self {
        Self {
            base_mass: 1.0,
            child_mass_factor: 1.0,
            orbit_radius: 40.0,
            tangential_multiplier: 1.0,
            cousin_repulsion_enabled: false,
            cousin_repulsion_strength: 0.2,
            phantom_zone_enabled: false,
            phantom_zone_margin: 4.0,
            density_field_enabled: false,
            density_field_strength: 1.0,
            gravity_curve: GravityCurve::default(),
            gravity_strength: 0.05,
            orbit_spring_damping: 0.3,
            sibling_spread: 1.0,
        }
    }
}

/// Tunables for the LinLog energy-model backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinLogConfig {
    pub repulsion_k: f32,
    pub attraction_exponent: f32,
    pub strong_gravity: bool,
    pub gravity_strength: f32,
}

impl Default for LinLogConfig {
    fn default() -> Self {
        Self {
            repulsion_k: 1.0,
            attraction_exponent: 0.0,
            strong_gravity: false,
            gravity_strength: 0.01,
        }
    }
}

/// Tunables for the t-FDP backend. Paper constraint
/// `alpha * (1 + beta) < 1` is enforced by `enforce_constraint`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TFdpConfig {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
    pub edge_weight_scale: f32,
}

impl Default for TFdpConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            beta: 2.0,
            gamma: 1.0,
            edge_weight_scale: 1.0,
        }
    }
}

impl TFdpConfig {
    /// Auto-reduce `beta` when `alpha * (1 + beta) >= 1` so the paper's
    /// convergence constraint always holds, rather than erroring.
    pub fn enforce_constraint(&mut self) {
        self.gamma = self.gamma.max(1.0);
        if self.alpha <= 0.0 {
            return;
        }
        let limit = 1.0 / self.alpha - 1.0;
        if self.beta >= limit {
            self.beta = (limit - 1e-4).max(0.0);
        }
    }
}

/// Tunables for the tidy-tree precomputed layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TidyTreeConfig {
    pub node_separation: f32,
    pub level_separation: f32,
    pub spring_to_target_stiffness: f32,
    pub spring_to_target_damping: f32,
    pub root_x: f32,
    pub root_y: f32,
}

impl Default for TidyTreeConfig {
    fn default() -> Self {
        Self {
            node_separation: 20.0,
            level_separation: 60.0,
            spring_to_target_stiffness: 0.3,
            spring_to_target_damping: 0.8,
            root_x: 0.0,
            root_y: 0.0,
        }
    }
}

/// Tunables for the community label-propagation layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommunityConfig {
    pub resolution: f32,
    pub max_iterations: u32,
    pub inter_community_spacing: f32,
    pub intra_community_spacing: f32,
    pub spring_to_target_stiffness: f32,
    pub spring_to_target_damping: f32,
    pub seed: u64,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            max_iterations: 50,
            inter_community_spacing: 200.0,
            intra_community_spacing: 30.0,
            spring_to_target_stiffness: 0.3,
            spring_to_target_damping: 0.8,
            seed: 0,
        }
    }
}

/// Tunables for the codebase circle-packing layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodebaseConfig {
    pub repository_padding: f32,
    pub directory_padding: f32,
    pub file_padding: f32,
    pub symbol_radius: f32,
    pub spring_to_target_stiffness: f32,
    pub spring_to_target_damping: f32,
}

impl Default for CodebaseConfig {
    fn default() -> Self {
        Self {
            repository_padding: 40.0,
            directory_padding: 20.0,
            file_padding: 10.0,
            symbol_radius: 4.0,
            spring_to_target_stiffness: 0.3,
            spring_to_target_damping: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theta_clamped_to_range() {
        let mut cfg = ForceConfig::default();
        cfg.apply_patch(ForceConfigPatch {
            theta: Some(99.0),
            ..Default::default()
        });
        assert_eq!(cfg.theta, 2.0);
    }

    #[test]
    fn velocity_decay_clamped_to_unit_interval() {
        let mut cfg = ForceConfig::default();
        cfg.apply_patch(ForceConfigPatch {
            velocity_decay: Some(-5.0),
            ..Default::default()
        });
        assert_eq!(cfg.velocity_decay, 0.0);
    }

    #[test]
    fn t_fdp_constraint_autocorrects() {
        let mut cfg = TFdpConfig {
            alpha: 0.9,
            beta: 5.0,
            gamma: 1.0,
            edge_weight_scale: 1.0,
        };
        cfg.enforce_constraint();
        assert!(cfg.alpha * (1.0 + cfg.beta) < 1.0);
    }
}

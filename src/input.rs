//! Graph input parsing: the two wire shapes `EngineFacade::load`
//! accepts. Colors and ids are permissive untagged unions (a color is
//! either a named string or an RGB(A) tuple) parsed with `serde`/
//! `serde_json` into plain round-trippable structs.

use serde::{Deserialize, Serialize};

use crate::graph::ExternalId;

/// `string | [r, g, b, a]`, matching the color union accepted across nodes
/// and edges. A bare string is accepted but not resolved to RGB here (CSS
/// color-name/hex parsing belongs to the rendering collaborator, out of
/// scope here); [`ColorSpec::to_rgb`] only handles the numeric form,
/// falling back to a neutral gray for strings so the CPU shadow always
/// has a usable attribute row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Named(String),
    Rgb([f32; 3]),
    Rgba([f32; 4]),
}

impl ColorSpec {
    pub fn to_rgb(&self) -> [f32; 3] {
        match self {
            ColorSpec::Named(_) => [0.6, 0.6, 0.6],
            ColorSpec::Rgb(c) => *c,
            ColorSpec::Rgba(c) => [c[0], c[1], c[2]],
        }
    }
}

/// `string | u64` caller-supplied identity, matching the accepted `id` union.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdSpec {
    Num(u64),
    Str(String),
}

impl From<&IdSpec> for ExternalId {
    fn from(v: &IdSpec) -> Self {
        match v {
            IdSpec::Num(n) => ExternalId::Num(*n),
            IdSpec::Str(s) => ExternalId::Str(s.as_str().into()),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeInput {
    pub id: Option<IdSpec>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub radius: Option<f32>,
    pub color: Option<ColorSpec>,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeInput {
    pub source: IdSpec,
    pub target: IdSpec,
    pub width: Option<f32>,
    pub color: Option<ColorSpec>,
    pub weight: Option<f32>,
    #[serde(rename = "type")]
    pub edge_type: Option<String>,
}

/// The mapping-form input: a sequence of node entries and a sequence
/// of edge entries, each with optional per-entry fields. Parsed from
/// caller-supplied JSON/RON/etc. via `serde::Deserialize`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphInput {
    #[serde(default)]
    pub nodes: Vec<NodeInput>,
    #[serde(default)]
    pub edges: Vec<EdgeInput>,
}

/// Columnar bulk-load variant: zero-copy-friendly parallel arrays
/// instead of a `Vec` of per-entry structs. `node_count`/`edge_count`
/// are authoritative; every column present MUST have exactly that many
/// entries or `EngineFacade::load_typed` returns `InvalidGraphData`.
#[derive(Clone, Debug, Default)]
pub struct TypedGraphInput {
    pub node_count: usize,
    pub edge_count: usize,
    pub node_ids: Vec<IdSpec>,
    pub node_x: Vec<f32>,
    pub node_y: Vec<f32>,
    pub node_radius: Vec<f32>,
    pub node_color: Vec<[f32; 3]>,
    pub edge_ids: Vec<IdSpec>,
    pub edge_sources: Vec<IdSpec>,
    pub edge_targets: Vec<IdSpec>,
    pub edge_weight: Vec<f32>,
}

impl TypedGraphInput {
    /// Every non-empty column must match `node_count`/`edge_count`
    /// exactly; an empty column means "use the default for every row".
    /// Returns `(expected, actual)` of the first mismatching column.
    pub fn validate(&self) -> Result<(), (usize, usize)> {
        let node_cols: &[(&str, usize)] = &[
            ("node_ids", self.node_ids.len()),
            ("node_x", self.node_x.len()),
            ("node_y", self.node_y.len()),
            ("node_radius", self.node_radius.len()),
            ("node_color", self.node_color.len()),
        ];
        for (_, len) in node_cols {
            if *len != 0 && *len != self.node_count {
                return Err((self.node_count, *len));
            }
        }
        let edge_cols: &[(&str, usize)] = &[
            ("edge_ids", self.edge_ids.len()),
            ("edge_sources", self.edge_sources.len()),
            ("edge_targets", self.edge_targets.len()),
            ("edge_weight", self.edge_weight.len()),
        ];
        for (_, len) in edge_cols {
            if *len != 0 && *len != self.edge_count {
                return Err((self.edge_count, *len));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_union_parses_named_and_numeric() {
        let named: ColorSpec = serde_json::from_str("\"steelblue\"").unwrap();
        assert!(matches!(named, ColorSpec::Named(_)));
        let rgb: ColorSpec = serde_json::from_str("[1.0, 0.5, 0.0]").unwrap();
        assert_eq!(rgb.to_rgb(), [1.0, 0.5, 0.0]);
    }

    #[test]
    fn id_union_parses_string_and_number() {
        let a: IdSpec = serde_json::from_str("\"node-1\"").unwrap();
        let b: IdSpec = serde_json::from_str("42").unwrap();
        assert!(matches!(a, IdSpec::Str(_)));
        assert!(matches!(b, IdSpec::Num(42)));
    }

    #[test]
    fn graph_input_round_trips_through_json() {
        let raw = r#"{
            "nodes": [{"id": 1, "x": 0.0, "y": 0.0}, {"id": 2}],
            "edges": [{"source": 1, "target": 2, "weight": 2.0}]
        }"#;
        let input: GraphInput = serde_json::from_str(raw).unwrap();
        assert_eq!(input.nodes.len(), 2);
        assert_eq!(input.edges.len(), 1);
    }

    #[test]
    fn typed_input_rejects_mismatched_column_length() {
        let mut t = TypedGraphInput {
            node_count: 3,
            ..Default::default()
        };
        t.node_x = vec![0.0, 1.0];
        assert_eq!(t.validate(), Err((3, 2)));
    }

    #[test]
    fn typed_input_allows_empty_columns_as_defaults() {
        let t = TypedGraphInput {
            node_count: 3,
            edge_count: 0,
            ..Default::default()
        };
        assert!(t.validate().is_ok());
    }
}

//! GPU-resident force-directed graph layout engine.
//!
//! Computes and continuously refines 2D node positions via a multi-pass
//! GPU compute pipeline (clear -> repulsion -> springs -> integrate ->
//! collision) with ping-pong buffers, exposing them for an external
//! renderer without stalling the pipeline. See `DESIGN.md` at the
//! repository root for the full component breakdown and grounding ledger.
//!
//! The crate is organized leaf-first, matching its dependency order:
//! [`graph`] (C1) <- [`buffers`] (C2) <- [`alpha`] (C3) <-
//! [`algorithms`] (C4) <- [`collision`] (C5) <- [`pipeline`] (C6) <-
//! [`facade`] (C7). [`cpu`] is a headless twin of the GPU path used by
//! the test suite and by [`facade::Backend::Cpu`].

pub mod algorithms;
pub mod alpha;
pub mod buffers;
pub mod collision;
pub mod config;
pub mod cpu;
pub mod error;
pub mod events;
pub mod facade;
pub mod graph;
pub mod input;
pub mod pipeline;
mod stages;

pub use algorithms::AlgorithmKind;
pub use alpha::{AlphaController, SimulationStatus};
pub use config::{ForceConfig, ForceConfigPatch};
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EngineEventKind};
pub use facade::{Backend, EngineFacade};
pub use graph::{EdgeHandle, ExternalId, GraphState, NodeHandle};
pub use input::{EdgeInput, GraphInput, NodeInput, TypedGraphInput};

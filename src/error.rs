//! Engine error taxonomy.
//!
//! Construction errors bubble out of `EngineFacade::new` via `Result`.
//! Mutation errors are returned per-call; parameter clamping in
//! [`crate::config`] never produces an error.

use thiserror::Error;

/// All failure modes the engine surfaces to a caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// No compute-capable GPU adapter could be acquired.
    #[error("no compute-capable GPU adapter available")]
    UnsupportedPlatform,

    /// A WGSL module failed to compile or link into a pipeline.
    #[error("pipeline compilation failed: {0}")]
    PipelineCompile(String),

    /// A GPU buffer could not be allocated (out of device memory, or a
    /// requested size exceeded device limits).
    #[error("buffer allocation failed: {0}")]
    BufferAlloc(String),

    /// Slot growth was requested while growth is disabled.
    #[error("capacity exceeded: requested {requested}, capacity {capacity}")]
    CapacityExceeded { requested: u32, capacity: u32 },

    /// Caller supplied an ID that already maps to a live slot.
    #[error("duplicate id")]
    DuplicateId,

    /// Caller referenced an ID with no live slot.
    #[error("unknown id")]
    UnknownId,

    /// `set_force_algorithm` was given an ID not in the registry.
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// A bulk columnar setter received mismatched array lengths.
    #[error("invalid graph data: expected {expected} entries, got {actual}")]
    InvalidGraphData { expected: usize, actual: usize },

    /// A mutation call arrived after `dispose()`.
    #[error("engine already disposed")]
    DisposedAccess,

    /// Every position in the CPU shadow is non-finite; the simulation has
    /// been stopped rather than submit undefined GPU work.
    #[error("graph state corrupted: all positions non-finite")]
    Corrupted,

    /// A readback's `map_async` resolved with an error; the caller is not
    /// meant to see this directly (it is logged and retried), but it is
    /// part of the taxonomy for completeness and for the CPU reference path.
    #[error("position readback failed: {0}")]
    ReadbackFailed(String),
}

/// Result alias used throughout the engine's public surface.
pub type EngineResult<T> = Result<T, EngineError>;

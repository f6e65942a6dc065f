//! Helio SSS - screen-space subsurface scattering for the deferred path
//!
//! This crate owns the orchestration side of the skin scattering effect:
//!
//! - Pushes the effect configuration into the global shader-parameter bus
//! - Records the extraction, diffuse-blur and normal-blur command lists
//! - Registers those lists at the host pipeline's insertion points
//! - Allocates and releases the per-frame specular accumulation buffers
//! - Tears down and rebuilds the pass graph when the blur quality changes
//!
//! The pixel math lives in opaque pass programs; the host pipeline, the
//! parameter bus and the render-target allocator are injected as traits so
//! everything here runs without a GPU (see [`headless`]).

pub mod config;
pub mod params;
pub mod resources;
pub mod program;
pub mod graph;
pub mod host;
pub mod specular;
pub mod controller;
pub mod frame;
pub mod feature;
pub mod headless;

mod effect;

pub use config::{LookupTextures, LutProfile, PipelineProfile, SssConfig};
pub use controller::{ControllerState, ReconfigurationController};
pub use effect::SubsurfaceScattering;
pub use feature::{Feature, FeatureContext};
pub use frame::FrameCounter;
pub use graph::{InsertionPoint, PassGraph};
pub use host::RenderHost;
pub use params::{GlobalParameters, Keywords, ParameterBus};
pub use resources::{Extent, TargetAllocator, TargetDesc, TextureHandle};
pub use specular::{FrameScope, SpecularBuffers};

/// Result type for effect operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or running the effect
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required pass program could not be resolved at startup
    #[error("Pass program not found: {0}")]
    ProgramNotFound(String),

    /// A render target could not be created on the active device
    #[error("Resource error: {0}")]
    Resource(String),

    /// `acquire` was called while the previous frame's buffers are still held
    #[error("Specular buffers already acquired for this frame")]
    AlreadyAcquired,

    /// A rebuild was requested while another one is still running
    #[error("Pass graph rebuild already in progress")]
    RebuildInProgress,

    /// A recorded command list breaks a resource invariant
    #[error("Graph error: {0}")]
    Graph(String),

    /// The effect failed to initialise and is passing frames through
    #[error("Effect is inactive")]
    Inactive,
}

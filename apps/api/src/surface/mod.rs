// The Renderable Surface side of the pipeline: the UI layer renders the CV
// preview and parks it here (layout dimensions + RGBA pixels); the export
// pipeline only ever reads it.

pub mod handlers;
pub mod registry;

pub use registry::{Surface, SurfaceError, SurfaceRegistry};

//! # ringmap-render
//!
//! Render surface integration for the ring overlay.
//!
//! ## Architecture
//!
//! ```text
//!  SurfaceConfig (token, map options)
//!       │
//!       ▼
//!  HeadlessSurface::initialize()     ◀─── returns at once, Initializing
//!       │ load event
//!       ▼
//!  RenderSurface::ready()            ◀─── resolves once, Ready or Failed
//!       │
//!       ▼
//!  StyleConfigurator::apply()        ◀─── named source + layer stack
//!       │
//!       ▼
//!  RenderSurface::set_source_data()  ◀─── wholesale data replacement
//! ```
//!
//! ## Crate modules
//!
//! - [`surface`]: the `RenderSurface` trait, lifecycle states, map options
//! - [`headless`]: in-process surface with layer stack and paint resolution
//! - [`configurator`]: one-shot application of the overlay style

pub mod configurator;
pub mod headless;
pub mod surface;

// Re-exports for convenience
pub use configurator::StyleConfigurator;
pub use headless::{BasemapSpec, HeadlessSurface, RenderedFeature, SurfaceStats, HISTORY_LIMIT};
pub use surface::{
    validate_access_token, RenderSurface, SurfaceConfig, SurfaceError, SurfaceHandle,
    SurfaceState,
};

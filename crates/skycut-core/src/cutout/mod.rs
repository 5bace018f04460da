//! Domain model for the image cutout service.
//!
//! The UWS engine is parameterized by these types: the parameter shape,
//! the stencils it contains, and the policy that validates and dispatches
//! cutout jobs.

pub mod parameters;
pub mod policy;
pub mod stencils;

pub use parameters::CutoutParameters;
pub use policy::CutoutPolicy;
pub use stencils::{Point, Range, Stencil};

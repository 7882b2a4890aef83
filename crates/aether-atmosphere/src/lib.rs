//! Precomputed atmospheric scattering.
//!
//! GPU lookup tables for transmittance, single and multiple scattering, and
//! sky irradiance are filled once by a fixed pipeline of render passes, then
//! sampled every frame by generated shader functions for sky radiance and
//! aerial perspective.

pub mod codegen;
pub mod constants;
pub mod evaluator;
pub mod model;
pub mod params;
pub mod reference;

pub use model::{PrecomputeError, SkyModel};
pub use params::{AtmosphereParameters, ModelParameters, ParameterError};

//! wgpu rendering support: device setup, shader compilation, lookup-table
//! textures, and CPU readback.

pub mod gpu;
pub mod lut;
pub mod readback;
pub mod shader;

pub use gpu::{HeadlessContext, RenderContext, RenderContextError, SurfaceError};
pub use lut::{LutTexture, lut_sampler, new_lut_2d, new_lut_3d};
pub use readback::{ReadbackError, read_lut_layer};
pub use shader::{ShaderError, ShaderRegistry, compile};

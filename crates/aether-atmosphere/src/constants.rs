//! Lookup-table dimensions and parameterization constants.
//!
//! The scattering table is logically four-dimensional: altitude, view-zenith
//! cosine, sun-zenith cosine, and the view-sun angle cosine nu. It is stored
//! as a 3D texture by packing nu and the sun-zenith cosine jointly along the
//! texture width. Changing any of these sizes changes the texture coordinate
//! mappings baked into the shaders, so they live here and nowhere else.

pub const TRANSMITTANCE_TEXTURE_WIDTH: u32 = 256;
pub const TRANSMITTANCE_TEXTURE_HEIGHT: u32 = 64;

pub const SCATTERING_TEXTURE_R_SIZE: u32 = 32;
pub const SCATTERING_TEXTURE_MU_SIZE: u32 = 128;
pub const SCATTERING_TEXTURE_MU_S_SIZE: u32 = 32;
pub const SCATTERING_TEXTURE_NU_SIZE: u32 = 8;

pub const SCATTERING_TEXTURE_WIDTH: u32 =
    SCATTERING_TEXTURE_NU_SIZE * SCATTERING_TEXTURE_MU_S_SIZE;
pub const SCATTERING_TEXTURE_HEIGHT: u32 = SCATTERING_TEXTURE_MU_SIZE;
pub const SCATTERING_TEXTURE_DEPTH: u32 = SCATTERING_TEXTURE_R_SIZE;

pub const IRRADIANCE_TEXTURE_WIDTH: u32 = 64;
pub const IRRADIANCE_TEXTURE_HEIGHT: u32 = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scattering_texture_packing() {
        assert_eq!(SCATTERING_TEXTURE_WIDTH, 256);
        assert_eq!(SCATTERING_TEXTURE_HEIGHT, 128);
        assert_eq!(SCATTERING_TEXTURE_DEPTH, 32);
        // The nu slices must tile the width exactly.
        assert_eq!(
            SCATTERING_TEXTURE_WIDTH % SCATTERING_TEXTURE_NU_SIZE,
            0
        );
    }
}

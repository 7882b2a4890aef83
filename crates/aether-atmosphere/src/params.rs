//! Physical atmosphere description and its validated, RGB-resolved form.
//!
//! Callers describe an atmosphere with full wavelength-sampled spectra in SI
//! units. [`ModelParameters::resolve`] validates the description and collapses
//! it to the three-channel, length-unit form that gets baked into shader
//! constants.

use thiserror::Error;

use aether_spectrum::{LAMBDA_R, interpolate, radiance_to_luminance_factors, to_rgb};

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("{name} has {actual} samples but the wavelength axis has {expected}")]
    SpectrumLengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("wavelength axis must be strictly increasing (index {index})")]
    NonIncreasingWavelengths { index: usize },
    #[error("wavelength axis is empty")]
    EmptyWavelengths,
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("bottom radius {bottom} must be below top radius {top}")]
    InvalidRadii { bottom: f64, top: f64 },
    #[error("{name} contains a negative sample {value} at index {index}")]
    NegativeSample {
        name: &'static str,
        value: f64,
        index: usize,
    },
    #[error("mie_phase_function_g must lie in (-1, 1), got {0}")]
    InvalidPhaseAsymmetry(f64),
    #[error("max_sun_zenith_angle must lie in (0, pi), got {0}")]
    InvalidSunZenithAngle(f64),
}

/// Wavelength-sampled description of one planet's atmosphere, in SI units
/// (meters, radians, per-meter coefficients, W / m^2 / nm irradiance).
///
/// All spectra share the `wavelengths` axis, in nanometers, ascending.
#[derive(Clone, Debug)]
pub struct ModelParameters {
    pub wavelengths: Vec<f64>,
    /// Solar irradiance at the top of the atmosphere.
    pub solar_irradiance: Vec<f64>,
    /// Half the angular diameter of the sun disc, in radians.
    pub sun_angular_radius: f64,
    /// Planet surface radius in meters.
    pub bottom_radius: f64,
    /// Atmosphere outer boundary radius in meters.
    pub top_radius: f64,
    /// Rayleigh density scale height in meters.
    pub rayleigh_scale_height: f64,
    /// Rayleigh scattering coefficient at the surface, per meter.
    pub rayleigh_scattering: Vec<f64>,
    /// Mie density scale height in meters.
    pub mie_scale_height: f64,
    /// Mie scattering coefficient at the surface, per meter.
    pub mie_scattering: Vec<f64>,
    /// Mie extinction (scattering plus absorption) at the surface, per meter.
    pub mie_extinction: Vec<f64>,
    /// Cornette-Shanks phase asymmetry, in (-1, 1).
    pub mie_phase_function_g: f64,
    /// Average ground albedo, dimensionless.
    pub ground_albedo: Vec<f64>,
    /// Largest sun zenith angle for which the tables stay precise, radians.
    pub max_sun_zenith_angle: f64,
    /// Meters per model length unit. All shader math runs in length units.
    pub length_unit_in_meters: f64,
    /// Pack the Mie single-scattering red channel into the alpha channel of
    /// the combined table instead of keeping a separate 3D texture.
    pub combine_scattering_textures: bool,
}

/// Validated three-channel parameters in model length units.
///
/// Immutable once resolved: these values are serialized as `const`
/// declarations into every generated shader, so changing them means
/// regenerating and recompiling all shaders.
#[derive(Clone, Debug)]
pub struct AtmosphereParameters {
    pub solar_irradiance: [f64; 3],
    pub sun_angular_radius: f64,
    pub bottom_radius: f64,
    pub top_radius: f64,
    pub rayleigh_scale_height: f64,
    pub rayleigh_scattering: [f64; 3],
    pub mie_scale_height: f64,
    pub mie_scattering: [f64; 3],
    pub mie_extinction: [f64; 3],
    pub mie_phase_function_g: f64,
    pub ground_albedo: [f64; 3],
    /// Cosine of `max_sun_zenith_angle`.
    pub mu_s_min: f64,
    /// Conversion factors from spectral radiance to luminance, with the
    /// lambda^-3 weighting that matches scattered (sky) light.
    pub sky_radiance_to_luminance: [f64; 3],
    /// Conversion factors for direct (unscattered) sun light.
    pub sun_radiance_to_luminance: [f64; 3],
    pub combine_scattering_textures: bool,
}

impl ModelParameters {
    /// Validate and collapse to [`AtmosphereParameters`].
    pub fn resolve(&self) -> Result<AtmosphereParameters, ParameterError> {
        if self.wavelengths.is_empty() {
            return Err(ParameterError::EmptyWavelengths);
        }
        for i in 1..self.wavelengths.len() {
            if self.wavelengths[i] <= self.wavelengths[i - 1] {
                return Err(ParameterError::NonIncreasingWavelengths { index: i });
            }
        }
        let spectra: [(&'static str, &[f64]); 5] = [
            ("solar_irradiance", &self.solar_irradiance),
            ("rayleigh_scattering", &self.rayleigh_scattering),
            ("mie_scattering", &self.mie_scattering),
            ("mie_extinction", &self.mie_extinction),
            ("ground_albedo", &self.ground_albedo),
        ];
        for (name, values) in spectra {
            if values.len() != self.wavelengths.len() {
                return Err(ParameterError::SpectrumLengthMismatch {
                    name,
                    expected: self.wavelengths.len(),
                    actual: values.len(),
                });
            }
            if let Some((index, &value)) =
                values.iter().enumerate().find(|(_, v)| **v < 0.0)
            {
                return Err(ParameterError::NegativeSample { name, value, index });
            }
        }

        let positive: [(&'static str, f64); 6] = [
            ("bottom_radius", self.bottom_radius),
            ("top_radius", self.top_radius),
            ("rayleigh_scale_height", self.rayleigh_scale_height),
            ("mie_scale_height", self.mie_scale_height),
            ("sun_angular_radius", self.sun_angular_radius),
            ("length_unit_in_meters", self.length_unit_in_meters),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ParameterError::NonPositive { name, value });
            }
        }
        if self.bottom_radius >= self.top_radius {
            return Err(ParameterError::InvalidRadii {
                bottom: self.bottom_radius,
                top: self.top_radius,
            });
        }
        if !(self.mie_phase_function_g > -1.0 && self.mie_phase_function_g < 1.0) {
            return Err(ParameterError::InvalidPhaseAsymmetry(
                self.mie_phase_function_g,
            ));
        }
        if !(self.max_sun_zenith_angle > 0.0
            && self.max_sun_zenith_angle < std::f64::consts::PI)
        {
            return Err(ParameterError::InvalidSunZenithAngle(
                self.max_sun_zenith_angle,
            ));
        }

        let unit = self.length_unit_in_meters;
        // Per-meter coefficients become per-length-unit by scaling with the
        // unit; lengths divide by it.
        let sky = radiance_to_luminance_factors(
            &self.wavelengths,
            &self.solar_irradiance,
            -3.0,
        );
        let sun = radiance_to_luminance_factors(
            &self.wavelengths,
            &self.solar_irradiance,
            0.0,
        );

        Ok(AtmosphereParameters {
            solar_irradiance: to_rgb(&self.wavelengths, &self.solar_irradiance, 1.0),
            sun_angular_radius: self.sun_angular_radius,
            bottom_radius: self.bottom_radius / unit,
            top_radius: self.top_radius / unit,
            rayleigh_scale_height: self.rayleigh_scale_height / unit,
            rayleigh_scattering: to_rgb(
                &self.wavelengths,
                &self.rayleigh_scattering,
                unit,
            ),
            mie_scale_height: self.mie_scale_height / unit,
            mie_scattering: to_rgb(&self.wavelengths, &self.mie_scattering, unit),
            mie_extinction: to_rgb(&self.wavelengths, &self.mie_extinction, unit),
            mie_phase_function_g: self.mie_phase_function_g,
            ground_albedo: to_rgb(&self.wavelengths, &self.ground_albedo, 1.0),
            mu_s_min: self.max_sun_zenith_angle.cos(),
            sky_radiance_to_luminance: sky,
            sun_radiance_to_luminance: sun,
            combine_scattering_textures: self.combine_scattering_textures,
        })
    }

    /// Earth's atmosphere: measured solar spectrum, Rayleigh coefficients
    /// from the lambda^-4 law, and a uniform aerosol layer from the Angstrom
    /// turbidity formula with beta = 5.328e-3 and alpha = 0.
    pub fn earth() -> Self {
        // W / m^2 / nm, 360 nm to 830 nm in 10 nm steps.
        const SOLAR_IRRADIANCE: [f64; 48] = [
            1.11776, 1.14259, 1.01249, 1.14716, 1.72765, 1.73054, 1.6887, 1.61253,
            1.91198, 2.03474, 2.02042, 2.02212, 1.93377, 1.95809, 1.91686, 1.8298,
            1.8685, 1.8931, 1.85149, 1.8504, 1.8341, 1.8345, 1.8147, 1.78158, 1.7533,
            1.6965, 1.68194, 1.64654, 1.6048, 1.52143, 1.55622, 1.5113, 1.474, 1.4482,
            1.41018, 1.36775, 1.34188, 1.31429, 1.28303, 1.26758, 1.2367, 1.2082,
            1.18737, 1.14683, 1.12362, 1.1058, 1.07124, 1.04992,
        ];
        const RAYLEIGH: f64 = 1.24062e-6;
        const MIE_ANGSTROM_BETA: f64 = 5.328e-3;
        const MIE_SCALE_HEIGHT: f64 = 1200.0;
        const MIE_SINGLE_SCATTERING_ALBEDO: f64 = 0.9;
        const GROUND_ALBEDO: f64 = 0.1;

        let n = SOLAR_IRRADIANCE.len();
        let mut wavelengths = Vec::with_capacity(n);
        let mut solar_irradiance = Vec::with_capacity(n);
        let mut rayleigh_scattering = Vec::with_capacity(n);
        let mut mie_scattering = Vec::with_capacity(n);
        let mut mie_extinction = Vec::with_capacity(n);
        let mut ground_albedo = Vec::with_capacity(n);
        for (i, &irradiance) in SOLAR_IRRADIANCE.iter().enumerate() {
            let lambda_nm = 360.0 + 10.0 * i as f64;
            let lambda_um = lambda_nm * 1e-3;
            let mie = MIE_ANGSTROM_BETA / MIE_SCALE_HEIGHT;
            wavelengths.push(lambda_nm);
            solar_irradiance.push(irradiance);
            rayleigh_scattering.push(RAYLEIGH * lambda_um.powi(-4));
            mie_scattering.push(mie * MIE_SINGLE_SCATTERING_ALBEDO);
            mie_extinction.push(mie);
            ground_albedo.push(GROUND_ALBEDO);
        }

        Self {
            wavelengths,
            solar_irradiance,
            sun_angular_radius: 0.00935 / 2.0,
            bottom_radius: 6_360_000.0,
            top_radius: 6_420_000.0,
            rayleigh_scale_height: 8000.0,
            rayleigh_scattering,
            mie_scale_height: MIE_SCALE_HEIGHT,
            mie_scattering,
            mie_extinction,
            mie_phase_function_g: 0.8,
            ground_albedo,
            max_sun_zenith_angle: 102.0_f64.to_radians(),
            length_unit_in_meters: 1000.0,
            combine_scattering_textures: true,
        }
    }

    /// The spectrum value feeding the red channel, handy for normalization.
    pub fn solar_irradiance_at_red(&self) -> f64 {
        interpolate(&self.wavelengths, &self.solar_irradiance, LAMBDA_R)
    }
}

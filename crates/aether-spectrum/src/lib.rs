//! Wavelength-sampled physical spectra and their reduction to RGB coefficients.
//!
//! Atmosphere inputs (solar irradiance, scattering and extinction coefficients,
//! ground albedo) are tabulated against a shared, ascending wavelength axis.
//! This crate interpolates those tables at the three representative wavelengths
//! used by the renderer and computes the radiance → luminance conversion
//! factors by numerical integration against the CIE color matching functions.

pub mod cie;

pub use cie::{LAMBDA_MAX, LAMBDA_MIN, MAX_LUMINOUS_EFFICACY, XYZ_TO_SRGB};

/// Red channel representative wavelength, in nanometers.
pub const LAMBDA_R: f64 = 680.0;
/// Green channel representative wavelength, in nanometers.
pub const LAMBDA_G: f64 = 550.0;
/// Blue channel representative wavelength, in nanometers.
pub const LAMBDA_B: f64 = 440.0;

/// Linearly interpolates a tabulated spectrum at `wavelength`.
///
/// `wavelengths` must be sorted ascending and have the same length as
/// `values` (checked; a mismatch is a precondition violation and panics).
/// Wavelengths outside the tabulated range clamp to the first or last
/// sample (flat extrapolation), never an error.
pub fn interpolate(wavelengths: &[f64], values: &[f64], wavelength: f64) -> f64 {
    assert_eq!(
        wavelengths.len(),
        values.len(),
        "spectrum table length mismatch"
    );
    assert!(!wavelengths.is_empty(), "spectrum table is empty");
    if wavelength < wavelengths[0] {
        return values[0];
    }
    for i in 0..wavelengths.len() - 1 {
        if wavelength < wavelengths[i + 1] {
            let u = (wavelength - wavelengths[i]) / (wavelengths[i + 1] - wavelengths[i]);
            return values[i] * (1.0 - u) + values[i + 1] * u;
        }
    }
    values[values.len() - 1]
}

/// Samples a spectrum at the three representative wavelengths and scales
/// each sample by `scale` (used for unit conversion, e.g. m⁻¹ into the
/// renderer's length unit).
pub fn to_rgb(wavelengths: &[f64], values: &[f64], scale: f64) -> [f64; 3] {
    [
        interpolate(wavelengths, values, LAMBDA_R) * scale,
        interpolate(wavelengths, values, LAMBDA_G) * scale,
        interpolate(wavelengths, values, LAMBDA_B) * scale,
    ]
}

/// Computes the spectral radiance → luminance conversion factors
/// `(k_r, k_g, k_b)`, in lm·nm/W.
///
/// Integrates the CIE color matching functions (mapped through XYZ → sRGB)
/// against the solar spectrum in 1 nm steps, normalized per channel by the
/// solar irradiance at that channel's representative wavelength and weighted
/// by `(λ/λ_channel)^lambda_power`. Use `lambda_power = -3` for sky radiance
/// (Rayleigh-like λ⁻⁴ spectra sampled at 3 wavelengths) and `0` for direct
/// sunlight.
pub fn radiance_to_luminance_factors(
    wavelengths: &[f64],
    solar_irradiance: &[f64],
    lambda_power: f64,
) -> [f64; 3] {
    let solar_r = interpolate(wavelengths, solar_irradiance, LAMBDA_R);
    let solar_g = interpolate(wavelengths, solar_irradiance, LAMBDA_G);
    let solar_b = interpolate(wavelengths, solar_irradiance, LAMBDA_B);
    let mut k = [0.0_f64; 3];
    let dlambda = 1.0;
    let mut lambda = LAMBDA_MIN;
    while lambda < LAMBDA_MAX {
        let x_bar = cie::cie_color_matching_function_value(lambda, 1);
        let y_bar = cie::cie_color_matching_function_value(lambda, 2);
        let z_bar = cie::cie_color_matching_function_value(lambda, 3);
        let r_bar = XYZ_TO_SRGB[0] * x_bar + XYZ_TO_SRGB[1] * y_bar + XYZ_TO_SRGB[2] * z_bar;
        let g_bar = XYZ_TO_SRGB[3] * x_bar + XYZ_TO_SRGB[4] * y_bar + XYZ_TO_SRGB[5] * z_bar;
        let b_bar = XYZ_TO_SRGB[6] * x_bar + XYZ_TO_SRGB[7] * y_bar + XYZ_TO_SRGB[8] * z_bar;
        let irradiance = interpolate(wavelengths, solar_irradiance, lambda);
        k[0] += r_bar * irradiance / solar_r * (lambda / LAMBDA_R).powf(lambda_power);
        k[1] += g_bar * irradiance / solar_g * (lambda / LAMBDA_G).powf(lambda_power);
        k[2] += b_bar * irradiance / solar_b * (lambda / LAMBDA_B).powf(lambda_power);
        lambda += dlambda;
    }
    [
        k[0] * MAX_LUMINOUS_EFFICACY * dlambda,
        k[1] * MAX_LUMINOUS_EFFICACY * dlambda,
        k[2] * MAX_LUMINOUS_EFFICACY * dlambda,
    ]
}

/// Converts a tabulated spectrum to a linear sRGB triple by integrating it
/// against the CIE color matching functions in 1 nm steps and applying the
/// XYZ → sRGB matrix, scaled by the maximum luminous efficacy.
pub fn spectrum_to_linear_srgb(wavelengths: &[f64], values: &[f64]) -> [f64; 3] {
    let mut x = 0.0;
    let mut y = 0.0;
    let mut z = 0.0;
    let dlambda = 1.0;
    let mut lambda = LAMBDA_MIN;
    while lambda < LAMBDA_MAX {
        let value = interpolate(wavelengths, values, lambda);
        x += cie::cie_color_matching_function_value(lambda, 1) * value;
        y += cie::cie_color_matching_function_value(lambda, 2) * value;
        z += cie::cie_color_matching_function_value(lambda, 3) * value;
        lambda += dlambda;
    }
    let scale = MAX_LUMINOUS_EFFICACY * dlambda;
    [
        scale * (XYZ_TO_SRGB[0] * x + XYZ_TO_SRGB[1] * y + XYZ_TO_SRGB[2] * z),
        scale * (XYZ_TO_SRGB[3] * x + XYZ_TO_SRGB[4] * y + XYZ_TO_SRGB[5] * z),
        scale * (XYZ_TO_SRGB[6] * x + XYZ_TO_SRGB[7] * y + XYZ_TO_SRGB[8] * z),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAVELENGTHS: [f64; 5] = [400.0, 500.0, 600.0, 700.0, 800.0];

    #[test]
    fn test_interpolate_at_sample_points() {
        let values = [1.0, 2.0, 4.0, 8.0, 16.0];
        for (w, v) in WAVELENGTHS.iter().zip(values.iter()) {
            assert_eq!(interpolate(&WAVELENGTHS, &values, *w), *v);
        }
    }

    #[test]
    fn test_interpolate_is_continuous_at_sample_boundaries() {
        let values = [1.0, 2.0, 4.0, 8.0, 16.0];
        for w in &WAVELENGTHS {
            let below = interpolate(&WAVELENGTHS, &values, w - 1e-9);
            let above = interpolate(&WAVELENGTHS, &values, w + 1e-9);
            assert!((below - above).abs() < 1e-6);
        }
    }

    #[test]
    fn test_interpolate_flat_extrapolation() {
        let values = [1.0, 2.0, 4.0, 8.0, 16.0];
        assert_eq!(interpolate(&WAVELENGTHS, &values, 100.0), 1.0);
        assert_eq!(interpolate(&WAVELENGTHS, &values, 1200.0), 16.0);
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn test_interpolate_rejects_mismatched_tables() {
        interpolate(&WAVELENGTHS, &[1.0, 2.0], 500.0);
    }

    #[test]
    fn test_to_rgb_constant_spectrum_round_trips() {
        let values = [0.7; 5];
        for scale in [1.0, 1000.0, 1e-6] {
            let rgb = to_rgb(&WAVELENGTHS, &values, scale);
            for channel in rgb {
                assert!((channel - 0.7 * scale).abs() < 1e-12 * scale.max(1.0));
            }
        }
    }

    #[test]
    fn test_luminance_factors_positive_and_green_dominant() {
        // Flat 1 W/m²/nm spectrum: the k factors must be positive and the
        // green channel (550 nm, near the photopic peak) the largest of the
        // three for the direct-sun exponent.
        let values = [1.0; 5];
        let k = radiance_to_luminance_factors(&WAVELENGTHS, &values, 0.0);
        assert!(k.iter().all(|v| *v > 0.0), "{k:?}");
        assert!(k[1] > k[0] && k[1] > k[2], "{k:?}");
    }

    #[test]
    fn test_sky_exponent_boosts_blue_relative_to_red() {
        let values = [1.0; 5];
        let sun = radiance_to_luminance_factors(&WAVELENGTHS, &values, 0.0);
        let sky = radiance_to_luminance_factors(&WAVELENGTHS, &values, -3.0);
        // λ⁻³ weighting shifts weight toward short wavelengths.
        assert!(sky[2] / sky[0] > sun[2] / sun[0]);
    }

    #[test]
    fn test_constant_spectrum_maps_to_near_white() {
        // Integrating a flat spectrum yields the D65-ish white of the sRGB
        // matrix: all channels positive and within a factor of two.
        let values = [1.0; 5];
        let rgb = spectrum_to_linear_srgb(&WAVELENGTHS, &values);
        assert!(rgb.iter().all(|v| *v > 0.0), "{rgb:?}");
        let max = rgb.iter().cloned().fold(f64::MIN, f64::max);
        let min = rgb.iter().cloned().fold(f64::MAX, f64::min);
        assert!(max / min < 2.0, "{rgb:?}");
    }
}

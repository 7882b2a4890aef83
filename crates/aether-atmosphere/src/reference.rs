//! CPU mirrors of the shader scattering math.
//!
//! Used for validation: the same geometry, quadrature, and texture
//! parameterizations as the WGSL library, in f64. GPU results are compared
//! against these within tolerances that cover 16-bit table storage and
//! sampling error.

use crate::constants::*;
use crate::params::AtmosphereParameters;

pub fn clamp_cosine(mu: f64) -> f64 {
    mu.clamp(-1.0, 1.0)
}

fn safe_sqrt(a: f64) -> f64 {
    a.max(0.0).sqrt()
}

pub fn distance_to_top_boundary(params: &AtmosphereParameters, r: f64, mu: f64) -> f64 {
    let discriminant = r * r * (mu * mu - 1.0) + params.top_radius * params.top_radius;
    (-r * mu + safe_sqrt(discriminant)).max(0.0)
}

pub fn distance_to_bottom_boundary(
    params: &AtmosphereParameters,
    r: f64,
    mu: f64,
) -> f64 {
    let discriminant =
        r * r * (mu * mu - 1.0) + params.bottom_radius * params.bottom_radius;
    (-r * mu - safe_sqrt(discriminant)).max(0.0)
}

pub fn ray_intersects_ground(params: &AtmosphereParameters, r: f64, mu: f64) -> bool {
    mu < 0.0
        && r * r * (mu * mu - 1.0) + params.bottom_radius * params.bottom_radius >= 0.0
}

pub fn optical_length_to_top_boundary(
    params: &AtmosphereParameters,
    scale_height: f64,
    r: f64,
    mu: f64,
) -> f64 {
    const SAMPLE_COUNT: usize = 500;
    let dx = distance_to_top_boundary(params, r, mu) / SAMPLE_COUNT as f64;
    let mut result = 0.0;
    for i in 0..=SAMPLE_COUNT {
        let d_i = i as f64 * dx;
        let r_i = (d_i * d_i + 2.0 * r * mu * d_i + r * r).sqrt();
        let y_i = (-(r_i - params.bottom_radius) / scale_height).exp();
        let weight = if i == 0 || i == SAMPLE_COUNT { 0.5 } else { 1.0 };
        result += y_i * weight * dx;
    }
    result
}

pub fn transmittance_to_top_boundary(
    params: &AtmosphereParameters,
    r: f64,
    mu: f64,
) -> [f64; 3] {
    let rayleigh_depth =
        optical_length_to_top_boundary(params, params.rayleigh_scale_height, r, mu);
    let mie_depth = optical_length_to_top_boundary(params, params.mie_scale_height, r, mu);
    std::array::from_fn(|c| {
        (-(params.rayleigh_scattering[c] * rayleigh_depth
            + params.mie_extinction[c] * mie_depth))
            .exp()
    })
}

/// Transmittance between (r, mu) and the point at distance d, exact rather
/// than table-sampled.
pub fn transmittance(
    params: &AtmosphereParameters,
    r: f64,
    mu: f64,
    d: f64,
    intersects_ground: bool,
) -> [f64; 3] {
    let r_d = (d * d + 2.0 * r * mu * d + r * r)
        .sqrt()
        .clamp(params.bottom_radius, params.top_radius);
    let mu_d = clamp_cosine((r * mu + d) / r_d);
    let (near, far) = if intersects_ground {
        (
            transmittance_to_top_boundary(params, r_d, -mu_d),
            transmittance_to_top_boundary(params, r, -mu),
        )
    } else {
        (
            transmittance_to_top_boundary(params, r, mu),
            transmittance_to_top_boundary(params, r_d, mu_d),
        )
    };
    std::array::from_fn(|c| (near[c] / far[c]).min(1.0))
}

pub fn transmittance_to_sun(
    params: &AtmosphereParameters,
    r: f64,
    mu_s: f64,
) -> [f64; 3] {
    let sin_theta_h = params.bottom_radius / r;
    let cos_theta_h = -safe_sqrt(1.0 - sin_theta_h * sin_theta_h);
    let visible = smoothstep(
        -sin_theta_h * params.sun_angular_radius,
        sin_theta_h * params.sun_angular_radius,
        mu_s - cos_theta_h,
    );
    let t = transmittance_to_top_boundary(params, r, mu_s);
    std::array::from_fn(|c| t[c] * visible)
}

fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub fn rayleigh_phase(nu: f64) -> f64 {
    3.0 / (16.0 * std::f64::consts::PI) * (1.0 + nu * nu)
}

pub fn mie_phase(g: f64, nu: f64) -> f64 {
    let k = 3.0 / (8.0 * std::f64::consts::PI) * (1.0 - g * g) / (2.0 + g * g);
    k * (1.0 + nu * nu) / (1.0 + g * g - 2.0 * g * nu).powf(1.5)
}

/// Single-scattered (Rayleigh, Mie) radiance along a view ray, without
/// phase functions, matching the shader's 50-sample quadrature but with
/// exact transmittances.
pub fn single_scattering(
    params: &AtmosphereParameters,
    r: f64,
    mu: f64,
    mu_s: f64,
    nu: f64,
    intersects_ground: bool,
) -> ([f64; 3], [f64; 3]) {
    const SAMPLE_COUNT: usize = 50;
    let path_length = if intersects_ground {
        distance_to_bottom_boundary(params, r, mu)
    } else {
        distance_to_top_boundary(params, r, mu)
    };
    let dx = path_length / SAMPLE_COUNT as f64;
    let mut rayleigh_sum = [0.0; 3];
    let mut mie_sum = [0.0; 3];
    for i in 0..=SAMPLE_COUNT {
        let d_i = i as f64 * dx;
        let r_d = (d_i * d_i + 2.0 * r * mu * d_i + r * r)
            .sqrt()
            .clamp(params.bottom_radius, params.top_radius);
        let mu_s_d = clamp_cosine((r * mu_s + d_i * nu) / r_d);
        let view_t = transmittance(params, r, mu, d_i, intersects_ground);
        let sun_t = transmittance_to_sun(params, r_d, mu_s_d);
        let rayleigh_density =
            (-(r_d - params.bottom_radius) / params.rayleigh_scale_height).exp();
        let mie_density = (-(r_d - params.bottom_radius) / params.mie_scale_height).exp();
        let weight = if i == 0 || i == SAMPLE_COUNT { 0.5 } else { 1.0 };
        for c in 0..3 {
            let t = view_t[c] * sun_t[c];
            rayleigh_sum[c] += t * rayleigh_density * weight;
            mie_sum[c] += t * mie_density * weight;
        }
    }
    let mut rayleigh = [0.0; 3];
    let mut mie = [0.0; 3];
    for c in 0..3 {
        rayleigh[c] =
            rayleigh_sum[c] * dx * params.solar_irradiance[c] * params.rayleigh_scattering[c];
        mie[c] = mie_sum[c] * dx * params.solar_irradiance[c] * params.mie_scattering[c];
    }
    (rayleigh, mie)
}

fn texture_coord_from_unit_range(x: f64, texture_size: u32) -> f64 {
    0.5 / texture_size as f64 + x * (1.0 - 1.0 / texture_size as f64)
}

fn unit_range_from_texture_coord(u: f64, texture_size: u32) -> f64 {
    (u - 0.5 / texture_size as f64) / (1.0 - 1.0 / texture_size as f64)
}

pub fn transmittance_uv_from_r_mu(
    params: &AtmosphereParameters,
    r: f64,
    mu: f64,
) -> (f64, f64) {
    let h = (params.top_radius * params.top_radius
        - params.bottom_radius * params.bottom_radius)
        .sqrt();
    let rho = safe_sqrt(r * r - params.bottom_radius * params.bottom_radius);
    let d = distance_to_top_boundary(params, r, mu);
    let d_min = params.top_radius - r;
    let d_max = rho + h;
    let x_mu = (d - d_min) / (d_max - d_min);
    let x_r = rho / h;
    (
        texture_coord_from_unit_range(x_mu, TRANSMITTANCE_TEXTURE_WIDTH),
        texture_coord_from_unit_range(x_r, TRANSMITTANCE_TEXTURE_HEIGHT),
    )
}

pub fn r_mu_from_transmittance_uv(
    params: &AtmosphereParameters,
    u: f64,
    v: f64,
) -> (f64, f64) {
    let x_mu = unit_range_from_texture_coord(u, TRANSMITTANCE_TEXTURE_WIDTH);
    let x_r = unit_range_from_texture_coord(v, TRANSMITTANCE_TEXTURE_HEIGHT);
    let h = (params.top_radius * params.top_radius
        - params.bottom_radius * params.bottom_radius)
        .sqrt();
    let rho = h * x_r;
    let r = (rho * rho + params.bottom_radius * params.bottom_radius).sqrt();
    let d_min = params.top_radius - r;
    let d_max = rho + h;
    let d = d_min + x_mu * (d_max - d_min);
    let mu = if d == 0.0 {
        1.0
    } else {
        clamp_cosine((h * h - rho * rho - d * d) / (2.0 * r * d))
    };
    (r, mu)
}

/// The (r, mu, mu_s, nu) tuple a scattering-table texel encodes, with the
/// ground flag, matching the shader's frag-coord decoding. Texel indices
/// are zero-based; the frag coord is the texel center.
#[derive(Clone, Copy, Debug)]
pub struct ScatteringTexelParams {
    pub r: f64,
    pub mu: f64,
    pub mu_s: f64,
    pub nu: f64,
    pub ray_intersects_ground: bool,
}

pub fn scattering_params_from_texel(
    params: &AtmosphereParameters,
    x: u32,
    y: u32,
    z: u32,
) -> ScatteringTexelParams {
    let frag_x = x as f64 + 0.5;
    let frag_y = y as f64 + 0.5;
    let frag_z = z as f64 + 0.5;
    let frag_nu = (frag_x / SCATTERING_TEXTURE_MU_S_SIZE as f64).floor();
    let frag_mu_s = frag_x % SCATTERING_TEXTURE_MU_S_SIZE as f64;
    let uvwz = [
        frag_nu / (SCATTERING_TEXTURE_NU_SIZE - 1) as f64,
        frag_mu_s / SCATTERING_TEXTURE_MU_S_SIZE as f64,
        frag_y / SCATTERING_TEXTURE_MU_SIZE as f64,
        frag_z / SCATTERING_TEXTURE_R_SIZE as f64,
    ];

    let h = (params.top_radius * params.top_radius
        - params.bottom_radius * params.bottom_radius)
        .sqrt();
    let rho = h * unit_range_from_texture_coord(uvwz[3], SCATTERING_TEXTURE_R_SIZE);
    let r = (rho * rho + params.bottom_radius * params.bottom_radius).sqrt();

    let (mu, intersects) = if uvwz[2] < 0.5 {
        let d_min = r - params.bottom_radius;
        let d_max = rho;
        let d = d_min
            + (d_max - d_min)
                * unit_range_from_texture_coord(
                    1.0 - 2.0 * uvwz[2],
                    SCATTERING_TEXTURE_MU_SIZE / 2,
                );
        let mu = if d == 0.0 {
            -1.0
        } else {
            clamp_cosine(-(rho * rho + d * d) / (2.0 * r * d))
        };
        (mu, true)
    } else {
        let d_min = params.top_radius - r;
        let d_max = rho + h;
        let d = d_min
            + (d_max - d_min)
                * unit_range_from_texture_coord(
                    2.0 * uvwz[2] - 1.0,
                    SCATTERING_TEXTURE_MU_SIZE / 2,
                );
        let mu = if d == 0.0 {
            1.0
        } else {
            clamp_cosine((h * h - rho * rho - d * d) / (2.0 * r * d))
        };
        (mu, false)
    };

    let x_mu_s = unit_range_from_texture_coord(uvwz[1], SCATTERING_TEXTURE_MU_S_SIZE);
    let d_min = params.top_radius - params.bottom_radius;
    let d_max = h;
    let big_d = distance_to_top_boundary(params, params.bottom_radius, params.mu_s_min);
    let big_a = (big_d - d_min) / (d_max - d_min);
    let a = (big_a - x_mu_s * big_a) / (1.0 + x_mu_s * big_a);
    let d = d_min + a.min(big_a) * (d_max - d_min);
    let mu_s = if d == 0.0 {
        1.0
    } else {
        clamp_cosine((h * h - d * d) / (2.0 * params.bottom_radius * d))
    };

    let nu = clamp_cosine(uvwz[0] * 2.0 - 1.0);
    let nu_span = ((1.0 - mu * mu) * (1.0 - mu_s * mu_s)).sqrt();
    let nu = nu.clamp(mu * mu_s - nu_span, mu * mu_s + nu_span);

    ScatteringTexelParams {
        r,
        mu,
        mu_s,
        nu,
        ray_intersects_ground: intersects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ModelParameters;

    fn earth() -> AtmosphereParameters {
        ModelParameters::earth().resolve().unwrap()
    }

    #[test]
    fn test_transmittance_is_one_for_zero_path() {
        let params = earth();
        let t = transmittance_to_top_boundary(&params, params.top_radius, 1.0);
        for c in 0..3 {
            assert!((t[c] - 1.0).abs() < 1e-4, "channel {c}: {}", t[c]);
        }
    }

    #[test]
    fn test_transmittance_monotone_toward_horizon() {
        let params = earth();
        let r = params.bottom_radius + 1.0;
        let mut previous = f64::INFINITY;
        for i in 0..20 {
            let mu = 1.0 - i as f64 * 0.05;
            let t = transmittance_to_top_boundary(&params, r, mu);
            let total: f64 = t.iter().sum();
            assert!(
                total <= previous + 1e-9,
                "transmittance increased at mu={mu}: {total} > {previous}"
            );
            previous = total;
        }
    }

    #[test]
    fn test_transmittance_red_survives_best() {
        let params = earth();
        let t =
            transmittance_to_top_boundary(&params, params.bottom_radius + 0.5, 0.3);
        // Rayleigh extinction grows toward blue.
        assert!(t[0] > t[1] && t[1] > t[2], "{t:?}");
    }

    #[test]
    fn test_transmittance_uv_round_trip() {
        let params = earth();
        for &(r_frac, mu) in
            &[(0.01, 0.9), (0.3, 0.2), (0.7, 0.05), (0.99, 1.0), (0.5, 0.7)]
        {
            let r = params.bottom_radius
                + r_frac * (params.top_radius - params.bottom_radius);
            let (u, v) = transmittance_uv_from_r_mu(&params, r, mu);
            assert!((0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v));
            let (r2, mu2) = r_mu_from_transmittance_uv(&params, u, v);
            assert!((r - r2).abs() < 1e-6, "r {r} vs {r2}");
            assert!((mu - mu2).abs() < 1e-6, "mu {mu} vs {mu2}");
        }
    }

    #[test]
    fn test_ray_ground_intersection_classification() {
        let params = earth();
        let r = params.bottom_radius + 1.0;
        assert!(!ray_intersects_ground(&params, r, 0.1));
        assert!(ray_intersects_ground(&params, r, -0.5));
        // Near horizontal from altitude misses the ground.
        let r_high = params.top_radius - 1.0;
        assert!(!ray_intersects_ground(&params, r_high, -0.01));
    }

    #[test]
    fn test_single_scattering_sky_is_blue_at_noon() {
        let params = earth();
        let r = params.bottom_radius + 0.01;
        let (rayleigh, _mie) = single_scattering(&params, r, 1.0, 1.0, 1.0, false);
        assert!(rayleigh[2] > rayleigh[0], "{rayleigh:?}");
        assert!(rayleigh.iter().all(|&v| v.is_finite() && v > 0.0));
    }

    #[test]
    fn test_single_scattering_vanishes_at_night() {
        let params = earth();
        let r = params.bottom_radius + 0.01;
        // Sun well below the horizon.
        let (rayleigh, mie) = single_scattering(&params, r, 1.0, -0.5, -0.5, false);
        let total: f64 = rayleigh.iter().chain(mie.iter()).sum();
        assert!(total < 1e-6, "{total}");
    }

    #[test]
    fn test_scattering_texel_params_in_range() {
        let params = earth();
        for (x, y, z) in [
            (0, 0, 0),
            (255, 127, 31),
            (100, 64, 16),
            (37, 120, 5),
            (200, 3, 30),
        ] {
            let p = scattering_params_from_texel(&params, x, y, z);
            assert!(p.r >= params.bottom_radius - 1e-9 && p.r <= params.top_radius + 1e-9);
            assert!(p.mu.abs() <= 1.0 && p.mu_s.abs() <= 1.0 && p.nu.abs() <= 1.0);
            let nu_span = ((1.0 - p.mu * p.mu) * (1.0 - p.mu_s * p.mu_s)).sqrt();
            assert!(p.nu >= p.mu * p.mu_s - nu_span - 1e-9);
            assert!(p.nu <= p.mu * p.mu_s + nu_span + 1e-9);
        }
    }

    #[test]
    fn test_phase_functions_normalize() {
        // Integrate over the sphere; both should come to one.
        let steps = 2000;
        let mut rayleigh_total = 0.0;
        let mut mie_total = 0.0;
        for i in 0..steps {
            let theta = (i as f64 + 0.5) / steps as f64 * std::f64::consts::PI;
            let nu = theta.cos();
            let weight = 2.0 * std::f64::consts::PI * theta.sin()
                * (std::f64::consts::PI / steps as f64);
            rayleigh_total += rayleigh_phase(nu) * weight;
            mie_total += mie_phase(0.8, nu) * weight;
        }
        assert!((rayleigh_total - 1.0).abs() < 1e-3, "{rayleigh_total}");
        assert!((mie_total - 1.0).abs() < 1e-3, "{mie_total}");
    }
}

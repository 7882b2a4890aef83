//! Shader source assembly.
//!
//! The resolved atmosphere parameters are serialized into a WGSL header as
//! `const` declarations, so every shader sees them as compile-time data and
//! the compiler can fold them. The scattering function library and the
//! per-pass entry points are appended to that header to form complete
//! modules.

use std::fmt::Write;

use crate::constants::*;
use crate::params::AtmosphereParameters;

/// The scattering function library shared by all passes and the evaluator.
pub const FUNCTIONS_WGSL: &str = include_str!("shaders/functions.wgsl");

/// Fullscreen triangle, vertex indices 0..3.
const FULLSCREEN_VERTEX: &str = r#"
@vertex
fn vs_fullscreen(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((vertex_index << 1u) & 2u), f32(vertex_index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}
"#;

/// Per-draw scalars. One 256-byte uniform slot per draw, dynamic offset.
const PASS_PARAMS: &str = r#"
struct PassParams {
    layer: f32,
    scattering_order: i32,
    pad0: f32,
    pad1: f32,
}
"#;

const TRANSMITTANCE_PASS: &str = r#"
@fragment
fn fs_transmittance(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let transmittance =
        compute_transmittance_to_top_atmosphere_boundary_texture(frag_coord.xy);
    return vec4<f32>(transmittance, 1.0);
}
"#;

const DIRECT_IRRADIANCE_PASS: &str = r#"
@group(0) @binding(0) var lut_sampler: sampler;
@group(0) @binding(1) var transmittance_texture: texture_2d<f32>;

struct DirectIrradianceOutput {
    @location(0) delta_irradiance: vec4<f32>,
    @location(1) irradiance: vec4<f32>,
}

@fragment
fn fs_direct_irradiance(@builtin(position) frag_coord: vec4<f32>) -> DirectIrradianceOutput {
    let direct = compute_direct_irradiance_texture(
        transmittance_texture, lut_sampler, frag_coord.xy);
    // Direct sunlight is excluded from the accumulated sky irradiance.
    return DirectIrradianceOutput(vec4<f32>(direct, 1.0), vec4<f32>(0.0));
}
"#;

const SINGLE_SCATTERING_PASS: &str = r#"
@group(0) @binding(0) var lut_sampler: sampler;
@group(0) @binding(1) var transmittance_texture: texture_2d<f32>;
@group(0) @binding(2) var<uniform> pass_params: PassParams;

struct SingleScatteringOutput {
    @location(0) delta_rayleigh: vec4<f32>,
    @location(1) delta_mie: vec4<f32>,
    @location(2) scattering: vec4<f32>,
}

@fragment
fn fs_single_scattering(@builtin(position) frag_coord: vec4<f32>) -> SingleScatteringOutput {
    let result = compute_single_scattering_texture(
        transmittance_texture, lut_sampler,
        vec3<f32>(frag_coord.xy, pass_params.layer + 0.5));
    return SingleScatteringOutput(
        vec4<f32>(result.rayleigh, 1.0),
        vec4<f32>(result.mie, 1.0),
        vec4<f32>(result.rayleigh, result.mie.r));
}
"#;

const SCATTERING_DENSITY_PASS: &str = r#"
@group(0) @binding(0) var lut_sampler: sampler;
@group(0) @binding(1) var transmittance_texture: texture_2d<f32>;
@group(0) @binding(2) var single_rayleigh_scattering_texture: texture_3d<f32>;
@group(0) @binding(3) var single_mie_scattering_texture: texture_3d<f32>;
@group(0) @binding(4) var multiple_scattering_texture: texture_3d<f32>;
@group(0) @binding(5) var irradiance_texture: texture_2d<f32>;
@group(0) @binding(6) var<uniform> pass_params: PassParams;

@fragment
fn fs_scattering_density(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let density = compute_scattering_density_texture(
        transmittance_texture,
        single_rayleigh_scattering_texture,
        single_mie_scattering_texture,
        multiple_scattering_texture,
        irradiance_texture,
        lut_sampler,
        vec3<f32>(frag_coord.xy, pass_params.layer + 0.5),
        pass_params.scattering_order);
    return vec4<f32>(density, 1.0);
}
"#;

const INDIRECT_IRRADIANCE_PASS: &str = r#"
@group(0) @binding(0) var lut_sampler: sampler;
@group(0) @binding(1) var single_rayleigh_scattering_texture: texture_3d<f32>;
@group(0) @binding(2) var single_mie_scattering_texture: texture_3d<f32>;
@group(0) @binding(3) var multiple_scattering_texture: texture_3d<f32>;
@group(0) @binding(4) var<uniform> pass_params: PassParams;

struct IndirectIrradianceOutput {
    @location(0) delta_irradiance: vec4<f32>,
    @location(1) irradiance: vec4<f32>,
}

@fragment
fn fs_indirect_irradiance(@builtin(position) frag_coord: vec4<f32>) -> IndirectIrradianceOutput {
    let delta = compute_indirect_irradiance_texture(
        single_rayleigh_scattering_texture,
        single_mie_scattering_texture,
        multiple_scattering_texture,
        lut_sampler,
        frag_coord.xy,
        pass_params.scattering_order);
    // The second target is additively blended into the accumulator.
    return IndirectIrradianceOutput(vec4<f32>(delta, 1.0), vec4<f32>(delta, 0.0));
}
"#;

const MULTIPLE_SCATTERING_PASS: &str = r#"
@group(0) @binding(0) var lut_sampler: sampler;
@group(0) @binding(1) var transmittance_texture: texture_2d<f32>;
@group(0) @binding(2) var scattering_density_texture: texture_3d<f32>;
@group(0) @binding(3) var<uniform> pass_params: PassParams;

struct MultipleScatteringOutput {
    @location(0) delta_multiple_scattering: vec4<f32>,
    @location(1) scattering: vec4<f32>,
}

@fragment
fn fs_multiple_scattering(@builtin(position) frag_coord: vec4<f32>) -> MultipleScatteringOutput {
    let result = compute_multiple_scattering_texture(
        transmittance_texture, scattering_density_texture, lut_sampler,
        vec3<f32>(frag_coord.xy, pass_params.layer + 0.5));
    // Stored divided by the Rayleigh phase so the accumulator follows the
    // single-scattering convention; the evaluator re-applies it.
    return MultipleScatteringOutput(
        vec4<f32>(result.radiance, 1.0),
        vec4<f32>(result.radiance / rayleigh_phase_function(result.nu), 0.0));
}
"#;

/// Format an f64 as a WGSL float literal with f32 round-trip precision.
fn wgsl_literal(value: f64) -> String {
    let v = value as f32;
    let mut s = format!("{v:?}");
    if !s.contains('.') && !s.contains('e') && !s.contains('E') {
        s.push_str(".0");
    }
    s
}

fn wgsl_vec3(v: [f64; 3]) -> String {
    format!(
        "vec3<f32>({}, {}, {})",
        wgsl_literal(v[0]),
        wgsl_literal(v[1]),
        wgsl_literal(v[2])
    )
}

/// The generated header: the parameter struct, the baked `ATMOSPHERE`
/// constant, luminance conversion factors, and table sizes.
pub fn shader_header(params: &AtmosphereParameters) -> String {
    let mut header = String::with_capacity(2048);
    header.push_str(
        "struct AtmosphereParameters {\n\
         \x20   solar_irradiance: vec3<f32>,\n\
         \x20   sun_angular_radius: f32,\n\
         \x20   bottom_radius: f32,\n\
         \x20   top_radius: f32,\n\
         \x20   rayleigh_scale_height: f32,\n\
         \x20   rayleigh_scattering: vec3<f32>,\n\
         \x20   mie_scale_height: f32,\n\
         \x20   mie_scattering: vec3<f32>,\n\
         \x20   mie_extinction: vec3<f32>,\n\
         \x20   mie_phase_function_g: f32,\n\
         \x20   ground_albedo: vec3<f32>,\n\
         \x20   mu_s_min: f32,\n\
         }\n\n",
    );
    let _ = writeln!(
        header,
        "const ATMOSPHERE: AtmosphereParameters = AtmosphereParameters(\n\
         \x20   {},\n\
         \x20   {},\n\
         \x20   {},\n\
         \x20   {},\n\
         \x20   {},\n\
         \x20   {},\n\
         \x20   {},\n\
         \x20   {},\n\
         \x20   {},\n\
         \x20   {},\n\
         \x20   {},\n\
         \x20   {});",
        wgsl_vec3(params.solar_irradiance),
        wgsl_literal(params.sun_angular_radius),
        wgsl_literal(params.bottom_radius),
        wgsl_literal(params.top_radius),
        wgsl_literal(params.rayleigh_scale_height),
        wgsl_vec3(params.rayleigh_scattering),
        wgsl_literal(params.mie_scale_height),
        wgsl_vec3(params.mie_scattering),
        wgsl_vec3(params.mie_extinction),
        wgsl_literal(params.mie_phase_function_g),
        wgsl_vec3(params.ground_albedo),
        wgsl_literal(params.mu_s_min),
    );
    let _ = writeln!(
        header,
        "const SKY_SPECTRAL_RADIANCE_TO_LUMINANCE: vec3<f32> = {};",
        wgsl_vec3(params.sky_radiance_to_luminance)
    );
    let _ = writeln!(
        header,
        "const SUN_SPECTRAL_RADIANCE_TO_LUMINANCE: vec3<f32> = {};",
        wgsl_vec3(params.sun_radiance_to_luminance)
    );
    let _ = writeln!(
        header,
        "const COMBINED_SCATTERING_TEXTURES: bool = {};",
        params.combine_scattering_textures
    );
    for (name, value) in [
        ("TRANSMITTANCE_TEXTURE_WIDTH", TRANSMITTANCE_TEXTURE_WIDTH),
        ("TRANSMITTANCE_TEXTURE_HEIGHT", TRANSMITTANCE_TEXTURE_HEIGHT),
        ("SCATTERING_TEXTURE_R_SIZE", SCATTERING_TEXTURE_R_SIZE),
        ("SCATTERING_TEXTURE_MU_SIZE", SCATTERING_TEXTURE_MU_SIZE),
        ("SCATTERING_TEXTURE_MU_S_SIZE", SCATTERING_TEXTURE_MU_S_SIZE),
        ("SCATTERING_TEXTURE_NU_SIZE", SCATTERING_TEXTURE_NU_SIZE),
        ("IRRADIANCE_TEXTURE_WIDTH", IRRADIANCE_TEXTURE_WIDTH),
        ("IRRADIANCE_TEXTURE_HEIGHT", IRRADIANCE_TEXTURE_HEIGHT),
    ] {
        let _ = writeln!(header, "const {name}: i32 = {value};");
    }
    header.push('\n');
    header
}

/// Complete WGSL modules for the six precomputation passes, each embedding
/// the same header, function library, and fullscreen vertex stage.
pub struct PrecomputeShaders {
    pub transmittance: String,
    pub direct_irradiance: String,
    pub single_scattering: String,
    pub scattering_density: String,
    pub indirect_irradiance: String,
    pub multiple_scattering: String,
}

pub fn precompute_shaders(params: &AtmosphereParameters) -> PrecomputeShaders {
    let header = shader_header(params);
    let assemble = |pass: &str| {
        let mut source = String::with_capacity(
            header.len() + FUNCTIONS_WGSL.len() + PASS_PARAMS.len()
                + FULLSCREEN_VERTEX.len() + pass.len(),
        );
        source.push_str(&header);
        source.push_str(FUNCTIONS_WGSL);
        source.push_str(PASS_PARAMS);
        source.push_str(FULLSCREEN_VERTEX);
        source.push_str(pass);
        source
    };
    PrecomputeShaders {
        transmittance: assemble(TRANSMITTANCE_PASS),
        direct_irradiance: assemble(DIRECT_IRRADIANCE_PASS),
        single_scattering: assemble(SINGLE_SCATTERING_PASS),
        scattering_density: assemble(SCATTERING_DENSITY_PASS),
        indirect_irradiance: assemble(INDIRECT_IRRADIANCE_PASS),
        multiple_scattering: assemble(MULTIPLE_SCATTERING_PASS),
    }
}

/// WGSL source a host renderer concatenates into its own shader to query
/// the precomputed tables. `group_index` picks the bind group slot for the
/// four table bindings, matching
/// [`crate::evaluator::create_bind_group_layout`].
///
/// Exposes `get_sky_radiance`, `get_sky_radiance_to_point`,
/// `get_sun_and_sky_irradiance`, `get_solar_radiance`, and their luminance
/// counterparts.
pub fn evaluator_source(params: &AtmosphereParameters, group_index: u32) -> String {
    let header = shader_header(params);
    let mut source = String::with_capacity(header.len() + FUNCTIONS_WGSL.len() + 4096);
    source.push_str(&header);
    source.push_str(FUNCTIONS_WGSL);
    let _ = write!(
        source,
        r#"
@group({g}) @binding(0) var atmosphere_sampler: sampler;
@group({g}) @binding(1) var transmittance_texture: texture_2d<f32>;
@group({g}) @binding(2) var scattering_texture: texture_3d<f32>;
@group({g}) @binding(3) var irradiance_texture: texture_2d<f32>;
@group({g}) @binding(4) var single_mie_scattering_texture: texture_3d<f32>;

fn get_solar_radiance() -> vec3<f32> {{
    return solar_radiance();
}}

fn get_solar_luminance() -> vec3<f32> {{
    return solar_radiance() * SUN_SPECTRAL_RADIANCE_TO_LUMINANCE;
}}

fn get_sky_radiance(
    camera: vec3<f32>,
    view_ray: vec3<f32>,
    shadow_length: f32,
    sun_direction: vec3<f32>,
) -> RadianceWithTransmittance {{
    return sky_radiance(
        transmittance_texture, scattering_texture,
        single_mie_scattering_texture, atmosphere_sampler,
        camera, view_ray, shadow_length, sun_direction);
}}

fn get_sky_luminance(
    camera: vec3<f32>,
    view_ray: vec3<f32>,
    shadow_length: f32,
    sun_direction: vec3<f32>,
) -> RadianceWithTransmittance {{
    var result = get_sky_radiance(camera, view_ray, shadow_length, sun_direction);
    result.radiance *= SKY_SPECTRAL_RADIANCE_TO_LUMINANCE;
    return result;
}}

fn get_sky_radiance_to_point(
    camera: vec3<f32>,
    point: vec3<f32>,
    shadow_length: f32,
    sun_direction: vec3<f32>,
) -> RadianceWithTransmittance {{
    return sky_radiance_to_point(
        transmittance_texture, scattering_texture,
        single_mie_scattering_texture, atmosphere_sampler,
        camera, point, shadow_length, sun_direction);
}}

fn get_sky_luminance_to_point(
    camera: vec3<f32>,
    point: vec3<f32>,
    shadow_length: f32,
    sun_direction: vec3<f32>,
) -> RadianceWithTransmittance {{
    var result = get_sky_radiance_to_point(camera, point, shadow_length, sun_direction);
    result.radiance *= SKY_SPECTRAL_RADIANCE_TO_LUMINANCE;
    return result;
}}

fn get_sun_and_sky_irradiance(
    point: vec3<f32>,
    normal: vec3<f32>,
    sun_direction: vec3<f32>,
) -> SunAndSkyIrradiance {{
    return sun_and_sky_irradiance(
        transmittance_texture, irradiance_texture, atmosphere_sampler,
        point, normal, sun_direction);
}}

fn get_sun_and_sky_illuminance(
    point: vec3<f32>,
    normal: vec3<f32>,
    sun_direction: vec3<f32>,
) -> SunAndSkyIrradiance {{
    var result = get_sun_and_sky_irradiance(point, normal, sun_direction);
    result.sun_irradiance *= SUN_SPECTRAL_RADIANCE_TO_LUMINANCE;
    result.sky_irradiance *= SKY_SPECTRAL_RADIANCE_TO_LUMINANCE;
    return result;
}}
"#,
        g = group_index
    );
    source
}

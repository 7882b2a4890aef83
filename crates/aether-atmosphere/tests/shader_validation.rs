//! Parses and validates every generated WGSL module without a GPU.

use aether_atmosphere::codegen;
use aether_atmosphere::params::ModelParameters;

fn validate(name: &str, source: &str) {
    let module = naga::front::wgsl::parse_str(source).unwrap_or_else(|e| {
        panic!("{name} failed to parse: {}", e.emit_to_string(source));
    });
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .unwrap_or_else(|e| panic!("{name} failed validation: {e:?}"));
}

#[test]
fn test_precompute_shaders_validate() {
    let params = ModelParameters::earth().resolve().unwrap();
    let shaders = codegen::precompute_shaders(&params);
    validate("transmittance", &shaders.transmittance);
    validate("direct_irradiance", &shaders.direct_irradiance);
    validate("single_scattering", &shaders.single_scattering);
    validate("scattering_density", &shaders.scattering_density);
    validate("indirect_irradiance", &shaders.indirect_irradiance);
    validate("multiple_scattering", &shaders.multiple_scattering);
}

#[test]
fn test_precompute_shaders_validate_in_separate_mie_mode() {
    let mut model = ModelParameters::earth();
    model.combine_scattering_textures = false;
    let params = model.resolve().unwrap();
    let shaders = codegen::precompute_shaders(&params);
    validate("single_scattering", &shaders.single_scattering);
    validate("multiple_scattering", &shaders.multiple_scattering);
}

#[test]
fn test_evaluator_source_validates() {
    let params = ModelParameters::earth().resolve().unwrap();
    validate("evaluator", &codegen::evaluator_source(&params, 0));
    validate("evaluator_group_3", &codegen::evaluator_source(&params, 3));
}

#[test]
fn test_evaluator_validates_with_host_entry_point() {
    // The intended use: a host fragment shader appended to the evaluator.
    let params = ModelParameters::earth().resolve().unwrap();
    let mut source = codegen::evaluator_source(&params, 0);
    source.push_str(
        r#"
@fragment
fn fs_sky(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let camera = vec3<f32>(0.0, 0.0, 6360.1);
    let view_ray = vec3<f32>(0.0, 0.70710678, 0.70710678);
    let sun_direction = vec3<f32>(0.0, 0.0, 1.0);
    let result = get_sky_radiance(camera, view_ray, 0.0, sun_direction);
    return vec4<f32>(result.radiance * result.transmittance, 1.0);
}
"#,
    );
    validate("evaluator_with_host", &source);
}

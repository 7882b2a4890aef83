//! GPU integration tests for the precomputation pipeline.
//!
//! Each test acquires a headless device and returns early when no adapter
//! with the required features is available, so the suite passes on machines
//! without a GPU.

use aether_atmosphere::constants::*;
use aether_atmosphere::params::ModelParameters;
use aether_atmosphere::{SkyModel, evaluator, reference};
use aether_render::gpu::HeadlessContext;
use aether_render::lut::new_lut_2d;
use aether_render::readback::read_lut_layer;
use aether_render::shader::compile;

fn test_context() -> Option<HeadlessContext> {
    HeadlessContext::new(SkyModel::REQUIRED_FEATURES).ok()
}

fn earth_model(ctx: &HeadlessContext) -> SkyModel {
    SkyModel::new(&ctx.device, &ModelParameters::earth()).unwrap()
}

/// Renders one pixel with a fragment body that has the evaluator functions
/// in scope, and returns its RGBA value.
fn render_probe(ctx: &HeadlessContext, model: &SkyModel, probe_body: &str) -> [f32; 4] {
    let mut source = model.evaluator_source(0);
    source.push_str(&format!(
        r#"
@vertex
fn vs_probe(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {{
    let uv = vec2<f32>(f32((vertex_index << 1u) & 2u), f32(vertex_index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
}}

@fragment
fn fs_probe(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {{
    {probe_body}
}}
"#
    ));
    let module = compile(&ctx.device, "probe", &source).unwrap();
    let bind_layout = evaluator::create_bind_group_layout(&ctx.device);
    let bind_group = evaluator::create_bind_group(&ctx.device, &bind_layout, model);
    let pipeline_layout =
        ctx.device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("probe"),
                bind_group_layouts: &[&bind_layout],
                immediate_size: 0,
            });
    let pipeline = ctx
        .device
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("probe"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_probe"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_probe"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba32Float,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

    let target = new_lut_2d(&ctx.device, "probe-target", 1, 1, wgpu::TextureFormat::Rgba32Float);
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("probe") });
    {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("probe"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        rpass.set_pipeline(&pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }
    ctx.queue.submit(std::iter::once(encoder.finish()));
    read_lut_layer(&ctx.device, &ctx.queue, &target, 0).unwrap()[0]
}

#[test]
fn test_transmittance_matches_cpu_reference() {
    let Some(ctx) = test_context() else { return };
    let model = earth_model(&ctx);
    model.init(&ctx.device, &ctx.queue, 1).unwrap();

    let texels =
        read_lut_layer(&ctx.device, &ctx.queue, model.transmittance_texture(), 0).unwrap();
    let params = model.parameters();
    for &(x, y) in &[(10u32, 5u32), (128, 30), (200, 60), (40, 1), (250, 62)] {
        let u = (x as f64 + 0.5) / TRANSMITTANCE_TEXTURE_WIDTH as f64;
        let v = (y as f64 + 0.5) / TRANSMITTANCE_TEXTURE_HEIGHT as f64;
        let (r, mu) = reference::r_mu_from_transmittance_uv(params, u, v);
        let expected = reference::transmittance_to_top_boundary(params, r, mu);
        let got = texels[(y * TRANSMITTANCE_TEXTURE_WIDTH + x) as usize];
        for c in 0..3 {
            let diff = (got[c] as f64 - expected[c]).abs();
            assert!(
                diff < 1e-2 * expected[c].max(1.0) + 1e-4,
                "texel ({x},{y}) channel {c}: got {} expected {}",
                got[c],
                expected[c]
            );
        }
    }
}

#[test]
fn test_single_scattering_matches_cpu_reference() {
    let Some(ctx) = test_context() else { return };
    let model = earth_model(&ctx);
    model.init(&ctx.device, &ctx.queue, 1).unwrap();

    let params = model.parameters();
    for &(x, y, z) in &[(100u32, 90u32, 4u32), (40, 70, 12), (200, 100, 20)] {
        let texels =
            read_lut_layer(&ctx.device, &ctx.queue, model.scattering_texture(), z).unwrap();
        let p = reference::scattering_params_from_texel(params, x, y, z);
        let (rayleigh, mie) =
            reference::single_scattering(params, p.r, p.mu, p.mu_s, p.nu, p.ray_intersects_ground);
        let got = texels[(y * SCATTERING_TEXTURE_WIDTH + x) as usize];
        // After one order the combined table holds pure single Rayleigh in
        // rgb and the Mie red component in alpha.
        for c in 0..3 {
            let diff = (got[c] as f64 - rayleigh[c]).abs();
            assert!(
                diff < 0.1 * rayleigh[c].abs() + 1e-4,
                "texel ({x},{y},{z}) channel {c}: got {} expected {}",
                got[c],
                rayleigh[c]
            );
        }
        let alpha_diff = (got[3] as f64 - mie[0]).abs();
        assert!(
            alpha_diff < 0.1 * mie[0].abs() + 1e-4,
            "texel ({x},{y},{z}) alpha: got {} expected {}",
            got[3],
            mie[0]
        );
    }
}

#[test]
fn test_radiance_accumulates_with_scattering_orders() {
    let Some(ctx) = test_context() else { return };
    let model = earth_model(&ctx);

    let layer = SCATTERING_TEXTURE_DEPTH / 2;
    let mut previous_total = 0.0f64;
    for orders in [1u32, 2, 4] {
        model.init(&ctx.device, &ctx.queue, orders).unwrap();
        let texels =
            read_lut_layer(&ctx.device, &ctx.queue, model.scattering_texture(), layer).unwrap();
        let total: f64 = texels
            .iter()
            .map(|t| t[0] as f64 + t[1] as f64 + t[2] as f64)
            .sum();
        assert!(
            total >= previous_total * (1.0 - 1e-3),
            "orders={orders}: total {total} below previous {previous_total}"
        );
        assert!(total.is_finite() && total > 0.0);
        previous_total = total;
    }
}

#[test]
fn test_sky_is_blue_at_noon() {
    let Some(ctx) = test_context() else { return };
    let model = earth_model(&ctx);
    model.init(&ctx.device, &ctx.queue, 4).unwrap();

    let r = model.parameters().bottom_radius + 9.0;
    let body = format!(
        r#"
    let camera = vec3<f32>(0.0, 0.0, {r:?});
    let view_ray = vec3<f32>(0.0, 0.0, 1.0);
    let sun_direction = normalize(vec3<f32>(0.1, 0.0, 1.0));
    let result = get_sky_radiance(camera, view_ray, 0.0, sun_direction);
    return vec4<f32>(result.radiance, 1.0);
"#,
        r = r as f32
    );
    let radiance = render_probe(&ctx, &model, &body);
    assert!(radiance.iter().take(3).all(|v| v.is_finite() && *v > 0.0), "{radiance:?}");
    assert!(
        radiance[2] >= radiance[0],
        "zenith sky should not be red-dominant: {radiance:?}"
    );
}

#[test]
fn test_sunset_horizon_is_red() {
    let Some(ctx) = test_context() else { return };
    let model = earth_model(&ctx);
    model.init(&ctx.device, &ctx.queue, 4).unwrap();

    let r = model.parameters().bottom_radius + 0.5;
    let sun_zenith = 100.0f64.to_radians();
    let body = format!(
        r#"
    let camera = vec3<f32>(0.0, 0.0, {r:?});
    let view_ray = normalize(vec3<f32>(0.9986, 0.0, 0.0523));
    let sun_direction = vec3<f32>({sx:?}, 0.0, {sz:?});
    let result = get_sky_radiance(camera, view_ray, 0.0, sun_direction);
    return vec4<f32>(result.radiance, 1.0);
"#,
        r = r as f32,
        sx = sun_zenith.sin() as f32,
        sz = sun_zenith.cos() as f32
    );
    let radiance = render_probe(&ctx, &model, &body);
    assert!(radiance.iter().take(3).all(|v| v.is_finite() && *v >= 0.0), "{radiance:?}");
    assert!(
        radiance[0] > radiance[2],
        "sunset horizon should be red-dominant: {radiance:?}"
    );
}

#[test]
fn test_sky_radiance_to_point_converges_to_boundary() {
    let Some(ctx) = test_context() else { return };
    let model = earth_model(&ctx);
    model.init(&ctx.device, &ctx.queue, 2).unwrap();

    let params = model.parameters();
    let r = params.bottom_radius + 2.0;
    let mu = 0.4;
    let d_top = reference::distance_to_top_boundary(params, r, mu);
    // A point just inside the boundary along the ray.
    let d = d_top - 0.1;

    let view = [(1.0f64 - mu * mu).sqrt(), 0.0, mu];
    let point = [view[0] * d, 0.0, r + view[2] * d];
    let common = format!(
        "let camera = vec3<f32>(0.0, 0.0, {:?});\n\
         let view_ray = vec3<f32>({:?}, 0.0, {:?});\n\
         let sun_direction = normalize(vec3<f32>(0.3, 0.0, 1.0));",
        r as f32, view[0] as f32, view[2] as f32
    );

    let to_boundary = render_probe(
        &ctx,
        &model,
        &format!(
            "{common}\n    let result = get_sky_radiance(camera, view_ray, 0.0, sun_direction);\n    return vec4<f32>(result.radiance, 1.0);"
        ),
    );
    let to_point = render_probe(
        &ctx,
        &model,
        &format!(
            "{common}\n    let point = vec3<f32>({:?}, 0.0, {:?});\n    let result = get_sky_radiance_to_point(camera, point, 0.0, sun_direction);\n    return vec4<f32>(result.radiance, 1.0);",
            point[0] as f32, point[2] as f32
        ),
    );
    for c in 0..3 {
        let a = to_boundary[c] as f64;
        let b = to_point[c] as f64;
        assert!(
            (a - b).abs() <= 0.2 * a.abs().max(b.abs()) + 1e-3,
            "channel {c}: boundary {a} vs point {b}"
        );
    }
}

#[test]
fn test_init_rejects_zero_orders() {
    let Some(ctx) = test_context() else { return };
    let model = earth_model(&ctx);
    let err = model.init(&ctx.device, &ctx.queue, 0).unwrap_err();
    assert!(matches!(
        err,
        aether_atmosphere::PrecomputeError::InvalidOrderCount
    ));
}

#[test]
fn test_separate_mie_mode_precomputes() {
    let Some(ctx) = test_context() else { return };
    let mut model_params = ModelParameters::earth();
    model_params.combine_scattering_textures = false;
    let model = SkyModel::new(&ctx.device, &model_params).unwrap();
    assert!(model.single_mie_scattering_texture().is_some());
    model.init(&ctx.device, &ctx.queue, 2).unwrap();

    let mie = model.single_mie_scattering_texture().unwrap();
    let texels = read_lut_layer(&ctx.device, &ctx.queue, mie, 2).unwrap();
    assert!(texels.iter().any(|t| t[0] > 0.0), "Mie table left empty");
}

//! The precomputed sky model: owns the lookup tables and runs the
//! precomputation pipeline that fills them.
//!
//! Precomputation is a fixed sequence of fullscreen fragment passes:
//! transmittance, direct irradiance, single scattering, then for each
//! scattering order the scattering density, indirect irradiance, and
//! multiple scattering passes. 3D tables are rasterized one depth slice per
//! render pass. Accumulating targets use additive blending; scratch targets
//! are overwritten. The whole pipeline is encoded into a single command
//! stream, so pass ordering is the submission order.

use bytemuck::{Pod, Zeroable};
use thiserror::Error;
use tracing::{debug, info};

use aether_render::lut::{LutTexture, lut_sampler, new_lut_2d, new_lut_3d};
use aether_render::shader::{ShaderError, ShaderRegistry};

use crate::codegen;
use crate::constants::*;
use crate::params::{AtmosphereParameters, ModelParameters, ParameterError};

/// Transmittance is stored at full precision: half floats show visible
/// banding near the horizon.
const TRANSMITTANCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Scattering and irradiance tables carry smooth low-frequency data and
/// accumulate with blending, so they stay at half precision.
const LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Uniform slot stride; dynamic offsets must be 256-byte aligned.
const UNIFORM_SLOT: u64 = 256;

#[derive(Debug, Error)]
pub enum PrecomputeError {
    #[error("num_scattering_orders must be at least 1")]
    InvalidOrderCount,
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("GPU validation failed during precomputation: {0}")]
    Validation(String),
}

/// Per-draw scalars, one 256-byte slot per draw. Matches the WGSL
/// `PassParams` struct.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct PassUniforms {
    layer: f32,
    scattering_order: i32,
    pad: [f32; 2],
}

/// A precomputed atmosphere: four permanent lookup tables plus the
/// parameters baked into every shader that consumes them.
///
/// Construction allocates the tables with undefined contents; they hold
/// valid data only after [`SkyModel::init`] returns `Ok`. If `init` fails
/// the tables are left undefined and the model must be discarded.
pub struct SkyModel {
    params: AtmosphereParameters,
    sampler: wgpu::Sampler,
    transmittance: LutTexture,
    scattering: LutTexture,
    irradiance: LutTexture,
    /// Present only in separate-Mie mode; in combined mode the Mie single
    /// scattering lives in the alpha channel of `scattering`.
    single_mie_scattering: Option<LutTexture>,
}

impl SkyModel {
    /// Device features the model needs: the transmittance table is a
    /// filtered 32-bit float texture.
    pub const REQUIRED_FEATURES: wgpu::Features = wgpu::Features::FLOAT32_FILTERABLE;

    pub fn new(device: &wgpu::Device, model: &ModelParameters) -> Result<Self, ParameterError> {
        let params = model.resolve()?;
        let transmittance = new_lut_2d(
            device,
            "sky-transmittance",
            TRANSMITTANCE_TEXTURE_WIDTH,
            TRANSMITTANCE_TEXTURE_HEIGHT,
            TRANSMITTANCE_FORMAT,
        );
        let scattering = new_lut_3d(
            device,
            "sky-scattering",
            SCATTERING_TEXTURE_WIDTH,
            SCATTERING_TEXTURE_HEIGHT,
            SCATTERING_TEXTURE_DEPTH,
            LUT_FORMAT,
        );
        let irradiance = new_lut_2d(
            device,
            "sky-irradiance",
            IRRADIANCE_TEXTURE_WIDTH,
            IRRADIANCE_TEXTURE_HEIGHT,
            LUT_FORMAT,
        );
        let single_mie_scattering = if params.combine_scattering_textures {
            None
        } else {
            Some(new_lut_3d(
                device,
                "sky-single-mie-scattering",
                SCATTERING_TEXTURE_WIDTH,
                SCATTERING_TEXTURE_HEIGHT,
                SCATTERING_TEXTURE_DEPTH,
                LUT_FORMAT,
            ))
        };
        Ok(Self {
            params,
            sampler: lut_sampler(device),
            transmittance,
            scattering,
            irradiance,
            single_mie_scattering,
        })
    }

    pub fn parameters(&self) -> &AtmosphereParameters {
        &self.params
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn transmittance_texture(&self) -> &LutTexture {
        &self.transmittance
    }

    pub fn scattering_texture(&self) -> &LutTexture {
        &self.scattering
    }

    pub fn irradiance_texture(&self) -> &LutTexture {
        &self.irradiance
    }

    pub fn single_mie_scattering_texture(&self) -> Option<&LutTexture> {
        self.single_mie_scattering.as_ref()
    }

    /// WGSL source for querying the tables from a host shader, binding them
    /// at `group_index`. See [`crate::evaluator`] for the matching bind
    /// group.
    pub fn evaluator_source(&self, group_index: u32) -> String {
        codegen::evaluator_source(&self.params, group_index)
    }

    /// Run the precomputation and fill the lookup tables.
    ///
    /// Encodes every pass into one command stream and submits it; returns
    /// once submission has passed GPU validation, without waiting for
    /// execution. Re-running with a different order count is allowed and
    /// overwrites the tables from scratch.
    pub fn init(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        num_scattering_orders: u32,
    ) -> Result<(), PrecomputeError> {
        if num_scattering_orders < 1 {
            return Err(PrecomputeError::InvalidOrderCount);
        }
        info!(num_scattering_orders, "precomputing atmosphere tables");

        let shaders = codegen::precompute_shaders(&self.params);

        // The scope also covers pipeline construction, so layout mistakes
        // in the generated shaders surface as PrecomputeError instead of
        // an uncaptured device error.
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let passes = match PrecomputePasses::new(device, &shaders) {
            Ok(passes) => passes,
            Err(e) => {
                let _ = pollster::block_on(scope.pop());
                return Err(e.into());
            }
        };

        // Scratch tables for the duration of this call. delta_multiple
        // aliases delta_rayleigh: by the time multiple scattering of order
        // k is written, the single Rayleigh content has no remaining
        // reader.
        let delta_irradiance = new_lut_2d(
            device,
            "sky-delta-irradiance",
            IRRADIANCE_TEXTURE_WIDTH,
            IRRADIANCE_TEXTURE_HEIGHT,
            LUT_FORMAT,
        );
        let delta_rayleigh = new_lut_3d(
            device,
            "sky-delta-rayleigh",
            SCATTERING_TEXTURE_WIDTH,
            SCATTERING_TEXTURE_HEIGHT,
            SCATTERING_TEXTURE_DEPTH,
            LUT_FORMAT,
        );
        // In separate-Mie mode the permanent table doubles as the scratch
        // Mie target: nothing accumulates into it after single scattering.
        let delta_mie_owned;
        let delta_mie: &LutTexture = match &self.single_mie_scattering {
            Some(permanent) => permanent,
            None => {
                delta_mie_owned = new_lut_3d(
                    device,
                    "sky-delta-mie",
                    SCATTERING_TEXTURE_WIDTH,
                    SCATTERING_TEXTURE_HEIGHT,
                    SCATTERING_TEXTURE_DEPTH,
                    LUT_FORMAT,
                );
                &delta_mie_owned
            }
        };
        let delta_scattering_density = new_lut_3d(
            device,
            "sky-delta-scattering-density",
            SCATTERING_TEXTURE_WIDTH,
            SCATTERING_TEXTURE_HEIGHT,
            SCATTERING_TEXTURE_DEPTH,
            LUT_FORMAT,
        );
        let delta_multiple = &delta_rayleigh;

        // One uniform slot per draw that reads PassParams.
        let layer_count = SCATTERING_TEXTURE_DEPTH;
        let draws_per_order = layer_count + 1 + layer_count;
        let slot_count =
            layer_count + num_scattering_orders.saturating_sub(1) * draws_per_order;
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sky-pass-uniforms"),
            size: u64::from(slot_count.max(1)) * UNIFORM_SLOT,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut next_slot: u32 = 0;
        let mut write_slot = |layer: u32, scattering_order: i32| -> u32 {
            let offset = u64::from(next_slot) * UNIFORM_SLOT;
            queue.write_buffer(
                &uniforms,
                offset,
                bytemuck::bytes_of(&PassUniforms {
                    layer: layer as f32,
                    scattering_order,
                    pad: [0.0; 2],
                }),
            );
            next_slot += 1;
            offset as u32
        };

        let direct_irradiance_bg = passes.direct_irradiance.bind(
            device,
            &[
                sampler_entry(0, &self.sampler),
                texture_entry(1, &self.transmittance),
            ],
        );
        let single_scattering_bg = passes.single_scattering.bind(
            device,
            &[
                sampler_entry(0, &self.sampler),
                texture_entry(1, &self.transmittance),
                uniform_entry(2, &uniforms),
            ],
        );
        let scattering_density_bg = passes.scattering_density.bind(
            device,
            &[
                sampler_entry(0, &self.sampler),
                texture_entry(1, &self.transmittance),
                texture_entry(2, &delta_rayleigh),
                texture_entry(3, delta_mie),
                texture_entry(4, delta_multiple),
                texture_entry(5, &delta_irradiance),
                uniform_entry(6, &uniforms),
            ],
        );
        let indirect_irradiance_bg = passes.indirect_irradiance.bind(
            device,
            &[
                sampler_entry(0, &self.sampler),
                texture_entry(1, &delta_rayleigh),
                texture_entry(2, delta_mie),
                texture_entry(3, delta_multiple),
                uniform_entry(4, &uniforms),
            ],
        );
        let multiple_scattering_bg = passes.multiple_scattering.bind(
            device,
            &[
                sampler_entry(0, &self.sampler),
                texture_entry(1, &self.transmittance),
                texture_entry(2, &delta_scattering_density),
                uniform_entry(3, &uniforms),
            ],
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sky-precompute"),
        });

        // Phase 1: transmittance, the only pass with no inputs.
        debug!("transmittance pass");
        draw_pass(
            &mut encoder,
            "transmittance",
            &passes.transmittance.pipeline,
            None,
            &[clear_target(&self.transmittance.view, None)],
        );

        // Phase 2: direct irradiance into the scratch table; the permanent
        // accumulator starts from zero because direct sunlight is excluded
        // from it.
        debug!("direct irradiance pass");
        draw_pass(
            &mut encoder,
            "direct-irradiance",
            &passes.direct_irradiance.pipeline,
            Some((&direct_irradiance_bg, None)),
            &[
                clear_target(&delta_irradiance.view, None),
                clear_target(&self.irradiance.view, None),
            ],
        );

        // Phase 3: single scattering, one render pass per depth slice.
        debug!("single scattering pass");
        for layer in 0..layer_count {
            let offset = write_slot(layer, 0);
            draw_pass(
                &mut encoder,
                "single-scattering",
                &passes.single_scattering.pipeline,
                Some((&single_scattering_bg, Some(offset))),
                &[
                    clear_target(&delta_rayleigh.view, Some(layer)),
                    clear_target(&delta_mie.view, Some(layer)),
                    clear_target(&self.scattering.view, Some(layer)),
                ],
            );
        }

        // Phases 4-6 per order. Order k consumes the radiance field of
        // order k-1, so the loop is inherently sequential.
        for order in 2..=num_scattering_orders {
            debug!(order, "scattering order");
            for layer in 0..layer_count {
                let offset = write_slot(layer, order as i32);
                draw_pass(
                    &mut encoder,
                    "scattering-density",
                    &passes.scattering_density.pipeline,
                    Some((&scattering_density_bg, Some(offset))),
                    &[clear_target(&delta_scattering_density.view, Some(layer))],
                );
            }

            let offset = write_slot(0, order as i32 - 1);
            draw_pass(
                &mut encoder,
                "indirect-irradiance",
                &passes.indirect_irradiance.pipeline,
                Some((&indirect_irradiance_bg, Some(offset))),
                &[
                    clear_target(&delta_irradiance.view, None),
                    load_target(&self.irradiance.view, None),
                ],
            );

            for layer in 0..layer_count {
                let offset = write_slot(layer, order as i32);
                draw_pass(
                    &mut encoder,
                    "multiple-scattering",
                    &passes.multiple_scattering.pipeline,
                    Some((&multiple_scattering_bg, Some(offset))),
                    &[
                        clear_target(&delta_multiple.view, Some(layer)),
                        load_target(&self.scattering.view, Some(layer)),
                    ],
                );
            }
        }

        queue.submit(std::iter::once(encoder.finish()));

        if let Some(error) = pollster::block_on(scope.pop()) {
            return Err(PrecomputeError::Validation(error.to_string()));
        }
        info!("atmosphere tables submitted");
        Ok(())
    }
}

/// A compiled precompute pass: pipeline plus its bind group layout.
struct Pass {
    pipeline: wgpu::RenderPipeline,
    layout: Option<wgpu::BindGroupLayout>,
}

impl Pass {
    fn bind(&self, device: &wgpu::Device, entries: &[wgpu::BindGroupEntry]) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: self.layout.as_ref().expect("pass has no bindings"),
            entries,
        })
    }
}

struct PrecomputePasses {
    transmittance: Pass,
    direct_irradiance: Pass,
    single_scattering: Pass,
    scattering_density: Pass,
    indirect_irradiance: Pass,
    multiple_scattering: Pass,
}

impl PrecomputePasses {
    fn new(
        device: &wgpu::Device,
        shaders: &codegen::PrecomputeShaders,
    ) -> Result<Self, ShaderError> {
        let registry = &mut ShaderRegistry::new();
        let transmittance = build_pass(
            device,
            registry,
            "transmittance",
            &shaders.transmittance,
            "fs_transmittance",
            &[],
            &[(TRANSMITTANCE_FORMAT, None)],
        )?;
        let direct_irradiance = build_pass(
            device,
            registry,
            "direct-irradiance",
            &shaders.direct_irradiance,
            "fs_direct_irradiance",
            &[sampler_layout(0), texture_2d_layout(1)],
            &[(LUT_FORMAT, None), (LUT_FORMAT, None)],
        )?;
        let single_scattering = build_pass(
            device,
            registry,
            "single-scattering",
            &shaders.single_scattering,
            "fs_single_scattering",
            &[sampler_layout(0), texture_2d_layout(1), uniform_layout(2)],
            &[(LUT_FORMAT, None), (LUT_FORMAT, None), (LUT_FORMAT, None)],
        )?;
        let scattering_density = build_pass(
            device,
            registry,
            "scattering-density",
            &shaders.scattering_density,
            "fs_scattering_density",
            &[
                sampler_layout(0),
                texture_2d_layout(1),
                texture_3d_layout(2),
                texture_3d_layout(3),
                texture_3d_layout(4),
                texture_2d_layout(5),
                uniform_layout(6),
            ],
            &[(LUT_FORMAT, None)],
        )?;
        let indirect_irradiance = build_pass(
            device,
            registry,
            "indirect-irradiance",
            &shaders.indirect_irradiance,
            "fs_indirect_irradiance",
            &[
                sampler_layout(0),
                texture_3d_layout(1),
                texture_3d_layout(2),
                texture_3d_layout(3),
                uniform_layout(4),
            ],
            &[(LUT_FORMAT, None), (LUT_FORMAT, Some(ADDITIVE_BLEND))],
        )?;
        let multiple_scattering = build_pass(
            device,
            registry,
            "multiple-scattering",
            &shaders.multiple_scattering,
            "fs_multiple_scattering",
            &[
                sampler_layout(0),
                texture_2d_layout(1),
                texture_3d_layout(2),
                uniform_layout(3),
            ],
            &[(LUT_FORMAT, None), (LUT_FORMAT, Some(ADDITIVE_BLEND))],
        )?;
        Ok(Self {
            transmittance,
            direct_irradiance,
            single_scattering,
            scattering_density,
            indirect_irradiance,
            multiple_scattering,
        })
    }
}

fn build_pass(
    device: &wgpu::Device,
    registry: &mut ShaderRegistry,
    name: &str,
    source: &str,
    entry_point: &str,
    bindings: &[wgpu::BindGroupLayoutEntry],
    targets: &[(wgpu::TextureFormat, Option<wgpu::BlendState>)],
) -> Result<Pass, ShaderError> {
    let module = registry.load_from_source(device, name, source)?;
    let layout = if bindings.is_empty() {
        None
    } else {
        Some(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(name),
            entries: bindings,
        }))
    };
    let layouts: Vec<&wgpu::BindGroupLayout> = layout.iter().collect();
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(name),
        bind_group_layouts: &layouts,
        immediate_size: 0,
    });
    let target_states: Vec<Option<wgpu::ColorTargetState>> = targets
        .iter()
        .map(|&(format, blend)| {
            Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(name),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_fullscreen"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some(entry_point),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &target_states,
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });
    Ok(Pass { pipeline, layout })
}

fn sampler_layout(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn texture_layout(
    binding: u32,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn texture_2d_layout(binding: u32) -> wgpu::BindGroupLayoutEntry {
    texture_layout(binding, wgpu::TextureViewDimension::D2)
}

fn texture_3d_layout(binding: u32) -> wgpu::BindGroupLayoutEntry {
    texture_layout(binding, wgpu::TextureViewDimension::D3)
}

fn uniform_layout(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: wgpu::BufferSize::new(
                std::mem::size_of::<PassUniforms>() as u64
            ),
        },
        count: None,
    }
}

fn sampler_entry<'a>(binding: u32, sampler: &'a wgpu::Sampler) -> wgpu::BindGroupEntry<'a> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::Sampler(sampler),
    }
}

fn texture_entry<'a>(binding: u32, lut: &'a LutTexture) -> wgpu::BindGroupEntry<'a> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::TextureView(&lut.view),
    }
}

fn uniform_entry<'a>(binding: u32, buffer: &'a wgpu::Buffer) -> wgpu::BindGroupEntry<'a> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer,
            offset: 0,
            size: wgpu::BufferSize::new(std::mem::size_of::<PassUniforms>() as u64),
        }),
    }
}

fn clear_target<'a>(
    view: &'a wgpu::TextureView,
    depth_slice: Option<u32>,
) -> Option<wgpu::RenderPassColorAttachment<'a>> {
    Some(wgpu::RenderPassColorAttachment {
        view,
        depth_slice,
        resolve_target: None,
        ops: wgpu::Operations {
            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            store: wgpu::StoreOp::Store,
        },
    })
}

fn load_target<'a>(
    view: &'a wgpu::TextureView,
    depth_slice: Option<u32>,
) -> Option<wgpu::RenderPassColorAttachment<'a>> {
    Some(wgpu::RenderPassColorAttachment {
        view,
        depth_slice,
        resolve_target: None,
        ops: wgpu::Operations {
            load: wgpu::LoadOp::Load,
            store: wgpu::StoreOp::Store,
        },
    })
}

/// Encode one fullscreen draw. `offset` is the dynamic offset for the
/// pass's `PassParams` slot; passes without per-draw scalars take `None`.
fn draw_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_group: Option<(&wgpu::BindGroup, Option<u32>)>,
    attachments: &[Option<wgpu::RenderPassColorAttachment>],
) {
    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: attachments,
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });
    rpass.set_pipeline(pipeline);
    if let Some((bg, offset)) = bind_group {
        match offset {
            Some(offset) => rpass.set_bind_group(0, bg, &[offset]),
            None => rpass.set_bind_group(0, bg, &[]),
        }
    }
    rpass.draw(0..3, 0..1);
}

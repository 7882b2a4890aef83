//! Sky rendering: owns the precomputed tables and the fullscreen pass
//! that evaluates them against the swapchain.

use aether_atmosphere::{ModelParameters, PrecomputeError, SkyModel, evaluator};
use aether_render::{ShaderError, compile};
use bytemuck::{Pod, Zeroable};
use tracing::info;

const SKY_SHADER: &str = include_str!("shaders/sky.wgsl");

/// Per-frame uniforms for the sky pass. Layout matches `SkyUniforms` in
/// `shaders/sky.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SkyUniforms {
    pub inv_view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub exposure: f32,
    pub sun_direction: [f32; 3],
    pub _pad0: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum SkyInitError {
    #[error("invalid atmosphere parameters: {0}")]
    Parameters(#[from] aether_atmosphere::ParameterError),
    #[error("table precomputation failed: {0}")]
    Precompute(#[from] PrecomputeError),
    #[error("sky shader failed to compile: {0}")]
    Shader(#[from] ShaderError),
}

/// Fullscreen sky renderer over a precomputed [`SkyModel`].
pub struct SkyRenderer {
    model: SkyModel,
    pipeline: wgpu::RenderPipeline,
    lut_bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

impl SkyRenderer {
    /// Build the model, run the precomputation, and set up the render pass.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        params: &ModelParameters,
        num_scattering_orders: u32,
    ) -> Result<Self, SkyInitError> {
        let model = SkyModel::new(device, params)?;

        let start = std::time::Instant::now();
        model.init(device, queue, num_scattering_orders)?;
        info!(
            orders = num_scattering_orders,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "atmosphere tables precomputed"
        );

        let source = format!("{}{}", model.evaluator_source(0), SKY_SHADER);
        let module = compile(device, "sky", &source)?;

        let lut_layout = evaluator::create_bind_group_layout(device);
        let lut_bind_group = evaluator::create_bind_group(device, &lut_layout, &model);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sky-uniforms-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<SkyUniforms>() as u64
                    ),
                },
                count: None,
            }],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sky-uniforms"),
            size: std::mem::size_of::<SkyUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sky-uniforms-bind-group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sky-pipeline-layout"),
            bind_group_layouts: &[&lut_layout, &uniform_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sky-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_sky"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_sky"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview_mask: None,
            cache: None,
        });

        Ok(Self {
            model,
            pipeline,
            lut_bind_group,
            uniform_buffer,
            uniform_bind_group,
        })
    }

    pub fn model(&self) -> &SkyModel {
        &self.model
    }

    /// Upload this frame's uniforms.
    pub fn update(&self, queue: &wgpu::Queue, uniforms: &SkyUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Draw the sky over the whole target.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("sky-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.lut_bind_group, &[]);
        pass.set_bind_group(1, &self.uniform_bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

//! Runtime binding contract for shaders that query the precomputed tables.
//!
//! A host renderer concatenates [`SkyModel::evaluator_source`] into its own
//! WGSL and binds the group built here at the same group index. Binding
//! order: sampler, transmittance, scattering, irradiance, single Mie
//! scattering. In combined mode the scattering table is bound again in the
//! Mie slot; the shader never reads it there.

use crate::model::SkyModel;

pub fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding: u32, view_dimension: wgpu::TextureViewDimension| {
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
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("atmosphere-evaluator"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            texture(1, wgpu::TextureViewDimension::D2),
            texture(2, wgpu::TextureViewDimension::D3),
            texture(3, wgpu::TextureViewDimension::D2),
            texture(4, wgpu::TextureViewDimension::D3),
        ],
    })
}

pub fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    model: &SkyModel,
) -> wgpu::BindGroup {
    let single_mie_view = match model.single_mie_scattering_texture() {
        Some(lut) => &lut.view,
        None => &model.scattering_texture().view,
    };
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("atmosphere-evaluator"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Sampler(model.sampler()),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(
                    &model.transmittance_texture().view,
                ),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(
                    &model.scattering_texture().view,
                ),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(
                    &model.irradiance_texture().view,
                ),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(single_mie_view),
            },
        ],
    })
}

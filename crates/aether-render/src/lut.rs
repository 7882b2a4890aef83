//! Float lookup-table texture allocation.
//!
//! Precomputed atmosphere tables live in 2D and 3D floating-point textures
//! that are render targets during precomputation and sampled textures
//! afterwards. Contents are undefined until the first pass writes them.

/// A GPU lookup-table texture with its default view.
pub struct LutTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    /// Width, height, and depth (1 for 2D tables) in texels.
    pub size: wgpu::Extent3d,
    pub format: wgpu::TextureFormat,
}

impl LutTexture {
    fn new(
        device: &wgpu::Device,
        label: &str,
        size: wgpu::Extent3d,
        dimension: wgpu::TextureDimension,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            size,
            format,
        }
    }

    /// Bytes per texel for the table's format.
    pub fn bytes_per_texel(&self) -> u32 {
        match self.format {
            wgpu::TextureFormat::Rgba32Float => 16,
            wgpu::TextureFormat::Rgba16Float => 8,
            other => unreachable!("unsupported LUT format {other:?}"),
        }
    }
}

/// Allocate an uninitialized 2D float lookup table.
pub fn new_lut_2d(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> LutTexture {
    LutTexture::new(
        device,
        label,
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        wgpu::TextureDimension::D2,
        format,
    )
}

/// Allocate an uninitialized 3D float lookup table.
pub fn new_lut_3d(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    depth: u32,
    format: wgpu::TextureFormat,
) -> LutTexture {
    LutTexture::new(
        device,
        label,
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: depth,
        },
        wgpu::TextureDimension::D3,
        format,
    )
}

/// The shared sampler for all lookup tables: bilinear, clamped to edge on
/// every axis. The nonlinear parameterizations assume edge clamping.
pub fn lut_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("lut-sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

//! Reading lookup-table contents back to the CPU.
//!
//! Used by validation tests and debug dumps. Each call copies one 2D table
//! or one depth slice of a 3D table into a mappable buffer, blocks until
//! the copy completes, and decodes the texels to `[f32; 4]`.

use thiserror::Error;

use crate::lut::LutTexture;

#[derive(Debug, Error)]
pub enum ReadbackError {
    #[error("layer {layer} out of range for texture with depth {depth}")]
    LayerOutOfRange { layer: u32, depth: u32 },
    #[error("failed to map readback buffer: {0}")]
    MapFailed(String),
}

/// Read back one slice of a lookup table as RGBA f32 texels, row-major.
///
/// For 2D tables pass `layer == 0`. Blocks until the GPU copy completes.
pub fn read_lut_layer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    lut: &LutTexture,
    layer: u32,
) -> Result<Vec<[f32; 4]>, ReadbackError> {
    let depth = lut.size.depth_or_array_layers;
    if layer >= depth {
        return Err(ReadbackError::LayerOutOfRange { layer, depth });
    }

    let bytes_per_texel = lut.bytes_per_texel();
    let unpadded_bytes_per_row = lut.size.width * bytes_per_texel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
    let buffer_size = (padded_bytes_per_row * lut.size.height) as u64;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("lut-readback"),
        size: buffer_size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("lut-readback"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &lut.texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(lut.size.height),
            },
        },
        wgpu::Extent3d {
            width: lut.size.width,
            height: lut.size.height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::PollType::Wait {
        submission_index: None,
        timeout: None,
    });
    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(ReadbackError::MapFailed(e.to_string())),
        Err(_) => return Err(ReadbackError::MapFailed("map callback dropped".into())),
    }

    let data = slice.get_mapped_range();
    let mut texels =
        Vec::with_capacity((lut.size.width * lut.size.height) as usize);
    for row in 0..lut.size.height {
        let start = (row * padded_bytes_per_row) as usize;
        let end = start + unpadded_bytes_per_row as usize;
        decode_row(lut.format, &data[start..end], &mut texels);
    }
    drop(data);
    buffer.unmap();
    Ok(texels)
}

fn decode_row(format: wgpu::TextureFormat, bytes: &[u8], out: &mut Vec<[f32; 4]>) {
    match format {
        wgpu::TextureFormat::Rgba32Float => {
            for chunk in bytes.chunks_exact(16) {
                let v: &[f32] = bytemuck::cast_slice(chunk);
                out.push([v[0], v[1], v[2], v[3]]);
            }
        }
        wgpu::TextureFormat::Rgba16Float => {
            for chunk in bytes.chunks_exact(8) {
                let v: &[u16] = bytemuck::cast_slice(chunk);
                out.push([
                    f16_to_f32(v[0]),
                    f16_to_f32(v[1]),
                    f16_to_f32(v[2]),
                    f16_to_f32(v[3]),
                ]);
            }
        }
        other => unreachable!("unsupported LUT format {other:?}"),
    }
}

/// IEEE 754 binary16 to binary32, including subnormals and infinities.
fn f16_to_f32(bits: u16) -> f32 {
    let sign = ((bits >> 15) & 1) as u32;
    let exp = ((bits >> 10) & 0x1f) as u32;
    let frac = (bits & 0x3ff) as u32;
    let f32_bits = if exp == 0 {
        if frac == 0 {
            sign << 31
        } else {
            // Normalize the subnormal significand.
            let mut exp32: i32 = 127 - 15 + 1;
            let mut frac32 = frac;
            while frac32 & 0x400 == 0 {
                frac32 <<= 1;
                exp32 -= 1;
            }
            frac32 &= 0x3ff;
            (sign << 31) | ((exp32 as u32) << 23) | (frac32 << 13)
        }
    } else if exp == 0x1f {
        (sign << 31) | 0x7f80_0000 | (frac << 13)
    } else {
        (sign << 31) | ((exp + 112) << 23) | (frac << 13)
    };
    f32::from_bits(f32_bits)
}

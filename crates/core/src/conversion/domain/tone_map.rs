use rayon::prelude::*;

use crate::shared::constants::PARALLEL_THRESHOLD;
use crate::shared::hdr_frame::HdrFrame;
use crate::shared::pixel_packing::PixelPacking;

/// Clamps a linear channel to `[0, 1]` and truncates it to 8 bits.
/// NaN maps to 0.
pub fn quantize(channel: f32) -> u8 {
    (channel.max(0.0).min(1.0) * 255.0) as u8
}

/// One opaque RGBA8 pixel from linear RGB.
pub fn rgba_texel(rgb: [f32; 3]) -> [u8; 4] {
    [quantize(rgb[0]), quantize(rgb[1]), quantize(rgb[2]), u8::MAX]
}

/// Converts the first layer of `frame` to interleaved RGBA8, byte order
/// R, G, B, A with alpha fully opaque.
///
/// Every texel is independent, so large frames are split into contiguous
/// bands and converted on the rayon pool.
pub fn to_rgba8(frame: &HdrFrame) -> Vec<u8> {
    let packing = frame.packing();
    let stride = packing.bytes_per_texel();
    let texels = frame.size().pixel_count();
    let src = frame.image_data();

    let mut out = vec![0u8; texels * 4];
    let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(&mut out[..]);

    if texels < PARALLEL_THRESHOLD {
        convert_run(src, pixels, packing);
        return out;
    }

    let band = texels.div_ceil(rayon::current_num_threads()).max(1);
    pixels
        .par_chunks_mut(band)
        .zip(src.par_chunks(band * stride))
        .for_each(|(dst, src)| convert_run(src, dst, packing));
    out
}

fn convert_run(src: &[u8], dst: &mut [[u8; 4]], packing: PixelPacking) {
    for (texel, pixel) in src.chunks_exact(packing.bytes_per_texel()).zip(dst) {
        *pixel = rgba_texel(packing.unpack(texel));
    }
}

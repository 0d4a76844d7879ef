use crate::shared::frame_size::FrameSize;
use crate::shared::hdr_frame::HdrFrame;
use crate::shared::pixel_packing::PixelPacking;

/// Solid colour for frame `index` of `count`, sweeping from green to red.
pub fn ramp_color(index: usize, count: usize) -> [f32; 3] {
    let t = if count > 1 {
        index.min(count - 1) as f32 / (count - 1) as f32
    } else {
        0.0
    };
    [t, 1.0 - t, 0.5]
}

/// Frame `index` of a solid colour ramp.
pub fn ramp_frame(size: FrameSize, packing: PixelPacking, index: usize, count: usize) -> HdrFrame {
    HdrFrame::solid(size, packing, ramp_color(index, count))
}

/// Horizontal gradient from 0 to 1.5, so the right third overshoots the
/// displayable range. The gradient scrolls by `index` pixels per frame.
pub fn gradient_frame(size: FrameSize, packing: PixelPacking, index: usize) -> HdrFrame {
    let width = size.width.max(1) as f32;
    let shift = index as u32;
    HdrFrame::from_fn(size, packing, |x, y| {
        let t = ((x + shift) % size.width.max(1)) as f32 / width * 1.5;
        let v = y as f32 / size.height.max(1) as f32;
        [t, v, 1.5 - t]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_endpoints() {
        assert_eq!(ramp_color(0, 30), [0.0, 1.0, 0.5]);
        assert_eq!(ramp_color(29, 30), [1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_ramp_single_frame() {
        assert_eq!(ramp_color(0, 1), [0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_ramp_frame_is_solid() {
        let frame = ramp_frame(FrameSize::new(4, 2), PixelPacking::R32G32B32A32Float, 10, 21);
        let stride = PixelPacking::R32G32B32A32Float.bytes_per_texel();
        let first = &frame.data()[..stride];
        assert!(frame.data().chunks_exact(stride).all(|t| t == first));
    }

    #[test]
    fn test_gradient_overshoots() {
        let frame = gradient_frame(FrameSize::new(8, 2), PixelPacking::R32G32B32A32Float, 0);
        let stride = PixelPacking::R32G32B32A32Float.bytes_per_texel();
        let last = frame.packing().unpack(&frame.data()[7 * stride..8 * stride]);
        assert!(last[0] > 1.0);
    }
}

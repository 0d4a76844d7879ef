use std::borrow::Cow;

use crate::shared::error::CaptureError;
use crate::shared::frame_size::FrameSize;
use crate::shared::pixel_packing::PixelPacking;

/// A captured frame in host memory: packed floating-point colour, row-major.
///
/// `depth` is the number of stacked `width × height` layers in the buffer;
/// only the first layer is the captured image.
#[derive(Clone, Debug, PartialEq)]
pub struct HdrFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    depth: u32,
    packing: PixelPacking,
}

impl HdrFrame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        depth: u32,
        packing: PixelPacking,
    ) -> Result<Self, CaptureError> {
        let expected = width as usize
            * height as usize
            * depth.max(1) as usize
            * packing.bytes_per_texel();
        if data.len() != expected {
            return Err(CaptureError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            depth: depth.max(1),
            packing,
        })
    }

    /// Builds a single-layer frame by evaluating `texel(x, y)` for every pixel.
    pub fn from_fn(
        size: FrameSize,
        packing: PixelPacking,
        mut texel: impl FnMut(u32, u32) -> [f32; 3],
    ) -> Self {
        let stride = packing.bytes_per_texel();
        let mut data = vec![0u8; size.pixel_count() * stride];
        let mut chunks = data.chunks_exact_mut(stride);
        for y in 0..size.height {
            for x in 0..size.width {
                if let Some(out) = chunks.next() {
                    packing.pack_into(texel(x, y), out);
                }
            }
        }
        Self {
            data,
            width: size.width,
            height: size.height,
            depth: 1,
            packing,
        }
    }

    pub fn solid(size: FrameSize, packing: PixelPacking, rgb: [f32; 3]) -> Self {
        Self::from_fn(size, packing, |_, _| rgb)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Bytes of the first layer.
    pub fn image_data(&self) -> &[u8] {
        &self.data[..self.size().pixel_count() * self.packing.bytes_per_texel()]
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn packing(&self) -> PixelPacking {
        self.packing
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// Handle to a rendered frame that can be read back into host memory.
///
/// GPU-side implementations perform the texture readback here; the capture
/// pipeline only ever sees the resulting [`HdrFrame`].
pub trait RenderedFrame {
    fn readback(&self) -> Result<Cow<'_, HdrFrame>, CaptureError>;
}

impl RenderedFrame for HdrFrame {
    fn readback(&self) -> Result<Cow<'_, HdrFrame>, CaptureError> {
        Ok(Cow::Borrowed(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_buffer_length() {
        let result = HdrFrame::new(vec![0u8; 10], 2, 2, 1, PixelPacking::R11G11B10Float);
        assert!(matches!(
            result,
            Err(CaptureError::BufferSizeMismatch {
                expected: 16,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_new_accepts_layered_buffer() {
        let frame = HdrFrame::new(vec![0u8; 32], 2, 2, 2, PixelPacking::R11G11B10Float).unwrap();
        assert_eq!(frame.depth(), 2);
        assert_eq!(frame.data().len(), 32);
        assert_eq!(frame.image_data().len(), 16);
    }

    #[test]
    fn test_zero_depth_means_one_layer() {
        let frame = HdrFrame::new(vec![0u8; 16], 2, 2, 0, PixelPacking::R11G11B10Float).unwrap();
        assert_eq!(frame.depth(), 1);
    }

    #[test]
    fn test_from_fn_visits_pixels_row_major() {
        let size = FrameSize::new(3, 2);
        let frame = HdrFrame::from_fn(size, PixelPacking::R32G32B32A32Float, |x, y| {
            [x as f32, y as f32, 0.0]
        });
        let stride = PixelPacking::R32G32B32A32Float.bytes_per_texel();
        let texel = |i: usize| frame.packing().unpack(&frame.data()[i * stride..(i + 1) * stride]);
        assert_eq!(texel(0), [0.0, 0.0, 0.0]);
        assert_eq!(texel(2), [2.0, 0.0, 0.0]);
        assert_eq!(texel(4), [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_readback_borrows_host_frame() {
        let frame = HdrFrame::solid(FrameSize::new(2, 2), PixelPacking::R11G11B10Float, [1.0; 3]);
        let read = frame.readback().unwrap();
        assert!(matches!(read, Cow::Borrowed(_)));
        assert_eq!(read.size(), FrameSize::new(2, 2));
    }
}

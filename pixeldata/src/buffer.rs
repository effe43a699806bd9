//! Typed pixel buffers and the conversion of raw sample bytes into them.
use crate::attribute::PixelKind;
use crate::pool::BufferPool;
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use std::ops::Range;

/// The decoded samples of one frame.
///
/// 16-bit samples keep their stored bit pattern,
/// regardless of the pixel representation.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    /// one byte per pixel
    Gray8(Vec<u8>),
    /// one 16-bit word per pixel
    Gray16(Vec<u16>),
    /// three bytes per pixel, in `R G B` order
    Rgb24(Vec<u8>),
}

impl PixelBuffer {
    /// The layout of the buffer.
    pub fn kind(&self) -> PixelKind {
        match self {
            PixelBuffer::Gray8(_) => PixelKind::Gray8,
            PixelBuffer::Gray16(_) => PixelKind::Gray16,
            PixelBuffer::Rgb24(_) => PixelKind::Rgb24,
        }
    }

    /// The number of elements:
    /// one per pixel for grayscale buffers, three per pixel for RGB.
    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::Gray8(v) | PixelBuffer::Rgb24(v) => v.len(),
            PixelBuffer::Gray16(v) => v.len(),
        }
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of pixels.
    pub fn pixel_count(&self) -> usize {
        match self {
            PixelBuffer::Rgb24(v) => v.len() / 3,
            _ => self.len(),
        }
    }

    pub fn as_gray8(&self) -> Option<&[u8]> {
        match self {
            PixelBuffer::Gray8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_gray16(&self) -> Option<&[u16]> {
        match self {
            PixelBuffer::Gray16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_rgb24(&self) -> Option<&[u8]> {
        match self {
            PixelBuffer::Rgb24(v) => Some(v),
            _ => None,
        }
    }

    /// Take the samples of an 8-bit grayscale buffer.
    pub fn into_gray8(self) -> Option<Vec<u8>> {
        match self {
            PixelBuffer::Gray8(v) => Some(v),
            _ => None,
        }
    }

    /// Take the samples of a 16-bit grayscale buffer.
    pub fn into_gray16(self) -> Option<Vec<u16>> {
        match self {
            PixelBuffer::Gray16(v) => Some(v),
            _ => None,
        }
    }

    /// Take the samples of an RGB buffer.
    pub fn into_rgb24(self) -> Option<Vec<u8>> {
        match self {
            PixelBuffer::Rgb24(v) => Some(v),
            _ => None,
        }
    }

    /// Copy the pixels in the given range into a new buffer
    /// drawn from the pool.
    ///
    /// Returns `None` if the range is empty or out of bounds.
    pub fn slice(&self, range: Range<usize>, pool: &BufferPool) -> Option<PixelBuffer> {
        if range.is_empty() || range.end > self.pixel_count() {
            return None;
        }
        Some(match self {
            PixelBuffer::Gray8(v) => PixelBuffer::Gray8(copy_from(pool, &v[range])),
            PixelBuffer::Gray16(v) => PixelBuffer::Gray16(copy_from(pool, &v[range])),
            PixelBuffer::Rgb24(v) => {
                PixelBuffer::Rgb24(copy_from(pool, &v[range.start * 3..range.end * 3]))
            }
        })
    }

    /// Give the memory of this buffer back to the pool.
    pub fn recycle(self, pool: &BufferPool) {
        match self {
            PixelBuffer::Gray8(v) | PixelBuffer::Rgb24(v) => pool.release(v),
            PixelBuffer::Gray16(v) => pool.release(v),
        }
    }
}

fn copy_from<T: crate::pool::PoolElement>(pool: &BufferPool, values: &[T]) -> Vec<T> {
    let mut out = pool.acquire(values.len());
    out.extend_from_slice(values);
    out
}

/// Convert the raw bytes of one frame into a pixel buffer,
/// reading only the samples of the pixels in `range`.
///
/// `frame` must hold at least the samples of the whole frame
/// (`pixel_count` pixels).
/// Samples of 16 bits are read in the given byte order.
/// RGB samples stored in separate planes are interleaved.
///
/// Returns `None` if the range is empty,
/// out of bounds, or the frame is too short.
pub(crate) fn read_samples(
    frame: &[u8],
    kind: PixelKind,
    pixel_count: usize,
    endianness: Endianness,
    planar: bool,
    range: Range<usize>,
    pool: &BufferPool,
) -> Option<PixelBuffer> {
    if range.is_empty() || range.end > pixel_count {
        return None;
    }
    let n = range.len();

    match kind {
        PixelKind::Gray8 => {
            let bytes = frame.get(range)?;
            Some(PixelBuffer::Gray8(copy_from(pool, bytes)))
        }
        PixelKind::Gray16 => {
            let bytes = frame.get(range.start * 2..range.end * 2)?;
            let mut out: Vec<u16> = pool.acquire_zeroed(n);
            match endianness {
                Endianness::Little => LittleEndian::read_u16_into(bytes, &mut out),
                Endianness::Big => BigEndian::read_u16_into(bytes, &mut out),
            }
            Some(PixelBuffer::Gray16(out))
        }
        PixelKind::Rgb24 if !planar => {
            let bytes = frame.get(range.start * 3..range.end * 3)?;
            Some(PixelBuffer::Rgb24(copy_from(pool, bytes)))
        }
        PixelKind::Rgb24 => {
            let red = frame.get(range.clone())?;
            let green = frame.get(pixel_count + range.start..pixel_count + range.end)?;
            let blue = frame.get(2 * pixel_count + range.start..2 * pixel_count + range.end)?;
            let mut out: Vec<u8> = pool.acquire(n * 3);
            for ((&r, &g), &b) in red.iter().zip(green).zip(blue) {
                out.extend_from_slice(&[r, g, b]);
            }
            Some(PixelBuffer::Rgb24(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Endianness::Little, [0x0201, 0x0403])]
    #[case(Endianness::Big, [0x0102, 0x0304])]
    fn read_16_bit_samples(#[case] endianness: Endianness, #[case] expected: [u16; 2]) {
        let pool = BufferPool::new();
        let frame = [0x01, 0x02, 0x03, 0x04];
        let buffer =
            read_samples(&frame, PixelKind::Gray16, 2, endianness, false, 0..2, &pool).unwrap();
        assert_eq!(buffer.as_gray16(), Some(&expected[..]));
    }

    #[test]
    fn interleave_planes() {
        let pool = BufferPool::new();
        // 2 pixels: R plane, G plane, B plane
        let frame = [10, 11, 20, 21, 30, 31];
        let buffer =
            read_samples(&frame, PixelKind::Rgb24, 2, Endianness::Little, true, 0..2, &pool)
                .unwrap();
        assert_eq!(buffer.as_rgb24(), Some(&[10, 20, 30, 11, 21, 31][..]));

        let buffer =
            read_samples(&frame, PixelKind::Rgb24, 2, Endianness::Little, true, 1..2, &pool)
                .unwrap();
        assert_eq!(buffer.as_rgb24(), Some(&[11, 21, 31][..]));
        assert_eq!(buffer.pixel_count(), 1);
    }

    #[test]
    fn empty_or_outside_ranges() {
        let pool = BufferPool::new();
        let frame = [1, 2, 3, 4];
        let read = |range| {
            read_samples(&frame, PixelKind::Gray8, 4, Endianness::Little, false, range, &pool)
        };
        assert!(read(2..2).is_none());
        assert!(read(3..5).is_none());
        assert_eq!(read(1..3).unwrap().as_gray8(), Some(&[2, 3][..]));

        // frame shorter than announced
        assert!(
            read_samples(&frame, PixelKind::Gray16, 4, Endianness::Little, false, 0..4, &pool)
                .is_none()
        );
    }

    #[test]
    fn slices_concatenate_to_the_whole() {
        let pool = BufferPool::new();
        let buffer = PixelBuffer::Gray16((0..100).collect());
        let mut joined = Vec::new();
        for range in [0..13, 13..50, 50..99, 99..100] {
            let part = buffer.slice(range, &pool).unwrap();
            joined.extend_from_slice(part.as_gray16().unwrap());
        }
        assert_eq!(Some(&joined[..]), buffer.as_gray16());
        assert!(buffer.slice(7..7, &pool).is_none());
        assert!(buffer.slice(90..101, &pool).is_none());
    }
}

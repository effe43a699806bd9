//! Bounds checks applied before any buffer is sized or allocated.
//!
//! Every check is a pure function of the declared quantities,
//! so each one can be applied independently of the others.
//! All size arithmetic happens in `u64`,
//! which catches products that would wrap on 32-bit targets.

use snafu::{ensure, Backtrace, Snafu};

/// Maximum declared byte length of a single data element.
pub const MAX_ELEMENT_LENGTH: u64 = 1 << 30;

/// Maximum number of rows or columns of an image.
pub const MAX_IMAGE_DIMENSION: u32 = 32_768;

/// Maximum number of bytes of a decoded pixel buffer
/// (`rows * columns * samples per pixel * bytes per sample`).
pub const MAX_PIXEL_BUFFER_SIZE: u64 = 1 << 31;

/// Maximum nesting level of sequences.
///
/// A sequence at the root data set is at level 1,
/// a sequence inside one of its items is at level 2, and so on.
pub const MAX_SEQUENCE_DEPTH: u32 = 32;

/// A decoding limit was exceeded.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum BoundsError {
    /// element length {length} exceeds the limit of {limit} bytes
    ElementTooLong {
        length: u64,
        limit: u64,
        backtrace: Backtrace,
    },
    /// image dimensions {width}x{height} exceed the limit of {limit}
    DimensionTooLarge {
        width: u32,
        height: u32,
        limit: u32,
        backtrace: Backtrace,
    },
    /// pixel buffer of {size} bytes exceeds the limit of {limit} bytes
    PixelBufferTooLarge {
        size: u64,
        limit: u64,
        backtrace: Backtrace,
    },
    /// sequence nesting level {depth} exceeds the limit of {limit}
    SequenceTooDeep {
        depth: u32,
        limit: u32,
        backtrace: Backtrace,
    },
    /// value of {length} bytes at offset {offset} runs past the end of the {available} byte buffer
    OutOfBuffer {
        offset: u64,
        length: u64,
        available: u64,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = BoundsError> = std::result::Result<T, E>;

/// The set of limits enforced while decoding.
///
/// The default value holds the crate-level constants.
///
/// # Example
///
/// ```
/// # use dcmstack_core::limits::DecodeLimits;
/// let limits = DecodeLimits::default()
///     .with_max_image_dimension(4096)
///     .with_max_sequence_depth(8);
/// assert!(limits.check_dimensions(512, 512).is_ok());
/// assert!(limits.check_dimensions(8192, 512).is_err());
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DecodeLimits {
    /// maximum element length in bytes
    pub max_element_length: u64,
    /// maximum number of rows or columns
    pub max_image_dimension: u32,
    /// maximum decoded pixel buffer size in bytes
    pub max_pixel_buffer_size: u64,
    /// maximum sequence nesting level
    pub max_sequence_depth: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        DecodeLimits {
            max_element_length: MAX_ELEMENT_LENGTH,
            max_image_dimension: MAX_IMAGE_DIMENSION,
            max_pixel_buffer_size: MAX_PIXEL_BUFFER_SIZE,
            max_sequence_depth: MAX_SEQUENCE_DEPTH,
        }
    }
}

impl DecodeLimits {
    /// Override the maximum element length.
    pub fn with_max_element_length(mut self, max: u64) -> Self {
        self.max_element_length = max;
        self
    }

    /// Override the maximum number of rows or columns.
    pub fn with_max_image_dimension(mut self, max: u32) -> Self {
        self.max_image_dimension = max;
        self
    }

    /// Override the maximum decoded pixel buffer size.
    pub fn with_max_pixel_buffer_size(mut self, max: u64) -> Self {
        self.max_pixel_buffer_size = max;
        self
    }

    /// Override the maximum sequence nesting level.
    pub fn with_max_sequence_depth(mut self, max: u32) -> Self {
        self.max_sequence_depth = max;
        self
    }

    /// Check the declared length of a single element.
    pub fn check_element_length(&self, length: u64) -> Result<()> {
        ensure!(
            length <= self.max_element_length,
            ElementTooLongSnafu {
                length,
                limit: self.max_element_length,
            }
        );
        Ok(())
    }

    /// Check the width and height of an image, individually.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<()> {
        ensure!(
            width <= self.max_image_dimension && height <= self.max_image_dimension,
            DimensionTooLargeSnafu {
                width,
                height,
                limit: self.max_image_dimension,
            }
        );
        Ok(())
    }

    /// Compute and check the size of a pixel buffer in bytes.
    ///
    /// Returns the size on success.
    pub fn check_pixel_buffer(
        &self,
        width: u32,
        height: u32,
        samples_per_pixel: u16,
        bytes_per_sample: u16,
    ) -> Result<u64> {
        let size = pixel_buffer_size(width, height, samples_per_pixel, bytes_per_sample);
        ensure!(
            size <= self.max_pixel_buffer_size,
            PixelBufferTooLargeSnafu {
                size,
                limit: self.max_pixel_buffer_size,
            }
        );
        Ok(size)
    }

    /// Check a sequence nesting level.
    pub fn check_sequence_depth(&self, depth: u32) -> Result<()> {
        ensure!(
            depth <= self.max_sequence_depth,
            SequenceTooDeepSnafu {
                depth,
                limit: self.max_sequence_depth,
            }
        );
        Ok(())
    }
}

/// The number of bytes of a pixel buffer,
/// computed in 64-bit arithmetic.
///
/// The product of four values of at most 32 bits, 32 bits, 16 bits and 16 bits
/// would overflow `u64` only beyond 2^96, which saturates here.
pub fn pixel_buffer_size(
    width: u32,
    height: u32,
    samples_per_pixel: u16,
    bytes_per_sample: u16,
) -> u64 {
    u64::from(width)
        .saturating_mul(u64::from(height))
        .saturating_mul(u64::from(samples_per_pixel))
        .saturating_mul(u64::from(bytes_per_sample))
}

/// Check that `length` bytes starting at `offset`
/// lie within a buffer of `available` bytes.
///
/// Returns the exclusive end offset on success.
pub fn check_range(offset: u64, length: u64, available: u64) -> Result<u64> {
    match offset.checked_add(length) {
        Some(end) if end <= available => Ok(end),
        _ => OutOfBufferSnafu {
            offset,
            length,
            available,
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(512, 512, 1, 2, true)]
    #[case(32_768, 32_768, 1, 1, true)]
    #[case(32_768, 32_768, 1, 2, true)]
    #[case(32_768, 32_768, 3, 1, false)]
    #[case(30_000, 30_000, 3, 2, false)]
    #[case(65_535, 65_535, 1, 2, false)]
    fn pixel_buffer_limit(
        #[case] width: u32,
        #[case] height: u32,
        #[case] spp: u16,
        #[case] bps: u16,
        #[case] ok: bool,
    ) {
        let limits = DecodeLimits::default();
        assert_eq!(limits.check_pixel_buffer(width, height, spp, bps).is_ok(), ok);
    }

    #[test]
    fn pixel_buffer_size_does_not_wrap() {
        // would wrap to a small number in 32-bit arithmetic
        let size = pixel_buffer_size(65_535, 65_535, 1, 2);
        assert_eq!(size, 8_589_672_450);
        assert!(size > u64::from(u32::MAX));
        assert_eq!(pixel_buffer_size(u32::MAX, u32::MAX, u16::MAX, u16::MAX), u64::MAX);
    }

    #[test]
    fn dimensions_checked_individually() {
        let limits = DecodeLimits::default();
        assert!(limits.check_dimensions(32_768, 1).is_ok());
        assert!(limits.check_dimensions(32_769, 1).is_err());
        assert!(limits.check_dimensions(1, 40_000).is_err());
    }

    #[test]
    fn element_length_limit() {
        let limits = DecodeLimits::default().with_max_element_length(1024);
        assert!(limits.check_element_length(1024).is_ok());
        assert!(matches!(
            limits.check_element_length(1025),
            Err(BoundsError::ElementTooLong { length: 1025, .. })
        ));
    }

    #[test]
    fn sequence_depth_limit() {
        let limits = DecodeLimits::default();
        assert!(limits.check_sequence_depth(MAX_SEQUENCE_DEPTH).is_ok());
        assert!(limits.check_sequence_depth(MAX_SEQUENCE_DEPTH + 1).is_err());
    }

    #[test]
    fn range_within_buffer() {
        assert_eq!(check_range(4, 8, 12).unwrap(), 12);
        assert!(check_range(4, 9, 12).is_err());
        assert!(check_range(u64::MAX, 2, 12).is_err());
    }
}

//! Support for JPEG 2000 image decoding.

use super::{decode_error, DecodeResult, PixelDataReader};
use crate::attribute::ImageInfo;
use jpeg2k::Image;
use snafu::{ensure, ResultExt};
use tracing::warn;

// Check jpeg2k backend conflicts
#[cfg(all(feature = "openjp2", feature = "openjpeg-sys"))]
compile_error!(
    "feature \"openjp2\" and feature \"openjpeg-sys\" cannot be enabled at the same time"
);

/// Pixel data adapter for transfer syntaxes based on JPEG 2000.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jpeg2000Adapter;

impl PixelDataReader for Jpeg2000Adapter {
    fn decode_frame(&self, info: &ImageInfo, src: &[u8], dst: &mut Vec<u8>) -> DecodeResult<()> {
        let bits_allocated = info.bits_allocated;
        ensure!(
            bits_allocated == 8 || bits_allocated == 16,
            decode_error::UnsupportedBitsAllocatedSnafu { bits_allocated }
        );

        let samples_per_pixel = usize::from(info.samples_per_pixel);
        let bytes_per_sample = usize::from(bits_allocated / 8);
        let frame_size = info.pixel_count() * samples_per_pixel * bytes_per_sample;

        let image = Image::from_bytes(src)
            .map_err(|e| Box::new(e) as Box<_>)
            .whatever_context("jpeg2k decoder failure")?;

        ensure!(
            image.width() == u32::from(info.cols) && image.height() == u32::from(info.rows),
            decode_error::DimensionMismatchSnafu {
                width: image.width(),
                height: image.height(),
                expected_width: u32::from(info.cols),
                expected_height: u32::from(info.rows),
            }
        );

        let base_offset = dst.len();
        dst.resize(base_offset + frame_size, 0);

        // Note: `get_pixels` is not used
        // because it narrows the data down to 8 bits per sample
        for (component_i, component) in image.components().iter().enumerate() {
            if component_i >= samples_per_pixel {
                warn!(
                    "JPEG 2000 image has more components than expected ({} > {})",
                    component_i + 1,
                    samples_per_pixel
                );
                break;
            }

            // write in standard layout, keeping the low bytes of each sample
            for (i, sample) in component.data().iter().enumerate().take(info.pixel_count()) {
                let offset = base_offset
                    + i * samples_per_pixel * bytes_per_sample
                    + component_i * bytes_per_sample;
                dst[offset..offset + bytes_per_sample]
                    .copy_from_slice(&sample.to_le_bytes()[..bytes_per_sample]);
            }
        }

        Ok(())
    }
}

//! Support for JPEG image decoding.

use super::{decode_error, DecodeResult, PixelDataReader};
use crate::attribute::ImageInfo;
use jpeg_decoder::{Decoder, PixelFormat};
use snafu::{ensure, OptionExt, ResultExt};

/// Pixel data adapter for JPEG-based transfer syntaxes
/// (baseline, extended and lossless processes).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JpegAdapter;

impl PixelDataReader for JpegAdapter {
    fn decode_frame(&self, info: &ImageInfo, src: &[u8], dst: &mut Vec<u8>) -> DecodeResult<()> {
        let bits_allocated = info.bits_allocated;
        ensure!(
            bits_allocated == 8 || bits_allocated == 16,
            decode_error::UnsupportedBitsAllocatedSnafu { bits_allocated }
        );

        let mut decoder = Decoder::new(src);
        let decoded = decoder
            .decode()
            .map_err(|e| Box::new(e) as Box<_>)
            .whatever_context("JPEG decoding failure")?;
        let image_info = decoder
            .info()
            .whatever_context("JPEG decoder did not report image info")?;

        ensure!(
            image_info.width == info.cols && image_info.height == info.rows,
            decode_error::DimensionMismatchSnafu {
                width: u32::from(image_info.width),
                height: u32::from(image_info.height),
                expected_width: u32::from(info.cols),
                expected_height: u32::from(info.rows),
            }
        );

        match image_info.pixel_format {
            PixelFormat::L8 | PixelFormat::RGB24 => dst.extend_from_slice(&decoded),
            PixelFormat::L16 => {
                // the decoder yields big endian samples
                dst.reserve(decoded.len());
                for pair in decoded.chunks_exact(2) {
                    dst.extend_from_slice(&[pair[1], pair[0]]);
                }
            }
            PixelFormat::CMYK32 => {
                snafu::whatever!("CMYK JPEG images are not supported");
            }
        }
        Ok(())
    }
}

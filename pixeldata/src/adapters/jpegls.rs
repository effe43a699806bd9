//! Support for JPEG-LS image decoding.

use super::{decode_error, DecodeResult, PixelDataReader};
use crate::attribute::ImageInfo;
use charls::CharLS;
use snafu::{ensure, ResultExt};

/// Pixel data reader for JPEG-LS transfer syntaxes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JpegLsAdapter;

impl PixelDataReader for JpegLsAdapter {
    fn decode_frame(&self, info: &ImageInfo, src: &[u8], dst: &mut Vec<u8>) -> DecodeResult<()> {
        let bits_allocated = info.bits_allocated;
        ensure!(
            bits_allocated == 8 || bits_allocated == 16,
            decode_error::UnsupportedBitsAllocatedSnafu { bits_allocated }
        );

        let mut decoded = CharLS::default()
            .decode(src)
            .map_err(|error| error.to_string())
            .with_whatever_context(|error| error.to_string())?;

        dst.append(&mut decoded);

        Ok(())
    }
}

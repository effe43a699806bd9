//! Decoders of encapsulated pixel data.
//!
//! Each supported compression has an adapter
//! implementing [`PixelDataReader`].
//! Adapters decode one frame into little endian samples
//! in standard (interleaved) layout.
//! Adapters backed by external codecs are only available
//! when the matching Cargo feature is enabled.

use crate::attribute::ImageInfo;
use dcmstack_core::Compression;
use snafu::Snafu;

#[cfg(feature = "jpeg")]
pub mod jpeg;
#[cfg(any(feature = "openjp2", feature = "openjpeg-sys"))]
pub mod jpeg2k;
#[cfg(feature = "charls")]
pub mod jpegls;
#[cfg(feature = "rle")]
pub mod rle_lossless;

/// The possible error conditions when decoding compressed pixel data.
///
/// Users of this type are free to handle errors based on their variant,
/// but should not make decisions based on the display message.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub), module)]
pub enum DecodeError {
    /// A custom error occurred when decoding,
    /// reported as a dynamic error value with a message.
    #[snafu(whatever, display("{}", message))]
    Custom {
        /// The error message.
        message: String,
        /// The underlying error cause, if any.
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync + 'static>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// The sample size is not supported by the codec.
    #[snafu(display("BitsAllocated {} is not supported", bits_allocated))]
    UnsupportedBitsAllocated { bits_allocated: u16 },

    /// The decoded image does not have the declared dimensions.
    #[snafu(display(
        "Decoded image is {}x{}, expected {}x{}",
        width,
        height,
        expected_width,
        expected_height
    ))]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    /// The compressed data is truncated or malformed.
    #[snafu(display("Invalid compressed data: {}", reason))]
    InvalidData { reason: &'static str },
}

pub type DecodeResult<T, E = DecodeError> = std::result::Result<T, E>;

/// Trait object responsible for decoding
/// pixel data of one kind of compression.
pub trait PixelDataReader: Send + Sync {
    /// Decode one frame of compressed data,
    /// appending its samples to `dst`.
    ///
    /// 16-bit samples are written in little endian.
    /// Samples of multi-component images are interleaved.
    fn decode_frame(&self, info: &ImageInfo, src: &[u8], dst: &mut Vec<u8>) -> DecodeResult<()>;
}

/// Obtain the adapter for the given compression,
/// if one is available in this build.
pub fn reader_for(compression: Compression) -> Option<&'static dyn PixelDataReader> {
    match compression {
        #[cfg(feature = "jpeg")]
        Compression::JpegBaseline
        | Compression::JpegExtended
        | Compression::JpegLossless
        | Compression::JpegLosslessFirstOrder => Some(&jpeg::JpegAdapter),
        #[cfg(feature = "charls")]
        Compression::JpegLsLossless | Compression::JpegLsNearLossless => {
            Some(&jpegls::JpegLsAdapter)
        }
        #[cfg(any(feature = "openjp2", feature = "openjpeg-sys"))]
        Compression::Jpeg2000Lossless | Compression::Jpeg2000 => Some(&jpeg2k::Jpeg2000Adapter),
        #[cfg(feature = "rle")]
        Compression::Rle => Some(&rle_lossless::RleLosslessAdapter),
        _ => None,
    }
}

#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications)]

//! This crate contains the pixel data extraction layer of dcmstack.
//!
//! Pixel data is located by the parser
//! and extracted here into a typed [`PixelBuffer`],
//! either as a whole or for a range of pixels.
//! Native pixel data is converted straight from the file buffer;
//! encapsulated pixel data is handed to the [adapter](adapters)
//! of its compression.
//! Every extraction checks the image dimensions against the
//! [decoding limits](DecodeLimits) before allocating,
//! and the expected length against the bytes actually present.
//!
//! Buffers are drawn from a [`BufferPool`],
//! to which they can be given back once consumed.
//!
//! # Example
//!
//! ```no_run
//! # use dcmstack_pixeldata::{BufferPool, ImageInfo, PixelSource};
//! # use dcmstack_parser::{read_file, FileReadOptions};
//! # use dcmstack_core::DecodeLimits;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("ct.dcm")?;
//! let file = read_file(&data, &FileReadOptions::default())?;
//! let info = ImageInfo::from_dataset(&file.dataset, &data)?;
//! let location = file.dataset.pixel_data().ok_or("no pixel data")?;
//! let source = PixelSource {
//!     data: &data,
//!     location,
//!     info: &info,
//!     transfer_syntax: file.transfer_syntax,
//!     limits: DecodeLimits::default(),
//! };
//! let pixels = source.decode(BufferPool::global())?;
//! println!("{} pixels", pixels.pixel_count());
//! # Ok(())
//! # }
//! ```

use dcmstack_core::limits::{BoundsError, DecodeLimits};
use dcmstack_core::transfer_syntax::TransferSyntax;
use dcmstack_core::Compression;
use dcmstack_parser::PixelDataLocation;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::ops::Range;
use tracing::debug;

pub mod adapters;
pub mod attribute;
mod buffer;
pub mod encapsulation;
pub mod pool;
mod transform;

pub use attribute::{GetAttributeError, ImageInfo, PixelKind, PixelRepresentation};
pub use buffer::PixelBuffer;
pub use pool::{BufferPool, PoolStats};
pub use transform::{Rescale, WindowLevel};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read image attributes"))]
    GetAttribute {
        #[snafu(backtrace)]
        source: GetAttributeError,
    },

    #[snafu(display("Image exceeds the decoding limits"))]
    ImageTooLarge {
        #[snafu(backtrace)]
        source: BoundsError,
    },

    #[snafu(display(
        "Unsupported layout: {} samples per pixel, {} bits allocated",
        samples_per_pixel,
        bits_allocated
    ))]
    UnsupportedLayout {
        samples_per_pixel: u16,
        bits_allocated: u16,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Pixel data length mismatch: expected {} bytes, found {}",
        expected,
        found
    ))]
    LengthMismatch {
        expected: u64,
        found: u64,
        backtrace: Backtrace,
    },

    #[snafu(display("Native pixel data in encapsulated transfer syntax {}", ts))]
    NotEncapsulated {
        ts: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Encapsulated pixel data in native transfer syntax {}", ts))]
    UnexpectedEncapsulation {
        ts: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Unsupported compression {:?}", compression))]
    UnsupportedCompression {
        compression: Compression,
        backtrace: Backtrace,
    },

    #[snafu(display("Image has no pixels"))]
    EmptyImage { backtrace: Backtrace },

    #[snafu(display("Could not locate the first frame in the pixel data fragments"))]
    MissingFragments { backtrace: Backtrace },

    #[snafu(display("Could not decode compressed pixel data"))]
    DecodePixelData {
        source: adapters::DecodeError,
        backtrace: Backtrace,
    },

    #[snafu(display("Decoded frame has {} bytes, expected {}", found, expected))]
    DecodedSizeMismatch {
        expected: u64,
        found: u64,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything needed to extract the pixel data of a data set.
#[derive(Debug, Copy, Clone)]
pub struct PixelSource<'a> {
    /// the buffer the data set was read from
    pub data: &'a [u8],
    /// where the pixel data is in the buffer
    pub location: &'a PixelDataLocation,
    /// the image pixel attributes
    pub info: &'a ImageInfo,
    /// the transfer syntax of the data set
    pub transfer_syntax: &'static TransferSyntax,
    /// the limits to check the image against
    pub limits: DecodeLimits,
}

impl PixelSource<'_> {
    /// Check the image layout and dimensions,
    /// returning the layout and the size of one frame in bytes.
    fn validate(&self) -> Result<(PixelKind, u64)> {
        let info = self.info;
        let kind = info.kind().context(UnsupportedLayoutSnafu {
            samples_per_pixel: info.samples_per_pixel,
            bits_allocated: info.bits_allocated,
        })?;
        let frame_size = info
            .check_frame_size(&self.limits)
            .context(ImageTooLargeSnafu)?;
        Ok((kind, frame_size))
    }

    /// Obtain the bytes of the first frame of native pixel data,
    /// after checking the declared and available lengths.
    fn native_frame(&self, frame_size: u64) -> Result<&[u8]> {
        let ts = self.transfer_syntax;
        let PixelDataLocation::Native {
            offset,
            declared_len,
            available_len,
            ..
        } = *self.location
        else {
            return UnexpectedEncapsulationSnafu { ts: ts.uid() }.fail();
        };
        ensure!(
            !ts.compression().is_encapsulated(),
            NotEncapsulatedSnafu { ts: ts.uid() }
        );

        let expected = frame_size.saturating_mul(u64::from(self.info.number_of_frames));
        let found = u64::from(declared_len.min(available_len));
        ensure!(found >= expected, LengthMismatchSnafu { expected, found });
        if u64::from(declared_len) > expected + 1 {
            debug!(
                "Pixel data holds {} bytes, {} more than needed",
                declared_len,
                u64::from(declared_len) - expected
            );
        }

        // both bounds were checked against the buffer by the parser
        let start = offset as usize;
        self.data
            .get(start..start + frame_size as usize)
            .context(LengthMismatchSnafu {
                expected,
                found: self.data.len().saturating_sub(start) as u64,
            })
    }

    /// Decode the first frame of encapsulated pixel data
    /// into a byte buffer drawn from the pool.
    fn decode_encapsulated(&self, frame_size: u64, pool: &BufferPool) -> Result<Vec<u8>> {
        let ts = self.transfer_syntax;
        let PixelDataLocation::Encapsulated {
            offset_table,
            fragments,
        } = self.location
        else {
            return NotEncapsulatedSnafu { ts: ts.uid() }.fail();
        };
        let compression = ts.compression();
        ensure!(
            compression.is_encapsulated(),
            UnexpectedEncapsulationSnafu { ts: ts.uid() }
        );
        let reader =
            adapters::reader_for(compression).context(UnsupportedCompressionSnafu { compression })?;

        let frame = encapsulation::frame_data(
            self.data,
            offset_table,
            fragments,
            self.info.number_of_frames,
            0,
        )
        .context(MissingFragmentsSnafu)?;

        let mut decoded: Vec<u8> = pool.acquire(frame_size as usize);
        if let Err(e) = reader.decode_frame(self.info, &frame, &mut decoded) {
            pool.release(decoded);
            return Err(e).context(DecodePixelDataSnafu);
        }

        if decoded.len() as u64 != frame_size {
            let found = decoded.len() as u64;
            pool.release(decoded);
            return DecodedSizeMismatchSnafu {
                expected: frame_size,
                found,
            }
            .fail();
        }
        Ok(decoded)
    }

    /// Decode the first frame in full.
    pub fn decode(&self, pool: &BufferPool) -> Result<PixelBuffer> {
        let pixel_count = self.info.pixel_count();
        self.decode_range(0..pixel_count, pool)?
            .context(EmptyImageSnafu)
    }

    /// Decode the pixels of the first frame in the given range of pixel indices.
    ///
    /// Returns `Ok(None)` if the range is empty or out of bounds.
    /// Native pixel data is read for the requested pixels only;
    /// compressed pixel data is decoded in full
    /// and the requested pixels copied out of it.
    pub fn decode_range(
        &self,
        range: Range<usize>,
        pool: &BufferPool,
    ) -> Result<Option<PixelBuffer>> {
        let (kind, frame_size) = self.validate()?;
        let pixel_count = self.info.pixel_count();
        if range.is_empty() || range.end > pixel_count {
            return Ok(None);
        }

        if self.info.number_of_frames > 1 {
            debug!(
                "Decoding the first of {} frames",
                self.info.number_of_frames
            );
        }

        match self.location {
            PixelDataLocation::Native { .. } => {
                let frame = self.native_frame(frame_size)?;
                Ok(buffer::read_samples(
                    frame,
                    kind,
                    pixel_count,
                    self.transfer_syntax.endianness(),
                    kind == PixelKind::Rgb24 && self.info.planar_configuration == 1,
                    range,
                    pool,
                ))
            }
            PixelDataLocation::Encapsulated { .. } => {
                // codecs always yield interleaved samples
                let decoded = self.decode_encapsulated(frame_size, pool)?;
                let out = buffer::read_samples(
                    &decoded,
                    kind,
                    pixel_count,
                    byteordered::Endianness::Little,
                    false,
                    range,
                    pool,
                );
                pool.release(decoded);
                Ok(out)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use dcmstack_core::tags;
    use dcmstack_core::transfer_syntax::{
        self, EXPLICIT_VR_BIG_ENDIAN, EXPLICIT_VR_LITTLE_ENDIAN,
    };
    use dcmstack_core::Tag;
    use dcmstack_parser::{DataSet, ReadOptions};
    use rstest::rstest;

    fn element(tag: Tag, vr: &[u8; 2], value: &[u8], big_endian: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let u16_bytes = |v: u16| {
            if big_endian {
                v.to_be_bytes()
            } else {
                v.to_le_bytes()
            }
        };
        out.extend_from_slice(&u16_bytes(tag.group()));
        out.extend_from_slice(&u16_bytes(tag.element()));
        out.extend_from_slice(vr);
        if vr == b"OB" || vr == b"OW" {
            out.extend_from_slice(&[0, 0]);
            let len = value.len() as u32;
            out.extend_from_slice(&if big_endian {
                len.to_be_bytes()
            } else {
                len.to_le_bytes()
            });
        } else {
            out.extend_from_slice(&u16_bytes(value.len() as u16));
        }
        out.extend_from_slice(value);
        out
    }

    fn us(v: u16, big_endian: bool) -> [u8; 2] {
        if big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    /// Encode an image header followed by native pixel data.
    fn image(
        rows: u16,
        cols: u16,
        samples_per_pixel: u16,
        bits_allocated: u16,
        planar: u16,
        pixels: &[u8],
        big_endian: bool,
    ) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend(element(tags::SAMPLES_PER_PIXEL, b"US", &us(samples_per_pixel, big_endian), big_endian));
        data.extend(element(tags::PLANAR_CONFIGURATION, b"US", &us(planar, big_endian), big_endian));
        data.extend(element(tags::ROWS, b"US", &us(rows, big_endian), big_endian));
        data.extend(element(tags::COLUMNS, b"US", &us(cols, big_endian), big_endian));
        data.extend(element(tags::BITS_ALLOCATED, b"US", &us(bits_allocated, big_endian), big_endian));
        let vr = if bits_allocated == 16 { b"OW" } else { b"OB" };
        data.extend(element(tags::PIXEL_DATA, vr, pixels, big_endian));
        data
    }

    struct Decoded {
        data: Vec<u8>,
        dataset: DataSet,
        info: ImageInfo,
        ts: &'static TransferSyntax,
    }

    impl Decoded {
        fn new(data: Vec<u8>, ts: &'static TransferSyntax) -> Self {
            let dataset = DataSet::read(&data, 0, ts, ReadOptions::default()).unwrap();
            let info = ImageInfo::from_dataset(&dataset, &data).unwrap();
            Decoded {
                data,
                dataset,
                info,
                ts,
            }
        }

        fn source(&self) -> PixelSource<'_> {
            PixelSource {
                data: &self.data,
                location: self.dataset.pixel_data().unwrap(),
                info: &self.info,
                transfer_syntax: self.ts,
                limits: DecodeLimits::default(),
            }
        }
    }

    fn gray16_pixels(n: u16) -> Vec<u8> {
        (0..n).flat_map(|v| (v * 3).to_le_bytes()).collect()
    }

    #[test]
    fn decode_native_16_bit() {
        let pool = BufferPool::new();
        let image = Decoded::new(
            image(4, 4, 1, 16, 0, &gray16_pixels(16), false),
            &EXPLICIT_VR_LITTLE_ENDIAN,
        );
        let pixels = image.source().decode(&pool).unwrap();
        let expected: Vec<u16> = (0..16).map(|v| v * 3).collect();
        assert_eq!(pixels.as_gray16(), Some(&expected[..]));
        assert_eq!(pixels.len(), 16);
    }

    #[test]
    fn native_ranges_reconstruct_the_frame() {
        let pool = BufferPool::new();
        let image = Decoded::new(
            image(4, 4, 1, 16, 0, &gray16_pixels(16), false),
            &EXPLICIT_VR_LITTLE_ENDIAN,
        );
        let source = image.source();
        let full = source.decode(&pool).unwrap();

        let mut joined = Vec::new();
        for range in [0..1, 1..7, 7..8, 8..16] {
            let len = range.len();
            let part = source.decode_range(range, &pool).unwrap().unwrap();
            assert_eq!(part.len(), len);
            joined.extend_from_slice(part.as_gray16().unwrap());
        }
        assert_eq!(Some(&joined[..]), full.as_gray16());

        assert!(source.decode_range(5..5, &pool).unwrap().is_none());
        assert!(source.decode_range(10..17, &pool).unwrap().is_none());
    }

    #[test]
    fn big_endian_samples_are_swapped() {
        let pool = BufferPool::new();
        let pixels: Vec<u8> = [0x0102_u16, 0x0304].iter().flat_map(|v| v.to_be_bytes()).collect();
        let image = Decoded::new(image(1, 2, 1, 16, 0, &pixels, true), &EXPLICIT_VR_BIG_ENDIAN);
        let decoded = image.source().decode(&pool).unwrap();
        assert_eq!(decoded.as_gray16(), Some(&[0x0102, 0x0304][..]));
    }

    #[test]
    fn planar_rgb_is_interleaved() {
        let pool = BufferPool::new();
        let image = Decoded::new(
            image(1, 2, 3, 8, 1, &[1, 2, 3, 4, 5, 6], false),
            &EXPLICIT_VR_LITTLE_ENDIAN,
        );
        let decoded = image.source().decode(&pool).unwrap();
        assert_eq!(decoded.as_rgb24(), Some(&[1, 3, 5, 2, 4, 6][..]));
        let part = image.source().decode_range(1..2, &pool).unwrap().unwrap();
        assert_eq!(part.as_rgb24(), Some(&[2, 4, 6][..]));
    }

    #[test]
    fn length_mismatch_is_no_data() {
        let pool = BufferPool::new();
        // 4x4 16-bit needs 32 bytes
        let image = Decoded::new(
            image(4, 4, 1, 16, 0, &gray16_pixels(15), false),
            &EXPLICIT_VR_LITTLE_ENDIAN,
        );
        assert!(matches!(
            image.source().decode(&pool),
            Err(Error::LengthMismatch {
                expected: 32,
                found: 30,
                ..
            })
        ));
    }

    #[test]
    fn truncated_file_is_no_data() {
        let pool = BufferPool::new();
        let mut data = image(4, 4, 1, 16, 0, &gray16_pixels(16), false);
        data.truncate(data.len() - 5);
        let image = Decoded::new(data, &EXPLICIT_VR_LITTLE_ENDIAN);
        assert!(matches!(
            image.source().decode(&pool),
            Err(Error::LengthMismatch { found: 27, .. })
        ));
    }

    #[rstest]
    #[case(0xFFFF, 0xFFFF, 16)]
    #[case(40000, 2, 8)]
    fn oversized_images_are_rejected(#[case] rows: u16, #[case] cols: u16, #[case] bits: u16) {
        let pool = BufferPool::new();
        let image = Decoded::new(image(rows, cols, 1, bits, 0, &[0; 4], false), &EXPLICIT_VR_LITTLE_ENDIAN);
        assert!(matches!(
            image.source().decode(&pool),
            Err(Error::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn tighter_buffer_limit() {
        let pool = BufferPool::new();
        let image = Decoded::new(
            image(4, 4, 1, 16, 0, &gray16_pixels(16), false),
            &EXPLICIT_VR_LITTLE_ENDIAN,
        );
        let mut source = image.source();
        source.limits = DecodeLimits::default().with_max_pixel_buffer_size(31);
        assert!(matches!(
            source.decode(&pool),
            Err(Error::ImageTooLarge { .. })
        ));
        source.limits = DecodeLimits::default().with_max_pixel_buffer_size(32);
        assert!(source.decode(&pool).is_ok());
    }

    #[test]
    fn unsupported_layout() {
        let pool = BufferPool::new();
        let image = Decoded::new(image(1, 1, 1, 32, 0, &[0; 4], false), &EXPLICIT_VR_LITTLE_ENDIAN);
        assert!(matches!(
            image.source().decode(&pool),
            Err(Error::UnsupportedLayout {
                bits_allocated: 32,
                ..
            })
        ));
    }

    /// Encode an image header followed by encapsulated pixel data
    /// with an empty offset table and the given fragments.
    fn encapsulated(rows: u16, cols: u16, bits_allocated: u16, fragments: &[&[u8]]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend(element(tags::ROWS, b"US", &us(rows, false), false));
        data.extend(element(tags::COLUMNS, b"US", &us(cols, false), false));
        data.extend(element(tags::BITS_ALLOCATED, b"US", &us(bits_allocated, false), false));
        data.extend_from_slice(&[0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
        data.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0, 0, 0, 0]);
        for fragment in fragments {
            data.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0]);
            data.extend_from_slice(&(fragment.len() as u32).to_le_bytes());
            data.extend_from_slice(fragment);
        }
        data.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0, 0, 0, 0]);
        data
    }

    #[cfg(feature = "rle")]
    #[test]
    fn decode_rle_lossless() {
        let pool = BufferPool::new();
        // 2x2 16-bit: MSB segment, then LSB segment, both literal runs
        let mut fragment = vec![0; 64];
        fragment[0] = 2;
        fragment[4] = 64;
        fragment[8] = 69;
        fragment.extend_from_slice(&[0x03, 0x01, 0x03, 0x05, 0x07]);
        fragment.extend_from_slice(&[0x03, 0x02, 0x04, 0x06, 0x08]);
        let image = Decoded::new(
            encapsulated(2, 2, 16, &[&fragment]),
            &transfer_syntax::RLE_LOSSLESS,
        );
        let decoded = image.source().decode(&pool).unwrap();
        assert_eq!(
            decoded.as_gray16(),
            Some(&[0x0102, 0x0304, 0x0506, 0x0708][..])
        );
        let part = image.source().decode_range(2..4, &pool).unwrap().unwrap();
        assert_eq!(part.as_gray16(), Some(&[0x0506, 0x0708][..]));
    }

    #[cfg(not(feature = "charls"))]
    #[test]
    fn missing_codec_is_unsupported() {
        let pool = BufferPool::new();
        let image = Decoded::new(
            encapsulated(2, 2, 8, &[&[0xFF, 0xD8]]),
            &transfer_syntax::JPEG_LS_LOSSLESS,
        );
        assert!(matches!(
            image.source().decode(&pool),
            Err(Error::UnsupportedCompression {
                compression: Compression::JpegLsLossless,
                ..
            })
        ));
    }

    #[test]
    fn encapsulation_must_match_the_transfer_syntax() {
        let pool = BufferPool::new();
        let image = Decoded::new(
            encapsulated(2, 2, 8, &[&[0, 1, 2, 3]]),
            &EXPLICIT_VR_LITTLE_ENDIAN,
        );
        assert!(matches!(
            image.source().decode(&pool),
            Err(Error::UnexpectedEncapsulation { .. })
        ));
    }
}

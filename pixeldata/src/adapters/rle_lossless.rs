//! Support for RLE Lossless image decoding.
//!
//! See <https://dicom.nema.org/medical/dicom/current/output/chtml/part05/chapter_G.html>
use super::{decode_error, DecodeResult, PixelDataReader};
use crate::attribute::ImageInfo;
use byteordered::byteorder::{ByteOrder, LittleEndian};
use snafu::ensure;

/// The length of the RLE header: a segment count and 15 segment offsets.
const RLE_HEADER_LEN: usize = 64;

/// Pixel data adapter for the RLE Lossless transfer syntax.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RleLosslessAdapter;

impl PixelDataReader for RleLosslessAdapter {
    fn decode_frame(&self, info: &ImageInfo, src: &[u8], dst: &mut Vec<u8>) -> DecodeResult<()> {
        let bits_allocated = info.bits_allocated;
        ensure!(
            bits_allocated == 8 || bits_allocated == 16,
            decode_error::UnsupportedBitsAllocatedSnafu { bits_allocated }
        );

        let bytes_per_sample = usize::from(bits_allocated / 8);
        let samples_per_pixel = usize::from(info.samples_per_pixel);
        let pixels = info.pixel_count();
        let frame_size = pixels * samples_per_pixel * bytes_per_sample;

        let offsets = read_rle_header(src)?;
        ensure!(
            offsets.len() == samples_per_pixel * bytes_per_sample,
            decode_error::InvalidDataSnafu {
                reason: "segment count does not match the image layout"
            }
        );

        let base_offset = dst.len();
        dst.resize(base_offset + frame_size, 0);
        let frame = &mut dst[base_offset..];

        // RLE encoded data is ordered like this (for 16-bit, 3 sample):
        //  Segment: 0     | 1     | 2     | 3     | 4     | 5
        //           R MSB | R LSB | G MSB | G LSB | B MSB | B LSB
        // and is rearranged into interleaved little endian samples:
        //  LSB R MSB R LSB G MSB G LSB B MSB B | ...
        let mut segment_data = Vec::with_capacity(pixels);
        for (i, &start) in offsets.iter().enumerate() {
            let end = offsets.get(i + 1).copied().unwrap_or(src.len());
            let segment = src.get(start..end).ok_or_else(|| {
                decode_error::InvalidDataSnafu {
                    reason: "segment out of bounds",
                }
                .build()
            })?;
            segment_data.clear();
            unpack_bits(segment, pixels, &mut segment_data)?;

            let sample = i / bytes_per_sample;
            let byte = bytes_per_sample - 1 - i % bytes_per_sample;
            let start = sample * bytes_per_sample + byte;
            let step = samples_per_pixel * bytes_per_sample;
            for (value, out) in segment_data
                .iter()
                .zip(frame.iter_mut().skip(start).step_by(step))
            {
                *out = *value;
            }
        }
        Ok(())
    }
}

/// Read the RLE header and return the segment offsets.
fn read_rle_header(fragment: &[u8]) -> DecodeResult<Vec<usize>> {
    ensure!(
        fragment.len() >= RLE_HEADER_LEN,
        decode_error::InvalidDataSnafu {
            reason: "fragment shorter than the RLE header"
        }
    );
    let nr_segments = LittleEndian::read_u32(&fragment[0..4]) as usize;
    ensure!(
        (1..=15).contains(&nr_segments),
        decode_error::InvalidDataSnafu {
            reason: "invalid number of RLE segments"
        }
    );
    let mut offsets = vec![0; nr_segments];
    LittleEndian::read_u32_into(&fragment[4..4 * (nr_segments + 1)], &mut offsets);

    let offsets: Vec<usize> = offsets.into_iter().map(|o| o as usize).collect();
    ensure!(
        offsets[0] == RLE_HEADER_LEN
            && offsets.windows(2).all(|w| w[0] <= w[1])
            && offsets[nr_segments - 1] <= fragment.len(),
        decode_error::InvalidDataSnafu {
            reason: "invalid RLE segment offsets"
        }
    );
    Ok(offsets)
}

/// Decode a PackBits segment into exactly `expected` bytes.
fn unpack_bits(segment: &[u8], expected: usize, out: &mut Vec<u8>) -> DecodeResult<()> {
    let mut pos = 0;
    while pos < segment.len() && out.len() < expected {
        let header = segment[pos] as i8;
        pos += 1;
        match header {
            0..=127 => {
                let count = header as usize + 1;
                let literal = segment.get(pos..pos + count).ok_or_else(|| {
                    decode_error::InvalidDataSnafu {
                        reason: "truncated literal run",
                    }
                    .build()
                })?;
                out.extend_from_slice(literal);
                pos += count;
            }
            -127..=-1 => {
                let count = (1 - isize::from(header)) as usize;
                let value = *segment.get(pos).ok_or_else(|| {
                    decode_error::InvalidDataSnafu {
                        reason: "truncated replicate run",
                    }
                    .build()
                })?;
                out.resize(out.len() + count, value);
                pos += 1;
            }
            // -128 is a no-op
            _ => {}
        }
    }
    ensure!(
        out.len() >= expected,
        decode_error::InvalidDataSnafu {
            reason: "RLE segment too short"
        }
    );
    out.truncate(expected);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::PixelRepresentation;

    fn info(rows: u16, cols: u16, samples_per_pixel: u16, bits_allocated: u16) -> ImageInfo {
        ImageInfo {
            rows,
            cols,
            samples_per_pixel,
            bits_allocated,
            bits_stored: bits_allocated,
            pixel_representation: PixelRepresentation::Unsigned,
            planar_configuration: 0,
            number_of_frames: 1,
            photometric_interpretation: "MONOCHROME2".to_string(),
        }
    }

    fn header(offsets: &[u32]) -> Vec<u8> {
        let mut out = vec![0; RLE_HEADER_LEN];
        LittleEndian::write_u32(&mut out[0..4], offsets.len() as u32);
        for (i, &o) in offsets.iter().enumerate() {
            LittleEndian::write_u32(&mut out[4 + i * 4..8 + i * 4], o);
        }
        out
    }

    #[test]
    fn packbits() {
        let encoded = [
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA,
        ];
        let mut decoded = Vec::new();
        unpack_bits(&encoded, 24, &mut decoded).unwrap();

        let expected = [
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        assert_eq!(decoded, expected);

        let mut decoded = Vec::new();
        assert!(unpack_bits(&encoded, 25, &mut decoded).is_err());
        // literal run announcing more bytes than available
        let mut decoded = Vec::new();
        assert!(unpack_bits(&[0x05, 0x01], 6, &mut decoded).is_err());
    }

    #[test]
    fn decode_16_bit_frame() {
        // 2x2 pixels: 0x0102, 0x0304, 0x0506, 0x0708
        let mut fragment = header(&[64, 69]);
        // MSB segment, literal run of 4
        fragment.extend_from_slice(&[0x03, 0x01, 0x03, 0x05, 0x07]);
        // LSB segment, literal run of 4
        fragment.extend_from_slice(&[0x03, 0x02, 0x04, 0x06, 0x08]);

        let mut dst = Vec::new();
        RleLosslessAdapter
            .decode_frame(&info(2, 2, 1, 16), &fragment, &mut dst)
            .unwrap();
        assert_eq!(dst, [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07]);
    }

    #[test]
    fn decode_rgb_frame() {
        // 1x2 pixels: red plane replicated, green and blue literal
        let mut fragment = header(&[64, 66, 69]);
        fragment.extend_from_slice(&[0xFF, 0x10]);
        fragment.extend_from_slice(&[0x01, 0x20, 0x21]);
        fragment.extend_from_slice(&[0x01, 0x30, 0x31]);

        let mut dst = Vec::new();
        RleLosslessAdapter
            .decode_frame(&info(1, 2, 3, 8), &fragment, &mut dst)
            .unwrap();
        assert_eq!(dst, [0x10, 0x20, 0x30, 0x10, 0x21, 0x31]);
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let mut dst = Vec::new();
        let layout = info(2, 2, 1, 8);
        assert!(RleLosslessAdapter.decode_frame(&layout, &[0; 10], &mut dst).is_err());
        // two segments for a single 8-bit sample
        let fragment = header(&[64, 64]);
        assert!(RleLosslessAdapter.decode_frame(&layout, &fragment, &mut dst).is_err());
        // offset beyond the fragment
        let fragment = header(&[640]);
        assert!(RleLosslessAdapter.decode_frame(&layout, &fragment, &mut dst).is_err());
    }
}

//! Module holding a stateful DICOM data decoding abstraction,
//! which walks a byte buffer while keeping track of its position.
//!
//! Every read is checked against the end of the buffer
//! before any byte is touched,
//! so a malformed length can never lead to an out of bounds read.

use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use dcmstack_core::dictionary;
use dcmstack_core::header::{DataElementHeader, Length, SequenceItemHeader};
use dcmstack_core::limits::{check_range, BoundsError};
use dcmstack_core::transfer_syntax::TransferSyntax;
use dcmstack_core::{Tag, VR};
use snafu::{Backtrace, ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not decode element header at position {}", position))]
    DecodeElementHeader {
        position: u64,
        #[snafu(backtrace)]
        source: BoundsError,
    },
    #[snafu(display("Could not decode item header at position {}", position))]
    DecodeItemHeader {
        position: u64,
        #[snafu(backtrace)]
        source: BoundsError,
    },
    #[snafu(display("Unexpected tag {} at position {}, expected an item or delimiter", tag, position))]
    UnexpectedItemTag {
        tag: Tag,
        position: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not read value of {} bytes at position {}", len, position))]
    ReadValue {
        len: u32,
        position: u64,
        #[snafu(backtrace)]
        source: BoundsError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A stateful decoder over an in-memory byte buffer.
///
/// The decoder reads element headers and values
/// in the encoding of one of the native transfer syntaxes
/// (implicit VR little endian, explicit VR little endian
/// or explicit VR big endian).
/// Encapsulated transfer syntaxes share the encoding
/// of explicit VR little endian.
#[derive(Debug, Clone)]
pub struct StatefulDecoder<'a> {
    data: &'a [u8],
    position: usize,
    endianness: Endianness,
    explicit_vr: bool,
}

impl<'a> StatefulDecoder<'a> {
    /// Create a new decoder for the given transfer syntax,
    /// starting at the given position of the buffer.
    pub fn new(data: &'a [u8], position: usize, ts: &TransferSyntax) -> Self {
        Self::new_with(data, position, ts.endianness(), ts.is_explicit_vr())
    }

    /// Create a new decoder with the given byte order and VR explicitness.
    pub fn new_with(
        data: &'a [u8],
        position: usize,
        endianness: Endianness,
        explicit_vr: bool,
    ) -> Self {
        StatefulDecoder {
            data,
            position: position.min(data.len()),
            endianness,
            explicit_vr,
        }
    }

    /// Create a decoder for the file meta group,
    /// which is always in explicit VR little endian.
    pub fn file_header_decoder(data: &'a [u8], position: usize) -> Self {
        Self::new_with(data, position, Endianness::Little, true)
    }

    /// The current position in the buffer, in bytes.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position as u64
    }

    /// The full length of the underlying buffer.
    #[inline]
    pub fn buffer_len(&self) -> u64 {
        self.data.len() as u64
    }

    /// The number of bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Whether all bytes have been read.
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.position >= self.data.len()
    }

    /// The byte order of multi-byte values.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Whether value representations are read from the buffer.
    pub fn is_explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    /// The whole underlying buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], BoundsError> {
        let end = check_range(self.position as u64, len as u64, self.data.len() as u64)?;
        let bytes = &self.data[self.position..end as usize];
        self.position = end as usize;
        Ok(bytes)
    }

    fn read_u16(&mut self) -> Result<u16, BoundsError> {
        let bytes = self.take(2)?;
        Ok(match self.endianness {
            Endianness::Little => LittleEndian::read_u16(bytes),
            Endianness::Big => BigEndian::read_u16(bytes),
        })
    }

    fn read_u32(&mut self) -> Result<u32, BoundsError> {
        let bytes = self.take(4)?;
        Ok(match self.endianness {
            Endianness::Little => LittleEndian::read_u32(bytes),
            Endianness::Big => BigEndian::read_u32(bytes),
        })
    }

    fn read_tag(&mut self) -> Result<Tag, BoundsError> {
        let group = self.read_u16()?;
        let element = self.read_u16()?;
        Ok(Tag(group, element))
    }

    /// Look at the next tag without moving forward.
    pub fn peek_tag(&self) -> Option<Tag> {
        let mut probe = self.clone();
        probe.read_tag().ok()
    }

    fn read_header(&mut self) -> Result<DataElementHeader, BoundsError> {
        let tag = self.read_tag()?;

        if tag.group() == 0xFFFE {
            // item and delimiters have no VR
            let len = self.read_u32()?;
            return Ok(DataElementHeader::new(tag, VR::UN, Length(len)));
        }

        if !self.explicit_vr {
            let vr = dictionary::vr_of(tag);
            let len = self.read_u32()?;
            return Ok(DataElementHeader::new(tag, vr, Length(len)));
        }

        let vr_bytes = self.take(2)?;
        let vr = VR::from_binary([vr_bytes[0], vr_bytes[1]]).unwrap_or(VR::UN);
        let len = if vr.has_long_length() {
            // 2 reserved bytes, then 4 bytes for data length
            self.take(2)?;
            self.read_u32()?
        } else {
            u32::from(self.read_u16()?)
        };
        Ok(DataElementHeader::new(tag, vr, Length(len)))
    }

    /// Decode the next data element header.
    pub fn decode_header(&mut self) -> Result<DataElementHeader> {
        let position = self.position();
        self.read_header()
            .context(DecodeElementHeaderSnafu { position })
    }

    /// Decode the next sequence item header,
    /// which may also be an item or sequence delimiter.
    pub fn decode_item_header(&mut self) -> Result<SequenceItemHeader> {
        let position = self.position();
        let tag = self
            .read_tag()
            .context(DecodeItemHeaderSnafu { position })?;
        let len = self
            .read_u32()
            .context(DecodeItemHeaderSnafu { position })?;
        SequenceItemHeader::new(tag, Length(len))
            .ok_or_else(|| UnexpectedItemTagSnafu { tag, position }.build())
    }

    /// Read the bytes of a value of the given length,
    /// borrowing them from the buffer.
    pub fn read_value_bytes(&mut self, len: u32) -> Result<&'a [u8]> {
        let position = self.position();
        self.take(len as usize)
            .context(ReadValueSnafu { len, position })
    }

    /// Skip a value of the given length.
    pub fn skip_bytes(&mut self, len: u32) -> Result<()> {
        self.read_value_bytes(len).map(|_| ())
    }
}

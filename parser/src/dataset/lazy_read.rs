//! Sequential, lazy reading of DICOM data set tokens
//! from a buffer held in memory.
//!
//! Headers, sequence and item boundaries are treated as tokens
//! which can be used to form a syntax tree of a full data set.
//! Element values are never copied:
//! the reader moves past them and reports where they are in the buffer,
//! so that consumers can decide whether to parse a value now, later or never.
//!
//! Nesting is tracked with an explicit stack of delimiters,
//! so arbitrarily deep input cannot exhaust the call stack.
//! Sequences nested deeper than the configured limit
//! are skipped in a bounded scan and reported as truncated.
use crate::stateful::decode::{Error as DecoderError, StatefulDecoder};
use dcmstack_core::header::{DataElementHeader, Length, SequenceItemHeader};
use dcmstack_core::limits::{check_range, BoundsError, DecodeLimits};
use dcmstack_core::{tags, Tag, VR};
use snafu::{Backtrace, ResultExt, Snafu};
use std::cmp::Ordering;
use tracing::{trace, warn};

use super::{DataToken, SeqTokenType};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read item header at {} bytes", bytes_read))]
    ReadItemHeader {
        bytes_read: u64,
        #[snafu(backtrace)]
        source: DecoderError,
    },
    #[snafu(display("Could not read element header at {} bytes", bytes_read))]
    ReadHeader {
        bytes_read: u64,
        #[snafu(backtrace)]
        source: DecoderError,
    },
    #[snafu(display("Could not read value of element {}", tag))]
    ReadValue {
        tag: Tag,
        #[snafu(backtrace)]
        source: DecoderError,
    },
    #[snafu(display("Value of element {} is too long", tag))]
    ElementTooLong {
        tag: Tag,
        #[snafu(backtrace)]
        source: BoundsError,
    },
    #[snafu(display("Sequence or item at {} bytes runs past the end of the data", bytes_read))]
    SequenceOutOfBounds {
        bytes_read: u64,
        #[snafu(backtrace)]
        source: BoundsError,
    },
    #[snafu(display(
        "Inconsistent sequence end: expected end at {} bytes but read {}",
        end_of_sequence,
        bytes_read
    ))]
    InconsistentSequenceEnd {
        end_of_sequence: u64,
        bytes_read: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected item delimiter at {} bytes", bytes_read))]
    UnexpectedItemDelimiter {
        bytes_read: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected tag {} at {} bytes", tag, bytes_read))]
    UnexpectedTag {
        tag: Tag,
        bytes_read: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected undefined value length at {} bytes", bytes_read))]
    UndefinedLength {
        bytes_read: u64,
        backtrace: Backtrace,
    },
    #[snafu(display(
        "Data ended at {} bytes inside {} unterminated sequence(s) or item(s)",
        bytes_read,
        open
    ))]
    UnterminatedSequence {
        bytes_read: u64,
        open: usize,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An open sequence or item on the delimiter stack.
#[derive(Debug, Copy, Clone, PartialEq)]
struct SeqToken {
    typ: SeqTokenType,
    /// declared length of the value, possibly undefined
    len: Length,
    /// set for the fragment items of encapsulated pixel data
    pixel_data: bool,
    /// position of the first byte of the value
    base_offset: u64,
}

/// An iterator of data tokens over a DICOM data set held in memory.
///
/// This iterator produces data tokens without reading the bytes of a value.
#[derive(Debug)]
pub struct LazyDataSetReader<'a> {
    parser: StatefulDecoder<'a>,
    limits: DecodeLimits,
    /// an item header or sequence delimiter comes next
    in_sequence: bool,
    /// the open sequence or item may end at the current position
    delimiter_check_pending: bool,
    seq_delimiters: Vec<SeqToken>,
    /// set after an error or the end of the data set
    hard_break: bool,
}

impl<'a> LazyDataSetReader<'a> {
    /// Create a new lazy data set reader with the given stateful decoder
    /// and decoding limits.
    pub fn new(parser: StatefulDecoder<'a>, limits: DecodeLimits) -> Self {
        LazyDataSetReader {
            parser,
            limits,
            seq_delimiters: Vec::new(),
            delimiter_check_pending: false,
            in_sequence: false,
            hard_break: false,
        }
    }

    /// The current reading position.
    pub fn position(&self) -> u64 {
        self.parser.position()
    }

    /// The current sequence nesting level.
    /// Encapsulated pixel data does not count as a sequence.
    pub fn depth(&self) -> u32 {
        self.seq_delimiters
            .iter()
            .filter(|t| t.typ == SeqTokenType::Sequence && !t.pixel_data)
            .count() as u32
    }

    /// Whether the reader is at the root data set.
    pub fn at_root(&self) -> bool {
        self.seq_delimiters.is_empty()
    }

    /// The byte order of the data set.
    pub fn endianness(&self) -> byteordered::Endianness {
        self.parser.endianness()
    }

    fn update_seq_delimiters(&mut self) -> Result<Option<DataToken>> {
        if let Some(sd) = self.seq_delimiters.last() {
            if let Some(len) = sd.len.get() {
                let end_of_sequence = sd.base_offset + u64::from(len);
                let bytes_read = self.parser.position();
                match end_of_sequence.cmp(&bytes_read) {
                    Ordering::Equal => {
                        // end of delimiter, as indicated by the element's length
                        let token = match sd.typ {
                            SeqTokenType::Sequence => {
                                self.in_sequence = false;
                                DataToken::SequenceEnd
                            }
                            SeqTokenType::Item => {
                                self.in_sequence = true;
                                DataToken::ItemEnd
                            }
                        };
                        self.seq_delimiters.pop();
                        return Ok(Some(token));
                    }
                    Ordering::Less => {
                        return InconsistentSequenceEndSnafu {
                            end_of_sequence,
                            bytes_read,
                        }
                        .fail();
                    }
                    Ordering::Greater => {} // continue normally
                }
            }
        }
        self.delimiter_check_pending = false;
        Ok(None)
    }

    fn push_sequence_token(
        &mut self,
        typ: SeqTokenType,
        len: Length,
        pixel_data: bool,
    ) -> Result<()> {
        let base_offset = self.parser.position();
        if let Some(len) = len.get() {
            check_range(base_offset, u64::from(len), self.parser.buffer_len()).context(
                SequenceOutOfBoundsSnafu {
                    bytes_read: base_offset,
                },
            )?;
        }
        self.seq_delimiters.push(SeqToken {
            typ,
            pixel_data,
            len,
            base_offset,
        });
        Ok(())
    }

    /// Skip over the value of a sequence which is too deeply nested.
    ///
    /// Sequences of defined length are skipped in one step.
    /// Sequences of undefined length are scanned header by header,
    /// counting the undefined-length sequences and items still open.
    /// Every step consumes at least one header,
    /// so the scan is bounded by the remaining length of the buffer.
    fn skip_sequence(&mut self, tag: Tag, len: Length) -> Result<()> {
        if let Some(len) = len.get() {
            let bytes_read = self.parser.position();
            check_range(bytes_read, u64::from(len), self.parser.buffer_len())
                .context(SequenceOutOfBoundsSnafu { bytes_read })?;
            return self.parser.skip_bytes(len).context(ReadValueSnafu { tag });
        }

        let mut open: usize = 1;
        while open > 0 {
            let bytes_read = self.parser.position();
            if self.parser.is_at_end() {
                return UnterminatedSequenceSnafu { bytes_read, open }.fail();
            }
            let header = self
                .parser
                .decode_header()
                .context(ReadHeaderSnafu { bytes_read })?;
            match header.tag {
                Tag::ITEM_DELIMITER | Tag::SEQUENCE_DELIMITER => open -= 1,
                _ if header.len.is_undefined() => open += 1,
                tag => {
                    let len = header.len.0;
                    self.parser
                        .skip_bytes(len)
                        .context(ReadValueSnafu { tag })?;
                }
            }
        }
        Ok(())
    }

    /** Advance and retrieve the next DICOM data token.
     *
     * Returns `None` once the end of the root data set is reached.
     * After an error, the reader is fused and returns `None`.
     */
    pub fn next(&mut self) -> Option<Result<DataToken>> {
        if self.hard_break {
            return None;
        }
        let out = self.advance();
        match &out {
            Some(Err(_)) | None => self.hard_break = true,
            Some(Ok(token)) => trace!("{:?}", token),
        }
        out
    }

    fn advance(&mut self) -> Option<Result<DataToken>> {
        // record the reading position before any further reading
        let bytes_read = self.parser.position();

        // item or sequence delimitation logic for explicit lengths
        if self.delimiter_check_pending {
            match self.update_seq_delimiters() {
                Err(e) => return Some(Err(e)),
                Ok(Some(token)) => return Some(Ok(token)),
                Ok(None) => { /* no-op */ }
            }
        }

        if self.in_sequence {
            // at sequence level, expecting item header

            if self.parser.is_at_end() {
                return Some(self.end_inside_sequence(bytes_read));
            }

            match self.parser.decode_item_header() {
                Ok(SequenceItemHeader::Item { len }) => {
                    // entered a new item
                    self.in_sequence = false;
                    let pixel_data = self
                        .seq_delimiters
                        .last()
                        .map(|t| t.pixel_data)
                        .unwrap_or(false);
                    if let Err(e) = self.push_sequence_token(SeqTokenType::Item, len, pixel_data)
                    {
                        return Some(Err(e));
                    }
                    // items can be empty
                    if len == Length(0) {
                        self.delimiter_check_pending = true;
                    }
                    Some(Ok(DataToken::ItemStart { len }))
                }
                Ok(SequenceItemHeader::ItemDelimiter) => {
                    // an item delimiter between items
                    Some(UnexpectedItemDelimiterSnafu { bytes_read }.fail())
                }
                Ok(SequenceItemHeader::SequenceDelimiter) => {
                    // closed a sequence
                    self.seq_delimiters.pop();
                    self.in_sequence = false;
                    // items can end after a nested sequence ends
                    self.delimiter_check_pending = true;
                    Some(Ok(DataToken::SequenceEnd))
                }
                Err(e) => Some(Err(e).context(ReadItemHeaderSnafu { bytes_read })),
            }
        } else if let Some(SeqToken {
            typ: SeqTokenType::Item,
            pixel_data: true,
            len,
            ..
        }) = self.seq_delimiters.last().copied()
        {
            // item value of encapsulated pixel data

            let len = match len.get() {
                Some(len) => len,
                None => return Some(UndefinedLengthSnafu { bytes_read }.fail()),
            };
            if let Err(e) = self
                .limits
                .check_element_length(u64::from(len))
                .context(ElementTooLongSnafu {
                    tag: tags::PIXEL_DATA,
                })
            {
                return Some(Err(e));
            }
            if let Err(e) = self.parser.skip_bytes(len).context(ReadValueSnafu {
                tag: tags::PIXEL_DATA,
            }) {
                return Some(Err(e));
            }

            // need to pop item delimiter on the next iteration
            self.delimiter_check_pending = true;
            Some(Ok(DataToken::ItemValue {
                offset: bytes_read,
                len,
            }))
        } else {
            // a data element header or item delimiter is expected

            if self.parser.is_at_end() {
                if self.seq_delimiters.is_empty() {
                    // end of the data set
                    return None;
                }
                return Some(self.end_inside_sequence(bytes_read));
            }

            let header = match self.parser.decode_header() {
                Ok(header) => header,
                Err(e) => return Some(Err(e).context(ReadHeaderSnafu { bytes_read })),
            };
            Some(self.handle_header(header, bytes_read))
        }
    }

    fn handle_header(&mut self, header: DataElementHeader, bytes_read: u64) -> Result<DataToken> {
        match header {
            DataElementHeader {
                tag: Tag::ITEM_DELIMITER,
                ..
            } => {
                // pop item delimiter
                match self.seq_delimiters.last() {
                    Some(SeqToken {
                        typ: SeqTokenType::Item,
                        len,
                        ..
                    }) if len.is_undefined() => {}
                    _ => return UnexpectedItemDelimiterSnafu { bytes_read }.fail(),
                }
                self.seq_delimiters.pop();
                self.in_sequence = true;
                // sequences can end after this token
                self.delimiter_check_pending = true;
                Ok(DataToken::ItemEnd)
            }
            DataElementHeader { tag, .. } if tag.group() == 0xFFFE => {
                // item or sequence delimiter outside of a sequence
                UnexpectedTagSnafu { tag, bytes_read }.fail()
            }
            header if header.is_encapsulated_pixeldata() => {
                // encapsulated pixel data conditions:
                // expect a sequence of pixel data fragments
                self.push_sequence_token(SeqTokenType::Sequence, Length::UNDEFINED, true)?;
                self.in_sequence = true;
                Ok(DataToken::PixelSequenceStart)
            }
            DataElementHeader { tag, vr, len } if vr == VR::SQ || len.is_undefined() => {
                // undefined length elements other than pixel data
                // are treated as data set sequences
                let depth = self.depth() + 1;
                if self.limits.check_sequence_depth(depth).is_err() {
                    warn!(
                        "Sequence {} at {} bytes exceeds the nesting limit of {}, skipping it",
                        tag, bytes_read, self.limits.max_sequence_depth
                    );
                    self.skip_sequence(tag, len)?;
                    // items can end after this sequence
                    self.delimiter_check_pending = true;
                    return Ok(DataToken::TruncatedSequence { tag, len, depth });
                }

                self.push_sequence_token(SeqTokenType::Sequence, len, false)?;
                self.in_sequence = true;

                // sequences can end right after they start
                if len == Length(0) {
                    self.delimiter_check_pending = true;
                }
                Ok(DataToken::SequenceStart { tag, len })
            }
            header => {
                let DataElementHeader { tag, len, .. } = header;
                let len = len.0;
                self.limits
                    .check_element_length(u64::from(len))
                    .context(ElementTooLongSnafu { tag })?;
                let offset = self.parser.position();

                if tag == tags::PIXEL_DATA
                    && self.seq_delimiters.is_empty()
                    && u64::from(len) > self.parser.remaining() as u64
                {
                    // keep the metadata of files with truncated pixel data,
                    // pixel data extraction will detect the mismatch
                    warn!(
                        "Pixel data declares {} bytes but only {} are available",
                        len,
                        self.parser.remaining()
                    );
                    let remaining = self.parser.remaining() as u32;
                    self.parser
                        .skip_bytes(remaining)
                        .context(ReadValueSnafu { tag })?;
                } else {
                    self.parser
                        .skip_bytes(len)
                        .context(ReadValueSnafu { tag })?;
                }

                // sequences can end after this token
                self.delimiter_check_pending = true;
                Ok(DataToken::ElementHeader { header, offset })
            }
        }
    }

    /// Handle the end of the data while inside a sequence or item.
    fn end_inside_sequence(&mut self, bytes_read: u64) -> Result<DataToken> {
        // tolerate a missing sequence delimiter
        // at the end of top level encapsulated pixel data
        if let [SeqToken {
            typ: SeqTokenType::Sequence,
            pixel_data: true,
            ..
        }] = self.seq_delimiters.as_slice()
        {
            warn!("Encapsulated pixel data ends without a sequence delimiter");
            self.seq_delimiters.pop();
            self.in_sequence = false;
            return Ok(DataToken::SequenceEnd);
        }
        UnterminatedSequenceSnafu {
            bytes_read,
            open: self.seq_delimiters.len(),
        }
        .fail()
    }
}

impl Iterator for LazyDataSetReader<'_> {
    type Item = Result<DataToken>;

    fn next(&mut self) -> Option<Self::Item> {
        LazyDataSetReader::next(self)
    }
}

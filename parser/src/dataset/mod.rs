//! Interpretation of DICOM data sets as streams of tokens,
//! and the element table built from them.
use byteordered::Endianness;
use dcmstack_core::dictionary;
use dcmstack_core::header::{DataElementHeader, Length};
use dcmstack_core::limits::DecodeLimits;
use dcmstack_core::transfer_syntax::TransferSyntax;
use dcmstack_core::value::Value;
use dcmstack_core::{tags, Tag, VR};
use snafu::{ResultExt, Snafu};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::stateful::decode::StatefulDecoder;

pub mod lazy_read;

pub use self::lazy_read::LazyDataSetReader;

/// A token of a DICOM data set stream. This is part of the interpretation of a
/// data set as a stream of symbols, which may either represent data headers or
/// the location of value data.
#[derive(Debug, Clone, PartialEq)]
pub enum DataToken {
    /// A data header of a primitive value,
    /// with the position of the value in the buffer.
    ElementHeader {
        header: DataElementHeader,
        offset: u64,
    },
    /// The beginning of a sequence element.
    SequenceStart { tag: Tag, len: Length },
    /// The beginning of an encapsulated pixel data element.
    PixelSequenceStart,
    /// The ending delimiter of a sequence.
    SequenceEnd,
    /// The beginning of a new item in the sequence.
    ItemStart { len: Length },
    /// The ending delimiter of an item.
    ItemEnd,
    /// The value of an item in encapsulated pixel data
    /// (the basic offset table or a fragment).
    ItemValue { offset: u64, len: u32 },
    /// A sequence nested beyond the nesting limit,
    /// which was skipped as a whole.
    TruncatedSequence { tag: Tag, len: Length, depth: u32 },
}

/// The type of delimiter: sequence or item.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SeqTokenType {
    Sequence,
    Item,
}

/// The location of an element value which was not parsed yet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TagMetadata {
    /// byte offset of the value from the start of the buffer
    pub offset: u64,
    /// length of the value in bytes
    pub length: u32,
    /// value representation to parse the value with
    pub vr: VR,
}

impl TagMetadata {
    /// Obtain the bytes of the value from the buffer the data set was read from.
    ///
    /// Returns `None` if the buffer is not the one the metadata refers to.
    pub fn bytes<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        let start = usize::try_from(self.offset).ok()?;
        let end = start.checked_add(self.length as usize)?;
        data.get(start..end)
    }

    /// Parse the value of the element.
    pub fn realize(&self, data: &[u8], endianness: Endianness) -> Option<Value> {
        self.bytes(data)
            .map(|bytes| Value::from_bytes(self.vr, bytes, endianness))
    }
}

/// The value of an element in the table:
/// either parsed already, or still a location in the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// The value was parsed.
    Realized(Value),
    /// The value is yet to be parsed.
    Lazy(TagMetadata),
}

/// A data element of the root data set.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// The element header as found in the data.
    pub header: DataElementHeader,
    /// The element value.
    pub value: ElementValue,
}

/// One fragment of encapsulated pixel data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// byte offset of the fragment data from the start of the buffer
    pub offset: u64,
    /// length of the fragment in bytes
    pub len: u32,
}

impl Fragment {
    /// Obtain the bytes of the fragment from the buffer.
    pub fn bytes<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        let start = usize::try_from(self.offset).ok()?;
        let end = start.checked_add(self.len as usize)?;
        data.get(start..end)
    }
}

/// Where the pixel data of the root data set is.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelDataLocation {
    /// Native pixel data, stored as a single value.
    Native {
        /// value representation (OB or OW)
        vr: VR,
        /// byte offset of the value
        offset: u64,
        /// declared length in bytes
        declared_len: u32,
        /// length actually present in the buffer,
        /// smaller than the declared length in truncated files
        available_len: u32,
    },
    /// Encapsulated pixel data, stored as a sequence of fragments.
    Encapsulated {
        /// the basic offset table, possibly empty
        offset_table: Vec<u32>,
        /// the fragments following the offset table
        fragments: Vec<Fragment>,
    },
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read data set"))]
    ReadToken {
        #[snafu(backtrace)]
        source: lazy_read::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Options for reading a data set.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct ReadOptions {
    /// the decoding limits to enforce
    pub limits: DecodeLimits,
    /// stop reading before the first root element with a tag at or beyond this one
    pub read_until: Option<Tag>,
}

/// The element table of a root data set.
///
/// Critical attributes (see [`dictionary::is_critical`])
/// are parsed while reading.
/// All other values are kept as [`TagMetadata`],
/// to be parsed on first access.
/// Elements nested in sequences are validated but not kept.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    elements: BTreeMap<Tag, Element>,
    pixel_data: Option<PixelDataLocation>,
    truncated_branches: u32,
    endianness: Endianness,
}

#[derive(Debug, Default)]
struct PixelSequenceState {
    items: usize,
    offset_table: Vec<u32>,
    fragments: Vec<Fragment>,
}

impl DataSet {
    /// Read a data set from `data`, starting at byte offset `start`,
    /// encoded with the given transfer syntax.
    pub fn read(
        data: &[u8],
        start: usize,
        ts: &TransferSyntax,
        options: ReadOptions,
    ) -> Result<DataSet> {
        let parser = StatefulDecoder::new(data, start, ts);
        let mut reader = LazyDataSetReader::new(parser, options.limits);
        let endianness = ts.endianness();

        let mut elements = BTreeMap::new();
        let mut pixel_data = None;
        let mut truncated_branches = 0;
        // nesting level of the token stream, counting sequences and items
        let mut level: usize = 0;
        let mut pixel_sequence: Option<PixelSequenceState> = None;

        while let Some(token) = reader.next() {
            let token = token.context(ReadTokenSnafu)?;
            let at_root = level == 0;

            if at_root {
                let tag = match token {
                    DataToken::ElementHeader { header, .. } => Some(header.tag),
                    DataToken::SequenceStart { tag, .. }
                    | DataToken::TruncatedSequence { tag, .. } => Some(tag),
                    DataToken::PixelSequenceStart => Some(tags::PIXEL_DATA),
                    _ => None,
                };
                if let (Some(tag), Some(until)) = (tag, options.read_until) {
                    if tag >= until {
                        debug!("Stopped reading at {}", tag);
                        break;
                    }
                }
            }

            match token {
                DataToken::ElementHeader { header, offset } if at_root => {
                    if header.tag == tags::PIXEL_DATA {
                        let available = data.len() as u64 - offset.min(data.len() as u64);
                        pixel_data = Some(PixelDataLocation::Native {
                            vr: header.vr,
                            offset,
                            declared_len: header.len.0,
                            available_len: available.min(u64::from(header.len.0)) as u32,
                        });
                        continue;
                    }
                    let meta = TagMetadata {
                        offset,
                        length: header.len.0,
                        vr: header.vr,
                    };
                    let value = if dictionary::is_critical(header.tag) {
                        match meta.realize(data, endianness) {
                            Some(value) => ElementValue::Realized(value),
                            None => ElementValue::Lazy(meta),
                        }
                    } else {
                        ElementValue::Lazy(meta)
                    };
                    insert_element(&mut elements, Element { header, value });
                }
                DataToken::ElementHeader { .. } => {
                    // nested element
                }
                DataToken::SequenceStart { tag, len } => {
                    if at_root {
                        let header = DataElementHeader::new(tag, VR::SQ, len);
                        insert_element(
                            &mut elements,
                            Element {
                                header,
                                value: ElementValue::Realized(Value::Empty),
                            },
                        );
                    }
                    level += 1;
                }
                DataToken::PixelSequenceStart => {
                    if at_root {
                        pixel_sequence = Some(PixelSequenceState::default());
                    }
                    level += 1;
                }
                DataToken::ItemStart { .. } => {
                    level += 1;
                    if let Some(state) = pixel_sequence.as_mut() {
                        state.items += 1;
                    }
                }
                DataToken::ItemValue { offset, len } => {
                    // only items directly in the root pixel sequence are recorded
                    if level == 2 {
                        if let Some(state) = pixel_sequence.as_mut() {
                            if state.items == 1 {
                                let table = Fragment { offset, len }
                                    .bytes(data)
                                    .unwrap_or_default();
                                state.offset_table = table
                                    .chunks_exact(4)
                                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                                    .collect();
                            } else {
                                state.fragments.push(Fragment { offset, len });
                            }
                        }
                    }
                }
                DataToken::ItemEnd => {
                    level = level.saturating_sub(1);
                }
                DataToken::SequenceEnd => {
                    level = level.saturating_sub(1);
                    if level == 0 {
                        if let Some(state) = pixel_sequence.take() {
                            pixel_data = Some(PixelDataLocation::Encapsulated {
                                offset_table: state.offset_table,
                                fragments: state.fragments,
                            });
                        }
                    }
                }
                DataToken::TruncatedSequence { tag, depth, .. } => {
                    truncated_branches += 1;
                    debug!("Truncated sequence {} at depth {}", tag, depth);
                    if at_root {
                        insert_element(
                            &mut elements,
                            Element {
                                header: DataElementHeader::new(tag, VR::SQ, Length::UNDEFINED),
                                value: ElementValue::Realized(Value::Empty),
                            },
                        );
                    }
                }
            }
        }

        Ok(DataSet {
            elements,
            pixel_data,
            truncated_branches,
            endianness,
        })
    }

    /// Retrieve the element with the given tag.
    pub fn get(&self, tag: Tag) -> Option<&Element> {
        self.elements.get(&tag)
    }

    /// Retrieve the element with the given tag for modification.
    pub fn get_mut(&mut self, tag: Tag) -> Option<&mut Element> {
        self.elements.get_mut(&tag)
    }

    /// Obtain the value of an element,
    /// parsing it from `data` if it was not parsed yet.
    ///
    /// The data set is left untouched,
    /// so lazy values are parsed again on every call.
    pub fn value<'s>(&'s self, tag: Tag, data: &[u8]) -> Option<Cow<'s, Value>> {
        match &self.get(tag)?.value {
            ElementValue::Realized(value) => Some(Cow::Borrowed(value)),
            ElementValue::Lazy(meta) => meta.realize(data, self.endianness).map(Cow::Owned),
        }
    }

    /// Insert an element, replacing any element with the same tag.
    pub fn put(&mut self, element: Element) -> Option<Element> {
        self.elements.insert(element.header.tag, element)
    }

    /// Iterate over all elements in tag order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// The number of elements of the root data set.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the data set has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The location of the pixel data, if any.
    pub fn pixel_data(&self) -> Option<&PixelDataLocation> {
        self.pixel_data.as_ref()
    }

    /// The number of sequences skipped for exceeding the nesting limit.
    pub fn truncated_branches(&self) -> u32 {
        self.truncated_branches
    }

    /// The byte order of binary values.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }
}

fn insert_element(elements: &mut BTreeMap<Tag, Element>, element: Element) {
    let tag = element.header.tag;
    if elements.contains_key(&tag) {
        // the first occurrence wins
        warn!("Duplicate element {} ignored", tag);
        return;
    }
    elements.insert(tag, element);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcmstack_core::limits::MAX_SEQUENCE_DEPTH;
    use dcmstack_core::transfer_syntax;

    /// Build an explicit VR little endian data set
    /// with `depth` nested sequences of undefined length,
    /// each holding one item of undefined length,
    /// followed by a Rows element at the root.
    fn nested_sequences(depth: usize, terminated: bool) -> Vec<u8> {
        let mut data = Vec::new();
        for _ in 0..depth {
            // (0008,1140) SQ, undefined length
            data.extend_from_slice(&[0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
            // item, undefined length
            data.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF]);
        }
        // innermost element
        data.extend_from_slice(&[0x20, 0x00, 0x13, 0x00, b'I', b'S', 0x02, 0x00, b'7', b' ']);
        if terminated {
            for _ in 0..depth {
                // item delimiter, sequence delimiter
                data.extend_from_slice(&[0xFE, 0xFF, 0x0D, 0xE0, 0, 0, 0, 0]);
                data.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0, 0, 0, 0]);
            }
            data.extend_from_slice(&[0x28, 0x00, 0x10, 0x00, b'U', b'S', 0x02, 0x00, 0x00, 0x02]);
        }
        data
    }

    fn read(data: &[u8], options: ReadOptions) -> Result<DataSet> {
        DataSet::read(
            data,
            0,
            &transfer_syntax::EXPLICIT_VR_LITTLE_ENDIAN,
            options,
        )
    }

    #[test]
    fn nesting_at_the_limit_is_parsed() {
        let data = nested_sequences(MAX_SEQUENCE_DEPTH as usize, true);
        let dataset = read(&data, ReadOptions::default()).unwrap();
        assert_eq!(dataset.truncated_branches(), 0);
        assert!(dataset.get(tags::REFERENCED_IMAGE_SEQUENCE).is_some());
        assert!(dataset.get(tags::ROWS).is_some());
    }

    #[test]
    fn nesting_beyond_the_limit_is_truncated() {
        let data = nested_sequences(MAX_SEQUENCE_DEPTH as usize + 1, true);
        let dataset = read(&data, ReadOptions::default()).unwrap();
        assert_eq!(dataset.truncated_branches(), 1);
        // the rest of the data set is still read
        assert!(matches!(
            dataset.get(tags::ROWS).map(|e| &e.value),
            Some(ElementValue::Realized(Value::U16(v))) if v[0] == 512
        ));
    }

    #[test]
    fn deep_unterminated_nesting_fails_cleanly() {
        // far beyond the limit and without delimiters
        let data = nested_sequences(10_000, false);
        assert!(read(&data, ReadOptions::default()).is_err());

        let data = nested_sequences(MAX_SEQUENCE_DEPTH as usize + 1, false);
        assert!(read(&data, ReadOptions::default()).is_err());
    }

    #[test]
    fn custom_depth_limit() {
        let data = nested_sequences(3, true);
        let options = ReadOptions {
            limits: DecodeLimits::default().with_max_sequence_depth(2),
            read_until: None,
        };
        let dataset = read(&data, options).unwrap();
        assert_eq!(dataset.truncated_branches(), 1);
    }

    #[rustfmt::skip]
    static IMAGE: &[u8] = &[
        // (0008,103E) SeriesDescription, LO, "CHEST "
        0x08, 0x00, 0x3E, 0x10, b'L', b'O', 0x06, 0x00, b'C', b'H', b'E', b'S', b'T', b' ',
        // (0028,0010) Rows, US, 2
        0x28, 0x00, 0x10, 0x00, b'U', b'S', 0x02, 0x00, 0x02, 0x00,
        // (0028,0011) Columns, US, 2
        0x28, 0x00, 0x11, 0x00, b'U', b'S', 0x02, 0x00, 0x02, 0x00,
        // (0028,1052) RescaleIntercept, DS, "-1024 "
        0x28, 0x00, 0x52, 0x10, b'D', b'S', 0x06, 0x00, b'-', b'1', b'0', b'2', b'4', b' ',
        // (7FE0,0010) PixelData, OB, 4 bytes
        0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0x04, 0x00, 0x00, 0x00,
        0x01, 0x02, 0x03, 0x04,
    ];

    #[test]
    fn critical_values_are_realized() {
        let dataset = read(IMAGE, ReadOptions::default()).unwrap();
        assert_eq!(dataset.len(), 4);

        let rows = dataset.get(tags::ROWS).unwrap();
        assert_eq!(rows.value, ElementValue::Realized(Value::U16([2].as_ref().into())));

        let intercept = dataset.get(tags::RESCALE_INTERCEPT).unwrap();
        match &intercept.value {
            ElementValue::Realized(v) => assert_eq!(v.to_float64(), Ok(-1024.)),
            other => panic!("unexpected value {:?}", other),
        }

        assert_eq!(
            dataset.value(tags::SERIES_DESCRIPTION, IMAGE).unwrap().to_str(),
            "CHEST"
        );
        assert!(dataset.value(tags::PATIENT_NAME, IMAGE).is_none());

        let description = dataset.get(tags::SERIES_DESCRIPTION).unwrap();
        let meta = match description.value {
            ElementValue::Lazy(meta) => meta,
            ref other => panic!("unexpected value {:?}", other),
        };
        assert_eq!(meta, TagMetadata { offset: 8, length: 6, vr: VR::LO });
        assert_eq!(
            meta.realize(IMAGE, Endianness::Little).unwrap().to_str(),
            "CHEST"
        );

        assert_eq!(
            dataset.pixel_data(),
            Some(&PixelDataLocation::Native {
                vr: VR::OB,
                offset: 60,
                declared_len: 4,
                available_len: 4,
            })
        );
    }

    #[test]
    fn read_until_stops_early() {
        let options = ReadOptions {
            read_until: Some(tags::PIXEL_DATA),
            ..Default::default()
        };
        let dataset = read(IMAGE, options).unwrap();
        assert_eq!(dataset.len(), 4);
        assert!(dataset.pixel_data().is_none());

        let options = ReadOptions {
            read_until: Some(tags::COLUMNS),
            ..Default::default()
        };
        let dataset = read(IMAGE, options).unwrap();
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn encapsulated_fragments_are_recorded() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0xe0, 0x7f, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xff, 0xff, 0xff, 0xff,
            // -- 12 -- Basic offset table with 2 entries
            0xfe, 0xff, 0x00, 0xe0, 0x08, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x0e, 0x00, 0x00, 0x00,
            // -- 28 -- fragment
            0xfe, 0xff, 0x00, 0xe0, 0x06, 0x00, 0x00, 0x00,
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06,
            // -- 42 -- fragment
            0xfe, 0xff, 0x00, 0xe0, 0x02, 0x00, 0x00, 0x00,
            0x07, 0x08,
            // -- 52 --
            0xfe, 0xff, 0xdd, 0xe0, 0x00, 0x00, 0x00, 0x00,
        ];

        let dataset = read(DATA, ReadOptions::default()).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(
            dataset.pixel_data(),
            Some(&PixelDataLocation::Encapsulated {
                offset_table: vec![0, 14],
                fragments: vec![
                    Fragment { offset: 36, len: 6 },
                    Fragment { offset: 50, len: 2 },
                ],
            })
        );
    }

    #[test]
    fn duplicate_elements_keep_the_first() {
        #[rustfmt::skip]
        static DATA: &[u8] = &[
            0x28, 0x00, 0x10, 0x00, b'U', b'S', 0x02, 0x00, 0x02, 0x00,
            0x28, 0x00, 0x10, 0x00, b'U', b'S', 0x02, 0x00, 0x04, 0x00,
        ];
        let dataset = read(DATA, ReadOptions::default()).unwrap();
        assert_eq!(
            dataset.get(tags::ROWS).unwrap().value,
            ElementValue::Realized(Value::U16([2].as_ref().into()))
        );
    }
}

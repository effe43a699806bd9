//! Module containing the reader of the DICOM file meta information group.
//!
//! The file meta group follows the 128-byte preamble and the `DICM` magic code,
//! and is always encoded in explicit VR little endian.
use crate::dataset::{Element, ElementValue};
use crate::stateful::decode::{Error as DecoderError, StatefulDecoder};
use byteordered::Endianness;
use dcmstack_core::dictionary;
use dcmstack_core::limits::{BoundsError, DecodeLimits};
use dcmstack_core::transfer_syntax::trim_uid;
use dcmstack_core::value::Value;
use dcmstack_core::{tags, Tag};
use snafu::{Backtrace, OptionExt, ResultExt, Snafu};
use tracing::debug;

/// The magic code found right after the preamble.
pub const DICM_MAGIC_CODE: [u8; 4] = *b"DICM";

/// The length of the file preamble.
pub const PREAMBLE_LEN: usize = 128;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Could not decode an element of the file meta group.
    #[snafu(display("Could not decode file meta group element"))]
    DecodeElement {
        #[snafu(backtrace)]
        source: DecoderError,
    },
    /// A file meta group element declares an undefined length.
    #[snafu(display("Undefined value length for data element tagged {}", tag))]
    UndefinedValueLength { tag: Tag, backtrace: Backtrace },
    /// A file meta group element is too long.
    #[snafu(display("Value of file meta element {} is too long", tag))]
    ElementTooLong {
        tag: Tag,
        #[snafu(backtrace)]
        source: BoundsError,
    },
    /// A required file meta data element is missing.
    #[snafu(display("Missing data element `{}`", alias))]
    MissingElement {
        alias: &'static str,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Locate the start of the file meta group,
/// by looking for the magic code after a preamble
/// or at the very beginning of the data.
///
/// Returns the position right after the magic code.
pub fn detect_magic(data: &[u8]) -> Option<usize> {
    if data.get(PREAMBLE_LEN..PREAMBLE_LEN + 4) == Some(&DICM_MAGIC_CODE[..]) {
        Some(PREAMBLE_LEN + 4)
    } else if data.get(0..4) == Some(&DICM_MAGIC_CODE[..]) {
        Some(4)
    } else {
        None
    }
}

/// A DICOM file meta information table.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaTable {
    /// File Meta Information Group Length
    pub information_group_length: Option<u32>,
    /// Media Storage SOP Class UID
    pub media_storage_sop_class_uid: Option<String>,
    /// Media Storage SOP Instance UID
    pub media_storage_sop_instance_uid: Option<String>,
    /// Transfer Syntax UID, without padding
    pub transfer_syntax: String,
    /// Implementation Class UID
    pub implementation_class_uid: Option<String>,
    /// Implementation Version Name
    pub implementation_version_name: Option<String>,
    /// The position right after the group, where the data set begins.
    pub data_set_offset: usize,
    elements: Vec<Element>,
}

impl FileMetaTable {
    /// Read the file meta group starting at `start`,
    /// which should be the position right after the magic code.
    ///
    /// Elements are read for as long as they belong to group 0002,
    /// regardless of the declared group length.
    pub fn read(data: &[u8], start: usize, limits: &DecodeLimits) -> Result<Self> {
        let mut decoder = StatefulDecoder::file_header_decoder(data, start);

        let mut information_group_length = None;
        let mut media_storage_sop_class_uid = None;
        let mut media_storage_sop_instance_uid = None;
        let mut transfer_syntax = None;
        let mut implementation_class_uid = None;
        let mut implementation_version_name = None;
        let mut elements = Vec::new();

        while matches!(decoder.peek_tag(), Some(tag) if tag.group() == 0x0002) {
            let header = decoder.decode_header().context(DecodeElementSnafu)?;
            let tag = header.tag;
            let len = header
                .len
                .get()
                .context(UndefinedValueLengthSnafu { tag })?;
            limits
                .check_element_length(u64::from(len))
                .context(ElementTooLongSnafu { tag })?;
            let bytes = decoder.read_value_bytes(len).context(DecodeElementSnafu)?;
            let value = Value::from_bytes(header.vr, bytes, Endianness::Little);

            let text = || Some(value.to_str().into_owned());
            match tag {
                tags::FILE_META_INFORMATION_GROUP_LENGTH => {
                    information_group_length = value.to_int::<u32>().ok()
                }
                tags::MEDIA_STORAGE_SOP_CLASS_UID => media_storage_sop_class_uid = text(),
                tags::MEDIA_STORAGE_SOP_INSTANCE_UID => media_storage_sop_instance_uid = text(),
                tags::TRANSFER_SYNTAX_UID => {
                    transfer_syntax = Some(trim_uid(&value.to_str()).to_string())
                }
                tags::IMPLEMENTATION_CLASS_UID => implementation_class_uid = text(),
                tags::IMPLEMENTATION_VERSION_NAME => implementation_version_name = text(),
                _ => {
                    debug!(
                        "File meta element {} ({})",
                        tag,
                        dictionary::alias_of(tag).unwrap_or("unknown")
                    );
                }
            }
            elements.push(Element {
                header,
                value: ElementValue::Realized(value),
            });
        }

        let transfer_syntax = transfer_syntax.context(MissingElementSnafu {
            alias: "TransferSyntaxUID",
        })?;

        Ok(FileMetaTable {
            information_group_length,
            media_storage_sop_class_uid,
            media_storage_sop_instance_uid,
            transfer_syntax,
            implementation_class_uid,
            implementation_version_name,
            data_set_offset: decoder.position() as usize,
            elements,
        })
    }

    /// The elements of the group, with their values parsed.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Take the elements of the group.
    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }
}

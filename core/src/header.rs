//! Basic data types for interpreting DICOM data element headers:
//! the attribute tag, the value representation,
//! the value length and the sequence item header.

use std::fmt;
use std::str::FromStr;

/// Idiomatic alias for a tag's group number.
pub type GroupNumber = u16;
/// Idiomatic alias for a tag's element number.
pub type ElementNumber = u16;

/// The data type for DICOM data element tags.
///
/// Tags are ordered by group first and element second,
/// which is also the order in which they appear in a well formed data set.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub struct Tag(pub GroupNumber, pub ElementNumber);

impl Tag {
    /// Item start tag `(FFFE,E000)`.
    pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
    /// Item delimitation tag `(FFFE,E00D)`.
    pub const ITEM_DELIMITER: Tag = Tag(0xFFFE, 0xE00D);
    /// Sequence delimitation tag `(FFFE,E0DD)`.
    pub const SEQUENCE_DELIMITER: Tag = Tag(0xFFFE, 0xE0DD);

    /// Getter for the tag's group value.
    #[inline]
    pub fn group(self) -> GroupNumber {
        self.0
    }

    /// Getter for the tag's element value.
    #[inline]
    pub fn element(self) -> ElementNumber {
        self.1
    }

    /// Combine the group and element numbers into a single
    /// `group << 16 | element` value.
    #[inline]
    pub fn to_u32(self) -> u32 {
        (u32::from(self.0) << 16) | u32::from(self.1)
    }

    /// Split a `group << 16 | element` value back into a tag.
    #[inline]
    pub fn from_u32(value: u32) -> Tag {
        Tag((value >> 16) as u16, value as u16)
    }

    /// Whether this is one of the three item or delimitation tags
    /// of group `FFFE`.
    #[inline]
    pub fn is_delimitation(self) -> bool {
        self.0 == 0xFFFE
    }

    /// Whether this is a group length element `(gggg,0000)`.
    #[inline]
    pub fn is_group_length(self) -> bool {
        self.1 == 0x0000
    }

    /// Whether the tag belongs to a private group (odd group number).
    #[inline]
    pub fn is_private(self) -> bool {
        self.0 % 2 == 1
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({:#06X?}, {:#06X?})", self.0, self.1)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

impl From<(u16, u16)> for Tag {
    #[inline]
    fn from(value: (u16, u16)) -> Tag {
        Tag(value.0, value.1)
    }
}

impl From<u32> for Tag {
    #[inline]
    fn from(value: u32) -> Tag {
        Tag::from_u32(value)
    }
}

impl PartialEq<(u16, u16)> for Tag {
    fn eq(&self, other: &(u16, u16)) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}

macro_rules! value_representations {
    ($($vr:ident => $name:literal,)+) => {
        /// A DICOM value representation.
        #[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Ord, PartialOrd)]
        pub enum VR {
            $(
                #[doc = $name]
                $vr,
            )+
        }

        impl VR {
            /// The value representation spelled by the given two bytes,
            /// which must be upper case letters.
            pub fn from_binary(chars: [u8; 2]) -> Option<Self> {
                $(
                    if chars[..] == *stringify!($vr).as_bytes() {
                        return Some(VR::$vr);
                    }
                )+
                None
            }

            /// The two letter code of this VR.
            pub fn to_str(self) -> &'static str {
                match self {
                    $(VR::$vr => stringify!($vr),)+
                }
            }
        }
    };
}

value_representations! {
    AE => "Application Entity",
    AS => "Age String",
    AT => "Attribute Tag",
    CS => "Code String",
    DA => "Date",
    DS => "Decimal String",
    DT => "Date Time",
    FL => "Floating Point Single",
    FD => "Floating Point Double",
    IS => "Integer String",
    LO => "Long String",
    LT => "Long Text",
    OB => "Other Byte",
    OD => "Other Double",
    OF => "Other Float",
    OL => "Other Long",
    OV => "Other Very Long",
    OW => "Other Word",
    PN => "Person Name",
    SH => "Short String",
    SL => "Signed Long",
    SQ => "Sequence of Items",
    SS => "Signed Short",
    ST => "Short Text",
    SV => "Signed Very Long",
    TM => "Time",
    UC => "Unlimited Characters",
    UI => "Unique Identifier",
    UL => "Unsigned Long",
    UN => "Unknown",
    UR => "Universal Resource Identifier",
    US => "Unsigned Short",
    UT => "Unlimited Text",
    UV => "Unsigned Very Long",
}

impl VR {
    /// Whether an explicit VR encoding of this representation
    /// uses the long header form:
    /// two reserved bytes followed by a 4-byte length.
    ///
    /// All other representations use a 2-byte length right after the VR.
    pub fn has_long_length(self) -> bool {
        use VR::*;
        matches!(
            self,
            OB | OD | OF | OL | OV | OW | SQ | SV | UC | UN | UR | UT | UV
        )
    }

    /// Whether values of this representation are encoded as text.
    pub fn is_textual(self) -> bool {
        use VR::*;
        matches!(
            self,
            AE | AS | CS | DA | DS | DT | IS | LO | LT | PN | SH | ST | TM | UC | UI | UR | UT
        )
    }
}

impl FromStr for VR {
    type Err = &'static str;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        <[u8; 2]>::try_from(string.as_bytes())
            .ok()
            .and_then(VR::from_binary)
            .ok_or("no such value representation")
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// A type for representing data set content length, in bytes.
/// An internal value of `0xFFFF_FFFF` represents an undefined
/// (unspecified) length, which has to be determined
/// by scanning for the matching delimiter.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Length(pub u32);

const UNDEFINED_LEN: u32 = 0xFFFF_FFFF;

impl Length {
    /// A length that is undefined.
    pub const UNDEFINED: Self = Length(UNDEFINED_LEN);

    /// Check whether this length is undefined (unknown).
    #[inline]
    pub fn is_undefined(self) -> bool {
        self.0 == UNDEFINED_LEN
    }

    /// Fetch the concrete length value, if available.
    /// Returns `None` if it represents an undefined length.
    #[inline]
    pub fn get(self) -> Option<u32> {
        match self.0 {
            UNDEFINED_LEN => None,
            v => Some(v),
        }
    }
}

impl From<u32> for Length {
    #[inline]
    fn from(o: u32) -> Self {
        Length(o)
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            UNDEFINED_LEN => f.write_str("Length(Undefined)"),
            l => f.debug_tuple("Length").field(&l).finish(),
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            UNDEFINED_LEN => f.write_str("U/L"),
            l => write!(f, "{}", &l),
        }
    }
}

/// A data element header: tag, value representation and value length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataElementHeader {
    /// DICOM tag
    pub tag: Tag,
    /// Value Representation
    pub vr: VR,
    /// Element length
    pub len: Length,
}

impl DataElementHeader {
    /// Create a new data element header with the given properties.
    #[inline]
    pub fn new<T: Into<Tag>>(tag: T, vr: VR, len: Length) -> DataElementHeader {
        DataElementHeader {
            tag: tag.into(),
            vr,
            len,
        }
    }

    /// Whether the header opens an encapsulated pixel data sequence:
    /// _Pixel Data_ with an undefined length.
    #[inline]
    pub fn is_encapsulated_pixeldata(&self) -> bool {
        self.tag == Tag(0x7FE0, 0x0010) && self.len.is_undefined()
    }
}

/// Data type for describing a sequence item data element.
/// If the element represents an item, it will also contain
/// the specified length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceItemHeader {
    /// The cursor contains an item.
    Item {
        /// the length of the item in bytes (can be 0xFFFFFFFF if undefined)
        len: Length,
    },
    /// The cursor read an item delimiter.
    /// The element ends here and should not be read any further.
    ItemDelimiter,
    /// The cursor read a sequence delimiter.
    /// The element ends here and should not be read any further.
    SequenceDelimiter,
}

impl SequenceItemHeader {
    /// Create a sequence item header from its tag and length.
    /// Returns `None` if the tag is not an item or delimitation tag.
    pub fn new(tag: Tag, len: Length) -> Option<SequenceItemHeader> {
        match tag {
            Tag::ITEM => Some(SequenceItemHeader::Item { len }),
            Tag::ITEM_DELIMITER => Some(SequenceItemHeader::ItemDelimiter),
            Tag::SEQUENCE_DELIMITER => Some(SequenceItemHeader::SequenceDelimiter),
            _ => None,
        }
    }

    /// The tag of this header.
    pub fn tag(&self) -> Tag {
        match *self {
            SequenceItemHeader::Item { .. } => Tag::ITEM,
            SequenceItemHeader::ItemDelimiter => Tag::ITEM_DELIMITER,
            SequenceItemHeader::SequenceDelimiter => Tag::SEQUENCE_DELIMITER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_u32_conversion() {
        let tag = Tag(0x0028, 0x0010);
        assert_eq!(tag.to_u32(), 0x0028_0010);
        assert_eq!(Tag::from_u32(0x7FE0_0010), Tag(0x7FE0, 0x0010));
        assert_eq!(Tag::from(0x0028_0010), tag);
    }

    #[test]
    fn tag_display() {
        assert_eq!(Tag(0x0008, 0x103E).to_string(), "(0008,103E)");
    }

    #[test]
    fn vr_from_binary() {
        assert_eq!(VR::from_binary(*b"SQ"), Some(VR::SQ));
        assert_eq!(VR::from_binary(*b"US"), Some(VR::US));
        assert_eq!(VR::from_binary([0x00, 0x01]), None);
        assert_eq!(VR::from_binary(*b"us"), None);
        assert_eq!("OW".parse::<VR>(), Ok(VR::OW));
        assert!("OWW".parse::<VR>().is_err());
        assert_eq!(VR::UN.to_string(), "UN");
    }

    #[test]
    fn vr_length_class() {
        assert!(VR::OB.has_long_length());
        assert!(VR::SQ.has_long_length());
        assert!(VR::UT.has_long_length());
        assert!(!VR::US.has_long_length());
        assert!(!VR::DS.has_long_length());
    }

    #[test]
    fn undefined_length() {
        assert!(Length::UNDEFINED.is_undefined());
        assert_eq!(Length::UNDEFINED.get(), None);
        assert_eq!(Length(16).get(), Some(16));
        assert_eq!(format!("{}", Length::UNDEFINED), "U/L");
    }

    #[test]
    fn item_headers() {
        assert_eq!(
            SequenceItemHeader::new(Tag::ITEM, Length(8)),
            Some(SequenceItemHeader::Item { len: Length(8) })
        );
        assert_eq!(
            SequenceItemHeader::new(Tag::SEQUENCE_DELIMITER, Length(0)),
            Some(SequenceItemHeader::SequenceDelimiter)
        );
        assert_eq!(SequenceItemHeader::new(Tag(0x0008, 0x0016), Length(0)), None);
    }
}

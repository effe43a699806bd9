//! Transfer syntax descriptors and the resolver
//! mapping a transfer syntax UID to its descriptor.
//!
//! The list of supported transfer syntaxes is fixed at compile time.
//! Only the three native encodings carry raw pixel data;
//! all others encapsulate compressed pixel data
//! in an explicit VR little endian data set.

use byteordered::Endianness;
use std::fmt;

/// The kind of pixel data compression declared by a transfer syntax.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Native (uncompressed) pixel data
    None,
    /// JPEG Baseline (Process 1)
    JpegBaseline,
    /// JPEG Extended (Process 2 & 4)
    JpegExtended,
    /// JPEG Lossless, Non-Hierarchical (Process 14)
    JpegLossless,
    /// JPEG Lossless, Non-Hierarchical, First-Order Prediction
    /// (Process 14 [Selection Value 1])
    JpegLosslessFirstOrder,
    /// JPEG-LS Lossless
    JpegLsLossless,
    /// JPEG-LS Lossy (Near-Lossless)
    JpegLsNearLossless,
    /// JPEG 2000 (Lossless Only)
    Jpeg2000Lossless,
    /// JPEG 2000
    Jpeg2000,
    /// RLE Lossless
    Rle,
}

impl Compression {
    /// Whether pixel data is stored as a sequence of encapsulated fragments.
    pub fn is_encapsulated(self) -> bool {
        self != Compression::None
    }

    /// Whether the compression reproduces the original sample values exactly.
    pub fn is_lossless(self) -> bool {
        matches!(
            self,
            Compression::None
                | Compression::JpegLossless
                | Compression::JpegLosslessFirstOrder
                | Compression::JpegLsLossless
                | Compression::Jpeg2000Lossless
                | Compression::Rle
        )
    }
}

/// A DICOM transfer syntax descriptor.
///
/// There is exactly one descriptor per known UID,
/// so descriptors can be compared by value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransferSyntax {
    uid: &'static str,
    name: &'static str,
    endianness: Endianness,
    explicit_vr: bool,
    compression: Compression,
}

impl TransferSyntax {
    const fn new(
        uid: &'static str,
        name: &'static str,
        endianness: Endianness,
        explicit_vr: bool,
        compression: Compression,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            endianness,
            explicit_vr,
            compression,
        }
    }

    /// Create a descriptor for an encapsulated pixel data transfer syntax,
    /// which is always explicit VR little endian.
    const fn new_encapsulated(
        uid: &'static str,
        name: &'static str,
        compression: Compression,
    ) -> Self {
        Self::new(uid, name, Endianness::Little, true, compression)
    }

    /// The transfer syntax UID, without padding.
    pub fn uid(&self) -> &'static str {
        self.uid
    }

    /// A human readable name of the transfer syntax.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The byte order of the data set.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Whether multi-byte values are stored in big endian.
    pub fn is_big_endian(&self) -> bool {
        self.endianness == Endianness::Big
    }

    /// Whether value representations are written in the data set.
    pub fn is_explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    /// The pixel data compression declared by this transfer syntax.
    pub fn compression(&self) -> Compression {
        self.compression
    }
}

impl fmt::Display for TransferSyntax {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.uid)
    }
}

/// Implicit VR Little Endian: Default Transfer Syntax for DICOM
pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2",
    "Implicit VR Little Endian",
    Endianness::Little,
    false,
    Compression::None,
);

/// Explicit VR Little Endian
pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.1",
    "Explicit VR Little Endian",
    Endianness::Little,
    true,
    Compression::None,
);

/// Explicit VR Big Endian
pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.2",
    "Explicit VR Big Endian",
    Endianness::Big,
    true,
    Compression::None,
);

/// JPEG Baseline (Process 1): Default Transfer Syntax for Lossy JPEG 8 Bit Image Compression
pub const JPEG_BASELINE: TransferSyntax = TransferSyntax::new_encapsulated(
    "1.2.840.10008.1.2.4.50",
    "JPEG Baseline (Process 1)",
    Compression::JpegBaseline,
);

/// JPEG Extended (Process 2 & 4)
pub const JPEG_EXTENDED: TransferSyntax = TransferSyntax::new_encapsulated(
    "1.2.840.10008.1.2.4.51",
    "JPEG Extended (Process 2 & 4)",
    Compression::JpegExtended,
);

/// JPEG Lossless, Non-Hierarchical (Process 14)
pub const JPEG_LOSSLESS_NON_HIERARCHICAL: TransferSyntax = TransferSyntax::new_encapsulated(
    "1.2.840.10008.1.2.4.57",
    "JPEG Lossless, Non-Hierarchical (Process 14)",
    Compression::JpegLossless,
);

/// JPEG Lossless, Non-Hierarchical, First-Order Prediction
/// (Process 14 [Selection Value 1]):
/// Default Transfer Syntax for Lossless JPEG Image Compression
pub const JPEG_LOSSLESS_NON_HIERARCHICAL_FIRST_ORDER_PREDICTION: TransferSyntax =
    TransferSyntax::new_encapsulated(
        "1.2.840.10008.1.2.4.70",
        "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
        Compression::JpegLosslessFirstOrder,
    );

/// JPEG-LS Lossless Image Compression
pub const JPEG_LS_LOSSLESS: TransferSyntax = TransferSyntax::new_encapsulated(
    "1.2.840.10008.1.2.4.80",
    "JPEG-LS Lossless Image Compression",
    Compression::JpegLsLossless,
);

/// JPEG-LS Lossy (Near-Lossless) Image Compression
pub const JPEG_LS_NEAR_LOSSLESS: TransferSyntax = TransferSyntax::new_encapsulated(
    "1.2.840.10008.1.2.4.81",
    "JPEG-LS Lossy (Near-Lossless) Image Compression",
    Compression::JpegLsNearLossless,
);

/// JPEG 2000 Image Compression (Lossless Only)
pub const JPEG_2000_LOSSLESS: TransferSyntax = TransferSyntax::new_encapsulated(
    "1.2.840.10008.1.2.4.90",
    "JPEG 2000 Image Compression (Lossless Only)",
    Compression::Jpeg2000Lossless,
);

/// JPEG 2000 Image Compression
pub const JPEG_2000: TransferSyntax = TransferSyntax::new_encapsulated(
    "1.2.840.10008.1.2.4.91",
    "JPEG 2000 Image Compression",
    Compression::Jpeg2000,
);

/// RLE Lossless
pub const RLE_LOSSLESS: TransferSyntax = TransferSyntax::new_encapsulated(
    "1.2.840.10008.1.2.5",
    "RLE Lossless",
    Compression::Rle,
);

static REGISTRY: [&TransferSyntax; 12] = [
    &IMPLICIT_VR_LITTLE_ENDIAN,
    &EXPLICIT_VR_LITTLE_ENDIAN,
    &EXPLICIT_VR_BIG_ENDIAN,
    &JPEG_BASELINE,
    &JPEG_EXTENDED,
    &JPEG_LOSSLESS_NON_HIERARCHICAL,
    &JPEG_LOSSLESS_NON_HIERARCHICAL_FIRST_ORDER_PREDICTION,
    &JPEG_LS_LOSSLESS,
    &JPEG_LS_NEAR_LOSSLESS,
    &JPEG_2000_LOSSLESS,
    &JPEG_2000,
    &RLE_LOSSLESS,
];

/// Remove the padding that may follow a UID:
/// trailing spaces, NUL, carriage returns, line feeds and tabs.
/// Interior characters are left untouched.
pub fn trim_uid(uid: &str) -> &str {
    uid.trim_end_matches(|c| matches!(c, ' ' | '\0' | '\r' | '\n' | '\t'))
}

/// Resolve a transfer syntax UID into its descriptor.
///
/// Trailing padding is ignored. Matching is otherwise exact.
/// Returns `None` if the transfer syntax is unknown.
pub fn resolve(uid: &str) -> Option<&'static TransferSyntax> {
    let uid = trim_uid(uid);
    REGISTRY.iter().copied().find(|ts| ts.uid == uid)
}

/// Iterate over all known transfer syntaxes.
pub fn known() -> impl Iterator<Item = &'static TransferSyntax> {
    REGISTRY.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn resolve_round_trip() {
        for ts in known() {
            assert_eq!(resolve(ts.uid()), Some(ts));
        }
    }

    #[rstest]
    #[case("\0")]
    #[case(" ")]
    #[case("\r\n")]
    #[case("\t")]
    #[case(" \0\0")]
    fn resolve_ignores_trailing_padding(#[case] padding: &str) {
        for ts in known() {
            let padded = format!("{}{}", ts.uid(), padding);
            assert_eq!(resolve(&padded), Some(ts), "padding {:?}", padding);
        }
    }

    #[test]
    fn resolve_is_exact() {
        assert_eq!(resolve("1.2.840.10008.1.2.4"), None);
        assert_eq!(resolve(" 1.2.840.10008.1.2"), None);
        assert_eq!(resolve("1.2.840.10008.1.2\u{0}1"), None);
        assert_eq!(resolve("1.2.840.10008.1.2.1.99"), None);
        assert_eq!(resolve(""), None);
    }

    #[test]
    fn descriptor_properties() {
        let ts = resolve("1.2.840.10008.1.2").unwrap();
        assert!(!ts.is_explicit_vr());
        assert!(!ts.is_big_endian());
        assert_eq!(ts.compression(), Compression::None);

        let ts = resolve("1.2.840.10008.1.2.2\0").unwrap();
        assert!(ts.is_explicit_vr());
        assert!(ts.is_big_endian());

        let ts = resolve("1.2.840.10008.1.2.4.70").unwrap();
        assert_eq!(ts.compression(), Compression::JpegLosslessFirstOrder);
        assert!(ts.compression().is_lossless());
        assert!(ts.compression().is_encapsulated());

        let ts = resolve("1.2.840.10008.1.2.4.91").unwrap();
        assert!(!ts.compression().is_lossless());
    }
}

//! Writer of small synthetic DICOM files for the integration tests.
#![allow(dead_code)]

pub const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";
pub const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

fn has_long_length(vr: &[u8; 2]) -> bool {
    matches!(
        vr,
        b"OB" | b"OD" | b"OF" | b"OL" | b"OV" | b"OW" | b"SQ" | b"SV" | b"UC" | b"UN" | b"UR"
            | b"UT" | b"UV"
    )
}

/// Encode one element in explicit VR little endian,
/// padding the value to an even length.
pub fn element(tag: (u16, u16), vr: &[u8; 2], value: &[u8]) -> Vec<u8> {
    let mut value = value.to_vec();
    if value.len() % 2 == 1 {
        value.push(if vr == b"UI" || vr == b"OB" { 0 } else { b' ' });
    }
    let mut out = Vec::with_capacity(12 + value.len());
    out.extend_from_slice(&tag.0.to_le_bytes());
    out.extend_from_slice(&tag.1.to_le_bytes());
    out.extend_from_slice(vr);
    if has_long_length(vr) {
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    } else {
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    }
    out.extend_from_slice(&value);
    out
}

/// Builder of a DICOM file with a preamble, a file meta group
/// and an explicit VR little endian data set.
///
/// Elements must be added in ascending tag order.
#[derive(Debug, Clone, Default)]
pub struct DicomBuilder {
    body: Vec<u8>,
}

impl DicomBuilder {
    pub fn new() -> Self {
        DicomBuilder::default()
    }

    pub fn text(mut self, tag: (u16, u16), vr: &[u8; 2], value: &str) -> Self {
        self.body.extend(element(tag, vr, value.as_bytes()));
        self
    }

    pub fn us(mut self, tag: (u16, u16), value: u16) -> Self {
        self.body.extend(element(tag, b"US", &value.to_le_bytes()));
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    /// Add native 16-bit pixel data.
    pub fn pixels16(self, pixels: &[u16]) -> Self {
        let bytes: Vec<u8> = pixels.iter().flat_map(|p| p.to_le_bytes()).collect();
        self.raw(&element((0x7FE0, 0x0010), b"OW", &bytes))
    }

    /// Add native 8-bit pixel data.
    pub fn pixels8(self, pixels: &[u8]) -> Self {
        self.raw(&element((0x7FE0, 0x0010), b"OB", pixels))
    }

    /// The data set alone, without preamble or file meta group.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn build(self) -> Vec<u8> {
        let mut meta = Vec::new();
        meta.extend(element((0x0002, 0x0001), b"OB", &[0, 1]));
        meta.extend(element((0x0002, 0x0002), b"UI", CT_IMAGE_STORAGE.as_bytes()));
        meta.extend(element((0x0002, 0x0010), b"UI", EXPLICIT_VR_LE.as_bytes()));

        let mut out = vec![0; 128];
        out.extend_from_slice(b"DICM");
        out.extend(element(
            (0x0002, 0x0000),
            b"UL",
            &(meta.len() as u32).to_le_bytes(),
        ));
        out.extend(meta);
        out.extend(self.body);
        out
    }
}

/// The image pixel module of a single frame grayscale image.
pub fn gray_image(builder: DicomBuilder, width: u16, height: u16, bits: u16) -> DicomBuilder {
    builder
        .us((0x0028, 0x0002), 1)
        .text((0x0028, 0x0004), b"CS", "MONOCHROME2")
        .us((0x0028, 0x0010), height)
        .us((0x0028, 0x0011), width)
        .us((0x0028, 0x0100), bits)
        .us((0x0028, 0x0101), bits)
        .us((0x0028, 0x0102), bits - 1)
        .us((0x0028, 0x0103), 0)
}

/// A 16-bit CT slice positioned at `z` along the patient axis.
pub fn ct_slice(width: u16, height: u16, z: f64, instance_number: u32, pixels: &[u16]) -> Vec<u8> {
    let builder = DicomBuilder::new()
        .text((0x0008, 0x0060), b"CS", "CT")
        .text((0x0008, 0x103E), b"LO", "AXIAL 5mm")
        .text((0x0010, 0x0010), b"PN", "Doe^Jane")
        .text((0x0010, 0x0020), b"LO", "PID-42")
        .text((0x0018, 0x0050), b"DS", "5")
        .text((0x0020, 0x000D), b"UI", "1.2.3.4")
        .text((0x0020, 0x000E), b"UI", "1.2.3.4.5")
        .text((0x0020, 0x0013), b"IS", &instance_number.to_string())
        .text((0x0020, 0x0032), b"DS", &format!("-100\\-100\\{}", z))
        .text((0x0020, 0x0037), b"DS", "1\\0\\0\\0\\1\\0");
    gray_image(builder, width, height, 16)
        .text((0x0028, 0x0030), b"DS", "0.5\\0.5")
        .text((0x0028, 0x1050), b"DS", "40")
        .text((0x0028, 0x1051), b"DS", "400")
        .text((0x0028, 0x1052), b"DS", "-1024")
        .text((0x0028, 0x1053), b"DS", "1")
        .pixels16(pixels)
        .build()
}

const SQ_UNDEFINED: [u8; 12] = [
    0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
];
const ITEM_UNDEFINED: [u8; 8] = [0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF];
const ITEM_DELIMITER: [u8; 8] = [0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00];
const SEQUENCE_DELIMITER: [u8; 8] = [0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00];

/// Referenced Image Sequence elements nested `levels` deep,
/// each holding a single item with the next sequence,
/// all of undefined length.
///
/// Without `terminated`, no delimiters are written.
pub fn nested_sequences(levels: usize, terminated: bool) -> Vec<u8> {
    let mut out = Vec::new();
    for level in 0..levels {
        out.extend_from_slice(&SQ_UNDEFINED);
        if level + 1 < levels {
            out.extend_from_slice(&ITEM_UNDEFINED);
        }
    }
    if terminated {
        out.extend_from_slice(&SEQUENCE_DELIMITER);
        for _ in 1..levels {
            out.extend_from_slice(&ITEM_DELIMITER);
            out.extend_from_slice(&SEQUENCE_DELIMITER);
        }
    }
    out
}

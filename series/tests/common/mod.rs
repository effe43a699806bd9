//! Writer of synthetic series slices for the integration tests.
#![allow(dead_code)]

use std::path::Path;

const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";
const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

fn element(tag: (u16, u16), vr: &[u8; 2], value: &[u8]) -> Vec<u8> {
    let mut value = value.to_vec();
    if value.len() % 2 == 1 {
        value.push(if vr == b"UI" || vr == b"OB" { 0 } else { b' ' });
    }
    let mut out = Vec::with_capacity(12 + value.len());
    out.extend_from_slice(&tag.0.to_le_bytes());
    out.extend_from_slice(&tag.1.to_le_bytes());
    out.extend_from_slice(vr);
    if matches!(vr, b"OB" | b"OW") {
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    } else {
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    }
    out.extend_from_slice(&value);
    out
}

fn text(body: &mut Vec<u8>, tag: (u16, u16), vr: &[u8; 2], value: &str) {
    body.extend(element(tag, vr, value.as_bytes()));
}

fn us(body: &mut Vec<u8>, tag: (u16, u16), value: u16) {
    body.extend(element(tag, b"US", &value.to_le_bytes()));
}

/// The attributes of one synthetic slice.
#[derive(Debug, Clone)]
pub struct SliceSpec {
    pub width: u16,
    pub height: u16,
    pub bits: u16,
    pub signed: bool,
    /// position along the patient z axis
    pub z: Option<f64>,
    pub instance_number: Option<u32>,
    pub orientation: Option<&'static str>,
    pub thickness: Option<&'static str>,
    /// the value of every sample
    pub fill: u16,
}

impl SliceSpec {
    /// A 4x4 16-bit axial slice at `z`, filled with `fill`.
    pub fn axial(z: f64, fill: u16) -> Self {
        SliceSpec {
            width: 4,
            height: 4,
            bits: 16,
            signed: false,
            z: Some(z),
            instance_number: None,
            orientation: Some("1\\0\\0\\0\\1\\0"),
            thickness: Some("5"),
            fill,
        }
    }

    /// A 4x4 16-bit slice without any geometry.
    pub fn flat(fill: u16) -> Self {
        SliceSpec {
            z: None,
            orientation: None,
            thickness: None,
            ..SliceSpec::axial(0., fill)
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        text(&mut body, (0x0008, 0x0060), b"CS", "CT");
        text(&mut body, (0x0008, 0x103E), b"LO", "AXIAL");
        if let Some(thickness) = self.thickness {
            text(&mut body, (0x0018, 0x0050), b"DS", thickness);
        }
        text(&mut body, (0x0020, 0x000E), b"UI", "1.2.3.4.5");
        if let Some(number) = self.instance_number {
            text(&mut body, (0x0020, 0x0013), b"IS", &number.to_string());
        }
        if let Some(z) = self.z {
            let position = format!("-100\\-100\\{}", z);
            text(&mut body, (0x0020, 0x0032), b"DS", &position);
        }
        if let Some(orientation) = self.orientation {
            text(&mut body, (0x0020, 0x0037), b"DS", orientation);
        }

        us(&mut body, (0x0028, 0x0002), 1);
        text(&mut body, (0x0028, 0x0004), b"CS", "MONOCHROME2");
        us(&mut body, (0x0028, 0x0010), self.height);
        us(&mut body, (0x0028, 0x0011), self.width);
        us(&mut body, (0x0028, 0x0100), self.bits);
        us(&mut body, (0x0028, 0x0101), self.bits);
        us(&mut body, (0x0028, 0x0102), self.bits - 1);
        us(&mut body, (0x0028, 0x0103), u16::from(self.signed));
        text(&mut body, (0x0028, 0x0030), b"DS", "0.5\\0.5");
        text(&mut body, (0x0028, 0x1052), b"DS", "-1024");
        text(&mut body, (0x0028, 0x1053), b"DS", "1");

        let count = usize::from(self.width) * usize::from(self.height);
        if self.bits == 8 {
            let pixels = vec![self.fill as u8; count];
            body.extend(element((0x7FE0, 0x0010), b"OB", &pixels));
        } else {
            let pixels: Vec<u8> = (0..count).flat_map(|_| self.fill.to_le_bytes()).collect();
            body.extend(element((0x7FE0, 0x0010), b"OW", &pixels));
        }
        file(body)
    }

    pub fn write(&self, dir: &Path, name: &str) {
        std::fs::write(dir.join(name), self.encode()).unwrap();
    }
}

/// Wrap a data set into a file with a preamble and a file meta group.
pub fn file(body: Vec<u8>) -> Vec<u8> {
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
    out.extend(body);
    out
}

/// A DICOM file with patient attributes only.
pub fn not_an_image() -> Vec<u8> {
    file(element((0x0010, 0x0010), b"PN", b"Doe^Jane"))
}

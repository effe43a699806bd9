#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications)]

//! This crate contains the high-level DICOM instance API of dcmstack.
//!
//! A [`DicomDecoder`] holds one DICOM instance:
//! the file buffer, its root element table, and caches built on demand.
//! All of this state sits behind a single lock per decoder,
//! so every accessor can be called from any number of threads,
//! including while a new file is being loaded into the same decoder.
//!
//! Only a few critical attributes are parsed while loading.
//! Every other attribute is parsed on first access
//! and kept in its parsed form from then on.
//!
//! # Examples
//!
//! Open a file and query some attributes:
//!
//! ```no_run
//! use dcmstack_object::{open_file, tags};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let decoder = open_file("0001.dcm")?;
//! let patient_name = decoder.info(tags::PATIENT_NAME);
//! let rows = decoder.int_value(tags::ROWS);
//! # Ok(())
//! # }
//! ```
//!
//! Fetch the pixels of a 16-bit image, in full or in part:
//!
//! ```no_run
//! # use dcmstack_object::open_file;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let decoder = open_file("0001.dcm")?;
//! if let Some(pixels) = decoder.pixels16() {
//!     println!("{} pixels", pixels.len());
//! }
//! let first_row = decoder.pixels16_range(0..512);
//! # Ok(())
//! # }
//! ```
//!
//! Skip the pixel data when only the metadata is needed:
//!
//! ```no_run
//! # use dcmstack_object::{OpenOptions, tags};
//! let decoder = OpenOptions::new()
//!     .read_until(tags::PIXEL_DATA)
//!     .open_file("0001.dcm")?;
//! # Result::<(), dcmstack_object::Error>::Ok(())
//! ```

pub mod decoder;
pub mod file;
pub mod records;

pub use crate::decoder::{DecoderStatus, DicomDecoder};
pub use crate::file::{open_file, OpenOptions};
pub use crate::records::{Geometry, PatientInfo, SeriesInfo, StudyInfo};
pub use dcmstack_core::{tags, DecodeLimits, Tag, Value};
pub use dcmstack_parser::{FileMetaTable, ReadPreamble};
pub use dcmstack_pixeldata::{ImageInfo, PixelBuffer, PixelKind, Rescale, WindowLevel};

use snafu::{Backtrace, Snafu};

/// An error which may occur when loading or decoding a DICOM instance.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not open file '{}'", filename.display()))]
    OpenFile {
        filename: std::path::PathBuf,
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("Could not parse DICOM data"))]
    ParseFile {
        #[snafu(backtrace)]
        source: dcmstack_parser::Error,
    },
    /// No instance is loaded
    NotLoaded { backtrace: Backtrace },
    /// The instance has no pixel data
    MissingPixelData { backtrace: Backtrace },
    #[snafu(display("Could not read image attributes"))]
    ImageAttributes {
        #[snafu(backtrace)]
        source: dcmstack_pixeldata::GetAttributeError,
    },
    #[snafu(display("Could not extract pixel data"))]
    ExtractPixelData {
        #[snafu(backtrace)]
        source: dcmstack_pixeldata::Error,
    },
}

impl Error {
    /// Whether the error comes from the file system
    /// rather than from the content of the data.
    ///
    /// Such errors may go away if the operation is retried.
    pub fn is_resource_error(&self) -> bool {
        matches!(self, Error::OpenFile { .. })
    }

    /// Whether the data could not be parsed as DICOM.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Error::ParseFile { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

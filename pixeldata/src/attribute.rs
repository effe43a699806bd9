//! Utility module for fetching key image attributes from a data set.

use dcmstack_core::limits::{BoundsError, DecodeLimits};
use dcmstack_core::value::ConvertValueError;
use dcmstack_core::{tags, Tag};
use dcmstack_parser::DataSet;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum GetAttributeError {
    #[snafu(display("Missing required attribute `{}`", name))]
    MissingRequiredField {
        name: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not convert attribute `{}`", name))]
    ConvertValue {
        name: &'static str,
        source: ConvertValueError,
        backtrace: Backtrace,
    },

    #[snafu(display("Semantically invalid value `{}` for attribute `{}`", value, name))]
    InvalidValue {
        name: &'static str,
        value: String,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = GetAttributeError> = std::result::Result<T, E>;

/// An interpreted representation of the DICOM _Pixel Representation_ attribute.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub enum PixelRepresentation {
    /// unsigned pixel data sample values
    #[default]
    Unsigned,
    /// signed pixel data sample values
    Signed,
}

/// The sample layouts which can be extracted into a pixel buffer.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum PixelKind {
    /// one 8-bit sample per pixel
    Gray8,
    /// one 16-bit sample per pixel
    Gray16,
    /// three 8-bit samples per pixel
    Rgb24,
}

/// The image pixel attributes needed to interpret pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// Rows
    pub rows: u16,
    /// Columns
    pub cols: u16,
    /// Samples per Pixel
    pub samples_per_pixel: u16,
    /// Bits Allocated
    pub bits_allocated: u16,
    /// Bits Stored
    pub bits_stored: u16,
    /// Pixel Representation
    pub pixel_representation: PixelRepresentation,
    /// Planar Configuration (0: interleaved, 1: one plane per sample)
    pub planar_configuration: u16,
    /// Number of Frames
    pub number_of_frames: u32,
    /// Photometric Interpretation, without padding
    pub photometric_interpretation: String,
}

impl ImageInfo {
    /// Gather the image attributes of a data set,
    /// read from the given buffer.
    ///
    /// Rows, Columns and Bits Allocated are required.
    /// The other attributes fall back to the values
    /// of a single frame monochrome image if absent.
    pub fn from_dataset(dataset: &DataSet, data: &[u8]) -> Result<Self> {
        let rows = retrieve_required_u16(dataset, data, tags::ROWS, "Rows")?;
        let cols = retrieve_required_u16(dataset, data, tags::COLUMNS, "Columns")?;
        let bits_allocated =
            retrieve_required_u16(dataset, data, tags::BITS_ALLOCATED, "BitsAllocated")?;
        let bits_stored = retrieve_optional_u16(dataset, data, tags::BITS_STORED, "BitsStored")?
            .unwrap_or(bits_allocated);
        let samples_per_pixel =
            retrieve_optional_u16(dataset, data, tags::SAMPLES_PER_PIXEL, "SamplesPerPixel")?
                .unwrap_or(1);
        ensure!(
            samples_per_pixel > 0,
            InvalidValueSnafu {
                name: "SamplesPerPixel",
                value: "0",
            }
        );
        let planar_configuration = retrieve_optional_u16(
            dataset,
            data,
            tags::PLANAR_CONFIGURATION,
            "PlanarConfiguration",
        )?
        .unwrap_or(0);
        let pixel_representation = pixel_representation(dataset, data)?;
        let number_of_frames = number_of_frames(dataset, data)?;
        let photometric_interpretation = dataset
            .value(tags::PHOTOMETRIC_INTERPRETATION, data)
            .map(|v| v.to_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                if samples_per_pixel == 3 {
                    "RGB".to_string()
                } else {
                    "MONOCHROME2".to_string()
                }
            });

        Ok(ImageInfo {
            rows,
            cols,
            samples_per_pixel,
            bits_allocated,
            bits_stored,
            pixel_representation,
            planar_configuration,
            number_of_frames,
            photometric_interpretation,
        })
    }

    /// The number of bytes of each sample.
    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_allocated / 8 + u16::from(self.bits_allocated % 8 != 0)
    }

    /// The number of pixels of one frame.
    pub fn pixel_count(&self) -> usize {
        usize::from(self.rows) * usize::from(self.cols)
    }

    /// The number of samples of one frame.
    pub fn samples_per_frame(&self) -> usize {
        self.pixel_count() * usize::from(self.samples_per_pixel)
    }

    /// The layout of the extracted pixel buffer,
    /// or `None` if the sample layout is not supported.
    pub fn kind(&self) -> Option<PixelKind> {
        match (self.samples_per_pixel, self.bits_allocated) {
            (1, 8) => Some(PixelKind::Gray8),
            (1, 16) => Some(PixelKind::Gray16),
            (3, 8) => Some(PixelKind::Rgb24),
            _ => None,
        }
    }

    /// Check the dimensions of the image against the decoding limits,
    /// returning the size of one frame in bytes.
    pub fn check_frame_size(&self, limits: &DecodeLimits) -> Result<u64, BoundsError> {
        limits.check_dimensions(u32::from(self.cols), u32::from(self.rows))?;
        limits.check_pixel_buffer(
            u32::from(self.cols),
            u32::from(self.rows),
            self.samples_per_pixel,
            self.bytes_per_sample(),
        )
    }
}

/// Get the PixelRepresentation from the data set, unsigned by default
pub fn pixel_representation(dataset: &DataSet, data: &[u8]) -> Result<PixelRepresentation> {
    let p = retrieve_optional_u16(
        dataset,
        data,
        tags::PIXEL_REPRESENTATION,
        "PixelRepresentation",
    )?;

    match p {
        None | Some(0) => Ok(PixelRepresentation::Unsigned),
        Some(1) => Ok(PixelRepresentation::Signed),
        Some(p) => InvalidValueSnafu {
            name: "PixelRepresentation",
            value: p.to_string(),
        }
        .fail(),
    }
}

/// Get the NumberOfFrames from the data set,
/// returning 1 if it is not present
pub fn number_of_frames(dataset: &DataSet, data: &[u8]) -> Result<u32> {
    let Some(value) = dataset.value(tags::NUMBER_OF_FRAMES, data) else {
        return Ok(1);
    };
    if value.is_empty() {
        return Ok(1);
    }

    let integer = value.to_int::<i32>().context(ConvertValueSnafu {
        name: "NumberOfFrames",
    })?;

    ensure!(
        integer > 0,
        InvalidValueSnafu {
            name: "NumberOfFrames",
            value: integer.to_string(),
        }
    );

    Ok(integer as u32)
}

#[inline]
fn retrieve_required_u16(
    dataset: &DataSet,
    data: &[u8],
    tag: Tag,
    name: &'static str,
) -> Result<u16> {
    retrieve_optional_u16(dataset, data, tag, name)?.context(MissingRequiredFieldSnafu { name })
}

#[inline]
fn retrieve_optional_u16(
    dataset: &DataSet,
    data: &[u8],
    tag: Tag,
    name: &'static str,
) -> Result<Option<u16>> {
    match dataset.value(tag, data) {
        None => Ok(None),
        Some(value) if value.is_empty() => Ok(None),
        Some(value) => value
            .to_int::<u16>()
            .context(ConvertValueSnafu { name })
            .map(Some),
    }
}

#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications)]

//! This crate assembles the slices of a DICOM image series
//! into a single voxel volume.
//!
//! Each file of the series is loaded into its own [`DicomDecoder`].
//! The slices are then ordered along the normal of their image planes,
//! checked for consistent dimensions, orientation and pixel representation,
//! and copied one after the other into a [`DicomSeriesVolume`].
//! Any inconsistency aborts the whole assembly.
//!
//! # Example
//!
//! ```no_run
//! use dcmstack_series::{SeriesLoader, SeriesOptions};
//! use std::ops::ControlFlow;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = SeriesLoader::new(SeriesOptions::default());
//! let volume = loader.load_directory("ct-series/", |progress| {
//!     println!("{:.0}%", progress.fraction * 100.);
//!     ControlFlow::Continue(())
//! })?;
//! println!(
//!     "{}x{}x{} voxels, spacing {:?}",
//!     volume.width, volume.height, volume.depth, volume.spacing
//! );
//! # Ok(())
//! # }
//! ```
//!
//! [`DicomDecoder`]: dcmstack_object::DicomDecoder

use snafu::{Backtrace, Snafu};
use std::path::PathBuf;

mod loader;
mod natural;
mod progress;
mod volume;

pub use loader::{load_directory, SeriesLoader, SeriesOptions};
pub use natural::natural_cmp;
pub use progress::{CancelToken, SeriesProgress};
pub use volume::{DicomSeriesVolume, Voxel, Voxels};

/// An error which may occur when assembling a series.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not list directory '{}'", path.display()))]
    ReadDirectory {
        path: PathBuf,
        backtrace: Backtrace,
        source: std::io::Error,
    },
    /// No slices to assemble
    NoFiles { backtrace: Backtrace },
    #[snafu(display("Could not load slice '{}'", name))]
    LoadSlice {
        name: String,
        #[snafu(backtrace)]
        source: dcmstack_object::Error,
    },
    #[snafu(display("Slice '{}' is not an image", name))]
    NotAnImage { name: String, backtrace: Backtrace },
    #[snafu(display(
        "Slice '{}' has unsupported layout: {} samples per pixel, {} bits allocated",
        name,
        samples_per_pixel,
        bits_allocated
    ))]
    UnsupportedLayout {
        name: String,
        samples_per_pixel: u16,
        bits_allocated: u16,
        backtrace: Backtrace,
    },
    #[snafu(display(
        "Slice '{}' is {}x{}, expected {}x{}",
        name,
        found.0,
        found.1,
        expected.0,
        expected.1
    ))]
    InconsistentDimensions {
        name: String,
        expected: (u16, u16),
        found: (u16, u16),
        backtrace: Backtrace,
    },
    #[snafu(display("Slice '{}' has an orientation different from the rest of the series", name))]
    InconsistentOrientation { name: String, backtrace: Backtrace },
    #[snafu(display(
        "Slice '{}' has {} bits allocated ({}), expected {} ({})",
        name,
        found.0,
        if found.1 { "signed" } else { "unsigned" },
        expected.0,
        if expected.1 { "signed" } else { "unsigned" }
    ))]
    InconsistentPixelRepresentation {
        name: String,
        expected: (u16, bool),
        found: (u16, bool),
        backtrace: Backtrace,
    },
    #[snafu(display("Volume of {} slices of {}x{} does not fit in memory", depth, width, height))]
    VolumeTooLarge {
        width: u16,
        height: u16,
        depth: usize,
        backtrace: Backtrace,
    },
    /// Assembly was cancelled
    Cancelled { backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Error types for reading whole DICOM files.
use crate::{dataset, meta};
use snafu::{Backtrace, Snafu};

#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The data does not start with a preamble and DICM magic code,
    /// and no transfer syntax was given for reading it as a raw data set.
    #[snafu(display("Not a DICOM file: magic code `DICM` not found"))]
    NotDicom { backtrace: Backtrace },
    /// Could not read the file meta group.
    #[snafu(display("Could not read file meta group"))]
    ReadMeta {
        #[snafu(backtrace)]
        source: meta::Error,
    },
    /// The transfer syntax of the file is not supported.
    #[snafu(display("Unsupported transfer syntax `{}`", uid))]
    UnknownTransferSyntax { uid: String, backtrace: Backtrace },
    /// Could not read the main data set.
    #[snafu(display("Could not read data set"))]
    ReadDataSet {
        #[snafu(backtrace)]
        source: dataset::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

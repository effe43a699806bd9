//! Options for loading DICOM instances from files or memory.
use crate::decoder::DicomDecoder;
use crate::{OpenFileSnafu, Result};
use dcmstack_core::limits::DecodeLimits;
use dcmstack_core::transfer_syntax::TransferSyntax;
use dcmstack_core::Tag;
use dcmstack_parser::{FileReadOptions, ReadOptions, ReadPreamble};
use snafu::ResultExt;
use std::path::Path;
use std::sync::Arc;

/// Open the DICOM file at the given path with the default options.
pub fn open_file<P>(path: P) -> Result<DicomDecoder>
where
    P: AsRef<Path>,
{
    OpenOptions::new().open_file(path)
}

/// A builder type for loading a DICOM instance with additional options.
///
/// # Example
///
/// Create an `OpenOptions`,
/// call adaptor methods in a chain,
/// and finish the operation with [`.open_file()`](OpenOptions::open_file).
///
/// ```no_run
/// # use dcmstack_object::{OpenOptions, DecodeLimits, ReadPreamble};
/// let decoder = OpenOptions::new()
///     .read_preamble(ReadPreamble::Always)
///     .limits(DecodeLimits::default().with_max_sequence_depth(8))
///     .open_file("path/to/file.dcm")?;
/// # Result::<(), dcmstack_object::Error>::Ok(())
/// ```
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub struct OpenOptions {
    read_preamble: ReadPreamble,
    limits: DecodeLimits,
    read_until: Option<Tag>,
    fallback_transfer_syntax: Option<&'static TransferSyntax>,
}

impl OpenOptions {
    pub fn new() -> Self {
        OpenOptions::default()
    }

    /// Set whether to expect the 128-byte DICOM file preamble.
    pub fn read_preamble(mut self, option: ReadPreamble) -> Self {
        self.read_preamble = option;
        self
    }

    /// Set the decoding limits to enforce,
    /// both while parsing and while extracting pixel data.
    pub fn limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the operation to read only until the given tag is found.
    ///
    /// The reading process ends immediately before this tag,
    /// or any other tag that is next in the standard DICOM tag ordering,
    /// is found in the root data set.
    /// An element with the exact tag will be excluded from the output.
    pub fn read_until(mut self, tag: Tag) -> Self {
        self.read_until = Some(tag);
        self
    }

    /// Set the operation to read all elements of the data set to the end.
    ///
    /// This is the default behavior.
    pub fn read_all(mut self) -> Self {
        self.read_until = None;
        self
    }

    /// Set the transfer syntax of data sets without a file meta group.
    ///
    /// Such data sets are only accepted
    /// together with [`ReadPreamble::Never`].
    pub fn fallback_transfer_syntax(mut self, ts: &'static TransferSyntax) -> Self {
        self.fallback_transfer_syntax = Some(ts);
        self
    }

    /// The decoding limits in use.
    pub fn decode_limits(&self) -> DecodeLimits {
        self.limits
    }

    pub(crate) fn file_read_options(&self) -> FileReadOptions {
        FileReadOptions {
            read_preamble: self.read_preamble,
            read_options: ReadOptions {
                limits: self.limits,
                read_until: self.read_until,
            },
            fallback_transfer_syntax: self.fallback_transfer_syntax,
        }
    }

    /// Open the file at the given path.
    pub fn open_file<P>(self, path: P) -> Result<DicomDecoder>
    where
        P: AsRef<Path>,
    {
        let decoder = DicomDecoder::new();
        self.load_into(&decoder, path)?;
        Ok(decoder)
    }

    /// Obtain a decoder for DICOM data already in memory.
    pub fn from_bytes<B>(self, bytes: B) -> Result<DicomDecoder>
    where
        B: Into<Arc<[u8]>>,
    {
        let decoder = DicomDecoder::new();
        self.load_bytes_into(&decoder, bytes)?;
        Ok(decoder)
    }

    /// Load the file at the given path into an existing decoder,
    /// replacing whatever it held before.
    ///
    /// If the file cannot be read or parsed,
    /// the decoder is left empty.
    pub fn load_into<P>(self, decoder: &DicomDecoder, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let generation = decoder.begin_load();
        let data = match std::fs::read(path).context(OpenFileSnafu { filename: path }) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("{}", e);
                return Err(e);
            }
        };
        decoder.finish_load(generation, Arc::from(data), Some(path.to_path_buf()), &self)
    }

    /// Load DICOM data already in memory into an existing decoder,
    /// replacing whatever it held before.
    ///
    /// If the data cannot be parsed, the decoder is left empty.
    pub fn load_bytes_into<B>(self, decoder: &DicomDecoder, bytes: B) -> Result<()>
    where
        B: Into<Arc<[u8]>>,
    {
        let generation = decoder.begin_load();
        decoder.finish_load(generation, bytes.into(), None, &self)
    }
}

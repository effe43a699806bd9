//! Reading of complete DICOM files from memory:
//! preamble detection, file meta group and main data set.
use crate::dataset::{DataSet, ReadOptions};
use crate::error::{
    NotDicomSnafu, ReadDataSetSnafu, ReadMetaSnafu, Result, UnknownTransferSyntaxSnafu,
};
use crate::meta::{detect_magic, FileMetaTable, DICM_MAGIC_CODE, PREAMBLE_LEN};
use dcmstack_core::transfer_syntax::{self, TransferSyntax};
use snafu::{OptionExt, ResultExt};
use tracing::{debug, warn};

/// An enumerate of supported options for
/// whether to expect the 128-byte DICOM file preamble.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub enum ReadPreamble {
    /// Look for the magic code after a preamble first,
    /// then at the very beginning of the data.
    #[default]
    Auto,
    /// Always expect the preamble.
    Always,
    /// Never expect the preamble.
    ///
    /// Data which does not start with the magic code
    /// is read as a raw data set if a fallback transfer syntax is given.
    Never,
}

/// Options for reading a DICOM file.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct FileReadOptions {
    /// whether to expect a preamble
    pub read_preamble: ReadPreamble,
    /// options for reading the main data set
    pub read_options: ReadOptions,
    /// transfer syntax of data without a file meta group
    pub fallback_transfer_syntax: Option<&'static TransferSyntax>,
}

/// The outcome of reading a DICOM file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    /// the file meta group, absent for raw data sets
    pub meta: Option<FileMetaTable>,
    /// the transfer syntax of the main data set
    pub transfer_syntax: &'static TransferSyntax,
    /// the main data set
    pub dataset: DataSet,
}

/// Read a DICOM file held entirely in memory.
pub fn read_file(data: &[u8], options: &FileReadOptions) -> Result<ParsedFile> {
    let limits = &options.read_options.limits;

    let meta_start = match options.read_preamble {
        ReadPreamble::Auto => detect_magic(data),
        ReadPreamble::Always => {
            if data.get(PREAMBLE_LEN..PREAMBLE_LEN + 4) == Some(&DICM_MAGIC_CODE[..]) {
                Some(PREAMBLE_LEN + 4)
            } else {
                None
            }
        }
        ReadPreamble::Never => {
            if data.get(0..4) == Some(&DICM_MAGIC_CODE[..]) {
                Some(4)
            } else {
                None
            }
        }
    };

    let (meta, ts, start) = match meta_start {
        Some(start) => {
            let meta = FileMetaTable::read(data, start, limits).context(ReadMetaSnafu)?;
            let ts = transfer_syntax::resolve(&meta.transfer_syntax).context(
                UnknownTransferSyntaxSnafu {
                    uid: meta.transfer_syntax.clone(),
                },
            )?;
            debug!("Transfer syntax: {} ({})", ts.uid(), ts.name());
            let start = meta.data_set_offset;
            (Some(meta), ts, start)
        }
        None => {
            let ts = options
                .fallback_transfer_syntax
                .filter(|_| options.read_preamble == ReadPreamble::Never)
                .context(NotDicomSnafu)?;
            warn!("No file meta group, reading raw data set as {}", ts.name());
            (None, ts, 0)
        }
    };

    let dataset =
        DataSet::read(data, start, ts, options.read_options).context(ReadDataSetSnafu)?;

    Ok(ParsedFile {
        meta,
        transfer_syntax: ts,
        dataset,
    })
}

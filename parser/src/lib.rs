#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications)]

//! This crate provides the hardened decoding layer of dcmstack:
//! reading DICOM data sets from an in-memory buffer
//! without ever reading past its end.
//!
//! - [`stateful`] walks the buffer and decodes element and item headers;
//! - [`dataset`] turns the headers into a stream of tokens,
//!   enforcing sequence nesting and length limits,
//!   and builds the root element table from them;
//! - [`meta`] reads the file meta group;
//! - [`file`] ties everything together for whole DICOM files.

pub mod dataset;
pub mod error;
pub mod file;
pub mod meta;
pub mod stateful;

pub use dataset::{
    DataSet, DataToken, Element, ElementValue, Fragment, LazyDataSetReader, PixelDataLocation,
    ReadOptions, TagMetadata,
};
pub use error::{Error, Result};
pub use file::{read_file, FileReadOptions, ParsedFile, ReadPreamble};
pub use meta::FileMetaTable;
pub use stateful::decode::StatefulDecoder;

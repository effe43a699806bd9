#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(missing_debug_implementations, unused_qualifications)]

//! This is the core library of dcmstack, a hardened DICOM decoder.
//!
//! It contains the types shared by the rest of the workspace:
//!
//! - [`header`] holds the data element header types
//!   ([`Tag`], [`VR`], [`Length`]);
//! - [`dictionary`] is a static attribute dictionary,
//!   used to infer value representations in implicit VR data sets
//!   and to tell which attributes are parsed eagerly;
//! - [`tags`] declares constants for the attributes known to the dictionary;
//! - [`transfer_syntax`] lists the supported transfer syntaxes
//!   and resolves transfer syntax UIDs;
//! - [`limits`] holds the bounds checks applied before any allocation;
//! - [`value`] holds realized element values
//!   and the rules for parsing them from raw bytes.

pub mod dictionary;
pub mod header;
pub mod limits;
pub mod tags;
pub mod transfer_syntax;
pub mod value;

pub use dictionary::Criticality;
pub use header::{DataElementHeader, Length, SequenceItemHeader, Tag, VR};
pub use limits::DecodeLimits;
pub use transfer_syntax::{Compression, TransferSyntax};
pub use value::Value;

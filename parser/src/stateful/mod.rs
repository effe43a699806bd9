//! Stateful decoding of DICOM data over an in-memory buffer.
pub mod decode;

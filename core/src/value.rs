//! Realized DICOM values and the rules for parsing them from raw bytes.
//!
//! See [`Value`].

use crate::header::{Tag, VR};
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use chrono::NaiveDate;
use itertools::Itertools;
use num_traits::NumCast;
use smallvec::SmallVec;
use snafu::Snafu;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// An aggregation of one or more elements in a value.
pub type C<T> = SmallVec<[T; 2]>;

/// A value could not be converted into the requested type.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[non_exhaustive]
pub enum ConvertValueError {
    /// cannot convert a {original} value into {requested}
    Incompatible {
        requested: &'static str,
        original: &'static str,
    },
    /// could not parse {requested} from `{text}`
    Parse { requested: &'static str, text: String },
    /// value {value} does not fit in the requested {requested} type
    NarrowConvert { requested: &'static str, value: String },
}

/// The realized value of a data element.
///
/// Multiple values are held in a [`smallvec`] vector,
/// aliased to the type [`C`].
///
/// # Example
///
/// ```
/// # use dcmstack_core::value::Value;
/// # use dcmstack_core::VR;
/// # use byteordered::Endianness;
/// let value = Value::from_bytes(VR::DS, b"0.5\\0.25 ", Endianness::Little);
/// assert_eq!(value.multiplicity(), 2);
/// assert_eq!(value.to_float64(), Ok(0.5));
/// assert_eq!(value.to_str(), "0.5\\0.25");
/// ```
///
/// [`smallvec`]: https://docs.rs/smallvec
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No data. Used for zero-length values and sequences.
    Empty,
    /// A sequence of strings.
    /// Used for AE, AS, CS, DA, DS, DT, IS, LO, PN, SH, TM, UC and UI.
    Strs(C<String>),
    /// A single string.
    /// Used for ST, LT, UT and UR, which are never multi-valued.
    Str(String),
    /// A sequence of attribute tags. Used for AT.
    Tags(C<Tag>),
    /// A sequence of bytes. Used for OB and UN.
    U8(C<u8>),
    /// Used for SS.
    I16(C<i16>),
    /// Used for US and OW.
    U16(C<u16>),
    /// Used for SL.
    I32(C<i32>),
    /// Used for UL and OL.
    U32(C<u32>),
    /// Used for SV.
    I64(C<i64>),
    /// Used for UV and OV.
    U64(C<u64>),
    /// Used for FL and OF.
    F32(C<f32>),
    /// Used for FD and OD.
    F64(C<f64>),
}

macro_rules! read_numbers {
    ($bytes: expr, $endianness: expr, $width: expr, $read: ident) => {
        $bytes
            .chunks_exact($width)
            .map(|chunk| match $endianness {
                Endianness::Little => LittleEndian::$read(chunk),
                Endianness::Big => BigEndian::$read(chunk),
            })
            .collect()
    };
}

/// Whether a textual representation may hold multiple values
/// separated by backslashes.
fn is_multi_valued_text(vr: VR) -> bool {
    !matches!(vr, VR::ST | VR::LT | VR::UT | VR::UR)
}

fn trim_text(vr: VR, text: &str) -> &str {
    match vr {
        // leading spaces are significant in free text
        VR::ST | VR::LT | VR::UT => text.trim_end_matches([' ', '\0']),
        VR::UI => text.trim_matches(['\0', ' ']),
        _ => text.trim_matches([' ', '\0']),
    }
}

impl Value {
    /// Parse a value from its raw encoded bytes,
    /// following the rules of the given value representation.
    ///
    /// Text is decoded leniently: invalid UTF-8 sequences are replaced,
    /// padding is removed and multiple values are split on `\`.
    /// Binary numbers are read with the given byte order,
    /// and trailing bytes which do not form a whole number are ignored.
    pub fn from_bytes(vr: VR, bytes: &[u8], endianness: Endianness) -> Value {
        if bytes.is_empty() {
            return Value::Empty;
        }

        if vr.is_textual() {
            let text = String::from_utf8_lossy(bytes);
            if is_multi_valued_text(vr) {
                let values: C<String> = text
                    .split('\\')
                    .map(|part| trim_text(vr, part).to_string())
                    .collect();
                if values.len() == 1 && values[0].is_empty() {
                    return Value::Empty;
                }
                return Value::Strs(values);
            }
            let text = trim_text(vr, &text);
            if text.is_empty() {
                return Value::Empty;
            }
            return Value::Str(text.to_string());
        }

        match vr {
            VR::SQ => Value::Empty,
            VR::US | VR::OW => Value::U16(read_numbers!(bytes, endianness, 2, read_u16)),
            VR::SS => Value::I16(read_numbers!(bytes, endianness, 2, read_i16)),
            VR::UL | VR::OL => Value::U32(read_numbers!(bytes, endianness, 4, read_u32)),
            VR::SL => Value::I32(read_numbers!(bytes, endianness, 4, read_i32)),
            VR::UV | VR::OV => Value::U64(read_numbers!(bytes, endianness, 8, read_u64)),
            VR::SV => Value::I64(read_numbers!(bytes, endianness, 8, read_i64)),
            VR::FL | VR::OF => Value::F32(read_numbers!(bytes, endianness, 4, read_f32)),
            VR::FD | VR::OD => Value::F64(read_numbers!(bytes, endianness, 8, read_f64)),
            VR::AT => {
                let tags: C<u16> = read_numbers!(bytes, endianness, 2, read_u16);
                Value::Tags(
                    tags.chunks_exact(2)
                        .map(|pair| Tag(pair[0], pair[1]))
                        .collect(),
                )
            }
            _ => Value::U8(bytes.iter().copied().collect()),
        }
    }

    /// A short name of the kind of value held.
    pub fn value_type(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::Strs(_) => "strings",
            Value::Str(_) => "string",
            Value::Tags(_) => "tags",
            Value::U8(_) => "u8",
            Value::I16(_) => "i16",
            Value::U16(_) => "u16",
            Value::I32(_) => "i32",
            Value::U32(_) => "u32",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
        }
    }

    /// The number of individual values held.
    pub fn multiplicity(&self) -> u32 {
        let count = match self {
            Value::Empty => 0,
            Value::Str(_) => 1,
            Value::Strs(c) => c.len(),
            Value::Tags(c) => c.len(),
            Value::U8(c) => c.len(),
            Value::I16(c) => c.len(),
            Value::U16(c) => c.len(),
            Value::I32(c) => c.len(),
            Value::U32(c) => c.len(),
            Value::I64(c) => c.len(),
            Value::U64(c) => c.len(),
            Value::F32(c) => c.len(),
            Value::F64(c) => c.len(),
        };
        count as u32
    }

    /// Whether the value holds no data.
    pub fn is_empty(&self) -> bool {
        self.multiplicity() == 0
    }

    /// Convert the full value into a string.
    ///
    /// Multiple values are joined with a backslash (`'\\'`).
    pub fn to_str(&self) -> Cow<str> {
        match self {
            Value::Empty => Cow::from(""),
            Value::Str(value) => Cow::from(value.as_str()),
            Value::Strs(values) if values.len() == 1 => Cow::from(values[0].as_str()),
            value => Cow::from(value.to_string()),
        }
    }

    /// Retrieve the first value as an integer.
    ///
    /// Strings are parsed after trimming.
    /// A decimal string holding a whole number (such as `"512.0"`)
    /// is also accepted.
    pub fn to_int<T>(&self) -> Result<T, ConvertValueError>
    where
        T: NumCast + FromStr,
    {
        fn narrow<T: NumCast, N: ToString + NumCast + Copy>(
            n: N,
        ) -> Result<T, ConvertValueError> {
            T::from(n).ok_or_else(|| ConvertValueError::NarrowConvert {
                requested: "integer",
                value: n.to_string(),
            })
        }

        match self {
            Value::Str(s) => parse_int(s),
            Value::Strs(s) if !s.is_empty() => parse_int(&s[0]),
            Value::U8(c) if !c.is_empty() => narrow(c[0]),
            Value::I16(c) if !c.is_empty() => narrow(c[0]),
            Value::U16(c) if !c.is_empty() => narrow(c[0]),
            Value::I32(c) if !c.is_empty() => narrow(c[0]),
            Value::U32(c) if !c.is_empty() => narrow(c[0]),
            Value::I64(c) if !c.is_empty() => narrow(c[0]),
            Value::U64(c) if !c.is_empty() => narrow(c[0]),
            _ => IncompatibleSnafu {
                requested: "integer",
                original: self.value_type(),
            }
            .fail(),
        }
    }

    /// Retrieve the first value as a double precision floating point number.
    pub fn to_float64(&self) -> Result<f64, ConvertValueError> {
        self.to_multi_float64().and_then(|values| {
            values.first().copied().ok_or_else(|| ConvertValueError::Incompatible {
                requested: "float64",
                original: self.value_type(),
            })
        })
    }

    /// Retrieve all values as double precision floating point numbers.
    pub fn to_multi_float64(&self) -> Result<C<f64>, ConvertValueError> {
        fn all<N: Into<f64> + Copy>(c: &[N]) -> C<f64> {
            c.iter().map(|&n| n.into()).collect()
        }

        match self {
            Value::Str(s) => Ok(std::iter::once(parse_float(s)?).collect()),
            Value::Strs(s) => s.iter().map(|s| parse_float(s)).collect(),
            Value::U8(c) => Ok(all(c)),
            Value::I16(c) => Ok(all(c)),
            Value::U16(c) => Ok(all(c)),
            Value::I32(c) => Ok(all(c)),
            Value::U32(c) => Ok(all(c)),
            Value::I64(c) => Ok(c.iter().map(|&n| n as f64).collect()),
            Value::U64(c) => Ok(c.iter().map(|&n| n as f64).collect()),
            Value::F32(c) => Ok(all(c)),
            Value::F64(c) => Ok(c.clone()),
            Value::Empty | Value::Tags(_) => IncompatibleSnafu {
                requested: "float64",
                original: self.value_type(),
            }
            .fail(),
        }
    }

    /// Retrieve the first value as a calendar date.
    ///
    /// Both `YYYYMMDD` and the legacy `YYYY.MM.DD` form are accepted.
    pub fn to_date(&self) -> Result<NaiveDate, ConvertValueError> {
        let text = match self {
            Value::Str(s) => s.as_str(),
            Value::Strs(s) if !s.is_empty() => s[0].as_str(),
            _ => {
                return IncompatibleSnafu {
                    requested: "date",
                    original: self.value_type(),
                }
                .fail()
            }
        };
        NaiveDate::parse_from_str(text, "%Y%m%d")
            .or_else(|_| NaiveDate::parse_from_str(text, "%Y.%m.%d"))
            .map_err(|_| ConvertValueError::Parse {
                requested: "date",
                text: text.to_string(),
            })
    }
}

fn parse_int<T>(text: &str) -> Result<T, ConvertValueError>
where
    T: NumCast + FromStr,
{
    let text = text.trim();
    if let Ok(value) = text.parse::<T>() {
        return Ok(value);
    }
    // accept whole numbers written as decimals
    match text.parse::<f64>() {
        Ok(value) if value.fract() == 0. => {
            T::from(value).ok_or_else(|| ConvertValueError::NarrowConvert {
                requested: "integer",
                value: text.to_string(),
            })
        }
        _ => ParseSnafu {
            requested: "integer",
            text,
        }
        .fail(),
    }
}

fn parse_float(text: &str) -> Result<f64, ConvertValueError> {
    let text = text.trim();
    text.parse().map_err(|_| ConvertValueError::Parse {
        requested: "float64",
        text: text.to_string(),
    })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Str(value) => f.write_str(value),
            Value::Strs(values) => write!(f, "{}", values.iter().join("\\")),
            Value::Tags(values) => write!(f, "{}", values.iter().join("\\")),
            Value::U8(values) => write!(f, "{}", values.iter().join("\\")),
            Value::I16(values) => write!(f, "{}", values.iter().join("\\")),
            Value::U16(values) => write!(f, "{}", values.iter().join("\\")),
            Value::I32(values) => write!(f, "{}", values.iter().join("\\")),
            Value::U32(values) => write!(f, "{}", values.iter().join("\\")),
            Value::I64(values) => write!(f, "{}", values.iter().join("\\")),
            Value::U64(values) => write!(f, "{}", values.iter().join("\\")),
            Value::F32(values) => write!(f, "{}", values.iter().join("\\")),
            Value::F64(values) => write!(f, "{}", values.iter().join("\\")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn text_values_are_trimmed_and_split() {
        let value = Value::from_bytes(VR::CS, b"ORIGINAL\\PRIMARY\\AXIAL ", Endianness::Little);
        assert_eq!(
            value,
            Value::Strs(smallvec![
                "ORIGINAL".to_string(),
                "PRIMARY".to_string(),
                "AXIAL".to_string(),
            ])
        );
        assert_eq!(value.to_str(), "ORIGINAL\\PRIMARY\\AXIAL");

        let value = Value::from_bytes(VR::UI, b"1.2.840.10008.1.2\0", Endianness::Little);
        assert_eq!(value.to_str(), "1.2.840.10008.1.2");

        // free text keeps backslashes and leading spaces
        let value = Value::from_bytes(VR::LT, b"  a\\b  ", Endianness::Little);
        assert_eq!(value, Value::Str("  a\\b".to_string()));

        assert_eq!(Value::from_bytes(VR::LO, b"  ", Endianness::Little), Value::Empty);
        assert_eq!(Value::from_bytes(VR::LO, b"", Endianness::Little), Value::Empty);
    }

    #[test]
    fn binary_values_follow_byte_order() {
        let bytes = [0x02, 0x00, 0x00, 0x01];
        assert_eq!(
            Value::from_bytes(VR::US, &bytes, Endianness::Little),
            Value::U16(smallvec![2, 256])
        );
        assert_eq!(
            Value::from_bytes(VR::US, &bytes, Endianness::Big),
            Value::U16(smallvec![512, 1])
        );
        assert_eq!(
            Value::from_bytes(VR::SS, &[0xFF, 0xFF], Endianness::Little),
            Value::I16(smallvec![-1])
        );
        assert_eq!(
            Value::from_bytes(VR::AT, &[0x28, 0x00, 0x10, 0x00], Endianness::Little),
            Value::Tags(smallvec![Tag(0x0028, 0x0010)])
        );
        // incomplete trailing number is ignored
        assert_eq!(
            Value::from_bytes(VR::UL, &[1, 0, 0, 0, 9], Endianness::Little),
            Value::U32(smallvec![1])
        );
    }

    #[test]
    fn numbers_from_strings() {
        let value = Value::from_bytes(VR::IS, b" 42 ", Endianness::Little);
        assert_eq!(value.to_int::<i32>(), Ok(42));
        let value = Value::from_bytes(VR::DS, b"-1024.0 ", Endianness::Little);
        assert_eq!(value.to_float64(), Ok(-1024.));
        assert_eq!(value.to_int::<i32>(), Ok(-1024));
        let value = Value::from_bytes(VR::DS, b"1.5E+01", Endianness::Little);
        assert_eq!(value.to_float64(), Ok(15.));
        let value = Value::from_bytes(VR::DS, b"0.7", Endianness::Little);
        assert!(value.to_int::<i32>().is_err());
        let value = Value::from_bytes(VR::DS, b"abc", Endianness::Little);
        assert!(matches!(value.to_float64(), Err(ConvertValueError::Parse { .. })));
    }

    #[test]
    fn multiple_floats() {
        let value = Value::from_bytes(VR::DS, b"1\\0\\0\\0\\1\\0 ", Endianness::Little);
        assert_eq!(
            value.to_multi_float64().unwrap().as_slice(),
            &[1., 0., 0., 0., 1., 0.]
        );
    }

    #[test]
    fn narrowing_is_checked() {
        let value = Value::U16(smallvec![300]);
        assert_eq!(value.to_int::<u16>(), Ok(300));
        assert!(matches!(
            value.to_int::<u8>(),
            Err(ConvertValueError::NarrowConvert { .. })
        ));
        assert!(Value::Empty.to_int::<u8>().is_err());
    }

    #[test]
    fn dates() {
        let value = Value::from_bytes(VR::DA, b"20141012", Endianness::Little);
        assert_eq!(value.to_date(), Ok(NaiveDate::from_ymd_opt(2014, 10, 12).unwrap()));
        let value = Value::from_bytes(VR::DA, b"1999.01.31", Endianness::Little);
        assert_eq!(value.to_date(), Ok(NaiveDate::from_ymd_opt(1999, 1, 31).unwrap()));
        let value = Value::from_bytes(VR::DA, b"2014", Endianness::Little);
        assert!(value.to_date().is_err());
    }
}

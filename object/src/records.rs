//! Typed records of the patient, study, series and geometry attributes
//! of an instance.
//!
//! Each record is gathered from the element table on first request
//! and then kept by the decoder until another instance is loaded.
//! Absent or malformed attributes yield empty strings or `None`.
use chrono::NaiveDate;
use dcmstack_core::value::Value;
use dcmstack_core::{tags, Tag};

fn text(get: &mut impl FnMut(Tag) -> Option<Value>, tag: Tag) -> String {
    get(tag)
        .map(|v| v.to_str().trim().to_string())
        .unwrap_or_default()
}

fn int(get: &mut impl FnMut(Tag) -> Option<Value>, tag: Tag) -> Option<i64> {
    get(tag).and_then(|v| v.to_int().ok())
}

fn float(get: &mut impl FnMut(Tag) -> Option<Value>, tag: Tag) -> Option<f64> {
    get(tag).and_then(|v| v.to_float64().ok())
}

fn date(get: &mut impl FnMut(Tag) -> Option<Value>, tag: Tag) -> Option<NaiveDate> {
    get(tag).and_then(|v| v.to_date().ok())
}

fn floats<const N: usize>(
    get: &mut impl FnMut(Tag) -> Option<Value>,
    tag: Tag,
) -> Option<[f64; N]> {
    let values = get(tag)?.to_multi_float64().ok()?;
    if values.len() < N {
        return None;
    }
    let mut out = [0.; N];
    out.copy_from_slice(&values[..N]);
    Some(out)
}

/// Patient level attributes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PatientInfo {
    pub name: String,
    pub id: String,
    pub birth_date: Option<NaiveDate>,
    pub sex: String,
    pub age: String,
    /// in kilograms
    pub weight: Option<f64>,
}

impl PatientInfo {
    pub(crate) fn collect(mut get: impl FnMut(Tag) -> Option<Value>) -> Self {
        PatientInfo {
            name: text(&mut get, tags::PATIENT_NAME),
            id: text(&mut get, tags::PATIENT_ID),
            birth_date: date(&mut get, tags::PATIENT_BIRTH_DATE),
            sex: text(&mut get, tags::PATIENT_SEX),
            age: text(&mut get, tags::PATIENT_AGE),
            weight: float(&mut get, tags::PATIENT_WEIGHT),
        }
    }
}

/// Study level attributes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StudyInfo {
    pub instance_uid: String,
    pub id: String,
    pub date: Option<NaiveDate>,
    pub time: String,
    pub description: String,
    pub accession_number: String,
    pub referring_physician_name: String,
}

impl StudyInfo {
    pub(crate) fn collect(mut get: impl FnMut(Tag) -> Option<Value>) -> Self {
        StudyInfo {
            instance_uid: text(&mut get, tags::STUDY_INSTANCE_UID),
            id: text(&mut get, tags::STUDY_ID),
            date: date(&mut get, tags::STUDY_DATE),
            time: text(&mut get, tags::STUDY_TIME),
            description: text(&mut get, tags::STUDY_DESCRIPTION),
            accession_number: text(&mut get, tags::ACCESSION_NUMBER),
            referring_physician_name: text(&mut get, tags::REFERRING_PHYSICIAN_NAME),
        }
    }
}

/// Series level attributes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SeriesInfo {
    pub instance_uid: String,
    pub number: Option<i64>,
    pub modality: String,
    pub description: String,
    pub date: Option<NaiveDate>,
    pub body_part_examined: String,
    pub protocol_name: String,
    pub frame_of_reference_uid: String,
}

impl SeriesInfo {
    pub(crate) fn collect(mut get: impl FnMut(Tag) -> Option<Value>) -> Self {
        SeriesInfo {
            instance_uid: text(&mut get, tags::SERIES_INSTANCE_UID),
            number: int(&mut get, tags::SERIES_NUMBER),
            modality: text(&mut get, tags::MODALITY),
            description: text(&mut get, tags::SERIES_DESCRIPTION),
            date: date(&mut get, tags::SERIES_DATE),
            body_part_examined: text(&mut get, tags::BODY_PART_EXAMINED),
            protocol_name: text(&mut get, tags::PROTOCOL_NAME),
            frame_of_reference_uid: text(&mut get, tags::FRAME_OF_REFERENCE_UID),
        }
    }
}

/// The position of an image in the patient coordinate system.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Geometry {
    /// _Image Position (Patient)_: the center of the first pixel, in mm
    pub position: Option<[f64; 3]>,
    /// direction cosines of the first row
    pub row_direction: Option<[f64; 3]>,
    /// direction cosines of the first column
    pub column_direction: Option<[f64; 3]>,
    /// _Pixel Spacing_: distance between rows, then between columns, in mm
    pub pixel_spacing: Option<[f64; 2]>,
    pub slice_thickness: Option<f64>,
    pub spacing_between_slices: Option<f64>,
    pub slice_location: Option<f64>,
    pub instance_number: Option<i64>,
}

impl Geometry {
    pub(crate) fn collect(mut get: impl FnMut(Tag) -> Option<Value>) -> Self {
        let orientation: Option<[f64; 6]> = floats(&mut get, tags::IMAGE_ORIENTATION_PATIENT);
        Geometry {
            position: floats(&mut get, tags::IMAGE_POSITION_PATIENT),
            row_direction: orientation.map(|o| [o[0], o[1], o[2]]),
            column_direction: orientation.map(|o| [o[3], o[4], o[5]]),
            pixel_spacing: floats(&mut get, tags::PIXEL_SPACING),
            slice_thickness: float(&mut get, tags::SLICE_THICKNESS),
            spacing_between_slices: float(&mut get, tags::SPACING_BETWEEN_SLICES),
            slice_location: float(&mut get, tags::SLICE_LOCATION),
            instance_number: int(&mut get, tags::INSTANCE_NUMBER),
        }
    }

    /// The unit normal of the image plane,
    /// as the cross product of the row and column directions.
    ///
    /// Returns `None` without an orientation,
    /// or if the directions are degenerate.
    pub fn normal(&self) -> Option<[f64; 3]> {
        let r = self.row_direction?;
        let c = self.column_direction?;
        let n = [
            r[1] * c[2] - r[2] * c[1],
            r[2] * c[0] - r[0] * c[2],
            r[0] * c[1] - r[1] * c[0],
        ];
        let norm = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if norm < 1e-6 {
            return None;
        }
        Some([n[0] / norm, n[1] / norm, n[2] / norm])
    }

    /// The distance of the image plane from the origin along `normal`.
    pub fn project(&self, normal: [f64; 3]) -> Option<f64> {
        let p = self.position?;
        Some(p[0] * normal[0] + p[1] * normal[1] + p[2] * normal[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(s: &[&str]) -> Value {
        Value::Strs(s.iter().map(|s| s.to_string()).collect())
    }

    fn lookup(pairs: Vec<(Tag, Value)>) -> impl FnMut(Tag) -> Option<Value> {
        move |tag| {
            pairs
                .iter()
                .find(|(t, _)| *t == tag)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn collect_patient() {
        let patient = PatientInfo::collect(lookup(vec![
            (tags::PATIENT_NAME, strs(&["Doe^John"])),
            (tags::PATIENT_BIRTH_DATE, strs(&["19800102"])),
            (tags::PATIENT_WEIGHT, strs(&["72.5"])),
            (tags::PATIENT_SEX, strs(&["M "])),
        ]));
        assert_eq!(patient.name, "Doe^John");
        assert_eq!(patient.id, "");
        assert_eq!(patient.birth_date, NaiveDate::from_ymd_opt(1980, 1, 2));
        assert_eq!(patient.weight, Some(72.5));
        assert_eq!(patient.sex, "M");
        assert_eq!(patient.age, "");
    }

    #[test]
    fn collect_geometry() {
        let geometry = Geometry::collect(lookup(vec![
            (tags::IMAGE_POSITION_PATIENT, strs(&["-125", "-125", "15.5"])),
            (tags::IMAGE_ORIENTATION_PATIENT, strs(&["1", "0", "0", "0", "1", "0"])),
            (tags::PIXEL_SPACING, strs(&["0.5", "0.5"])),
            (tags::INSTANCE_NUMBER, strs(&["7"])),
        ]));
        assert_eq!(geometry.position, Some([-125., -125., 15.5]));
        assert_eq!(geometry.normal(), Some([0., 0., 1.]));
        assert_eq!(geometry.project([0., 0., 1.]), Some(15.5));
        assert_eq!(geometry.pixel_spacing, Some([0.5, 0.5]));
        assert_eq!(geometry.instance_number, Some(7));
        assert_eq!(geometry.slice_thickness, None);
    }

    #[test]
    fn incomplete_orientation_has_no_normal() {
        let geometry = Geometry::collect(lookup(vec![(
            tags::IMAGE_ORIENTATION_PATIENT,
            strs(&["1", "0", "0"]),
        )]));
        assert_eq!(geometry.row_direction, None);
        assert_eq!(geometry.normal(), None);

        let degenerate = Geometry {
            row_direction: Some([1., 0., 0.]),
            column_direction: Some([1., 0., 0.]),
            ..Default::default()
        };
        assert_eq!(degenerate.normal(), None);
    }
}

//! Static data element dictionary.
//!
//! The dictionary is a compile-time table sorted by tag,
//! queried with a binary search.
//! Besides the value representation used for implicit VR data sets,
//! each entry records whether the attribute is [critical](Criticality),
//! in which case the reader materializes its value during the parse pass.

use crate::header::{Tag, VR};
use crate::tags;

/// Whether an attribute is needed unconditionally by downstream logic.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Criticality {
    /// The value is parsed eagerly while decoding.
    Critical,
    /// The value is kept as a byte range and parsed on first access.
    Regular,
}

/// An entry of the static dictionary.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    /// The attribute tag.
    pub tag: Tag,
    /// The attribute keyword.
    pub alias: &'static str,
    /// The value representation of the attribute.
    pub vr: VR,
    /// Whether the attribute is parsed eagerly.
    pub class: Criticality,
}

macro_rules! entry {
    ($tag: expr, $alias: literal, $vr: ident) => {
        DictionaryEntry {
            tag: $tag,
            alias: $alias,
            vr: VR::$vr,
            class: Criticality::Regular,
        }
    };
    ($tag: expr, $alias: literal, $vr: ident, critical) => {
        DictionaryEntry {
            tag: $tag,
            alias: $alias,
            vr: VR::$vr,
            class: Criticality::Critical,
        }
    };
}

/// All known entries, in ascending tag order.
static ENTRIES: &[DictionaryEntry] = &[
    entry!(tags::FILE_META_INFORMATION_GROUP_LENGTH, "FileMetaInformationGroupLength", UL),
    entry!(tags::FILE_META_INFORMATION_VERSION, "FileMetaInformationVersion", OB),
    entry!(tags::MEDIA_STORAGE_SOP_CLASS_UID, "MediaStorageSOPClassUID", UI),
    entry!(tags::MEDIA_STORAGE_SOP_INSTANCE_UID, "MediaStorageSOPInstanceUID", UI),
    entry!(tags::TRANSFER_SYNTAX_UID, "TransferSyntaxUID", UI, critical),
    entry!(tags::IMPLEMENTATION_CLASS_UID, "ImplementationClassUID", UI),
    entry!(tags::IMPLEMENTATION_VERSION_NAME, "ImplementationVersionName", SH),
    entry!(tags::SOURCE_APPLICATION_ENTITY_TITLE, "SourceApplicationEntityTitle", AE),
    entry!(tags::SPECIFIC_CHARACTER_SET, "SpecificCharacterSet", CS),
    entry!(tags::IMAGE_TYPE, "ImageType", CS),
    entry!(tags::INSTANCE_CREATION_DATE, "InstanceCreationDate", DA),
    entry!(tags::INSTANCE_CREATION_TIME, "InstanceCreationTime", TM),
    entry!(tags::SOP_CLASS_UID, "SOPClassUID", UI),
    entry!(tags::SOP_INSTANCE_UID, "SOPInstanceUID", UI),
    entry!(tags::STUDY_DATE, "StudyDate", DA),
    entry!(tags::SERIES_DATE, "SeriesDate", DA),
    entry!(tags::ACQUISITION_DATE, "AcquisitionDate", DA),
    entry!(tags::CONTENT_DATE, "ContentDate", DA),
    entry!(tags::STUDY_TIME, "StudyTime", TM),
    entry!(tags::SERIES_TIME, "SeriesTime", TM),
    entry!(tags::ACQUISITION_TIME, "AcquisitionTime", TM),
    entry!(tags::CONTENT_TIME, "ContentTime", TM),
    entry!(tags::ACCESSION_NUMBER, "AccessionNumber", SH),
    entry!(tags::MODALITY, "Modality", CS),
    entry!(tags::MANUFACTURER, "Manufacturer", LO),
    entry!(tags::INSTITUTION_NAME, "InstitutionName", LO),
    entry!(tags::REFERRING_PHYSICIAN_NAME, "ReferringPhysicianName", PN),
    entry!(tags::STATION_NAME, "StationName", SH),
    entry!(tags::STUDY_DESCRIPTION, "StudyDescription", LO),
    entry!(tags::SERIES_DESCRIPTION, "SeriesDescription", LO),
    entry!(tags::MANUFACTURER_MODEL_NAME, "ManufacturerModelName", LO),
    entry!(tags::REFERENCED_IMAGE_SEQUENCE, "ReferencedImageSequence", SQ),
    entry!(tags::PATIENT_NAME, "PatientName", PN),
    entry!(tags::PATIENT_ID, "PatientID", LO),
    entry!(tags::PATIENT_BIRTH_DATE, "PatientBirthDate", DA),
    entry!(tags::PATIENT_SEX, "PatientSex", CS),
    entry!(tags::PATIENT_AGE, "PatientAge", AS),
    entry!(tags::PATIENT_WEIGHT, "PatientWeight", DS),
    entry!(tags::BODY_PART_EXAMINED, "BodyPartExamined", CS),
    entry!(tags::SLICE_THICKNESS, "SliceThickness", DS),
    entry!(tags::KVP, "KVP", DS),
    entry!(tags::SPACING_BETWEEN_SLICES, "SpacingBetweenSlices", DS),
    entry!(tags::PROTOCOL_NAME, "ProtocolName", LO),
    entry!(tags::TABLE_HEIGHT, "TableHeight", DS),
    entry!(tags::PATIENT_POSITION, "PatientPosition", CS),
    entry!(tags::STUDY_INSTANCE_UID, "StudyInstanceUID", UI),
    entry!(tags::SERIES_INSTANCE_UID, "SeriesInstanceUID", UI),
    entry!(tags::STUDY_ID, "StudyID", SH),
    entry!(tags::SERIES_NUMBER, "SeriesNumber", IS),
    entry!(tags::ACQUISITION_NUMBER, "AcquisitionNumber", IS),
    entry!(tags::INSTANCE_NUMBER, "InstanceNumber", IS),
    entry!(tags::IMAGE_POSITION_PATIENT, "ImagePositionPatient", DS, critical),
    entry!(tags::IMAGE_ORIENTATION_PATIENT, "ImageOrientationPatient", DS, critical),
    entry!(tags::FRAME_OF_REFERENCE_UID, "FrameOfReferenceUID", UI),
    entry!(tags::SLICE_LOCATION, "SliceLocation", DS),
    entry!(tags::SAMPLES_PER_PIXEL, "SamplesPerPixel", US, critical),
    entry!(tags::PHOTOMETRIC_INTERPRETATION, "PhotometricInterpretation", CS, critical),
    entry!(tags::PLANAR_CONFIGURATION, "PlanarConfiguration", US, critical),
    entry!(tags::NUMBER_OF_FRAMES, "NumberOfFrames", IS, critical),
    entry!(tags::ROWS, "Rows", US, critical),
    entry!(tags::COLUMNS, "Columns", US, critical),
    entry!(tags::PIXEL_SPACING, "PixelSpacing", DS, critical),
    entry!(tags::BITS_ALLOCATED, "BitsAllocated", US, critical),
    entry!(tags::BITS_STORED, "BitsStored", US, critical),
    entry!(tags::HIGH_BIT, "HighBit", US),
    entry!(tags::PIXEL_REPRESENTATION, "PixelRepresentation", US, critical),
    entry!(tags::SMALLEST_IMAGE_PIXEL_VALUE, "SmallestImagePixelValue", US),
    entry!(tags::LARGEST_IMAGE_PIXEL_VALUE, "LargestImagePixelValue", US),
    entry!(tags::WINDOW_CENTER, "WindowCenter", DS, critical),
    entry!(tags::WINDOW_WIDTH, "WindowWidth", DS, critical),
    entry!(tags::RESCALE_INTERCEPT, "RescaleIntercept", DS, critical),
    entry!(tags::RESCALE_SLOPE, "RescaleSlope", DS, critical),
    entry!(tags::RESCALE_TYPE, "RescaleType", LO),
    entry!(tags::LOSSY_IMAGE_COMPRESSION, "LossyImageCompression", CS),
    entry!(tags::PIXEL_DATA, "PixelData", OW),
];

/// Look up the dictionary entry of the given tag.
pub fn lookup(tag: Tag) -> Option<&'static DictionaryEntry> {
    ENTRIES
        .binary_search_by(|entry| entry.tag.cmp(&tag))
        .ok()
        .map(|index| &ENTRIES[index])
}

/// Determine the value representation of an attribute
/// for decoding in implicit VR.
///
/// Group length elements resolve to `UL`,
/// the item and delimitation tags resolve to `UN`,
/// and unknown attributes resolve to `UN`.
pub fn vr_of(tag: Tag) -> VR {
    if let Some(entry) = lookup(tag) {
        return entry.vr;
    }
    if tag.is_group_length() && !tag.is_delimitation() {
        return VR::UL;
    }
    // private creator elements (gggg,0010-00FF)
    if tag.is_private() && (0x0010..=0x00FF).contains(&tag.element()) {
        return VR::LO;
    }
    VR::UN
}

/// Check whether the given attribute is parsed eagerly.
pub fn is_critical(tag: Tag) -> bool {
    matches!(
        lookup(tag),
        Some(DictionaryEntry {
            class: Criticality::Critical,
            ..
        })
    )
}

/// Iterate over all critical attributes.
pub fn critical_tags() -> impl Iterator<Item = Tag> {
    ENTRIES
        .iter()
        .filter(|entry| entry.class == Criticality::Critical)
        .map(|entry| entry.tag)
}

/// Obtain the keyword of a known attribute.
pub fn alias_of(tag: Tag) -> Option<&'static str> {
    lookup(tag).map(|entry| entry.alias)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_sorted() {
        for pair in ENTRIES.windows(2) {
            assert!(
                pair[0].tag < pair[1].tag,
                "{} should come before {}",
                pair[0].tag,
                pair[1].tag
            );
        }
    }

    #[test]
    fn implicit_vr_lookup() {
        assert_eq!(vr_of(tags::ROWS), VR::US);
        assert_eq!(vr_of(tags::PATIENT_NAME), VR::PN);
        assert_eq!(vr_of(tags::REFERENCED_IMAGE_SEQUENCE), VR::SQ);
        assert_eq!(vr_of(Tag(0x0028, 0x0000)), VR::UL);
        assert_eq!(vr_of(Tag(0x0009, 0x0010)), VR::LO);
        assert_eq!(vr_of(Tag(0x0009, 0x1001)), VR::UN);
        assert_eq!(vr_of(Tag::ITEM), VR::UN);
    }

    #[test]
    fn criticality() {
        assert!(is_critical(tags::ROWS));
        assert!(is_critical(tags::RESCALE_INTERCEPT));
        assert!(is_critical(tags::TRANSFER_SYNTAX_UID));
        assert!(!is_critical(tags::PATIENT_NAME));
        assert!(!is_critical(tags::PIXEL_DATA));
        assert!(!is_critical(Tag(0x0011, 0x1010)));
        assert!(critical_tags().count() >= 16);
    }

    #[test]
    fn aliases() {
        assert_eq!(alias_of(tags::SERIES_DESCRIPTION), Some("SeriesDescription"));
        assert_eq!(alias_of(Tag(0x0011, 0x1010)), None);
    }
}

//! Tag constants for the attributes known to the static dictionary.

use crate::header::Tag;

/// File Meta Information Group Length `(0002,0000)`
pub const FILE_META_INFORMATION_GROUP_LENGTH: Tag = Tag(0x0002, 0x0000);
/// File Meta Information Version `(0002,0001)`
pub const FILE_META_INFORMATION_VERSION: Tag = Tag(0x0002, 0x0001);
/// Media Storage SOP Class UID `(0002,0002)`
pub const MEDIA_STORAGE_SOP_CLASS_UID: Tag = Tag(0x0002, 0x0002);
/// Media Storage SOP Instance UID `(0002,0003)`
pub const MEDIA_STORAGE_SOP_INSTANCE_UID: Tag = Tag(0x0002, 0x0003);
/// Transfer Syntax UID `(0002,0010)`
pub const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);
/// Implementation Class UID `(0002,0012)`
pub const IMPLEMENTATION_CLASS_UID: Tag = Tag(0x0002, 0x0012);
/// Implementation Version Name `(0002,0013)`
pub const IMPLEMENTATION_VERSION_NAME: Tag = Tag(0x0002, 0x0013);
/// Source Application Entity Title `(0002,0016)`
pub const SOURCE_APPLICATION_ENTITY_TITLE: Tag = Tag(0x0002, 0x0016);
/// Specific Character Set `(0008,0005)`
pub const SPECIFIC_CHARACTER_SET: Tag = Tag(0x0008, 0x0005);
/// Image Type `(0008,0008)`
pub const IMAGE_TYPE: Tag = Tag(0x0008, 0x0008);
/// Instance Creation Date `(0008,0012)`
pub const INSTANCE_CREATION_DATE: Tag = Tag(0x0008, 0x0012);
/// Instance Creation Time `(0008,0013)`
pub const INSTANCE_CREATION_TIME: Tag = Tag(0x0008, 0x0013);
/// SOP Class UID `(0008,0016)`
pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
/// SOP Instance UID `(0008,0018)`
pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
/// Study Date `(0008,0020)`
pub const STUDY_DATE: Tag = Tag(0x0008, 0x0020);
/// Series Date `(0008,0021)`
pub const SERIES_DATE: Tag = Tag(0x0008, 0x0021);
/// Acquisition Date `(0008,0022)`
pub const ACQUISITION_DATE: Tag = Tag(0x0008, 0x0022);
/// Content Date `(0008,0023)`
pub const CONTENT_DATE: Tag = Tag(0x0008, 0x0023);
/// Study Time `(0008,0030)`
pub const STUDY_TIME: Tag = Tag(0x0008, 0x0030);
/// Series Time `(0008,0031)`
pub const SERIES_TIME: Tag = Tag(0x0008, 0x0031);
/// Acquisition Time `(0008,0032)`
pub const ACQUISITION_TIME: Tag = Tag(0x0008, 0x0032);
/// Content Time `(0008,0033)`
pub const CONTENT_TIME: Tag = Tag(0x0008, 0x0033);
/// Accession Number `(0008,0050)`
pub const ACCESSION_NUMBER: Tag = Tag(0x0008, 0x0050);
/// Modality `(0008,0060)`
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
/// Manufacturer `(0008,0070)`
pub const MANUFACTURER: Tag = Tag(0x0008, 0x0070);
/// Institution Name `(0008,0080)`
pub const INSTITUTION_NAME: Tag = Tag(0x0008, 0x0080);
/// Referring Physician Name `(0008,0090)`
pub const REFERRING_PHYSICIAN_NAME: Tag = Tag(0x0008, 0x0090);
/// Station Name `(0008,1010)`
pub const STATION_NAME: Tag = Tag(0x0008, 0x1010);
/// Study Description `(0008,1030)`
pub const STUDY_DESCRIPTION: Tag = Tag(0x0008, 0x1030);
/// Series Description `(0008,103E)`
pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);
/// Manufacturer Model Name `(0008,1090)`
pub const MANUFACTURER_MODEL_NAME: Tag = Tag(0x0008, 0x1090);
/// Referenced Image Sequence `(0008,1140)`
pub const REFERENCED_IMAGE_SEQUENCE: Tag = Tag(0x0008, 0x1140);
/// Patient Name `(0010,0010)`
pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
/// Patient ID `(0010,0020)`
pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);
/// Patient Birth Date `(0010,0030)`
pub const PATIENT_BIRTH_DATE: Tag = Tag(0x0010, 0x0030);
/// Patient Sex `(0010,0040)`
pub const PATIENT_SEX: Tag = Tag(0x0010, 0x0040);
/// Patient Age `(0010,1010)`
pub const PATIENT_AGE: Tag = Tag(0x0010, 0x1010);
/// Patient Weight `(0010,1030)`
pub const PATIENT_WEIGHT: Tag = Tag(0x0010, 0x1030);
/// Body Part Examined `(0018,0015)`
pub const BODY_PART_EXAMINED: Tag = Tag(0x0018, 0x0015);
/// Slice Thickness `(0018,0050)`
pub const SLICE_THICKNESS: Tag = Tag(0x0018, 0x0050);
/// KVP `(0018,0060)`
pub const KVP: Tag = Tag(0x0018, 0x0060);
/// Spacing Between Slices `(0018,0088)`
pub const SPACING_BETWEEN_SLICES: Tag = Tag(0x0018, 0x0088);
/// Protocol Name `(0018,1030)`
pub const PROTOCOL_NAME: Tag = Tag(0x0018, 0x1030);
/// Table Height `(0018,1130)`
pub const TABLE_HEIGHT: Tag = Tag(0x0018, 0x1130);
/// Patient Position `(0018,5100)`
pub const PATIENT_POSITION: Tag = Tag(0x0018, 0x5100);
/// Study Instance UID `(0020,000D)`
pub const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
/// Series Instance UID `(0020,000E)`
pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
/// Study ID `(0020,0010)`
pub const STUDY_ID: Tag = Tag(0x0020, 0x0010);
/// Series Number `(0020,0011)`
pub const SERIES_NUMBER: Tag = Tag(0x0020, 0x0011);
/// Acquisition Number `(0020,0012)`
pub const ACQUISITION_NUMBER: Tag = Tag(0x0020, 0x0012);
/// Instance Number `(0020,0013)`
pub const INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);
/// Image Position Patient `(0020,0032)`
pub const IMAGE_POSITION_PATIENT: Tag = Tag(0x0020, 0x0032);
/// Image Orientation Patient `(0020,0037)`
pub const IMAGE_ORIENTATION_PATIENT: Tag = Tag(0x0020, 0x0037);
/// Frame Of Reference UID `(0020,0052)`
pub const FRAME_OF_REFERENCE_UID: Tag = Tag(0x0020, 0x0052);
/// Slice Location `(0020,1041)`
pub const SLICE_LOCATION: Tag = Tag(0x0020, 0x1041);
/// Samples Per Pixel `(0028,0002)`
pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
/// Photometric Interpretation `(0028,0004)`
pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
/// Planar Configuration `(0028,0006)`
pub const PLANAR_CONFIGURATION: Tag = Tag(0x0028, 0x0006);
/// Number Of Frames `(0028,0008)`
pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
/// Rows `(0028,0010)`
pub const ROWS: Tag = Tag(0x0028, 0x0010);
/// Columns `(0028,0011)`
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
/// Pixel Spacing `(0028,0030)`
pub const PIXEL_SPACING: Tag = Tag(0x0028, 0x0030);
/// Bits Allocated `(0028,0100)`
pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
/// Bits Stored `(0028,0101)`
pub const BITS_STORED: Tag = Tag(0x0028, 0x0101);
/// High Bit `(0028,0102)`
pub const HIGH_BIT: Tag = Tag(0x0028, 0x0102);
/// Pixel Representation `(0028,0103)`
pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
/// Smallest Image Pixel Value `(0028,0106)`
pub const SMALLEST_IMAGE_PIXEL_VALUE: Tag = Tag(0x0028, 0x0106);
/// Largest Image Pixel Value `(0028,0107)`
pub const LARGEST_IMAGE_PIXEL_VALUE: Tag = Tag(0x0028, 0x0107);
/// Window Center `(0028,1050)`
pub const WINDOW_CENTER: Tag = Tag(0x0028, 0x1050);
/// Window Width `(0028,1051)`
pub const WINDOW_WIDTH: Tag = Tag(0x0028, 0x1051);
/// Rescale Intercept `(0028,1052)`
pub const RESCALE_INTERCEPT: Tag = Tag(0x0028, 0x1052);
/// Rescale Slope `(0028,1053)`
pub const RESCALE_SLOPE: Tag = Tag(0x0028, 0x1053);
/// Rescale Type `(0028,1054)`
pub const RESCALE_TYPE: Tag = Tag(0x0028, 0x1054);
/// Lossy Image Compression `(0028,2110)`
pub const LOSSY_IMAGE_COMPRESSION: Tag = Tag(0x0028, 0x2110);
/// Pixel Data `(7FE0,0010)`
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

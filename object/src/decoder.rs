//! The decoder of a single DICOM instance.
//!
//! See [`DicomDecoder`].
use crate::file::OpenOptions;
use crate::records::{Geometry, PatientInfo, SeriesInfo, StudyInfo};
use crate::{
    Error, ExtractPixelDataSnafu, ImageAttributesSnafu, MissingPixelDataSnafu, NotLoadedSnafu,
    ParseFileSnafu, Result,
};
use dcmstack_core::limits::DecodeLimits;
use dcmstack_core::transfer_syntax::TransferSyntax;
use dcmstack_core::value::Value;
use dcmstack_core::{tags, Tag};
use dcmstack_parser::{read_file, DataSet, ElementValue, FileMetaTable, PixelDataLocation};
use dcmstack_pixeldata::{BufferPool, ImageInfo, PixelBuffer, PixelSource, Rescale, WindowLevel};
use snafu::{OptionExt, ResultExt};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// A summary of the state of a decoder.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct DecoderStatus {
    /// whether an instance is loaded
    pub loaded: bool,
    /// the number of columns, 0 if unknown
    pub width: u16,
    /// the number of rows, 0 if unknown
    pub height: u16,
    /// whether the instance has a pixel data element
    pub has_pixel_data: bool,
    /// the transfer syntax of the instance
    pub transfer_syntax: Option<&'static TransferSyntax>,
    /// the number of sequences skipped for being nested too deeply
    pub truncated_branches: u32,
}

impl DecoderStatus {
    /// Whether the instance is an image whose pixels can be requested.
    pub fn is_image(&self) -> bool {
        self.loaded && self.has_pixel_data && self.width > 0 && self.height > 0
    }
}

/// A DICOM instance decoder.
///
/// The decoder owns the bytes of one DICOM file
/// and the element table read from them.
/// Attributes outside of a small set of critical ones
/// are parsed on first access,
/// and the pixel data is only decoded when requested.
///
/// All state is guarded by one lock per decoder,
/// so a decoder can be shared across threads as is.
/// Metadata queries hold the lock while they read or fill a cache.
/// Pixel requests take a snapshot of the pixel data under the lock,
/// decode it with the lock released,
/// and lock again only to cache the result,
/// which is dropped if another load started in the meantime.
/// The buffer pool is never used while the lock is held.
///
/// A decoder without a loaded instance
/// answers every query with an empty value.
/// A failed load leaves the decoder in this empty state.
#[derive(Debug, Default)]
pub struct DicomDecoder {
    state: Mutex<DecoderState>,
}

#[derive(Debug, Default)]
struct DecoderState {
    /// incremented at the start of every load
    generation: u64,
    instance: Option<Instance>,
}

#[derive(Debug)]
struct Instance {
    data: Arc<[u8]>,
    path: Option<PathBuf>,
    meta: Option<FileMetaTable>,
    transfer_syntax: &'static TransferSyntax,
    dataset: DataSet,
    limits: DecodeLimits,
    image: Option<ImageInfo>,
    patient: Option<PatientInfo>,
    study: Option<StudyInfo>,
    series: Option<SeriesInfo>,
    geometry: Option<Geometry>,
    window: Option<Option<WindowLevel>>,
    rescale: Option<Rescale>,
    pixels: Option<Arc<PixelBuffer>>,
}

impl Instance {
    fn parse(data: Arc<[u8]>, path: Option<PathBuf>, options: &OpenOptions) -> Result<Self> {
        let file = read_file(&data, &options.file_read_options()).context(ParseFileSnafu)?;

        let image = match ImageInfo::from_dataset(&file.dataset, &data) {
            Ok(info) => Some(info),
            Err(e) if file.dataset.pixel_data().is_some() => {
                warn!("Could not read image attributes: {}", e);
                None
            }
            Err(_) => None,
        };
        if file.dataset.truncated_branches() > 0 {
            warn!(
                "{} sequence(s) skipped for exceeding the nesting limit",
                file.dataset.truncated_branches()
            );
        }

        Ok(Instance {
            data,
            path,
            meta: file.meta,
            transfer_syntax: file.transfer_syntax,
            dataset: file.dataset,
            limits: options.decode_limits(),
            image,
            patient: None,
            study: None,
            series: None,
            geometry: None,
            window: None,
            rescale: None,
            pixels: None,
        })
    }

    /// Obtain the value of an element,
    /// replacing its location in the table with the parsed value
    /// on first access.
    fn realize(&mut self, tag: Tag) -> Option<&Value> {
        let endianness = self.dataset.endianness();
        let element = self.dataset.get_mut(tag)?;
        if let ElementValue::Lazy(meta) = element.value {
            let value = meta.realize(&self.data, endianness)?;
            element.value = ElementValue::Realized(value);
        }
        match &element.value {
            ElementValue::Realized(value) => Some(value),
            ElementValue::Lazy(_) => None,
        }
    }

    fn double_value(&mut self, tag: Tag) -> Option<f64> {
        self.realize(tag).and_then(|v| v.to_float64().ok())
    }
}

/// Everything needed to decode the pixel data
/// once the decoder lock is released.
#[derive(Debug)]
struct PixelSnapshot {
    generation: u64,
    data: Arc<[u8]>,
    location: PixelDataLocation,
    info: ImageInfo,
    transfer_syntax: &'static TransferSyntax,
    limits: DecodeLimits,
}

impl PixelSnapshot {
    fn source(&self) -> PixelSource<'_> {
        PixelSource {
            data: &self.data,
            location: &self.location,
            info: &self.info,
            transfer_syntax: self.transfer_syntax,
            limits: self.limits,
        }
    }
}

#[derive(Debug)]
enum PixelState {
    Cached(Arc<PixelBuffer>),
    Pending(PixelSnapshot),
}

/// Give the pixel buffer of a discarded instance back to the pool.
fn recycle(instance: Instance) {
    if let Some(pixels) = instance.pixels {
        if let Ok(buffer) = Arc::try_unwrap(pixels) {
            buffer.recycle(BufferPool::global());
        }
    }
}

fn no_data<T>(result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e @ Error::ExtractPixelData { .. }) | Err(e @ Error::ImageAttributes { .. }) => {
            warn!("{}", snafu::Report::from_error(&e));
            None
        }
        Err(e) => {
            debug!("No pixel data: {}", e);
            None
        }
    }
}

impl DicomDecoder {
    /// Create a decoder without any instance loaded.
    pub fn new() -> Self {
        DicomDecoder::default()
    }

    /// Open the DICOM file at the given path with the default options.
    pub fn open_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        OpenOptions::new().open_file(path)
    }

    /// Read DICOM data already in memory with the default options.
    pub fn from_bytes<B>(bytes: B) -> Result<Self>
    where
        B: Into<Arc<[u8]>>,
    {
        OpenOptions::new().from_bytes(bytes)
    }

    /// Load the DICOM file at the given path with the default options,
    /// replacing the current instance.
    pub fn load_file<P>(&self, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        OpenOptions::new().load_into(self, path)
    }

    /// Load DICOM data already in memory with the default options,
    /// replacing the current instance.
    pub fn load_bytes<B>(&self, bytes: B) -> Result<()>
    where
        B: Into<Arc<[u8]>>,
    {
        OpenOptions::new().load_bytes_into(self, bytes)
    }

    /// Discard the current instance.
    pub fn reset(&self) {
        self.begin_load();
    }

    fn lock(&self) -> MutexGuard<'_, DecoderState> {
        // every mutation replaces whole values,
        // so the state behind a poisoned lock is still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Clear the decoder ahead of a new load,
    /// returning the generation of that load.
    pub(crate) fn begin_load(&self) -> u64 {
        let (generation, old) = {
            let mut state = self.lock();
            state.generation = state.generation.wrapping_add(1);
            (state.generation, state.instance.take())
        };
        if let Some(old) = old {
            recycle(old);
        }
        generation
    }

    /// Parse the data of a load started with [`begin_load`](Self::begin_load)
    /// and install the outcome,
    /// unless another load was started in the meantime.
    pub(crate) fn finish_load(
        &self,
        generation: u64,
        data: Arc<[u8]>,
        path: Option<PathBuf>,
        options: &OpenOptions,
    ) -> Result<()> {
        let instance = match Instance::parse(data, path, options) {
            Ok(instance) => instance,
            Err(e) => {
                warn!("Could not load DICOM data: {}", snafu::Report::from_error(&e));
                return Err(e);
            }
        };

        let mut state = self.lock();
        if state.generation == generation {
            debug!(
                "Loaded {} elements in {}",
                instance.dataset.len(),
                instance.transfer_syntax.name()
            );
            state.instance = Some(instance);
        } else {
            debug!("Load superseded by a newer one");
        }
        Ok(())
    }

    fn with_instance<T>(&self, f: impl FnOnce(&mut Instance) -> T) -> Option<T> {
        let mut state = self.lock();
        state.instance.as_mut().map(f)
    }

    /// Whether an instance is loaded.
    pub fn is_loaded(&self) -> bool {
        self.lock().instance.is_some()
    }

    /// A summary of the decoder state.
    pub fn status(&self) -> DecoderStatus {
        let state = self.lock();
        let Some(instance) = state.instance.as_ref() else {
            return DecoderStatus::default();
        };
        DecoderStatus {
            loaded: true,
            width: instance.image.as_ref().map_or(0, |i| i.cols),
            height: instance.image.as_ref().map_or(0, |i| i.rows),
            has_pixel_data: instance.dataset.pixel_data().is_some(),
            transfer_syntax: Some(instance.transfer_syntax),
            truncated_branches: instance.dataset.truncated_branches(),
        }
    }

    /// The path of the loaded file, if it was read from one.
    pub fn path(&self) -> Option<PathBuf> {
        self.with_instance(|i| i.path.clone()).flatten()
    }

    /// The file meta group of the loaded instance.
    pub fn meta(&self) -> Option<FileMetaTable> {
        self.with_instance(|i| i.meta.clone()).flatten()
    }

    /// The transfer syntax of the loaded instance.
    pub fn transfer_syntax(&self) -> Option<&'static TransferSyntax> {
        self.with_instance(|i| i.transfer_syntax)
    }

    /// The image pixel attributes of the loaded instance,
    /// if it holds a valid image pixel description.
    pub fn image_info(&self) -> Option<ImageInfo> {
        self.with_instance(|i| i.image.clone()).flatten()
    }

    /// Whether the root data set holds an element with the given tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.with_instance(|i| i.dataset.get(tag).is_some())
            .unwrap_or(false)
    }

    /// The tags of all root elements, in ascending order.
    pub fn tags(&self) -> Vec<Tag> {
        self.with_instance(|i| i.dataset.iter().map(|e| e.header.tag).collect())
            .unwrap_or_default()
    }

    /// The parsed value of an element.
    pub fn value(&self, tag: Tag) -> Option<Value> {
        self.with_instance(|i| i.realize(tag).cloned()).flatten()
    }

    /// The value of an element as text,
    /// multiple values being separated by a backslash.
    ///
    /// Returns an empty string if the element is absent.
    pub fn info(&self, tag: Tag) -> String {
        self.with_instance(|i| i.realize(tag).map(|v| v.to_str().into_owned()))
            .flatten()
            .unwrap_or_default()
    }

    /// The first value of an element as an integer.
    pub fn int_value(&self, tag: Tag) -> Option<i64> {
        self.with_instance(|i| i.realize(tag).and_then(|v| v.to_int::<i64>().ok()))
            .flatten()
    }

    /// The first value of an element as a floating point number.
    pub fn double_value(&self, tag: Tag) -> Option<f64> {
        self.with_instance(|i| i.double_value(tag)).flatten()
    }

    /// The patient attributes.
    pub fn patient(&self) -> Option<PatientInfo> {
        self.with_instance(|i| {
            if i.patient.is_none() {
                i.patient = Some(PatientInfo::collect(|tag| i.realize(tag).cloned()));
            }
            i.patient.clone()
        })
        .flatten()
    }

    /// The study attributes.
    pub fn study(&self) -> Option<StudyInfo> {
        self.with_instance(|i| {
            if i.study.is_none() {
                i.study = Some(StudyInfo::collect(|tag| i.realize(tag).cloned()));
            }
            i.study.clone()
        })
        .flatten()
    }

    /// The series attributes.
    pub fn series(&self) -> Option<SeriesInfo> {
        self.with_instance(|i| {
            if i.series.is_none() {
                i.series = Some(SeriesInfo::collect(|tag| i.realize(tag).cloned()));
            }
            i.series.clone()
        })
        .flatten()
    }

    /// The image plane geometry.
    pub fn geometry(&self) -> Option<Geometry> {
        self.with_instance(|i| {
            if i.geometry.is_none() {
                i.geometry = Some(Geometry::collect(|tag| i.realize(tag).cloned()));
            }
            i.geometry.clone()
        })
        .flatten()
    }

    /// The first window of the VOI LUT window attributes,
    /// if both the center and a positive width are present.
    pub fn window(&self) -> Option<WindowLevel> {
        self.with_instance(|i| {
            if i.window.is_none() {
                let center = i.double_value(tags::WINDOW_CENTER);
                let width = i.double_value(tags::WINDOW_WIDTH);
                i.window = Some(match (center, width) {
                    (Some(center), Some(width)) if width > 0. => {
                        Some(WindowLevel { width, center })
                    }
                    _ => None,
                });
            }
            i.window.flatten()
        })
        .flatten()
    }

    /// The modality rescale function.
    ///
    /// Falls back to the identity function if no instance is loaded,
    /// and to a slope of 1 and an intercept of 0 if either is absent.
    pub fn rescale(&self) -> Rescale {
        self.with_instance(|i| {
            if let Some(rescale) = i.rescale {
                return rescale;
            }
            let intercept = i.double_value(tags::RESCALE_INTERCEPT).unwrap_or(0.);
            let slope = match i.double_value(tags::RESCALE_SLOPE) {
                Some(slope) if slope != 0. && slope.is_finite() => slope,
                Some(slope) => {
                    warn!("Ignoring invalid rescale slope {}", slope);
                    1.
                }
                None => 1.,
            };
            let rescale = Rescale::new(slope, intercept);
            i.rescale = Some(rescale);
            rescale
        })
        .unwrap_or_default()
    }

    /// Apply the modality rescale function to a stored value.
    pub fn apply_rescale(&self, value: f64) -> f64 {
        self.rescale().apply(value)
    }

    fn pixel_state(&self) -> Result<PixelState> {
        let state = self.lock();
        let instance = state.instance.as_ref().context(NotLoadedSnafu)?;
        if let Some(pixels) = &instance.pixels {
            return Ok(PixelState::Cached(Arc::clone(pixels)));
        }
        let location = instance
            .dataset
            .pixel_data()
            .context(MissingPixelDataSnafu)?
            .clone();
        let info = match &instance.image {
            Some(info) => info.clone(),
            None => ImageInfo::from_dataset(&instance.dataset, &instance.data)
                .context(ImageAttributesSnafu)?,
        };
        Ok(PixelState::Pending(PixelSnapshot {
            generation: state.generation,
            data: Arc::clone(&instance.data),
            location,
            info,
            transfer_syntax: instance.transfer_syntax,
            limits: instance.limits,
        }))
    }

    /// Decode the pixel data of the first frame.
    ///
    /// The buffer is decoded once and shared by later calls.
    pub fn try_pixels(&self) -> Result<Arc<PixelBuffer>> {
        let snapshot = match self.pixel_state()? {
            PixelState::Cached(pixels) => return Ok(pixels),
            PixelState::Pending(snapshot) => snapshot,
        };
        let pool = BufferPool::global();
        let buffer = snapshot
            .source()
            .decode(pool)
            .context(ExtractPixelDataSnafu)?;
        Ok(self.cache_pixels(snapshot.generation, buffer, pool))
    }

    /// Cache freshly decoded pixels for the instance of the given load,
    /// returning the buffer to share.
    ///
    /// If another thread cached its own buffer first,
    /// that one is returned and `buffer` goes back to the pool.
    fn cache_pixels(
        &self,
        generation: u64,
        buffer: PixelBuffer,
        pool: &BufferPool,
    ) -> Arc<PixelBuffer> {
        let buffer = Arc::new(buffer);
        let cached = {
            let mut state = self.lock();
            if state.generation != generation {
                // the instance was replaced while decoding
                return buffer;
            }
            let Some(instance) = state.instance.as_mut() else {
                return buffer;
            };
            match &instance.pixels {
                Some(cached) => Arc::clone(cached),
                None => {
                    instance.pixels = Some(Arc::clone(&buffer));
                    return buffer;
                }
            }
        };
        if let Ok(buffer) = Arc::try_unwrap(buffer) {
            buffer.recycle(pool);
        }
        cached
    }

    /// Decode the pixels of the first frame in the given range of pixel indices
    /// into a new buffer.
    ///
    /// Native pixel data is read for the requested pixels only.
    /// Returns `Ok(None)` if the range is empty or out of bounds.
    pub fn try_pixels_range(&self, range: Range<usize>) -> Result<Option<PixelBuffer>> {
        let pool = BufferPool::global();
        match self.pixel_state()? {
            PixelState::Cached(pixels) => Ok(pixels.slice(range, pool)),
            PixelState::Pending(snapshot) => match snapshot.location {
                PixelDataLocation::Native { .. } => snapshot
                    .source()
                    .decode_range(range, pool)
                    .context(ExtractPixelDataSnafu),
                PixelDataLocation::Encapsulated { .. } => {
                    Ok(self.try_pixels()?.slice(range, pool))
                }
            },
        }
    }

    /// The pixel data of the first frame,
    /// or `None` if it cannot be decoded.
    pub fn pixels(&self) -> Option<Arc<PixelBuffer>> {
        no_data(self.try_pixels())
    }

    /// The pixels of the first frame in the given range,
    /// or `None` if they cannot be decoded
    /// or if the range is empty or out of bounds.
    pub fn pixels_range(&self, range: Range<usize>) -> Option<PixelBuffer> {
        no_data(self.try_pixels_range(range)).flatten()
    }

    /// The samples of an 8-bit grayscale image.
    pub fn pixels8(&self) -> Option<Vec<u8>> {
        self.pixels()?.as_gray8().map(<[u8]>::to_vec)
    }

    /// The samples of a 16-bit grayscale image,
    /// with the stored bit pattern.
    pub fn pixels16(&self) -> Option<Vec<u16>> {
        self.pixels()?.as_gray16().map(<[u16]>::to_vec)
    }

    /// The samples of an RGB image, three per pixel.
    pub fn pixels24(&self) -> Option<Vec<u8>> {
        self.pixels()?.as_rgb24().map(<[u8]>::to_vec)
    }

    /// The samples of the given pixels of an 8-bit grayscale image.
    pub fn pixels8_range(&self, range: Range<usize>) -> Option<Vec<u8>> {
        self.pixels_range(range)?.into_gray8()
    }

    /// The samples of the given pixels of a 16-bit grayscale image.
    pub fn pixels16_range(&self, range: Range<usize>) -> Option<Vec<u16>> {
        self.pixels_range(range)?.into_gray16()
    }

    /// The samples of the given pixels of an RGB image,
    /// three per pixel.
    pub fn pixels24_range(&self, range: Range<usize>) -> Option<Vec<u8>> {
        self.pixels_range(range)?.into_rgb24()
    }
}

//! Loading, ordering, validation and assembly of series slices.
use crate::natural::natural_cmp;
use crate::progress::{CancelToken, SeriesProgress};
use crate::volume::{DicomSeriesVolume, Voxels};
use crate::{
    CancelledSnafu, InconsistentDimensionsSnafu, InconsistentOrientationSnafu,
    InconsistentPixelRepresentationSnafu, LoadSliceSnafu, NoFilesSnafu, NotAnImageSnafu,
    ReadDirectorySnafu, Result, UnsupportedLayoutSnafu, VolumeTooLargeSnafu,
};
use dcmstack_object::{DicomDecoder, Geometry, OpenOptions};
use dcmstack_pixeldata::{BufferPool, ImageInfo, PixelBuffer, PixelRepresentation, Rescale};
use snafu::{ensure, OptionExt, Report, ResultExt};
use std::cmp::Ordering;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

const IDENTITY: [[f64; 3]; 3] = [[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]];

/// Options for assembling a series.
#[derive(Debug, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub struct SeriesOptions {
    /// the largest difference allowed
    /// between the direction cosines of two slices
    pub orientation_tolerance: f64,
    /// the largest difference in pixel spacing, in mm,
    /// tolerated without a warning
    pub spacing_tolerance: f64,
    /// the options for opening each slice
    pub open_options: OpenOptions,
    /// whether to decode slices on multiple threads
    pub parallel: bool,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        SeriesOptions {
            orientation_tolerance: 1e-4,
            spacing_tolerance: 0.2,
            open_options: OpenOptions::new(),
            parallel: true,
        }
    }
}

impl SeriesOptions {
    pub fn new() -> Self {
        SeriesOptions::default()
    }

    /// Set the largest difference allowed between direction cosines.
    pub fn orientation_tolerance(mut self, tolerance: f64) -> Self {
        self.orientation_tolerance = tolerance;
        self
    }

    /// Set the largest pixel spacing difference tolerated without a warning.
    pub fn spacing_tolerance(mut self, tolerance: f64) -> Self {
        self.spacing_tolerance = tolerance;
        self
    }

    /// Set the options for opening each slice.
    pub fn open_options(mut self, options: OpenOptions) -> Self {
        self.open_options = options;
        self
    }

    /// Set whether slices are decoded on multiple threads.
    ///
    /// Has no effect without the `rayon` feature.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Assemble the DICOM files in a directory into a volume,
/// with the default options.
pub fn load_directory<P>(path: P) -> Result<DicomSeriesVolume>
where
    P: AsRef<Path>,
{
    SeriesLoader::default().load_directory(path, |_| ControlFlow::Continue(()))
}

/// An assembler of series volumes.
///
/// Progress is reported through a callback
/// after each slice is copied into the volume.
/// Returning [`ControlFlow::Break`] from the callback,
/// or cancelling the loader's [`CancelToken`],
/// stops the assembly with [`Error::Cancelled`](crate::Error::Cancelled).
#[derive(Debug, Default, Clone)]
pub struct SeriesLoader {
    options: SeriesOptions,
    cancel: Option<CancelToken>,
}

impl SeriesLoader {
    pub fn new(options: SeriesOptions) -> Self {
        SeriesLoader {
            options,
            cancel: None,
        }
    }

    /// Observe the given token for cancellation requests.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn options(&self) -> &SeriesOptions {
        &self.options
    }

    /// Assemble the files in a directory into a volume.
    ///
    /// Every regular file not starting with a dot is considered.
    /// Files which are not DICOM are skipped with a warning.
    pub fn load_directory<P, F>(&self, path: P, progress: F) -> Result<DicomSeriesVolume>
    where
        P: AsRef<Path>,
        F: FnMut(SeriesProgress) -> ControlFlow<()>,
    {
        let path = path.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path).context(ReadDirectorySnafu { path })? {
            let entry = entry.context(ReadDirectorySnafu { path })?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let file = entry.path();
            if !hidden && file.is_file() {
                files.push(file);
            }
        }
        debug!("Found {} files in {}", files.len(), path.display());
        self.load_paths(&files, progress)
    }

    /// Assemble the given files into a volume.
    ///
    /// Files which are not DICOM are skipped with a warning.
    /// Any other failure to load a slice aborts the assembly.
    pub fn load_paths<P, F>(&self, paths: &[P], mut progress: F) -> Result<DicomSeriesVolume>
    where
        P: AsRef<Path> + Sync,
        F: FnMut(SeriesProgress) -> ControlFlow<()>,
    {
        ensure!(!paths.is_empty(), NoFilesSnafu);

        #[cfg(feature = "rayon")]
        let slices: Vec<Option<Slice>> = if self.options.parallel {
            paths
                .par_iter()
                .map(|path| self.load_slice(path.as_ref()))
                .collect::<Result<_>>()?
        } else {
            paths
                .iter()
                .map(|path| self.load_slice(path.as_ref()))
                .collect::<Result<_>>()?
        };
        #[cfg(not(feature = "rayon"))]
        let slices: Vec<Option<Slice>> = paths
            .iter()
            .map(|path| self.load_slice(path.as_ref()))
            .collect::<Result<_>>()?;

        let slices: Vec<Slice> = slices.into_iter().flatten().collect();
        self.assemble(slices, &mut progress)
    }

    /// Assemble a volume from instances already loaded into decoders.
    pub fn from_decoders<F>(
        &self,
        decoders: &[DicomDecoder],
        mut progress: F,
    ) -> Result<DicomSeriesVolume>
    where
        F: FnMut(SeriesProgress) -> ControlFlow<()>,
    {
        let slices = decoders
            .iter()
            .enumerate()
            .map(|(i, decoder)| {
                self.check_cancelled()?;
                let name = match decoder.path() {
                    Some(path) => display_name(&path),
                    None => format!("#{}", i),
                };
                Slice::extract(name, decoder)
            })
            .collect::<Result<Vec<_>>>()?;
        self.assemble(slices, &mut progress)
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => CancelledSnafu.fail(),
            _ => Ok(()),
        }
    }

    fn load_slice(&self, path: &Path) -> Result<Option<Slice>> {
        self.check_cancelled()?;
        let name = display_name(path);
        let decoder = match self.options.open_options.open_file(path) {
            Ok(decoder) => decoder,
            Err(e) if e.is_format_error() => {
                warn!("Skipping '{}': {}", name, Report::from_error(e));
                return Ok(None);
            }
            Err(e) => return Err(e).context(LoadSliceSnafu { name }),
        };
        Slice::extract(name, &decoder).map(Some)
    }

    fn assemble(
        &self,
        mut slices: Vec<Slice>,
        progress: &mut dyn FnMut(SeriesProgress) -> ControlFlow<()>,
    ) -> Result<DicomSeriesVolume> {
        ensure!(!slices.is_empty(), NoFilesSnafu);
        let normal = sort_slices(&mut slices);
        self.validate(&slices)?;

        let first = &slices[0];
        let (width, height) = (first.info.cols, first.info.rows);
        let depth = slices.len();
        let bits_allocated = first.info.bits_allocated;
        let is_signed = first.info.pixel_representation == PixelRepresentation::Signed;
        let slice_len = usize::from(width) * usize::from(height);
        let total = slice_len
            .checked_mul(depth)
            .filter(|n| n.checked_mul(usize::from(bits_allocated) / 8).is_some())
            .context(VolumeTooLargeSnafu {
                width,
                height,
                depth,
            })?;

        let [row_spacing, column_spacing] = first.geometry.pixel_spacing.unwrap_or([1., 1.]);
        let spacing = [column_spacing, row_spacing, slice_gap(&slices, normal)];
        if let Some(normal) = normal {
            check_gaps(&slices, normal, spacing[2], self.options.spacing_tolerance);
        }
        let orientation = match (
            first.geometry.row_direction,
            first.geometry.column_direction,
            normal,
        ) {
            (Some(row), Some(column), Some(normal)) => [row, column, normal],
            _ => IDENTITY,
        };
        let origin = first.geometry.position.unwrap_or([0.; 3]);
        let rescale = first.rescale;
        let series_description = first.description.clone();

        let mut copy = SliceCopier {
            loader: self,
            slice_len,
            total: depth,
            progress,
        };
        let pool = BufferPool::global();
        let voxels = match (bits_allocated, is_signed) {
            (8, false) => Voxels::U8(copy.run(slices, pool.acquire(total), gray8)?),
            (8, true) => Voxels::I8(copy.run(slices, Vec::with_capacity(total), gray8_signed)?),
            (16, false) => Voxels::U16(copy.run(slices, pool.acquire(total), gray16)?),
            _ => Voxels::I16(copy.run(slices, pool.acquire(total), gray16_signed)?),
        };

        info!(
            "Assembled {}x{}x{} volume, spacing {:?}",
            width, height, depth, spacing
        );
        Ok(DicomSeriesVolume {
            voxels,
            width,
            height,
            depth,
            spacing,
            orientation,
            origin,
            rescale_slope: rescale.slope,
            rescale_intercept: rescale.intercept,
            bits_allocated,
            is_signed,
            series_description,
        })
    }

    /// Check every slice against the first one.
    fn validate(&self, slices: &[Slice]) -> Result<()> {
        let Some((first, rest)) = slices.split_first() else {
            return Ok(());
        };
        let expected = (first.info.cols, first.info.rows);
        let expected_repr = representation(&first.info);
        for slice in rest {
            let found = (slice.info.cols, slice.info.rows);
            ensure!(
                found == expected,
                InconsistentDimensionsSnafu {
                    name: &slice.name,
                    expected,
                    found,
                }
            );
            ensure!(
                representation(&slice.info) == expected_repr,
                InconsistentPixelRepresentationSnafu {
                    name: &slice.name,
                    expected: expected_repr,
                    found: representation(&slice.info),
                }
            );
            let tolerance = self.options.orientation_tolerance;
            ensure!(
                same_direction(
                    first.geometry.row_direction,
                    slice.geometry.row_direction,
                    tolerance
                ) && same_direction(
                    first.geometry.column_direction,
                    slice.geometry.column_direction,
                    tolerance
                ),
                InconsistentOrientationSnafu { name: &slice.name }
            );
            if let (Some(a), Some(b)) = (first.geometry.pixel_spacing, slice.geometry.pixel_spacing)
            {
                let tolerance = self.options.spacing_tolerance;
                if (a[0] - b[0]).abs() > tolerance || (a[1] - b[1]).abs() > tolerance {
                    warn!(
                        "Slice '{}' has pixel spacing {:?}, expected {:?}",
                        slice.name, b, a
                    );
                }
            }
            if slice.rescale != first.rescale {
                warn!(
                    "Slice '{}' has a different rescale function, using the one of '{}'",
                    slice.name, first.name
                );
            }
        }
        Ok(())
    }
}

/// The decoded pixels and attributes of one slice.
#[derive(Debug)]
struct Slice {
    name: String,
    info: ImageInfo,
    geometry: Geometry,
    rescale: Rescale,
    description: String,
    pixels: Arc<PixelBuffer>,
}

impl Slice {
    fn extract(name: String, decoder: &DicomDecoder) -> Result<Self> {
        let info = decoder
            .image_info()
            .context(NotAnImageSnafu { name: &name })?;
        ensure!(
            info.samples_per_pixel == 1 && matches!(info.bits_allocated, 8 | 16),
            UnsupportedLayoutSnafu {
                name: &name,
                samples_per_pixel: info.samples_per_pixel,
                bits_allocated: info.bits_allocated,
            }
        );
        let pixels = decoder
            .try_pixels()
            .context(LoadSliceSnafu { name: &name })?;
        Ok(Slice {
            geometry: decoder.geometry().unwrap_or_default(),
            rescale: decoder.rescale(),
            description: decoder
                .series()
                .map(|series| series.description)
                .unwrap_or_default(),
            name,
            info,
            pixels,
        })
    }
}

/// Copies slices one after the other into a volume buffer.
struct SliceCopier<'a, 'p> {
    loader: &'a SeriesLoader,
    slice_len: usize,
    total: usize,
    progress: &'p mut dyn FnMut(SeriesProgress) -> ControlFlow<()>,
}

impl SliceCopier<'_, '_> {
    fn run<T>(
        &mut self,
        slices: Vec<Slice>,
        mut out: Vec<T>,
        samples: fn(&PixelBuffer) -> Option<&[T]>,
    ) -> Result<Vec<T>>
    where
        T: bytemuck::Pod,
    {
        let pool = BufferPool::global();
        for (i, slice) in slices.into_iter().enumerate() {
            let Some(samples) = samples(&slice.pixels).and_then(|s| s.get(..self.slice_len))
            else {
                return UnsupportedLayoutSnafu {
                    name: slice.name,
                    samples_per_pixel: slice.info.samples_per_pixel,
                    bits_allocated: slice.info.bits_allocated,
                }
                .fail();
            };
            out.extend_from_slice(samples);
            if let Ok(pixels) = Arc::try_unwrap(slice.pixels) {
                pixels.recycle(pool);
            }

            let stop = (self.progress)(SeriesProgress::new(i + 1, self.total)).is_break();
            if stop || self.loader.check_cancelled().is_err() {
                debug!("Series assembly cancelled after {} slices", i + 1);
                return CancelledSnafu.fail();
            }
        }
        Ok(out)
    }
}

fn gray8(pixels: &PixelBuffer) -> Option<&[u8]> {
    pixels.as_gray8()
}

fn gray8_signed(pixels: &PixelBuffer) -> Option<&[i8]> {
    pixels.as_gray8().map(bytemuck::cast_slice)
}

fn gray16(pixels: &PixelBuffer) -> Option<&[u16]> {
    pixels.as_gray16()
}

fn gray16_signed(pixels: &PixelBuffer) -> Option<&[i16]> {
    pixels.as_gray16().map(bytemuck::cast_slice)
}

fn representation(info: &ImageInfo) -> (u16, bool) {
    (
        info.bits_allocated,
        info.pixel_representation == PixelRepresentation::Signed,
    )
}

fn same_direction(a: Option<[f64; 3]>, b: Option<[f64; 3]>, tolerance: f64) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.iter().zip(&b).all(|(x, y)| (x - y).abs() <= tolerance),
        _ => false,
    }
}

/// Order slices along the normal of the first image plane.
///
/// Slices without a full geometry are ordered
/// by instance number, then by file name.
/// Returns the normal of the first image plane.
fn sort_slices(slices: &mut [Slice]) -> Option<[f64; 3]> {
    let normal = slices.first()?.geometry.normal();
    let by_position = normal.filter(|&n| slices.iter().all(|s| s.geometry.project(n).is_some()));
    match by_position {
        Some(n) => slices.sort_by(|a, b| {
            let (pa, pb) = (a.geometry.project(n), b.geometry.project(n));
            pa.partial_cmp(&pb)
                .unwrap_or(Ordering::Equal)
                .then_with(|| by_instance_number(a, b))
        }),
        None => {
            debug!("Ordering slices by instance number");
            slices.sort_by(by_instance_number);
        }
    }
    normal
}

/// Compare by instance number, missing numbers last, then by file name.
fn by_instance_number(a: &Slice, b: &Slice) -> Ordering {
    let by_number = match (a.geometry.instance_number, b.geometry.instance_number) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_number.then_with(|| natural_cmp(&a.name, &b.name))
}

/// Warn about gaps between consecutive slices
/// which differ from `spacing` by more than `tolerance`.
fn check_gaps(slices: &[Slice], normal: [f64; 3], spacing: f64, tolerance: f64) {
    let positions: Vec<f64> = slices
        .iter()
        .filter_map(|s| s.geometry.project(normal))
        .collect();
    if positions.len() != slices.len() {
        return;
    }
    for (pair, names) in positions.windows(2).zip(slices.windows(2)) {
        let gap = pair[1] - pair[0];
        if (gap - spacing).abs() > tolerance {
            warn!(
                "Gap of {:.3} mm between '{}' and '{}', expected {:.3} mm",
                gap, names[0].name, names[1].name, spacing
            );
        }
    }
}

/// The distance between slices along the normal.
///
/// Uses the mean gap between image positions if available,
/// then _Spacing Between Slices_, then _Slice Thickness_.
fn slice_gap(slices: &[Slice], normal: Option<[f64; 3]>) -> f64 {
    let from_positions = normal.and_then(|n| {
        let first = slices.first()?.geometry.project(n)?;
        let last = slices.last()?.geometry.project(n)?;
        let gap = (last - first) / (slices.len() - 1) as f64;
        Some(gap)
    });
    let first = slices.first().map(|s| &s.geometry);
    [
        from_positions,
        first.and_then(|g| g.spacing_between_slices),
        first.and_then(|g| g.slice_thickness),
    ]
    .into_iter()
    .flatten()
    .find(|gap| gap.is_finite() && *gap > 1e-6)
    .unwrap_or(1.)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

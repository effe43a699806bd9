//! The voxel volume of an assembled series.
use dcmstack_pixeldata::Rescale;

/// The voxels of a volume, in their stored bit width.
///
/// Signed pixel representations keep the stored bit pattern,
/// reinterpreted as signed integers.
#[derive(Debug, Clone, PartialEq)]
pub enum Voxels {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
}

impl Voxels {
    /// The number of voxels.
    pub fn len(&self) -> usize {
        match self {
            Voxels::U8(v) => v.len(),
            Voxels::I8(v) => v.len(),
            Voxels::U16(v) => v.len(),
            Voxels::I16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The voxels as raw bytes, in native byte order.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Voxels::U8(v) => v,
            Voxels::I8(v) => bytemuck::cast_slice(v),
            Voxels::U16(v) => bytemuck::cast_slice(v),
            Voxels::I16(v) => bytemuck::cast_slice(v),
        }
    }

    /// The value of the voxel at the given index, widened.
    pub fn get(&self, index: usize) -> Option<i32> {
        match self {
            Voxels::U8(v) => v.get(index).map(|&x| i32::from(x)),
            Voxels::I8(v) => v.get(index).map(|&x| i32::from(x)),
            Voxels::U16(v) => v.get(index).map(|&x| i32::from(x)),
            Voxels::I16(v) => v.get(index).map(|&x| i32::from(x)),
        }
    }
}

/// A voxel sample type.
pub trait Voxel: Copy + bytemuck::Pod {
    /// Borrow the voxels if they are of this type.
    fn slice(voxels: &Voxels) -> Option<&[Self]>;
}

macro_rules! impl_voxel {
    ($t: ty, $variant: ident) => {
        impl Voxel for $t {
            fn slice(voxels: &Voxels) -> Option<&[Self]> {
                match voxels {
                    Voxels::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_voxel!(u8, U8);
impl_voxel!(i8, I8);
impl_voxel!(u16, U16);
impl_voxel!(i16, I16);

/// A volume assembled from the slices of a series.
///
/// Voxels are stored slice after slice, in the order of the slices
/// along the normal of the image planes,
/// and row after row within each slice.
#[derive(Debug, Clone, PartialEq)]
pub struct DicomSeriesVolume {
    pub voxels: Voxels,
    /// the number of columns
    pub width: u16,
    /// the number of rows
    pub height: u16,
    /// the number of slices
    pub depth: usize,
    /// distance between voxel centers in mm, along x, y and z
    pub spacing: [f64; 3],
    /// the row direction, the column direction and the slice normal
    pub orientation: [[f64; 3]; 3],
    /// the position of the first voxel in the patient coordinate system
    pub origin: [f64; 3],
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    pub bits_allocated: u16,
    pub is_signed: bool,
    pub series_description: String,
}

impl DicomSeriesVolume {
    /// The number of voxels of one slice.
    pub fn slice_len(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    /// The number of bytes of one voxel.
    pub fn bytes_per_voxel(&self) -> usize {
        usize::from(self.bits_allocated) / 8
    }

    /// The modality rescale function of the series.
    pub fn rescale(&self) -> Rescale {
        Rescale::new(self.rescale_slope, self.rescale_intercept)
    }

    /// The voxels, if stored as unsigned 8-bit samples.
    pub fn voxels_u8(&self) -> Option<&[u8]> {
        u8::slice(&self.voxels)
    }

    /// The voxels, if stored as signed 8-bit samples.
    pub fn voxels_i8(&self) -> Option<&[i8]> {
        i8::slice(&self.voxels)
    }

    /// The voxels, if stored as unsigned 16-bit samples.
    pub fn voxels_u16(&self) -> Option<&[u16]> {
        u16::slice(&self.voxels)
    }

    /// The voxels, if stored as signed 16-bit samples.
    pub fn voxels_i16(&self) -> Option<&[i16]> {
        i16::slice(&self.voxels)
    }

    /// The voxels of the slice at the given depth.
    pub fn slice<T: Voxel>(&self, index: usize) -> Option<&[T]> {
        let len = self.slice_len();
        T::slice(&self.voxels)?.get(index * len..(index + 1) * len)
    }

    /// The rescaled value of the voxel at the given column, row and slice.
    pub fn value_at(&self, x: usize, y: usize, z: usize) -> Option<f64> {
        if x >= usize::from(self.width) || y >= usize::from(self.height) {
            return None;
        }
        let index = z * self.slice_len() + y * usize::from(self.width) + x;
        let stored = self.voxels.get(index)?;
        Some(self.rescale().apply(f64::from(stored)))
    }

    /// The position of the center of a voxel in the patient coordinate system.
    pub fn position_of(&self, x: f64, y: f64, z: f64) -> [f64; 3] {
        let [row, col, normal] = self.orientation;
        let [sx, sy, sz] = self.spacing;
        let mut p = self.origin;
        for (i, p) in p.iter_mut().enumerate() {
            *p += row[i] * x * sx + col[i] * y * sy + normal[i] * z * sz;
        }
        p
    }
}

#[cfg(feature = "ndarray")]
mod array {
    use super::{DicomSeriesVolume, Voxel};
    use ndarray::{Array3, ArrayView3};

    impl DicomSeriesVolume {
        /// View the voxels as a 3D array
        /// of shape (depth, height, width).
        ///
        /// Returns `None` if the voxels are not of type `T`.
        pub fn view<T: Voxel>(&self) -> Option<ArrayView3<'_, T>> {
            let voxels = T::slice(&self.voxels)?;
            ArrayView3::from_shape(
                (
                    self.depth,
                    usize::from(self.height),
                    usize::from(self.width),
                ),
                voxels,
            )
            .ok()
        }

        /// Copy the voxels into a 3D array of rescaled values,
        /// of shape (depth, height, width).
        pub fn to_array3(&self) -> Array3<f32> {
            let rescale = self.rescale();
            let shape = (
                self.depth,
                usize::from(self.height),
                usize::from(self.width),
            );
            Array3::from_shape_fn(shape, |(z, y, x)| {
                let index = (z * shape.1 + y) * shape.2 + x;
                self.voxels
                    .get(index)
                    .map_or(0., |v| rescale.apply(f64::from(v)) as f32)
            })
        }
    }
}

use std::ops::Index;

use ndarray::{Array1, Array2, Array3, ArrayView3, Axis};
use num::ToPrimitive;

use crate::Idx2d;

mod slice;
mod tags;

pub use slice::ScanSlice;
pub use tags::{MrTag, MrTags, PhaseEncodeDirection};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 体素分辨率, 以毫米为单位.
///
/// 分别代表层厚 (相邻切片方向), 行间距 (自然图像的垂直方向)
/// 和列间距 (自然图像的水平方向).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelSpacing {
    /// 层厚.
    pub slice_thickness: f64,
    /// 行间距, 即单个像素的高.
    pub row: f64,
    /// 列间距, 即单个像素的宽.
    pub column: f64,
}

impl PixelSpacing {
    /// 构建体素分辨率. 任何一个分量非正或非有限时返回 `None`.
    pub fn new(slice_thickness: f64, row: f64, column: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(slice_thickness) && valid(row) && valid(column) {
            Some(Self {
                slice_thickness,
                row,
                column,
            })
        } else {
            None
        }
    }

    /// 各向同性的平面分辨率.
    #[inline]
    pub fn isotropic(pixel: f64, slice_thickness: f64) -> Option<Self> {
        Self::new(slice_thickness, pixel, pixel)
    }
}

/// 带体素分辨率的图像的共用属性.
pub trait SpacingAttr {
    /// 获取体素分辨率.
    fn spacing(&self) -> PixelSpacing;

    /// 获取 width 方向 (自然 2D 图像的水平方向) 像素分辨率, 以毫米为单位.
    #[inline]
    fn width_mm(&self) -> f64 {
        self.spacing().column
    }

    /// 获取 height 方向 (自然 2D 图像的垂直方向) 像素分辨率, 以毫米为单位.
    #[inline]
    fn height_mm(&self) -> f64 {
        self.spacing().row
    }

    /// 获取层厚, 以毫米为单位.
    #[inline]
    fn z_mm(&self) -> f64 {
        self.spacing().slice_thickness
    }

    /// 水平方向长度 `mm` (毫米) 对应多少个像素.
    #[inline]
    fn mm_to_px_x(&self, mm: f64) -> f64 {
        mm / self.width_mm()
    }

    /// 垂直方向长度 `mm` (毫米) 对应多少个像素.
    #[inline]
    fn mm_to_px_y(&self, mm: f64) -> f64 {
        mm / self.height_mm()
    }

    /// 获取切片方向的像素实际面积值, 以平方毫米为单位.
    #[inline]
    fn slice_pixel(&self) -> f64 {
        let s = self.spacing();
        s.row * s.column
    }
}

/// 一次采集得到的 MR 图像序列. 像素值以 `f32` 保存, 按照 `(z, h, w)` 访问.
///
/// 序列一经构建即为只读.
#[derive(Debug, Clone)]
pub struct MrSeries {
    data: Array3<f32>,
    spacing: PixelSpacing,
    tags: MrTags,
}

impl SpacingAttr for MrSeries {
    #[inline]
    fn spacing(&self) -> PixelSpacing {
        self.spacing
    }
}

impl Index<(usize, usize, usize)> for MrSeries {
    type Output = f32;

    #[inline]
    fn index(&self, index: (usize, usize, usize)) -> &Self::Output {
        &self.data[index]
    }
}

impl MrSeries {
    /// 由 `(z, h, w)` 形状的体数据构建序列.
    pub fn new(data: Array3<f32>, spacing: PixelSpacing, tags: MrTags) -> Self {
        Self {
            data,
            spacing,
            tags,
        }
    }

    /// 由若干形状相同的切片构建序列. 切片为空或形状不一致时返回 `None`.
    pub fn from_slices(
        slices: &[Array2<f32>],
        spacing: PixelSpacing,
        tags: MrTags,
    ) -> Option<Self> {
        let first = slices.first()?;
        if slices.iter().any(|s| s.dim() != first.dim()) {
            return None;
        }
        let views: Vec<_> = slices.iter().map(|s| s.view()).collect();
        let data = ndarray::stack(Axis(0), &views).ok()?;
        Some(Self::new(data, spacing, tags))
    }

    /// 由任意数值类型的切片 (例如扫描仪存储的 `u16`/`i16` 像素) 构建序列.
    ///
    /// # 注意
    ///
    /// 像素值通过 [`ToPrimitive::to_f32`] 转换, 转换失败时返回 `None`.
    /// 其余同 [`MrSeries::from_slices`].
    pub fn from_raw_slices<T>(
        slices: &[Array2<T>],
        spacing: PixelSpacing,
        tags: MrTags,
    ) -> Option<Self>
    where
        T: ToPrimitive,
    {
        let converted = slices
            .iter()
            .map(|s| {
                let v: Option<Vec<f32>> = s.iter().map(|p| p.to_f32()).collect();
                Array2::from_shape_vec(s.dim(), v?).ok()
            })
            .collect::<Option<Vec<_>>>()?;
        Self::from_slices(&converted, spacing, tags)
    }

    /// 获取水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// 获取切片形状 `(h, w)`.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.data.dim();
        (h, w)
    }

    /// 获取序列的 MR 标签.
    #[inline]
    pub fn tags(&self) -> &MrTags {
        &self.tags
    }

    /// 获得底层数据的一份 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView3<f32> {
        self.data.view()
    }

    /// 获取第 `z` 个切片. 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z: usize) -> ScanSlice<'_> {
        ScanSlice::new(self.data.index_axis(Axis(0), z), self.spacing)
    }

    /// 获取第 `z` 个切片. 越界时返回 `None`.
    #[inline]
    pub fn get_slice(&self, z: usize) -> Option<ScanSlice<'_>> {
        (z < self.len_z()).then(|| self.slice_at(z))
    }

    /// 获取 z 轴强度剖面: 每个切片的平均像素值.
    pub fn z_profile(&self) -> Array1<f64> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                use rayon::iter::{IntoParallelIterator, ParallelIterator};

                let means: Vec<f64> = (0..self.len_z())
                    .into_par_iter()
                    .map(|z| self.slice_at(z).mean())
                    .collect();
                Array1::from_vec(means)
            } else {
                Array1::from_iter((0..self.len_z()).map(|z| self.slice_at(z).mean()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MrSeries, MrTags, PixelSpacing, SpacingAttr};
    use ndarray::Array2;

    #[test]
    fn test_spacing_invalid() {
        assert!(PixelSpacing::new(5.0, 0.0, 1.0).is_none());
        assert!(PixelSpacing::new(f64::NAN, 1.0, 1.0).is_none());
        assert!(PixelSpacing::new(5.0, 0.9, 1.1).is_some());
    }

    #[test]
    fn test_series_from_slices() {
        let spacing = PixelSpacing::isotropic(0.5, 5.0).unwrap();
        let slices: Vec<_> = (0..3)
            .map(|z| Array2::from_elem((4, 6), z as f32))
            .collect();
        let s = MrSeries::from_slices(&slices, spacing, MrTags::default()).unwrap();
        assert_eq!(s.len_z(), 3);
        assert_eq!(s.slice_shape(), (4, 6));
        assert_eq!(s[(2, 3, 5)], 2.0);
        assert_eq!(s.z_profile().to_vec(), vec![0.0, 1.0, 2.0]);
        assert!(s.get_slice(3).is_none());
        assert_eq!(s.mm_to_px_x(10.0), 20.0);
        assert_eq!(s.slice_pixel(), 0.25);
    }

    #[test]
    fn test_series_from_raw() {
        let spacing = PixelSpacing::isotropic(1.0, 5.0).unwrap();
        let slices: Vec<Array2<u16>> = (0..2)
            .map(|z| Array2::from_shape_fn((3, 3), |(h, w)| (z * 100 + h * 3 + w) as u16))
            .collect();
        let s = MrSeries::from_raw_slices(&slices, spacing, MrTags::default()).unwrap();
        assert_eq!(s[(1, 2, 1)], 107.0);
        assert_eq!(s.z_profile().to_vec(), vec![4.0, 104.0]);

        let signed = vec![Array2::from_elem((2, 2), -3i16), Array2::from_elem((2, 3), 1i16)];
        assert!(MrSeries::from_raw_slices(&signed, spacing, MrTags::default()).is_none());
    }

    #[test]
    fn test_series_shape_mismatch() {
        let spacing = PixelSpacing::isotropic(1.0, 5.0).unwrap();
        let slices = vec![Array2::zeros((4, 4)), Array2::zeros((4, 5))];
        assert!(MrSeries::from_slices(&slices, spacing, MrTags::default()).is_none());
        assert!(MrSeries::from_slices(&[], spacing, MrTags::default()).is_none());
    }
}

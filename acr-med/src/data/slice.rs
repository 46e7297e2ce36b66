use std::ops::Index;

use ndarray::{s, Array2, ArrayView2};

use super::{PixelSpacing, SpacingAttr};
use crate::Idx2d;

/// 不可变、借用的二维 MR 切片.
#[derive(Clone, Copy)]
pub struct ScanSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::MrSeries`].
    data: ArrayView2<'a, f32>,
    spacing: PixelSpacing,
}

impl Index<Idx2d> for ScanSlice<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl SpacingAttr for ScanSlice<'_> {
    #[inline]
    fn spacing(&self) -> PixelSpacing {
        self.spacing
    }
}

impl std::fmt::Debug for ScanSlice<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (h, w) = self.shape();
        f.write_fmt(format_args!(
            "ScanSlice {{ shape: ({h}, {w}), spacing: {:?} }}",
            self.spacing
        ))
    }
}

impl<'a> ScanSlice<'a> {
    /// 由二维视图和分辨率构建切片.
    #[inline]
    pub fn new(data: ArrayView2<'a, f32>, spacing: PixelSpacing) -> Self {
        Self { data, spacing }
    }

    /// 获得底层数据的一份 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<'a, f32> {
        self.data
    }

    /// 获取切片形状 `(h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 图像行数.
    #[inline]
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// 图像列数.
    #[inline]
    pub fn columns(&self) -> usize {
        self.data.ncols()
    }

    /// 获取像素坐标 `(x, y)` 处的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get_xy(&self, x: i64, y: i64) -> Option<f32> {
        if x < 0 || y < 0 {
            return None;
        }
        self.data.get((y as usize, x as usize)).copied()
    }

    /// 整个切片的平均像素值. 空切片返回 `NaN`.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return f64::NAN;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }

    /// 获取左闭右开区域 `[xmin, xmax) x [ymin, ymax)` 与图像相交的部分.
    ///
    /// 区域会被裁剪到图像范围内; 若裁剪后为空, 返回 `None`.
    pub fn region(&self, xmin: i64, ymin: i64, xmax: i64, ymax: i64) -> Option<ArrayView2<'a, f32>> {
        let (h, w) = self.shape();
        let clip = |lo: i64, hi: i64, len: usize| {
            let lo = lo.clamp(0, len as i64) as usize;
            let hi = hi.clamp(0, len as i64) as usize;
            (lo < hi).then_some((lo, hi))
        };
        let (x0, x1) = clip(xmin, xmax, w)?;
        let (y0, y1) = clip(ymin, ymax, h)?;
        Some(self.data.slice_move(s![y0..y1, x0..x1]))
    }

    /// 左闭右开区域 `[xmin, xmax) x [ymin, ymax)` 的平均像素值.
    /// 与图像无交集时返回 `None`.
    pub fn region_mean(&self, xmin: i64, ymin: i64, xmax: i64, ymax: i64) -> Option<f64> {
        let r = self.region(xmin, ymin, xmax, ymax)?;
        Some(r.iter().map(|&v| v as f64).sum::<f64>() / r.len() as f64)
    }

    /// 双线性插值获取亚像素位置 `(x, y)` 处的值. 越界时返回 `None`.
    pub fn bilinear(&self, x: f64, y: f64) -> Option<f64> {
        let (h, w) = self.shape();
        if h == 0 || w == 0 || !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return None;
        }
        if x > (w - 1) as f64 || y > (h - 1) as f64 {
            return None;
        }
        let (x0, y0) = (x.floor() as usize, y.floor() as usize);
        let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
        let (fx, fy) = (x - x0 as f64, y - y0 as f64);
        let at = |yy: usize, xx: usize| self.data[(yy, xx)] as f64;

        let top = at(y0, x0) * (1.0 - fx) + at(y0, x1) * fx;
        let bottom = at(y1, x0) * (1.0 - fx) + at(y1, x1) * fx;
        Some(top * (1.0 - fy) + bottom * fy)
    }

    /// 复制一份 `f64` 类型的像素矩阵.
    pub fn to_f64(&self) -> Array2<f64> {
        self.data.mapv(|v| v as f64)
    }
}

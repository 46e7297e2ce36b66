//! 感兴趣区域 (ROI).
//!
//! ROI 以像素坐标描述 (`x` 为列, `y` 为行), 并通过 [`ImageRef`] 关联到
//! 主序列或重复序列中的某一个切片. 统计量总是在调用时针对给定图像计算,
//! ROI 本身不持有像素数据.

use ndarray::{Array1, Array2, ArrayView2};

use crate::data::{ScanSlice, SpacingAttr};

mod registry;

pub use registry::{MemoryRegistry, RoiRegistry};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// ROI 所在图像的来源序列.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SeriesSource {
    /// 主序列.
    Primary,
    /// 重复采集的序列 (用于减影法 SNR).
    Repeat,
}

/// ROI 所在的图像: 来源序列与切片下标.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageRef {
    /// 来源序列.
    pub source: SeriesSource,
    /// 切片下标.
    pub slice: usize,
}

impl ImageRef {
    /// 主序列上的第 `slice` 个切片.
    #[inline]
    pub const fn primary(slice: usize) -> Self {
        Self {
            source: SeriesSource::Primary,
            slice,
        }
    }

    /// 重复序列上的第 `slice` 个切片.
    #[inline]
    pub const fn repeat(slice: usize) -> Self {
        Self {
            source: SeriesSource::Repeat,
            slice,
        }
    }
}

/// ROI 的几何形状, 以像素为单位.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RoiShape {
    /// 轴对齐矩形, 覆盖 `[xmin, xmin + width) x [ymin, ymin + height)`.
    Rectangle {
        /// 左边界 (含).
        xmin: i64,
        /// 上边界 (含).
        ymin: i64,
        /// 宽度.
        width: i64,
        /// 高度.
        height: i64,
    },

    /// 轴对齐椭圆, 覆盖 `((x - xcent) / a)^2 + ((y - ycent) / b)^2 <= 1` 的像素.
    Ellipse {
        /// 中心列坐标.
        xcent: f64,
        /// 中心行坐标.
        ycent: f64,
        /// 水平半轴.
        a: f64,
        /// 垂直半轴.
        b: f64,
    },

    /// 线段 `(x1, y1) -> (x2, y2)`.
    Line {
        /// 起点列坐标.
        x1: f64,
        /// 起点行坐标.
        y1: f64,
        /// 终点列坐标.
        x2: f64,
        /// 终点行坐标.
        y2: f64,
    },

    /// 单个点.
    Point {
        /// 列坐标.
        x: f64,
        /// 行坐标.
        y: f64,
    },
}

impl RoiShape {
    /// 由左闭右开边界 `[xmin, xmax) x [ymin, ymax)` 构造矩形.
    #[inline]
    pub fn rect_from_bounds(xmin: i64, ymin: i64, xmax: i64, ymax: i64) -> Self {
        Self::Rectangle {
            xmin,
            ymin,
            width: xmax - xmin,
            height: ymax - ymin,
        }
    }

    /// 形状的左闭右开包围盒 `(xmin, ymin, xmax, ymax)`. 线段和点返回 `None`.
    pub fn bounding_box(&self) -> Option<(i64, i64, i64, i64)> {
        match *self {
            Self::Rectangle {
                xmin,
                ymin,
                width,
                height,
            } => Some((xmin, ymin, xmin + width, ymin + height)),
            Self::Ellipse { xcent, ycent, a, b } => Some((
                (xcent - a).floor() as i64,
                (ycent - b).floor() as i64,
                (xcent + a).ceil() as i64 + 1,
                (ycent + b).ceil() as i64 + 1,
            )),
            Self::Line { .. } | Self::Point { .. } => None,
        }
    }

    /// 像素 `(x, y)` 是否落在形状内部.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        match *self {
            Self::Rectangle {
                xmin,
                ymin,
                width,
                height,
            } => (xmin..xmin + width).contains(&x) && (ymin..ymin + height).contains(&y),
            Self::Ellipse { xcent, ycent, a, b } => {
                if a <= 0.0 || b <= 0.0 {
                    return false;
                }
                let dx = (x as f64 - xcent) / a;
                let dy = (y as f64 - ycent) / b;
                dx * dx + dy * dy <= 1.0
            }
            Self::Point { x: px, y: py } => px.round() as i64 == x && py.round() as i64 == y,
            Self::Line { .. } => false,
        }
    }
}

/// 沿线段采样得到的剖面.
#[derive(Clone, Debug, PartialEq)]
pub struct LineProfile {
    /// 采样值.
    pub values: Array1<f64>,
    /// 相邻采样点之间的物理距离, 以毫米为单位.
    pub step_mm: f64,
}

/// 带名字与所在图像的 ROI.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Roi {
    /// 名字, 在同一模块同一图像中唯一.
    pub name: String,
    /// 所在图像.
    pub image: ImageRef,
    /// 几何形状.
    pub shape: RoiShape,
}

impl Roi {
    /// 构造 ROI.
    pub fn new(name: impl Into<String>, image: ImageRef, shape: RoiShape) -> Self {
        Self {
            name: name.into(),
            image,
            shape,
        }
    }

    /// 将 ROI 以相同像素位置复制到另一幅图像.
    pub fn copy_to(&self, image: ImageRef) -> Self {
        Self {
            name: self.name.clone(),
            image,
            shape: self.shape,
        }
    }

    /// 与图像形状 `(h, w)` 相同的布尔掩码.
    pub fn mask(&self, shape: (usize, usize)) -> Array2<bool> {
        let (h, w) = shape;
        let mut mask = Array2::from_elem((h, w), false);
        if let RoiShape::Line { .. } = self.shape {
            return mask;
        }
        let (x0, y0, x1, y1) = self.clipped_box(h, w);
        for y in y0..y1 {
            for x in x0..x1 {
                mask[(y, x)] = self.shape.contains(x as i64, y as i64);
            }
        }
        mask
    }

    /// 包围盒与图像的交集, 以 `usize` 表示. 点的包围盒为其所在像素.
    fn clipped_box(&self, h: usize, w: usize) -> (usize, usize, usize, usize) {
        let (xmin, ymin, xmax, ymax) = match self.shape {
            RoiShape::Point { x, y } => {
                let (px, py) = (x.round() as i64, y.round() as i64);
                (px, py, px + 1, py + 1)
            }
            _ => self.shape.bounding_box().unwrap_or((0, 0, 0, 0)),
        };
        let cx = |v: i64| v.clamp(0, w as i64) as usize;
        let cy = |v: i64| v.clamp(0, h as i64) as usize;
        (cx(xmin), cy(ymin), cx(xmax), cy(ymax))
    }

    /// ROI 在任意像素矩阵上覆盖的像素值, 按行优先顺序排列.
    ///
    /// 超出图像的部分会被裁剪. 线段没有面积, 返回空数组.
    pub fn values_in<A>(&self, image: ArrayView2<A>) -> Vec<f64>
    where
        A: Copy + Into<f64>,
    {
        if let RoiShape::Line { .. } = self.shape {
            return vec![];
        }
        let (h, w) = image.dim();
        let (x0, y0, x1, y1) = self.clipped_box(h, w);
        let mut values = Vec::new();
        for y in y0..y1 {
            for x in x0..x1 {
                if self.shape.contains(x as i64, y as i64) {
                    values.push(image[(y, x)].into());
                }
            }
        }
        values
    }

    /// ROI 在切片上覆盖的像素值.
    #[inline]
    pub fn pixel_values(&self, slice: &ScanSlice) -> Vec<f64> {
        self.values_in(slice.array_view())
    }

    /// ROI 覆盖像素的均值. 与图像无交集时返回 `None`.
    pub fn mean(&self, slice: &ScanSlice) -> Option<f64> {
        let v = self.pixel_values(slice);
        (!v.is_empty()).then(|| v.iter().sum::<f64>() / v.len() as f64)
    }

    /// 矩形 ROI 与图像相交部分的视图.
    fn rect_region<'a>(&self, slice: &ScanSlice<'a>) -> Option<ArrayView2<'a, f32>> {
        match self.shape {
            RoiShape::Rectangle { .. } => {
                let (xmin, ymin, xmax, ymax) = self.shape.bounding_box()?;
                slice.region(xmin, ymin, xmax, ymax)
            }
            _ => None,
        }
    }

    /// 水平剖面: 矩形 ROI 每一列的均值. 非矩形或与图像无交集时返回 `None`.
    pub fn h_profile(&self, slice: &ScanSlice) -> Option<Array1<f64>> {
        let r = self.rect_region(slice)?;
        let n = r.nrows() as f64;
        Some(Array1::from_iter(
            r.columns()
                .into_iter()
                .map(|c| c.iter().map(|&v| v as f64).sum::<f64>() / n),
        ))
    }

    /// 垂直剖面: 矩形 ROI 每一行的均值. 非矩形或与图像无交集时返回 `None`.
    pub fn v_profile(&self, slice: &ScanSlice) -> Option<Array1<f64>> {
        let r = self.rect_region(slice)?;
        let n = r.ncols() as f64;
        Some(Array1::from_iter(
            r.rows()
                .into_iter()
                .map(|c| c.iter().map(|&v| v as f64).sum::<f64>() / n),
        ))
    }

    /// 沿线段的剖面.
    ///
    /// 共采样 `ceil(length) + 1` 个等距点, 使用双线性插值;
    /// 端点为整数的轴对齐线段恰好采样到像素中心.
    /// 全部落在图像外或 ROI 不是线段时返回 `None`.
    ///
    /// # 注意
    ///
    /// 落在图像外的采样点取值为 0, 第 `i` 个值始终对应距起点 `i * step_mm` 处.
    pub fn line_profile(&self, slice: &ScanSlice) -> Option<LineProfile> {
        let RoiShape::Line { x1, y1, x2, y2 } = self.shape else {
            return None;
        };
        let (dx, dy) = (x2 - x1, y2 - y1);
        let length = dx.hypot(dy);
        let n = length.ceil() as usize + 1;
        let samples: Vec<Option<f64>> = (0..n)
            .map(|i| {
                let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
                slice.bilinear(x1 + t * dx, y1 + t * dy)
            })
            .collect();
        if samples.iter().all(Option::is_none) {
            return None;
        }
        let values: Vec<f64> = samples.into_iter().map(|v| v.unwrap_or(0.0)).collect();
        let physical = (dx * slice.width_mm()).hypot(dy * slice.height_mm());
        let step_mm = if n > 1 { physical / (n - 1) as f64 } else { 0.0 };
        Some(LineProfile {
            values: Array1::from_vec(values),
            step_mm,
        })
    }
}

/// 一个模块绘制出的全部 ROI, 按绘制顺序保存.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiSet {
    rois: Vec<Roi>,
}

impl RoiSet {
    /// 空集合.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入一个 ROI. 同名同图像的 ROI 会被替换.
    pub fn push(&mut self, roi: Roi) {
        match self
            .rois
            .iter_mut()
            .find(|r| r.name == roi.name && r.image == roi.image)
        {
            Some(old) => *old = roi,
            None => self.rois.push(roi),
        }
    }

    /// 按名字查找 ROI (取第一个).
    pub fn get(&self, name: &str) -> Option<&Roi> {
        self.rois.iter().find(|r| r.name == name)
    }

    /// 按名字和图像查找 ROI.
    pub fn get_on(&self, name: &str, image: ImageRef) -> Option<&Roi> {
        self.rois.iter().find(|r| r.name == name && r.image == image)
    }

    /// 遍历全部 ROI.
    pub fn iter(&self) -> std::slice::Iter<'_, Roi> {
        self.rois.iter()
    }

    /// ROI 个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rois.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    /// 将全部 ROI 以模块名 `module` 登记到 `registry` 中.
    pub fn register_into<R: RoiRegistry + ?Sized>(&self, module: &str, registry: &mut R) {
        for roi in &self.rois {
            registry.register(module, roi.clone());
        }
    }
}

impl<'a> IntoIterator for &'a RoiSet {
    type Item = &'a Roi;
    type IntoIter = std::slice::Iter<'a, Roi>;

    fn into_iter(self) -> Self::IntoIter {
        self.rois.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PixelSpacing;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn image() -> Array2<f32> {
        Array2::from_shape_fn((20, 30), |(h, w)| (h * 100 + w) as f32)
    }

    fn spacing() -> PixelSpacing {
        PixelSpacing::new(5.0, 2.0, 0.5).unwrap()
    }

    #[test]
    fn test_rectangle_stats() {
        let img = image();
        let sli = ScanSlice::new(img.view(), spacing());
        let roi = Roi::new("r", ImageRef::primary(0), RoiShape::rect_from_bounds(2, 3, 5, 5));
        assert_eq!(roi.pixel_values(&sli), vec![302.0, 303.0, 304.0, 402.0, 403.0, 404.0]);
        assert_abs_diff_eq!(roi.mean(&sli).unwrap(), 353.0);
        assert_eq!(roi.h_profile(&sli).unwrap().to_vec(), vec![352.0, 353.0, 354.0]);
        assert_eq!(roi.v_profile(&sli).unwrap().to_vec(), vec![303.0, 403.0]);
        assert_eq!(roi.mask((20, 30)).iter().filter(|&&m| m).count(), 6);
    }

    #[test]
    fn test_clipped_and_outside() {
        let img = image();
        let sli = ScanSlice::new(img.view(), spacing());
        let part = Roi::new("p", ImageRef::primary(0), RoiShape::rect_from_bounds(-2, -2, 1, 1));
        assert_eq!(part.pixel_values(&sli), vec![0.0]);
        let out = Roi::new("o", ImageRef::primary(0), RoiShape::rect_from_bounds(40, 0, 45, 4));
        assert!(out.pixel_values(&sli).is_empty());
        assert!(out.mean(&sli).is_none());
        assert!(out.h_profile(&sli).is_none());
    }

    #[test]
    fn test_ellipse() {
        let e = RoiShape::Ellipse {
            xcent: 10.0,
            ycent: 10.0,
            a: 3.0,
            b: 2.0,
        };
        assert!(e.contains(13, 10));
        assert!(e.contains(10, 12));
        assert!(!e.contains(13, 11));
        let roi = Roi::new("e", ImageRef::primary(0), e);
        let ones = Array2::<f64>::ones((20, 20));
        // 行 8..=12 分别有 1, 5, 7, 5, 1 个像素.
        assert_eq!(roi.values_in(ones.view()).len(), 19);
    }

    #[test]
    fn test_line_profile() {
        let img = image();
        let sli = ScanSlice::new(img.view(), spacing());
        let h = Roi::new(
            "h",
            ImageRef::primary(0),
            RoiShape::Line {
                x1: 2.0,
                y1: 1.0,
                x2: 6.0,
                y2: 1.0,
            },
        );
        let p = h.line_profile(&sli).unwrap();
        assert_eq!(p.values.to_vec(), vec![102.0, 103.0, 104.0, 105.0, 106.0]);
        assert_abs_diff_eq!(p.step_mm, 0.5);

        let d = Roi::new(
            "d",
            ImageRef::primary(0),
            RoiShape::Line {
                x1: 0.0,
                y1: 0.0,
                x2: 3.0,
                y2: 3.0,
            },
        );
        let p = d.line_profile(&sli).unwrap();
        // ceil(3 * sqrt(2)) + 1 = 6 个采样点.
        assert_eq!(p.values.len(), 6);
        assert_abs_diff_eq!(p.values[5], 303.0, epsilon = 1e-9);
        let physical = (1.5f64).hypot(6.0);
        assert_abs_diff_eq!(p.step_mm, physical / 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_line_profile_keeps_positions() {
        let img = image();
        let sli = ScanSlice::new(img.view(), spacing());
        // 前两个采样点落在图像左侧之外.
        let l = Roi::new(
            "l",
            ImageRef::primary(0),
            RoiShape::Line {
                x1: -2.0,
                y1: 1.0,
                x2: 2.0,
                y2: 1.0,
            },
        );
        let p = l.line_profile(&sli).unwrap();
        assert_eq!(p.values.to_vec(), vec![0.0, 0.0, 100.0, 101.0, 102.0]);
        assert_abs_diff_eq!(p.step_mm, 0.5);

        let out = Roi::new(
            "o",
            ImageRef::primary(0),
            RoiShape::Line {
                x1: 40.0,
                y1: 1.0,
                x2: 45.0,
                y2: 1.0,
            },
        );
        assert!(out.line_profile(&sli).is_none());
    }

    #[test]
    fn test_copy_to_and_set() {
        let roi = Roi::new("snr", ImageRef::primary(4), RoiShape::rect_from_bounds(0, 0, 2, 2));
        let copy = roi.copy_to(ImageRef::repeat(4));
        assert_eq!(copy.shape, roi.shape);
        assert_eq!(copy.image, ImageRef::repeat(4));

        let mut set = RoiSet::new();
        set.push(roi.clone());
        set.push(copy.clone());
        assert_eq!(set.len(), 2);
        let moved = Roi::new("snr", ImageRef::primary(4), RoiShape::rect_from_bounds(1, 1, 3, 3));
        set.push(moved.clone());
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("snr"), Some(&moved));
        assert_eq!(set.get_on("snr", ImageRef::repeat(4)), Some(&copy));
    }
}

//! 体模宽度 (几何线性度与几何畸变).
//!
//! 过体模中心画四条等长线段: 垂直, 水平与两条 45° 对角线,
//! 在各自剖面 `max_perc` % 处测宽度并换算为毫米.

use super::{require, round, AnalysisError, AnalysisInput, AnalysisResult, PhantomModule};
use crate::consts::{COS_SIN_PI_4, NOMINAL_PHANTOM_WIDTH};
use crate::context::MedAcrContext;
use crate::data::SpacingAttr;
use crate::profile::nth_max_bounds;
use crate::roi::{ImageRef, Roi, RoiSet, RoiShape};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 线段半长 (毫米).
const HALF_LINE_LENGTH: f64 = 100.0;

/// 测宽线段.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WidthLine {
    /// 垂直线段.
    Vertical,
    /// 右上到左下的对角线.
    UpSlope,
    /// 水平线段.
    Horizontal,
    /// 左上到右下的对角线.
    DownSlope,
}

impl WidthLine {
    /// 全部四条线段, 按绘制顺序.
    pub const ALL: [Self; 4] = [Self::Vertical, Self::UpSlope, Self::Horizontal, Self::DownSlope];

    /// ROI 名字.
    pub const fn roi_name(&self) -> &'static str {
        match self {
            Self::Vertical => "Vertical Line",
            Self::UpSlope => "Up Slope Line",
            Self::Horizontal => "Horizontal Line",
            Self::DownSlope => "Down Slope Line",
        }
    }

    /// 线段半长在 x, y 方向上的像素分量 `(xdiff, ydiff)`.
    /// 线段从 `(xcent - xdiff, ycent - ydiff)` 画到 `(xcent + xdiff, ycent + ydiff)`.
    fn half_extent(&self, pixel_width: f64, pixel_height: f64) -> (f64, f64) {
        let (x, y) = (HALF_LINE_LENGTH / pixel_width, HALF_LINE_LENGTH / pixel_height);
        match self {
            Self::Vertical => (0.0, y),
            Self::Horizontal => (x, 0.0),
            Self::DownSlope => (x * COS_SIN_PI_4, y * COS_SIN_PI_4),
            Self::UpSlope => (-x * COS_SIN_PI_4, y * COS_SIN_PI_4),
        }
    }
}

impl std::fmt::Display for WidthLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Vertical => "vertical",
            Self::UpSlope => "up slope",
            Self::Horizontal => "horizontal",
            Self::DownSlope => "down slope",
        };
        f.write_str(s)
    }
}

/// 体模宽度配置.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhantomWidthSpec {
    /// 测宽位置, 以剖面最大值的百分比表示.
    pub max_perc: f64,
    /// 垂直线段是否计入平均.
    pub include_vertical: bool,
    /// 右上到左下的对角线是否计入平均.
    pub include_up_slope: bool,
    /// 水平线段是否计入平均.
    pub include_horizontal: bool,
    /// 左上到右下的对角线是否计入平均.
    pub include_down_slope: bool,
}

impl Default for PhantomWidthSpec {
    fn default() -> Self {
        Self {
            max_perc: 50.0,
            include_vertical: true,
            include_up_slope: true,
            include_horizontal: true,
            include_down_slope: true,
        }
    }
}

impl PhantomWidthSpec {
    /// `line` 是否计入平均.
    pub fn includes(&self, line: WidthLine) -> bool {
        match line {
            WidthLine::Vertical => self.include_vertical,
            WidthLine::UpSlope => self.include_up_slope,
            WidthLine::Horizontal => self.include_horizontal,
            WidthLine::DownSlope => self.include_down_slope,
        }
    }
}

/// 体模宽度输出. 各宽度以毫米为单位.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhantomWidthOutput {
    /// 使用的层面索引.
    pub slice: usize,
    /// 垂直宽度.
    pub vertical: Option<f64>,
    /// 右上到左下的对角宽度.
    pub up_slope: Option<f64>,
    /// 水平宽度.
    pub horizontal: Option<f64>,
    /// 左上到右下的对角宽度.
    pub down_slope: Option<f64>,
    /// 计入平均的宽度的均值.
    pub average: Option<f64>,
    /// 几何线性度: 平均宽度减去标称宽度.
    pub linearity: Option<f64>,
    /// 几何畸变 (%): `100 * stdev / mean`, 至少需要两条线段.
    pub distortion: Option<f64>,
}

impl PhantomWidthOutput {
    /// 获取某条线段的宽度.
    pub fn width(&self, line: WidthLine) -> Option<f64> {
        match line {
            WidthLine::Vertical => self.vertical,
            WidthLine::UpSlope => self.up_slope,
            WidthLine::Horizontal => self.horizontal,
            WidthLine::DownSlope => self.down_slope,
        }
    }

    fn width_mut(&mut self, line: WidthLine) -> &mut Option<f64> {
        match line {
            WidthLine::Vertical => &mut self.vertical,
            WidthLine::UpSlope => &mut self.up_slope,
            WidthLine::Horizontal => &mut self.horizontal,
            WidthLine::DownSlope => &mut self.down_slope,
        }
    }
}

/// 体模宽度模块.
#[derive(Clone, Debug, Default)]
pub struct PhantomWidth {
    /// 配置.
    pub spec: PhantomWidthSpec,
}

impl PhantomWidth {
    /// 以给定配置构造.
    pub fn new(spec: PhantomWidthSpec) -> Self {
        Self { spec }
    }
}

impl PhantomModule for PhantomWidth {
    type Output = PhantomWidthOutput;

    fn name(&self) -> &'static str {
        "Phantom Width"
    }

    fn draw_rois(&self, ctx: &MedAcrContext, input: &AnalysisInput) -> AnalysisResult<RoiSet> {
        let image = ImageRef::primary(ctx.geometry_slice());
        let slice = input.slice(image)?;
        let (xcent, ycent) = (ctx.boundary().xcent(), ctx.boundary().ycent());

        let mut rois = RoiSet::new();
        for line in WidthLine::ALL {
            let (xdiff, ydiff) = line.half_extent(slice.width_mm(), slice.height_mm());
            let shape = RoiShape::Line {
                x1: round(xcent - xdiff) as f64,
                y1: round(ycent - ydiff) as f64,
                x2: round(xcent + xdiff) as f64,
                y2: round(ycent + ydiff) as f64,
            };
            rois.push(Roi::new(line.roi_name(), image, shape));
        }
        Ok(rois)
    }

    fn analyse(&self, input: &AnalysisInput, rois: &RoiSet) -> AnalysisResult<Self::Output> {
        let divisor = 100.0 / self.spec.max_perc;
        let mut out = PhantomWidthOutput::default();
        let mut included = Vec::with_capacity(4);

        for line in WidthLine::ALL {
            let roi = require(rois, line.roi_name())?;
            out.slice = roi.image.slice;
            let slice = input.slice_of(roi)?;
            let profile = roi
                .line_profile(&slice)
                .ok_or_else(|| AnalysisError::EmptyRoi(roi.name.clone()))?;
            let width = match nth_max_bounds(profile.values.view(), divisor) {
                Ok(b) => b.difference() * profile.step_mm,
                Err(e) => {
                    log::warn!("{line} 宽度测量失败: {e}");
                    continue;
                }
            };
            *out.width_mut(line) = Some(width);
            if self.spec.includes(line) {
                included.push(width);
            }
        }

        if included.is_empty() {
            log::warn!("没有可计入平均的宽度");
            return Ok(out);
        }
        let n = included.len() as f64;
        let mean = included.iter().sum::<f64>() / n;
        out.average = Some(mean);
        out.linearity = Some(mean - NOMINAL_PHANTOM_WIDTH);
        if included.len() >= 2 {
            // 样本标准差.
            let var = included.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / (n - 1.0);
            out.distortion = Some(100.0 * var.sqrt() / mean);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, disc, series_of};
    use super::*;
    use crate::context::{InsertsSlice, Side};
    use crate::data::MrTags;
    use approx::assert_abs_diff_eq;

    fn run(spec: PhantomWidthSpec) -> PhantomWidthOutput {
        let ctx = context(128.0, 82.5, InsertsSlice::Last, Side::Bottom, Side::Left);
        let s = series_of(&disc(256, 128.0, 82.5, 100.0, 0.0), 1.0, MrTags::new());
        PhantomWidth::new(spec)
            .run(&ctx, &AnalysisInput::new(&s), None)
            .unwrap()
            .output
    }

    #[test]
    fn test_draw_lines() {
        let ctx = context(128.0, 82.5, InsertsSlice::First, Side::Bottom, Side::Left);
        let s = series_of(&disc(256, 128.0, 82.5, 100.0, 0.0), 1.0, MrTags::new());
        let rois = PhantomWidth::default()
            .draw_rois(&ctx, &AnalysisInput::new(&s))
            .unwrap();
        assert_eq!(rois.len(), 4);
        assert!(rois.iter().all(|r| r.image == ImageRef::primary(4)));
        assert_eq!(
            rois.get("Vertical Line").unwrap().shape,
            RoiShape::Line {
                x1: 128.0,
                y1: 28.0,
                x2: 128.0,
                y2: 228.0
            }
        );
        assert_eq!(
            rois.get("Up Slope Line").unwrap().shape,
            RoiShape::Line {
                x1: 199.0,
                y1: 57.0,
                x2: 57.0,
                y2: 199.0
            }
        );
    }

    #[test]
    fn test_disc_width() {
        let out = run(PhantomWidthSpec::default());
        assert_eq!(out.slice, 6);
        assert_abs_diff_eq!(out.vertical.unwrap(), 165.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out.horizontal.unwrap(), 165.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out.up_slope.unwrap(), 165.0, epsilon = 1.5);
        assert_abs_diff_eq!(out.down_slope.unwrap(), 165.0, epsilon = 1.5);
        assert_abs_diff_eq!(out.linearity.unwrap(), 0.0, epsilon = 1.0);
        assert!(out.distortion.unwrap() < 1.0);
    }

    #[test]
    fn test_single_line_has_no_distortion() {
        let out = run(PhantomWidthSpec {
            include_up_slope: false,
            include_horizontal: false,
            include_down_slope: false,
            ..Default::default()
        });
        assert_abs_diff_eq!(out.average.unwrap(), 165.0, epsilon = 1e-9);
        assert!(out.distortion.is_none());
        // 未计入平均的宽度仍然输出.
        assert!(out.width(WidthLine::Horizontal).is_some());
    }
}

//! 伪影 (鬼影) 比例.
//!
//! 体模内部一个椭圆 ROI 测信号, 体模外上下左右四个矩形 ROI 测背景.
//! 上下两块沿水平方向与椭圆 ROI 对齐, 左右两块沿垂直方向与椭圆 ROI 对齐.

use super::{
    nonempty_mean, phantom_axes, phantom_ellipse, require, round, AnalysisInput, AnalysisResult,
    PhantomModule,
};
use crate::context::MedAcrContext;
use crate::roi::{ImageRef, Roi, RoiSet, RoiShape};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 背景 ROI 与图像边缘, 体模边界之间的留白 (像素).
const MARGIN: i64 = 3;

/// 体模信号 ROI 的名字.
pub const PHANTOM_ROI: &str = "Phantom ROI";
/// 上方背景 ROI.
pub const TOP_ROI: &str = "Top ROI";
/// 下方背景 ROI.
pub const BOTTOM_ROI: &str = "Bottom ROI";
/// 左侧背景 ROI.
pub const LEFT_ROI: &str = "Left ROI";
/// 右侧背景 ROI.
pub const RIGHT_ROI: &str = "Right ROI";

/// 伪影配置.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GhostingSpec {
    /// 椭圆 ROI 相对于体模跨度的大小 (%).
    pub size: f64,
}

impl Default for GhostingSpec {
    fn default() -> Self {
        Self { size: 70.0 }
    }
}

/// 伪影输出.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GhostingOutput {
    /// 使用的层面索引.
    pub slice: usize,
    /// 伪影比例 (%).
    pub ghosting: f64,
}

/// 伪影模块.
#[derive(Clone, Debug, Default)]
pub struct Ghosting {
    /// 配置.
    pub spec: GhostingSpec,
}

impl Ghosting {
    /// 以给定配置构造.
    pub fn new(spec: GhostingSpec) -> Self {
        Self { spec }
    }
}

/// `100 * |((top + bottom) - (left + right)) / (2 * signal)|`.
#[inline]
pub fn ghosting_ratio(signal: f64, top: f64, bottom: f64, left: f64, right: f64) -> f64 {
    100.0 * (((top + bottom) - (left + right)) / (2.0 * signal)).abs()
}

impl PhantomModule for Ghosting {
    type Output = GhostingOutput;

    fn name(&self) -> &'static str {
        "Ghosting"
    }

    fn draw_rois(&self, ctx: &MedAcrContext, input: &AnalysisInput) -> AnalysisResult<RoiSet> {
        let z = ctx.uniform_slice();
        let image = ImageRef::primary(z);
        let (rows, cols) = input.slice(image)?.shape();
        let (rows, cols) = (rows as i64, cols as i64);
        let b = ctx.boundary();

        let (xcent, ycent, a, semi_b) = phantom_axes(ctx, self.spec.size);
        let (tb_xmin, tb_xmax) = (round(xcent - a), round(xcent + a));
        let (lr_ymin, lr_ymax) = (round(ycent - semi_b), round(ycent + semi_b));

        let mut rois = RoiSet::new();
        rois.push(Roi::new(PHANTOM_ROI, image, phantom_ellipse(ctx, self.spec.size)));
        let boxes = [
            (TOP_ROI, (tb_xmin, MARGIN, tb_xmax, round(b.ymin) - MARGIN)),
            (BOTTOM_ROI, (tb_xmin, round(b.ymax) + MARGIN, tb_xmax, rows - MARGIN)),
            (LEFT_ROI, (MARGIN, lr_ymin, round(b.xmin) - MARGIN, lr_ymax)),
            (RIGHT_ROI, (round(b.xmax) + MARGIN, lr_ymin, cols - MARGIN, lr_ymax)),
        ];
        for (name, (x0, y0, x1, y1)) in boxes {
            rois.push(Roi::new(name, image, RoiShape::rect_from_bounds(x0, y0, x1, y1)));
        }
        Ok(rois)
    }

    fn analyse(&self, input: &AnalysisInput, rois: &RoiSet) -> AnalysisResult<Self::Output> {
        let phantom = require(rois, PHANTOM_ROI)?;
        let slice = input.slice_of(phantom)?;
        let mean_of = |name: &str| -> AnalysisResult<f64> {
            let roi = require(rois, name)?;
            nonempty_mean(roi, &input.slice_of(roi)?)
        };

        let signal = nonempty_mean(phantom, &slice)?;
        let top = mean_of(TOP_ROI)?;
        let bottom = mean_of(BOTTOM_ROI)?;
        let left = mean_of(LEFT_ROI)?;
        let right = mean_of(RIGHT_ROI)?;
        log::debug!("伪影: signal {signal:.3}, T {top:.3}, B {bottom:.3}, L {left:.3}, R {right:.3}");

        Ok(GhostingOutput {
            slice: phantom.image.slice,
            ghosting: ghosting_ratio(signal, top, bottom, left, right),
        })
    }
}

//! 层厚.
//!
//! 内插件层面上有一对倾斜的斜坡. 沿斜坡放置两个细长矩形 ROI, 对各自剖面做斜坡拟合,
//! 全宽乘以斜坡角度的正切和像素尺寸即为该斜坡测得的层厚. 最终层厚取两者的几何平均.

use ndarray::Array1;

use super::{require, round, AnalysisError, AnalysisInput, AnalysisResult, PhantomModule};
use crate::context::{Axis, MedAcrContext, Side};
use crate::data::SpacingAttr;
use crate::fitting::{fit_ramp, RampFit, RampModel};
use crate::roi::{ImageRef, Roi, RoiSet, RoiShape};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// ROI 沿斜坡法向的高度 (毫米).
const ROI_HEIGHT: f64 = 2.0;
/// ROI 沿斜坡方向的长度 (毫米).
const ROI_WIDTH: f64 = 120.0;
/// 下斜坡 ROI 相对中心的偏移 (毫米).
const BOTTOM_OFFSET: f64 = 0.5;
/// 上斜坡 ROI 相对中心的偏移 (毫米).
const TOP_OFFSET: f64 = -3.5;

/// 上斜坡 ROI 的名字.
pub const TOP_RAMP: &str = "Top Ramp";
/// 下斜坡 ROI 的名字.
pub const BOTTOM_RAMP: &str = "Bottom Ramp";

/// 层厚配置.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceWidthSpec {
    /// 斜坡角度的正切.
    pub tan_theta: f64,
    /// 测宽位置, 以剖面最大值的百分比表示.
    pub max_perc: f64,
    /// 拟合模型.
    pub model: RampModel,
}

impl Default for SliceWidthSpec {
    fn default() -> Self {
        Self {
            tan_theta: 0.1,
            max_perc: 50.0,
            model: RampModel::FlatTopGauss,
        }
    }
}

/// 层厚输出. 宽度以毫米为单位.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceWidthOutput {
    /// 斜坡方向.
    pub ramp_direction: Axis,
    /// 期望层厚, 即序列的标称层厚.
    pub expected_width: f64,
    /// 上斜坡测得的层厚. 拟合失败时为空.
    pub top_ramp_width: Option<f64>,
    /// 下斜坡测得的层厚. 拟合失败时为空.
    pub bottom_ramp_width: Option<f64>,
    /// 两斜坡层厚的几何平均.
    pub slice_width: Option<f64>,
}

/// 斜坡剖面及其拟合曲线, 用于诊断显示.
#[derive(Clone, Debug, PartialEq)]
pub struct RampProfiles {
    /// 每个采样点对应的物理位置 (毫米), 已乘以斜坡正切.
    pub x_mm: Array1<f64>,
    /// 上斜坡剖面.
    pub top: Array1<f64>,
    /// 下斜坡剖面.
    pub bottom: Array1<f64>,
    /// 上斜坡拟合曲线.
    pub top_fit: Option<Array1<f64>>,
    /// 下斜坡拟合曲线.
    pub bottom_fit: Option<Array1<f64>>,
}

/// 层厚模块.
#[derive(Clone, Debug, Default)]
pub struct SliceWidth {
    /// 配置.
    pub spec: SliceWidthSpec,
}

impl SliceWidth {
    /// 以给定配置构造.
    pub fn new(spec: SliceWidthSpec) -> Self {
        Self { spec }
    }

    #[inline]
    fn divisor(&self) -> f64 {
        100.0 / self.spec.max_perc
    }

    /// 两个斜坡 ROI 的剖面, 斜坡方向与沿该方向的像素尺寸.
    fn profiles(
        &self,
        input: &AnalysisInput,
        rois: &RoiSet,
    ) -> AnalysisResult<(Array1<f64>, Array1<f64>, Axis, f64)> {
        let top = require(rois, TOP_RAMP)?;
        let bottom = require(rois, BOTTOM_RAMP)?;
        let slice = input.slice_of(top)?;
        let bottom_slice = input.slice_of(bottom)?;

        // 矩形较长的一边即为斜坡方向.
        let direction = match top.shape {
            RoiShape::Rectangle { width, height, .. } if height > width => Axis::Vertical,
            _ => Axis::Horizontal,
        };
        let (t, b, pix) = match direction {
            Axis::Horizontal => (
                top.h_profile(&slice),
                bottom.h_profile(&bottom_slice),
                slice.width_mm(),
            ),
            Axis::Vertical => (
                top.v_profile(&slice),
                bottom.v_profile(&bottom_slice),
                slice.height_mm(),
            ),
        };
        let t = t.ok_or_else(|| AnalysisError::EmptyRoi(TOP_RAMP.to_owned()))?;
        let b = b.ok_or_else(|| AnalysisError::EmptyRoi(BOTTOM_RAMP.to_owned()))?;
        Ok((t, b, direction, pix))
    }

    fn fit(&self, name: &str, profile: &Array1<f64>) -> Option<RampFit> {
        match fit_ramp(profile.view(), self.spec.model, self.divisor()) {
            Ok(fit) => Some(fit),
            Err(e) => {
                log::warn!("{name} 拟合失败: {e}");
                None
            }
        }
    }

    /// 斜坡剖面与拟合曲线. 拟合失败的曲线为空, 不影响剖面本身.
    pub fn ramp_profiles(
        &self,
        input: &AnalysisInput,
        rois: &RoiSet,
    ) -> AnalysisResult<RampProfiles> {
        let (top, bottom, _, pix) = self.profiles(input, rois)?;
        let scale = self.spec.tan_theta * pix;
        let x_mm = Array1::from_shape_fn(top.len(), |i| i as f64 * scale);
        let curve = |fit: RampFit, len: usize| {
            Array1::from_shape_fn(len, |i| fit.model.eval(&fit.params, i as f64))
        };
        let top_fit = self.fit(TOP_RAMP, &top).map(|f| curve(f, top.len()));
        let bottom_fit = self.fit(BOTTOM_RAMP, &bottom).map(|f| curve(f, bottom.len()));
        Ok(RampProfiles {
            x_mm,
            top,
            bottom,
            top_fit,
            bottom_fit,
        })
    }
}

impl PhantomModule for SliceWidth {
    type Output = SliceWidthOutput;

    fn name(&self) -> &'static str {
        "Slice Width"
    }

    fn draw_rois(&self, ctx: &MedAcrContext, input: &AnalysisInput) -> AnalysisResult<RoiSet> {
        let image = ImageRef::primary(ctx.inserts_slice().index());
        let slice = input.slice(image)?;
        let (pw, ph) = (slice.width_mm(), slice.height_mm());
        let (xc, yc) = (ctx.boundary().xcent(), ctx.boundary().ycent());
        let res = ctx.res_side();

        // 分辨率插件在上下时斜坡水平, 否则垂直.
        let (top, bottom) = match res.axis().orthogonal() {
            Axis::Horizontal => {
                let bh = ROI_HEIGHT / ph;
                let bw = ROI_WIDTH / pw;
                let (top_off, bottom_off) = (TOP_OFFSET / ph, BOTTOM_OFFSET / ph);
                let (x0, x1) = (round(xc - bw / 2.0), round(xc + bw / 2.0));
                // 分辨率插件在下方时向下偏移, 在上方时镜像.
                let (t, b) = if res == Side::Bottom {
                    (
                        (round(yc + top_off), round(yc + top_off + bh)),
                        (round(yc + bottom_off), round(yc + bottom_off + bh)),
                    )
                } else {
                    (
                        (round(yc - top_off - bh), round(yc - top_off)),
                        (round(yc - bottom_off - bh), round(yc - bottom_off)),
                    )
                };
                (
                    RoiShape::rect_from_bounds(x0, t.0, x1, t.1),
                    RoiShape::rect_from_bounds(x0, b.0, x1, b.1),
                )
            }
            Axis::Vertical => {
                let bh = ROI_HEIGHT / pw;
                let bw = ROI_WIDTH / ph;
                let (top_off, bottom_off) = (TOP_OFFSET / pw, BOTTOM_OFFSET / pw);
                let (y0, y1) = (round(yc - bw / 2.0), round(yc + bw / 2.0));
                let (t, b) = if res == Side::Right {
                    (
                        (round(xc + top_off), round(xc + top_off + bh)),
                        (round(xc + bottom_off), round(xc + bottom_off + bh)),
                    )
                } else {
                    (
                        (round(xc - top_off - bh), round(xc - top_off)),
                        (round(xc - bottom_off - bh), round(xc - bottom_off)),
                    )
                };
                (
                    RoiShape::rect_from_bounds(t.0, y0, t.1, y1),
                    RoiShape::rect_from_bounds(b.0, y0, b.1, y1),
                )
            }
        };

        let mut rois = RoiSet::new();
        rois.push(Roi::new(TOP_RAMP, image, top));
        rois.push(Roi::new(BOTTOM_RAMP, image, bottom));
        Ok(rois)
    }

    fn analyse(&self, input: &AnalysisInput, rois: &RoiSet) -> AnalysisResult<Self::Output> {
        let (top, bottom, direction, pix) = self.profiles(input, rois)?;
        let expected_width = input.series.z_mm();
        let scale = self.spec.tan_theta * pix;

        let top_ramp_width = self.fit(TOP_RAMP, &top).map(|f| (f.width * scale).abs());
        let bottom_ramp_width = self
            .fit(BOTTOM_RAMP, &bottom)
            .map(|f| (f.width * scale).abs());
        let slice_width = top_ramp_width
            .zip(bottom_ramp_width)
            .map(|(t, b)| (t * b).sqrt());

        Ok(SliceWidthOutput {
            ramp_direction: direction,
            expected_width,
            top_ramp_width,
            bottom_ramp_width,
            slice_width,
        })
    }
}

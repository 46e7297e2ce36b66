//! 层面位置.
//!
//! 体模两端的层面上各有一对楔形结构, 位于分辨率插件的对侧. 两个楔形的半高位置之差
//! 反映了层面相对于标称位置的偏移.

use ndarray::Array1;

use super::{require, round, AnalysisError, AnalysisInput, AnalysisResult, PhantomModule};
use crate::consts::{FIRST_SLICE, LAST_SLICE};
use crate::context::{Axis, MedAcrContext, Side};
use crate::data::SpacingAttr;
use crate::profile::{nth_max_positions, ProfileError};
use crate::roi::{ImageRef, Roi, RoiSet, RoiShape};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 楔形 ROI 中心到体模中心的距离 (毫米).
const ROI_OFFSET: f64 = 55.0;
/// ROI 横跨楔形的宽度 (毫米).
const ROI_WIDTH: f64 = 2.0;
/// ROI 沿楔形方向的半长 (毫米).
const ROI_HEIGHT: f64 = 10.0;
/// 左楔形 ROI 的横向偏移 (毫米).
const LEFT_OFFSET: f64 = -5.0;
/// 右楔形 ROI 的横向偏移 (毫米).
const RIGHT_OFFSET: f64 = 1.0;

/// 左楔形 ROI 的名字.
pub const LEFT_WEDGE: &str = "Left Wedge";
/// 右楔形 ROI 的名字.
pub const RIGHT_WEDGE: &str = "Right Wedge";

/// 层面位置输出. 位置以毫米为单位.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlicePositionOutput {
    /// 楔形方向.
    pub wedge_direction: Axis,
    /// 楔形所在方位.
    pub wedge_side: Side,
    /// 第 1 层 (索引 0) 的位置偏移.
    pub slice_1_position: Option<f64>,
    /// 第 11 层 (索引 10) 的位置偏移.
    pub slice_11_position: Option<f64>,
}

/// 层面位置模块.
#[derive(Clone, Debug, Default)]
pub struct SlicePosition;

/// 半高位置: 楔形在左侧或上方时取第一个超过半高的下标,
/// 否则取最后一个并取负.
fn half_max_position(profile: &Array1<f64>, wedge_side: Side) -> AnalysisResult<f64> {
    let positions = nth_max_positions(profile.view(), 2.0)?;
    let pos = match wedge_side {
        Side::Left | Side::Top => positions.first().map(|&p| p as f64),
        Side::Right | Side::Bottom => positions.last().map(|&p| -(p as f64)),
    };
    pos.ok_or(AnalysisError::Profile(ProfileError::Empty))
}

impl SlicePosition {
    /// 某一层上的位置偏移 `(right - left) * pixel / 2`.
    fn position_on(
        &self,
        input: &AnalysisInput,
        rois: &RoiSet,
        image: ImageRef,
        wedge_side: Side,
    ) -> AnalysisResult<f64> {
        let find = |name: &str| {
            rois.get_on(name, image)
                .ok_or_else(|| AnalysisError::MissingRoi(format!("{name} ({})", image.slice + 1)))
        };
        let left = find(LEFT_WEDGE)?;
        let right = find(RIGHT_WEDGE)?;
        let slice = input.slice(image)?;
        let (lp, rp, pix) = match wedge_side.axis() {
            Axis::Horizontal => (
                left.h_profile(&slice),
                right.h_profile(&slice),
                slice.width_mm(),
            ),
            Axis::Vertical => (
                left.v_profile(&slice),
                right.v_profile(&slice),
                slice.height_mm(),
            ),
        };
        let lp = lp.ok_or_else(|| AnalysisError::EmptyRoi(LEFT_WEDGE.to_owned()))?;
        let rp = rp.ok_or_else(|| AnalysisError::EmptyRoi(RIGHT_WEDGE.to_owned()))?;
        let l = half_max_position(&lp, wedge_side)?;
        let r = half_max_position(&rp, wedge_side)?;
        Ok((r - l) * pix / 2.0)
    }
}

impl PhantomModule for SlicePosition {
    type Output = SlicePositionOutput;

    fn name(&self) -> &'static str {
        "Slice Position"
    }

    fn draw_rois(&self, ctx: &MedAcrContext, input: &AnalysisInput) -> AnalysisResult<RoiSet> {
        let image1 = ImageRef::primary(ctx.inserts_slice().index());
        let image2 = ImageRef::primary(ctx.inserts_slice().opposite().index());
        let slice = input.slice(image1)?;
        let (pw, ph) = (slice.width_mm(), slice.height_mm());
        let (xc, yc) = (ctx.boundary().xcent(), ctx.boundary().ycent());
        let res = ctx.res_side();

        let (left, right) = match res.axis() {
            Axis::Horizontal => {
                let bh = ROI_WIDTH / ph;
                let bw = ROI_HEIGHT / pw;
                let off = ROI_OFFSET / pw;
                let (lo, ro) = (LEFT_OFFSET / ph, RIGHT_OFFSET / ph);
                if res == Side::Right {
                    let (x0, x1) = (round(xc - bw - off), round(xc + bw - off));
                    (
                        RoiShape::rect_from_bounds(x0, round(yc + lo), x1, round(yc + lo + bh)),
                        RoiShape::rect_from_bounds(x0, round(yc + ro), x1, round(yc + ro + bh)),
                    )
                } else {
                    let (x0, x1) = (round(xc - bw + off), round(xc + bw + off));
                    (
                        RoiShape::rect_from_bounds(x0, round(yc - lo - bh), x1, round(yc - lo)),
                        RoiShape::rect_from_bounds(x0, round(yc - ro - bh), x1, round(yc - ro)),
                    )
                }
            }
            Axis::Vertical => {
                let bh = ROI_HEIGHT / ph;
                let bw = ROI_WIDTH / pw;
                let off = ROI_OFFSET / ph;
                let (lo, ro) = (LEFT_OFFSET / pw, RIGHT_OFFSET / pw);
                if res == Side::Bottom {
                    let (y0, y1) = (round(yc - bh - off), round(yc + bh - off));
                    (
                        RoiShape::rect_from_bounds(round(xc + lo), y0, round(xc + lo + bw), y1),
                        RoiShape::rect_from_bounds(round(xc + ro), y0, round(xc + ro + bw), y1),
                    )
                } else {
                    let (y0, y1) = (round(yc - bh + off), round(yc + bh + off));
                    (
                        RoiShape::rect_from_bounds(round(xc - lo - bw), y0, round(xc - lo), y1),
                        RoiShape::rect_from_bounds(round(xc - ro - bw), y0, round(xc - ro), y1),
                    )
                }
            }
        };

        let mut rois = RoiSet::new();
        for (name, shape) in [(LEFT_WEDGE, left), (RIGHT_WEDGE, right)] {
            let roi = Roi::new(name, image1, shape);
            rois.push(roi.copy_to(image2));
            rois.push(roi);
        }
        Ok(rois)
    }

    fn analyse(&self, input: &AnalysisInput, rois: &RoiSet) -> AnalysisResult<Self::Output> {
        // 楔形方位由 ROI 的长边方向与所在半平面推断, 以支持用户调整后的 ROI.
        let left = require(rois, LEFT_WEDGE)?;
        let wedge_side = infer_wedge_side(left, input)?;
        let position = |z: usize| {
            self.position_on(input, rois, ImageRef::primary(z), wedge_side)
                .map_err(|e| log::warn!("第 {} 层位置测量失败: {e}", z + 1))
                .ok()
        };
        Ok(SlicePositionOutput {
            wedge_direction: wedge_side.axis(),
            wedge_side,
            slice_1_position: position(FIRST_SLICE),
            slice_11_position: position(LAST_SLICE),
        })
    }
}

/// 由左楔形 ROI 推断楔形方位: 长边水平时位于左右两侧之一, 否则位于上下两侧之一;
/// 再由 ROI 中心落在图像中心的哪一侧决定具体方位.
fn infer_wedge_side(roi: &Roi, input: &AnalysisInput) -> AnalysisResult<Side> {
    let RoiShape::Rectangle {
        xmin,
        ymin,
        width,
        height,
    } = roi.shape
    else {
        return Err(AnalysisError::MissingRoi(format!("{} (rectangle)", roi.name)));
    };
    let (rows, cols) = input.slice_of(roi)?.shape();
    let (cx, cy) = (xmin as f64 + width as f64 / 2.0, ymin as f64 + height as f64 / 2.0);
    Ok(if width >= height {
        if cx < cols as f64 / 2.0 {
            Side::Left
        } else {
            Side::Right
        }
    } else if cy < rows as f64 / 2.0 {
        Side::Top
    } else {
        Side::Bottom
    })
}

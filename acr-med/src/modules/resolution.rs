//! 高对比度空间分辨率.
//!
//! 分辨率插件位于插件层上. 先以插件方位与圆形插件方位确定一个定位框,
//! 在框内取水平/垂直剖面的最大值作为条栅中心, 再从中心出发画两组各四条短线段:
//! 水平线段朝圆形/分辨率插件中位于左右两侧的那一个延伸, 垂直线段朝位于上下两侧的那一个延伸.
//! 每组线段沿正交方向等间隔排列.

use ndarray::Array1;

use super::{require, round, AnalysisError, AnalysisInput, AnalysisResult, PhantomModule};
use crate::context::{Axis, MedAcrContext, Side};
use crate::data::{PhaseEncodeDirection, SpacingAttr};
use crate::profile::bar_contrast;
use crate::roi::{ImageRef, Roi, RoiSet, RoiShape};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 定位框到体模中心在插件方向上的距离 (毫米).
const BOX_RES_OFFSET: f64 = 28.0;
/// 定位框在圆形插件方向上的偏移 (毫米).
const BOX_CIRCLE_OFFSET: f64 = 5.0;
/// 定位框边长 (毫米).
const BOX_SIDE_LENGTH: f64 = 19.0;
/// 线段长度 (毫米).
const LINE_LENGTH: f64 = 8.0;
/// 相邻线段的间隔 (毫米).
const LINE_GAP: f64 = 2.0;
/// 每组线段数.
const LINE_COUNT: usize = 4;

/// 定位框的名字.
pub const RESOLUTION_BOX: &str = "Resolution Box";
/// 条栅中心的名字.
pub const INSERT_CENTRE: &str = "Insert Centre";

/// 第 `i` 条 (从 1 开始) 线段的名字.
fn line_name(axis: Axis, i: usize) -> String {
    match axis {
        Axis::Horizontal => format!("Horizontal Line {i}"),
        Axis::Vertical => format!("Vertical Line {i}"),
    }
}

/// 分辨率配置.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResolutionSpec {
    /// 是否以手动指定的偏移代替自动检测的条栅中心.
    pub override_centre: bool,
    /// 手动中心相对于定位框左边界的列偏移 (像素).
    pub x_centre_override: i64,
    /// 手动中心相对于定位框上边界的行偏移 (像素).
    pub y_centre_override: i64,
}

impl Default for ResolutionSpec {
    fn default() -> Self {
        Self {
            override_centre: false,
            x_centre_override: 9,
            y_centre_override: 9,
        }
    }
}

/// 分辨率输出. 对比度以百分比表示.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResolutionOutput {
    /// 使用的层面索引.
    pub slice: usize,
    /// 条栅中心 `(x, y)`.
    pub centre: Option<(f64, f64)>,
    /// 每条水平线段的对比度 (0 到 1). 剖面无效时为 `None`.
    pub horizontal_contrasts: Vec<Option<f64>>,
    /// 每条垂直线段的对比度 (0 到 1).
    pub vertical_contrasts: Vec<Option<f64>>,
    /// 水平方向分辨率: `100 * max(horizontal_contrasts)`.
    pub horizontal_contrast: Option<f64>,
    /// 垂直方向分辨率: `100 * max(vertical_contrasts)`.
    pub vertical_contrast: Option<f64>,
    /// 两个方向的平均.
    pub total_contrast: Option<f64>,
    /// 相位编码方向上的分辨率, 需要相位编码方向标签.
    pub phase_encode_contrast: Option<f64>,
    /// 频率编码方向上的分辨率.
    pub frequency_encode_contrast: Option<f64>,
}

/// 分辨率模块.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    /// 配置.
    pub spec: ResolutionSpec,
}

impl Resolution {
    /// 以给定配置构造.
    pub fn new(spec: ResolutionSpec) -> Self {
        Self { spec }
    }
}

/// 第一个最大值的下标. 忽略 NaN.
fn first_argmax(profile: &Array1<f64>) -> Option<usize> {
    profile
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// 两插件中分别位于水平轴与垂直轴上的那一个, 即 `(hside, vside)`.
fn insert_sides(ctx: &MedAcrContext) -> (Side, Side) {
    let (res, circle) = (ctx.res_side(), ctx.circle_side());
    match res.axis() {
        Axis::Horizontal => (res, circle),
        Axis::Vertical => (circle, res),
    }
}

/// 定位框左上角相对于体模中心的偏移 `(x, y)`, 以像素为单位.
fn box_offset(res: Side, circle: Side, pw: f64, ph: f64) -> (f64, f64) {
    let (bw, bh) = (BOX_SIDE_LENGTH / pw, BOX_SIDE_LENGTH / ph);
    // 插件方向: 框紧贴在距中心 BOX_RES_OFFSET 处, 朝外.
    let from_res = |s: Side| match s {
        Side::Right => BOX_RES_OFFSET / pw,
        Side::Left => -BOX_RES_OFFSET / pw - bw,
        Side::Top => -BOX_RES_OFFSET / ph - bh,
        Side::Bottom => BOX_RES_OFFSET / ph,
    };
    // 圆形插件方向: 框主体位于圆形插件的对侧.
    let from_circle = |s: Side| match s {
        Side::Right => BOX_CIRCLE_OFFSET / pw - bw,
        Side::Left => -BOX_CIRCLE_OFFSET / pw,
        Side::Top => -BOX_CIRCLE_OFFSET / ph,
        Side::Bottom => BOX_CIRCLE_OFFSET / ph - bh,
    };
    match res.axis() {
        Axis::Horizontal => (from_res(res), from_circle(circle)),
        Axis::Vertical => (from_circle(circle), from_res(res)),
    }
}

impl Resolution {
    /// 定位框内的条栅中心. 水平剖面的最大值给出列, 垂直剖面的最大值给出行.
    fn find_centre(
        &self,
        input: &AnalysisInput,
        box_roi: &Roi,
        xmin: i64,
        ymin: i64,
    ) -> AnalysisResult<(i64, i64)> {
        if self.spec.override_centre {
            return Ok((
                xmin + self.spec.x_centre_override,
                ymin + self.spec.y_centre_override,
            ));
        }
        let slice = input.slice_of(box_roi)?;
        let empty = || AnalysisError::EmptyRoi(box_roi.name.clone());
        let hp = box_roi.h_profile(&slice).ok_or_else(empty)?;
        let vp = box_roi.v_profile(&slice).ok_or_else(empty)?;
        let x = first_argmax(&hp).ok_or_else(empty)?;
        let y = first_argmax(&vp).ok_or_else(empty)?;
        // 剖面从裁剪后的区域开始.
        Ok((xmin.max(0) + x as i64, ymin.max(0) + y as i64))
    }
}

/// 一组线段的对比度, 剖面无效的线段记为 `None`.
fn line_contrasts(
    input: &AnalysisInput,
    rois: &RoiSet,
    axis: Axis,
) -> AnalysisResult<Vec<Option<f64>>> {
    (1..=LINE_COUNT)
        .map(|i| -> AnalysisResult<Option<f64>> {
            let name = line_name(axis, i);
            let roi = require(rois, &name)?;
            let slice = input.slice_of(roi)?;
            let contrast = roi
                .line_profile(&slice)
                .ok_or(AnalysisError::EmptyRoi(name.clone()))
                .and_then(|p| bar_contrast(p.values.view()).map_err(AnalysisError::from));
            Ok(contrast
                .map_err(|e| log::warn!("{name} 对比度计算失败: {e}"))
                .ok())
        })
        .collect()
}

/// 有效对比度的最大值, 以百分比表示.
fn best_percent(contrasts: &[Option<f64>]) -> Option<f64> {
    contrasts
        .iter()
        .flatten()
        .copied()
        .reduce(f64::max)
        .map(|c| 100.0 * c)
}

impl PhantomModule for Resolution {
    type Output = ResolutionOutput;

    fn name(&self) -> &'static str {
        "Resolution"
    }

    fn draw_rois(&self, ctx: &MedAcrContext, input: &AnalysisInput) -> AnalysisResult<RoiSet> {
        let image = ImageRef::primary(ctx.inserts_slice().index());
        let slice = input.slice(image)?;
        let (pw, ph) = (slice.width_mm(), slice.height_mm());
        let (xc, yc) = (ctx.boundary().xcent(), ctx.boundary().ycent());

        let (xo, yo) = box_offset(ctx.res_side(), ctx.circle_side(), pw, ph);
        let (xmin, ymin) = (round(xc + xo), round(yc + yo));
        let box_shape = RoiShape::Rectangle {
            xmin,
            ymin,
            width: round(BOX_SIDE_LENGTH / pw),
            height: round(BOX_SIDE_LENGTH / ph),
        };
        let box_roi = Roi::new(RESOLUTION_BOX, image, box_shape);
        let (cx, cy) = self.find_centre(input, &box_roi, xmin, ymin)?;
        log::debug!("分辨率条栅中心: ({cx}, {cy})");

        let (hside, vside) = insert_sides(ctx);
        let (h_len, v_len) = (round(LINE_LENGTH / pw - 1.0), round(LINE_LENGTH / ph - 1.0));
        let (h_gap, v_gap) = (round(LINE_GAP / ph), round(LINE_GAP / pw));
        // 水平线段朝 hside 延伸, 朝 vside 的对侧排列; 垂直线段反之.
        let h_stack = vside.opposite().sign() * h_gap;
        let v_stack = hside.opposite().sign() * v_gap;

        let mut rois = RoiSet::new();
        rois.push(box_roi);
        rois.push(Roi::new(
            INSERT_CENTRE,
            image,
            RoiShape::Point {
                x: cx as f64,
                y: cy as f64,
            },
        ));
        for i in 0..LINE_COUNT as i64 {
            let y = cy + i * h_stack;
            let shape = RoiShape::Line {
                x1: cx as f64,
                y1: y as f64,
                x2: (cx + hside.sign() * h_len) as f64,
                y2: y as f64,
            };
            rois.push(Roi::new(line_name(Axis::Horizontal, i as usize + 1), image, shape));
        }
        for i in 0..LINE_COUNT as i64 {
            let x = cx + i * v_stack;
            let shape = RoiShape::Line {
                x1: x as f64,
                y1: cy as f64,
                x2: x as f64,
                y2: (cy + vside.sign() * v_len) as f64,
            };
            rois.push(Roi::new(line_name(Axis::Vertical, i as usize + 1), image, shape));
        }
        Ok(rois)
    }

    fn analyse(&self, input: &AnalysisInput, rois: &RoiSet) -> AnalysisResult<Self::Output> {
        let first = require(rois, &line_name(Axis::Horizontal, 1))?;
        let centre = match rois.get(INSERT_CENTRE).map(|r| r.shape) {
            Some(RoiShape::Point { x, y }) => Some((x, y)),
            _ => None,
        };

        let horizontal_contrasts = line_contrasts(input, rois, Axis::Horizontal)?;
        let vertical_contrasts = line_contrasts(input, rois, Axis::Vertical)?;
        let horizontal_contrast = best_percent(&horizontal_contrasts);
        let vertical_contrast = best_percent(&vertical_contrasts);
        let total_contrast = horizontal_contrast
            .zip(vertical_contrast)
            .map(|(h, v)| (h + v) / 2.0);

        let (phase_encode_contrast, frequency_encode_contrast) =
            match input.series.tags().phase_encode_direction() {
                Some(PhaseEncodeDirection::Row) => (horizontal_contrast, vertical_contrast),
                Some(PhaseEncodeDirection::Column) => (vertical_contrast, horizontal_contrast),
                None => {
                    log::debug!("缺少相位编码方向, 不区分相位/频率编码方向");
                    (None, None)
                }
            };

        Ok(ResolutionOutput {
            slice: first.image.slice,
            centre,
            horizontal_contrasts,
            vertical_contrasts,
            horizontal_contrast,
            vertical_contrast,
            total_contrast,
            phase_encode_contrast,
            frequency_encode_contrast,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, series_of};
    use super::*;
    use crate::context::InsertsSlice;
    use crate::data::{MrTag, MrTags};
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn line(rois: &RoiSet, axis: Axis, i: usize) -> RoiShape {
        rois.get(&line_name(axis, i)).unwrap().shape
    }

    #[test]
    fn test_centre_detection() {
        // 插件在下方, 圆形插件在左侧: 定位框 x 范围 [59, 78), y 范围 [92, 111).
        let ctx = context(64.0, 50.0, InsertsSlice::First, Side::Bottom, Side::Left);
        let mut img = Array2::<f32>::zeros((128, 128));
        for k in 0..19 {
            img[(92 + k, 70)] = 50.0;
            img[(100, 59 + k)] = 50.0;
        }
        let s = series_of(&img, 1.0, MrTags::new());
        let rois = Resolution::default()
            .draw_rois(&ctx, &AnalysisInput::new(&s))
            .unwrap();
        assert_eq!(rois.len(), 10);
        assert_eq!(
            rois.get(RESOLUTION_BOX).unwrap().shape,
            RoiShape::rect_from_bounds(59, 92, 78, 111)
        );
        assert_eq!(
            rois.get(INSERT_CENTRE).unwrap().shape,
            RoiShape::Point { x: 70.0, y: 100.0 }
        );
        assert!(rois.iter().all(|r| r.image == ImageRef::primary(0)));

        // 水平线段向左延伸 7 像素, 向上排列; 垂直线段向下延伸, 向右排列.
        assert_eq!(
            line(&rois, Axis::Horizontal, 4),
            RoiShape::Line {
                x1: 70.0,
                y1: 94.0,
                x2: 63.0,
                y2: 94.0
            }
        );
        assert_eq!(
            line(&rois, Axis::Vertical, 2),
            RoiShape::Line {
                x1: 72.0,
                y1: 100.0,
                x2: 72.0,
                y2: 107.0
            }
        );
    }

    #[test]
    fn test_geometry_with_fine_pixels() {
        // 0.5 mm 像素: 框边长 38, 插件偏移 56, 圆形插件偏移 -10.
        let ctx = context(128.0, 100.0, InsertsSlice::Last, Side::Right, Side::Top);
        let s = series_of(&Array2::zeros((256, 256)), 0.5, MrTags::new());
        let rois = Resolution::new(ResolutionSpec {
            override_centre: true,
            ..Default::default()
        })
        .draw_rois(&ctx, &AnalysisInput::new(&s))
        .unwrap();
        assert_eq!(
            rois.get(RESOLUTION_BOX).unwrap().shape,
            RoiShape::Rectangle {
                xmin: 184,
                ymin: 118,
                width: 38,
                height: 38
            }
        );
        assert_eq!(
            line(&rois, Axis::Horizontal, 2),
            RoiShape::Line {
                x1: 193.0,
                y1: 131.0,
                x2: 208.0,
                y2: 131.0
            }
        );
        assert_eq!(
            line(&rois, Axis::Vertical, 4),
            RoiShape::Line {
                x1: 181.0,
                y1: 127.0,
                x2: 181.0,
                y2: 112.0
            }
        );
    }

    #[test]
    fn test_bar_contrasts() {
        let ctx = context(64.0, 50.0, InsertsSlice::First, Side::Bottom, Side::Left);
        let mut img = Array2::<f32>::zeros((128, 128));
        // 水平条栅: x = 68, 66 为谷.
        let h_pattern = [100.0, 100.0, 100.0, 20.0, 100.0, 20.0, 100.0, 100.0];
        for y in 94..=100 {
            for (k, &v) in h_pattern.iter().enumerate() {
                img[(y, 63 + k)] = v;
            }
        }
        // 垂直条栅: y = 102 为谷.
        let v_pattern = [100.0, 100.0, 30.0, 100.0, 100.0, 100.0, 100.0, 100.0];
        for x in [70, 72, 74, 76] {
            for (k, &v) in v_pattern.iter().enumerate() {
                img[(100 + k, x)] = v;
            }
        }
        let tags = MrTags::new().with(MrTag::InPlanePhaseEncodingDirection, "ROW");
        let s = series_of(&img, 1.0, tags);
        let spec = ResolutionSpec {
            override_centre: true,
            x_centre_override: 11,
            y_centre_override: 8,
        };
        let run = Resolution::new(spec)
            .run(&ctx, &AnalysisInput::new(&s), None)
            .unwrap();
        let out = run.output;

        assert_eq!(out.centre, Some((70.0, 100.0)));
        assert_eq!(out.horizontal_contrasts.len(), 4);
        for c in &out.horizontal_contrasts {
            assert_abs_diff_eq!(c.unwrap(), 2.0 / 3.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(out.horizontal_contrast.unwrap(), 200.0 / 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out.vertical_contrast.unwrap(), 700.0 / 13.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            out.total_contrast.unwrap(),
            (200.0 / 3.0 + 700.0 / 13.0) / 2.0,
            epsilon = 1e-9
        );
        assert_eq!(out.phase_encode_contrast, out.horizontal_contrast);
        assert_eq!(out.frequency_encode_contrast, out.vertical_contrast);
    }

    #[test]
    fn test_blank_insert() {
        let ctx = context(64.0, 50.0, InsertsSlice::First, Side::Bottom, Side::Left);
        let s = series_of(&Array2::zeros((128, 128)), 1.0, MrTags::new());
        let out = Resolution::default()
            .run(&ctx, &AnalysisInput::new(&s), None)
            .unwrap()
            .output;
        assert!(out.horizontal_contrasts.iter().all(Option::is_none));
        assert!(out.total_contrast.is_none());
        assert!(out.phase_encode_contrast.is_none());
    }
}

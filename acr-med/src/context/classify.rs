//! 插件方位分类.
//!
//! 在内插件层面上, 围绕体模中心放置四个采样盒. 分辨率插件所在一侧的信号被插件结构遮挡,
//! 因此最亮的采样盒位于分辨率插件的 **对侧**. 确定分辨率插件方位后,
//! 再在其对侧沿正交轴放置两个采样盒, 较亮者同样位于圆形插件的对侧.

use super::{Axis, BoundaryContext, ContextError, ContextResult, Side};
use crate::data::{ScanSlice, SpacingAttr};
use crate::roi::{ImageRef, Roi, RoiSet, RoiShape};

/// 四个主采样盒到中心的距离 (毫米).
const FOUR_BOX_OFFSET: f64 = 17.0;
/// 四个主采样盒的边长 (毫米).
const FOUR_BOX_SL: f64 = 10.0;
/// 两个副采样盒到中心的距离 (毫米).
const FIVE_BOX_OFFSET: f64 = 28.0;
/// 两个副采样盒的边长 (毫米).
const FIVE_BOX_SL: f64 = 5.0;

/// 左闭右开的像素矩形 `(xmin, ymin, xmax, ymax)`.
type PixBox = (i64, i64, i64, i64);

/// 方位分类结果.
#[derive(Clone, Debug, PartialEq)]
pub struct SideClassification {
    /// 分辨率插件方位.
    pub res_side: Side,
    /// 圆形插件方位.
    pub circle_side: Side,
    /// 分类时使用的采样盒与中心点, 仅用于诊断显示.
    pub boxes: RoiSet,
}

/// 取整, `.5` 时取偶数.
#[inline]
fn round(v: f64) -> i64 {
    v.round_ties_even() as i64
}

/// 在 `[lo, hi]` 范围 (实数) 上取整, 右端点 `+1` 变为开区间.
#[inline]
fn span(lo: f64, hi: f64) -> (i64, i64) {
    (round(lo), round(hi) + 1)
}

fn box_mean(slice: &ScanSlice, name: &'static str, b: PixBox) -> ContextResult<f64> {
    slice
        .region_mean(b.0, b.1, b.2, b.3)
        .ok_or(ContextError::EmptyBox(name))
}

/// 根据内插件层面的像素判断分辨率插件与圆形插件的方位.
///
/// 返回的 [`SideClassification::boxes`] 包含四个主采样盒 (`Top`, `Bottom`, `Left`, `Right`),
/// 两个副采样盒 (`Diagonal 1`, `Diagonal 2`) 与中心点 (`Centre`), 均位于 `image` 上.
/// 是否登记这些 ROI 由调用方决定, 不影响分类结果.
pub fn classify_sides(
    slice: &ScanSlice,
    boundary: &BoundaryContext,
    image: ImageRef,
) -> ContextResult<SideClassification> {
    let (xcent, ycent) = (boundary.xcent(), boundary.ycent());

    let four_off_x = slice.mm_to_px_x(FOUR_BOX_OFFSET);
    let four_off_y = slice.mm_to_px_y(FOUR_BOX_OFFSET);
    let four_w = slice.mm_to_px_x(FOUR_BOX_SL);
    let four_h = slice.mm_to_px_y(FOUR_BOX_SL);
    let five_off_x = slice.mm_to_px_x(FIVE_BOX_OFFSET);
    let five_off_y = slice.mm_to_px_y(FIVE_BOX_OFFSET);
    let five_w = slice.mm_to_px_x(FIVE_BOX_SL);
    let five_h = slice.mm_to_px_y(FIVE_BOX_SL);

    let (cx0, cx1) = span(xcent - four_w / 2.0, xcent + four_w / 2.0);
    let (cy0, cy1) = span(ycent - four_h / 2.0, ycent + four_h / 2.0);
    let (ty0, ty1) = span(ycent - four_off_y - four_h, ycent - four_off_y);
    let (by0, by1) = span(ycent + four_off_y, ycent + four_off_y + four_h);
    let (lx0, lx1) = span(xcent - four_off_x - four_w, xcent - four_off_x);
    let (rx0, rx1) = span(xcent + four_off_x, xcent + four_off_x + four_w);

    let primary: [(Side, &'static str, PixBox); 4] = [
        (Side::Top, "Top", (cx0, ty0, cx1, ty1)),
        (Side::Bottom, "Bottom", (cx0, by0, cx1, by1)),
        (Side::Left, "Left", (lx0, cy0, lx1, cy1)),
        (Side::Right, "Right", (rx0, cy0, rx1, cy1)),
    ];

    let mut brightest = (Side::Top, f64::NEG_INFINITY);
    for &(side, name, b) in &primary {
        let mean = box_mean(slice, name, b)?;
        log::debug!("方位采样盒 {side}: 均值 {mean:.3}");
        // 严格大于: 并列时保留靠前的方位.
        if mean > brightest.1 {
            brightest = (side, mean);
        }
    }
    let res_side = brightest.0.opposite();

    // 副采样盒沿正交轴成对放置, 位于最亮主采样盒一侧.
    let (five, six) = match res_side {
        Side::Top | Side::Bottom => {
            let (fx0, fx1) = span(xcent - five_off_x - five_w, xcent - five_off_x);
            let (sx0, sx1) = span(xcent + five_off_x, xcent + five_off_x + five_w);
            let (y0, y1) = match res_side {
                Side::Bottom => span(ycent - five_off_y - five_h, ycent - five_off_y),
                _ => span(ycent + five_off_y, ycent + five_off_y + five_h),
            };
            ((fx0, y0, fx1, y1), (sx0, y0, sx1, y1))
        }
        Side::Left | Side::Right => {
            let (fy0, fy1) = span(ycent - five_off_y - five_h, ycent - five_off_y);
            let (sy0, sy1) = span(ycent + five_off_y, ycent + five_off_y + five_h);
            let (x0, x1) = match res_side {
                Side::Right => span(xcent - five_off_x - five_w, xcent - five_off_x),
                _ => span(xcent + five_off_x, xcent + five_off_x + five_w),
            };
            ((x0, fy0, x1, fy1), (x0, sy0, x1, sy1))
        }
    };
    let five_mean = box_mean(slice, "Diagonal 1", five)?;
    let six_mean = box_mean(slice, "Diagonal 2", six)?;
    // 第一个副采样盒在左 (或上) 侧; 它更亮时圆形插件位于右 (或下) 侧.
    let circle_side = match (res_side.axis(), five_mean > six_mean) {
        (Axis::Vertical, true) => Side::Right,
        (Axis::Vertical, false) => Side::Left,
        (Axis::Horizontal, true) => Side::Bottom,
        (Axis::Horizontal, false) => Side::Top,
    };
    log::info!("分辨率插件位于 {res_side}, 圆形插件位于 {circle_side}");

    let mut boxes = RoiSet::new();
    let (w, h) = (cx1 - cx0, ty1 - ty0);
    for (_, name, (x0, y0, _, _)) in primary {
        boxes.push(Roi::new(
            name,
            image,
            RoiShape::Rectangle {
                xmin: x0,
                ymin: y0,
                width: w,
                height: h,
            },
        ));
    }
    let (sw, sh) = (five.2 - five.0, five.3 - five.1);
    for (name, b) in [("Diagonal 1", five), ("Diagonal 2", six)] {
        boxes.push(Roi::new(
            name,
            image,
            RoiShape::Rectangle {
                xmin: b.0,
                ymin: b.1,
                width: sw,
                height: sh,
            },
        ));
    }
    boxes.push(Roi::new(
        "Centre",
        image,
        RoiShape::Point {
            x: xcent.round_ties_even(),
            y: ycent.round_ties_even(),
        },
    ));

    Ok(SideClassification {
        res_side,
        circle_side,
        boxes,
    })
}

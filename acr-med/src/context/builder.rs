use itertools::Itertools;
use ordered_float::OrderedFloat;

use super::{
    classify_sides, BoundaryDetector, ContextError, ContextResult, DetectMode, InsertsSlice,
    MedAcrContext, Side,
};
use crate::consts::{ACR_SLICE_COUNT, INSERTS_FIRST_MARKER};
use crate::data::MrSeries;
use crate::roi::{ImageRef, RoiRegistry};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 登记方位采样盒时使用的模块名.
pub const CONTEXT_MODULE: &str = "Medium ACR Context";

/// 用户可编辑的内插件选择.
///
/// 微调模式下原样使用; 自动模式构建上下文后会被推断值覆盖,
/// 便于用户在自动结果的基础上切换到微调模式.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InsertsSelection {
    /// 内插件层面.
    pub inserts_slice: InsertsSlice,
    /// 分辨率插件方位.
    pub res_side: Side,
    /// 圆形插件方位.
    pub circle_side: Side,
    /// 是否登记方位采样盒以便检查.
    pub show_boxes: bool,
}

impl Default for InsertsSelection {
    fn default() -> Self {
        Self {
            inserts_slice: InsertsSlice::First,
            res_side: Side::Bottom,
            circle_side: Side::Left,
            show_boxes: false,
        }
    }
}

/// 由 z 轴剖面推断内插件层面: 剖面最小值位于索引 4 时为第一层, 否则为最后一层.
pub fn detect_inserts_slice(series: &MrSeries) -> InsertsSlice {
    let argmin = series
        .z_profile()
        .iter()
        .position_min_by_key(|&&v| OrderedFloat(v))
        .unwrap_or(0);
    log::debug!("z 轴剖面最小值位于第 {argmin} 层");
    if argmin == INSERTS_FIRST_MARKER {
        InsertsSlice::First
    } else {
        InsertsSlice::Last
    }
}

/// 上下文构建器.
#[derive(Clone, Debug, Default)]
pub struct ContextBuilder {
    /// 当前的内插件选择.
    pub selection: InsertsSelection,
}

impl ContextBuilder {
    /// 以给定选择构造.
    pub fn new(selection: InsertsSelection) -> Self {
        Self { selection }
    }

    /// 构建上下文.
    ///
    /// * 自动模式: 由 z 轴剖面选择内插件层面, 在该层面检测外边界并推断插件方位,
    ///   然后将推断结果写回 [`Self::selection`]. 若 `show_boxes` 开启且提供了
    ///   `registry`, 方位采样盒会以 [`CONTEXT_MODULE`] 的名义登记.
    /// * 微调模式: 内插件层面与方位取自 [`Self::selection`], 只检测外边界.
    ///
    /// # 注意
    ///
    /// 序列层数必须为 11.
    pub fn build(
        &mut self,
        series: &MrSeries,
        detector: &dyn BoundaryDetector,
        registry: Option<&mut dyn RoiRegistry>,
    ) -> ContextResult<MedAcrContext> {
        if series.len_z() != ACR_SLICE_COUNT {
            return Err(ContextError::SliceCount {
                expected: ACR_SLICE_COUNT,
                got: series.len_z(),
            });
        }

        match detector.mode() {
            DetectMode::FineTune => {
                let sel = self.selection;
                let slice = series.slice_at(sel.inserts_slice.index());
                let boundary = detector.detect(&slice)?;
                MedAcrContext::new(boundary, sel.inserts_slice, sel.res_side, sel.circle_side)
            }
            DetectMode::Auto => {
                let inserts_slice = detect_inserts_slice(series);
                self.selection.inserts_slice = inserts_slice;
                log::info!("内插件位于第 {} 层", inserts_slice.index() + 1);

                let z = inserts_slice.index();
                let slice = series.slice_at(z);
                let boundary = detector.detect(&slice)?;
                let sides = classify_sides(&slice, &boundary, ImageRef::primary(z))?;

                if self.selection.show_boxes {
                    if let Some(registry) = registry {
                        sides.boxes.register_into(CONTEXT_MODULE, registry);
                    }
                }
                self.selection.res_side = sides.res_side;
                self.selection.circle_side = sides.circle_side;
                MedAcrContext::new(boundary, inserts_slice, sides.res_side, sides.circle_side)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BoundaryContext, ThresholdDetector};
    use crate::data::{MrTags, PixelSpacing};
    use crate::roi::MemoryRegistry;
    use ndarray::Array2;

    /// 11 层 64 x 64 的序列, 第 `dark` 层整体较暗, 内插件层面上方采样盒加亮.
    fn series(dark: usize, layers: usize) -> MrSeries {
        let slices: Vec<_> = (0..layers)
            .map(|z| {
                let base = if z == dark { 40.0 } else { 100.0 };
                let mut img = Array2::from_elem((64, 64), 0.0f32);
                for h in 4..60 {
                    for w in 4..60 {
                        img[(h, w)] = base;
                    }
                }
                // 中心 (31.5, 31.5), 上方主采样盒覆盖 y 为 [5, 16).
                for h in 8..21 {
                    for w in 24..40 {
                        img[(h, w)] = base * 1.5;
                    }
                }
                img
            })
            .collect();
        MrSeries::from_slices(&slices, PixelSpacing::isotropic(1.0, 5.0).unwrap(), MrTags::new())
            .unwrap()
    }

    #[test]
    fn test_inserts_slice_rule() {
        assert_eq!(detect_inserts_slice(&series(4, 11)), InsertsSlice::First);
        for dark in [0, 3, 5, 6, 10] {
            assert_eq!(detect_inserts_slice(&series(dark, 11)), InsertsSlice::Last);
        }
    }

    #[test]
    fn test_wrong_slice_count() {
        let mut b = ContextBuilder::default();
        let err = b
            .build(&series(4, 10), &ThresholdDetector::new(0.3), None)
            .unwrap_err();
        assert_eq!(err, ContextError::SliceCount { expected: 11, got: 10 });
    }

    #[test]
    fn test_auto_mode_reflects_selection() {
        let mut b = ContextBuilder::new(InsertsSelection {
            inserts_slice: InsertsSlice::Last,
            res_side: Side::Left,
            circle_side: Side::Top,
            show_boxes: true,
        });
        let mut reg = MemoryRegistry::new();
        let ctx = b
            .build(&series(4, 11), &ThresholdDetector::new(0.3), Some(&mut reg))
            .unwrap();
        assert_eq!(ctx.inserts_slice(), InsertsSlice::First);
        assert_eq!(ctx.res_side(), Side::Bottom);
        assert_eq!(*ctx.boundary(), BoundaryContext::new(4.0, 59.0, 4.0, 59.0));
        assert_eq!(b.selection.inserts_slice, InsertsSlice::First);
        assert_eq!(b.selection.res_side, Side::Bottom);
        assert_eq!(b.selection.circle_side, ctx.circle_side());
        assert_eq!(reg.rois_of(CONTEXT_MODULE).count(), 7);
    }

    #[test]
    fn test_show_boxes_off() {
        let mut b = ContextBuilder::default();
        let mut reg = MemoryRegistry::new();
        let hidden = b
            .build(&series(4, 11), &ThresholdDetector::new(0.3), Some(&mut reg))
            .unwrap();
        assert_eq!(reg.count(), 0);
        b.selection.show_boxes = true;
        let shown = b
            .build(&series(4, 11), &ThresholdDetector::new(0.3), Some(&mut reg))
            .unwrap();
        assert_eq!(hidden, shown);
        assert_eq!(reg.count(), 7);
    }

    #[test]
    fn test_fine_tune_uses_selection() {
        let sel = InsertsSelection {
            inserts_slice: InsertsSlice::Last,
            res_side: Side::Right,
            circle_side: Side::Bottom,
            show_boxes: true,
        };
        let mut b = ContextBuilder::new(sel);
        let det = ThresholdDetector::new(0.3).with_mode(DetectMode::FineTune);
        let mut reg = MemoryRegistry::new();
        let ctx = b.build(&series(4, 11), &det, Some(&mut reg)).unwrap();
        assert_eq!(ctx.inserts_slice(), InsertsSlice::Last);
        assert_eq!(ctx.res_side(), Side::Right);
        assert_eq!(ctx.circle_side(), Side::Bottom);
        assert_eq!(b.selection, sel);
        assert_eq!(reg.count(), 0);

        b.selection.circle_side = Side::Left;
        assert!(matches!(
            b.build(&series(4, 11), &det, None),
            Err(ContextError::SameAxis { .. })
        ));
    }
}

//! 积分均匀度.

use ndarray::{array, s, Array2, ArrayView2, Zip};

use super::{phantom_ellipse, require, AnalysisError, AnalysisInput, AnalysisResult, PhantomModule};
use crate::context::MedAcrContext;
use crate::roi::{ImageRef, Roi, RoiSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 均匀度 ROI 的名字.
pub const UNIFORMITY_ROI: &str = "Uniformity ROI";

/// 均匀度配置.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UniformitySpec {
    /// 椭圆 ROI 相对于体模跨度的大小 (%).
    pub size: f64,
    /// 是否先对整幅图像做 3x3 低通滤波.
    pub low_pass: bool,
}

impl Default for UniformitySpec {
    fn default() -> Self {
        Self {
            size: 70.0,
            low_pass: false,
        }
    }
}

/// 均匀度输出.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UniformityOutput {
    /// 使用的层面索引.
    pub slice: usize,
    /// 积分均匀度 (%).
    pub uniformity: f64,
}

/// 积分均匀度模块.
#[derive(Clone, Debug, Default)]
pub struct Uniformity {
    /// 配置.
    pub spec: UniformitySpec,
}

impl Uniformity {
    /// 以给定配置构造.
    pub fn new(spec: UniformitySpec) -> Self {
        Self { spec }
    }
}

/// 以 `[[1, 2, 1], [2, 4, 2], [1, 2, 1]] / 16` 做 "same" 尺寸卷积, 图像外按 0 填充.
pub fn low_pass(image: ArrayView2<f32>) -> Array2<f64> {
    let kernel = array![[1.0, 2.0, 1.0], [2.0, 4.0, 2.0], [1.0, 2.0, 1.0]] / 16.0;
    let (h, w) = image.dim();
    let mut padded = Array2::<f64>::zeros((h + 2, w + 2));
    padded
        .slice_mut(s![1..h + 1, 1..w + 1])
        .assign(&image.mapv(|v| v as f64));
    // 核对称, 卷积与相关相同.
    Zip::from(padded.windows((3, 3))).map_collect(|win| (&win * &kernel).sum())
}

/// `100 * (1 - (max - min) / (max + min))`.
pub fn integral_uniformity(values: &[f64]) -> Option<f64> {
    let (min, max) = values
        .iter()
        .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    Some(100.0 * (1.0 - (max - min) / (max + min)))
}

impl PhantomModule for Uniformity {
    type Output = UniformityOutput;

    fn name(&self) -> &'static str {
        "Uniformity"
    }

    fn draw_rois(&self, ctx: &MedAcrContext, _input: &AnalysisInput) -> AnalysisResult<RoiSet> {
        let mut rois = RoiSet::new();
        rois.push(Roi::new(
            UNIFORMITY_ROI,
            ImageRef::primary(ctx.uniform_slice()),
            phantom_ellipse(ctx, self.spec.size),
        ));
        Ok(rois)
    }

    fn analyse(&self, input: &AnalysisInput, rois: &RoiSet) -> AnalysisResult<Self::Output> {
        let roi = require(rois, UNIFORMITY_ROI)?;
        let slice = input.slice_of(roi)?;
        let values = if self.spec.low_pass {
            roi.values_in(low_pass(slice.array_view()).view())
        } else {
            roi.pixel_values(&slice)
        };
        let uniformity = integral_uniformity(&values)
            .ok_or_else(|| AnalysisError::EmptyRoi(roi.name.clone()))?;
        Ok(UniformityOutput {
            slice: roi.image.slice,
            uniformity,
        })
    }
}

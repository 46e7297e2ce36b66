//! 测量模块.
//!
//! 每个模块都遵循相同的协议:
//!
//! 1. **draw**: 根据上下文和模块自身的物理尺寸常量 (毫米) 计算 ROI 的像素几何,
//!    并按照分辨率插件 / 圆形插件的方位确定朝向;
//! 2. **link**: 每个 ROI 通过 [`ImageRef`] 记录其所在图像;
//! 3. **analyse**: 基于 ROI 的统计量或剖面计算模块输出.
//!
//! 输出结构中的 `Option` 字段表示可独立缺失的结果 (例如曲线拟合失败),
//! 不影响同一模块的其它输出.

use thiserror::Error;

use crate::context::MedAcrContext;
use crate::data::{MrSeries, ScanSlice};
use crate::profile::ProfileError;
use crate::roi::{ImageRef, Roi, RoiRegistry, RoiSet, RoiShape, SeriesSource};

mod ghosting;
mod phantom_width;
mod resolution;
mod slice_position;
mod slice_width;
mod snr;
mod uniformity;

pub use ghosting::{Ghosting, GhostingOutput, GhostingSpec};
pub use phantom_width::{PhantomWidth, PhantomWidthOutput, PhantomWidthSpec, WidthLine};
pub use resolution::{Resolution, ResolutionOutput, ResolutionSpec};
pub use slice_position::{SlicePosition, SlicePositionOutput};
pub use slice_width::{SliceWidth, SliceWidthOutput, SliceWidthSpec};
pub use snr::{SnrCorrections, SubtractionSnr, SubtractionSnrOutput, SubtractionSnrSpec};
pub use uniformity::{Uniformity, UniformityOutput, UniformitySpec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 测量模块错误.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum AnalysisError {
    /// 缺少必需的 ROI.
    #[error("缺少 ROI `{0}`")]
    MissingRoi(String),

    /// 切片索引越界.
    #[error("切片 {slice} 越界, 序列共 {len} 层")]
    SliceOutOfRange {
        /// 请求的切片.
        slice: usize,
        /// 序列层数.
        len: usize,
    },

    /// 需要重复采集序列但未提供.
    #[error("缺少重复采集序列")]
    MissingRepeat,

    /// ROI 与图像没有交集.
    #[error("ROI `{0}` 不包含任何像素")]
    EmptyRoi(String),

    /// 剖面特征提取失败.
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// 测量模块结果.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// 测量模块的输入图像.
#[derive(Copy, Clone, Debug)]
pub struct AnalysisInput<'a> {
    /// 主序列.
    pub series: &'a MrSeries,
    /// 重复采集序列, 仅减影法信噪比需要.
    pub repeat: Option<&'a MrSeries>,
}

impl<'a> AnalysisInput<'a> {
    /// 只有主序列的输入.
    #[inline]
    pub fn new(series: &'a MrSeries) -> Self {
        Self {
            series,
            repeat: None,
        }
    }

    /// 附加重复采集序列.
    #[inline]
    pub fn with_repeat(mut self, repeat: &'a MrSeries) -> Self {
        self.repeat = Some(repeat);
        self
    }

    /// 获取 `image` 所指的切片.
    pub fn slice(&self, image: ImageRef) -> AnalysisResult<ScanSlice<'a>> {
        let series = match image.source {
            SeriesSource::Primary => self.series,
            SeriesSource::Repeat => self.repeat.ok_or(AnalysisError::MissingRepeat)?,
        };
        series
            .get_slice(image.slice)
            .ok_or(AnalysisError::SliceOutOfRange {
                slice: image.slice,
                len: series.len_z(),
            })
    }

    /// 获取 ROI 所在的切片.
    #[inline]
    pub fn slice_of(&self, roi: &Roi) -> AnalysisResult<ScanSlice<'a>> {
        self.slice(roi.image)
    }
}

/// 一次完整运行的结果: 绘制出的 ROI 与模块输出.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModuleRun<T> {
    /// 模块绘制出的 ROI.
    pub rois: RoiSet,
    /// 模块输出.
    pub output: T,
}

/// 测量模块.
pub trait PhantomModule {
    /// 模块输出.
    type Output;

    /// 模块名, 同时作为 ROI 登记时的模块键.
    fn name(&self) -> &'static str;

    /// 根据上下文绘制 ROI.
    fn draw_rois(&self, ctx: &MedAcrContext, input: &AnalysisInput) -> AnalysisResult<RoiSet>;

    /// 基于 ROI 计算输出. `rois` 通常来自 [`Self::draw_rois`], 也可以是用户调整后的版本.
    fn analyse(&self, input: &AnalysisInput, rois: &RoiSet) -> AnalysisResult<Self::Output>;

    /// 依次执行绘制, 登记与分析.
    fn run(
        &self,
        ctx: &MedAcrContext,
        input: &AnalysisInput,
        registry: Option<&mut dyn RoiRegistry>,
    ) -> AnalysisResult<ModuleRun<Self::Output>> {
        let rois = self.draw_rois(ctx, input)?;
        if let Some(registry) = registry {
            rois.register_into(self.name(), registry);
        }
        let output = self.analyse(input, &rois)?;
        log::info!("{}: 分析完成, 共 {} 个 ROI", self.name(), rois.len());
        Ok(ModuleRun { rois, output })
    }
}

/// 取整到整数像素坐标. 恰好位于 `.5` 时取偶数.
#[inline]
pub(crate) fn round(v: f64) -> i64 {
    v.round_ties_even() as i64
}

/// 按名字取出 ROI.
pub(crate) fn require<'r>(rois: &'r RoiSet, name: &str) -> AnalysisResult<&'r Roi> {
    rois.get(name)
        .ok_or_else(|| AnalysisError::MissingRoi(name.to_owned()))
}

/// 体模内部椭圆的 `(xcent, ycent, a, b)`, 半轴为体模跨度的 `size_pct` %, 均取整.
pub(crate) fn phantom_axes(ctx: &MedAcrContext, size_pct: f64) -> (f64, f64, f64, f64) {
    let b = ctx.boundary();
    let factor = size_pct / 100.0;
    (
        b.xcent().round_ties_even(),
        b.ycent().round_ties_even(),
        (factor * b.x_length() / 2.0).round_ties_even(),
        (factor * b.y_length() / 2.0).round_ties_even(),
    )
}

/// 体模内部的椭圆 ROI, 见 [`phantom_axes`].
pub(crate) fn phantom_ellipse(ctx: &MedAcrContext, size_pct: f64) -> RoiShape {
    let (xcent, ycent, a, b) = phantom_axes(ctx, size_pct);
    RoiShape::Ellipse { xcent, ycent, a, b }
}

/// ROI 的全部像素值, 为空时返回错误.
pub(crate) fn nonempty_values(roi: &Roi, slice: &ScanSlice) -> AnalysisResult<Vec<f64>> {
    let v = roi.pixel_values(slice);
    if v.is_empty() {
        return Err(AnalysisError::EmptyRoi(roi.name.clone()));
    }
    Ok(v)
}

/// ROI 的像素均值, 为空时返回错误.
pub(crate) fn nonempty_mean(roi: &Roi, slice: &ScanSlice) -> AnalysisResult<f64> {
    roi.mean(slice)
        .ok_or_else(|| AnalysisError::EmptyRoi(roi.name.clone()))
}

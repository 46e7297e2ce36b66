//! 减影法信噪比.
//!
//! 两次重复采集在同一层面的同一位置放置椭圆 ROI. 信号为两幅图像逐像素之和的均值,
//! 噪声为逐像素之差的标准差除以 `sqrt(2)`.

use ndarray::Array1;

use super::{
    nonempty_values, phantom_ellipse, AnalysisError, AnalysisInput, AnalysisResult, PhantomModule,
};
use crate::context::MedAcrContext;
use crate::data::{MrSeries, SpacingAttr};
use crate::roi::{ImageRef, Roi, RoiSet, SeriesSource};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 信号 ROI 的名字. 主序列与重复序列上的两个 ROI 同名.
pub const SNR_ROI: &str = "SNR ROI";

/// 可选的信噪比校正项, 默认全部关闭.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SnrCorrections {
    /// 除以像素面积 (平方毫米).
    pub pixel_area: bool,
    /// 乘以 `sqrt(像素带宽 / 参考带宽)`.
    pub bandwidth: bool,
    /// 乘以 `1 / sqrt(平均次数)`.
    pub averages: bool,
    /// 乘以 `1 / sqrt(相位编码步数)`.
    pub phase_steps: bool,
}

impl SnrCorrections {
    /// 是否至少开启了一项校正.
    #[inline]
    pub fn any(&self) -> bool {
        self.pixel_area || self.bandwidth || self.averages || self.phase_steps
    }
}

/// 减影法信噪比配置.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubtractionSnrSpec {
    /// 椭圆 ROI 相对于体模跨度的大小 (%).
    pub size: f64,
    /// 校正项.
    pub corrections: SnrCorrections,
    /// 带宽校正的参考带宽 (Hz/pixel).
    pub reference_bandwidth: f64,
}

impl Default for SubtractionSnrSpec {
    fn default() -> Self {
        Self {
            size: 70.0,
            corrections: SnrCorrections::default(),
            reference_bandwidth: 130.0,
        }
    }
}

/// 减影法信噪比输出.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubtractionSnrOutput {
    /// 使用的层面索引.
    pub slice: usize,
    /// 信号.
    pub signal: f64,
    /// 噪声.
    pub noise: f64,
    /// 信噪比. 噪声为 0 时为正无穷.
    pub snr: f64,
    /// 校正后的信噪比, 仅在开启了校正项时给出.
    pub corrected_snr: Option<f64>,
}

/// 减影法信噪比模块.
#[derive(Clone, Debug, Default)]
pub struct SubtractionSnr {
    /// 配置.
    pub spec: SubtractionSnrSpec,
}

impl SubtractionSnr {
    /// 以给定配置构造.
    pub fn new(spec: SubtractionSnrSpec) -> Self {
        Self { spec }
    }

    /// 根据序列标签计算校正系数. 标签缺失时对应系数为 1.
    pub fn correction_factor(&self, series: &MrSeries) -> f64 {
        let c = self.spec.corrections;
        let tags = series.tags();
        let mut factor = 1.0;
        if c.pixel_area {
            factor *= series.slice_pixel();
        }
        if c.bandwidth {
            match tags.pixel_bandwidth() {
                Some(bw) => factor *= (bw / self.spec.reference_bandwidth).sqrt(),
                None => log::debug!("缺少像素带宽标签, 带宽校正系数取 1"),
            }
        }
        if c.averages {
            match tags.averages() {
                Some(n) => factor /= n.sqrt(),
                None => log::debug!("缺少平均次数标签, 平均校正系数取 1"),
            }
        }
        if c.phase_steps {
            match tags.phase_encode_steps() {
                Some(n) => factor /= n.sqrt(),
                None => log::debug!("缺少相位编码步数标签, 相位编码校正系数取 1"),
            }
        }
        factor
    }
}

/// 找到 `source` 序列上的信号 ROI.
fn signal_roi(rois: &RoiSet, source: SeriesSource) -> AnalysisResult<&Roi> {
    rois.iter()
        .find(|r| r.name == SNR_ROI && r.image.source == source)
        .ok_or_else(|| AnalysisError::MissingRoi(format!("{SNR_ROI} ({source:?})")))
}

impl PhantomModule for SubtractionSnr {
    type Output = SubtractionSnrOutput;

    fn name(&self) -> &'static str {
        "Subtraction SNR"
    }

    fn draw_rois(&self, ctx: &MedAcrContext, _input: &AnalysisInput) -> AnalysisResult<RoiSet> {
        let z = ctx.uniform_slice();
        let first = Roi::new(
            SNR_ROI,
            ImageRef::primary(z),
            phantom_ellipse(ctx, self.spec.size),
        );
        let second = first.copy_to(ImageRef::repeat(z));
        let mut rois = RoiSet::new();
        rois.push(first);
        rois.push(second);
        Ok(rois)
    }

    fn analyse(&self, input: &AnalysisInput, rois: &RoiSet) -> AnalysisResult<Self::Output> {
        let first = signal_roi(rois, SeriesSource::Primary)?;
        let second = signal_roi(rois, SeriesSource::Repeat)?;
        let v1 = nonempty_values(first, &input.slice_of(first)?)?;
        let v2 = nonempty_values(second, &input.slice_of(second)?)?;
        if v1.len() != v2.len() {
            log::warn!(
                "两次采集的 ROI 像素数不一致 ({} vs {}), 按较短者计算",
                v1.len(),
                v2.len()
            );
        }

        let sum: Array1<f64> = v1.iter().zip(&v2).map(|(a, b)| a + b).collect();
        let diff: Array1<f64> = v1.iter().zip(&v2).map(|(a, b)| a - b).collect();
        let signal = sum.mean().ok_or_else(|| AnalysisError::EmptyRoi(SNR_ROI.to_owned()))?;
        let noise = diff.std(0.0) / std::f64::consts::SQRT_2;
        let snr = if noise == 0.0 {
            f64::INFINITY
        } else {
            signal / noise
        };

        let corrected_snr = self
            .spec
            .corrections
            .any()
            .then(|| snr * self.correction_factor(input.series));
        log::debug!("SNR: signal {signal:.3}, noise {noise:.3}, snr {snr:.3}");

        Ok(SubtractionSnrOutput {
            slice: first.image.slice,
            signal,
            noise,
            snr,
            corrected_snr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, disc, series_of};
    use super::*;
    use crate::context::{InsertsSlice, Side};
    use crate::data::{MrTag, MrTags};
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    fn setup() -> (MedAcrContext, MrSeries) {
        let ctx = context(32.0, 24.0, InsertsSlice::First, Side::Bottom, Side::Left);
        let s = series_of(&disc(64, 32.0, 24.0, 100.0, 0.0), 1.0, MrTags::new());
        (ctx, s)
    }

    #[test]
    fn test_draw_mirrors_roi() {
        let (ctx, s) = setup();
        let m = SubtractionSnr::default();
        let rois = m.draw_rois(&ctx, &AnalysisInput::new(&s)).unwrap();
        assert_eq!(rois.len(), 2);
        let a = rois.get_on(SNR_ROI, ImageRef::primary(6)).unwrap();
        let b = rois.get_on(SNR_ROI, ImageRef::repeat(6)).unwrap();
        assert_eq!(a.shape, b.shape);
    }

    #[test]
    fn test_identical_images_give_infinite_snr() {
        let (ctx, s) = setup();
        let m = SubtractionSnr::default();
        let input = AnalysisInput::new(&s).with_repeat(&s);
        let out = m.run(&ctx, &input, None).unwrap().output;
        assert_eq!(out.slice, 6);
        assert_abs_diff_eq!(out.signal, 200.0);
        assert_eq!(out.noise, 0.0);
        assert_eq!(out.snr, f64::INFINITY);
        assert!(out.corrected_snr.is_none());
    }

    #[test]
    fn test_alternating_noise() {
        let (ctx, s) = setup();
        // 第二次采集在棋盘格上交替 +-2, 差值的总体标准差约为 2.
        let noisy = Array2::from_shape_fn((64, 64), |(h, w)| {
            let base = disc(64, 32.0, 24.0, 100.0, 0.0)[(h, w)];
            if (h + w) % 2 == 0 {
                base + 2.0
            } else {
                base - 2.0
            }
        });
        let r = series_of(&noisy, 1.0, MrTags::new());
        let input = AnalysisInput::new(&s).with_repeat(&r);
        let m = SubtractionSnr::default();
        let out = m.run(&ctx, &input, None).unwrap().output;
        assert_abs_diff_eq!(out.noise, 2.0 / 2f64.sqrt(), epsilon = 1e-3);
        assert_abs_diff_eq!(out.signal, 200.0, epsilon = 0.1);
        assert!(out.snr.is_finite());
    }

    #[test]
    fn test_missing_repeat() {
        let (ctx, s) = setup();
        let m = SubtractionSnr::default();
        assert_eq!(
            m.run(&ctx, &AnalysisInput::new(&s), None).unwrap_err(),
            AnalysisError::MissingRepeat
        );
    }

    #[test]
    fn test_corrections_fallback() {
        let tags = MrTags::new()
            .with(MrTag::PixelBandwidth, "520")
            .with(MrTag::NumberOfAverages, "4");
        let img = disc(64, 32.0, 24.0, 100.0, 0.0);
        let s = series_of(&img, 0.5, tags);
        let m = SubtractionSnr::new(SubtractionSnrSpec {
            corrections: SnrCorrections {
                pixel_area: true,
                bandwidth: true,
                averages: true,
                phase_steps: true,
            },
            ..Default::default()
        });
        // 0.25 * sqrt(520 / 130) / sqrt(4) * 1 = 0.25.
        assert_abs_diff_eq!(m.correction_factor(&s), 0.25, epsilon = 1e-12);

        let bare = series_of(&img, 1.0, MrTags::new());
        assert_abs_diff_eq!(m.correction_factor(&bare), 1.0);
    }

    #[test]
    fn test_pixel_area_scales_up() {
        let img = disc(64, 32.0, 24.0, 100.0, 0.0);
        let s = series_of(&img, 2.0, MrTags::new());
        let m = SubtractionSnr::new(SubtractionSnrSpec {
            corrections: SnrCorrections {
                pixel_area: true,
                ..Default::default()
            },
            ..Default::default()
        });
        // 2mm x 2mm 像素, 面积 4.
        assert_abs_diff_eq!(m.correction_factor(&s), 4.0, epsilon = 1e-12);
    }
}

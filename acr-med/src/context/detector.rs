use super::{BoundaryContext, ContextError, ContextResult};
use crate::data::ScanSlice;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 边界检测模式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DetectMode {
    /// 自动: 内插件层面与插件方位都由图像推断.
    #[default]
    Auto,
    /// 微调: 使用用户给定的内插件层面与插件方位, 仅检测外边界.
    FineTune,
}

/// 体模外边界检测器.
///
/// 真实的外椭圆检测由宿主程序提供; 本库只依赖该 trait.
pub trait BoundaryDetector {
    /// 当前检测模式.
    fn mode(&self) -> DetectMode;

    /// 检测切片中体模的外边界.
    fn detect(&self, slice: &ScanSlice) -> ContextResult<BoundaryContext>;
}

/// 简单阈值检测器: 取所有不低于 `fraction * max` 的像素的包围盒.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThresholdDetector {
    /// 相对于切片最大值的阈值比例, 位于 `(0, 1]`.
    pub fraction: f32,
    /// 检测模式.
    pub mode: DetectMode,
}

impl Default for ThresholdDetector {
    fn default() -> Self {
        Self {
            fraction: 0.5,
            mode: DetectMode::Auto,
        }
    }
}

impl ThresholdDetector {
    /// 以给定阈值比例构造自动模式检测器.
    pub fn new(fraction: f32) -> Self {
        Self {
            fraction,
            ..Self::default()
        }
    }

    /// 切换检测模式.
    pub fn with_mode(mut self, mode: DetectMode) -> Self {
        self.mode = mode;
        self
    }
}

impl BoundaryDetector for ThresholdDetector {
    #[inline]
    fn mode(&self) -> DetectMode {
        self.mode
    }

    fn detect(&self, slice: &ScanSlice) -> ContextResult<BoundaryContext> {
        if !(self.fraction > 0.0 && self.fraction <= 1.0) {
            return Err(ContextError::Detector(format!(
                "阈值比例 {} 不在 (0, 1] 内",
                self.fraction
            )));
        }
        let data = slice.array_view();
        let max = data.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        if !(max.is_finite() && max > 0.0) {
            return Err(ContextError::Detector(format!("切片最大值 {max} 无效")));
        }
        let threshold = max * self.fraction;

        let mut bbox: Option<(usize, usize, usize, usize)> = None;
        for ((h, w), &v) in data.indexed_iter() {
            if v < threshold {
                continue;
            }
            bbox = Some(match bbox {
                None => (w, w, h, h),
                Some((x0, x1, y0, y1)) => (x0.min(w), x1.max(w), y0.min(h), y1.max(h)),
            });
        }
        // 最大值本身不低于阈值, 因此包围盒一定存在.
        let (x0, x1, y0, y1) = bbox.ok_or_else(|| ContextError::Detector("空切片".to_owned()))?;
        let b = BoundaryContext::new(x0 as f64, x1 as f64, y0 as f64, y1 as f64);
        log::debug!("阈值检测得到边界 {b:?}");
        Ok(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PixelSpacing;
    use ndarray::Array2;

    #[test]
    fn test_threshold_bbox() {
        let mut img = Array2::from_elem((50, 60), 5.0f32);
        for h in 10..=40 {
            for w in 12..=45 {
                img[(h, w)] = 100.0;
            }
        }
        let sli = ScanSlice::new(img.view(), PixelSpacing::isotropic(1.0, 5.0).unwrap());
        let b = ThresholdDetector::default().detect(&sli).unwrap();
        assert_eq!(b, BoundaryContext::new(12.0, 45.0, 10.0, 40.0));
    }

    #[test]
    fn test_threshold_invalid() {
        let img = Array2::<f32>::zeros((5, 5));
        let sli = ScanSlice::new(img.view(), PixelSpacing::isotropic(1.0, 5.0).unwrap());
        assert!(ThresholdDetector::default().detect(&sli).is_err());
        let img = Array2::<f32>::ones((5, 5));
        let sli = ScanSlice::new(img.view(), PixelSpacing::isotropic(1.0, 5.0).unwrap());
        assert!(ThresholdDetector::new(0.0).detect(&sli).is_err());
        assert_eq!(
            ThresholdDetector::new(1.0).detect(&sli).unwrap(),
            BoundaryContext::new(0.0, 4.0, 0.0, 4.0)
        );
    }
}

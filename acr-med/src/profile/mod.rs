//! 一维强度剖面的特征提取.
//!
//! 剖面指沿一条线段 (或沿矩形区域某一轴求平均) 得到的像素值序列.
//! 本模块的所有函数都只读取剖面, 不做任何平滑处理.
//!
//! 记剖面最大值为 `max`, 给定除数 `d` (`d >= 1`), 阈值定义为 `max / d`.
//! 例如 `d = 2` 对应半高宽 (FWHM).

mod contrast;

use ndarray::ArrayView1;
use thiserror::Error;

pub use contrast::bar_contrast;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 剖面特征提取错误.
#[derive(Copy, Clone, Debug, PartialEq, Error)]
pub enum ProfileError {
    /// 剖面为空.
    #[error("剖面为空")]
    Empty,

    /// 除数非法 (必须有限且不小于 1).
    #[error("除数 {0} 非法, 必须有限且不小于 1")]
    InvalidDivisor(f64),

    /// 剖面最大值非正或不是有限值, 阈值无意义.
    #[error("剖面峰值 {0} 非正或不是有限值")]
    InvalidPeak(f64),
}

/// 剖面特征提取结果.
pub type ProfileResult<T> = Result<T, ProfileError>;

/// 剖面上的一对 (亚像素) 边界位置.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    /// 下边界.
    pub minimum: f64,
    /// 上边界.
    pub maximum: f64,
}

impl Bounds {
    /// 上下边界之差.
    #[inline]
    pub fn difference(&self) -> f64 {
        self.maximum - self.minimum
    }

    /// 上下边界的中点.
    #[inline]
    pub fn centre(&self) -> f64 {
        (self.maximum + self.minimum) / 2.0
    }
}

/// 预检查并返回 `(峰值索引, 阈值)`.
///
/// 峰值索引取第一个最大值所在位置.
fn peak_and_threshold(profile: ArrayView1<f64>, divisor: f64) -> ProfileResult<(usize, f64)> {
    if profile.is_empty() {
        return Err(ProfileError::Empty);
    }
    if !divisor.is_finite() || divisor < 1.0 {
        return Err(ProfileError::InvalidDivisor(divisor));
    }
    let mut peak_idx = 0;
    for (i, &v) in profile.iter().enumerate() {
        if v > profile[peak_idx] {
            peak_idx = i;
        }
    }
    let peak = profile[peak_idx];
    if !peak.is_finite() || peak <= 0.0 {
        return Err(ProfileError::InvalidPeak(peak));
    }
    Ok((peak_idx, peak / divisor))
}

/// 在 `lo` (低于阈值) 与 `hi` (不低于阈值) 两个相邻采样点之间线性插值出阈值所在位置.
#[inline]
fn cross(profile: ArrayView1<f64>, lo: usize, hi: usize, threshold: f64) -> f64 {
    let (a, b) = (profile[lo], profile[hi]);
    let frac = (threshold - a) / (b - a);
    lo as f64 + frac * (hi as f64 - lo as f64)
}

/// 从下标 `[first, last]` 的连续区间向两侧插值出阈值交点.
///
/// 区间触及剖面两端时直接使用端点, 不做外推.
fn interpolate_run(profile: ArrayView1<f64>, first: usize, last: usize, threshold: f64) -> Bounds {
    let minimum = match first {
        0 => 0.0,
        i => cross(profile, i - 1, i, threshold),
    };
    let maximum = if last + 1 == profile.len() {
        last as f64
    } else {
        cross(profile, last + 1, last, threshold)
    };
    Bounds { minimum, maximum }
}

/// 求剖面在 `max / divisor` 处的两个亚像素交点.
///
/// 从峰值出发分别向左右两侧搜索第一个低于阈值的采样点,
/// 然后在该点与相邻的不低于阈值的采样点之间线性插值.
/// 交点正好落在采样点上时使用该采样点的位置.
pub fn nth_max_bounds(profile: ArrayView1<f64>, divisor: f64) -> ProfileResult<Bounds> {
    let (peak_idx, threshold) = peak_and_threshold(profile, divisor)?;

    let mut first = peak_idx;
    while first > 0 && profile[first - 1] >= threshold {
        first -= 1;
    }
    let mut last = peak_idx;
    while last + 1 < profile.len() && profile[last + 1] >= threshold {
        last += 1;
    }
    Ok(interpolate_run(profile, first, last, threshold))
}

/// 求剖面中不低于 `max / divisor` 的 **最宽** 连续区间, 并插值出其两端的亚像素交点.
///
/// 相比 [`nth_max_bounds`], 该函数不依赖于全局峰值的位置,
/// 因此对噪声引起的多个局部峰更加稳健. 宽度相同时取靠前的区间.
pub fn nth_max_widest_peak(profile: ArrayView1<f64>, divisor: f64) -> ProfileResult<Bounds> {
    let (peak_idx, threshold) = peak_and_threshold(profile, divisor)?;

    let mut widest: Option<(usize, usize)> = None;
    let mut consider = |first: usize, last: usize| match widest {
        Some((a, b)) if b - a >= last - first => {}
        _ => widest = Some((first, last)),
    };

    let mut run_start: Option<usize> = None;
    for (i, &v) in profile.iter().enumerate() {
        match (v >= threshold, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(s)) => {
                consider(s, i - 1);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = run_start {
        consider(s, profile.len() - 1);
    }

    // 峰值本身一定不低于阈值, 因此至少存在一个区间.
    let (first, last) = widest.unwrap_or((peak_idx, peak_idx));
    Ok(interpolate_run(profile, first, last, threshold))
}

/// 求剖面中第一个与最后一个不低于 `max / divisor` 的采样点, 并向外插值出亚像素交点.
///
/// 与 [`nth_max_bounds`] 不同, 中间低于阈值的采样点 (例如条栅之间的谷) 不会截断区间.
pub fn nth_max_outer_bounds(profile: ArrayView1<f64>, divisor: f64) -> ProfileResult<Bounds> {
    let (peak_idx, threshold) = peak_and_threshold(profile, divisor)?;
    let first = profile.iter().position(|&v| v >= threshold).unwrap_or(peak_idx);
    let last = profile.iter().rposition(|&v| v >= threshold).unwrap_or(peak_idx);
    Ok(interpolate_run(profile, first, last, threshold))
}

/// 返回剖面中所有不低于 `max / divisor` 的采样点下标 (升序).
pub fn nth_max_positions(profile: ArrayView1<f64>, divisor: f64) -> ProfileResult<Vec<usize>> {
    let (_, threshold) = peak_and_threshold(profile, divisor)?;
    Ok(profile
        .iter()
        .enumerate()
        .filter(|(_, &v)| v >= threshold)
        .map(|(i, _)| i)
        .collect())
}

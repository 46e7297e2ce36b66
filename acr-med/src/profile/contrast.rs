//! 分辨率插件的条栅对比度.

use ndarray::ArrayView1;

use super::{nth_max_outer_bounds, ProfileResult};

/// 在两个相邻的整数候选位置中, 取像素值更高的一个.
#[inline]
fn brighter_of(profile: ArrayView1<f64>, pos: f64) -> usize {
    let last = profile.len() - 1;
    let lo = (pos.floor().max(0.0) as usize).min(last);
    let hi = (pos.ceil().max(0.0) as usize).min(last);
    if profile[hi] > profile[lo] {
        hi
    } else {
        lo
    }
}

/// 求剖面上一组亮条栅中 **最差** 的那一对亮暗对比度.
///
/// 算法流程依次为:
///
/// 1. 以半高 (`max / 2`) 求出最外侧亮区的亚像素边界;
/// 2. 对两个边界分别比较向下取整与向上取整后的像素, 取更亮者作为起止下标;
/// 3. 将起止区间内低于半高的连续采样点划分为若干 "谷";
/// 4. 每个谷的对比度为 `(peak - trough) / (peak + trough)`, 其中 `trough`
///   为谷内采样点均值, `peak` 为谷两侧紧邻的不低于半高的连续采样点的均值;
/// 5. 返回所有谷对比度中的最小值. 不存在谷时对比度定义为 0.
pub fn bar_contrast(profile: ArrayView1<f64>) -> ProfileResult<f64> {
    let bounds = nth_max_outer_bounds(profile, 2.0)?;
    let half = profile.fold(f64::MIN, |acc, &v| acc.max(v)) / 2.0;

    let start = brighter_of(profile, bounds.minimum);
    let end = brighter_of(profile, bounds.maximum);
    if end <= start {
        return Ok(0.0);
    }

    let is_trough = |i: usize| profile[i] < half;
    let mut worst: Option<f64> = None;
    let mut i = start;
    while i <= end {
        if !is_trough(i) {
            i += 1;
            continue;
        }
        let first = i;
        while i <= end && is_trough(i) {
            i += 1;
        }
        let last = i - 1;

        let trough_sum: f64 = (first..=last).map(|k| profile[k]).sum();
        let trough = trough_sum / (last - first + 1) as f64;

        let left = (start..first).rev().take_while(|&k| !is_trough(k));
        let right = (last + 1..=end).take_while(|&k| !is_trough(k));
        let (peak_sum, peak_cnt) = left
            .chain(right)
            .fold((0.0, 0usize), |(s, c), k| (s + profile[k], c + 1));
        if peak_cnt == 0 {
            continue;
        }
        let peak = peak_sum / peak_cnt as f64;

        let c = (peak - trough) / (peak + trough);
        log::debug!("trough [{first}, {last}]: peak {peak:.3}, trough {trough:.3}, contrast {c:.4}");
        worst = Some(worst.map_or(c, |w| w.min(c)));
    }
    Ok(worst.unwrap_or(0.0))
}
